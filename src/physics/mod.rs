//! Damped force simulation shared by the primary layout and the helper
//! routing layout. Bodies are plain snapshots; callers copy positions in and
//! out around each tick.

mod coordinator;
mod forces;
mod quadtree;

use std::time::{Duration, Instant};

use eframe::egui::Vec2;
use tracing::{debug, warn};

use crate::config::{LayoutConfig, ScheduleConfig};
use forces::{apply_charge, collision_shifts};
use quadtree::QuadTree;

pub use coordinator::{FrameReport, LayoutCoordinator};

const BARNES_HUT_THETA: f32 = 0.72;
const JOLT_THRESHOLD_DECAY: f32 = 0.5;
const MIN_SLEEP_SPEED_SQ: f32 = 0.02 * 0.02;

#[derive(Clone, Debug)]
pub struct Body {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    /// Negative values repel.
    pub charge: f32,
    /// Gravity weight and spring inertia; at least 1.
    pub weight: f32,
    pub degree: usize,
    pub fixed: bool,
}

impl Body {
    pub fn new(position: Vec2, radius: f32, charge: f32) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            radius,
            charge,
            weight: 1.0,
            degree: 0,
            fixed: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spring {
    pub from: usize,
    pub to: usize,
    pub distance: f32,
    pub strength: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickReport {
    pub steps: usize,
    /// Aggregate squared displacement of the last step.
    pub delta: f32,
    pub settled: bool,
    pub jolts: usize,
    pub rollbacks: usize,
}

#[derive(Default)]
struct Scratch {
    forces: Vec<Vec2>,
    shifts: Vec<Vec2>,
    positions: Vec<Vec2>,
    strengths: Vec<f32>,
    radii: Vec<f32>,
}

pub struct ForceLayoutEngine {
    config: LayoutConfig,
    bodies: Vec<Body>,
    springs: Vec<Spring>,
    bounds: Vec2,
    alpha: f32,
    resume_alpha: f32,
    settled: bool,
    settled_once: bool,
    scratch: Scratch,
}

impl ForceLayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            bodies: Vec::new(),
            springs: Vec::new(),
            bounds: Vec2::ZERO,
            alpha: config.alpha_start,
            resume_alpha: config.resume_alpha,
            settled: false,
            settled_once: false,
            scratch: Scratch::default(),
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Replaces the simulated system; velocities and convergence state start over.
    pub fn load(&mut self, bodies: Vec<Body>, springs: Vec<Spring>) {
        self.bodies = bodies;
        self.springs = springs
            .into_iter()
            .filter(|spring| spring.from != spring.to)
            .filter(|spring| spring.from < self.bodies.len() && spring.to < self.bodies.len())
            .collect();
        self.alpha = self.config.alpha_start;
        self.resume_alpha = self.config.resume_alpha;
        self.settled = false;
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn springs(&self) -> &[Spring] {
        &self.springs
    }

    pub fn body_mut(&mut self, index: usize) -> Option<&mut Body> {
        self.bodies.get_mut(index)
    }

    /// Viewport extent; nodes are kept inside `[0, size]` when containment is on.
    pub fn set_bounds(&mut self, size: Vec2) {
        if size != self.bounds {
            self.bounds = size;
            self.reheat();
        }
    }

    pub fn bounds(&self) -> Vec2 {
        self.bounds
    }

    pub fn center(&self) -> Vec2 {
        self.bounds * 0.5
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    pub fn reheat(&mut self) {
        self.settled = false;
        self.alpha = self.alpha.max(self.config.alpha_start);
    }

    /// Pins the body at `position` and wakes the simulation.
    pub fn drag(&mut self, index: usize, position: Vec2) {
        let Some(body) = self.bodies.get_mut(index) else {
            return;
        };
        body.position = position;
        body.velocity = Vec2::ZERO;
        body.fixed = true;
        self.reheat();
    }

    pub fn set_fixed(&mut self, index: usize, fixed: bool) {
        if let Some(body) = self.bodies.get_mut(index) {
            body.fixed = fixed;
            body.velocity = Vec2::ZERO;
        }
        self.reheat();
    }

    /// Runs steps until the budget or the step cap is used up or the system
    /// settles. A settled engine does nothing until reheated.
    pub fn tick(&mut self, schedule: &ScheduleConfig) -> TickReport {
        let cap = if self.settled_once {
            schedule.settled_steps_per_tick
        } else {
            schedule.max_steps_per_tick
        };
        self.run(cap.max(1), Some(schedule.tick_budget()))
    }

    /// Runs exactly up to `steps` steps without a time budget.
    pub fn run_steps(&mut self, steps: usize) -> TickReport {
        self.run(steps, None)
    }

    fn run(&mut self, cap: usize, budget: Option<Duration>) -> TickReport {
        let mut report = TickReport {
            settled: self.settled,
            ..TickReport::default()
        };
        if self.settled || self.bodies.is_empty() {
            report.settled = true;
            return report;
        }

        let started = Instant::now();
        while report.steps < cap {
            let outcome = self.step();
            report.steps += 1;
            report.delta = outcome.delta;
            report.rollbacks += outcome.rollbacks;
            report.jolts += usize::from(outcome.jolted);

            if outcome.delta < self.config.settle_threshold {
                self.settled = true;
                self.settled_once = true;
                debug!(steps = report.steps, alpha = self.alpha, "layout settled");
                break;
            }
            if budget.is_some_and(|budget| started.elapsed() >= budget) {
                break;
            }
        }
        report.settled = self.settled;
        report
    }

    fn step(&mut self) -> StepOutcome {
        let count = self.bodies.len();
        let config = self.config;
        let center = self.center();
        let alpha = self.alpha;

        self.resolve_collisions();

        let scratch = &mut self.scratch;
        scratch.forces.clear();
        scratch.forces.resize(count, Vec2::ZERO);
        scratch.positions.clear();
        scratch.strengths.clear();
        for body in &self.bodies {
            scratch.positions.push(body.position);
            scratch.strengths.push(body.charge.min(0.0).abs());
        }

        let forces = &mut scratch.forces;
        let positions = &scratch.positions;
        let strengths = &scratch.strengths;

        if let Some(tree) = QuadTree::build(positions, strengths) {
            apply_charge(
                &tree,
                positions,
                strengths,
                BARNES_HUT_THETA,
                config.charge_softening.max(0.01),
                forces,
            );
        }

        for spring in &self.springs {
            let from = &self.bodies[spring.from];
            let to = &self.bodies[spring.to];
            let delta = to.position - from.position;
            let distance = delta.length();
            if distance <= 0.0001 {
                continue;
            }
            let pull = (delta / distance) * ((distance - spring.distance) * spring.strength);
            let total = from.weight + to.weight;
            forces[spring.from] += pull * (to.weight / total) * 2.0;
            forces[spring.to] -= pull * (from.weight / total) * 2.0;
        }

        if config.gravity > 0.0 || config.recenter_rate > 0.0 {
            let mut weighted = Vec2::ZERO;
            let mut weight_sum = 0.0;
            for body in &self.bodies {
                weighted += body.position * body.weight;
                weight_sum += body.weight;
            }
            let drift = if weight_sum > 0.0 {
                (center - weighted / weight_sum) * config.recenter_rate
            } else {
                Vec2::ZERO
            };

            for (body, force) in self.bodies.iter().zip(forces.iter_mut()) {
                let inward = (center - body.position) * config.gravity;
                *force += inward + drift + periphery_bias(body.degree, inward, config);
            }
        }

        let max_speed_sq = config.max_speed * config.max_speed;
        let mut delta = 0.0;
        let mut rollbacks = 0;
        for (index, body) in self.bodies.iter_mut().enumerate() {
            if body.fixed {
                body.velocity = Vec2::ZERO;
                continue;
            }

            let previous = body.position;
            let mut velocity = (body.velocity + forces[index] * alpha) * config.friction;
            let speed_sq = velocity.length_sq();
            if speed_sq > max_speed_sq {
                velocity *= config.max_speed / speed_sq.sqrt();
            } else if speed_sq < MIN_SLEEP_SPEED_SQ {
                velocity = Vec2::ZERO;
            }

            body.velocity = velocity;
            body.position += velocity;
            if config.containment {
                contain(body, self.bounds, config);
            }

            if !body.position.x.is_finite() || !body.position.y.is_finite() {
                body.position = previous;
                body.velocity = Vec2::ZERO;
                rollbacks += 1;
                continue;
            }
            delta += (body.position - previous).length_sq();
        }
        if rollbacks > 0 {
            warn!(rollbacks, "layout step produced non-finite positions, rolled back");
        }

        self.alpha = (self.alpha * (1.0 - config.alpha_decay)).max(config.alpha_min);
        let jolted = self.alpha < self.resume_alpha && delta > config.jolt_delta;
        if jolted {
            self.alpha = (self.alpha + config.jolt_alpha).min(config.max_alpha);
            self.resume_alpha *= JOLT_THRESHOLD_DECAY;
            debug!(alpha = self.alpha, resume_alpha = self.resume_alpha, delta, "layout jolted");
        }

        StepOutcome {
            delta,
            jolted,
            rollbacks,
        }
    }

    /// Moves overlapping circles apart before forces are integrated.
    fn resolve_collisions(&mut self) {
        if !self.config.collision || self.bodies.len() < 2 {
            return;
        }

        let scratch = &mut self.scratch;
        scratch.positions.clear();
        scratch.radii.clear();
        scratch.strengths.clear();
        for body in &self.bodies {
            scratch.positions.push(body.position);
            scratch.radii.push(body.radius);
            scratch.strengths.push(1.0);
        }
        scratch.shifts.clear();
        scratch.shifts.resize(self.bodies.len(), Vec2::ZERO);

        let Some(tree) = QuadTree::build(&scratch.positions, &scratch.strengths) else {
            return;
        };
        collision_shifts(
            &tree,
            &scratch.positions,
            &scratch.radii,
            self.config.collision_padding,
            &mut scratch.shifts,
        );

        for (body, shift) in self.bodies.iter_mut().zip(&scratch.shifts) {
            if !body.fixed && shift.x.is_finite() && shift.y.is_finite() {
                body.position += *shift;
            }
        }
    }
}

struct StepOutcome {
    delta: f32,
    jolted: bool,
    rollbacks: usize,
}

/// Outward nudge for weakly linked bodies. It cancels the inward gravity and
/// pushes past it by `low_degree_bias / max(2, degree)` of its strength.
fn periphery_bias(degree: usize, inward: Vec2, config: LayoutConfig) -> Vec2 {
    if degree >= config.low_degree_threshold || config.low_degree_bias <= 0.0 {
        return Vec2::ZERO;
    }
    let spread = config.low_degree_bias / (degree.max(2) as f32);
    -inward * (1.0 + spread)
}

/// Damped pull back inside the bounds instead of a hard clamp.
fn contain(body: &mut Body, bounds: Vec2, config: LayoutConfig) {
    if bounds.x <= 0.0 || bounds.y <= 0.0 {
        return;
    }

    let inset = (body.radius + config.containment_margin)
        .min(bounds.x * 0.5)
        .min(bounds.y * 0.5);
    let min = Vec2::splat(inset);
    let max = bounds - Vec2::splat(inset);
    let clamped = body.position.clamp(min, max);
    if clamped != body.position {
        body.position += (clamped - body.position) * config.containment_damping;
        body.velocity *= config.containment_damping;
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;

    use super::*;

    fn engine(config: LayoutConfig) -> ForceLayoutEngine {
        let mut engine = ForceLayoutEngine::new(config);
        engine.set_bounds(vec2(800.0, 600.0));
        engine
    }

    fn pair(distance: f32) -> (Vec<Body>, Vec<Spring>) {
        let bodies = vec![
            Body::new(vec2(400.0 - distance / 2.0, 300.0), 10.0, -100.0),
            Body::new(vec2(400.0 + distance / 2.0, 300.0), 10.0, -100.0),
        ];
        let springs = vec![Spring {
            from: 0,
            to: 1,
            distance: 50.0,
            strength: 1.0,
        }];
        (bodies, springs)
    }

    fn gap(engine: &ForceLayoutEngine) -> f32 {
        (engine.bodies()[0].position - engine.bodies()[1].position).length()
    }

    #[test]
    fn stretched_spring_contracts() {
        let mut engine = engine(LayoutConfig {
            gravity: 0.0,
            recenter_rate: 0.0,
            charge_softening: 1.0,
            ..LayoutConfig::default()
        });
        let (bodies, springs) = pair(300.0);
        engine.load(bodies, springs);
        engine.run_steps(50);
        assert!(gap(&engine) < 300.0);
    }

    #[test]
    fn fixed_bodies_do_not_move() {
        let mut engine = engine(LayoutConfig::default());
        let (bodies, springs) = pair(300.0);
        engine.load(bodies, springs);
        engine.drag(0, vec2(100.0, 100.0));
        engine.run_steps(20);
        assert_eq!(engine.bodies()[0].position, vec2(100.0, 100.0));
        assert!(engine.bodies()[0].fixed);
    }

    #[test]
    fn settled_engine_stays_put_until_reheated() {
        let mut engine = engine(LayoutConfig {
            settle_threshold: f32::MAX,
            ..LayoutConfig::default()
        });
        let (bodies, springs) = pair(50.0);
        engine.load(bodies, springs);

        let report = engine.run_steps(10);
        assert_eq!(report.steps, 1);
        assert!(report.settled);
        assert_eq!(engine.run_steps(10).steps, 0);

        engine.reheat();
        assert_eq!(engine.run_steps(10).steps, 1);
    }

    #[test]
    fn tick_respects_step_caps() {
        let mut engine = engine(LayoutConfig {
            settle_threshold: -1.0,
            ..LayoutConfig::default()
        });
        let (bodies, springs) = pair(300.0);
        engine.load(bodies, springs);
        let schedule = ScheduleConfig {
            tick_budget_ms: 10_000,
            max_steps_per_tick: 7,
            settled_steps_per_tick: 2,
        };
        assert_eq!(engine.tick(&schedule).steps, 7);
    }

    #[test]
    fn containment_pulls_bodies_back_inside() {
        let mut engine = engine(LayoutConfig {
            charge: 0.0,
            gravity: 0.0,
            recenter_rate: 0.0,
            ..LayoutConfig::default()
        });
        engine.load(vec![Body::new(vec2(-200.0, 300.0), 10.0, 0.0)], Vec::new());
        let before = engine.bodies()[0].position.x;
        engine.run_steps(5);
        assert!(engine.bodies()[0].position.x > before);
    }

    #[test]
    fn gravity_recenters_weighted_mass() {
        let mut engine = engine(LayoutConfig {
            collision: false,
            low_degree_bias: 0.0,
            ..LayoutConfig::default()
        });
        engine.load(
            vec![
                Body::new(vec2(100.0, 100.0), 5.0, 0.0),
                Body::new(vec2(120.0, 100.0), 5.0, 0.0),
            ],
            Vec::new(),
        );
        engine.run_steps(200);
        let mid = (engine.bodies()[0].position + engine.bodies()[1].position) * 0.5;
        assert!((mid - engine.center()).length() < (vec2(110.0, 100.0) - engine.center()).length());
    }

    #[test]
    fn weakly_linked_bodies_drift_outward() {
        let config = LayoutConfig::default();
        let inward = vec2(3.0, -4.0);

        let leaf = inward + periphery_bias(1, inward, config);
        assert!(leaf.dot(inward) < 0.0, "a leaf must be pushed away from the center");
        let pair_end = inward + periphery_bias(2, inward, config);
        assert!((pair_end + inward * (config.low_degree_bias / 2.0)).length() < 1e-4);

        let hub = periphery_bias(config.low_degree_threshold, inward, config);
        assert_eq!(hub, Vec2::ZERO);
    }

    #[test]
    fn large_late_motion_jolts_alpha_and_lowers_threshold() {
        let mut engine = engine(LayoutConfig {
            alpha_start: 0.01,
            resume_alpha: 0.02,
            jolt_delta: 0.0,
            settle_threshold: -1.0,
            ..LayoutConfig::default()
        });
        let (bodies, springs) = pair(300.0);
        engine.load(bodies, springs);

        let report = engine.run_steps(1);
        assert_eq!(report.jolts, 1);
        assert!(engine.alpha() <= LayoutConfig::default().max_alpha);
        assert!(engine.resume_alpha < 0.02);
    }

    #[test]
    fn non_finite_step_is_rolled_back() {
        let mut engine = engine(LayoutConfig {
            containment: false,
            collision: false,
            ..LayoutConfig::default()
        });
        let mut body = Body::new(vec2(10.0, 10.0), 5.0, 0.0);
        body.velocity = vec2(f32::NAN, 0.0);
        engine.load(vec![body, Body::new(vec2(50.0, 50.0), 5.0, 0.0)], Vec::new());

        let report = engine.run_steps(1);
        assert_eq!(report.rollbacks, 1);
        assert_eq!(engine.bodies()[0].position, vec2(10.0, 10.0));
        assert!(engine.run_steps(1).rollbacks == 0);
    }
}
