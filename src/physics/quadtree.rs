//! Arena-backed Barnes-Hut tree over body positions.

use eframe::egui::{Vec2, vec2};

const LEAF_CAPACITY: usize = 8;
const MAX_DEPTH: usize = 12;
const NO_CHILD: u32 = u32::MAX;

/// Axis-aligned square cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct Square {
    pub(super) center: Vec2,
    pub(super) half: f32,
}

impl Square {
    fn enclosing(points: &[Vec2]) -> Option<Self> {
        let (min, max) = points.iter().fold(
            (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
            |(min, max), point| (min.min(*point), max.max(*point)),
        );
        if !(min.x.is_finite() && min.y.is_finite() && max.x.is_finite() && max.y.is_finite()) {
            return None;
        }

        let span = (max - min).max_elem().max(1.0);
        Some(Self {
            center: (min + max) * 0.5,
            half: span * 0.5 + 1.0,
        })
    }

    fn quarter(self, slot: usize) -> Self {
        let half = self.half * 0.5;
        let sign = |bit: usize| if slot & bit == 0 { -1.0 } else { 1.0 };
        Self {
            center: self.center + vec2(sign(1) * half, sign(2) * half),
            half,
        }
    }

    fn slot_of(self, point: Vec2) -> usize {
        usize::from(point.x >= self.center.x) | (usize::from(point.y >= self.center.y) << 1)
    }

    fn holds(self, point: Vec2) -> bool {
        (point - self.center).abs().max_elem() <= self.half
    }

    /// Squared distance from `point` to this square grown by `reach`.
    fn gap_sq(self, point: Vec2, reach: f32) -> f32 {
        let gap = ((point - self.center).abs() - Vec2::splat(self.half + reach)).max(Vec2::ZERO);
        gap.length_sq()
    }
}

#[derive(Debug)]
struct Cell {
    square: Square,
    /// Weight-averaged position of the bodies below.
    mass_center: Vec2,
    weight: f32,
    count: usize,
    children: [u32; 4],
    /// Range into `QuadTree::order` covered by this cell.
    start: usize,
    end: usize,
}

impl Cell {
    fn is_leaf(&self) -> bool {
        self.children.iter().all(|&child| child == NO_CHILD)
    }

    fn child_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.children.iter().copied().filter(|&child| child != NO_CHILD)
    }
}

/// Cells live in one arena in depth-first order; `order` is the body index
/// list partitioned so every cell covers a contiguous range.
#[derive(Debug)]
pub(super) struct QuadTree {
    cells: Vec<Cell>,
    order: Vec<usize>,
}

impl QuadTree {
    pub(super) fn build(positions: &[Vec2], weights: &[f32]) -> Option<Self> {
        let square = Square::enclosing(positions)?;
        let mut tree = Self {
            cells: Vec::with_capacity(positions.len() / 2 + 1),
            order: (0..positions.len()).collect(),
        };
        tree.insert_cell(square, 0, positions.len(), positions, weights, 0);
        Some(tree)
    }

    fn insert_cell(
        &mut self,
        square: Square,
        start: usize,
        end: usize,
        positions: &[Vec2],
        weights: &[f32],
        depth: usize,
    ) -> u32 {
        let members = &self.order[start..end];
        let weight: f32 = members.iter().map(|&index| weights[index].abs()).sum();
        let mass_center = if weight > 0.0 {
            members
                .iter()
                .map(|&index| positions[index] * weights[index].abs())
                .fold(Vec2::ZERO, |sum, point| sum + point)
                / weight
        } else if members.is_empty() {
            square.center
        } else {
            members
                .iter()
                .fold(Vec2::ZERO, |sum, &index| sum + positions[index])
                / members.len() as f32
        };

        let id = self.cells.len() as u32;
        self.cells.push(Cell {
            square,
            mass_center,
            weight,
            count: end - start,
            children: [NO_CHILD; 4],
            start,
            end,
        });

        if depth >= MAX_DEPTH || end - start <= LEAF_CAPACITY {
            return id;
        }

        // Partition this cell's slice of `order` by quadrant.
        self.order[start..end].sort_by_key(|&index| square.slot_of(positions[index]));
        let mut bounds = [start; 5];
        for slot in 0..4 {
            let from = bounds[slot];
            let len = self.order[from..end]
                .iter()
                .take_while(|&&index| square.slot_of(positions[index]) == slot)
                .count();
            bounds[slot + 1] = from + len;
        }
        if (0..4).filter(|&slot| bounds[slot + 1] > bounds[slot]).count() <= 1 {
            return id;
        }

        for slot in 0..4 {
            if bounds[slot + 1] == bounds[slot] {
                continue;
            }
            let child = self.insert_cell(
                square.quarter(slot),
                bounds[slot],
                bounds[slot + 1],
                positions,
                weights,
                depth + 1,
            );
            self.cells[id as usize].children[slot] = child;
        }
        id
    }

    /// Summed repulsion on body `index` from every other body, approximating
    /// distant cells by their weighted center.
    pub(super) fn charge_at(
        &self,
        index: usize,
        positions: &[Vec2],
        weights: &[f32],
        theta: f32,
        softening: f32,
    ) -> Vec2 {
        let point = positions[index];
        let mut force = Vec2::ZERO;
        let mut stack = vec![0u32];

        while let Some(id) = stack.pop() {
            let cell = &self.cells[id as usize];
            if cell.weight <= 0.0 || cell.count == 0 {
                continue;
            }

            if cell.is_leaf() {
                for &other in &self.order[cell.start..cell.end] {
                    if other != index {
                        force += repel(point, positions[other], weights[other].abs(), softening);
                    }
                }
                continue;
            }

            let distance = (point - cell.mass_center).length().max(0.01);
            let far = !cell.square.holds(point) && cell.square.half * 2.0 / distance < theta;
            if far {
                force += repel(point, cell.mass_center, cell.weight, softening);
            } else {
                stack.extend(cell.child_ids());
            }
        }

        force
    }

    /// Calls `visit(other)` for every body whose cell lies within `reach` of
    /// `point`. Bodies may be reported that are further than `reach`.
    pub(super) fn near(&self, point: Vec2, reach: f32, mut visit: impl FnMut(usize)) {
        let mut stack = vec![0u32];
        while let Some(id) = stack.pop() {
            let cell = &self.cells[id as usize];
            if cell.count == 0 || cell.square.gap_sq(point, reach) > 0.0 {
                continue;
            }
            if cell.is_leaf() {
                self.order[cell.start..cell.end].iter().for_each(|&other| visit(other));
            } else {
                stack.extend(cell.child_ids());
            }
        }
    }

    #[cfg(test)]
    fn root(&self) -> &Cell {
        &self.cells[0]
    }
}

/// Push of magnitude ~`strength / distance`, softened near zero.
pub(super) fn repel(point: Vec2, source: Vec2, strength: f32, softening: f32) -> Vec2 {
    let delta = point - source;
    let distance_sq = delta.length_sq();
    let distance = distance_sq.sqrt();
    let direction = if distance > 0.0001 {
        delta / distance
    } else {
        vec2(1.0, 0.0)
    };
    direction * (strength * distance.max(1.0) / (distance_sq + softening))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(count: usize) -> Vec<Vec2> {
        (0..count)
            .map(|index| vec2((index % 8) as f32 * 10.0, (index / 8) as f32 * 10.0))
            .collect()
    }

    #[test]
    fn crowded_root_splits_and_tracks_weight() {
        let positions = grid(40);
        let mut weights = vec![1.0; positions.len()];
        weights[0] = 0.0;

        let tree = QuadTree::build(&positions, &weights).expect("finite points");
        assert!(!tree.root().is_leaf());
        assert_eq!(tree.root().count, 40);
        assert_eq!(tree.root().weight, 39.0);

        let mut order = tree.order.clone();
        order.sort_unstable();
        assert_eq!(order, (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn non_finite_or_empty_input_builds_nothing() {
        assert!(QuadTree::build(&[vec2(f32::NAN, 0.0)], &[1.0]).is_none());
        assert!(QuadTree::build(&[], &[]).is_none());
    }

    #[test]
    fn approximation_stays_close_to_the_exact_sum() {
        let positions = grid(64);
        let weights = vec![30.0; positions.len()];
        let tree = QuadTree::build(&positions, &weights).expect("finite points");

        let approx = tree.charge_at(0, &positions, &weights, 0.7, 1.0);
        let exact = positions[1..]
            .iter()
            .fold(Vec2::ZERO, |sum, other| sum + repel(positions[0], *other, 30.0, 1.0));
        assert!((approx - exact).length() < exact.length() * 0.15);
        assert!(approx.x < 0.0 && approx.y < 0.0);
    }

    #[test]
    fn near_reports_every_body_in_reach() {
        let positions = grid(64);
        let tree = QuadTree::build(&positions, &vec![1.0; 64]).expect("finite points");

        let mut seen = Vec::new();
        tree.near(vec2(35.0, 35.0), 8.0, |other| seen.push(other));
        for (index, position) in positions.iter().enumerate() {
            if (*position - vec2(35.0, 35.0)).length() <= 8.0 {
                assert!(seen.contains(&index), "missing body {index}");
            }
        }
    }
}
