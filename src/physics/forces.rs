use eframe::egui::{Vec2, vec2};

use super::quadtree::QuadTree;

/// Adds the Barnes-Hut charge on every body to `forces`.
pub(super) fn apply_charge(
    tree: &QuadTree,
    positions: &[Vec2],
    weights: &[f32],
    theta: f32,
    softening: f32,
    forces: &mut [Vec2],
) {
    for (index, force) in forces.iter_mut().enumerate() {
        *force += tree.charge_at(index, positions, weights, theta, softening);
    }
}

/// Per-body displacement that resolves circle overlaps. Each overlapping pair
/// is split evenly between its two bodies.
pub(super) fn collision_shifts(
    tree: &QuadTree,
    positions: &[Vec2],
    radii: &[f32],
    padding: f32,
    shifts: &mut [Vec2],
) {
    let widest = radii.iter().copied().fold(0.0_f32, f32::max);
    for (index, &position) in positions.iter().enumerate() {
        let reach = radii[index] + widest + padding;
        tree.near(position, reach, |other| {
            if other <= index {
                return;
            }
            let gap = radii[index] + radii[other] + padding;
            if let Some(push) = overlap_push(position, positions[other], gap, index, other) {
                shifts[index] += push;
                shifts[other] -= push;
            }
        });
    }
}

fn overlap_push(from: Vec2, to: Vec2, gap: f32, a: usize, b: usize) -> Option<Vec2> {
    let delta = from - to;
    let distance = delta.length();
    if distance >= gap {
        return None;
    }

    let direction = if distance > 0.0001 {
        delta / distance
    } else {
        // Coincident bodies: spread by index so pairs do not all stack up.
        let angle = ((a as f32) * 0.618_034 + (b as f32) * 0.414_214) * std::f32::consts::TAU;
        vec2(angle.cos(), angle.sin())
    };
    Some(direction * ((gap - distance) * 0.5))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_pushes_bodies_apart() {
        let positions = [vec2(0.0, 0.0), vec2(10.0, 0.0)];
        let weights = [100.0, 100.0];
        let tree = QuadTree::build(&positions, &weights).expect("finite");

        let mut forces = [Vec2::ZERO; 2];
        apply_charge(&tree, &positions, &weights, 0.72, 1.0, &mut forces);
        assert!(forces[0].x < 0.0);
        assert!(forces[1].x > 0.0);
        assert_eq!(forces[0].y, 0.0);
    }

    #[test]
    fn overlapping_circles_get_opposite_shifts() {
        let positions = [vec2(0.0, 0.0), vec2(4.0, 0.0), vec2(100.0, 0.0)];
        let radii = [5.0, 5.0, 5.0];
        let tree = QuadTree::build(&positions, &[1.0; 3]).expect("finite");
        let mut shifts = vec![Vec2::ZERO; 3];
        collision_shifts(&tree, &positions, &radii, 0.0, &mut shifts);

        assert_eq!(shifts[0], vec2(-3.0, 0.0));
        assert_eq!(shifts[1], vec2(3.0, 0.0));
        assert_eq!(shifts[2], Vec2::ZERO);
    }
}
