use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use eframe::egui::{Vec2, vec2};

pub fn stable_pair(id: &str) -> (f32, f32) {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let hash = hasher.finish();

    let x = ((hash & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    let y = (((hash >> 32) & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    ((x * 2.0) - 1.0, (y * 2.0) - 1.0)
}

/// Deterministic offset in `[-amount, amount]` on both axes.
pub fn stable_jitter(id: &str, amount: f32) -> Vec2 {
    let (jx, jy) = stable_pair(id);
    vec2(jx * amount, jy * amount)
}

pub fn round_to_hundredths(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

pub fn centroid(points: impl IntoIterator<Item = Vec2>) -> Option<Vec2> {
    let mut sum = Vec2::ZERO;
    let mut count = 0usize;
    for point in points {
        sum += point;
        count += 1;
    }
    (count > 0).then(|| sum / count as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_pair_is_deterministic_and_bounded() {
        let first = stable_pair("node-42");
        let second = stable_pair("node-42");
        assert_eq!(first, second);
        assert!((-1.0..=1.0).contains(&first.0));
        assert!((-1.0..=1.0).contains(&first.1));
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round_to_hundredths(0.8 * 0.8 * 0.8), 0.51);
        assert_eq!(round_to_hundredths(1.2), 1.2);
    }

    #[test]
    fn centroid_of_nothing_is_none() {
        assert!(centroid(Vec::new()).is_none());
        assert_eq!(
            centroid([vec2(0.0, 0.0), vec2(2.0, 4.0)]),
            Some(vec2(1.0, 2.0))
        );
    }
}
