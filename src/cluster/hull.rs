use eframe::egui::Vec2;

/// Convex hull in counter-clockwise order (monotone chain). Collinear points
/// are dropped; fewer than three distinct points come back as-is.
pub fn convex_hull(points: &[Vec2]) -> Vec<Vec2> {
    let mut sorted = points
        .iter()
        .copied()
        .filter(|point| point.x.is_finite() && point.y.is_finite())
        .collect::<Vec<_>>();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let reversed = sorted.iter().rev().copied().collect::<Vec<_>>();
    let mut hull: Vec<Vec2> = Vec::with_capacity(sorted.len() * 2);
    for pass in [&sorted[..], &reversed[..]] {
        let floor = hull.len();
        for &point in pass {
            while hull.len() >= floor + 2
                && cross(hull[hull.len() - 2], hull[hull.len() - 1], point) <= 0.0
            {
                hull.pop();
            }
            hull.push(point);
        }
        hull.pop();
    }
    hull
}

fn cross(origin: Vec2, a: Vec2, b: Vec2) -> f64 {
    let (ox, oy) = (f64::from(origin.x), f64::from(origin.y));
    (f64::from(a.x) - ox) * (f64::from(b.y) - oy) - (f64::from(a.y) - oy) * (f64::from(b.x) - ox)
}

/// Area centroid of a simple polygon, falling back to the vertex mean for
/// degenerate input.
pub fn polygon_centroid(polygon: &[Vec2]) -> Option<Vec2> {
    if polygon.is_empty() {
        return None;
    }

    let mut area = 0.0;
    let mut weighted = Vec2::ZERO;
    for (index, &a) in polygon.iter().enumerate() {
        let b = polygon[(index + 1) % polygon.len()];
        let step = a.x * b.y - b.x * a.y;
        area += step;
        weighted += (a + b) * step;
    }

    if area.abs() <= f32::EPSILON {
        return crate::util::centroid(polygon.iter().copied());
    }
    Some(weighted / (3.0 * area))
}

/// Scales `polygon` about its centroid.
pub fn scale_polygon(polygon: &[Vec2], factor: f32) -> Vec<Vec2> {
    let Some(center) = polygon_centroid(polygon) else {
        return Vec::new();
    };
    polygon
        .iter()
        .map(|&point| center + (point - center) * factor)
        .collect()
}

/// Point-in-convex-polygon test with a small tolerance for points on edges.
pub fn contains(polygon: &[Vec2], point: Vec2) -> bool {
    const TOLERANCE: f32 = 1e-2;

    match polygon {
        [] => false,
        [only] => (*only - point).length() <= TOLERANCE,
        [a, b] => {
            let segment = *b - *a;
            let t = ((point - *a).dot(segment) / segment.length_sq().max(f32::EPSILON))
                .clamp(0.0, 1.0);
            (*a + segment * t - point).length() <= TOLERANCE
        }
        _ => polygon.iter().enumerate().all(|(index, &a)| {
            let b = polygon[(index + 1) % polygon.len()];
            let edge = f64::from((b - a).length().max(f32::EPSILON));
            cross(a, b, point) / edge >= -f64::from(TOLERANCE)
        }),
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn square_hull_drops_interior_points() {
        let hull = convex_hull(&[
            vec2(0.0, 0.0),
            vec2(10.0, 0.0),
            vec2(5.0, 5.0),
            vec2(10.0, 10.0),
            vec2(0.0, 10.0),
            vec2(5.0, 0.0),
        ]);
        assert_eq!(hull.len(), 4);
        assert!(contains(&hull, vec2(5.0, 5.0)));
        assert!(contains(&hull, vec2(5.0, 0.0)));
        assert!(!contains(&hull, vec2(11.0, 5.0)));
        assert_eq!(polygon_centroid(&hull), Some(vec2(5.0, 5.0)));
    }

    #[test]
    fn scaling_about_centroid_grows_outward() {
        let hull = convex_hull(&[vec2(0.0, 0.0), vec2(2.0, 0.0), vec2(0.0, 2.0), vec2(2.0, 2.0)]);
        let scaled = scale_polygon(&hull, 2.0);
        assert!(scaled.contains(&vec2(-1.0, -1.0)));
        assert!(scaled.contains(&vec2(3.0, 3.0)));
    }

    #[test]
    fn collinear_points_reduce_to_segment() {
        let hull = convex_hull(&[vec2(0.0, 0.0), vec2(1.0, 1.0), vec2(2.0, 2.0)]);
        assert_eq!(hull.len(), 2);
        assert!(contains(&hull, vec2(1.0, 1.0)));
    }

    proptest! {
        #[test]
        fn prop_scaled_hull_contains_every_point(
            points in prop::collection::vec((-500.0f32..500.0, -500.0f32..500.0), 3..40),
            factor in 1.0f32..1.5,
        ) {
            let points = points.into_iter().map(|(x, y)| vec2(x, y)).collect::<Vec<_>>();
            let hull = scale_polygon(&convex_hull(&points), factor);
            for point in &points {
                prop_assert!(contains(&hull, *point), "{point:?} outside {hull:?}");
            }
        }
    }
}
