use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2};

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    base.lerp_to_gamma(overlay, amount.clamp(0.0, 1.0))
}

pub(super) fn with_alpha(color: Color32, alpha: u8) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), alpha)
}

/// `#RGB` or `#RRGGBB`, case-insensitive.
pub(super) fn parse_color(text: &str) -> Option<Color32> {
    let hex = text.trim().strip_prefix('#')?;
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
    match hex.len() {
        6 => Some(Color32::from_rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        3 => {
            let short = |index: usize| channel(index..index + 1).map(|value| value * 17);
            Some(Color32::from_rgb(short(0)?, short(1)?, short(2)?))
        }
        _ => None,
    }
}

pub(super) fn color_or(text: &str, fallback: Color32) -> Color32 {
    parse_color(text).unwrap_or(fallback)
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, origin: Pos2, zoom: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(246, 247, 249));

    let step = (56.0 * zoom.clamp(0.6, 1.8)).max(20.0);
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(180, 186, 196, 60));

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += step;
    }
}

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    rect.intersects(Rect::from_center_size(position, Vec2::splat(radius * 2.0)))
}

/// Bounding-box test per segment; a few off-screen diagonals are painted.
pub(super) fn path_visible(rect: Rect, path: &[Pos2], padding: f32) -> bool {
    path.windows(2).any(|segment| {
        Rect::from_two_pos(segment[0], segment[1])
            .expand(padding)
            .intersects(rect)
    })
}

/// Shortest distance from `point` to any segment of `path`.
pub(super) fn distance_to_path(point: Pos2, path: &[Pos2]) -> f32 {
    path.windows(2)
        .map(|segment| distance_to_segment(point, segment[0], segment[1]))
        .fold(f32::INFINITY, f32::min)
}

fn distance_to_segment(point: Pos2, start: Pos2, end: Pos2) -> f32 {
    let along: Vec2 = end - start;
    let length_sq = along.length_sq();
    if length_sq <= f32::EPSILON {
        return point.distance(start);
    }
    let t = ((point - start).dot(along) / length_sq).clamp(0.0, 1.0);
    point.distance(start + along * t)
}

/// Point halfway along the path by arc length.
pub(super) fn path_midpoint(path: &[Pos2]) -> Option<Pos2> {
    let total = path
        .windows(2)
        .map(|segment| segment[0].distance(segment[1]))
        .sum::<f32>();
    let mut remaining = total * 0.5;
    for segment in path.windows(2) {
        let length = segment[0].distance(segment[1]);
        if length >= remaining && length > 0.0 {
            return Some(segment[0] + (segment[1] - segment[0]) * (remaining / length));
        }
        remaining -= length;
    }
    path.first().copied()
}

#[cfg(test)]
mod tests {
    use eframe::egui::pos2;

    use super::*;

    #[test]
    fn parses_long_and_short_hex_colors() {
        assert_eq!(parse_color("#FFE081"), Some(Color32::from_rgb(255, 224, 129)));
        assert_eq!(parse_color("#fff"), Some(Color32::WHITE));
        assert_eq!(parse_color("red"), None);
        assert_eq!(parse_color("#12"), None);
    }

    #[test]
    fn culls_shapes_outside_the_canvas() {
        let rect = Rect::from_min_size(pos2(0.0, 0.0), Vec2::splat(100.0));
        assert!(circle_visible(rect, pos2(-5.0, 50.0), 10.0));
        assert!(!circle_visible(rect, pos2(-20.0, 50.0), 10.0));
        assert!(path_visible(rect, &[pos2(-50.0, 50.0), pos2(150.0, 50.0)], 0.0));
        assert!(!path_visible(rect, &[pos2(-50.0, -50.0), pos2(-10.0, -60.0)], 2.0));
    }

    #[test]
    fn distance_and_midpoint_follow_the_polyline() {
        let path = [pos2(0.0, 0.0), pos2(10.0, 0.0), pos2(10.0, 10.0)];
        assert_eq!(distance_to_path(pos2(5.0, 3.0), &path), 3.0);
        assert_eq!(path_midpoint(&path), Some(pos2(10.0, 0.0)));
    }
}
