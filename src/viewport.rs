use eframe::egui::{Pos2, Rect, Vec2};
use serde::Serialize;

use crate::config::ZoomConfig;
use crate::util::round_to_hundredths;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ZoomLimits {
    pub zoom_in_limit_reached: bool,
    pub zoom_out_limit_reached: bool,
}

/// Pan/zoom state of the canvas. World coordinates span `[0, size]`, and the
/// world center maps onto the canvas center when `pan` is zero.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    size: Vec2,
    pan: Vec2,
    zoom: f32,
    config: ZoomConfig,
}

impl Viewport {
    pub fn new(config: ZoomConfig) -> Self {
        Self {
            size: Vec2::ZERO,
            pan: Vec2::ZERO,
            zoom: config.max_scale,
            config,
        }
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    /// Returns true when the measured size differs from the previous one.
    pub fn set_size(&mut self, size: Vec2) -> bool {
        if self.size == size {
            return false;
        }
        self.size = size;
        true
    }

    pub fn pan(&self) -> Vec2 {
        self.pan
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    pub fn reset(&mut self) {
        self.pan = Vec2::ZERO;
        self.zoom = self.config.max_scale;
    }

    pub fn zoom_in(&mut self) -> ZoomLimits {
        let level = round_to_hundredths(self.zoom * self.config.zoom_in_factor);
        if level >= self.config.max_scale {
            self.zoom = self.config.max_scale;
            return ZoomLimits {
                zoom_in_limit_reached: true,
                zoom_out_limit_reached: false,
            };
        }
        self.zoom = level;
        ZoomLimits::default()
    }

    pub fn zoom_out(&mut self) -> ZoomLimits {
        let level = round_to_hundredths(self.zoom * self.config.zoom_out_factor);
        if level <= self.config.min_scale {
            self.zoom = self.config.min_scale;
            return ZoomLimits {
                zoom_in_limit_reached: false,
                zoom_out_limit_reached: true,
            };
        }
        self.zoom = level;
        ZoomLimits::default()
    }

    /// Limits as they stand now, used to enable or disable zoom buttons.
    pub fn limits(&self) -> ZoomLimits {
        ZoomLimits {
            zoom_in_limit_reached: self.zoom >= self.config.max_scale,
            zoom_out_limit_reached: self.zoom <= self.config.min_scale,
        }
    }

    /// Wheel zoom that keeps the world point under `pointer` fixed on screen.
    pub fn zoom_about(&mut self, rect: Rect, pointer: Pos2, scroll: f32) {
        let world_before = self.screen_to_world(rect, pointer) - self.size * 0.5;
        let factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
        self.zoom = (self.zoom * factor).clamp(self.config.min_scale, self.config.max_scale);
        self.pan = pointer - rect.center() - (world_before * self.zoom);
    }

    pub fn world_to_screen(&self, rect: Rect, world: Vec2) -> Pos2 {
        rect.center() + self.pan + (world - self.size * 0.5) * self.zoom
    }

    pub fn screen_to_world(&self, rect: Rect, screen: Pos2) -> Vec2 {
        (screen - rect.center() - self.pan) / self.zoom + self.size * 0.5
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ZoomConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::{pos2, vec2};

    use super::*;

    fn rect() -> Rect {
        Rect::from_min_size(Pos2::ZERO, vec2(800.0, 600.0))
    }

    #[test]
    fn zoom_out_walks_down_to_the_lower_extent() {
        let mut viewport = Viewport::default();
        let mut levels = Vec::new();
        loop {
            let limits = viewport.zoom_out();
            levels.push(viewport.zoom());
            if limits.zoom_out_limit_reached {
                break;
            }
        }
        assert_eq!(levels, vec![0.8, 0.64, 0.51, 0.41, 0.33, 0.26, 0.21, 0.2]);
        assert!(viewport.limits().zoom_out_limit_reached);
        assert!(!viewport.limits().zoom_in_limit_reached);
    }

    #[test]
    fn zoom_in_at_the_upper_extent_reports_the_limit() {
        let mut viewport = Viewport::default();
        let limits = viewport.zoom_in();
        assert!(limits.zoom_in_limit_reached);
        assert_eq!(viewport.zoom(), 1.0);

        viewport.zoom_out();
        assert_eq!(viewport.zoom_in(), ZoomLimits::default());
        assert_eq!(viewport.zoom(), 0.96);
    }

    #[test]
    fn world_center_maps_to_canvas_center() {
        let mut viewport = Viewport::default();
        viewport.set_size(vec2(800.0, 600.0));
        assert_eq!(
            viewport.world_to_screen(rect(), vec2(400.0, 300.0)),
            pos2(400.0, 300.0)
        );

        viewport.zoom_out();
        viewport.pan_by(vec2(10.0, -5.0));
        let screen = viewport.world_to_screen(rect(), vec2(120.0, 80.0));
        let back = viewport.screen_to_world(rect(), screen);
        assert!((back - vec2(120.0, 80.0)).length() < 1e-3);
    }

    #[test]
    fn wheel_zoom_keeps_point_under_pointer() {
        let mut viewport = Viewport::default();
        viewport.set_size(vec2(800.0, 600.0));
        viewport.zoom_out();
        viewport.zoom_out();

        let pointer = pos2(620.0, 140.0);
        let before = viewport.screen_to_world(rect(), pointer);
        viewport.zoom_about(rect(), pointer, 60.0);
        let after = viewport.screen_to_world(rect(), pointer);

        assert!(viewport.zoom() > 0.64);
        assert!((before - after).length() < 1e-2);
    }

    #[test]
    fn set_size_reports_changes_only() {
        let mut viewport = Viewport::default();
        assert!(viewport.set_size(vec2(10.0, 10.0)));
        assert!(!viewport.set_size(vec2(10.0, 10.0)));
    }
}
