use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cluster::ExpansionState;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VizConfig {
    /// Node property whose value becomes the node's group key.
    pub group_property: String,
    pub clustering: bool,
    /// Groups with fewer external links than this skip the partially expanded state.
    pub expansion_threshold: usize,
    pub initial_expansion: ExpansionState,
    pub show_group_marks: bool,
    pub group_mark_scale: f32,
    pub zoom: ZoomConfig,
    pub layout: LayoutConfig,
    pub helper_layout: LayoutConfig,
    pub schedule: ScheduleConfig,
    /// Cap on enumerated solutions per conditional style formula.
    pub max_solutions: usize,
    pub initial_node_display: usize,
    pub max_neighbours: usize,
}

impl Default for VizConfig {
    fn default() -> Self {
        Self {
            group_property: "filename".to_owned(),
            clustering: true,
            expansion_threshold: 2,
            initial_expansion: ExpansionState::Collapsed,
            show_group_marks: false,
            group_mark_scale: 1.15,
            zoom: ZoomConfig::default(),
            layout: LayoutConfig::default(),
            helper_layout: LayoutConfig::helper(),
            schedule: ScheduleConfig::default(),
            max_solutions: 1024,
            initial_node_display: 300,
            max_neighbours: 100,
        }
    }
}

impl VizConfig {
    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("invalid config JSON in {}", path.display()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub min_scale: f32,
    pub max_scale: f32,
    pub zoom_in_factor: f32,
    pub zoom_out_factor: f32,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.2,
            max_scale: 1.0,
            zoom_in_factor: 1.2,
            zoom_out_factor: 0.8,
        }
    }
}

/// Force parameters shared by the primary and the helper simulation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub link_distance: f32,
    pub cross_group_distance: f32,
    pub same_group_strength: f32,
    pub cross_group_strength: f32,
    pub charge: f32,
    pub group_charge: f32,
    pub charge_softening: f32,
    pub gravity: f32,
    pub recenter_rate: f32,
    pub friction: f32,
    pub max_speed: f32,
    pub low_degree_threshold: usize,
    pub low_degree_bias: f32,
    pub containment: bool,
    pub containment_margin: f32,
    pub containment_damping: f32,
    pub collision: bool,
    pub collision_padding: f32,
    pub alpha_start: f32,
    pub alpha_decay: f32,
    pub alpha_min: f32,
    pub settle_threshold: f32,
    pub resume_alpha: f32,
    pub jolt_delta: f32,
    pub jolt_alpha: f32,
    pub max_alpha: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            link_distance: 20.0,
            cross_group_distance: 80.0,
            same_group_strength: 0.2,
            cross_group_strength: 1.0,
            charge: -1000.0,
            group_charge: -1800.0,
            charge_softening: 36.0,
            gravity: 0.1,
            recenter_rate: 0.05,
            friction: 0.9,
            max_speed: 40.0,
            low_degree_threshold: 3,
            low_degree_bias: 0.8,
            containment: true,
            containment_margin: 8.0,
            containment_damping: 0.5,
            collision: true,
            collision_padding: 4.0,
            alpha_start: 0.1,
            alpha_decay: 0.01,
            alpha_min: 0.005,
            settle_threshold: 0.05,
            resume_alpha: 0.02,
            jolt_delta: 25.0,
            jolt_alpha: 0.05,
            max_alpha: 0.1,
        }
    }
}

impl LayoutConfig {
    /// Profile for the helper simulation: weak gravity, mild charge, unbounded.
    pub fn helper() -> Self {
        Self {
            link_distance: 8.0,
            cross_group_distance: 8.0,
            same_group_strength: 0.8,
            cross_group_strength: 0.8,
            charge: -60.0,
            group_charge: -60.0,
            charge_softening: 16.0,
            gravity: 0.01,
            recenter_rate: 0.0,
            low_degree_bias: 0.0,
            containment: false,
            collision: false,
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub tick_budget_ms: u64,
    pub max_steps_per_tick: usize,
    pub settled_steps_per_tick: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tick_budget_ms: 16,
            max_steps_per_tick: 100,
            settled_steps_per_tick: 2,
        }
    }
}

impl ScheduleConfig {
    pub fn tick_budget(&self) -> Duration {
        Duration::from_millis(self.tick_budget_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = VizConfig::from_json_str(
            r#"{ "group_property": "module", "layout": { "charge": -500.0 } }"#,
        )
        .expect("valid config");

        assert_eq!(config.group_property, "module");
        assert_eq!(config.layout.charge, -500.0);
        assert_eq!(config.layout.link_distance, 20.0);
        assert_eq!(config.expansion_threshold, 2);
        assert_eq!(config.max_neighbours, 100);
        assert!(!config.helper_layout.containment);
    }

    #[test]
    fn expansion_state_uses_snake_case_names() {
        let config =
            VizConfig::from_json_str(r#"{ "initial_expansion": "fully_expanded" }"#).expect("valid");
        assert_eq!(config.initial_expansion, ExpansionState::FullyExpanded);
    }
}
