use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Common bounds metadata so limits live in one place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingRange {
    pub min: f64,
    pub max: f64,
}

impl SettingRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            self.min
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

// Simulation ranges
pub const ENERGY_DECAY_RANGE: SettingRange = SettingRange::new(0.001, 0.5);
pub const DRAG_ENERGY_RANGE: SettingRange = SettingRange::new(0.0, 1.0);
pub const TARGET_STRENGTH_RANGE: SettingRange = SettingRange::new(0.0, 1.0);
pub const LINK_DISTANCE_RANGE: SettingRange = SettingRange::new(1.0, 2000.0);
pub const DAMPING_RANGE: SettingRange = SettingRange::new(0.0, 1.0);

// Placement ranges
pub const MARGIN_RANGE: SettingRange = SettingRange::new(0.0, 1000.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 40.0,
            bottom: 40.0,
            left: 60.0,
            right: 60.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

/// Parameters handed to the physics engine plus the constraints the
/// layout engine applies on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub force_charge: f32,
    pub force_spring: f32,
    pub force_max: f32,
    pub node_speed: f32,
    pub damping_factor: f32,
    pub node_mass: f32,
    /// Rest length of the link spring.
    pub link_distance: f64,
    /// Per-axis pull towards the placed target, scaled by energy.
    pub target_strength: f64,
    /// Fraction of energy lost per step while settling.
    pub energy_decay: f64,
    /// Energy below which settling ends early.
    pub min_energy: f64,
    /// Energy held while a node is being dragged.
    pub drag_energy: f64,
    pub settle_window_ms: u64,
}

impl SimulationSettings {
    pub fn settle_window(&self) -> Duration {
        Duration::from_millis(self.settle_window_ms)
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            force_charge: 150.0,
            force_spring: 0.05,
            force_max: 100.0,
            node_speed: 3000.0,
            damping_factor: 0.9,
            node_mass: 10.0,
            link_distance: 120.0,
            target_strength: 1.0,
            energy_decay: 0.0228,
            min_energy: 0.001,
            drag_energy: 0.3,
            settle_window_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    pub margins: Margins,
    pub viewport: Viewport,
    pub simulation: SimulationSettings,
}

impl LayoutSettings {
    /// Clamp every field into its supported range.
    pub fn sanitized(mut self) -> Self {
        let m = &mut self.margins;
        m.top = MARGIN_RANGE.clamp(m.top);
        m.bottom = MARGIN_RANGE.clamp(m.bottom);
        m.left = MARGIN_RANGE.clamp(m.left);
        m.right = MARGIN_RANGE.clamp(m.right);

        let s = &mut self.simulation;
        s.energy_decay = ENERGY_DECAY_RANGE.clamp(s.energy_decay);
        s.drag_energy = DRAG_ENERGY_RANGE.clamp(s.drag_energy);
        s.target_strength = TARGET_STRENGTH_RANGE.clamp(s.target_strength);
        s.link_distance = LINK_DISTANCE_RANGE.clamp(s.link_distance);
        s.damping_factor = DAMPING_RANGE.clamp(s.damping_factor as f64) as f32;
        s.min_energy = s.min_energy.max(0.0);
        s.node_mass = s.node_mass.max(0.1);

        self.viewport.width = self.viewport.width.max(0.0);
        self.viewport.height = self.viewport.height.max(0.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let settings: LayoutSettings = serde_json::from_str(
            r#"{"margins":{"top":10.0},"simulation":{"link_distance":80.0}}"#,
        )
        .unwrap();
        assert_eq!(settings.margins.top, 10.0);
        assert_eq!(settings.margins.left, Margins::default().left);
        assert_eq!(settings.simulation.link_distance, 80.0);
        assert_eq!(settings.viewport, Viewport::default());
    }

    #[test]
    fn test_sanitized_clamps_out_of_range_values() {
        let mut settings = LayoutSettings::default();
        settings.simulation.energy_decay = 3.0;
        settings.simulation.drag_energy = f64::NAN;
        settings.margins.left = -5.0;

        let clean = settings.sanitized();
        assert_eq!(clean.simulation.energy_decay, ENERGY_DECAY_RANGE.max);
        assert_eq!(clean.simulation.drag_energy, DRAG_ENERGY_RANGE.min);
        assert_eq!(clean.margins.left, 0.0);
    }
}
