//! The parameter panel: three sliders and their text readouts.

use std::ops::RangeInclusive;

use crate::types::{DetectionParameters, Preset};

pub const MIN_SIZE_RANGE: RangeInclusive<u32> = 10..=300;
pub const SCALE_FACTOR_RANGE: RangeInclusive<f64> = 1.05..=2.0;
pub const MIN_NEIGHBORS_RANGE: RangeInclusive<u32> = 1..=10;

/// Which slider a change or readout refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    MinSize,
    ScaleFactor,
    MinNeighbors,
}

impl Parameter {
    pub const ALL: [Parameter; 3] = [
        Parameter::MinSize,
        Parameter::ScaleFactor,
        Parameter::MinNeighbors,
    ];

    /// Multipart field name expected by the service.
    pub fn field_name(self) -> &'static str {
        match self {
            Parameter::MinSize => "minSize",
            Parameter::ScaleFactor => "scaleFactor",
            Parameter::MinNeighbors => "minNeighbors",
        }
    }
}

/// Holds the current parameters. Values are clamped to the slider ranges.
#[derive(Debug, Clone, Default)]
pub struct ParameterPanel {
    params: DetectionParameters,
}

impl ParameterPanel {
    pub fn params(&self) -> DetectionParameters {
        self.params
    }

    pub fn set_min_size(&mut self, value: u32) {
        self.params.min_size = value.clamp(*MIN_SIZE_RANGE.start(), *MIN_SIZE_RANGE.end());
    }

    /// Non-finite input is ignored.
    pub fn set_scale_factor(&mut self, value: f64) {
        if value.is_finite() {
            self.params.scale_factor =
                value.clamp(*SCALE_FACTOR_RANGE.start(), *SCALE_FACTOR_RANGE.end());
        }
    }

    pub fn set_min_neighbors(&mut self, value: u32) {
        self.params.min_neighbors =
            value.clamp(*MIN_NEIGHBORS_RANGE.start(), *MIN_NEIGHBORS_RANGE.end());
    }

    pub fn apply_preset(&mut self, preset: Preset) {
        self.params = preset.parameters();
    }

    /// Text mirror shown next to a slider.
    pub fn display_text(&self, parameter: Parameter) -> String {
        match parameter {
            Parameter::MinSize => self.params.min_size.to_string(),
            Parameter::ScaleFactor => format!("{:.2}", self.params.scale_factor),
            Parameter::MinNeighbors => self.params.min_neighbors.to_string(),
        }
    }

    /// Text value sent in the multipart form.
    pub fn form_text(&self, parameter: Parameter) -> String {
        form_value(&self.params, parameter)
    }
}

/// Text encoding of one parameter as the service expects it in a form field.
pub fn form_value(params: &DetectionParameters, parameter: Parameter) -> String {
    match parameter {
        Parameter::MinSize => params.min_size.to_string(),
        Parameter::ScaleFactor => params.scale_factor.to_string(),
        Parameter::MinNeighbors => params.min_neighbors.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readouts_mirror_values() {
        let mut panel = ParameterPanel::default();
        panel.set_scale_factor(1.2);
        panel.set_min_size(42);

        assert_eq!(panel.display_text(Parameter::ScaleFactor), "1.20");
        assert_eq!(panel.form_text(Parameter::ScaleFactor), "1.2");
        assert_eq!(panel.display_text(Parameter::MinSize), "42");
        assert_eq!(panel.display_text(Parameter::MinNeighbors), "4");
    }

    #[test]
    fn values_clamp_to_slider_ranges() {
        let mut panel = ParameterPanel::default();
        panel.set_min_size(0);
        panel.set_scale_factor(0.5);
        panel.set_min_neighbors(99);
        assert_eq!(panel.params().min_size, 10);
        assert_eq!(panel.params().scale_factor, 1.05);
        assert_eq!(panel.params().min_neighbors, 10);

        panel.set_scale_factor(f64::NAN);
        assert_eq!(panel.params().scale_factor, 1.05);
    }

    #[test]
    fn preset_replaces_all_three() {
        let mut panel = ParameterPanel::default();
        panel.apply_preset(Preset::Speed);
        assert_eq!(panel.params(), Preset::Speed.parameters());
        assert_eq!(panel.display_text(Parameter::ScaleFactor), "1.15");
    }
}
