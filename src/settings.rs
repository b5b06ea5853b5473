//! Persisted pipeline configuration.
//!
//! One flat TOML record per user. Loading never fails the process: a missing
//! file means defaults, a malformed file means defaults plus a warning, and
//! out-of-range numbers in an otherwise parseable file are clamped back into
//! range. Rejection (rather than clamping) happens at the setter boundary,
//! which is the only write path the running pipeline uses.

use crate::curve::{CurveError, CurveProfile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SENSITIVITY_MIN: f32 = 2.0;
pub const SENSITIVITY_MAX: f32 = 100.0;
/// Step used by the sensitivity hotkeys.
pub const SENSITIVITY_STEP: f32 = 2.0;
pub const DECAY_MIN: f32 = 0.5;
pub const DECAY_MAX: f32 = 0.99;
pub const DEADZONE_MAX: f32 = 0.2;
pub const SMOOTHING_MAX: f32 = 0.95;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{field} {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    #[error(transparent)]
    Curve(#[from] CurveError),
    #[error("failed to write settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode settings: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// The two stick axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Per-axis conditioning switches and parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisSettings {
    pub enabled: bool,
    pub inverted: bool,
    /// Output magnitude below this snaps to center. `[0, 0.2]`.
    pub deadzone: f32,
    /// Weight on the previous smoothed output. `[0, 0.95]`; higher is
    /// steadier but laggier.
    pub smoothing: f32,
}

impl Default for AxisSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            inverted: false,
            deadzone: 0.05,
            smoothing: 0.25,
        }
    }
}

impl AxisSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_range("deadzone", self.deadzone, 0.0, DEADZONE_MAX)?;
        check_range("smoothing", self.smoothing, 0.0, SMOOTHING_MAX)?;
        Ok(())
    }
}

/// The full pipeline configuration, as persisted.
///
/// Defaults: sensitivity 50, decay 0.9, both axes enabled and non-inverted
/// with deadzone 0.05 and smoothing 0.25, linear curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Linear multiplier on raw counts. `[2, 100]`.
    pub sensitivity: f32,
    /// Per-tick falloff factor applied while the mouse is idle. `[0.5, 0.99]`.
    pub decay_rate: f32,
    pub axis_x: AxisSettings,
    pub axis_y: AxisSettings,
    pub curve: CurveProfile,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sensitivity: 50.0,
            decay_rate: 0.9,
            axis_x: AxisSettings::default(),
            axis_y: AxisSettings::default(),
            curve: CurveProfile::default(),
        }
    }
}

fn check_range(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), SettingsError> {
    if !value.is_finite() || !(min..=max).contains(&value) {
        return Err(SettingsError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

impl Settings {
    /// Default per-user settings path:
    /// `$XDG_CONFIG_HOME/mousestick/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mousestick")
            .join("config.toml")
    }

    /// Load from `path`, falling back to defaults on any failure.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No settings at {}, using defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                return Self::default();
            }
        };
        match toml::from_str::<Settings>(&text) {
            Ok(mut settings) => {
                settings.sanitize();
                settings
            }
            Err(e) => {
                log::warn!("Malformed settings in {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Pull every loaded value back inside its documented range. A file
    /// edited by hand may carry anything; the pipeline must never see it.
    pub fn sanitize(&mut self) {
        let defaults = Settings::default();
        clamp_field("sensitivity", &mut self.sensitivity, SENSITIVITY_MIN, SENSITIVITY_MAX);
        clamp_field("decay_rate", &mut self.decay_rate, DECAY_MIN, DECAY_MAX);
        for axis in [&mut self.axis_x, &mut self.axis_y] {
            clamp_field("deadzone", &mut axis.deadzone, 0.0, DEADZONE_MAX);
            clamp_field("smoothing", &mut axis.smoothing, 0.0, SMOOTHING_MAX);
        }
        if let Err(e) = self.curve.validate() {
            log::warn!("Stored curve is invalid ({}), reverting to linear", e);
            self.curve = defaults.curve;
        }
    }

    pub fn set_sensitivity(&mut self, value: f32) -> Result<(), SettingsError> {
        check_range("sensitivity", value, SENSITIVITY_MIN, SENSITIVITY_MAX)?;
        self.sensitivity = value;
        Ok(())
    }

    /// Step sensitivity by `steps` hotkey increments, saturating at the
    /// range ends. Returns the new value.
    pub fn step_sensitivity(&mut self, steps: f32) -> f32 {
        self.sensitivity =
            (self.sensitivity + steps * SENSITIVITY_STEP).clamp(SENSITIVITY_MIN, SENSITIVITY_MAX);
        self.sensitivity
    }

    pub fn set_decay_rate(&mut self, value: f32) -> Result<(), SettingsError> {
        check_range("decay_rate", value, DECAY_MIN, DECAY_MAX)?;
        self.decay_rate = value;
        Ok(())
    }

    pub fn set_axis(&mut self, axis: Axis, value: AxisSettings) -> Result<(), SettingsError> {
        value.validate()?;
        *self.axis_mut(axis) = value;
        Ok(())
    }

    /// Replace the curve profile after checking its invariants.
    pub fn set_curve(&mut self, curve: CurveProfile) -> Result<(), SettingsError> {
        curve.validate()?;
        self.curve = curve;
        Ok(())
    }

    pub fn axis(&self, axis: Axis) -> &AxisSettings {
        match axis {
            Axis::X => &self.axis_x,
            Axis::Y => &self.axis_y,
        }
    }

    fn axis_mut(&mut self, axis: Axis) -> &mut AxisSettings {
        match axis {
            Axis::X => &mut self.axis_x,
            Axis::Y => &mut self.axis_y,
        }
    }
}

fn clamp_field(field: &str, value: &mut f32, min: f32, max: f32) {
    if !value.is_finite() {
        log::warn!("Stored {} is not a number, resetting to {}", field, min);
        *value = min;
        return;
    }
    let clamped = value.clamp(min, max);
    if clamped != *value {
        log::warn!("Stored {} {} clamped into [{}, {}]", field, value, min, max);
        *value = clamped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{ControlPoint, CurvePreset};
    use approx::assert_relative_eq;

    #[test]
    fn defaults_are_in_range() {
        let s = Settings::default();
        assert!(s.sensitivity >= SENSITIVITY_MIN && s.sensitivity <= SENSITIVITY_MAX);
        assert!(s.decay_rate >= DECAY_MIN && s.decay_rate <= DECAY_MAX);
        assert!(s.axis_x.validate().is_ok());
        assert!(s.curve.validate().is_ok());
    }

    #[test]
    fn setter_rejects_out_of_range_and_retains_prior() {
        let mut s = Settings::default();
        assert!(s.set_sensitivity(150.0).is_err());
        assert_relative_eq!(s.sensitivity, 50.0);
        assert!(s.set_sensitivity(f32::NAN).is_err());
        assert!(s.set_decay_rate(0.3).is_err());
        assert_relative_eq!(s.decay_rate, 0.9);

        let bad_axis = AxisSettings {
            deadzone: 0.5,
            ..AxisSettings::default()
        };
        assert!(s.set_axis(Axis::Y, bad_axis).is_err());
        assert_relative_eq!(s.axis_y.deadzone, 0.05);
    }

    #[test]
    fn sensitivity_stepping_saturates() {
        let mut s = Settings::default();
        for _ in 0..100 {
            s.step_sensitivity(1.0);
        }
        assert_relative_eq!(s.sensitivity, SENSITIVITY_MAX);
        for _ in 0..100 {
            s.step_sensitivity(-1.0);
        }
        assert_relative_eq!(s.sensitivity, SENSITIVITY_MIN);
    }

    #[test]
    fn roundtrip_preserves_fields() {
        let mut s = Settings::default();
        s.sensitivity = 72.0;
        s.decay_rate = 0.85;
        s.axis_y.inverted = true;
        s.axis_y.smoothing = 0.6;
        s.curve = CurveProfile::Preset(CurvePreset::SCurve);

        let text = toml::to_string_pretty(&s).unwrap();
        let back: Settings = toml::from_str(&text).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn roundtrip_preserves_custom_points_in_order() {
        let points = vec![
            ControlPoint::new(0.0, 0.0),
            ControlPoint::new(0.2, 0.1),
            ControlPoint::new(0.7, 0.55),
            ControlPoint::new(1.0, 1.0),
        ];
        let mut s = Settings::default();
        s.curve = CurveProfile::Custom(points.clone());

        let text = toml::to_string_pretty(&s).unwrap();
        let back: Settings = toml::from_str(&text).unwrap();
        match back.curve {
            CurveProfile::Custom(restored) => {
                assert_eq!(restored.len(), points.len());
                for (a, b) in restored.iter().zip(&points) {
                    assert_relative_eq!(a.x, b.x);
                    assert_relative_eq!(a.y, b.y);
                }
            }
            other => panic!("expected custom curve, got {other:?}"),
        }
    }

    #[test]
    fn save_and_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut s = Settings::default();
        s.sensitivity = 24.0;
        s.save(&path).unwrap();

        let back = Settings::load(&path);
        assert_eq!(back, s);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Settings::load(&dir.path().join("nope.toml"));
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "sensitivity = \"loud\"").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn out_of_range_values_are_clamped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "sensitivity = 5000.0\ndecay_rate = 0.1\n").unwrap();
        let loaded = Settings::load(&path);
        assert_relative_eq!(loaded.sensitivity, SENSITIVITY_MAX);
        assert_relative_eq!(loaded.decay_rate, DECAY_MIN);
    }

    #[test]
    fn invalid_stored_curve_reverts_to_linear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        // Custom curve whose points decrease: invariant violation.
        let text = r#"
[curve]
custom = [
    { x = 0.0, y = 0.0 },
    { x = 0.5, y = 0.8 },
    { x = 0.6, y = 0.2 },
    { x = 1.0, y = 1.0 },
]
"#;
        std::fs::write(&path, text).unwrap();
        let loaded = Settings::load(&path);
        assert_eq!(loaded.curve, CurveProfile::default());
    }
}
