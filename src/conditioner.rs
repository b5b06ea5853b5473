//! Per-axis signal conditioning.
//!
//! Each tick, each axis runs the same chain on its filtered raw delta:
//! sensitivity scale → normalize → curve → deadzone (with continuous
//! rescale) → smoothing → decay-to-center on idle → invert → clamp. The
//! combined vector is then clamped to the unit circle so diagonals never
//! exceed full deflection.

use crate::curve::CurveLut;
use crate::settings::{AxisSettings, Settings};

/// Pre-scaled counts per tick that map to full stick deflection.
///
/// Tunable scale reference: `raw * sensitivity` saturates the normalized
/// magnitude at this many counts. At the default sensitivity of 50 a raw
/// delta of 20 counts in one 5 ms tick pins the axis.
pub const FULL_DEFLECTION_COUNTS: f32 = 1000.0;

/// Magnitudes below this snap to exactly zero, so decay terminates instead
/// of chasing denormals forever.
pub const CENTER_EPSILON: f32 = 1e-3;

/// One tick's output vector, both components in `[-1,1]` and the combined
/// magnitude inside the unit circle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StickVector {
    pub x: f32,
    pub y: f32,
}

impl StickVector {
    pub fn magnitude(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Scale the vector back onto the unit circle if it pokes outside.
    fn clamp_to_unit_circle(self) -> Self {
        let len2 = self.x * self.x + self.y * self.y;
        if len2 > 1.0 {
            let inv = len2.sqrt().recip();
            Self {
                x: self.x * inv,
                y: self.y * inv,
            }
        } else {
            self
        }
    }
}

/// Per-axis running state carried between ticks: the last smoothed output,
/// stored before inversion.
#[derive(Debug, Clone, Copy, Default)]
struct AxisState {
    last_output: f32,
}

/// The two-axis conditioner. Owns all between-tick state; reset whenever
/// capture (re)starts.
#[derive(Debug, Default)]
pub struct Conditioner {
    x: AxisState,
    y: AxisState,
}

impl Conditioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all carried state, recentering both axes.
    pub fn reset(&mut self) {
        self.x = AxisState::default();
        self.y = AxisState::default();
    }

    /// Run one tick of the chain on the jump-filtered raw delta.
    pub fn tick(&mut self, dx: i32, dy: i32, settings: &Settings, lut: &CurveLut) -> StickVector {
        let x = condition_axis(dx, &settings.axis_x, settings, lut, &mut self.x);
        let y = condition_axis(dy, &settings.axis_y, settings, lut, &mut self.y);
        StickVector { x, y }.clamp_to_unit_circle()
    }
}

fn condition_axis(
    raw: i32,
    axis: &AxisSettings,
    settings: &Settings,
    lut: &CurveLut,
    state: &mut AxisState,
) -> f32 {
    if !axis.enabled {
        return 0.0;
    }

    let value = if raw == 0 {
        // Idle tick: decay toward center instead of blending, so the return
        // rate is decay_rate^n regardless of the smoothing setting.
        let decayed = state.last_output * settings.decay_rate;
        if decayed.abs() < CENTER_EPSILON {
            0.0
        } else {
            decayed
        }
    } else {
        let scaled = raw as f32 * settings.sensitivity;
        let normalized = (scaled.abs() / FULL_DEFLECTION_COUNTS).min(1.0);
        let shaped = lut.lookup(normalized);
        let magnitude = apply_deadzone(shaped, axis.deadzone);
        let conditioned = scaled.signum() * magnitude;
        axis.smoothing * state.last_output + (1.0 - axis.smoothing) * conditioned
    };

    state.last_output = value;
    let signed = if axis.inverted { -value } else { value };
    signed.clamp(-1.0, 1.0)
}

/// Deadzone with continuous rescale: below the threshold snaps to zero, the
/// remaining range stretches back to `[0,1]` so there is no jump at the
/// boundary.
pub(crate) fn apply_deadzone(magnitude: f32, deadzone: f32) -> f32 {
    if magnitude < deadzone {
        0.0
    } else {
        (magnitude - deadzone) / (1.0 - deadzone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurveLut;
    use crate::settings::Settings;
    use approx::assert_relative_eq;

    fn bare_settings() -> Settings {
        // No smoothing or deadzone so expected values are exact.
        let mut s = Settings::default();
        s.axis_x.smoothing = 0.0;
        s.axis_y.smoothing = 0.0;
        s.axis_x.deadzone = 0.0;
        s.axis_y.deadzone = 0.0;
        s
    }

    #[test]
    fn disabled_axis_outputs_zero() {
        let mut s = bare_settings();
        s.axis_x.enabled = false;
        let mut c = Conditioner::new();
        let out = c.tick(500, 0, &s, &CurveLut::linear());
        assert_relative_eq!(out.x, 0.0);
    }

    #[test]
    fn linear_chain_scales_as_expected() {
        let s = bare_settings();
        let mut c = Conditioner::new();
        // 10 counts * sensitivity 50 = 500 = half deflection.
        let out = c.tick(10, 0, &s, &CurveLut::linear());
        assert_relative_eq!(out.x, 0.5, epsilon = 1e-3);
        assert_relative_eq!(out.y, 0.0);
    }

    #[test]
    fn sign_is_preserved_through_the_curve() {
        let s = bare_settings();
        let mut c = Conditioner::new();
        let out = c.tick(-10, 0, &s, &CurveLut::linear());
        assert_relative_eq!(out.x, -0.5, epsilon = 1e-3);
    }

    #[test]
    fn inversion_flips_output() {
        let mut s = bare_settings();
        s.axis_y.inverted = true;
        let mut c = Conditioner::new();
        let out = c.tick(0, 10, &s, &CurveLut::linear());
        assert!(out.y < 0.0);
    }

    #[test]
    fn decay_converges_to_center() {
        let s = bare_settings();
        let mut c = Conditioner::new();
        let lut = CurveLut::linear();
        c.tick(20, 20, &s, &lut);
        let mut ticks = 0;
        loop {
            let out = c.tick(0, 0, &s, &lut);
            ticks += 1;
            if out.magnitude() < 1e-3 {
                break;
            }
            assert!(ticks < 200, "decay failed to converge");
        }
    }

    #[test]
    fn decay_rate_is_exponential() {
        let s = bare_settings();
        let mut c = Conditioner::new();
        let lut = CurveLut::linear();
        let first = c.tick(10, 0, &s, &lut).x;
        let mut expected = first;
        for _ in 0..10 {
            expected *= s.decay_rate;
            let out = c.tick(0, 0, &s, &lut);
            assert_relative_eq!(out.x, expected, epsilon = 1e-4);
        }
    }

    #[test]
    fn smoothing_lags_behind_input() {
        let mut s = bare_settings();
        s.axis_x.smoothing = 0.8;
        let mut c = Conditioner::new();
        let lut = CurveLut::linear();
        let first = c.tick(10, 0, &s, &lut).x;
        // One tick at 80% history weight only reaches 20% of the target.
        assert_relative_eq!(first, 0.2 * 0.5, epsilon = 1e-3);
        let second = c.tick(10, 0, &s, &lut).x;
        assert!(second > first && second < 0.5);
    }

    #[test]
    fn deadzone_is_continuous_at_the_boundary() {
        let d = 0.12;
        assert_relative_eq!(apply_deadzone(d, d), 0.0);
        let eps = 1e-4;
        let just_above = apply_deadzone(d + eps, d);
        assert!(just_above > 0.0 && just_above < 1e-3);
        assert_relative_eq!(apply_deadzone(1.0, d), 1.0);
    }

    #[test]
    fn small_input_inside_deadzone_snaps_to_zero() {
        let mut s = bare_settings();
        s.axis_x.deadzone = 0.1;
        let mut c = Conditioner::new();
        // 1 count * 50 = 50 counts -> 0.05 normalized, inside the deadzone.
        let out = c.tick(1, 0, &s, &CurveLut::linear());
        assert_relative_eq!(out.x, 0.0);
    }

    #[test]
    fn diagonal_never_leaves_unit_circle() {
        let s = bare_settings();
        let mut c = Conditioner::new();
        let out = c.tick(5000, 5000, &s, &CurveLut::linear());
        assert!(out.magnitude() <= 1.0 + 1e-6);
        assert_relative_eq!(out.x, out.y, epsilon = 1e-6);
    }

    #[test]
    fn sensitivity_bounds_stay_in_range() {
        for sensitivity in [2.0, 100.0] {
            let mut s = bare_settings();
            s.sensitivity = sensitivity;
            let mut c = Conditioner::new();
            for raw in [-100_000, -500, -1, 1, 500, 100_000] {
                let out = c.tick(raw, raw, &s, &CurveLut::linear());
                assert!(out.x.abs() <= 1.0 && out.y.abs() <= 1.0);
            }
        }
    }

    #[test]
    fn reset_clears_carried_state() {
        let s = bare_settings();
        let mut c = Conditioner::new();
        let lut = CurveLut::linear();
        c.tick(20, 0, &s, &lut);
        c.reset();
        let out = c.tick(0, 0, &s, &lut);
        assert_relative_eq!(out.x, 0.0);
    }
}
