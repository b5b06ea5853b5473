//! Response curve model.
//!
//! A curve maps normalized input magnitude in `[0,1]` to output magnitude in
//! `[0,1]`. It is defined by an ordered set of control points interpolated
//! with a monotone cubic (Fritsch-Carlson tangent limiting), so the built
//! interpolant never inverts direction as long as the control points
//! themselves are non-decreasing — which the edit operations enforce.
//!
//! The tick path never runs spline math: a committed profile is compiled once
//! into a [`CurveLut`] and the loop does O(1) table lookups.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lookup table resolution. 256 entries keep the table in one cache line
/// ballpark (~1KB) while staying well under the visible error of a stick.
pub const LUT_SIZE: usize = 256;

/// A curve needs both endpoints at minimum.
pub const MIN_POINTS: usize = 2;

/// Cap on editor-created points. Anything beyond this is indistinguishable
/// on a stick and just slows the editor down.
pub const MAX_POINTS: usize = 16;

/// Minimum horizontal spacing between neighboring control points.
pub const MIN_X_SPACING: f32 = 0.01;

/// Errors for curve construction and editing.
///
/// Every variant means the edit was rejected and the prior curve state is
/// still in effect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurveError {
    #[error("curve needs at least {MIN_POINTS} control points, got {0}")]
    TooFewPoints(usize),
    #[error("curve supports at most {MAX_POINTS} control points")]
    TooManyPoints,
    #[error("control point {index} value {value} is outside [0,1]")]
    OutOfRange { index: usize, value: f32 },
    #[error("control point {index} is closer than {MIN_X_SPACING} to its neighbor")]
    TooClose { index: usize },
    #[error("control point {index} would make the curve decrease")]
    NotMonotonic { index: usize },
    #[error("curve endpoints are fixed at (0,0) and (1,1)")]
    EndpointFixed,
    #[error("no control point at index {0}")]
    NoSuchPoint(usize),
}

/// A single `(x, y)` control point, both coordinates in `[0,1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub x: f32,
    pub y: f32,
}

impl ControlPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Built-in immutable curve shapes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum CurvePreset {
    /// Identity response.
    #[default]
    Linear,
    /// Convex: small inputs suppressed, large inputs amplified.
    Aggressive,
    /// Concave: small inputs amplified for fine control, large compressed.
    Precise,
    /// Sigmoid: flat near 0 and 1, steep in the middle.
    SCurve,
}

impl CurvePreset {
    /// Control points defining the preset shape.
    pub fn points(self) -> Vec<ControlPoint> {
        let raw: &[(f32, f32)] = match self {
            CurvePreset::Linear => &[(0.0, 0.0), (1.0, 1.0)],
            CurvePreset::Aggressive => &[
                (0.0, 0.0),
                (0.3, 0.08),
                (0.6, 0.3),
                (0.85, 0.65),
                (1.0, 1.0),
            ],
            CurvePreset::Precise => &[
                (0.0, 0.0),
                (0.15, 0.35),
                (0.4, 0.65),
                (0.7, 0.88),
                (1.0, 1.0),
            ],
            CurvePreset::SCurve => &[
                (0.0, 0.0),
                (0.2, 0.05),
                (0.5, 0.5),
                (0.8, 0.95),
                (1.0, 1.0),
            ],
        };
        raw.iter().map(|&(x, y)| ControlPoint::new(x, y)).collect()
    }
}

/// A curve profile: a named immutable preset, or a custom point list.
///
/// Presets cannot be edited in place — the first edit forks the profile into
/// `Custom` and applies there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveProfile {
    Preset(CurvePreset),
    Custom(Vec<ControlPoint>),
}

impl Default for CurveProfile {
    fn default() -> Self {
        CurveProfile::Preset(CurvePreset::Linear)
    }
}

impl CurveProfile {
    /// The profile's control points, expanding presets.
    pub fn points(&self) -> Vec<ControlPoint> {
        match self {
            CurveProfile::Preset(p) => p.points(),
            CurveProfile::Custom(points) => points.clone(),
        }
    }

    /// Check the ordering/range/monotonicity invariants.
    pub fn validate(&self) -> Result<(), CurveError> {
        validate_points(&self.points())
    }

    /// Compile into a lookup table for the tick path.
    pub fn compile(&self) -> Result<CurveLut, CurveError> {
        Ok(MonotoneCurve::new(&self.points())?.to_lut())
    }

    /// Replace point `index` with `(x, y)`.
    ///
    /// Endpoints are immutable. Editing a preset forks it into a custom
    /// profile first; on rejection the profile is left exactly as it was.
    pub fn move_point(&mut self, index: usize, x: f32, y: f32) -> Result<(), CurveError> {
        let mut points = self.points();
        if index >= points.len() {
            return Err(CurveError::NoSuchPoint(index));
        }
        if index == 0 || index == points.len() - 1 {
            return Err(CurveError::EndpointFixed);
        }
        points[index] = ControlPoint::new(x, y);
        validate_points(&points)?;
        *self = CurveProfile::Custom(points);
        Ok(())
    }

    /// Insert a new interior point, keeping x-order. Returns its index.
    pub fn insert_point(&mut self, x: f32, y: f32) -> Result<usize, CurveError> {
        let mut points = self.points();
        if points.len() >= MAX_POINTS {
            return Err(CurveError::TooManyPoints);
        }
        let index = points.partition_point(|p| p.x < x);
        points.insert(index, ControlPoint::new(x, y));
        validate_points(&points)?;
        *self = CurveProfile::Custom(points);
        Ok(index)
    }

    /// Remove the interior point at `index`.
    pub fn remove_point(&mut self, index: usize) -> Result<(), CurveError> {
        let mut points = self.points();
        if index >= points.len() {
            return Err(CurveError::NoSuchPoint(index));
        }
        if index == 0 || index == points.len() - 1 {
            return Err(CurveError::EndpointFixed);
        }
        points.remove(index);
        validate_points(&points)?;
        *self = CurveProfile::Custom(points);
        Ok(())
    }
}

/// Validate a candidate point sequence against every curve invariant:
/// count, fixed endpoints, `[0,1]` range, strictly increasing x with minimum
/// spacing, non-decreasing y.
pub fn validate_points(points: &[ControlPoint]) -> Result<(), CurveError> {
    if points.len() < MIN_POINTS {
        return Err(CurveError::TooFewPoints(points.len()));
    }
    if points.len() > MAX_POINTS {
        return Err(CurveError::TooManyPoints);
    }
    for (index, p) in points.iter().enumerate() {
        for value in [p.x, p.y] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(CurveError::OutOfRange { index, value });
            }
        }
    }
    let first = points[0];
    let last = points[points.len() - 1];
    if first.x != 0.0 || first.y != 0.0 || last.x != 1.0 || last.y != 1.0 {
        return Err(CurveError::EndpointFixed);
    }
    for index in 1..points.len() {
        if points[index].x - points[index - 1].x < MIN_X_SPACING {
            return Err(CurveError::TooClose { index });
        }
        if points[index].y < points[index - 1].y {
            return Err(CurveError::NotMonotonic { index });
        }
    }
    Ok(())
}

/// Monotone cubic Hermite interpolant through validated control points.
///
/// Tangents are the Fritsch-Carlson limited secant averages, so a
/// non-decreasing point sequence yields a non-decreasing interpolant with no
/// per-sample clamping.
#[derive(Debug, Clone)]
pub struct MonotoneCurve {
    xs: Vec<f32>,
    ys: Vec<f32>,
    tangents: Vec<f32>,
}

impl MonotoneCurve {
    pub fn new(points: &[ControlPoint]) -> Result<Self, CurveError> {
        validate_points(points)?;
        let n = points.len();
        let xs: Vec<f32> = points.iter().map(|p| p.x).collect();
        let ys: Vec<f32> = points.iter().map(|p| p.y).collect();

        let mut secants = vec![0.0f32; n - 1];
        for i in 0..n - 1 {
            secants[i] = (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i]);
        }

        let mut tangents = vec![0.0f32; n];
        tangents[0] = secants[0];
        tangents[n - 1] = secants[n - 2];
        for i in 1..n - 1 {
            tangents[i] = if secants[i - 1] * secants[i] <= 0.0 {
                0.0
            } else {
                0.5 * (secants[i - 1] + secants[i])
            };
        }

        // Fritsch-Carlson: pull tangents inside the monotone region.
        for i in 0..n - 1 {
            if secants[i] == 0.0 {
                tangents[i] = 0.0;
                tangents[i + 1] = 0.0;
                continue;
            }
            let alpha = tangents[i] / secants[i];
            let beta = tangents[i + 1] / secants[i];
            let norm2 = alpha * alpha + beta * beta;
            if norm2 > 9.0 {
                let tau = 3.0 / norm2.sqrt();
                tangents[i] = tau * alpha * secants[i];
                tangents[i + 1] = tau * beta * secants[i];
            }
        }

        Ok(Self { xs, ys, tangents })
    }

    /// Evaluate at `x` (clamped to `[0,1]`).
    pub fn eval(&self, x: f32) -> f32 {
        let x = x.clamp(0.0, 1.0);
        let last_segment = self.xs.len() - 2;
        let i = self
            .xs
            .partition_point(|&px| px <= x)
            .saturating_sub(1)
            .min(last_segment);

        let h = self.xs[i + 1] - self.xs[i];
        let t = (x - self.xs[i]) / h;
        let t2 = t * t;
        let t3 = t2 * t;
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        let y = h00 * self.ys[i]
            + h10 * h * self.tangents[i]
            + h01 * self.ys[i + 1]
            + h11 * h * self.tangents[i + 1];
        y.clamp(0.0, 1.0)
    }

    /// Sample into a fixed-size table for the tick path.
    pub fn to_lut(&self) -> CurveLut {
        let mut table = [0.0f32; LUT_SIZE];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = self.eval(i as f32 / (LUT_SIZE - 1) as f32);
        }
        CurveLut { table }
    }
}

/// Pre-computed curve table. Lookup is O(1) with linear interpolation
/// between entries — safe for the sampling loop.
#[derive(Debug, Clone)]
pub struct CurveLut {
    table: [f32; LUT_SIZE],
}

impl CurveLut {
    /// Identity table.
    pub fn linear() -> Self {
        let mut table = [0.0f32; LUT_SIZE];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = i as f32 / (LUT_SIZE - 1) as f32;
        }
        Self { table }
    }

    /// Evaluate at `input` (clamped to `[0,1]`).
    #[inline]
    pub fn lookup(&self, input: f32) -> f32 {
        let input = input.clamp(0.0, 1.0);
        let scaled = input * (LUT_SIZE - 1) as f32;
        let low = (scaled as usize).min(LUT_SIZE - 2);
        let fraction = scaled - low as f32;
        self.table[low] + fraction * (self.table[low + 1] - self.table[low])
    }
}
