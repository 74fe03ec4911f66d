//! DDA step-rate derivation
//!
//! The device times every move by its longest axis: one step interval in
//! microseconds drives the axis with the largest step count, and the
//! firmware interpolates the rest. These functions clamp a requested
//! feedrate against the per-axis ceilings while preserving the move's
//! direction, then derive that step interval. Feedrates are mm/min
//! throughout.

use crate::axes::{Point, AXIS_COUNT};

/// Euclidean magnitude of a displacement vector.
pub fn vector_magnitude(v: &Point) -> f64 {
    v.coords().iter().map(|c| c * c).sum::<f64>().sqrt()
}

/// Clamp `requested` so that no axis exceeds its feedrate ceiling while the
/// move keeps its direction.
///
/// For each moving axis the requested vector feedrate implies a per-axis
/// component of `requested * |d| / |displacement|`; where that exceeds the
/// axis ceiling, the whole vector must slow to
/// `ceiling * |displacement| / |d|`. The result is the minimum achievable
/// across all axes.
pub fn clamped_feedrate(
    displacement: &Point,
    max_feedrate: &[f64; AXIS_COUNT],
    requested: f64,
) -> f64 {
    let magnitude = vector_magnitude(displacement);
    if magnitude == 0.0 {
        return requested;
    }

    let mut clamped = requested;
    for axis in 0..AXIS_COUNT {
        let d = displacement.coords()[axis].abs();
        if d == 0.0 {
            continue;
        }
        let axis_feedrate = requested * d / magnitude;
        if axis_feedrate > max_feedrate[axis] {
            clamped = clamped.min(max_feedrate[axis] * magnitude / d);
        }
    }
    clamped
}

/// Convert a displacement in millimeters to whole steps per axis.
pub fn displacement_steps(
    displacement: &Point,
    steps_per_mm: &[f64; AXIS_COUNT],
) -> [i64; AXIS_COUNT] {
    let mut steps = [0i64; AXIS_COUNT];
    for axis in 0..AXIS_COUNT {
        steps[axis] = (displacement.coords()[axis] * steps_per_mm[axis]).round() as i64;
    }
    steps
}

/// Index of the axis with the largest absolute step count.
pub fn longest_axis(steps: &[i64; AXIS_COUNT]) -> usize {
    let mut longest = 0;
    for axis in 1..AXIS_COUNT {
        if steps[axis].abs() > steps[longest].abs() {
            longest = axis;
        }
    }
    longest
}

/// Step interval in microseconds per step on the move's longest axis, for
/// a (pre-clamped) vector feedrate in mm/min.
///
/// The feedrate component on the longest axis follows from the displacement
/// ratio; the interval is `60e6 / (component * steps_per_mm)`.
pub fn dda_speed(
    displacement: &Point,
    steps_per_mm: &[f64; AXIS_COUNT],
    feedrate: f64,
) -> u32 {
    let magnitude = vector_magnitude(displacement);
    let steps = displacement_steps(displacement, steps_per_mm);
    let longest = longest_axis(&steps);

    let longest_feedrate = feedrate * displacement.coords()[longest].abs() / magnitude;
    let us_per_step = 60.0 * 1_000_000.0 / (longest_feedrate * steps_per_mm[longest]);
    us_per_step.round() as u32
}
