//! Tracked position and offset registers
//!
//! The host's mirror of where the machine is. Each axis carries a
//! known/unknown flag: homing invalidates the axes it moved, because the
//! device does not report the discovered coordinate back synchronously.
//! Coordinates are stored in workspace space; the active offset register is
//! applied additively when reading the effective (device-space) position.

use crate::axes::{Axis, AxisSet, Point, AXIS_COUNT};

/// Selectable origin offset applied on top of workspace coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetRegister {
    /// No offset applied
    #[default]
    None,
    /// First offset register
    First,
    /// Second offset register
    Second,
}

impl OffsetRegister {
    fn slot(self) -> Option<usize> {
        match self {
            Self::None => None,
            Self::First => Some(0),
            Self::Second => Some(1),
        }
    }
}

/// A per-axis move target; unspecified axes keep their current coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Target([Option<f64>; AXIS_COUNT]);

impl Target {
    /// An empty target.
    pub fn new() -> Self {
        Self::default()
    }

    /// Target the three cartesian axes.
    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self::new().with(Axis::X, x).with(Axis::Y, y).with(Axis::Z, z)
    }

    /// Return a copy with `axis` targeted at `value`.
    #[must_use]
    pub fn with(mut self, axis: Axis, value: f64) -> Self {
        self.0[axis.index()] = Some(value);
        self
    }

    /// Set an axis target in place.
    pub fn set(&mut self, axis: Axis, value: f64) {
        self.0[axis.index()] = Some(value);
    }

    /// The target value for `axis`, if any.
    pub fn get(&self, axis: Axis) -> Option<f64> {
        self.0[axis.index()]
    }

    /// Whether no axis is targeted.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    /// Iterate the targeted axes and their values.
    pub fn iter(&self) -> impl Iterator<Item = (Axis, f64)> + '_ {
        Axis::ALL
            .into_iter()
            .filter_map(|axis| self.0[axis.index()].map(|v| (axis, v)))
    }
}

/// Host-side position state
#[derive(Debug, Clone)]
pub struct TrackedPosition {
    coords: Point,
    known: [bool; AXIS_COUNT],
    offsets: [Point; 2],
    active: OffsetRegister,
}

impl TrackedPosition {
    /// Start with every axis unknown at the origin.
    pub fn new() -> Self {
        Self {
            coords: Point::zero(),
            known: [false; AXIS_COUNT],
            offsets: [Point::zero(), Point::zero()],
            active: OffsetRegister::None,
        }
    }

    /// Workspace coordinates as last commanded.
    pub fn workspace(&self) -> Point {
        self.coords
    }

    /// Effective device-space coordinates: workspace plus active offset.
    pub fn effective(&self) -> Point {
        self.coords + self.active_offset()
    }

    /// The offset currently applied.
    pub fn active_offset(&self) -> Point {
        match self.active.slot() {
            Some(slot) => self.offsets[slot],
            None => Point::zero(),
        }
    }

    /// The active register selector.
    pub fn active_register(&self) -> OffsetRegister {
        self.active
    }

    /// Select which offset register applies.
    pub fn select_register(&mut self, register: OffsetRegister) {
        self.active = register;
    }

    /// Store an offset vector into a register; selecting [`OffsetRegister::None`]
    /// is a no-op.
    pub fn set_offset(&mut self, register: OffsetRegister, offset: Point) {
        if let Some(slot) = register.slot() {
            self.offsets[slot] = offset;
        }
    }

    /// Read a register's offset vector.
    pub fn offset(&self, register: OffsetRegister) -> Point {
        match register.slot() {
            Some(slot) => self.offsets[slot],
            None => Point::zero(),
        }
    }

    /// Whether `axis` has a trustworthy coordinate.
    pub fn is_known(&self, axis: Axis) -> bool {
        self.known[axis.index()]
    }

    /// Mark the listed axes unknown (after homing).
    pub fn mark_unknown(&mut self, axes: AxisSet) {
        for axis in axes.iter() {
            self.known[axis.index()] = false;
        }
    }

    /// Unconditionally overwrite the workspace position and mark every axis
    /// known.
    pub fn set_all(&mut self, point: Point) {
        self.coords = point;
        self.known = [true; AXIS_COUNT];
    }

    /// Record that a commanded move completed, landing at `point` in
    /// workspace coordinates.
    pub fn update(&mut self, point: Point) {
        self.coords = point;
    }
}

impl Default for TrackedPosition {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unknown() {
        let position = TrackedPosition::new();
        for axis in Axis::ALL {
            assert!(!position.is_known(axis));
        }
    }

    #[test]
    fn test_set_all_marks_known() {
        let mut position = TrackedPosition::new();
        position.set_all(Point::xyz(1.0, 2.0, 3.0));
        for axis in Axis::ALL {
            assert!(position.is_known(axis));
        }
        assert_eq!(position.workspace()[Axis::Y], 2.0);
    }

    #[test]
    fn test_mark_unknown_is_selective() {
        let mut position = TrackedPosition::new();
        position.set_all(Point::zero());
        position.mark_unknown(AxisSet::single(Axis::X).with(Axis::Z));
        assert!(!position.is_known(Axis::X));
        assert!(position.is_known(Axis::Y));
        assert!(!position.is_known(Axis::Z));
    }

    #[test]
    fn test_offset_applied_additively() {
        let mut position = TrackedPosition::new();
        position.set_all(Point::xyz(10.0, 0.0, 0.0));
        position.set_offset(OffsetRegister::First, Point::xyz(5.0, -1.0, 0.0));

        assert_eq!(position.effective()[Axis::X], 10.0);

        position.select_register(OffsetRegister::First);
        assert_eq!(position.effective()[Axis::X], 15.0);
        assert_eq!(position.effective()[Axis::Y], -1.0);

        position.select_register(OffsetRegister::None);
        assert_eq!(position.effective()[Axis::X], 10.0);
    }

    #[test]
    fn test_target_iteration() {
        let target = Target::xyz(1.0, 2.0, 3.0).with(Axis::B, 4.0);
        let axes: Vec<(Axis, f64)> = target.iter().collect();
        assert_eq!(
            axes,
            vec![
                (Axis::X, 1.0),
                (Axis::Y, 2.0),
                (Axis::Z, 3.0),
                (Axis::B, 4.0)
            ]
        );
        assert_eq!(target.get(Axis::A), None);
    }
}
