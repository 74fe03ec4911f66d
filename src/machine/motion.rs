//! Motion state machine
//!
//! [`MotionController`] turns target positions in millimeters into
//! device-native step commands. It owns the driver, the machine profile,
//! and the tracked position; every successful move updates the host's
//! picture of where the machine is, and anything that loses position
//! (homing) marks the affected axes unknown until an explicit position
//! assertion.

use super::dda;
use super::position::{OffsetRegister, Target, TrackedPosition};
use super::profile::MachineProfile;
use crate::axes::{Axis, AxisSet, Point, AXIS_COUNT};
use crate::commands::MAX_TOOL_INDEX;
use crate::commands::RequestError;
use crate::driver::{self, Driver};
use crate::transport::Transport;
use thiserror::Error;
use tracing::debug;

/// Poll interval handed to the device for tool/platform waits
const TOOL_POLL_MS: u16 = 100;

/// Motion layer error types
#[derive(Error, Debug)]
pub enum MotionError {
    /// A targeted axis has no trustworthy coordinate
    #[error("axis {0} position is unknown; home or assert it first")]
    UnspecifiedAxis(Axis),

    /// A targeted axis does not exist on this machine profile
    #[error("axis {0} is not present on this machine profile")]
    UnsupportedAxis(Axis),

    /// The move target equals the current position
    #[error("move target equals the current position")]
    ZeroDisplacement,

    /// Feedrate is zero, negative, or not finite
    #[error("invalid feedrate {0}")]
    InvalidFeedrate(f64),

    /// A move was requested before any feedrate was set
    #[error("no feedrate set before the first move")]
    FeedrateUnset,

    /// The underlying command failed
    #[error(transparent)]
    Driver(#[from] driver::Error),
}

/// Host-side motion state machine over one driver
#[derive(Debug)]
pub struct MotionController<T: Transport> {
    driver: Driver<T>,
    profile: MachineProfile,
    position: TrackedPosition,
    feedrate: Option<f64>,
    tool: u8,
}

impl<T: Transport> MotionController<T> {
    /// Bind a driver to a machine profile.
    pub fn new(driver: Driver<T>, profile: MachineProfile) -> Self {
        Self {
            driver,
            profile,
            position: TrackedPosition::new(),
            feedrate: None,
            tool: 0,
        }
    }

    /// The machine profile in force.
    pub fn profile(&self) -> &MachineProfile {
        &self.profile
    }

    /// The tracked position state.
    pub fn position(&self) -> &TrackedPosition {
        &self.position
    }

    /// The active tool index.
    pub fn tool(&self) -> u8 {
        self.tool
    }

    /// The modal feedrate in mm/min, if one has been set.
    pub fn feedrate(&self) -> Option<f64> {
        self.feedrate
    }

    /// Borrow the underlying driver for non-motion commands.
    pub fn driver_mut(&mut self) -> &mut Driver<T> {
        &mut self.driver
    }

    /// Consume the controller, yielding the driver.
    pub fn into_driver(self) -> Driver<T> {
        self.driver
    }

    /// Set the modal feedrate in mm/min. Local state only, no device I/O.
    pub fn set_feedrate(&mut self, feedrate: f64) -> Result<(), MotionError> {
        if !feedrate.is_finite() || feedrate <= 0.0 {
            return Err(MotionError::InvalidFeedrate(feedrate));
        }
        self.feedrate = Some(feedrate);
        Ok(())
    }

    /// Make `tool` the active tool for E-word remapping and tool waits.
    /// Local state only, no device I/O.
    pub fn set_tool(&mut self, tool: u8) -> Result<(), MotionError> {
        if tool > MAX_TOOL_INDEX {
            return Err(driver::Error::Request(RequestError::ToolIndexOutOfRange(tool)).into());
        }
        self.tool = tool;
        Ok(())
    }

    /// Select the active offset register. Local state only, no device I/O.
    pub fn select_offset_register(&mut self, register: OffsetRegister) {
        self.position.select_register(register);
    }

    /// Store an offset vector into a register. Local state only.
    pub fn set_offset(&mut self, register: OffsetRegister, offset: Point) {
        self.position.set_offset(register, offset);
    }

    /// Mark the listed axes unknown without device I/O.
    pub fn lose_position(&mut self, axes: AxisSet) {
        self.position.mark_unknown(axes);
    }

    fn check_axis_supported(&self, axis: Axis) -> Result<(), MotionError> {
        if axis.index() >= self.profile.axis_count as usize {
            return Err(MotionError::UnsupportedAxis(axis));
        }
        Ok(())
    }

    fn to_device_steps(&self, workspace: Point) -> [i32; AXIS_COUNT] {
        let device = workspace + self.position.active_offset();
        let mut steps = [0i32; AXIS_COUNT];
        for axis in 0..AXIS_COUNT {
            steps[axis] = (device.coords()[axis] * self.profile.steps_per_mm[axis]).round() as i32;
        }
        steps
    }

    /// Move to `target` at `feedrate` mm/min.
    ///
    /// Every axis named in the target must currently be known; unspecified
    /// axes keep their coordinate. The feedrate is clamped against the
    /// profile's per-axis ceilings, converted to a DDA step interval, and
    /// the move is queued on the device. The tracked position updates only
    /// after the device acknowledges.
    pub fn move_to(&mut self, target: &Target, feedrate: f64) -> Result<(), MotionError> {
        if !feedrate.is_finite() || feedrate <= 0.0 {
            return Err(MotionError::InvalidFeedrate(feedrate));
        }

        let mut workspace_target = self.position.workspace();
        for (axis, value) in target.iter() {
            self.check_axis_supported(axis)?;
            if !self.position.is_known(axis) {
                return Err(MotionError::UnspecifiedAxis(axis));
            }
            workspace_target[axis] = value;
        }

        let displacement = workspace_target - self.position.workspace();
        if dda::vector_magnitude(&displacement) == 0.0 {
            return Err(MotionError::ZeroDisplacement);
        }

        let clamped = dda::clamped_feedrate(&displacement, &self.profile.max_feedrate, feedrate);
        let dda = dda::dda_speed(&displacement, &self.profile.steps_per_mm, clamped);
        let steps = self.to_device_steps(workspace_target);

        debug!(?steps, dda, feedrate = clamped, "queueing move");
        self.driver.queue_extended_point(steps, dda)?;
        self.position.update(workspace_target);
        Ok(())
    }

    /// Unconditionally assert the current position, marking every axis
    /// known.
    pub fn set_position(&mut self, point: Point) -> Result<(), MotionError> {
        let steps = self.to_device_steps(point);

        debug!(?steps, "asserting position");
        self.driver.set_extended_position(steps)?;
        self.position.set_all(point);
        Ok(())
    }

    /// Step interval for a homing move: the slowest (largest) interval any
    /// homed axis needs to stay under its feedrate ceiling.
    fn homing_rate(&self, axes: AxisSet, feedrate: f64) -> Result<u32, MotionError> {
        if !feedrate.is_finite() || feedrate <= 0.0 {
            return Err(MotionError::InvalidFeedrate(feedrate));
        }
        let mut slowest = 0u32;
        for axis in axes.iter() {
            self.check_axis_supported(axis)?;
            let idx = axis.index();
            let axis_feedrate = feedrate.min(self.profile.max_feedrate[idx]);
            let us = 60.0 * 1_000_000.0 / (axis_feedrate * self.profile.steps_per_mm[idx]);
            slowest = slowest.max(us.round() as u32);
        }
        Ok(slowest)
    }

    /// Home `axes` toward their minimum endstops, then mark them unknown.
    pub fn home_minimums(&mut self, axes: AxisSet, feedrate: f64) -> Result<(), MotionError> {
        let rate = self.homing_rate(axes, feedrate)?;
        self.driver
            .find_axes_minimums(axes, rate, self.profile.homing_timeout_s)?;
        self.position.mark_unknown(axes);
        debug!(%axes, rate, "homed toward minimums");
        Ok(())
    }

    /// Home `axes` toward their maximum endstops, then mark them unknown.
    pub fn home_maximums(&mut self, axes: AxisSet, feedrate: f64) -> Result<(), MotionError> {
        let rate = self.homing_rate(axes, feedrate)?;
        self.driver
            .find_axes_maximums(axes, rate, self.profile.homing_timeout_s)?;
        self.position.mark_unknown(axes);
        debug!(%axes, rate, "homed toward maximums");
        Ok(())
    }

    /// Pause the device queue for `ms` milliseconds.
    pub fn dwell(&mut self, ms: u32) -> Result<(), MotionError> {
        self.driver.delay(ms)?;
        Ok(())
    }

    /// Enable or disable stepper drivers for `axes`.
    pub fn enable_axes(&mut self, axes: AxisSet, enable: bool) -> Result<(), MotionError> {
        self.driver.enable_axes(axes, enable)?;
        Ok(())
    }

    /// Block the device queue until the active tool reaches its setpoint.
    pub fn wait_for_tool(&mut self, timeout_s: u16) -> Result<(), MotionError> {
        self.driver
            .wait_for_tool_ready(self.tool, TOOL_POLL_MS, timeout_s)?;
        Ok(())
    }

    /// Block the device queue until the platform reaches its setpoint.
    pub fn wait_for_platform(&mut self, timeout_s: u16) -> Result<(), MotionError> {
        self.driver
            .wait_for_platform_ready(self.tool, TOOL_POLL_MS, timeout_s)?;
        Ok(())
    }
}
