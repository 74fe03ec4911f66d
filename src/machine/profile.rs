//! Machine profiles
//!
//! A profile captures the per-device constants the motion layer needs:
//! steps per millimeter, feedrate ceilings, axis count, and homing
//! timeouts. Profiles are immutable for the lifetime of a session and are
//! typically loaded from a TOML or JSON file shipped with the machine
//! definition.

use crate::axes::AXIS_COUNT;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

fn default_homing_timeout() -> u16 {
    60
}

/// Profile loading and validation errors
#[derive(Error, Debug)]
pub enum ProfileError {
    /// Profile file could not be read
    #[error("failed to read profile: {0}")]
    Io(#[from] std::io::Error),

    /// Profile file is not valid TOML
    #[error("failed to parse profile: {0}")]
    Toml(#[from] toml::de::Error),

    /// Profile file is not valid JSON
    #[error("failed to parse profile: {0}")]
    Json(#[from] serde_json::Error),

    /// Axis count outside the supported set
    #[error("unsupported axis count {0}, expected 3 or 5")]
    AxisCount(u8),

    /// A per-axis constant is zero or negative for an active axis
    #[error("non-positive {field} for axis {axis}")]
    NonPositive {
        /// Which constant is invalid
        field: &'static str,
        /// Zero-based axis index
        axis: usize,
    },
}

/// Immutable per-device constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineProfile {
    /// Human-readable profile name
    pub name: String,
    /// Number of physical axes, 3 or 5
    pub axis_count: u8,
    /// Steps per millimeter, per axis; trailing entries unused on 3-axis
    /// machines
    pub steps_per_mm: [f64; AXIS_COUNT],
    /// Feedrate ceiling per axis in mm/min
    pub max_feedrate: [f64; AXIS_COUNT],
    /// Deadline for a homing move, in seconds
    #[serde(default = "default_homing_timeout")]
    pub homing_timeout_s: u16,
}

impl MachineProfile {
    /// Stock cartesian 3-axis profile.
    pub fn cartesian_3axis() -> Self {
        Self {
            name: "generic-cartesian".to_string(),
            axis_count: 3,
            steps_per_mm: [94.14, 94.14, 400.0, 0.0, 0.0],
            max_feedrate: [12_000.0, 12_000.0, 600.0, 0.0, 0.0],
            homing_timeout_s: default_homing_timeout(),
        }
    }

    /// Stock 5-axis profile with two extruder axes.
    pub fn five_axis() -> Self {
        Self {
            name: "generic-dual".to_string(),
            axis_count: 5,
            steps_per_mm: [94.14, 94.14, 400.0, 96.27, 96.27],
            max_feedrate: [12_000.0, 12_000.0, 600.0, 1_600.0, 1_600.0],
            homing_timeout_s: default_homing_timeout(),
        }
    }

    /// Load a profile from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path)?;
        let profile: Self = toml::from_str(&content)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Load a profile from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path)?;
        let profile: Self = serde_json::from_str(&content)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Check the profile's internal consistency.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.axis_count != 3 && self.axis_count != 5 {
            return Err(ProfileError::AxisCount(self.axis_count));
        }
        for axis in 0..self.axis_count as usize {
            if self.steps_per_mm[axis] <= 0.0 {
                return Err(ProfileError::NonPositive {
                    field: "steps_per_mm",
                    axis,
                });
            }
            if self.max_feedrate[axis] <= 0.0 {
                return Err(ProfileError::NonPositive {
                    field: "max_feedrate",
                    axis,
                });
            }
        }
        Ok(())
    }
}
