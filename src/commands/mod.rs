//! Command layer
//!
//! Maps symbolic command names to wire opcodes and encodes/decodes their
//! fixed-layout parameters. Host-directed commands split into queries
//! (answered immediately) and actions (buffered by the device); tool-directed
//! commands travel inside a query/action envelope that carries a tool index
//! and a sub-opcode.
//!
//! Encoding rules: integers are little-endian fixed width, axis sets are a
//! one-byte bitfield, strings are raw bytes plus a single 0 terminator, and
//! tool-action payloads carry their own length byte.

pub mod host;
pub mod payload;
pub mod tool;

pub use payload::{PayloadReader, PayloadWriter, RequestError, ResponseError};

/// Highest addressable tool index
pub const MAX_TOOL_INDEX: u8 = 127;

/// Largest EEPROM chunk readable in one message (response status byte
/// leaves 31 of the 32 payload bytes for data).
pub const EEPROM_READ_CHUNK: usize = 31;

/// Largest EEPROM chunk writable in one message (opcode, offset, and length
/// fields leave 28 of the 32 payload bytes for data).
pub const EEPROM_WRITE_CHUNK: usize = 28;

/// Host query opcodes, answered by the device without buffering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HostQuery {
    /// Protocol version handshake
    GetVersion = 0,
    /// Initialize the device state
    Init = 1,
    /// Free slots in the action buffer
    GetAvailableBufferSize = 2,
    /// Drop all buffered actions
    ClearBuffer = 3,
    /// Cartesian position in steps (legacy 3-axis form)
    GetPosition = 4,
    /// Halt everything immediately
    AbortImmediately = 7,
    /// Toggle the device pause state
    Pause = 8,
    /// Envelope for a tool-directed query
    ToolQuery = 10,
    /// Whether the action buffer has drained
    IsFinished = 11,
    /// Read bytes from device EEPROM
    ReadEeprom = 12,
    /// Write bytes to device EEPROM
    WriteEeprom = 13,
    /// Begin capturing the command stream to an SD file
    CaptureToFile = 14,
    /// Finish an SD capture
    EndCapture = 15,
    /// Replay a captured SD file
    PlaybackCapture = 16,
    /// Soft-reset the device
    Reset = 17,
    /// Walk the SD card directory listing
    GetNextFilename = 18,
    /// Name of the build being played back
    GetBuildName = 20,
    /// Five-axis position in steps
    GetExtendedPosition = 21,
    /// Halt steppers and/or clear the buffer
    ExtendedStop = 22,
}

/// Host action opcodes, buffered in the device's command queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HostAction {
    /// Move to a 3-axis target at a given step rate
    QueuePoint = 129,
    /// Overwrite the device's 3-axis position registers
    SetPosition = 130,
    /// Home the listed axes toward their minimum endstops
    FindAxesMinimums = 131,
    /// Home the listed axes toward their maximum endstops
    FindAxesMaximums = 132,
    /// Pause the queue for a number of milliseconds
    Delay = 133,
    /// Make a tool the active tool
    ChangeTool = 134,
    /// Block the queue until a tool reaches its setpoint
    WaitForToolReady = 135,
    /// Envelope for a tool-directed action
    ToolActionCommand = 136,
    /// Enable or disable stepper drivers
    EnableAxes = 137,
    /// Move to a 5-axis target at a given step rate
    QueueExtendedPoint = 139,
    /// Overwrite the device's 5-axis position registers
    SetExtendedPosition = 140,
    /// Block the queue until the build platform reaches its setpoint
    WaitForPlatformReady = 141,
    /// Move to a 5-axis target over a given duration
    QueueExtendedPointNew = 142,
    /// Block the queue until a front-panel button is pressed
    WaitForButton = 148,
    /// Show a message on the front panel
    DisplayMessage = 149,
    /// Update the build progress indicator
    SetBuildPercent = 150,
    /// Mark the start of a host-driven build
    BuildStartNotification = 153,
    /// Mark the end of a host-driven build
    BuildEndNotification = 154,
}

/// Tool query sub-opcodes, carried inside [`HostQuery::ToolQuery`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ToolQuery {
    /// Tool firmware version
    GetVersion = 0,
    /// Current toolhead temperature
    GetToolheadTemp = 2,
    /// Whether the toolhead has reached its setpoint
    IsToolReady = 11,
    /// Current auxiliary motor speed
    GetMotor1SpeedRpm = 17,
    /// Tool status bitfield
    GetToolStatus = 22,
    /// Current build platform temperature
    GetPlatformTemp = 30,
    /// Toolhead temperature setpoint
    GetToolheadTargetTemp = 32,
    /// Build platform temperature setpoint
    GetPlatformTargetTemp = 33,
    /// Whether the build platform has reached its setpoint
    IsPlatformReady = 35,
}

/// Tool action sub-opcodes, carried inside [`HostAction::ToolActionCommand`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ToolAction {
    /// Initialize the tool
    Init = 1,
    /// Set the toolhead temperature setpoint
    SetToolheadTargetTemp = 3,
    /// Set the auxiliary motor speed
    SetMotor1SpeedRpm = 6,
    /// Switch the auxiliary motor on or off
    ToggleMotor1 = 10,
    /// Switch the cooling fan on or off
    ToggleFan = 12,
    /// Switch the auxiliary output on or off
    ToggleExtraOutput = 13,
    /// Pause the tool
    Pause = 23,
    /// Abort the tool's current operation
    Abort = 24,
    /// Set the build platform temperature setpoint
    SetPlatformTargetTemp = 31,
}

impl HostQuery {
    /// Wire opcode.
    pub fn opcode(self) -> u8 {
        self as u8
    }
}

impl HostAction {
    /// Wire opcode.
    pub fn opcode(self) -> u8 {
        self as u8
    }
}

impl ToolQuery {
    /// Wire sub-opcode.
    pub fn opcode(self) -> u8 {
        self as u8
    }
}

impl ToolAction {
    /// Wire sub-opcode.
    pub fn opcode(self) -> u8 {
        self as u8
    }
}
