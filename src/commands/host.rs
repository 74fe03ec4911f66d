//! Host command builders and response parsers
//!
//! One builder per host opcode, returning the finished request payload, and
//! one parser per response layout. Builders validate everything they can
//! before any byte reaches the transport; parsers treat any layout
//! disagreement as a fatal [`ResponseError`].

use super::payload::{PayloadReader, PayloadWriter, RequestError, ResponseError};
use super::{HostAction, HostQuery, EEPROM_READ_CHUNK, EEPROM_WRITE_CHUNK, MAX_TOOL_INDEX};
use crate::axes::{AxisSet, AXIS_COUNT};
use bytes::Bytes;
use std::fmt;

/// SD card status codes returned by capture/playback commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdCode {
    /// Operation succeeded
    Success,
    /// No card inserted
    NoCard,
    /// Card initialization failed
    InitFailed,
    /// Partition table could not be read
    PartitionTableError,
    /// Filesystem could not be mounted
    FilesystemError,
    /// Directory walk failed
    DirectoryError,
    /// Code outside the documented set
    Other(u8),
}

impl SdCode {
    /// Decode an SD status byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::Success,
            1 => Self::NoCard,
            2 => Self::InitFailed,
            3 => Self::PartitionTableError,
            4 => Self::FilesystemError,
            5 => Self::DirectoryError,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for SdCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::NoCard => write!(f, "no card inserted"),
            Self::InitFailed => write!(f, "card initialization failed"),
            Self::PartitionTableError => write!(f, "partition table error"),
            Self::FilesystemError => write!(f, "filesystem error"),
            Self::DirectoryError => write!(f, "directory error"),
            Self::Other(code) => write!(f, "unknown sd code {code:#04x}"),
        }
    }
}

/// Legacy 3-axis position report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionReport {
    /// X, Y, Z step counts
    pub steps: [i32; 3],
    /// Endstop state bitfield
    pub endstops: u8,
}

/// Five-axis position report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedPositionReport {
    /// Step counts for all five axes
    pub steps: [i32; AXIS_COUNT],
    /// Endstop state bitfield, two bits per axis
    pub endstops: u16,
}

fn check_tool_index(tool: u8) -> Result<u8, RequestError> {
    if tool > MAX_TOOL_INDEX {
        return Err(RequestError::ToolIndexOutOfRange(tool));
    }
    Ok(tool)
}

// ============ Query builders ============

/// Version handshake carrying the host's own protocol version.
pub fn get_version(host_version: u16) -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostQuery::GetVersion.opcode())
        .u16(host_version)
        .finish()
}

/// Initialize the device to its power-on state.
pub fn init() -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostQuery::Init.opcode()).finish()
}

/// Query free space in the action buffer.
pub fn get_available_buffer_size() -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostQuery::GetAvailableBufferSize.opcode()).finish()
}

/// Drop every buffered action.
pub fn clear_buffer() -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostQuery::ClearBuffer.opcode()).finish()
}

/// Query the legacy 3-axis position.
pub fn get_position() -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostQuery::GetPosition.opcode()).finish()
}

/// Halt all motion and heaters immediately.
pub fn abort_immediately() -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostQuery::AbortImmediately.opcode()).finish()
}

/// Toggle the device pause state.
pub fn pause() -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostQuery::Pause.opcode()).finish()
}

/// Ask whether the action buffer has drained.
pub fn is_finished() -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostQuery::IsFinished.opcode()).finish()
}

/// Read `length` bytes of EEPROM starting at `offset`.
///
/// One message reads at most [`EEPROM_READ_CHUNK`] bytes.
pub fn read_eeprom(offset: u16, length: usize) -> Result<Bytes, RequestError> {
    if length > EEPROM_READ_CHUNK {
        return Err(RequestError::EepromChunkTooLong {
            len: length,
            limit: EEPROM_READ_CHUNK,
        });
    }
    PayloadWriter::new(HostQuery::ReadEeprom.opcode())
        .u16(offset)
        .u8(length as u8)
        .finish()
}

/// Write `data` to EEPROM starting at `offset`.
///
/// One message writes at most [`EEPROM_WRITE_CHUNK`] bytes.
pub fn write_eeprom(offset: u16, data: &[u8]) -> Result<Bytes, RequestError> {
    if data.len() > EEPROM_WRITE_CHUNK {
        return Err(RequestError::EepromChunkTooLong {
            len: data.len(),
            limit: EEPROM_WRITE_CHUNK,
        });
    }
    PayloadWriter::new(HostQuery::WriteEeprom.opcode())
        .u16(offset)
        .u8(data.len() as u8)
        .bytes(data)
        .finish()
}

/// Begin capturing the incoming command stream to an SD file.
pub fn capture_to_file(filename: &str) -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostQuery::CaptureToFile.opcode())
        .str(filename)
        .finish()
}

/// Finish an SD capture.
pub fn end_capture() -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostQuery::EndCapture.opcode()).finish()
}

/// Replay a captured SD file.
pub fn playback_capture(filename: &str) -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostQuery::PlaybackCapture.opcode())
        .str(filename)
        .finish()
}

/// Soft-reset the device.
pub fn reset() -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostQuery::Reset.opcode()).finish()
}

/// Walk the SD directory listing; `restart` rewinds to the first entry.
pub fn get_next_filename(restart: bool) -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostQuery::GetNextFilename.opcode())
        .u8(u8::from(restart))
        .finish()
}

/// Query the name of the build being played back.
pub fn get_build_name() -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostQuery::GetBuildName.opcode()).finish()
}

/// Query the five-axis position.
pub fn get_extended_position() -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostQuery::GetExtendedPosition.opcode()).finish()
}

/// Halt steppers and/or clear the action buffer.
pub fn extended_stop(halt_steppers: bool, clear_buffer: bool) -> Result<Bytes, RequestError> {
    let flags = u8::from(halt_steppers) | (u8::from(clear_buffer) << 1);
    PayloadWriter::new(HostQuery::ExtendedStop.opcode())
        .u8(flags)
        .finish()
}

// ============ Action builders ============

/// Queue a legacy 3-axis move at `dda` microseconds per step.
pub fn queue_point(steps: [i32; 3], dda: u32) -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostAction::QueuePoint.opcode())
        .i32(steps[0])
        .i32(steps[1])
        .i32(steps[2])
        .u32(dda)
        .finish()
}

/// Overwrite the device's legacy 3-axis position registers.
pub fn set_position(steps: [i32; 3]) -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostAction::SetPosition.opcode())
        .i32(steps[0])
        .i32(steps[1])
        .i32(steps[2])
        .finish()
}

fn find_axes(opcode: u8, axes: AxisSet, rate: u32, timeout_s: u16) -> Result<Bytes, RequestError> {
    PayloadWriter::new(opcode)
        .axes(axes)
        .u32(rate)
        .u16(timeout_s)
        .finish()
}

/// Home the listed axes toward their minimum endstops.
///
/// `rate` is the step interval in microseconds per step.
pub fn find_axes_minimums(axes: AxisSet, rate: u32, timeout_s: u16) -> Result<Bytes, RequestError> {
    find_axes(HostAction::FindAxesMinimums.opcode(), axes, rate, timeout_s)
}

/// Home the listed axes toward their maximum endstops.
pub fn find_axes_maximums(axes: AxisSet, rate: u32, timeout_s: u16) -> Result<Bytes, RequestError> {
    find_axes(HostAction::FindAxesMaximums.opcode(), axes, rate, timeout_s)
}

/// Pause the action queue for `ms` milliseconds.
pub fn delay(ms: u32) -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostAction::Delay.opcode()).u32(ms).finish()
}

/// Make `tool` the active tool.
pub fn change_tool(tool: u8) -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostAction::ChangeTool.opcode())
        .u8(check_tool_index(tool)?)
        .finish()
}

/// Block the queue until `tool` reaches its setpoint.
pub fn wait_for_tool_ready(tool: u8, poll_ms: u16, timeout_s: u16) -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostAction::WaitForToolReady.opcode())
        .u8(check_tool_index(tool)?)
        .u16(poll_ms)
        .u16(timeout_s)
        .finish()
}

/// Block the queue until the platform behind `tool` reaches its setpoint.
pub fn wait_for_platform_ready(
    tool: u8,
    poll_ms: u16,
    timeout_s: u16,
) -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostAction::WaitForPlatformReady.opcode())
        .u8(check_tool_index(tool)?)
        .u16(poll_ms)
        .u16(timeout_s)
        .finish()
}

/// Enable or disable the stepper drivers for `axes`.
pub fn enable_axes(axes: AxisSet, enable: bool) -> Result<Bytes, RequestError> {
    let bits = axes.bits() | if enable { 0x80 } else { 0x00 };
    PayloadWriter::new(HostAction::EnableAxes.opcode())
        .u8(bits)
        .finish()
}

/// Queue a five-axis move at `dda` microseconds per step.
pub fn queue_extended_point(steps: [i32; AXIS_COUNT], dda: u32) -> Result<Bytes, RequestError> {
    let mut writer = PayloadWriter::new(HostAction::QueueExtendedPoint.opcode());
    for step in steps {
        writer = writer.i32(step);
    }
    writer.u32(dda).finish()
}

/// Overwrite the device's five-axis position registers.
pub fn set_extended_position(steps: [i32; AXIS_COUNT]) -> Result<Bytes, RequestError> {
    let mut writer = PayloadWriter::new(HostAction::SetExtendedPosition.opcode());
    for step in steps {
        writer = writer.i32(step);
    }
    writer.finish()
}

/// Queue a five-axis move lasting `duration_ms`; axes in `relative` move
/// relative to the current position.
pub fn queue_extended_point_new(
    steps: [i32; AXIS_COUNT],
    duration_ms: u32,
    relative: AxisSet,
) -> Result<Bytes, RequestError> {
    let mut writer = PayloadWriter::new(HostAction::QueueExtendedPointNew.opcode());
    for step in steps {
        writer = writer.i32(step);
    }
    writer.u32(duration_ms).axes(relative).finish()
}

/// Block the queue until a front-panel button in `mask` is pressed.
pub fn wait_for_button(mask: u8, timeout_s: u16, options: u8) -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostAction::WaitForButton.opcode())
        .u8(mask)
        .u16(timeout_s)
        .u8(options)
        .finish()
}

/// Show `text` on the front panel at column `x`, row `y`.
pub fn display_message(
    options: u8,
    x: u8,
    y: u8,
    timeout_s: u8,
    text: &str,
) -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostAction::DisplayMessage.opcode())
        .u8(options)
        .u8(x)
        .u8(y)
        .u8(timeout_s)
        .str(text)
        .finish()
}

/// Update the build progress indicator (0..=100).
pub fn set_build_percent(percent: u8) -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostAction::SetBuildPercent.opcode())
        .u8(percent)
        .u8(0)
        .finish()
}

/// Announce the start of a host-driven build.
pub fn build_start_notification(command_count: u32, name: &str) -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostAction::BuildStartNotification.opcode())
        .u32(command_count)
        .str(name)
        .finish()
}

/// Announce the end of a host-driven build.
pub fn build_end_notification() -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostAction::BuildEndNotification.opcode()).finish()
}

// ============ Response parsers ============

/// Assert an empty response body (plain acknowledgement).
pub fn expect_empty(payload: &[u8]) -> Result<(), ResponseError> {
    PayloadReader::new(payload).finish()
}

/// Parse the device's protocol version.
pub fn parse_version(payload: &[u8]) -> Result<u16, ResponseError> {
    let mut reader = PayloadReader::new(payload);
    let version = reader.u16()?;
    reader.finish()?;
    Ok(version)
}

/// Parse the free buffer space.
pub fn parse_buffer_size(payload: &[u8]) -> Result<u32, ResponseError> {
    let mut reader = PayloadReader::new(payload);
    let size = reader.u32()?;
    reader.finish()?;
    Ok(size)
}

/// Parse the buffer-drained flag.
pub fn parse_is_finished(payload: &[u8]) -> Result<bool, ResponseError> {
    let mut reader = PayloadReader::new(payload);
    let finished = reader.u8()?;
    reader.finish()?;
    Ok(finished != 0)
}

/// Parse the legacy 3-axis position report.
pub fn parse_position(payload: &[u8]) -> Result<PositionReport, ResponseError> {
    let mut reader = PayloadReader::new(payload);
    let steps = [reader.i32()?, reader.i32()?, reader.i32()?];
    let endstops = reader.u8()?;
    reader.finish()?;
    Ok(PositionReport { steps, endstops })
}

/// Parse the five-axis position report.
pub fn parse_extended_position(payload: &[u8]) -> Result<ExtendedPositionReport, ResponseError> {
    let mut reader = PayloadReader::new(payload);
    let mut steps = [0i32; AXIS_COUNT];
    for step in &mut steps {
        *step = reader.i32()?;
    }
    let endstops = reader.u16()?;
    reader.finish()?;
    Ok(ExtendedPositionReport { steps, endstops })
}

/// Parse an EEPROM read, expecting exactly `length` data bytes.
pub fn parse_eeprom_read(payload: &[u8], length: usize) -> Result<Vec<u8>, ResponseError> {
    if payload.len() < length {
        return Err(ResponseError::Truncated {
            needed: length,
            remaining: payload.len(),
        });
    }
    if payload.len() > length {
        return Err(ResponseError::TrailingBytes {
            count: payload.len() - length,
        });
    }
    Ok(payload.to_vec())
}

/// Parse an EEPROM write echo, expecting it to match `wrote`.
pub fn parse_eeprom_write(payload: &[u8], wrote: usize) -> Result<(), ResponseError> {
    let mut reader = PayloadReader::new(payload);
    let echoed = reader.u8()? as usize;
    reader.finish()?;
    if echoed != wrote {
        return Err(ResponseError::EepromEchoMismatch { wrote, echoed });
    }
    Ok(())
}

/// Parse an SD status byte.
pub fn parse_sd_code(payload: &[u8]) -> Result<SdCode, ResponseError> {
    let mut reader = PayloadReader::new(payload);
    let code = SdCode::from_byte(reader.u8()?);
    reader.finish()?;
    Ok(code)
}

/// Parse the byte count reported by end-capture.
pub fn parse_end_capture(payload: &[u8]) -> Result<u32, ResponseError> {
    let mut reader = PayloadReader::new(payload);
    let bytes = reader.u32()?;
    reader.finish()?;
    Ok(bytes)
}

/// Parse a directory-walk response: SD status plus a filename.
pub fn parse_next_filename(payload: &[u8]) -> Result<(SdCode, String), ResponseError> {
    let mut reader = PayloadReader::new(payload);
    let code = SdCode::from_byte(reader.u8()?);
    let name = reader.str()?;
    reader.finish()?;
    Ok((code, name))
}

/// Parse the active build name.
pub fn parse_build_name(payload: &[u8]) -> Result<String, ResponseError> {
    let mut reader = PayloadReader::new(payload);
    let name = reader.str()?;
    reader.finish()?;
    Ok(name)
}

/// Parse the extended-stop acknowledgement; a nonzero byte is a failure.
pub fn parse_extended_stop(payload: &[u8]) -> Result<(), ResponseError> {
    let mut reader = PayloadReader::new(payload);
    let code = reader.u8()?;
    reader.finish()?;
    if code != 0 {
        return Err(ResponseError::ExtendedStopFailed(code));
    }
    Ok(())
}
