//! Tool command envelopes
//!
//! Tool-directed commands travel inside a host envelope: queries as
//! `[TOOL_QUERY, tool, sub-opcode, params...]`, actions as
//! `[TOOL_ACTION_COMMAND, tool, sub-opcode, length, params...]` where
//! `length` counts only the trailing parameter bytes. The tool index is
//! validated here, before any byte is sent.

use super::payload::{PayloadReader, PayloadWriter, RequestError, ResponseError};
use super::{HostAction, HostQuery, ToolAction, ToolQuery, MAX_TOOL_INDEX};
use bytes::Bytes;

fn check_tool_index(tool: u8) -> Result<u8, RequestError> {
    if tool > MAX_TOOL_INDEX {
        return Err(RequestError::ToolIndexOutOfRange(tool));
    }
    Ok(tool)
}

/// Build a tool query envelope.
pub fn query(tool: u8, op: ToolQuery, params: &[u8]) -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostQuery::ToolQuery.opcode())
        .u8(check_tool_index(tool)?)
        .u8(op.opcode())
        .bytes(params)
        .finish()
}

/// Build a tool action envelope; the parameter bytes get their own length
/// prefix.
pub fn action(tool: u8, op: ToolAction, params: &[u8]) -> Result<Bytes, RequestError> {
    PayloadWriter::new(HostAction::ToolActionCommand.opcode())
        .u8(check_tool_index(tool)?)
        .u8(op.opcode())
        .u8(params.len() as u8)
        .bytes(params)
        .finish()
}

// ============ Typed builders ============

/// Query a toolhead's current temperature.
pub fn get_toolhead_temp(tool: u8) -> Result<Bytes, RequestError> {
    query(tool, ToolQuery::GetToolheadTemp, &[])
}

/// Query a toolhead's temperature setpoint.
pub fn get_toolhead_target_temp(tool: u8) -> Result<Bytes, RequestError> {
    query(tool, ToolQuery::GetToolheadTargetTemp, &[])
}

/// Query the build platform's current temperature.
pub fn get_platform_temp(tool: u8) -> Result<Bytes, RequestError> {
    query(tool, ToolQuery::GetPlatformTemp, &[])
}

/// Query the build platform's temperature setpoint.
pub fn get_platform_target_temp(tool: u8) -> Result<Bytes, RequestError> {
    query(tool, ToolQuery::GetPlatformTargetTemp, &[])
}

/// Ask whether a toolhead has reached its setpoint.
pub fn is_tool_ready(tool: u8) -> Result<Bytes, RequestError> {
    query(tool, ToolQuery::IsToolReady, &[])
}

/// Ask whether the build platform has reached its setpoint.
pub fn is_platform_ready(tool: u8) -> Result<Bytes, RequestError> {
    query(tool, ToolQuery::IsPlatformReady, &[])
}

/// Set a toolhead's temperature setpoint in degrees Celsius.
pub fn set_toolhead_temp(tool: u8, celsius: i16) -> Result<Bytes, RequestError> {
    action(tool, ToolAction::SetToolheadTargetTemp, &celsius.to_le_bytes())
}

/// Set the build platform's temperature setpoint in degrees Celsius.
pub fn set_platform_temp(tool: u8, celsius: i16) -> Result<Bytes, RequestError> {
    action(tool, ToolAction::SetPlatformTargetTemp, &celsius.to_le_bytes())
}

/// Switch a tool's auxiliary motor on or off.
///
/// Bit 0 selects the direction (1 = clockwise), bit 1 enables the motor.
pub fn toggle_motor(tool: u8, enable: bool, clockwise: bool) -> Result<Bytes, RequestError> {
    let flags = (u8::from(enable) << 1) | u8::from(clockwise);
    action(tool, ToolAction::ToggleMotor1, &[flags])
}

/// Set a tool's auxiliary motor speed as a step interval in microseconds.
pub fn set_motor_speed(tool: u8, us_per_step: u32) -> Result<Bytes, RequestError> {
    action(tool, ToolAction::SetMotor1SpeedRpm, &us_per_step.to_le_bytes())
}

/// Switch a tool's cooling fan on or off.
pub fn toggle_fan(tool: u8, on: bool) -> Result<Bytes, RequestError> {
    action(tool, ToolAction::ToggleFan, &[u8::from(on)])
}

/// Switch a tool's auxiliary output on or off.
pub fn toggle_extra_output(tool: u8, on: bool) -> Result<Bytes, RequestError> {
    action(tool, ToolAction::ToggleExtraOutput, &[u8::from(on)])
}

// ============ Response parsers ============

/// Parse a temperature reading in degrees Celsius.
pub fn parse_temperature(payload: &[u8]) -> Result<i16, ResponseError> {
    let mut reader = PayloadReader::new(payload);
    let celsius = reader.i16()?;
    reader.finish()?;
    Ok(celsius)
}

/// Parse a readiness flag.
pub fn parse_ready(payload: &[u8]) -> Result<bool, ResponseError> {
    let mut reader = PayloadReader::new(payload);
    let ready = reader.u8()?;
    reader.finish()?;
    Ok(ready != 0)
}
