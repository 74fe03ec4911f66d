//! Typed command operations
//!
//! One method per wire operation, combining the command-layer builder, the
//! retry engine, and the response parser. EEPROM access is chunked here to
//! honor the per-message limits.

use super::{Driver, Error};
use crate::axes::{AxisSet, AXIS_COUNT};
use crate::commands::host::{self, ExtendedPositionReport, PositionReport, SdCode};
use crate::commands::tool;
use crate::commands::{ToolAction, ToolQuery, EEPROM_READ_CHUNK, EEPROM_WRITE_CHUNK};
use crate::transport::Transport;
use bytes::Bytes;
use tracing::debug;

/// Protocol version this host implementation speaks
pub const HOST_API_VERSION: u16 = 100;

impl<T: Transport> Driver<T> {
    fn send_ack(&mut self, request: Bytes) -> Result<(), Error> {
        let response = self.send(&request)?;
        host::expect_empty(&response)?;
        Ok(())
    }

    fn send_sd(&mut self, request: Bytes) -> Result<(), Error> {
        let response = self.send(&request)?;
        match host::parse_sd_code(&response)? {
            SdCode::Success => Ok(()),
            code => Err(Error::SdCard(code)),
        }
    }

    // ============ Queries ============

    /// Exchange protocol versions with the device.
    pub fn get_version(&mut self) -> Result<u16, Error> {
        let response = self.send(&host::get_version(HOST_API_VERSION)?)?;
        Ok(host::parse_version(&response)?)
    }

    /// Initialize the device to its power-on state.
    pub fn init(&mut self) -> Result<(), Error> {
        self.send_ack(host::init()?)
    }

    /// Free slots in the device's action buffer, in bytes.
    pub fn get_available_buffer_size(&mut self) -> Result<u32, Error> {
        let response = self.send(&host::get_available_buffer_size()?)?;
        Ok(host::parse_buffer_size(&response)?)
    }

    /// Drop every buffered action.
    pub fn clear_buffer(&mut self) -> Result<(), Error> {
        self.send_ack(host::clear_buffer()?)
    }

    /// Legacy 3-axis position in steps.
    pub fn get_position(&mut self) -> Result<PositionReport, Error> {
        let response = self.send(&host::get_position()?)?;
        Ok(host::parse_position(&response)?)
    }

    /// Five-axis position in steps.
    pub fn get_extended_position(&mut self) -> Result<ExtendedPositionReport, Error> {
        let response = self.send(&host::get_extended_position()?)?;
        Ok(host::parse_extended_position(&response)?)
    }

    /// Halt all motion and heaters immediately.
    pub fn abort_immediately(&mut self) -> Result<(), Error> {
        self.send_ack(host::abort_immediately()?)
    }

    /// Toggle the device pause state.
    pub fn pause(&mut self) -> Result<(), Error> {
        self.send_ack(host::pause()?)
    }

    /// Whether the action buffer has drained.
    pub fn is_finished(&mut self) -> Result<bool, Error> {
        let response = self.send(&host::is_finished()?)?;
        Ok(host::parse_is_finished(&response)?)
    }

    /// Soft-reset the device.
    pub fn reset(&mut self) -> Result<(), Error> {
        self.send_ack(host::reset()?)
    }

    /// Halt steppers and/or clear the action buffer.
    pub fn extended_stop(&mut self, halt_steppers: bool, clear_buffer: bool) -> Result<(), Error> {
        let response = self.send(&host::extended_stop(halt_steppers, clear_buffer)?)?;
        host::parse_extended_stop(&response)?;
        Ok(())
    }

    /// Read `length` bytes of EEPROM starting at `offset`, splitting into
    /// per-message chunks as needed.
    pub fn read_eeprom(&mut self, offset: u16, length: usize) -> Result<Vec<u8>, Error> {
        let mut data = Vec::with_capacity(length);
        let mut cursor = offset;
        let mut remaining = length;

        while remaining > 0 {
            let chunk = remaining.min(EEPROM_READ_CHUNK);
            let response = self.send(&host::read_eeprom(cursor, chunk)?)?;
            data.extend_from_slice(&host::parse_eeprom_read(&response, chunk)?);
            cursor = cursor.wrapping_add(chunk as u16);
            remaining -= chunk;
        }

        debug!(offset, length, "eeprom read");
        Ok(data)
    }

    /// Write `data` to EEPROM starting at `offset`, splitting into
    /// per-message chunks as needed.
    pub fn write_eeprom(&mut self, offset: u16, data: &[u8]) -> Result<(), Error> {
        let mut cursor = offset;

        for chunk in data.chunks(EEPROM_WRITE_CHUNK) {
            let response = self.send(&host::write_eeprom(cursor, chunk)?)?;
            host::parse_eeprom_write(&response, chunk.len())?;
            cursor = cursor.wrapping_add(chunk.len() as u16);
        }

        debug!(offset, length = data.len(), "eeprom written");
        Ok(())
    }

    /// Begin capturing the command stream to an SD file.
    pub fn capture_to_file(&mut self, filename: &str) -> Result<(), Error> {
        self.send_sd(host::capture_to_file(filename)?)
    }

    /// Finish an SD capture; returns the captured byte count.
    pub fn end_capture(&mut self) -> Result<u32, Error> {
        let response = self.send(&host::end_capture()?)?;
        Ok(host::parse_end_capture(&response)?)
    }

    /// Replay a captured SD file.
    pub fn playback_capture(&mut self, filename: &str) -> Result<(), Error> {
        self.send_sd(host::playback_capture(filename)?)
    }

    /// Walk the SD directory listing; an empty name marks the end.
    pub fn get_next_filename(&mut self, restart: bool) -> Result<String, Error> {
        let response = self.send(&host::get_next_filename(restart)?)?;
        let (code, name) = host::parse_next_filename(&response)?;
        match code {
            SdCode::Success => Ok(name),
            code => Err(Error::SdCard(code)),
        }
    }

    /// Name of the build being played back.
    pub fn get_build_name(&mut self) -> Result<String, Error> {
        let response = self.send(&host::get_build_name()?)?;
        Ok(host::parse_build_name(&response)?)
    }

    // ============ Actions ============

    /// Queue a legacy 3-axis move at `dda` microseconds per step.
    pub fn queue_point(&mut self, steps: [i32; 3], dda: u32) -> Result<(), Error> {
        self.send_ack(host::queue_point(steps, dda)?)
    }

    /// Overwrite the device's legacy 3-axis position registers.
    pub fn set_position(&mut self, steps: [i32; 3]) -> Result<(), Error> {
        self.send_ack(host::set_position(steps)?)
    }

    /// Queue a five-axis move at `dda` microseconds per step.
    pub fn queue_extended_point(
        &mut self,
        steps: [i32; AXIS_COUNT],
        dda: u32,
    ) -> Result<(), Error> {
        self.send_ack(host::queue_extended_point(steps, dda)?)
    }

    /// Overwrite the device's five-axis position registers.
    pub fn set_extended_position(&mut self, steps: [i32; AXIS_COUNT]) -> Result<(), Error> {
        self.send_ack(host::set_extended_position(steps)?)
    }

    /// Queue a five-axis move lasting `duration_ms`.
    pub fn queue_extended_point_new(
        &mut self,
        steps: [i32; AXIS_COUNT],
        duration_ms: u32,
        relative: AxisSet,
    ) -> Result<(), Error> {
        self.send_ack(host::queue_extended_point_new(steps, duration_ms, relative)?)
    }

    /// Home the listed axes toward their minimum endstops.
    pub fn find_axes_minimums(
        &mut self,
        axes: AxisSet,
        rate: u32,
        timeout_s: u16,
    ) -> Result<(), Error> {
        self.send_ack(host::find_axes_minimums(axes, rate, timeout_s)?)
    }

    /// Home the listed axes toward their maximum endstops.
    pub fn find_axes_maximums(
        &mut self,
        axes: AxisSet,
        rate: u32,
        timeout_s: u16,
    ) -> Result<(), Error> {
        self.send_ack(host::find_axes_maximums(axes, rate, timeout_s)?)
    }

    /// Pause the action queue for `ms` milliseconds.
    pub fn delay(&mut self, ms: u32) -> Result<(), Error> {
        self.send_ack(host::delay(ms)?)
    }

    /// Make `tool` the active tool.
    pub fn change_tool(&mut self, tool: u8) -> Result<(), Error> {
        self.send_ack(host::change_tool(tool)?)
    }

    /// Block the queue until `tool` reaches its setpoint.
    pub fn wait_for_tool_ready(
        &mut self,
        tool: u8,
        poll_ms: u16,
        timeout_s: u16,
    ) -> Result<(), Error> {
        self.send_ack(host::wait_for_tool_ready(tool, poll_ms, timeout_s)?)
    }

    /// Block the queue until the build platform reaches its setpoint.
    pub fn wait_for_platform_ready(
        &mut self,
        tool: u8,
        poll_ms: u16,
        timeout_s: u16,
    ) -> Result<(), Error> {
        self.send_ack(host::wait_for_platform_ready(tool, poll_ms, timeout_s)?)
    }

    /// Enable or disable the stepper drivers for `axes`.
    pub fn enable_axes(&mut self, axes: AxisSet, enable: bool) -> Result<(), Error> {
        self.send_ack(host::enable_axes(axes, enable)?)
    }

    /// Block the queue until a front-panel button is pressed.
    pub fn wait_for_button(&mut self, mask: u8, timeout_s: u16, options: u8) -> Result<(), Error> {
        self.send_ack(host::wait_for_button(mask, timeout_s, options)?)
    }

    /// Show `text` on the front panel.
    pub fn display_message(
        &mut self,
        options: u8,
        x: u8,
        y: u8,
        timeout_s: u8,
        text: &str,
    ) -> Result<(), Error> {
        self.send_ack(host::display_message(options, x, y, timeout_s, text)?)
    }

    /// Update the build progress indicator (0..=100).
    pub fn set_build_percent(&mut self, percent: u8) -> Result<(), Error> {
        self.send_ack(host::set_build_percent(percent)?)
    }

    /// Announce the start of a host-driven build.
    pub fn build_start_notification(
        &mut self,
        command_count: u32,
        name: &str,
    ) -> Result<(), Error> {
        self.send_ack(host::build_start_notification(command_count, name)?)
    }

    /// Announce the end of a host-driven build.
    pub fn build_end_notification(&mut self) -> Result<(), Error> {
        self.send_ack(host::build_end_notification()?)
    }

    // ============ Tool commands ============

    /// Send a raw tool query and return its response payload.
    pub fn tool_query(&mut self, tool_index: u8, op: ToolQuery, params: &[u8]) -> Result<Bytes, Error> {
        let request = tool::query(tool_index, op, params)?;
        self.send(&request)
    }

    /// Send a raw tool action.
    pub fn tool_action(&mut self, tool_index: u8, op: ToolAction, params: &[u8]) -> Result<(), Error> {
        self.send_ack(tool::action(tool_index, op, params)?)
    }

    /// Toolhead temperature in degrees Celsius.
    pub fn get_toolhead_temperature(&mut self, tool_index: u8) -> Result<i16, Error> {
        let response = self.send(&tool::get_toolhead_temp(tool_index)?)?;
        Ok(tool::parse_temperature(&response)?)
    }

    /// Set a toolhead's temperature setpoint.
    pub fn set_toolhead_temperature(&mut self, tool_index: u8, celsius: i16) -> Result<(), Error> {
        self.send_ack(tool::set_toolhead_temp(tool_index, celsius)?)
    }

    /// Build platform temperature in degrees Celsius.
    pub fn get_platform_temperature(&mut self, tool_index: u8) -> Result<i16, Error> {
        let response = self.send(&tool::get_platform_temp(tool_index)?)?;
        Ok(tool::parse_temperature(&response)?)
    }

    /// Set the build platform's temperature setpoint.
    pub fn set_platform_temperature(&mut self, tool_index: u8, celsius: i16) -> Result<(), Error> {
        self.send_ack(tool::set_platform_temp(tool_index, celsius)?)
    }

    /// Whether a toolhead has reached its setpoint.
    pub fn is_tool_ready(&mut self, tool_index: u8) -> Result<bool, Error> {
        let response = self.send(&tool::is_tool_ready(tool_index)?)?;
        Ok(tool::parse_ready(&response)?)
    }

    /// Whether the build platform has reached its setpoint.
    pub fn is_platform_ready(&mut self, tool_index: u8) -> Result<bool, Error> {
        let response = self.send(&tool::is_platform_ready(tool_index)?)?;
        Ok(tool::parse_ready(&response)?)
    }

    /// Switch a tool's auxiliary motor on or off.
    pub fn toggle_motor(
        &mut self,
        tool_index: u8,
        enable: bool,
        clockwise: bool,
    ) -> Result<(), Error> {
        self.send_ack(tool::toggle_motor(tool_index, enable, clockwise)?)
    }

    /// Switch a tool's cooling fan on or off.
    pub fn toggle_fan(&mut self, tool_index: u8, on: bool) -> Result<(), Error> {
        self.send_ack(tool::toggle_fan(tool_index, on)?)
    }

    /// Switch a tool's auxiliary output on or off.
    pub fn toggle_extra_output(&mut self, tool_index: u8, on: bool) -> Result<(), Error> {
        self.send_ack(tool::toggle_extra_output(tool_index, on)?)
    }
}
