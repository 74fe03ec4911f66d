//! G-code front end
//!
//! A line parser for word-letter/value G-code and a dispatcher that maps
//! the supported dialect onto the motion controller and driver. Unknown
//! codes are rejected with a typed error, never silently accepted.

use super::motion::{MotionController, MotionError};
use super::position::{OffsetRegister, Target};
use crate::axes::{Axis, AxisSet};
use crate::driver;
use crate::transport::Transport;
use thiserror::Error;
use tracing::trace;

/// Default timeout for tool-change and heater waits, in seconds
const DEFAULT_WAIT_TIMEOUT_S: u16 = 120;

/// G-code errors
#[derive(Error, Debug)]
pub enum GcodeError {
    /// A word could not be parsed
    #[error("malformed g-code word {0:?}")]
    MalformedWord(String),

    /// The line carries no G, M, or T command word
    #[error("line has no command word: {0:?}")]
    MissingCommand(String),

    /// The code is outside the supported dialect
    #[error("unsupported code {letter}{number}")]
    UnsupportedCode {
        /// Command letter
        letter: char,
        /// Command number
        number: u16,
    },

    /// A required parameter word is absent
    #[error("missing required parameter {0}")]
    MissingParameter(char),

    /// A parameter value is outside its valid range
    #[error("parameter {param} value {value} out of range")]
    ParameterOutOfRange {
        /// Parameter letter
        param: char,
        /// Offending value
        value: f64,
    },

    /// The active tool has no axis to remap the E word onto
    #[error("no extrusion axis for tool {0}")]
    NoAxisForTool(u8),

    /// The motion layer rejected the operation
    #[error(transparent)]
    Motion(#[from] MotionError),

    /// The underlying command failed
    #[error(transparent)]
    Driver(#[from] driver::Error),
}

/// One parsed G-code line
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    /// Command letter: G, M, or T
    pub letter: char,
    /// Command number
    pub number: u16,
    /// Parameter words in order; axis words may carry no value
    pub params: Vec<(char, Option<f64>)>,
    /// Comment text, from `;` or parentheses
    pub comment: Option<String>,
}

impl ParsedLine {
    /// First value-carrying occurrence of a parameter word.
    pub fn param(&self, letter: char) -> Option<f64> {
        self.params
            .iter()
            .find(|(l, v)| *l == letter && v.is_some())
            .and_then(|(_, v)| *v)
    }

    /// Whether a parameter word appears at all, with or without a value.
    pub fn has(&self, letter: char) -> bool {
        self.params.iter().any(|(l, _)| *l == letter)
    }

    /// Axes named on the line, with or without values.
    pub fn axis_words(&self) -> AxisSet {
        self.params
            .iter()
            .filter_map(|(l, _)| Axis::from_letter(*l))
            .collect()
    }
}

/// Parse one G-code line.
///
/// Returns `Ok(None)` for blank and comment-only lines. Words may be
/// packed (`G1X5Y2`) or spaced; `;` and parenthesized comments are
/// captured; a leading `N` line number is ignored.
pub fn parse_line(line: &str) -> Result<Option<ParsedLine>, GcodeError> {
    let (code, semi_comment) = match line.find(';') {
        Some(i) => (&line[..i], Some(line[i + 1..].trim().to_string())),
        None => (line, None),
    };

    // Pull parenthesized comments out of the code text.
    let mut stripped = String::with_capacity(code.len());
    let mut paren_comment: Option<String> = None;
    let mut depth = 0usize;
    let mut current = String::new();
    for c in code.chars() {
        match c {
            '(' if depth == 0 => depth = 1,
            ')' if depth == 1 => {
                depth = 0;
                paren_comment.get_or_insert_with(|| current.trim().to_string());
                current.clear();
            }
            _ if depth > 0 => current.push(c),
            _ => stripped.push(c),
        }
    }

    let comment = paren_comment.or(semi_comment).filter(|c| !c.is_empty());

    // Scan letter/value words.
    let mut words: Vec<(char, Option<f64>)> = Vec::new();
    let mut chars = stripped.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if !c.is_ascii_alphabetic() {
            return Err(GcodeError::MalformedWord(c.to_string()));
        }
        let letter = c.to_ascii_uppercase();
        chars.next();

        let mut digits = String::new();
        while let Some(&d) = chars.peek() {
            if d.is_ascii_digit() || d == '.' || d == '-' || d == '+' {
                digits.push(d);
                chars.next();
            } else {
                break;
            }
        }
        let value = if digits.is_empty() {
            None
        } else {
            Some(
                digits
                    .parse::<f64>()
                    .map_err(|_| GcodeError::MalformedWord(format!("{letter}{digits}")))?,
            )
        };
        words.push((letter, value));
    }

    // Drop a leading line number.
    if matches!(words.first(), Some(('N', _))) {
        words.remove(0);
    }

    if words.is_empty() {
        return Ok(None);
    }

    let (letter, value) = words.remove(0);
    if !matches!(letter, 'G' | 'M' | 'T') {
        return Err(GcodeError::MissingCommand(line.trim().to_string()));
    }
    let value = value.ok_or_else(|| GcodeError::MalformedWord(letter.to_string()))?;
    if value < 0.0 || value.fract() != 0.0 {
        return Err(GcodeError::MalformedWord(format!("{letter}{value}")));
    }

    Ok(Some(ParsedLine {
        letter,
        number: value as u16,
        params: words,
        comment,
    }))
}

/// Dispatcher from parsed lines onto the motion controller
#[derive(Debug)]
pub struct GcodeInterpreter<T: Transport> {
    motion: MotionController<T>,
}

impl<T: Transport> GcodeInterpreter<T> {
    /// Wrap a motion controller.
    pub fn new(motion: MotionController<T>) -> Self {
        Self { motion }
    }

    /// The motion controller.
    pub fn motion(&self) -> &MotionController<T> {
        &self.motion
    }

    /// Mutable access for direct motion calls between lines.
    pub fn motion_mut(&mut self) -> &mut MotionController<T> {
        &mut self.motion
    }

    /// Consume the interpreter, yielding the motion controller.
    pub fn into_motion(self) -> MotionController<T> {
        self.motion
    }

    /// Parse and execute one line; blank and comment-only lines are no-ops.
    pub fn execute_line(&mut self, line: &str) -> Result<(), GcodeError> {
        let Some(parsed) = parse_line(line)? else {
            return Ok(());
        };
        trace!(code = %format!("{}{}", parsed.letter, parsed.number), "executing");
        self.execute(&parsed)
    }

    fn extrusion_axis(&self) -> Result<Axis, GcodeError> {
        match self.motion.tool() {
            0 => Ok(Axis::A),
            1 => Ok(Axis::B),
            tool => Err(GcodeError::NoAxisForTool(tool)),
        }
    }

    fn required(parsed: &ParsedLine, letter: char) -> Result<f64, GcodeError> {
        parsed
            .param(letter)
            .ok_or(GcodeError::MissingParameter(letter))
    }

    fn axes_or_all(&self, parsed: &ParsedLine) -> AxisSet {
        let named = parsed.axis_words();
        if named.is_empty() {
            Axis::ALL
                .into_iter()
                .take(self.motion.profile().axis_count as usize)
                .collect()
        } else {
            named
        }
    }

    fn linear_move(&mut self, parsed: &ParsedLine) -> Result<(), GcodeError> {
        if let Some(f) = parsed.param('F') {
            self.motion.set_feedrate(f)?;
        }

        let mut target = Target::new();
        for axis in Axis::ALL {
            if let Some(value) = parsed.param(axis.letter()) {
                target.set(axis, value);
            }
        }
        if let Some(e) = parsed.param('E') {
            target.set(self.extrusion_axis()?, e);
        }

        if target.is_empty() {
            // Feedrate-only line.
            return Ok(());
        }

        let feedrate = self.motion.feedrate().ok_or(MotionError::FeedrateUnset)?;
        self.motion.move_to(&target, feedrate)?;
        Ok(())
    }

    fn offset_register(parsed: &ParsedLine) -> Result<OffsetRegister, GcodeError> {
        let p = Self::required(parsed, 'P')?;
        match p as i64 {
            1 => Ok(OffsetRegister::First),
            2 => Ok(OffsetRegister::Second),
            _ => Err(GcodeError::ParameterOutOfRange {
                param: 'P',
                value: p,
            }),
        }
    }

    fn execute(&mut self, parsed: &ParsedLine) -> Result<(), GcodeError> {
        match (parsed.letter, parsed.number) {
            ('G', 0) | ('G', 1) => self.linear_move(parsed),
            ('G', 4) => {
                let ms = Self::required(parsed, 'P')?;
                self.motion.dwell(ms as u32)?;
                Ok(())
            }
            ('G', 10) => {
                let register = Self::offset_register(parsed)?;
                let mut offset = self.motion.position().offset(register);
                for axis in Axis::ALL {
                    if let Some(value) = parsed.param(axis.letter()) {
                        offset[axis] = value;
                    }
                }
                self.motion.set_offset(register, offset);
                Ok(())
            }
            ('G', 53) => {
                self.motion.select_offset_register(OffsetRegister::None);
                Ok(())
            }
            ('G', 54) => {
                self.motion.select_offset_register(OffsetRegister::First);
                Ok(())
            }
            ('G', 55) => {
                self.motion.select_offset_register(OffsetRegister::Second);
                Ok(())
            }
            ('G', 92) => {
                let mut point = self.motion.position().workspace();
                for axis in Axis::ALL {
                    if let Some(value) = parsed.param(axis.letter()) {
                        point[axis] = value;
                    }
                }
                self.motion.set_position(point)?;
                Ok(())
            }
            ('G', 161) | ('G', 162) => {
                let axes = parsed.axis_words();
                if axes.is_empty() {
                    return Err(GcodeError::MissingParameter('X'));
                }
                let feedrate = Self::required(parsed, 'F')?;
                if parsed.number == 161 {
                    self.motion.home_minimums(axes, feedrate)?;
                } else {
                    self.motion.home_maximums(axes, feedrate)?;
                }
                Ok(())
            }
            ('M', 6) => {
                if let Some(t) = parsed.param('T') {
                    let tool = t as u8;
                    self.motion.set_tool(tool)?;
                    self.motion.driver_mut().change_tool(tool)?;
                }
                let timeout = parsed
                    .param('P')
                    .map_or(DEFAULT_WAIT_TIMEOUT_S, |p| p as u16);
                self.motion.wait_for_tool(timeout)?;
                Ok(())
            }
            ('M', 17) => {
                let axes = self.axes_or_all(parsed);
                self.motion.enable_axes(axes, true)?;
                Ok(())
            }
            ('M', 18) => {
                let axes = self.axes_or_all(parsed);
                self.motion.enable_axes(axes, false)?;
                Ok(())
            }
            ('M', 70) => {
                let timeout = parsed.param('P').map_or(0, |p| p as u8);
                let text = parsed.comment.clone().unwrap_or_default();
                self.motion
                    .driver_mut()
                    .display_message(0, 0, 0, timeout, &text)?;
                Ok(())
            }
            ('M', 71) => {
                let timeout = parsed.param('P').map_or(0, |p| p as u16);
                let text = parsed.comment.clone().unwrap_or_default();
                let driver = self.motion.driver_mut();
                driver.display_message(0, 0, 0, 0, &text)?;
                driver.wait_for_button(0xFF, timeout, 0)?;
                Ok(())
            }
            ('M', 101) => {
                let tool = self.motion.tool();
                self.motion.driver_mut().toggle_motor(tool, true, true)?;
                Ok(())
            }
            ('M', 102) => {
                let tool = self.motion.tool();
                self.motion.driver_mut().toggle_motor(tool, true, false)?;
                Ok(())
            }
            ('M', 103) => {
                let tool = self.motion.tool();
                self.motion.driver_mut().toggle_motor(tool, false, false)?;
                Ok(())
            }
            ('M', 104) => {
                let celsius = Self::required(parsed, 'S')?;
                let tool = parsed.param('T').map_or(self.motion.tool(), |t| t as u8);
                self.motion
                    .driver_mut()
                    .set_toolhead_temperature(tool, celsius as i16)?;
                Ok(())
            }
            ('M', 106) => {
                let tool = self.motion.tool();
                self.motion.driver_mut().toggle_fan(tool, true)?;
                Ok(())
            }
            ('M', 107) => {
                let tool = self.motion.tool();
                self.motion.driver_mut().toggle_fan(tool, false)?;
                Ok(())
            }
            ('M', 109) => {
                let celsius = Self::required(parsed, 'S')?;
                let tool = parsed.param('T').map_or(self.motion.tool(), |t| t as u8);
                self.motion
                    .driver_mut()
                    .set_platform_temperature(tool, celsius as i16)?;
                Ok(())
            }
            ('M', 133) => {
                if let Some(t) = parsed.param('T') {
                    self.motion.set_tool(t as u8)?;
                }
                let timeout = parsed
                    .param('P')
                    .map_or(DEFAULT_WAIT_TIMEOUT_S, |p| p as u16);
                self.motion.wait_for_tool(timeout)?;
                Ok(())
            }
            ('M', 134) => {
                let timeout = parsed
                    .param('P')
                    .map_or(DEFAULT_WAIT_TIMEOUT_S, |p| p as u16);
                self.motion.wait_for_platform(timeout)?;
                Ok(())
            }
            ('T', tool) => {
                let tool = tool as u8;
                self.motion.set_tool(tool)?;
                self.motion.driver_mut().change_tool(tool)?;
                Ok(())
            }
            (letter, number) => Err(GcodeError::UnsupportedCode { letter, number }),
        }
    }
}
