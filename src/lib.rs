//! # Fablink
//!
//! A host-side driver for motion-control firmware (3D printers, CNC
//! controllers) speaking a framed binary protocol over a serial port or a
//! captured byte stream:
//!
//! - Packet codec with CRC-8/MAXIM framing and a streaming decoder
//! - Reliable command delivery with bounded retries and overflow backoff
//! - Typed host and tool command surface (motion, temperature, EEPROM,
//!   SD capture/playback, front panel)
//! - A motion state machine tracking position, offsets, and tool state,
//!   with DDA step-rate derivation from per-axis machine profiles
//! - A G-code front end mapping the supported dialect onto the above
//!
//! ## Example
//!
//! ```rust,no_run
//! use fablink::{Driver, GcodeInterpreter, MachineProfile, MotionController};
//! use fablink::transport::{SerialConfig, SerialTransport};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SerialConfig::new("/dev/ttyUSB0", 115_200);
//!     let transport = SerialTransport::open(&config)?;
//!     let mut driver = Driver::new(transport);
//!
//!     let firmware = driver.get_version()?;
//!     println!("firmware speaks protocol version {firmware}");
//!
//!     let motion = MotionController::new(driver, MachineProfile::five_axis());
//!     let mut gcode = GcodeInterpreter::new(motion);
//!     gcode.execute_line("G92 X0 Y0 Z0 A0 B0")?;
//!     gcode.execute_line("G1 X25 Y25 F3000")?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod axes;
pub mod commands;
pub mod driver;
pub mod machine;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
pub use crate::axes::{Axis, AxisSet, Point};
pub use crate::driver::{Driver, DriverStats, Error};
pub use crate::machine::{
    GcodeError, GcodeInterpreter, MachineProfile, MotionController, MotionError, OffsetRegister,
    Target, TrackedPosition,
};
pub use crate::protocol::{PacketDecoder, PacketError, ResponseCode};
pub use crate::transport::{ReplayTransport, SerialConfig, SerialTransport, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
