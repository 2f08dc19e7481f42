//! The G-code commands sent to a controller.
//!
//! Only the handful of instructions needed to probe a bed are supported. Each
//! one is written as a single ASCII line terminated by `\n`.
//!
//! ```
//! # use bedlevel::command::Command;
//! let cmd = Command::Probe { z: -2.5, feed: 100 };
//! assert_eq!(cmd.to_string(), "G38.2 Z-2.500000F100");
//! ```

use std::{fmt, io};

/// A controller instruction.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Command {
	/// Interpret coordinates as absolute positions (`G90`).
	Absolute,
	/// Interpret coordinates as offsets from the current position (`G91`).
	Relative,
	/// A linear move (`G1`). Axes that are `None` are not moved.
	Move {
		/// The X coordinate.
		x: Option<f64>,
		/// The Y coordinate.
		y: Option<f64>,
		/// The Z coordinate.
		z: Option<f64>,
		/// The feed rate, in millimeters per minute.
		feed: u32,
	},
	/// Move down towards `z`, stopping as soon as the probe makes contact (`G38.2`).
	Probe {
		/// The lowest Z coordinate the probe may travel to.
		z: f64,
		/// The feed rate, in millimeters per minute.
		feed: u32,
	},
	/// Redefine the current position as the origin (`G92`).
	SetOrigin,
}

impl Command {
	/// A move of only the Z axis.
	pub fn move_z(z: f64, feed: u32) -> Self {
		Command::Move {
			x: None,
			y: None,
			z: Some(z),
			feed,
		}
	}

	/// A move of only the X and Y axes.
	pub fn move_xy(x: f64, y: f64, feed: u32) -> Self {
		Command::Move {
			x: Some(x),
			y: Some(y),
			z: None,
			feed,
		}
	}

	/// Write the complete command line, including the terminating `\n`.
	pub fn write_into<W: io::Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
		writeln!(writer, "{self}")
	}
}

impl fmt::Display for Command {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match *self {
			Command::Absolute => f.write_str("G90"),
			Command::Relative => f.write_str("G91"),
			Command::Move { x, y, z, feed } => {
				f.write_str("G1")?;
				for (axis, value) in [('X', x), ('Y', y), ('Z', z)] {
					if let Some(value) = value {
						write!(f, " {axis}{value:.6}")?;
					}
				}
				write!(f, "F{feed}")
			}
			Command::Probe { z, feed } => write!(f, "G38.2 Z{z:.6}F{feed}"),
			Command::SetOrigin => f.write_str("G92 X0 Y0 Z0"),
		}
	}
}
