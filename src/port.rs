//! Types for opening and using a port connected to a motion controller.
//!
//! A [`Port`] owns the underlying [`Backend`] for as long as it lives. It sends
//! [`Command`]s and reassembles whatever the controller sends back into lines,
//! which are read through the [`Lines`](iter::Lines) iterator.
//!
//! ```rust
//! # use bedlevel::{command::Command, port::Port};
//! # use std::time::Duration;
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let mut port = Port::open_serial("/dev/ttyUSB0")?;
//! port.command(&Command::Absolute)?;
//! for line in port.lines(Duration::from_millis(200))? {
//!     println!("{}", line?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod iter;
mod options;

#[cfg(any(test, feature = "mock"))]
use crate::backend::Mock;
use crate::{
	backend::{Backend, Serial, UNKNOWN_BACKEND_NAME},
	command::Command,
	error::{ProbeError, TransportClosedError},
	line::LineBuffer,
	timeout_guard::TimeoutGuard,
};
pub use options::*;
use std::{io, time::Duration};

/// The direction a line was sent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
	/// The line was transmitted to the controller.
	Tx,
	/// The line was received from the controller.
	Recv,
}

/// A callback invoked with every line sent or received.
type LineHandler<'a> = Box<dyn FnMut(&[u8], Direction) + 'a>;

/// A port connected to a motion controller.
///
/// See the [`port`](crate::port) module-level documentation for details on how to use a `Port`.
///
/// Use [`open_serial`](Port::open_serial) to open a serial port, or
/// [`OpenSerialOptions`] to customize how it is opened.
pub struct Port<'a, B> {
	/// The underlying backend
	backend: B,
	/// Received bytes that have not yet formed a complete line.
	buffer: LineBuffer,
	/// If populated, the error that has "poisoned" the port. This error MUST be
	/// reported before the port is used for communication again.
	///
	/// For instance, if a [`TimeoutGuard`] cannot restore the original timeout
	/// in its Drop implementation, rather than panicking it poisons the port.
	poison: Option<io::Error>,
	/// User supplied line handler
	handler: Option<LineHandler<'a>>,
}

impl<B: Backend> std::fmt::Debug for Port<'_, B> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Port")
			.field("name", &self.backend.name())
			.field("buffer", &self.buffer)
			.finish_non_exhaustive()
	}
}

impl<'a> Port<'a, Serial> {
	/// Open the serial port at the specified path using the default options.
	///
	/// Alternatively, use [`Port::open_serial_options`] to customize how the port is opened.
	pub fn open_serial(path: &str) -> Result<Port<'a, Serial>, ProbeError> {
		OpenSerialOptions::new().open(path)
	}

	/// Get an [`OpenSerialOptions`] to customize how a serial port is opened.
	pub fn open_serial_options() -> OpenSerialOptions {
		OpenSerialOptions::default()
	}
}

#[cfg(any(test, feature = "mock"))]
#[cfg_attr(all(doc, feature = "doc_cfg"), doc(cfg(feature = "mock")))]
impl Port<'_, Mock> {
	/// Create a port with an empty [`Mock`] backend.
	pub fn open_mock() -> Self {
		Port::from_backend(Mock::new())
	}
}

impl<'a, B: Backend> Port<'a, B> {
	/// Create a `Port` from a [`Backend`] type.
	pub fn from_backend(backend: B) -> Self {
		Port {
			backend,
			buffer: LineBuffer::new(),
			poison: None,
			handler: None,
		}
	}

	/// Check if the port is poisoned and report the error if it exists.
	fn check_poisoned(&mut self) -> Result<(), io::Error> {
		if let Some(poison) = self.poison.take() {
			Err(poison)
		} else {
			Ok(())
		}
	}

	/// Poison the port so the error is reported by the next operation.
	pub(crate) fn poison(&mut self, e: io::Error) {
		self.poison = Some(e);
	}

	/// The backend name used in log messages.
	fn log_name(&self) -> String {
		self.backend
			.name()
			.unwrap_or_else(|| UNKNOWN_BACKEND_NAME.to_string())
	}

	/// Send a command. Nothing is read.
	///
	/// A write that makes no progress means the controller has gone away and
	/// is reported as a [`TransportClosedError`].
	pub fn command(&mut self, cmd: &Command) -> Result<(), ProbeError> {
		self.check_poisoned()?;

		let mut buffer = Vec::with_capacity(48);
		cmd.write_into(&mut buffer)?;
		log::debug!(
			"{} TX:   {}",
			self.log_name(),
			String::from_utf8_lossy(&buffer).trim_end()
		);
		self.backend.write_all(&buffer).map_err(|e| {
			if e.kind() == io::ErrorKind::WriteZero {
				ProbeError::from(TransportClosedError::new("write"))
			} else {
				ProbeError::from(e)
			}
		})?;
		self.backend.flush()?;
		if let Some(callback) = self.handler.as_mut() {
			(callback)(&buffer, Direction::Tx);
		}
		Ok(())
	}

	/// Get an iterator over the lines received within `timeout` of each other.
	///
	/// The iterator ends once a read times out without any new data. Bytes of
	/// an incomplete line are kept by the port and completed by later reads.
	/// The port's original read timeout is restored when the iterator is
	/// dropped.
	///
	/// ## Example
	///
	/// ```
	/// # use bedlevel::{backend::Backend, port::Port};
	/// # use std::time::Duration;
	/// # fn wrapper<B: Backend>(mut port: Port<'_, B>) -> Result<(), Box<dyn std::error::Error>> {
	/// for line in port.lines(Duration::from_secs(1))? {
	///     let line = line?;
	///     if line.contains("\"prb\"") {
	///         break;
	///     }
	/// }
	/// # Ok(())
	/// # }
	/// ```
	pub fn lines(&mut self, timeout: Duration) -> Result<iter::Lines<'_, 'a, B>, ProbeError> {
		let guard = self.timeout_guard(Some(timeout))?;
		Ok(iter::Lines::new(guard))
	}

	/// Read the next complete line.
	///
	/// Returns `Ok(None)` if the read timed out before a line was completed.
	fn read_line(&mut self) -> Result<Option<String>, ProbeError> {
		self.check_poisoned()?;
		loop {
			if let Some(line) = self.buffer.next_line() {
				log::debug!("{} RECV: {}", self.log_name(), line);
				if let Some(callback) = self.handler.as_mut() {
					(callback)(line.as_bytes(), Direction::Recv);
				}
				return Ok(Some(line));
			}

			let dropped = self.buffer.discard_if_overrun();
			if dropped > 0 {
				log::warn!(
					"{} discarded {dropped} bytes received without a line terminator",
					self.log_name()
				);
			}

			match self.backend.read(self.buffer.spare()) {
				Ok(0) => return Err(TransportClosedError::new("read").into()),
				Ok(n) => self.buffer.commit(n),
				Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
					return Ok(None)
				}
				Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
				Err(e) => return Err(e.into()),
			}
		}
	}

	/// The number of received bytes waiting for a line terminator.
	pub fn pending(&self) -> usize {
		self.buffer.len()
	}

	/// Set the port timeout and return a "scope guard" that will reset the timeout when it goes out of scope.
	///
	/// If not timeout is specified, reads can block indefinitely.
	///
	/// While the guard is in scope, the port can only be accessed through the guard.
	/// However, because the guard implements [`Deref`](std::ops::Deref) and [`DerefMut`](std::ops::DerefMut) callers can treat the guard as the port.
	pub fn timeout_guard(
		&mut self,
		timeout: Option<Duration>,
	) -> Result<TimeoutGuard<'_, 'a, B>, io::Error> {
		self.check_poisoned()?;

		TimeoutGuard::new(self, timeout)
	}

	/// Set the read timeout and return the old timeout.
	///
	/// If timeout is `None`, reads will block indefinitely.
	pub fn set_read_timeout(
		&mut self,
		timeout: Option<Duration>,
	) -> Result<Option<Duration>, io::Error> {
		let old = self.backend.read_timeout()?;
		self.backend.set_read_timeout(timeout)?;
		Ok(old)
	}

	/// Get the read timeout.
	///
	/// If it is `None`, reads will block indefinitely.
	pub fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		self.backend.read_timeout()
	}

	/// Get the "name" of the port's backend.
	///
	/// This is often the path passed to [`Port::open_serial`].
	pub fn name(&self) -> Option<String> {
		self.backend.name()
	}

	/// Get a referenced to the backend.
	pub fn backend(&self) -> &B {
		&self.backend
	}

	/// Get a mutable reference to the backend.
	pub fn backend_mut(&mut self) -> &mut B {
		&mut self.backend
	}

	/// Consume the port and return the underlying backend.
	///
	/// Note that any partial line the port has buffered will be lost.
	pub fn into_backend(self) -> B {
		self.backend
	}

	/// Set a callback that will be called immediately after any line is sent
	/// or received.
	///
	/// If a previous callback was set, it is replaced.
	///
	/// Note, the Port already logs lines via the [`log`] crate, so logging is
	/// best handled via a log handler, such as
	/// [`simple_logger`](https://crates.io/crates/simple_logger), rather than
	/// a line callback. The callback is most useful when the lines are needed
	/// directly, for instance to show them in an application.
	///
	/// Transmitted lines include their terminating `\n`; received lines do not.
	pub fn set_line_handler<F>(&mut self, callback: F)
	where
		F: FnMut(&[u8], Direction) + 'a,
	{
		self.handler = Some(Box::new(callback));
	}

	/// Clear any callback registered via [`set_line_handler`](Port::set_line_handler).
	pub fn clear_line_handler(&mut self) {
		self.handler = None;
	}
}
