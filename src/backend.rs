//! Types that can exchange (read/write) bytes with a connected controller.
//!
//! The [`Backend`] trait represents all such types.

use std::io;
use std::time::Duration;

use serialport as sp;

#[cfg(windows)]
use sp::COMPort as ExternSerial;
use sp::SerialPort;
#[cfg(unix)]
use sp::TTYPort as ExternSerial;

/// The placeholder name for a backend that doesn't have a name.
pub(crate) const UNKNOWN_BACKEND_NAME: &str = "<unknown backend>";

/// Types that allow reading and writing bytes with a connected controller.
pub trait Backend: io::Read + io::Write + private::Sealed {
	/// Set the read timeout.
	///
	/// If timeout is `None`, reads will block indefinitely.
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error>;

	/// Get the read timeout.
	///
	/// If timeout is `None`, reads will block indefinitely.
	fn read_timeout(&self) -> Result<Option<Duration>, io::Error>;

	/// Get the "name" of the backend.
	///
	/// This can be in any format, but should uniquely identify the backend
	/// instance.
	fn name(&self) -> Option<String>;
}

/// A platform agnostic serial port backend.
//
// The `serialport` crate exposes two platform specific serial ports, `COMPort`
// and `TTYPort` for windows and unix, respectively. Wrapping whichever one is
// chosen at compile time in `Serial` lets the rest of the crate use a single
// concrete type without dynamic dispatch or an extra type parameter.
#[derive(Debug)]
pub struct Serial(pub(crate) ExternSerial);

impl io::Read for Serial {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		self.0.read(buf)
	}
}

impl io::Write for Serial {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.0.write(buf)
	}

	fn flush(&mut self) -> io::Result<()> {
		self.0.flush()
	}
}

impl Backend for Serial {
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		// The serialport API does not support infinite timeouts, so simply set
		// the timeout to the largest possible duration if `timeout` is `None`,
		// which is practically infinite.
		Ok(self.0.set_timeout(timeout.unwrap_or(Duration::MAX))?)
	}
	fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		Ok(Some(self.0.timeout()))
	}
	fn name(&self) -> Option<String> {
		self.0.name()
	}
}

/// The function a [`Mock`] calls with every complete line written to it.
#[cfg(any(test, feature = "mock"))]
type Responder = Box<dyn FnMut(&str) -> Vec<Vec<u8>>>;

/// A mock backend for use in testing.
///
/// It has the following features:
///   * It records every line written to it.
///   * It can be filled with chunks of data for reading. Each call to `read`
///     returns data from at most one chunk, so a line can be split across
///     reads by pushing it in pieces.
///   * A responder can generate data for reading from each line written to
///     it, simulating a controller.
///   * Once empty, reads fail with a simulated timeout, or return zero bytes
///     if the mock has been [`disconnect`](Mock::disconnect)ed.
///   * Specific errors can be inserted for calls to `read`, `write`, and `flush`.
#[cfg(any(test, feature = "mock"))]
#[cfg_attr(all(doc, feature = "doc_cfg"), doc(cfg(feature = "mock")))]
pub struct Mock {
	/// The chunks data is read from.
	chunks: std::collections::VecDeque<Vec<u8>>,
	/// Written bytes that do not yet form a complete line.
	pending_write: Vec<u8>,
	/// Every complete line written, without its terminator.
	written: Vec<String>,
	/// Generates read data from each written line.
	responder: Option<Responder>,
	/// Whether reads on an empty mock return zero bytes rather than timing out.
	disconnected: bool,
	/// The number of times `read` has been called.
	reads: usize,
	/// The error to surface on the next read, if any. It is only surfaced once.
	read_error: Option<io::Error>,
	/// The error to surface on the next write, if any. It is only surfaced once.
	write_error: Option<io::Error>,
	/// The error to surface on the next flush, if any. It is only surfaced once.
	flush_error: Option<io::Error>,
	/// The read timeout, which is ignored.
	ignored_read_timeout: Option<Duration>,
}

#[cfg(any(test, feature = "mock"))]
impl Mock {
	/// Create a new Mock backend.
	pub fn new() -> Self {
		Mock {
			chunks: std::collections::VecDeque::new(),
			pending_write: Vec::new(),
			written: Vec::new(),
			responder: None,
			disconnected: false,
			reads: 0,
			read_error: None,
			write_error: None,
			flush_error: None,
			ignored_read_timeout: Some(Duration::ZERO),
		}
	}
	/// Append a chunk of data to the read buffer.
	///
	/// The data is not validated in any way.
	pub fn push<T: AsRef<[u8]>>(&mut self, bytes: T) {
		if !bytes.as_ref().is_empty() {
			self.chunks.push_back(bytes.as_ref().to_vec());
		}
	}
	/// Clear the read buffer.
	pub fn clear(&mut self) {
		self.chunks.clear();
	}
	/// Whether the mock has any data available or not
	pub fn is_empty(&self) -> bool {
		self.chunks.is_empty()
	}
	/// Set a function that is called with every complete line written to the
	/// mock. The chunks it returns are appended to the read buffer.
	pub fn respond_with<F>(&mut self, responder: F)
	where
		F: FnMut(&str) -> Vec<Vec<u8>> + 'static,
	{
		self.responder = Some(Box::new(responder));
	}
	/// Simulate the device disconnecting: once the buffered data is consumed,
	/// reads return zero bytes.
	pub fn disconnect(&mut self) {
		self.disconnected = true;
	}
	/// The lines written to the mock so far, without terminators.
	pub fn written(&self) -> &[String] {
		&self.written
	}
	/// The number of times `read` has been called.
	pub fn reads(&self) -> usize {
		self.reads
	}
	/// Set the error for the next `read`, if any.
	pub fn read_error(&mut self, err: Option<io::Error>) {
		self.read_error = err;
	}
	/// Set the error for the next `write`, if any.
	pub fn write_error(&mut self, err: Option<io::Error>) {
		self.write_error = err;
	}
	/// Set the error for the next `flush`, if any.
	pub fn flush_error(&mut self, err: Option<io::Error>) {
		self.flush_error = err;
	}
}

#[cfg(any(test, feature = "mock"))]
impl Default for Mock {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(any(test, feature = "mock"))]
impl std::fmt::Debug for Mock {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Mock")
			.field("chunks", &self.chunks.len())
			.field("written", &self.written)
			.field("disconnected", &self.disconnected)
			.finish_non_exhaustive()
	}
}

#[cfg(any(test, feature = "mock"))]
impl Backend for Mock {
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		self.ignored_read_timeout = timeout;
		Ok(())
	}

	fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		Ok(self.ignored_read_timeout)
	}

	fn name(&self) -> Option<String> {
		Some(format!("<mock 0x{:x}>", std::ptr::from_ref(self) as usize))
	}
}

#[cfg(any(test, feature = "mock"))]
impl io::Read for Mock {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		self.reads += 1;
		if let Some(err) = self.read_error.take() {
			return Err(err);
		}
		let Some(chunk) = self.chunks.front_mut() else {
			if self.disconnected {
				return Ok(0);
			}
			// For a real device, having no data ready would result in a wait
			// and then eventual timeout error. However, as our data is in
			// memory that does not happen here. So simulate that behaviour by
			// returning a timeout error immediately.
			return Err(io::Error::new(
				io::ErrorKind::TimedOut,
				"Simulated timeout error",
			));
		};
		let n = buf.len().min(chunk.len());
		buf[..n].copy_from_slice(&chunk[..n]);
		chunk.drain(..n);
		if chunk.is_empty() {
			self.chunks.pop_front();
		}
		Ok(n)
	}
}

#[cfg(any(test, feature = "mock"))]
impl io::Write for Mock {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		if let Some(err) = self.write_error.take() {
			return Err(err);
		}
		if self.disconnected {
			return Ok(0);
		}
		self.pending_write.extend_from_slice(buf);
		while let Some(end) = self.pending_write.iter().position(|&b| b == b'\n') {
			let line: Vec<u8> = self.pending_write.drain(..=end).collect();
			let line = String::from_utf8_lossy(&line).trim_end().to_string();
			if let Some(responder) = self.responder.as_mut() {
				for chunk in responder(&line) {
					if !chunk.is_empty() {
						self.chunks.push_back(chunk);
					}
				}
			}
			self.written.push(line);
		}
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		if let Some(err) = self.flush_error.take() {
			Err(err)
		} else {
			Ok(())
		}
	}
}

mod private {
	pub trait Sealed {}

	impl Sealed for super::Serial {}
	#[cfg(any(test, feature = "mock"))]
	impl Sealed for super::Mock {}
}
