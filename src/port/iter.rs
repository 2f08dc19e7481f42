//! Types for iterating over received lines.
use crate::{backend::Backend, error::ProbeError, timeout_guard::TimeoutGuard};

/// An iterator that reads lines from a port until a read times out.
///
/// See [`Port::lines`](super::Port::lines) for details.
#[must_use = "Lines is an iterator and will not read lines unless consumed."]
pub struct Lines<'i, 'p, B: Backend> {
	/// The port to read lines on, with the polling timeout applied.
	port: TimeoutGuard<'i, 'p, B>,
	/// Whether iteration is complete.
	done: bool,
}

impl<'i, 'p, B: Backend> Lines<'i, 'p, B> {
	/// Create a new `Lines` iterator.
	pub(super) fn new(port: TimeoutGuard<'i, 'p, B>) -> Self {
		Lines { port, done: false }
	}
}

impl<B: Backend> std::fmt::Debug for Lines<'_, '_, B> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Lines")
			.field("port", &self.port)
			.field("done", &self.done)
			.finish()
	}
}

impl<B: Backend> Iterator for Lines<'_, '_, B> {
	type Item = Result<String, ProbeError>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done {
			return None;
		}
		match self.port.read_line() {
			Ok(Some(line)) => Some(Ok(line)),
			// The controller has gone quiet.
			Ok(None) => {
				self.done = true;
				None
			}
			Err(e) => {
				self.done = true;
				Some(Err(e))
			}
		}
	}
}

impl<B: Backend> std::iter::FusedIterator for Lines<'_, '_, B> {}
