//! Reassembling a byte stream into CR/LF terminated lines.
//!
//! A [`LineBuffer`] holds the bytes received since the last complete line. Data
//! is read directly into its [`spare`](LineBuffer::spare) capacity and complete
//! lines are taken out with [`next_line`](LineBuffer::next_line). Any trailing
//! partial line stays in the buffer until more data arrives.
//!
//! ```
//! # use bedlevel::line::LineBuffer;
//! let mut buffer = LineBuffer::new();
//! buffer.extend(b"{\"posz\":1.2");
//! assert_eq!(buffer.next_line(), None);
//! buffer.extend(b"34}\r\nok");
//! assert_eq!(buffer.next_line().as_deref(), Some("{\"posz\":1.234}"));
//! assert_eq!(buffer.next_line(), None);
//! assert_eq!(buffer.len(), 2);
//! ```

/// The carriage return byte.
pub(crate) const CARRIAGE_RETURN: u8 = b'\r';

/// The line feed byte.
pub(crate) const LINE_FEED: u8 = b'\n';

/// Whether the byte terminates a line.
#[inline]
pub(crate) fn is_line_end(byte: u8) -> bool {
	matches!(byte, CARRIAGE_RETURN | LINE_FEED)
}

/// A fixed-capacity buffer of unparsed input.
///
/// The buffer never grows. If it fills up without containing a line
/// terminator, the whole line is treated as corrupt: the buffered bytes are
/// discarded, and so is everything received up to the next terminator.
pub struct LineBuffer {
	/// The buffered bytes. Only `bytes[..len]` is valid.
	bytes: Box<[u8; LineBuffer::CAPACITY]>,
	/// The number of buffered bytes.
	len: usize,
	/// Whether bytes are being dropped until the end of an overlong line.
	resyncing: bool,
}

impl LineBuffer {
	/// The maximum number of bytes, including terminators, a line may occupy.
	pub const CAPACITY: usize = 1024;

	/// Create an empty buffer.
	pub fn new() -> Self {
		LineBuffer {
			bytes: Box::new([0; LineBuffer::CAPACITY]),
			len: 0,
			resyncing: false,
		}
	}

	/// The number of buffered bytes.
	pub fn len(&self) -> usize {
		self.len
	}

	/// Whether the buffer holds no bytes.
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Whether the buffer has no spare capacity left.
	pub fn is_full(&self) -> bool {
		self.len == LineBuffer::CAPACITY
	}

	/// Drop all buffered bytes.
	pub fn clear(&mut self) {
		self.len = 0;
		self.resyncing = false;
	}

	/// Whether the rest of an overlong line is still being dropped.
	pub fn is_resyncing(&self) -> bool {
		self.resyncing
	}

	/// The unused capacity of the buffer, to read new data into.
	///
	/// After writing `n` bytes into the slice, call [`commit`](LineBuffer::commit).
	pub fn spare(&mut self) -> &mut [u8] {
		&mut self.bytes[self.len..]
	}

	/// Mark `n` bytes of the [`spare`](LineBuffer::spare) capacity as filled.
	pub fn commit(&mut self, n: usize) {
		assert!(n <= LineBuffer::CAPACITY - self.len, "committed beyond capacity");
		self.len += n;
	}

	/// Copy as much of `data` into the buffer as fits and return the number of
	/// bytes copied.
	pub fn extend(&mut self, data: &[u8]) -> usize {
		let spare = self.spare();
		let n = spare.len().min(data.len());
		spare[..n].copy_from_slice(&data[..n]);
		self.commit(n);
		n
	}

	/// Take the next complete, non-empty line out of the buffer.
	///
	/// The terminator and any run of CR/LF bytes following it are removed and
	/// the remaining bytes are moved to the head of the buffer. Returns `None`
	/// if the buffer contains no terminated line.
	pub fn next_line(&mut self) -> Option<String> {
		if self.resyncing {
			let Some(end) = self.bytes[..self.len].iter().position(|&b| is_line_end(b)) else {
				self.len = 0;
				return None;
			};
			self.bytes.copy_within(end..self.len, 0);
			self.len -= end;
			self.resyncing = false;
		}
		loop {
			let end = self.bytes[..self.len].iter().position(|&b| is_line_end(b))?;
			let rest = self.bytes[end..self.len]
				.iter()
				.position(|&b| !is_line_end(b))
				.map_or(self.len, |i| end + i);
			let line = (end > 0).then(|| String::from_utf8_lossy(&self.bytes[..end]).into_owned());
			self.bytes.copy_within(rest..self.len, 0);
			self.len -= rest;
			// A terminator run split across reads leaves a bare terminator at
			// the head of the buffer.
			if line.is_some() {
				return line;
			}
		}
	}

	/// Discard the contents if the buffer is full and holds no terminator.
	///
	/// Returns the number of bytes dropped. The rest of the line, up to and
	/// including its terminator, is dropped by later calls to
	/// [`next_line`](LineBuffer::next_line). Call this after `next_line`
	/// returned `None`.
	pub fn discard_if_overrun(&mut self) -> usize {
		if self.is_full() && !self.bytes.iter().any(|&b| is_line_end(b)) {
			let dropped = self.len;
			self.clear();
			self.resyncing = true;
			dropped
		} else {
			0
		}
	}
}

impl Default for LineBuffer {
	fn default() -> Self {
		LineBuffer::new()
	}
}

impl std::fmt::Debug for LineBuffer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LineBuffer")
			.field("pending", &String::from_utf8_lossy(&self.bytes[..self.len]))
			.field("resyncing", &self.resyncing)
			.finish()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn drain(buffer: &mut LineBuffer) -> Vec<String> {
		std::iter::from_fn(|| buffer.next_line()).collect()
	}

	#[test]
	fn splits_on_cr_and_lf() {
		let mut buffer = LineBuffer::new();
		buffer.extend(b"ok\r\n{\"posz\":1.0}\rsecond\nthird\n\n\r\n");
		assert_eq!(drain(&mut buffer), ["ok", "{\"posz\":1.0}", "second", "third"]);
		assert!(buffer.is_empty());
	}

	#[test]
	fn partial_line_is_retained() {
		let mut buffer = LineBuffer::new();
		buffer.extend(b"first\r\nsec");
		assert_eq!(drain(&mut buffer), ["first"]);
		assert_eq!(buffer.len(), 3);
		buffer.extend(b"ond\r\n");
		assert_eq!(drain(&mut buffer), ["second"]);
	}

	#[test]
	fn split_line_matches_unsplit_line() {
		let line = b"{\"sr\":{\"posz\":-0.125,\"stat\":3}}\r\n";
		let mut whole = LineBuffer::new();
		whole.extend(line);
		let expected = drain(&mut whole);

		for split in 1..line.len() {
			let mut buffer = LineBuffer::new();
			buffer.extend(&line[..split]);
			let mut lines = drain(&mut buffer);
			buffer.extend(&line[split..]);
			lines.extend(drain(&mut buffer));
			assert_eq!(lines, expected, "split at {split}");
			assert!(buffer.is_empty(), "split at {split}");
		}
	}

	#[test]
	fn leading_terminators_are_skipped() {
		let mut buffer = LineBuffer::new();
		buffer.extend(b"\n\r\nok\n");
		assert_eq!(drain(&mut buffer), ["ok"]);
	}

	#[test]
	fn overrun_is_discarded() {
		let mut buffer = LineBuffer::new();
		let junk = vec![b'x'; LineBuffer::CAPACITY + 10];
		assert_eq!(buffer.extend(&junk), LineBuffer::CAPACITY);
		assert!(buffer.is_full());
		assert_eq!(buffer.next_line(), None);
		assert_eq!(buffer.discard_if_overrun(), LineBuffer::CAPACITY);
		assert!(buffer.is_empty());
		assert!(buffer.is_resyncing());

		// The tail of the overlong line is dropped, then parsing resumes.
		buffer.extend(b"tail\nok\n");
		assert_eq!(drain(&mut buffer), ["ok"]);
		assert!(!buffer.is_resyncing());
	}

	#[test]
	fn overlong_tail_spanning_reads_is_dropped() {
		let mut buffer = LineBuffer::new();
		buffer.extend(&[b'x'; LineBuffer::CAPACITY]);
		assert_eq!(buffer.next_line(), None);
		assert_eq!(buffer.discard_if_overrun(), LineBuffer::CAPACITY);

		buffer.extend(b",\"posz\":9.9");
		assert_eq!(buffer.next_line(), None);
		assert!(buffer.is_empty());
		assert!(buffer.is_resyncing());

		buffer.extend(b"}\r\n{\"prb\":true}\r\n");
		assert_eq!(drain(&mut buffer), ["{\"prb\":true}"]);
	}

	#[test]
	fn full_buffer_with_terminator_is_kept() {
		let mut buffer = LineBuffer::new();
		let mut data = vec![b'y'; LineBuffer::CAPACITY];
		data[10] = b'\n';
		buffer.extend(&data);
		assert_eq!(buffer.discard_if_overrun(), 0);
		assert_eq!(buffer.next_line().unwrap().len(), 10);
	}
}
