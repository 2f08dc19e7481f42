//! Interpreting the lines a controller sends back.
//!
//! Controllers stream a mix of command echoes, acknowledgements and status
//! reports. Status reports look like JSON, but are not guaranteed to be valid
//! JSON, so rather than parsing them strictly this module scans a line for
//! the first quoted key followed by a number.
//!
//! ```
//! # use bedlevel::telemetry::{Telemetry, TelemetryKind};
//! let line = Telemetry::new(r#"{"sr":{"posx":10.000,"posz":-0.125,"stat":5}}"#);
//! assert_eq!(line.kind(), TelemetryKind::Status);
//! assert_eq!(line.posz(), Some(-0.125));
//! ```

/// The key of the Z position field in a status report.
pub const POSZ_KEY: &str = "posz";

/// The key marking a probe result report.
pub const PROBE_KEY: &str = "prb";

/// The kind of line received from a controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TelemetryKind {
	/// Anything that is not a status or probe result, such as an echoed command.
	Ack,
	/// A status report with a Z position.
	Status,
	/// A report that a probe move has completed.
	ProbeResult,
}

/// A view of one line received from a controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Telemetry<'a>(&'a str);

impl<'a> Telemetry<'a> {
	/// Wrap a line, without its terminator.
	pub fn new(line: &'a str) -> Self {
		Telemetry(line)
	}

	/// The raw line.
	pub fn as_str(&self) -> &'a str {
		self.0
	}

	/// The Z position reported in the line, if any.
	pub fn posz(&self) -> Option<f64> {
		find_number(self.0, POSZ_KEY)
	}

	/// Whether the line reports that a probe move completed.
	pub fn is_probe_result(&self) -> bool {
		has_key(self.0, PROBE_KEY)
	}

	/// Classify the line. A probe result wins over a status report when a line
	/// is both.
	pub fn kind(&self) -> TelemetryKind {
		if self.is_probe_result() {
			TelemetryKind::ProbeResult
		} else if self.posz().is_some() {
			TelemetryKind::Status
		} else {
			TelemetryKind::Ack
		}
	}
}

/// Whether `line` contains `key` in double quotes.
pub fn has_key(line: &str, key: &str) -> bool {
	quoted_key_positions(line, key).next().is_some()
}

/// Find the first occurrence of `"key"` that is followed by a `:` and a number,
/// and parse the number.
///
/// Whitespace is allowed around the `:`. Occurrences of the key that are not
/// followed by a number (e.g., `"posz":null`) are skipped.
///
/// ```
/// # use bedlevel::telemetry::find_number;
/// assert_eq!(find_number(r#"{"posz": 1.5e-1}"#, "posz"), Some(0.15));
/// assert_eq!(find_number(r#"{"posz":null,"r":{"posz":2}}"#, "posz"), Some(2.0));
/// assert_eq!(find_number(r#"{"posx":1}"#, "posz"), None);
/// ```
pub fn find_number(line: &str, key: &str) -> Option<f64> {
	quoted_key_positions(line, key).find_map(|end| {
		let rest = line[end..].trim_start();
		let rest = rest.strip_prefix(':')?.trim_start();
		rest[..number_len(rest.as_bytes())].parse().ok()
	})
}

/// The byte offsets just past each `"key"` in `line`.
fn quoted_key_positions<'l>(line: &'l str, key: &'l str) -> impl Iterator<Item = usize> + 'l {
	line.match_indices('"').filter_map(move |(start, _)| {
		let rest = &line[start + 1..];
		let after = rest.strip_prefix(key)?.strip_prefix('"')?;
		Some(line.len() - after.len())
	})
}

/// The length of the numeric literal at the start of `bytes`:
/// `[+-]digits[.digits][(e|E)[+-]digits]`. Returns 0 if there is none.
fn number_len(bytes: &[u8]) -> usize {
	let digits = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();

	let mut i = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
	let int = digits(i);
	i += int;
	let mut frac = 0;
	if bytes.get(i) == Some(&b'.') {
		frac = digits(i + 1);
		if int + frac > 0 {
			i += 1 + frac;
		}
	}
	if int + frac == 0 {
		return 0;
	}
	if matches!(bytes.get(i), Some(b'e' | b'E')) {
		let mut j = i + 1;
		if matches!(bytes.get(j), Some(b'+' | b'-')) {
			j += 1;
		}
		let exp = digits(j);
		if exp > 0 {
			i = j + exp;
		}
	}
	i
}
