//! The retry policy: how each probe attempt is performed.
//!
//! The policy is a table indexed by attempt number. The first row is used for
//! the first attempt, the second for the second, and so on; attempts past the
//! end of the table reuse the last row.

/// How a single probe attempt is performed and judged.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Step {
	/// The probing feed rate, in millimeters per minute.
	pub feed: u32,
	/// How far above the last known surface height to reposition before probing.
	pub lift: f64,
	/// How closely this attempt must agree with the previous one to be accepted.
	pub tolerance: f64,
}

/// A table of [`Step`]s indexed by attempt number.
///
/// ```
/// # use bedlevel::probe::{RetryPolicy, Step};
/// let policy = RetryPolicy::new(vec![
///     Step { feed: 800, lift: 3.0, tolerance: 0.05 },
///     Step { feed: 50, lift: 0.3, tolerance: 0.05 },
/// ]);
/// assert_eq!(policy.step(0).feed, 800);
/// assert_eq!(policy.step(1).feed, 50);
/// assert_eq!(policy.step(9).feed, 50);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy(Vec<Step>);

impl RetryPolicy {
	/// The lift used on the second attempt of the standard policy.
	pub const REFINE_LIFT: f64 = 1.0;
	/// The lift used from the third attempt on in the standard policy.
	pub const FINE_LIFT: f64 = 0.5;

	/// Create a policy from a table of steps.
	///
	/// # Panics
	///
	/// Panics if `steps` is empty.
	pub fn new(steps: Vec<Step>) -> Self {
		assert!(!steps.is_empty(), "a retry policy needs at least one step");
		RetryPolicy(steps)
	}

	/// The standard policy: a fast approach from `clearance` above the surface,
	/// then a medium-speed pass, then slow passes from just above it.
	pub fn standard(feed_fast: u32, feed_slow: u32, clearance: f64, tolerance: f64) -> Self {
		let feed_medium = ((u64::from(feed_fast) + u64::from(feed_slow)) / 2) as u32;
		RetryPolicy::new(vec![
			Step {
				feed: feed_fast,
				lift: clearance,
				tolerance,
			},
			Step {
				feed: feed_medium,
				lift: RetryPolicy::REFINE_LIFT,
				tolerance,
			},
			Step {
				feed: feed_slow,
				lift: RetryPolicy::FINE_LIFT,
				tolerance,
			},
		])
	}

	/// The step for the given zero-based attempt.
	pub fn step(&self, attempt: usize) -> Step {
		self.0[attempt.min(self.0.len() - 1)]
	}

	/// All the steps in the table.
	pub fn steps(&self) -> &[Step] {
		&self.0
	}
}

/// Round to the nearest tenth of a millimeter, counted in tenths.
fn tenths(z: f64) -> f64 {
	(z * 10.0).round()
}

/// Whether two consecutive estimates agree, once both are rounded to one
/// decimal, to within `tolerance`.
///
/// ```
/// # use bedlevel::probe::within_tolerance;
/// assert!(within_tolerance(1.234, 1.211, 0.05));
/// assert!(!within_tolerance(1.24, 1.26, 0.05));
/// assert!(within_tolerance(1.24, 1.26, 0.15));
/// ```
pub fn within_tolerance(previous: f64, estimate: f64, tolerance: f64) -> bool {
	(tenths(estimate) - tenths(previous)).abs() / 10.0 < tolerance
}
