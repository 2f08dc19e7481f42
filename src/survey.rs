//! Surveying a rectangular bed and judging how flat it is.
//!
//! A survey probes the four corners of a [`Rectangle`], then its center. The
//! corners are enough to fit the plane the bed lies in, and the center shows
//! whether the bed bows above or below that plane.
//!
//! ```
//! # use bedlevel::survey::Flatness;
//! let flatness = Flatness::new(100.0, 50.0, [0.0, 0.05, -0.02, 0.03], 0.01);
//! assert!((flatness.diagonal_mismatch - -0.05).abs() < 1e-9);
//! ```

use crate::probe::Measurement;
use std::fmt;

/// The area to survey, with one corner at the origin.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rectangle {
	/// The extent along X, in millimeters.
	pub width: f64,
	/// The extent along Y, in millimeters.
	pub height: f64,
}

impl Rectangle {
	/// The number of points probed in a survey.
	pub const POINTS: usize = 5;

	/// Create a rectangle spanning (0, 0) to (`width`, `height`).
	pub fn new(width: f64, height: f64) -> Self {
		Rectangle { width, height }
	}

	/// The points to probe, in order: the corners counterclockwise from the
	/// origin, then the center.
	pub fn points(&self) -> [(f64, f64); Rectangle::POINTS] {
		let Rectangle { width, height } = *self;
		[
			(0.0, 0.0),
			(width, 0.0),
			(width, height),
			(0.0, height),
			(width / 2.0, height / 2.0),
		]
	}
}

/// How far a bed is from flat and level.
///
/// All values are in millimeters, except the slopes, which are millimeters of
/// rise per millimeter of travel.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Flatness {
	/// The height of the plane through the corners, at the center.
	pub plane_center: f64,
	/// How far the measured center is above the plane through the corners.
	/// Positive for a bed that bulges up, negative for one that sags.
	pub center_mismatch: f64,
	/// The average height of the diagonal through the origin, minus the
	/// average height of the other diagonal. Non-zero when the bed is twisted.
	pub diagonal_mismatch: f64,
	/// The average rise along X.
	pub x_slope: f64,
	/// The average rise along Y.
	pub y_slope: f64,
}

impl Flatness {
	/// Judge flatness from the corner heights, counterclockwise from the
	/// origin as in [`Rectangle::points`], and the center height.
	pub fn new(width: f64, height: f64, corners: [f64; 4], center: f64) -> Self {
		let [origin, right, far, top] = corners;
		let plane_center = (origin + right + far + top) / 4.0;
		Flatness {
			plane_center,
			center_mismatch: center - plane_center,
			diagonal_mismatch: (origin + far) / 2.0 - (right + top) / 2.0,
			x_slope: ((right - origin) + (far - top)) / (2.0 * width),
			y_slope: ((top - origin) + (far - right)) / (2.0 * height),
		}
	}
}

impl fmt::Display for Flatness {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "center mismatch:   {:+.3}", self.center_mismatch)?;
		writeln!(f, "diagonal mismatch: {:+.3}", self.diagonal_mismatch)?;
		writeln!(f, "X slope:           {:+.5}", self.x_slope)?;
		write!(f, "Y slope:           {:+.5}", self.y_slope)
	}
}

/// The measurements taken over a [`Rectangle`].
#[derive(Debug, Clone, PartialEq)]
pub struct Survey {
	rectangle: Rectangle,
	measurements: Vec<Measurement>,
}

impl Survey {
	/// Collect the measurements taken at [`Rectangle::points`], in order.
	///
	/// # Panics
	///
	/// Panics if there is not exactly one measurement per point.
	pub fn new(rectangle: Rectangle, measurements: Vec<Measurement>) -> Self {
		assert_eq!(
			measurements.len(),
			Rectangle::POINTS,
			"a survey needs one measurement per point"
		);
		Survey {
			rectangle,
			measurements,
		}
	}

	/// The surveyed area.
	pub fn rectangle(&self) -> Rectangle {
		self.rectangle
	}

	/// The measurements, in the order of [`Rectangle::points`].
	pub fn measurements(&self) -> &[Measurement] {
		&self.measurements
	}

	/// The heights of the corners, counterclockwise from the origin.
	pub fn corners(&self) -> [f64; 4] {
		[0, 1, 2, 3].map(|i| self.measurements[i].z)
	}

	/// The height of the center.
	pub fn center(&self) -> f64 {
		self.measurements[4].z
	}

	/// Whether every measurement converged.
	pub fn converged(&self) -> bool {
		self.measurements.iter().all(|m| m.converged)
	}

	/// Judge the flatness of the surveyed bed.
	pub fn flatness(&self) -> Flatness {
		Flatness::new(
			self.rectangle.width,
			self.rectangle.height,
			self.corners(),
			self.center(),
		)
	}
}

impl fmt::Display for Survey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "{:>9} {:>9} {:>9} {:>8}", "X", "Y", "Z", "attempts")?;
		for m in &self.measurements {
			let flag = if m.converged { "" } else { " (unsettled)" };
			writeln!(
				f,
				"{:>9.3} {:>9.3} {:>9.3} {:>8}{flag}",
				m.x, m.y, m.z, m.attempts
			)?;
		}
		write!(f, "{}", self.flatness())
	}
}
