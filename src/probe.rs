//! Probing the height of a surface at a point.
//!
//! A [`Prober`] owns a [`Port`] and measures the Z height of the surface under
//! the tool by repeatedly lowering a probe until contact. Each attempt follows
//! the [`RetryPolicy`]: the first is fast and coarse, later ones are slower and
//! start closer to the surface. A measurement is accepted once two consecutive
//! attempts agree.
//!
//! ```rust
//! # use bedlevel::{port::Port, probe::ProbeOptions};
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let port = Port::open_serial("/dev/ttyUSB0")?;
//! let mut prober = ProbeOptions::new().prober(port);
//! prober.begin()?;
//! let measurement = prober.probe_at(25.0, 40.0)?;
//! if !measurement.converged {
//!     eprintln!("reading at (25, 40) did not settle");
//! }
//! prober.finish()?;
//! # Ok(())
//! # }
//! ```

mod policy;
mod session;
#[cfg(test)]
mod test;

use crate::{
	backend::Backend,
	command::Command,
	error::ProbeError,
	port::Port,
	survey::{Rectangle, Survey},
	telemetry::Telemetry,
};
pub use policy::{within_tolerance, RetryPolicy, Step};
pub use session::{ProbeOptions, Session};
use std::time::{Duration, Instant};

/// The height of the surface at a point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Measurement {
	/// The X position probed.
	pub x: f64,
	/// The Y position probed.
	pub y: f64,
	/// The measured Z height of the surface.
	pub z: f64,
	/// How many probe attempts were made.
	pub attempts: usize,
	/// Whether consecutive attempts agreed. If `false`, `z` is the last
	/// contact made at this point, or the last known surface height if the
	/// probe never made contact.
	pub converged: bool,
}

/// What was collected during a single probe attempt.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct Reading {
	/// The last Z position reported, if any.
	pub z: Option<f64>,
	/// Whether the controller reported that the probe move completed.
	pub completed: bool,
}

/// Measures surface heights through a port connected to a motion controller.
///
/// Use [`ProbeOptions::prober`] or [`Prober::new`] to create one.
pub struct Prober<'p, B> {
	port: Port<'p, B>,
	session: Session,
	policy: RetryPolicy,
	min_attempts: usize,
	max_attempts: usize,
	poll_timeout: Duration,
	settle_timeout: Duration,
	attempt_timeout: Duration,
}

impl<B: Backend> std::fmt::Debug for Prober<'_, B> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Prober")
			.field("port", &self.port)
			.field("session", &self.session)
			.field("policy", &self.policy)
			.finish_non_exhaustive()
	}
}

impl<'p, B: Backend> Prober<'p, B> {
	/// Create a prober that takes ownership of `port`.
	pub fn new(port: Port<'p, B>, options: &ProbeOptions) -> Self {
		Prober {
			port,
			session: Session::new(options),
			policy: options.retry_policy(),
			min_attempts: options.get_min_attempts(),
			max_attempts: options.get_max_attempts(),
			poll_timeout: options.get_poll_timeout(),
			settle_timeout: options.get_settle_timeout(),
			attempt_timeout: options.get_attempt_timeout(),
		}
	}

	/// Make the current position the origin and switch to absolute positioning.
	pub fn begin(&mut self) -> Result<(), ProbeError> {
		self.send(&Command::SetOrigin)?;
		self.send(&Command::Absolute)
	}

	/// Raise the tool by `distance` from wherever it is.
	pub fn retract(&mut self, distance: f64) -> Result<(), ProbeError> {
		self.send(&Command::Relative)?;
		self.send(&Command::Move {
			x: None,
			y: None,
			z: Some(distance),
			feed: self.session.feed_fast(),
		})?;
		self.send(&Command::Absolute)
	}

	/// Raise the tool by the clearance and return to the origin.
	pub fn finish(&mut self) -> Result<(), ProbeError> {
		self.retract(self.session.clearance())?;
		self.send(&Command::move_xy(0.0, 0.0, self.session.feed_fast()))
	}

	/// Measure the height of the surface at (`x`, `y`).
	///
	/// Attempts are repeated until two consecutive ones agree, following the
	/// retry policy, or until the attempt budget runs out. Only transport
	/// failures are errors. Running out of attempts is reported through
	/// [`Measurement::converged`].
	pub fn probe_at(&mut self, x: f64, y: f64) -> Result<Measurement, ProbeError> {
		// The last contact, for comparison with the next. Cleared by an
		// attempt that ends without a probe result.
		let mut previous: Option<f64> = None;
		// The last contact of any attempt at this point.
		let mut contact: Option<f64> = None;

		for attempt in 0..self.max_attempts {
			let step = self.policy.step(attempt);
			let last_z = self.session.last_z();

			self.send(&Command::move_z(last_z + step.lift, self.session.feed_fast()))?;
			self.send(&Command::move_xy(x, y, self.session.feed_fast()))?;
			self.port.command(&Command::Probe {
				z: last_z - self.session.dive_depth(),
				feed: step.feed,
			})?;

			// Without a probe result a reported Z may be the end of travel
			// rather than the surface, so it must not move the next target.
			let reading = self.collect()?;
			let Some(z) = reading.z.filter(|_| reading.completed) else {
				log::warn!(
					"probe attempt {} at ({x:.3}, {y:.3}) ended without a probe result",
					attempt + 1
				);
				previous = None;
				continue;
			};
			self.session.estimate(z);
			contact = Some(z);

			if attempt + 1 >= self.min_attempts
				&& previous.is_some_and(|prev| within_tolerance(prev, z, step.tolerance))
			{
				self.session.settle(x, y, z);
				log::info!("surface at ({x:.3}, {y:.3}) is Z{z:.3} after {} attempts", attempt + 1);
				return Ok(Measurement {
					x,
					y,
					z,
					attempts: attempt + 1,
					converged: true,
				});
			}
			previous = Some(z);
		}

		let z = if let Some(z) = contact {
			self.session.settle(x, y, z);
			z
		} else {
			self.session.last_z()
		};
		log::warn!(
			"surface at ({x:.3}, {y:.3}) did not settle within {} attempts, using Z{z:.3}",
			self.max_attempts
		);
		Ok(Measurement {
			x,
			y,
			z,
			attempts: self.max_attempts,
			converged: false,
		})
	}

	/// Probe every point of `rectangle`, in order.
	pub fn survey(&mut self, rectangle: Rectangle) -> Result<Survey, ProbeError> {
		let measurements = rectangle
			.points()
			.into_iter()
			.map(|(x, y)| self.probe_at(x, y))
			.collect::<Result<Vec<_>, _>>()?;
		Ok(Survey::new(rectangle, measurements))
	}

	/// Send a command and consume the acknowledgements and status reports it
	/// produces, so they are not mistaken for the results of a later command.
	fn send(&mut self, cmd: &Command) -> Result<(), ProbeError> {
		self.port.command(cmd)?;
		for line in self.port.lines(self.settle_timeout)? {
			line?;
		}
		Ok(())
	}

	/// Collect the lines produced by a probe move.
	///
	/// Collection ends on a probe result, when the controller goes quiet for
	/// the poll timeout, or once the attempt timeout has passed.
	pub(crate) fn collect(&mut self) -> Result<Reading, ProbeError> {
		let deadline = Instant::now() + self.attempt_timeout;
		let mut reading = Reading {
			z: None,
			completed: false,
		};
		for line in self.port.lines(self.poll_timeout)? {
			let line = line?;
			let telemetry = Telemetry::new(&line);
			if let Some(z) = telemetry.posz() {
				reading.z = Some(z);
			}
			if telemetry.is_probe_result() {
				reading.completed = true;
				break;
			}
			if Instant::now() >= deadline {
				log::warn!("no probe result within {:?}", self.attempt_timeout);
				break;
			}
		}
		Ok(reading)
	}

	/// The state carried between probes.
	pub fn session(&self) -> &Session {
		&self.session
	}

	/// Get a mutable reference to the port.
	pub fn port_mut(&mut self) -> &mut Port<'p, B> {
		&mut self.port
	}

	/// Consume the prober and return the port.
	pub fn into_port(self) -> Port<'p, B> {
		self.port
	}
}
