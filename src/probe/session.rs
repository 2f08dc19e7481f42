//! Probing configuration and the state carried from one probe to the next.

use super::{policy::RetryPolicy, Prober};
use crate::{backend::Backend, port::Port};
use std::time::Duration;

/// Options for configuring a [`Prober`](super::Prober).
///
/// All distances are in millimeters and feed rates in millimeters per minute.
///
/// ## Example
///
/// ```rust
/// # use bedlevel::{port::Port, probe::ProbeOptions};
/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
/// let port = Port::open_serial("/dev/ttyUSB0")?;
/// let mut prober = ProbeOptions::new()
///     .clearance(3.0)
///     .feed_slow(50)
///     .prober(port);
/// let measurement = prober.probe_at(10.0, 10.0)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// Height kept above a known surface when moving sideways.
    clearance: f64,
    /// Agreement required between consecutive attempts.
    tolerance: f64,
    /// Feed rate for repositioning and the first, coarse probe.
    feed_fast: u32,
    /// Feed rate for the final, fine probes.
    feed_slow: u32,
    /// Downward travel allowed for the first probe of a run.
    search_depth: f64,
    /// Downward travel allowed below the last known surface for later probes.
    dive_margin: f64,
    /// The fewest attempts made before a reading may be accepted.
    min_attempts: usize,
    /// The most attempts made before giving up on convergence.
    max_attempts: usize,
    /// How long to wait for each new line while collecting a probe result.
    poll_timeout: Duration,
    /// How long to wait for acknowledgements after other commands.
    settle_timeout: Duration,
    /// How long a single probe attempt may collect lines for.
    attempt_timeout: Duration,
    /// A custom retry policy, replacing the standard one.
    policy: Option<RetryPolicy>,
}

impl ProbeOptions {
    /// The default attempt budget.
    pub const DEFAULT_MAX_ATTEMPTS: usize = 20;

    /// Create a set of options with the defaults:
    ///
    /// | option | default |
    /// |---|---|
    /// | `clearance` | 5 mm |
    /// | `tolerance` | 0.05 mm |
    /// | `feed_fast` | 1000 mm/min |
    /// | `feed_slow` | 100 mm/min |
    /// | `search_depth` | 10 mm |
    /// | `dive_margin` | 2 mm |
    /// | `min_attempts` | 2 |
    /// | `max_attempts` | 20 |
    /// | `poll_timeout` | 3 s |
    /// | `settle_timeout` | 100 ms |
    /// | `attempt_timeout` | 120 s |
    ///
    /// Equivalent to [`default`](ProbeOptions::default).
    pub fn new() -> Self {
        ProbeOptions {
            clearance: 5.0,
            tolerance: 0.05,
            feed_fast: 1000,
            feed_slow: 100,
            search_depth: 10.0,
            dive_margin: 2.0,
            min_attempts: 2,
            max_attempts: ProbeOptions::DEFAULT_MAX_ATTEMPTS,
            poll_timeout: Duration::from_secs(3),
            settle_timeout: Duration::from_millis(100),
            attempt_timeout: Duration::from_secs(120),
            policy: None,
        }
    }

    /// Set the height kept above a known surface when moving sideways.
    pub fn clearance(&mut self, clearance: f64) -> &mut Self {
        self.clearance = clearance;
        self
    }

    /// Set how closely consecutive attempts must agree.
    pub fn tolerance(&mut self, tolerance: f64) -> &mut Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the feed rate for repositioning and the first probe.
    pub fn feed_fast(&mut self, feed: u32) -> &mut Self {
        self.feed_fast = feed;
        self
    }

    /// Set the feed rate for the final probes.
    pub fn feed_slow(&mut self, feed: u32) -> &mut Self {
        self.feed_slow = feed;
        self
    }

    /// Set the downward travel allowed for the first probe of a run.
    pub fn search_depth(&mut self, depth: f64) -> &mut Self {
        self.search_depth = depth;
        self
    }

    /// Set the downward travel allowed below the last known surface once the
    /// surface has been found.
    pub fn dive_margin(&mut self, margin: f64) -> &mut Self {
        self.dive_margin = margin;
        self
    }

    /// Set the fewest attempts made before a reading may be accepted.
    ///
    /// Values below 2 are raised to 2, since a reading is only accepted when
    /// it agrees with the previous one.
    pub fn min_attempts(&mut self, attempts: usize) -> &mut Self {
        self.min_attempts = attempts.max(2);
        self
    }

    /// Set the most attempts made at one point. Values below 1 are raised to 1.
    pub fn max_attempts(&mut self, attempts: usize) -> &mut Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set how long to wait for each new line while collecting a probe result.
    pub fn poll_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set how long to wait for acknowledgements after other commands.
    pub fn settle_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.settle_timeout = timeout;
        self
    }

    /// Set how long a single probe attempt may collect lines for, however
    /// chatty the controller is.
    pub fn attempt_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Replace the standard retry policy with a custom one.
    pub fn policy(&mut self, policy: RetryPolicy) -> &mut Self {
        self.policy = Some(policy);
        self
    }

    /// Create a [`Prober`] that takes ownership of `port` and probes with these options.
    pub fn prober<'p, B: Backend>(&self, port: Port<'p, B>) -> Prober<'p, B> {
        Prober::new(port, self)
    }

    /// The retry policy: the custom one, if set, otherwise
    /// [`RetryPolicy::standard`] built from these options.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy.clone().unwrap_or_else(|| {
            RetryPolicy::standard(self.feed_fast, self.feed_slow, self.clearance, self.tolerance)
        })
    }

    /// The fewest attempts made before a reading may be accepted.
    pub fn get_min_attempts(&self) -> usize {
        self.min_attempts
    }

    /// The most attempts made at one point.
    pub fn get_max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// The timeout for each new line while collecting a probe result.
    pub fn get_poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    /// The timeout for acknowledgements after other commands.
    pub fn get_settle_timeout(&self) -> Duration {
        self.settle_timeout
    }

    /// The time limit for collecting lines in one attempt.
    pub fn get_attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }
}

impl Default for ProbeOptions {
    fn default() -> Self {
        ProbeOptions::new()
    }
}

/// The state carried from one probe to the next.
///
/// It starts at the origin with the generous search depth, and is updated by
/// the [`Prober`](super::Prober) after every probe.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    last_x: f64,
    last_y: f64,
    last_z: f64,
    /// Downward travel allowed below `last_z` for the next probe.
    dive_depth: f64,
    dive_margin: f64,
    clearance: f64,
    feed_fast: u32,
}

impl Session {
    /// Create the state for a new run.
    pub fn new(options: &ProbeOptions) -> Self {
        Session {
            last_x: 0.0,
            last_y: 0.0,
            last_z: 0.0,
            dive_depth: options.search_depth,
            dive_margin: options.dive_margin,
            clearance: options.clearance,
            feed_fast: options.feed_fast,
        }
    }

    /// The most recently measured or commanded position.
    pub fn last_position(&self) -> (f64, f64, f64) {
        (self.last_x, self.last_y, self.last_z)
    }

    /// The most recent Z estimate of the surface.
    pub fn last_z(&self) -> f64 {
        self.last_z
    }

    /// The downward travel allowed below [`last_z`](Session::last_z) for the next probe.
    pub fn dive_depth(&self) -> f64 {
        self.dive_depth
    }

    /// The height kept above a known surface when moving sideways.
    pub fn clearance(&self) -> f64 {
        self.clearance
    }

    /// The feed rate for repositioning and coarse probing.
    pub fn feed_fast(&self) -> u32 {
        self.feed_fast
    }

    /// Record a contact height, used to position the next attempt at the same point.
    pub(crate) fn estimate(&mut self, z: f64) {
        self.last_z = z;
    }

    /// Record the position a probe settled at. The surface is now known, so
    /// later probes only need the small dive margin.
    pub(crate) fn settle(&mut self, x: f64, y: f64, z: f64) {
        self.last_x = x;
        self.last_y = y;
        self.last_z = z;
        self.dive_depth = self.dive_margin;
    }
}
