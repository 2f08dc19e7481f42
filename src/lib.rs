//! A small library for measuring the flatness of a machine bed by probing it
//! through a serial motion controller.
//!
//! The [`Port`](port::Port) sends G-code [`Command`](command::Command)s and
//! reassembles the controller's replies into lines. A
//! [`Prober`](probe::Prober) uses it to measure the surface height at a point,
//! repeating each measurement until consecutive attempts agree, and to
//! [`survey`](probe::Prober::survey) a rectangular bed.
//!
//! ```rust
//! # use bedlevel::{port::Port, probe::ProbeOptions, survey::Rectangle};
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let port = Port::open_serial("/dev/ttyUSB0")?;
//! let mut prober = ProbeOptions::new().prober(port);
//! prober.begin()?;
//! let survey = prober.survey(Rectangle::new(200.0, 150.0))?;
//! prober.finish()?;
//! println!("{survey}");
//! # Ok(())
//! # }
//! ```

#![deny(rustdoc::missing_crate_level_docs)]
#![cfg_attr(all(doc, feature = "doc_cfg"), feature(doc_cfg))]

pub mod backend;
pub mod command;
pub mod error;
pub mod line;
pub mod port;
pub mod probe;
pub mod survey;
pub mod telemetry;
pub mod timeout_guard;
