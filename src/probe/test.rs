use std::{cell::RefCell, rc::Rc};

use crate::{
	backend::Mock,
	error::ProbeError,
	port::Port,
	probe::{ProbeOptions, Prober, Reading},
	survey::Rectangle,
};

/// The height of the simulated surface for each probe move, given the X and Y
/// position of the tool.
type Surface = Box<dyn FnMut(f64, f64) -> f64>;

/// A simulated controller that echoes every line, reports its position, and
/// answers probe moves with the height of `surface`.
struct Machine {
	x: f64,
	y: f64,
	z: f64,
	surface: Surface,
	/// The number of probe moves received.
	probes: usize,
	/// Whether each probe move (by index) is answered with a probe result.
	marker: Box<dyn Fn(usize) -> bool>,
}

impl Machine {
	fn respond(&mut self, line: &str) -> Vec<Vec<u8>> {
		let mut out = vec![format!("{line}\r\n").into_bytes()];
		if line.starts_with("G38.2") {
			let z = (self.surface)(self.x, self.y);
			self.z = z;
			out.push(format!("{{\"sr\":{{\"posz\":{z},\"stat\":3}}}}\r\n").into_bytes());
			if (self.marker)(self.probes) {
				out.push(format!("{{\"prb\":{{\"e\":1,\"z\":{z}}}}}\r\n").into_bytes());
			}
			self.probes += 1;
		} else if line.starts_with("G1") {
			self.x = axis(line, 'X').unwrap_or(self.x);
			self.y = axis(line, 'Y').unwrap_or(self.y);
			self.z = axis(line, 'Z').unwrap_or(self.z);
			out.push(
				format!(
					"{{\"sr\":{{\"posx\":{},\"posy\":{},\"posz\":{}}}}}\n",
					self.x, self.y, self.z
				)
				.into_bytes(),
			);
		} else {
			out.push(b"{\"r\":{},\"f\":[1,0,8]}\n".to_vec());
		}
		out
	}
}

/// Parse the value of `axis` in a `G1` line.
fn axis(line: &str, axis: char) -> Option<f64> {
	line.split_whitespace().skip(1).find_map(|word| {
		let value = word.strip_prefix(axis)?;
		value.split('F').next()?.parse().ok()
	})
}

fn machine_with<S, M>(surface: S, marker: M) -> Port<'static, Mock>
where
	S: FnMut(f64, f64) -> f64 + 'static,
	M: Fn(usize) -> bool + 'static,
{
	let machine = Rc::new(RefCell::new(Machine {
		x: 0.0,
		y: 0.0,
		z: 0.0,
		surface: Box::new(surface),
		probes: 0,
		marker: Box::new(marker),
	}));
	let mut port = Port::open_mock();
	port.backend_mut()
		.respond_with(move |line| machine.borrow_mut().respond(line));
	port
}

fn machine<S: FnMut(f64, f64) -> f64 + 'static>(surface: S) -> Port<'static, Mock> {
	machine_with(surface, |_| true)
}

/// A surface that reports `readings` in order, then repeats the last one.
fn readings(readings: &[f64]) -> impl FnMut(f64, f64) -> f64 + 'static {
	let mut readings = readings.to_vec().into_iter();
	let mut last = 0.0;
	move |_: f64, _: f64| {
		if let Some(z) = readings.next() {
			last = z;
		}
		last
	}
}

fn probe_lines(prober: &Prober<'_, Mock>) -> Vec<String> {
	prober
		.port
		.backend()
		.written()
		.iter()
		.filter(|line| line.starts_with("G38.2"))
		.cloned()
		.collect()
}

fn approx(a: f64, b: f64) -> bool {
	(a - b).abs() < 1e-9
}

#[test]
fn collect_ends_on_probe_result() {
	let mut port = Port::open_mock();
	port.backend_mut()
		.push(b"G1 Z2.000000F1000\n{\"posz\":1.234}\r\n{\"prb\":true}\r\n{\"posz\":9}\n");
	let mut prober = ProbeOptions::new().prober(port);
	let reading = prober.collect().unwrap();
	assert_eq!(
		reading,
		Reading {
			z: Some(1.234),
			completed: true
		}
	);

	// Lines after the probe result are left for the next reader.
	let rest: Vec<String> = prober
		.port_mut()
		.lines(std::time::Duration::from_millis(10))
		.unwrap()
		.collect::<Result<_, _>>()
		.unwrap();
	assert_eq!(rest, ["{\"posz\":9}"]);
}

#[test]
fn collect_ends_when_quiet() {
	let mut port = Port::open_mock();
	port.backend_mut().push(b"ok\n{\"posz\":-0.5}\n");
	let mut prober = ProbeOptions::new().prober(port);
	assert_eq!(
		prober.collect().unwrap(),
		Reading {
			z: Some(-0.5),
			completed: false
		}
	);
	assert_eq!(
		prober.collect().unwrap(),
		Reading {
			z: None,
			completed: false
		}
	);
}

#[test]
fn constant_surface_is_idempotent() {
	let mut prober = ProbeOptions::new().prober(machine(|_, _| 0.3));
	let first = prober.probe_at(10.0, 20.0).unwrap();
	assert_eq!(first.x, 10.0);
	assert_eq!(first.y, 20.0);
	assert_eq!(first.z, 0.3);
	assert_eq!(first.attempts, 2);
	assert!(first.converged);

	let second = prober.probe_at(10.0, 20.0).unwrap();
	assert_eq!(second, first);
	assert_eq!(prober.session().last_position(), (10.0, 20.0, 0.3));
}

#[test]
fn waits_for_consecutive_agreement() {
	let mut prober = ProbeOptions::new().prober(machine(readings(&[0.0, 0.31, 0.52, 0.71, 0.74])));
	let measurement = prober.probe_at(0.0, 0.0).unwrap();
	assert_eq!(measurement.attempts, 5);
	assert!(measurement.converged);
	// The reported value is not rounded.
	assert_eq!(measurement.z, 0.74);
}

#[test]
fn minimum_attempts_are_made() {
	let mut prober = ProbeOptions::new()
		.min_attempts(4)
		.prober(machine(|_, _| -1.0));
	let measurement = prober.probe_at(5.0, 5.0).unwrap();
	assert_eq!(measurement.attempts, 4);
	assert_eq!(probe_lines(&prober).len(), 4);
	assert!(measurement.converged);
}

#[test]
fn attempt_budget_is_enforced() {
	// No probe results and a surface that keeps moving.
	let mut height = 0.0;
	let surface = move |_: f64, _: f64| {
		height += 1.0;
		height
	};
	let mut prober = ProbeOptions::new().prober(machine_with(surface, |_| false));
	let measurement = prober.probe_at(1.0, 2.0).unwrap();
	assert_eq!(probe_lines(&prober).len(), ProbeOptions::DEFAULT_MAX_ATTEMPTS);
	assert_eq!(measurement.attempts, ProbeOptions::DEFAULT_MAX_ATTEMPTS);
	assert!(!measurement.converged);
	// No contact was ever made, so nothing is learned about the surface.
	assert_eq!(measurement.z, 0.0);
	assert_eq!(prober.session().last_position(), (0.0, 0.0, 0.0));
	assert_eq!(prober.session().dive_depth(), 10.0);
}

#[test]
fn missing_contact_never_dives_deeper() {
	// The controller reports the end of travel of every downward move, but
	// contact is never made.
	let targets = Rc::new(RefCell::new(Vec::new()));
	let mut port = Port::open_mock();
	{
		let seen = Rc::clone(&targets);
		port.backend_mut().respond_with(move |line| {
			let mut out = vec![format!("{line}\n").into_bytes()];
			if line.starts_with("G38.2") {
				let z = axis(line, 'Z').unwrap();
				seen.borrow_mut().push(z);
				out.push(format!("{{\"sr\":{{\"posz\":{z}}}}}\n").into_bytes());
			}
			out
		});
	}
	let mut prober = ProbeOptions::new().prober(port);
	let measurement = prober.probe_at(0.0, 0.0).unwrap();
	assert!(!measurement.converged);
	assert_eq!(measurement.z, 0.0);

	let targets = targets.borrow();
	assert_eq!(targets.len(), ProbeOptions::DEFAULT_MAX_ATTEMPTS);
	assert!(targets.iter().all(|&z| z == -10.0), "{targets:?}");
}

#[test]
fn unsettled_contacts_settle_on_last_contact() {
	let mut height = 0.0;
	let surface = move |_: f64, _: f64| {
		height += 1.0;
		height
	};
	let mut prober = ProbeOptions::new().max_attempts(5).prober(machine(surface));
	let measurement = prober.probe_at(3.0, 4.0).unwrap();
	assert!(!measurement.converged);
	assert_eq!(measurement.z, 5.0);
	assert_eq!(prober.session().last_position(), (3.0, 4.0, 5.0));
	assert_eq!(prober.session().dive_depth(), 2.0);
}

#[test]
fn overlong_line_is_not_telemetry() {
	let mut port = Port::open_mock();
	let mut junk = vec![b'x'; crate::line::LineBuffer::CAPACITY];
	junk.extend_from_slice(b",\"posz\":9.9}\n{\"prb\":true}\n");
	port.backend_mut().push(junk);
	let mut prober = ProbeOptions::new().prober(port);
	assert_eq!(
		prober.collect().unwrap(),
		Reading {
			z: None,
			completed: true
		}
	);
}

#[test]
fn attempt_budget_without_any_reading() {
	let mut port = Port::open_mock();
	port.backend_mut()
		.respond_with(|line| vec![format!("{line}\n").into_bytes()]);
	let mut prober = ProbeOptions::new().max_attempts(3).prober(port);
	let measurement = prober.probe_at(1.0, 2.0).unwrap();
	assert_eq!(measurement.attempts, 3);
	assert!(!measurement.converged);
	assert_eq!(measurement.z, 0.0);
	// The surface was never found, so the next probe still searches deeply.
	assert_eq!(prober.session().dive_depth(), 10.0);
}

#[test]
fn unconfirmed_attempts_do_not_count() {
	// The second probe move gets no probe result.
	let mut prober = ProbeOptions::new().prober(machine_with(|_, _| 0.5, |i| i != 1));
	let measurement = prober.probe_at(0.0, 0.0).unwrap();
	assert_eq!(measurement.attempts, 4);
	assert!(measurement.converged);
}

#[test]
fn feed_slows_with_each_attempt() {
	let mut prober = ProbeOptions::new().prober(machine(readings(&[0.0, 1.0, 2.0, 2.0])));
	let measurement = prober.probe_at(0.0, 0.0).unwrap();
	assert_eq!(measurement.attempts, 4);
	let lines = probe_lines(&prober);
	let feeds: Vec<&str> = lines
		.iter()
		.map(|line| line.rsplit('F').next().unwrap())
		.collect();
	assert_eq!(feeds, ["1000", "550", "100", "100"]);
}

#[test]
fn dive_depth_shrinks_once_surface_is_found() {
	let mut prober = ProbeOptions::new().prober(machine(|_, _| 1.25));
	prober.probe_at(0.0, 0.0).unwrap();
	assert_eq!(
		probe_lines(&prober),
		["G38.2 Z-10.000000F1000", "G38.2 Z-8.750000F550"]
	);
	assert_eq!(prober.session().dive_depth(), 2.0);

	prober.probe_at(30.0, 0.0).unwrap();
	assert_eq!(probe_lines(&prober)[2], "G38.2 Z-0.750000F1000");
}

#[test]
fn approach_from_above() {
	let mut prober = ProbeOptions::new().prober(machine(|_, _| 1.25));
	prober.probe_at(10.0, 20.0).unwrap();
	assert_eq!(
		prober.port.backend().written(),
		[
			"G1 Z5.000000F1000",
			"G1 X10.000000 Y20.000000F1000",
			"G38.2 Z-10.000000F1000",
			"G1 Z2.250000F1000",
			"G1 X10.000000 Y20.000000F1000",
			"G38.2 Z-8.750000F550",
		]
	);
}

#[test]
fn custom_options() {
	let mut prober = ProbeOptions::new()
		.clearance(3.0)
		.feed_fast(2000)
		.search_depth(4.0)
		.prober(machine(|_, _| 0.0));
	prober.probe_at(1.0, 1.0).unwrap();
	let written = prober.port.backend().written();
	assert_eq!(written[0], "G1 Z3.000000F2000");
	assert_eq!(written[2], "G38.2 Z-4.000000F2000");
	assert_eq!(written[5], "G38.2 Z-4.000000F1050");
}

#[test]
fn disconnect_is_fatal() {
	let mut port = machine(|_, _| 0.0);
	port.backend_mut().disconnect();
	let mut prober = ProbeOptions::new().prober(port);
	let err = prober.probe_at(0.0, 0.0).unwrap_err();
	assert!(matches!(err, ProbeError::TransportClosed(ref e) if e.operation() == "write"), "{err:?}");
}

#[test]
fn disconnect_while_collecting_is_fatal() {
	let mut port = Port::open_mock();
	port.backend_mut().push(b"{\"posz\":1}\n");
	port.backend_mut().disconnect();
	let mut prober = ProbeOptions::new().prober(port);
	let err = prober.collect().unwrap_err();
	assert!(matches!(err, ProbeError::TransportClosed(ref e) if e.operation() == "read"), "{err:?}");
}

#[test]
fn begin_and_finish() {
	let mut prober = ProbeOptions::new().prober(machine(|_, _| 0.0));
	prober.begin().unwrap();
	prober.finish().unwrap();
	let port = prober.into_port();
	assert_eq!(
		port.backend().written(),
		[
			"G92 X0 Y0 Z0",
			"G90",
			"G91",
			"G1 Z5.000000F1000",
			"G90",
			"G1 X0.000000 Y0.000000F1000",
		]
	);
	// Every reply was consumed.
	assert_eq!(port.pending(), 0);
	assert!(port.backend().is_empty());
}

#[test]
fn retract_is_relative() {
	let mut prober = ProbeOptions::new().prober(machine(|_, _| 0.0));
	prober.retract(0.75).unwrap();
	assert_eq!(
		prober.port.backend().written(),
		["G91", "G1 Z0.750000F1000", "G90"]
	);
}

#[test]
fn survey_tilted_plane() {
	let mut prober = ProbeOptions::new().prober(machine(|x, y| 0.001 * x + 0.002 * y));
	let survey = prober.survey(Rectangle::new(100.0, 50.0)).unwrap();
	let points: Vec<(f64, f64)> = survey.measurements().iter().map(|m| (m.x, m.y)).collect();
	assert_eq!(
		points,
		[(0.0, 0.0), (100.0, 0.0), (100.0, 50.0), (0.0, 50.0), (50.0, 25.0)]
	);
	assert!(survey.measurements().iter().all(|m| m.converged));

	let flatness = survey.flatness();
	assert!(approx(flatness.x_slope, 0.001), "{flatness:?}");
	assert!(approx(flatness.y_slope, 0.002), "{flatness:?}");
	assert!(approx(flatness.center_mismatch, 0.0), "{flatness:?}");
	assert!(approx(flatness.diagonal_mismatch, 0.0), "{flatness:?}");
}
