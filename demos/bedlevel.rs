//! Demo: probe the corners and center of a bed and report how flat it is.

use bedlevel::{port::Port, probe::ProbeOptions, survey::Rectangle};
use clap::Parser;
use simple_logger::SimpleLogger;

/// Probe the corners and center of a bed and report how flat it is.
///
/// The probe must be positioned above the corner nearest the machine's
/// origin before starting. That position becomes the origin of the survey.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Serial port
    #[arg(short, long, value_name = "/dev/cu.usb...")]
    port: String,

    /// Log every line sent and received
    #[arg(short = 'V', long)]
    debug: bool,

    /// Baud rate
    #[arg(short, long, default_value_t = 115_200)]
    baud: u32,

    /// Extent of the bed along X, in millimeters
    #[arg(long, default_value_t = 100.0)]
    width: f64,

    /// Extent of the bed along Y, in millimeters
    #[arg(long, default_value_t = 100.0)]
    height: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    let port = Port::open_serial_options()
        .baud_rate(args.baud)
        .open(&args.port)?;
    let mut prober = ProbeOptions::new().prober(port);
    prober.begin()?;
    let survey = prober.survey(Rectangle::new(args.width, args.height))?;
    prober.finish()?;

    println!("{survey}");
    if !survey.converged() {
        eprintln!("some measurements did not settle; consider lowering the slow feed rate");
    }
    Ok(())
}
