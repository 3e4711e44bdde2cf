use std::time::Instant;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use omnibase_runtime::hardware::{
    Clock, DriveMotor, HeadingSensor, SimParams, open_drivetrain, sim_drivetrain,
};
use omnibase_runtime::messages::{MoveOutcome, MoveReport};
use omnibase_runtime::motion::{self, LoopSettings, MotionController, MotionError};

/// Scripted autonomous routine runner for the omnibase
#[derive(Parser)]
struct Args {
    /// Serial port of the pod bus; runs against the simulated plant if omitted
    #[arg(long)]
    port: Option<String>,

    /// Disable the per-move wall-clock guard (the original firmware behavior)
    #[arg(long)]
    unguarded: bool,
}

#[derive(Default)]
struct RoutineLog {
    reports: Vec<MoveReport>,
    count: u32,
}

impl RoutineLog {
    /// Run one primitive call, record its report, and say whether the
    /// routine should continue
    fn step<F>(&mut self, op: &str, action: F) -> bool
    where
        F: FnOnce() -> motion::Result<()>,
    {
        self.count += 1;
        let started = Instant::now();
        let result = action();
        if let Err(e) = &result {
            warn!("step {} ({}) failed: {}", self.count, op, e);
        }
        self.reports.push(MoveReport {
            step: self.count,
            op: op.to_string(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            outcome: MoveOutcome::from_result(&result),
        });
        result.is_ok()
    }
}

/// A short scripted sequence exercising every primitive. The competition
/// routine itself is authored elsewhere; this runner stands in for it.
fn run_routine<M, S, C>(controller: &mut MotionController<M, S, C>) -> Vec<MoveReport>
where
    M: DriveMotor,
    S: HeadingSensor,
    C: Clock,
{
    let mut log = RoutineLog::default();

    let completed = log.step("zero_gyro", || {
        controller.drivetrain.gyro.reset().map_err(MotionError::from)
    }) && log.step("drive_to(800, -65)", || controller.drive_to(800, -65.0))
        && log.step("turn_positive(15)", || controller.turn_positive(15.0))
        && log.step("drive_to(1000, -50)", || controller.drive_to(1000, -50.0))
        && log.step("turn_negative(-35)", || controller.turn_negative(-35.0))
        && log.step("drive_to(300, -90)", || controller.drive_to(300, -90.0))
        && log.step("drive_timed(50, 50, 500ms)", || {
            controller.drive_timed(50, 50, std::time::Duration::from_millis(500))
        })
        && log.step("slide_to_target(80, 400, 0)", || {
            controller.slide_to_target(80, 400, 0.0)
        })
        && log.step("drive_to(-700, -90)", || controller.drive_to(-700, -90.0));

    if completed {
        info!("routine complete: {} steps", log.count);
    } else {
        warn!("routine aborted at step {}", log.count);
    }
    log.reports
}

fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();
    let settings = if args.unguarded {
        LoopSettings::unguarded()
    } else {
        LoopSettings::default()
    };

    let reports = match &args.port {
        Some(port) => match open_drivetrain(port) {
            Ok((drivetrain, clock)) => {
                let mut controller =
                    MotionController::new(drivetrain, clock).with_settings(settings);
                run_routine(&mut controller)
            }
            Err(e) => {
                eprintln!("Failed to open pod bus: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            info!("no --port given, running against the simulated plant");
            let (drivetrain, clock, _state) = sim_drivetrain(SimParams::default());
            let mut controller = MotionController::new(drivetrain, clock).with_settings(settings);
            run_routine(&mut controller)
        }
    };

    for report in &reports {
        match serde_json::to_string(report) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("failed to serialize report: {}", e),
        }
    }
}
