//! Pick-and-place executable entry point.
//!
//! # Architecture
//!
//! The executable:
//!
//!     - Creates a session and initialises logging
//!     - Loads the parameters of the cell and of the simulation
//!     - Opens the camera and the actuator gateway, aborting if either is unavailable
//!     - Runs one pick-and-place cycle with the `PickMgr`, or with `--watch` only runs the
//!       object locator and logs what it sees
//!     - Saves the cycle report into the session directory
//!
//! Ctrl-C cancels the cycle, leaving the arm stopped.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use picker_lib::{
    cancel::CancelToken,
    obj_loc::{ObjLocError, ObjectLocator},
    pick_mgr::{CycleState, PickMgr, PickMgrParams},
    sim::{SimCell, SimParams},
    trigger::ImmediateTrigger,
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use std::rc::Rc;
use structopt::StructOpt;

// Internal
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
    time::{Clock, SysClock},
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Command line options.
#[derive(Debug, StructOpt)]
#[structopt(
    name = "picker_exec",
    about = "Vision-guided pick-and-place controller, running against the simulated cell"
)]
struct Opts {
    /// Only run the object locator and log detections, without moving the arm.
    #[structopt(long)]
    watch: bool,

    /// Number of frames to process in watch mode.
    #[structopt(long, default_value = "300")]
    max_frames: usize,

    /// Minimum level of log messages, `info` or more verbose.
    #[structopt(long, default_value = "info")]
    log_level: LevelFilter,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("picker_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(opts.log_level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Pick-and-place Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opts);

    // ---- LOAD PARAMETERS ----

    let params: PickMgrParams =
        util::params::load("picker_exec.toml").wrap_err("Could not load picker_exec params")?;
    let sim_params: SimParams =
        util::params::load("sim.toml").wrap_err("Could not load sim params")?;

    info!("Parameters loaded");

    // ---- OPEN EQUIPMENT ----

    let cell = SimCell::new(sim_params);
    let clock: Rc<dyn Clock> = Rc::new(cell.clock.clone());

    let camera = cell.open_camera().wrap_err("Failed to open the camera")?;
    let arm = cell
        .open_arm()
        .wrap_err("Failed to open the actuator gateway")?;
    let detector = cell.world_detector();

    info!("Equipment opened\n");

    // ---- CANCELLATION ----

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            warn!("Interrupt received, cancelling");
            cancel.cancel();
        })
        .wrap_err("Failed to set the interrupt handler")?;
    }

    let wall_clock = SysClock::new();

    // ---- WATCH MODE ----

    if opts.watch {
        let mut locator =
            ObjectLocator::new(params.obj_loc, Box::new(camera), Box::new(detector), clock);

        watch(&mut locator, opts.max_frames, &cancel).wrap_err("Watch mode failed")?;

        info!("Watch complete in {:.3} s", wall_clock.now_s());
        return Ok(());
    }

    // ---- PICK AND PLACE ----

    let mut pick_mgr = PickMgr::new(
        params,
        Box::new(arm),
        Box::new(camera),
        Box::new(detector),
        Box::new(ImmediateTrigger),
        clock.clone(),
        cancel,
    )
    .wrap_err("Failed to initialise the PickMgr")?;

    info!("Starting pick-and-place cycle");

    let report = pick_mgr.run();

    info!(
        "Cycle ended in {:?}: {:.2} s simulated, {:.3} s wall time",
        report.final_state,
        clock.now_s(),
        wall_clock.now_s()
    );

    let report_path = session
        .save_json("cycle_report.json", &report)
        .wrap_err("Failed to save the cycle report")?;
    info!("Cycle report saved to {:?}", report_path);

    match report.final_state {
        CycleState::Done => Ok(()),
        _ => Err(eyre!("Cycle failed: {:?}", report.failure)),
    }
}

/// Log every detection made by the locator, until `max_frames` have been processed, the stream
/// ends, or the run is cancelled.
fn watch(
    locator: &mut ObjectLocator,
    max_frames: usize,
    cancel: &CancelToken,
) -> Result<(), ObjLocError> {
    let mut num_frames = 0;
    let mut num_detections = 0;

    info!("Watching for up to {} frames", max_frames);

    while num_frames < max_frames && !cancel.is_cancelled() {
        match locator.poll() {
            Ok(Some(det)) => {
                num_detections += 1;
                info!(
                    "Frame {}: target at x = {} px, width {} px",
                    num_frames, det.x_centre, det.width
                );
            }
            Ok(None) => debug!("Frame {}: no target", num_frames),
            Err(ObjLocError::StreamEnded) => {
                info!("Camera stream ended");
                break;
            }
            Err(e) => return Err(e),
        }

        num_frames += 1;
    }

    info!(
        "Watched {} frames, {} with a detection",
        num_frames, num_detections
    );

    Ok(())
}
