use std::path::PathBuf;
use std::process::ExitCode;

use af_core::mocks::FrameBag;
use af_core::Af;
use af_traits::{AfMode, AfState, AfStatus, AgcStatus, CameraMode};
use clap::{Args, Parser, Subcommand, ValueEnum};
use eyre::WrapErr;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod sim;

#[derive(Parser)]
#[command(
    name = "af_cli",
    about = "Drive the autofocus core frame-by-frame against a simulated scene"
)]
struct Cli {
    /// Tuning file (TOML); built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit one JSON object per frame instead of human-readable lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a focus scan over a synthetic scene and report the verdict.
    Scan(ScanArgs),
}

#[derive(Args)]
struct ScanArgs {
    /// Frames to simulate.
    #[arg(long, default_value_t = 150)]
    frames: u32,

    /// Dioptre distance of the simulated subject.
    #[arg(long, default_value_t = 3.0)]
    peak: f64,

    /// Autofocus mode to exercise.
    #[arg(long, value_enum, default_value = "continuous")]
    mode: Mode,

    /// Disable the synthetic PDAF samples, forcing a contrast scan.
    #[arg(long)]
    no_pdaf: bool,

    /// Confidence reported by each synthetic PDAF cell.
    #[arg(long, default_value_t = 100)]
    pdaf_conf: u32,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Auto,
    Continuous,
}

/// Initialize tracing once for the whole app; RUST_LOG wins over the CLI
/// flag.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn sensor_mode() -> CameraMode {
    CameraMode {
        crop_x: 0.0,
        crop_y: 0.0,
        width: 1920,
        height: 1080,
        scale_x: 1.0,
        scale_y: 1.0,
    }
}

fn emit_frame(json: bool, frame: u32, position: Option<f64>, status: &AfStatus) {
    if json {
        let record = serde_json::json!({
            "frame": frame,
            "position": position,
            "lens_setting": status.lens_setting,
            "state": format!("{:?}", status.state),
            "pause": format!("{:?}", status.pause_state),
        });
        println!("{record}");
    } else {
        let lens = status
            .lens_setting
            .map_or_else(|| "-".to_string(), |v| v.to_string());
        let pos = position.map_or_else(|| "   ?".to_string(), |p| format!("{p:5.2}"));
        println!(
            "frame {frame:3}  pos {pos} dpt  lens {lens:>4}  {:?}/{:?}",
            status.state, status.pause_state
        );
    }
}

fn run_scan(cli: &Cli, args: &ScanArgs) -> eyre::Result<AfState> {
    let mut af = Af::new();
    if let Some(path) = &cli.config {
        let tuning = af_config::load_file(path)
            .wrap_err_with(|| format!("loading tuning file {}", path.display()))?;
        af.read(&tuning).wrap_err("interpreting tuning file")?;
    }
    af.initialise();
    af.switch_mode(&sensor_mode());

    af.set_mode(match args.mode {
        Mode::Auto => AfMode::Auto,
        Mode::Continuous => AfMode::Continuous,
    });
    if matches!(args.mode, Mode::Auto) {
        af.trigger_scan();
    }

    let scene = sim::Scene::new(args.peak);
    debug!(
        frames = args.frames,
        peak = args.peak,
        pdaf = !args.no_pdaf,
        "starting simulated scan"
    );
    let mut last_state = AfState::Idle;

    for frame in 0..args.frames {
        // Metadata reflects the frame exposed at the previous lens
        // position.
        let exposed_at = af.get_lens_position();
        let mut metadata = FrameBag::new();
        metadata.agc = Some(AgcStatus { locked: true });
        if !args.no_pdaf {
            metadata.pdaf = Some(scene.pdaf_at(exposed_at.unwrap_or(0.0), args.pdaf_conf));
        }
        af.prepare(&mut metadata);

        // The lens settles to the commanded position before the ISP
        // statistics for the next frame are gathered.
        let settled = af.get_lens_position();
        af.process(&scene.stats_at(settled.unwrap_or(0.0)));

        let status = metadata
            .af_status
            .ok_or_else(|| eyre::eyre!("no af status published"))?;
        emit_frame(cli.json, frame, settled, &status);
        last_state = status.state;
    }

    Ok(last_state)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let result = match &cli.command {
        Command::Scan(args) => run_scan(&cli, args),
    };

    match result {
        Ok(state) => {
            println!("focus: {state:?}");
            if state == AfState::Focused {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
