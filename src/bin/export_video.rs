use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use stylewave::distort::{CounterPolicy, DistortionConfig, AMPLITUDE_RANGE, SPEED_RANGE, WIDTH_RANGE};
use stylewave::export::{export_frames, ExportOptions};
use stylewave::model::{load_parameter_set, ModelCatalog, PointwiseNet};
use stylewave::playback::HoldSchedule;
use stylewave::video::{ensure_tool_available, open_source, FfmpegSink, FrameSource, SourceSpec};

const DEFAULT_EVERY: u64 = 10;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "export_video",
    version,
    about = "Stylize a video file offline (every Nth frame stylized, the rest held) -> MP4 via ffmpeg"
)]
pub(crate) struct Cli {
    #[arg(long, value_name = "VIDEO")]
    pub(crate) input: PathBuf,

    /// Defaults to `<input stem>_styled.mp4` next to the input.
    #[arg(long, value_name = "MP4")]
    pub(crate) out: Option<PathBuf>,

    /// Catalog slot key, index, name, or a parameter-set file.
    #[arg(long, value_name = "SLOT_OR_PATH")]
    pub(crate) model: Option<String>,

    #[arg(long, value_name = "DIR", default_value = "models")]
    pub(crate) models: PathBuf,

    #[arg(long, value_name = "FILE")]
    pub(crate) catalog: Option<PathBuf>,

    /// Stylize every Nth source frame.
    #[arg(long, default_value_t = DEFAULT_EVERY)]
    pub(crate) every: u64,

    /// Trigger a pulse wave every K output frames.
    #[arg(long, value_name = "K")]
    pub(crate) pulse_every: Option<u64>,

    #[arg(long, default_value_t = DistortionConfig::default().amplitude)]
    pub(crate) amplitude: f32,

    #[arg(long, default_value_t = DistortionConfig::default().speed)]
    pub(crate) speed: f32,

    /// Wave ring width in pixels.
    #[arg(long, default_value_t = DistortionConfig::default().width)]
    pub(crate) width: f32,

    #[arg(long, value_enum, default_value_t = CounterPolicy::Always)]
    pub(crate) counter_policy: CounterPolicy,
}

pub(crate) fn validate_args(args: &Cli) -> Result<()> {
    if args.every == 0 {
        bail!("--every must be >= 1");
    }
    if args.pulse_every == Some(0) {
        bail!("--pulse-every must be >= 1");
    }
    check_range("--amplitude", args.amplitude, AMPLITUDE_RANGE)?;
    check_range("--speed", args.speed, SPEED_RANGE)?;
    check_range("--width", args.width, WIDTH_RANGE)?;
    Ok(())
}

fn check_range(flag: &str, v: f32, (lo, hi): (f32, f32)) -> Result<()> {
    if !v.is_finite() || v < lo || v > hi {
        bail!("{flag} must be within {lo}..={hi}");
    }
    Ok(())
}

pub(crate) fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{stem}_styled.mp4"))
}

pub(crate) fn distortion_from(args: &Cli) -> DistortionConfig {
    DistortionConfig {
        enabled: args.pulse_every.is_some(),
        amplitude: args.amplitude,
        speed: args.speed,
        width: args.width,
    }
}

/// A path to an existing file wins; otherwise look the selection up in the
/// catalog. No selection picks the first catalog slot.
pub(crate) fn resolve_model(args: &Cli) -> Result<(PathBuf, String)> {
    if let Some(sel) = args.model.as_deref() {
        let as_path = Path::new(sel);
        if as_path.is_file() {
            let name = as_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| sel.to_string());
            return Ok((as_path.to_path_buf(), name));
        }
    }

    let catalog = match args.catalog.as_deref() {
        Some(path) => {
            ModelCatalog::load(path).with_context(|| format!("load catalog {}", path.display()))?
        }
        None => ModelCatalog::scan_dir(&args.models)
            .with_context(|| format!("scan model directory {}", args.models.display()))?,
    };
    let idx = match args.model.as_deref() {
        Some(sel) => match catalog.resolve(sel) {
            Some(idx) => idx,
            None => bail!("model '{sel}' not found"),
        },
        None => 0,
    };
    let slot = catalog.get(idx).context("catalog slot vanished")?;
    Ok((slot.path.clone(), slot.name.clone()))
}

fn main() -> Result<()> {
    stylewave::logging::init_stderr();
    let args = Cli::parse();
    run(args)
}

fn run(args: Cli) -> Result<()> {
    validate_args(&args)?;
    ensure_tool_available("ffmpeg")?;
    ensure_tool_available("ffprobe")?;

    let (model_path, model_name) = resolve_model(&args)?;
    let params = load_parameter_set(&model_path)?;
    let mut net = PointwiseNet::from_parameters(params)?;
    log::info!("model: {model_name} ({})", model_path.display());

    let mut source = open_source(&SourceSpec::File(args.input.clone()))?;
    let info = source.info();

    let out = args.out.clone().unwrap_or_else(|| default_output_path(&args.input));
    let mut parent = out.parent().unwrap_or_else(|| Path::new(""));
    if parent == Path::new("") {
        parent = Path::new(".");
    }
    fs::create_dir_all(parent)
        .with_context(|| format!("create output directory {}", parent.display()))?;

    stylewave::interrupt::install()?;
    let mut sink = FfmpegSink::create(&out, info.width, info.height, info.fps)?;

    let opts = ExportOptions {
        schedule: HoldSchedule::new(args.every),
        distortion: distortion_from(&args),
        pulse_every: args.pulse_every,
        policy: args.counter_policy,
    };
    log::info!(
        "exporting {} -> {} (every {} frames, {:.2} fps)",
        args.input.display(),
        out.display(),
        args.every,
        info.fps
    );

    let started = Instant::now();
    let stats = export_frames(
        &mut source,
        &mut sink,
        &mut net,
        &opts,
        stylewave::interrupt::flag(),
    )?;

    if stats.interrupted {
        println!("interrupted; partial output kept");
    }
    println!(
        "wrote {} frames ({} stylized) in {:.1}s -> {}",
        stats.frames_written,
        stats.frames_processed,
        started.elapsed().as_secs_f32(),
        sink.out_path().display()
    );
    Ok(())
}
