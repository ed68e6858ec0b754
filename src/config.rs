use crate::distort::CounterPolicy;
use crate::video::{SourceSpec, DEFAULT_CAMERA_FPS, DEFAULT_CAMERA_SIZE};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "stylewave",
    version,
    about = "Live neural style transfer in the terminal, with model blending and pulse waves"
)]
pub struct Config {
    /// Video file to loop. Without it the camera is used.
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Camera device index.
    #[arg(long, default_value_t = 0, conflicts_with = "input")]
    pub camera: u32,

    /// Camera capture width.
    #[arg(long, default_value_t = DEFAULT_CAMERA_SIZE.0)]
    pub width: usize,

    /// Camera capture height.
    #[arg(long, default_value_t = DEFAULT_CAMERA_SIZE.1)]
    pub height: usize,

    /// Camera capture rate and render pacing for camera input.
    #[arg(long, default_value_t = DEFAULT_CAMERA_FPS)]
    pub fps: u32,

    /// Playback rate for video files; defaults to the file's own rate.
    #[arg(long, value_name = "FPS")]
    pub target_fps: Option<f32>,

    /// Directory scanned for `*.json` parameter sets when no catalog is given.
    #[arg(long, value_name = "DIR", default_value = "models")]
    pub models: PathBuf,

    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Initial model: slot key, index, or name.
    #[arg(long, value_name = "KEY_INDEX_OR_NAME")]
    pub model: Option<String>,

    #[arg(long, value_name = "FILE")]
    pub keymap: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = RendererMode::HalfBlock)]
    pub renderer: RendererMode,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub auto_probe: bool,

    #[arg(long, value_enum, default_value_t = CounterPolicy::Always)]
    pub counter_policy: CounterPolicy,

    /// Start with the pulse distortion enabled.
    #[arg(long, default_value_t = false)]
    pub pulse: bool,

    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sync_updates: bool,

    /// Load and save distortion/overlay prefs between runs.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub prefs: bool,
}

impl Config {
    pub fn source_spec(&self) -> SourceSpec {
        match &self.input {
            Some(path) => SourceSpec::File(path.clone()),
            None => SourceSpec::Camera {
                index: self.camera,
                width: self.width,
                height: self.height,
                fps: self.fps,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RendererMode {
    #[value(name = "half-block", alias = "halfblock", alias = "half_block", alias = "hb")]
    HalfBlock,
    Kitty,
}
