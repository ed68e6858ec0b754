//! Video I/O through `ffmpeg`/`ffprobe` child processes exchanging raw RGBA.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::error::PipelineError;
use crate::frame::ImageBuffer;

pub const DEFAULT_CAMERA_SIZE: (usize, usize) = (640, 480);
pub const DEFAULT_CAMERA_FPS: u32 = 30;
/// Minimum gap between camera decoder restarts.
pub const CAMERA_RESTART_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Camera,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub width: usize,
    pub height: usize,
    pub fps: f32,
    /// Known for files whose container reports it.
    pub frame_count: Option<u64>,
}

/// An ordered stream of frames: finite for files, endless for cameras.
pub trait FrameSource {
    fn info(&self) -> SourceInfo;

    fn kind(&self) -> SourceKind;

    /// `Ok(None)` is end of stream.
    fn read_frame(&mut self) -> Result<Option<ImageBuffer>, PipelineError>;

    /// Position the stream so the next read returns frame `index`.
    /// Cameras ignore this.
    fn seek(&mut self, index: u64) -> Result<(), PipelineError>;
}

/// Accepts frames for encoding at a fixed size and rate.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &ImageBuffer) -> Result<()>;

    /// Flush and close the output. Safe to call more than once.
    fn finish(&mut self) -> Result<()>;

    fn frames_written(&self) -> u64;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    File(PathBuf),
    Camera {
        index: u32,
        width: usize,
        height: usize,
        fps: u32,
    },
}

impl SourceSpec {
    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Camera { index, .. } => format!("camera {index}"),
        }
    }
}

/// Open a source and prove it yields a frame. Both failures are fatal.
pub fn open_source(spec: &SourceSpec) -> Result<FfmpegSource, PipelineError> {
    let mut source = match spec {
        SourceSpec::File(path) => FfmpegSource::open_file(path)?,
        SourceSpec::Camera {
            index,
            width,
            height,
            fps,
        } => FfmpegSource::open_camera(*index, *width, *height, *fps)?,
    };
    match source.prime() {
        Ok(true) => {}
        Ok(false) => {
            return Err(PipelineError::SourceUnavailable(format!(
                "{}: initial test read returned no frame",
                spec.describe()
            )));
        }
        Err(err) => {
            return Err(PipelineError::SourceUnavailable(format!(
                "{}: initial test read failed: {err}",
                spec.describe()
            )));
        }
    }
    let info = source.info();
    log::info!(
        "opened {} ({}x{} @ {:.2} fps{})",
        spec.describe(),
        info.width,
        info.height,
        info.fps,
        info.frame_count
            .map(|n| format!(", {n} frames"))
            .unwrap_or_default()
    );
    Ok(source)
}

pub fn ensure_tool_available(tool: &str) -> Result<()> {
    match Command::new(tool)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            bail!("{tool} not found in PATH (install ffmpeg and retry)")
        }
        Err(err) => Err(anyhow!("failed to run {tool}: {err}")),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    width: Option<usize>,
    height: Option<usize>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Parse ffprobe's `-of json` stream report.
pub fn parse_probe(json: &str) -> Result<SourceInfo, String> {
    let out: ProbeOutput = serde_json::from_str(json).map_err(|e| e.to_string())?;
    let stream = out
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream".to_string())?;

    let width = stream.width.filter(|w| *w > 0).ok_or("missing width")?;
    let height = stream.height.filter(|h| *h > 0).ok_or("missing height")?;
    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .unwrap_or(30.0);
    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|n| *n > 0);

    Ok(SourceInfo {
        width,
        height,
        fps,
        frame_count,
    })
}

/// `"30000/1001"` or `"25"`. Zero or malformed rates are `None`.
pub fn parse_rate(s: &str) -> Option<f32> {
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => s.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate as f32)
}

fn probe_file(path: &Path) -> Result<SourceInfo, PipelineError> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-select_streams", "v:0", "-show_entries"])
        .arg("stream=width,height,r_frame_rate,avg_frame_rate,nb_frames")
        .args(["-of", "json"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| PipelineError::SourceUnavailable(format!("run ffprobe: {e}")))?;
    if !output.status.success() {
        return Err(PipelineError::SourceUnavailable(format!(
            "{}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    parse_probe(&String::from_utf8_lossy(&output.stdout))
        .map_err(|e| PipelineError::SourceUnavailable(format!("{}: {e}", path.display())))
}

#[derive(Debug, Clone)]
enum Origin {
    File(PathBuf),
    Camera(u32),
}

/// Rate limit for decoder restarts.
#[derive(Debug, Clone, Copy)]
pub struct RestartGate {
    interval: Duration,
    last: Option<Instant>,
}

impl RestartGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True when a restart may happen at `now`; records it if so.
    pub fn ready(&mut self, now: Instant) -> bool {
        let ready = self
            .last
            .is_none_or(|t| now.saturating_duration_since(t) >= self.interval);
        if ready {
            self.last = Some(now);
        }
        ready
    }
}

/// Decoder child process streaming RGBA frames on stdout.
pub struct FfmpegSource {
    origin: Origin,
    program: PathBuf,
    info: SourceInfo,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    next_index: u64,
    pending: Option<ImageBuffer>,
    restart: RestartGate,
    restarts: u64,
}

impl FfmpegSource {
    pub fn open_file(path: &Path) -> Result<Self, PipelineError> {
        if !path.is_file() {
            return Err(PipelineError::SourceUnavailable(format!(
                "{} does not exist",
                path.display()
            )));
        }
        let info = probe_file(path)?;
        let mut source = Self {
            origin: Origin::File(path.to_path_buf()),
            program: PathBuf::from("ffmpeg"),
            info,
            child: None,
            stdout: None,
            next_index: 0,
            pending: None,
            restart: RestartGate::new(CAMERA_RESTART_INTERVAL),
            restarts: 0,
        };
        source.spawn(0)?;
        Ok(source)
    }

    pub fn open_camera(index: u32, width: usize, height: usize, fps: u32) -> Result<Self, PipelineError> {
        Self::open_camera_with("ffmpeg", index, width, height, fps, CAMERA_RESTART_INTERVAL)
    }

    /// Camera source driven by `program` instead of `ffmpeg` from `PATH`.
    pub fn open_camera_with(
        program: impl Into<PathBuf>,
        index: u32,
        width: usize,
        height: usize,
        fps: u32,
        restart_interval: Duration,
    ) -> Result<Self, PipelineError> {
        let mut source = Self {
            origin: Origin::Camera(index),
            program: program.into(),
            info: SourceInfo {
                width: width.max(1),
                height: height.max(1),
                fps: fps.max(1) as f32,
                frame_count: None,
            },
            child: None,
            stdout: None,
            next_index: 0,
            pending: None,
            restart: RestartGate::new(restart_interval),
            restarts: 0,
        };
        source.spawn(0)?;
        Ok(source)
    }

    /// Camera decoder restarts so far.
    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    /// Read one frame and keep it for the next `read_frame`.
    fn prime(&mut self) -> Result<bool, PipelineError> {
        match self.read_raw()? {
            Some(frame) => {
                self.pending = Some(frame);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn spawn(&mut self, start_index: u64) -> Result<(), PipelineError> {
        self.kill();

        let mut cmd = Command::new(&self.program);
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin"]);
        match &self.origin {
            Origin::File(path) => {
                if start_index > 0 {
                    let t = start_index as f64 / self.info.fps.max(1.0) as f64;
                    cmd.arg("-ss").arg(format!("{t:.6}"));
                }
                cmd.arg("-i").arg(path);
            }
            Origin::Camera(index) => {
                camera_input_args(&mut cmd, *index, &self.info)?;
            }
        }
        cmd.args(["-an", "-f", "rawvideo", "-pix_fmt", "rgba"])
            .arg("-vf")
            .arg(format!("scale={}:{}", self.info.width, self.info.height))
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        detach_process_group(&mut cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| PipelineError::SourceUnavailable(format!("spawn ffmpeg decoder: {e}")))?;
        self.stdout = child.stdout.take();
        self.child = Some(child);
        self.next_index = start_index;
        self.pending = None;
        Ok(())
    }

    fn read_raw(&mut self) -> Result<Option<ImageBuffer>, PipelineError> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Err(PipelineError::ReadFailure("decoder not running".to_string()));
        };
        let mut data = vec![0u8; self.info.width * self.info.height * 4];
        let mut filled = 0;
        while filled < data.len() {
            match stdout.read(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(PipelineError::ReadFailure(e.to_string())),
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled < data.len() {
            return Err(PipelineError::ReadFailure(format!(
                "truncated frame ({filled} of {} bytes)",
                data.len()
            )));
        }
        self.next_index += 1;
        Ok(ImageBuffer::from_rgba(self.info.width, self.info.height, data))
    }

    /// Replace a camera decoder that exited or broke mid-frame. The next
    /// read comes from the new child.
    fn restart_camera(&mut self, reason: &str) {
        if !self.restart.ready(Instant::now()) {
            return;
        }
        log::warn!("camera decoder stopped ({reason}), restarting");
        match self.spawn(0) {
            Ok(()) => self.restarts += 1,
            Err(err) => log::warn!("camera restart failed: {err}"),
        }
    }

    fn kill(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn kind(&self) -> SourceKind {
        match self.origin {
            Origin::File(_) => SourceKind::File,
            Origin::Camera(_) => SourceKind::Camera,
        }
    }

    fn read_frame(&mut self) -> Result<Option<ImageBuffer>, PipelineError> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }
        let result = self.read_raw();
        if matches!(self.origin, Origin::Camera(_)) {
            match &result {
                Ok(Some(_)) => {}
                Ok(None) => self.restart_camera("end of stream"),
                Err(err) => self.restart_camera(&err.to_string()),
            }
        }
        result
    }

    fn seek(&mut self, index: u64) -> Result<(), PipelineError> {
        if self.kind() == SourceKind::Camera {
            return Ok(());
        }
        // The primed frame sits one index behind the decoder.
        let position = if self.pending.is_some() {
            self.next_index - 1
        } else {
            self.next_index
        };
        if index == position {
            return Ok(());
        }
        if index < position {
            return self.spawn(index);
        }

        self.pending = None;
        while self.next_index < index {
            if self.read_raw()?.is_none() {
                break;
            }
        }
        Ok(())
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(target_os = "linux")]
fn camera_input_args(cmd: &mut Command, index: u32, info: &SourceInfo) -> Result<(), PipelineError> {
    cmd.args(["-f", "v4l2"])
        .arg("-framerate")
        .arg(format!("{}", info.fps))
        .arg("-video_size")
        .arg(format!("{}x{}", info.width, info.height))
        .arg("-i")
        .arg(format!("/dev/video{index}"));
    Ok(())
}

#[cfg(target_os = "macos")]
fn camera_input_args(cmd: &mut Command, index: u32, info: &SourceInfo) -> Result<(), PipelineError> {
    cmd.args(["-f", "avfoundation"])
        .arg("-framerate")
        .arg(format!("{}", info.fps))
        .arg("-video_size")
        .arg(format!("{}x{}", info.width, info.height))
        .arg("-i")
        .arg(format!("{index}"));
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn camera_input_args(_cmd: &mut Command, index: u32, _info: &SourceInfo) -> Result<(), PipelineError> {
    Err(PipelineError::SourceUnavailable(format!(
        "camera {index}: camera capture is only supported on Linux and macOS"
    )))
}

/// Keep terminal Ctrl-C from reaching the child directly.
#[cfg(unix)]
fn detach_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn detach_process_group(_cmd: &mut Command) {}

/// H.264 encoder child fed RGBA frames on stdin.
pub struct FfmpegSink {
    out_path: PathBuf,
    width: usize,
    height: usize,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    written: u64,
}

impl FfmpegSink {
    pub fn create(out_path: &Path, width: usize, height: usize, fps: f32) -> Result<Self> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgba"])
            .arg("-video_size")
            .arg(format!("{width}x{height}"))
            .arg("-framerate")
            .arg(format!("{fps}"))
            .args(["-i", "-"])
            .arg("-vf")
            .arg("pad=ceil(iw/2)*2:ceil(ih/2)*2")
            .args(["-c:v", "libx264", "-pix_fmt", "yuv420p"])
            .args(["-movflags", "+faststart"])
            .arg(out_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        detach_process_group(&mut cmd);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawn ffmpeg encoder for {}", out_path.display()))?;
        let stdin = child
            .stdin
            .take()
            .context("failed to open ffmpeg stdin for rawvideo input")?;

        Ok(Self {
            out_path: out_path.to_path_buf(),
            width,
            height,
            child: Some(child),
            stdin: Some(stdin),
            written: 0,
        })
    }

    pub fn out_path(&self) -> &Path {
        &self.out_path
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &ImageBuffer) -> Result<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            bail!("sink already finished");
        };
        if frame.width == self.width && frame.height == self.height {
            stdin.write_all(&frame.data)
        } else {
            stdin.write_all(&frame.resized(self.width, self.height).data)
        }
        .context("write frame to ffmpeg stdin")?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait().context("wait for ffmpeg")?;
        if !status.success() {
            bail!("ffmpeg exited with status {status}");
        }
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
    }
}
