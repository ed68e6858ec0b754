use crate::distort::DistortionConfig;
use std::fmt;
use std::path::{Path, PathBuf};

/// Settings carried from one interactive run to the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppPrefs {
    pub amplitude: f32,
    pub speed: f32,
    pub width: f32,
    pub show_hud: bool,
    pub show_inset: bool,
}

impl Default for AppPrefs {
    fn default() -> Self {
        let d = DistortionConfig::default();
        Self {
            amplitude: d.amplitude,
            speed: d.speed,
            width: d.width,
            show_hud: true,
            show_inset: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefsError {
    Io(String),
    Parse { line: usize, message: String },
}

impl fmt::Display for PrefsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Parse { line, message } => write!(f, "parse error at line {line}: {message}"),
        }
    }
}

impl std::error::Error for PrefsError {}

impl AppPrefs {
    /// Distortion settings with the pulse itself off; it is never restored on.
    pub fn distortion(&self) -> DistortionConfig {
        DistortionConfig {
            enabled: false,
            amplitude: self.amplitude,
            speed: self.speed,
            width: self.width,
        }
        .clamped()
    }

    pub fn capture(distortion: &DistortionConfig, show_hud: bool, show_inset: bool) -> Self {
        Self {
            amplitude: distortion.amplitude,
            speed: distortion.speed,
            width: distortion.width,
            show_hud,
            show_inset,
        }
    }

    pub fn parse(text: &str) -> Result<Self, PrefsError> {
        let mut prefs = Self::default();
        for (line_idx, raw) in text.lines().enumerate() {
            let line_no = line_idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(PrefsError::Parse {
                    line: line_no,
                    message: "expected <key>=<value>".to_string(),
                });
            };
            let value = value.trim();
            let bad = |what: &str| PrefsError::Parse {
                line: line_no,
                message: format!("{} must be {what}", key.trim()),
            };
            match key.trim() {
                "amplitude" => prefs.amplitude = parse_f32(value).ok_or_else(|| bad("a number"))?,
                "speed" => prefs.speed = parse_f32(value).ok_or_else(|| bad("a number"))?,
                "width" => prefs.width = parse_f32(value).ok_or_else(|| bad("a number"))?,
                "show_hud" => prefs.show_hud = parse_bool(value).ok_or_else(|| bad("true/false"))?,
                "show_inset" => {
                    prefs.show_inset = parse_bool(value).ok_or_else(|| bad("true/false"))?
                }
                // Unknown keys are left for newer versions.
                _ => {}
            }
        }
        Ok(prefs)
    }

    pub fn load(path: Option<&Path>) -> Result<Self, PrefsError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(PrefsError::Io(err.to_string())),
        }
    }

    pub fn to_text(&self) -> String {
        format!(
            "# stylewave prefs v1\namplitude={}\nspeed={}\nwidth={}\nshow_hud={}\nshow_inset={}\n",
            self.amplitude, self.speed, self.width, self.show_hud, self.show_inset
        )
    }

    pub fn save(&self, path: Option<&Path>) -> Result<(), PrefsError> {
        let Some(path) = path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PrefsError::Io(e.to_string()))?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, self.to_text()).map_err(|e| PrefsError::Io(e.to_string()))?;
        std::fs::rename(&tmp, path).map_err(|e| PrefsError::Io(e.to_string()))
    }
}

pub fn prefs_storage_path() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.trim().is_empty() {
            return Some(PathBuf::from(xdg).join("stylewave").join("prefs.txt"));
        }
    }
    let home = std::env::var("HOME").ok().filter(|h| !h.trim().is_empty())?;
    Some(PathBuf::from(home).join(".config").join("stylewave").join("prefs.txt"))
}

fn parse_f32(raw: &str) -> Option<f32> {
    raw.parse::<f32>().ok().filter(|v| v.is_finite())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
