//! Radial pulse-wave distortion.
//!
//! Each triggered wave is a Gaussian ring expanding from the frame centre.
//! Ring contributions add up into one radial displacement per pixel, and the
//! frame is remapped once with that combined field.

use crate::frame::ImageBuffer;
use clap::ValueEnum;

pub const AMPLITUDE_RANGE: (f32, f32) = (5.0, 50.0);
pub const SPEED_RANGE: (f32, f32) = (1.0, 50.0);
pub const WIDTH_RANGE: (f32, f32) = (5.0, 200.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistortionConfig {
    pub enabled: bool,
    /// Peak displacement in pixels.
    pub amplitude: f32,
    /// Ring growth in pixels per frame tick.
    pub speed: f32,
    /// Ring thickness in pixels.
    pub width: f32,
}

impl Default for DistortionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            amplitude: 20.0,
            speed: 8.0,
            width: 30.0,
        }
    }
}

impl DistortionConfig {
    pub fn clamped(self) -> Self {
        Self {
            enabled: self.enabled,
            amplitude: clamp_range(self.amplitude, AMPLITUDE_RANGE),
            speed: clamp_range(self.speed, SPEED_RANGE),
            width: clamp_range(self.width, WIDTH_RANGE),
        }
    }

    pub fn adjust_amplitude(&mut self, delta: f32) {
        self.amplitude = clamp_range(self.amplitude + delta, AMPLITUDE_RANGE);
    }

    pub fn adjust_speed(&mut self, delta: f32) {
        self.speed = clamp_range(self.speed + delta, SPEED_RANGE);
    }

    pub fn adjust_width(&mut self, delta: f32) {
        self.width = clamp_range(self.width + delta, WIDTH_RANGE);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wave {
    pub birth_frame: u64,
    pub amplitude: f32,
}

impl Wave {
    pub fn radius(&self, frame: u64, speed: f32) -> f32 {
        frame.saturating_sub(self.birth_frame) as f32 * speed
    }
}

/// When the engine's frame counter advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CounterPolicy {
    /// Every `apply` call, including pass-through calls.
    #[default]
    Always,
    /// Only calls that actually displace pixels.
    WhileActive,
}

/// Per-pixel polar coordinates for one frame size.
struct RadialGrid {
    width: usize,
    height: usize,
    dist: Vec<f32>,
    cos: Vec<f32>,
    sin: Vec<f32>,
}

impl RadialGrid {
    fn new(width: usize, height: usize) -> Self {
        let n = width * height;
        let mut dist = Vec::with_capacity(n);
        let mut cos = Vec::with_capacity(n);
        let mut sin = Vec::with_capacity(n);
        let (cx, cy) = frame_center(width, height);
        for y in 0..height {
            let dy = y as f32 - cy;
            for x in 0..width {
                let dx = x as f32 - cx;
                let theta = dy.atan2(dx);
                dist.push((dx * dx + dy * dy).sqrt());
                cos.push(theta.cos());
                sin.push(theta.sin());
            }
        }
        Self {
            width,
            height,
            dist,
            cos,
            sin,
        }
    }
}

pub struct WaveField {
    waves: Vec<Wave>,
    frame_counter: u64,
    policy: CounterPolicy,
    grid: Option<RadialGrid>,
    displacement: Vec<f32>,
}

impl WaveField {
    pub fn new(policy: CounterPolicy) -> Self {
        Self {
            waves: Vec::new(),
            frame_counter: 0,
            policy,
            grid: None,
            displacement: Vec::new(),
        }
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn waves(&self) -> &[Wave] {
        &self.waves
    }

    pub fn active_waves(&self) -> usize {
        self.waves.len()
    }

    pub fn clear(&mut self) {
        self.waves.clear();
    }

    /// Start a new wave at the current frame. Ignored while distortion is off.
    pub fn trigger(&mut self, config: &DistortionConfig) -> bool {
        if !config.enabled {
            return false;
        }
        self.waves.push(Wave {
            birth_frame: self.frame_counter,
            amplitude: config.amplitude,
        });
        true
    }

    /// Drop waves whose ring has left the frame. Returns how many were removed.
    pub fn sweep(&mut self, width: usize, height: usize, config: &DistortionConfig) -> usize {
        let limit = max_frame_radius(width, height) + config.width;
        let frame = self.frame_counter;
        let before = self.waves.len();
        self.waves.retain(|w| w.radius(frame, config.speed) <= limit);
        before - self.waves.len()
    }

    pub fn apply(&mut self, frame: &ImageBuffer, config: &DistortionConfig) -> ImageBuffer {
        self.sweep(frame.width, frame.height, config);

        if !config.enabled || self.waves.is_empty() || frame.width == 0 || frame.height == 0 {
            if self.policy == CounterPolicy::Always {
                self.frame_counter += 1;
            }
            return frame.clone();
        }

        self.accumulate(frame.width, frame.height, config);
        let out = self.remap(frame);
        self.frame_counter += 1;
        out
    }

    fn accumulate(&mut self, width: usize, height: usize, config: &DistortionConfig) {
        let rebuild = self
            .grid
            .as_ref()
            .is_none_or(|g| g.width != width || g.height != height);
        if rebuild {
            self.grid = Some(RadialGrid::new(width, height));
        }
        let Some(grid) = self.grid.as_ref() else {
            return;
        };

        let n = width * height;
        self.displacement.clear();
        self.displacement.resize(n, 0.0);

        let denom = (config.width * config.width / 2.0).max(1e-6);
        for wave in &self.waves {
            let r = wave.radius(self.frame_counter, config.speed);
            // Past three ring widths the Gaussian is below 1e-7.
            let reach = config.width * 3.0;
            for (disp, &d) in self.displacement.iter_mut().zip(&grid.dist) {
                let delta = d - r;
                if delta.abs() > reach {
                    continue;
                }
                *disp += (-(delta * delta) / denom).exp() * wave.amplitude;
            }
        }
    }

    fn remap(&self, frame: &ImageBuffer) -> ImageBuffer {
        let Some(grid) = self.grid.as_ref() else {
            return frame.clone();
        };
        let w = frame.width;
        let h = frame.height;
        let mut out = ImageBuffer::new(w, h);

        for y in 0..h {
            for x in 0..w {
                let i = y * w + x;
                let disp = self.displacement[i];
                let o = i * 4;
                if disp == 0.0 {
                    out.data[o..o + 4].copy_from_slice(&frame.data[o..o + 4]);
                    continue;
                }
                let sx = x as f32 + disp * grid.cos[i];
                let sy = y as f32 + disp * grid.sin[i];
                let px = sample_bilinear_reflect(frame, sx, sy);
                out.data[o..o + 4].copy_from_slice(&px);
            }
        }

        out
    }
}

impl Default for WaveField {
    fn default() -> Self {
        Self::new(CounterPolicy::default())
    }
}

pub fn frame_center(width: usize, height: usize) -> (f32, f32) {
    (width as f32 / 2.0, height as f32 / 2.0)
}

/// Distance from the centre to a corner.
pub fn max_frame_radius(width: usize, height: usize) -> f32 {
    let (cx, cy) = frame_center(width, height);
    (cx * cx + cy * cy).sqrt()
}

/// Mirror `v` into `[0, len-1]` without repeating the edge sample.
fn reflect(v: f32, len: usize) -> f32 {
    if len <= 1 {
        return 0.0;
    }
    let max = (len - 1) as f32;
    let period = 2.0 * max;
    let mut m = v.abs() % period;
    if m > max {
        m = period - m;
    }
    m
}

fn sample_bilinear_reflect(frame: &ImageBuffer, x: f32, y: f32) -> [u8; 4] {
    let w = frame.width;
    let h = frame.height;
    let x = reflect(x, w);
    let y = reflect(y, h);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = frame.pixel(x0, y0);
    let p10 = frame.pixel(x1, y0);
    let p01 = frame.pixel(x0, y1);
    let p11 = frame.pixel(x1, y1);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bot = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        out[c] = (top * (1.0 - fy) + bot * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}

fn clamp_range(v: f32, (lo, hi): (f32, f32)) -> f32 {
    if v.is_finite() { v.clamp(lo, hi) } else { lo }
}
