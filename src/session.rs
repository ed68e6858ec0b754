//! Interactive session: control state, pure transitions and the per-frame step.

use crate::distort::{CounterPolicy, DistortionConfig, WaveField};
use crate::error::PipelineError;
use crate::frame::ImageBuffer;
use crate::keymap::Action;
use crate::model::{normalize_weights, ModelBank, ModelCatalog, StyleNetwork};
use crate::playback::PlaybackState;
use crate::video::{FrameSource, SourceKind};

pub const SMALL_STEP: f32 = 0.05;
pub const LARGE_STEP: f32 = 0.10;
pub const AMPLITUDE_STEP: f32 = 5.0;
pub const SPEED_STEP: f32 = 1.0;
pub const WIDTH_STEP: f32 = 5.0;
pub const FPS_STEP: f32 = 1.0;

const THIRDS: [f32; 3] = [1.0 / 3.0; 3];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlendState {
    Single(usize),
    Dual { a: usize, b: usize, alpha: f32 },
    Triple { a: usize, b: usize, c: usize, weights: [f32; 3] },
}

impl BlendState {
    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::Single(_) => "single",
            Self::Dual { .. } => "dual",
            Self::Triple { .. } => "triple",
        }
    }

    /// Channels that are live in this mode.
    pub fn channel_count(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Dual { .. } => 2,
            Self::Triple { .. } => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    A,
    B,
    C,
}

impl Channel {
    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
        }
    }

    pub fn label(self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
        }
    }

    fn from_index(i: usize) -> Self {
        match i {
            1 => Self::B,
            2 => Self::C,
            _ => Self::A,
        }
    }
}

/// What the caller has to do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Effects {
    pub rebuild: bool,
    pub spawn_wave: bool,
    pub clear_waves: bool,
    pub quit: bool,
    pub fps_delta: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub blend: BlendState,
    pub channel: Channel,
    /// Model slot per channel; survives mode changes.
    pub assigned: [usize; 3],
    pub distortion: DistortionConfig,
    pub show_hud: bool,
    pub show_help: bool,
    pub show_inset: bool,
}

impl SessionState {
    pub fn new(initial_slot: usize, model_count: usize) -> Self {
        let n = model_count.max(1);
        let first = initial_slot.min(n - 1);
        Self {
            blend: BlendState::Single(first),
            channel: Channel::A,
            assigned: [first, (first + 1) % n, (first + 2) % n],
            distortion: DistortionConfig::default(),
            show_hud: true,
            show_help: false,
            show_inset: false,
        }
    }

    /// Pure transition. Out-of-range model slots are rejected without
    /// touching the state.
    pub fn apply(&self, action: Action, model_count: usize) -> (SessionState, Effects) {
        let mut next = self.clone();
        let mut fx = Effects::default();

        match action {
            Action::Quit => fx.quit = true,
            Action::CycleMode => {
                let [a, b, c] = next.assigned;
                next.blend = match next.blend {
                    BlendState::Single(_) => BlendState::Dual { a, b, alpha: 0.5 },
                    BlendState::Dual { .. } => BlendState::Triple {
                        a,
                        b,
                        c,
                        weights: THIRDS,
                    },
                    BlendState::Triple { .. } => BlendState::Single(a),
                };
                if next.channel.index() >= next.blend.channel_count() {
                    next.channel = Channel::A;
                }
                fx.rebuild = true;
            }
            Action::NextChannel => {
                let count = next.blend.channel_count();
                next.channel = Channel::from_index((next.channel.index() + 1) % count);
            }
            Action::SelectModel(slot) => match next.select_model(slot, model_count) {
                Ok(changed) => fx.rebuild = changed,
                Err(err) => {
                    log::debug!("{err}");
                    return (self.clone(), Effects::default());
                }
            },
            Action::BlendUpSmall => fx.rebuild = next.adjust_blend(SMALL_STEP),
            Action::BlendDownSmall => fx.rebuild = next.adjust_blend(-SMALL_STEP),
            Action::BlendUpLarge => fx.rebuild = next.adjust_blend(LARGE_STEP),
            Action::BlendDownLarge => fx.rebuild = next.adjust_blend(-LARGE_STEP),
            Action::ResetBlend => {
                next.blend = match next.blend {
                    BlendState::Dual { a, b, .. } => BlendState::Dual { a, b, alpha: 0.5 },
                    BlendState::Triple { a, b, c, .. } => BlendState::Triple {
                        a,
                        b,
                        c,
                        weights: THIRDS,
                    },
                    single => single,
                };
                fx.rebuild = next.blend != self.blend;
            }
            Action::TogglePulse => {
                next.distortion.enabled = !next.distortion.enabled;
                fx.clear_waves = !next.distortion.enabled;
            }
            Action::TriggerWave => fx.spawn_wave = next.distortion.enabled,
            Action::AmplitudeUp => next.distortion.adjust_amplitude(AMPLITUDE_STEP),
            Action::AmplitudeDown => next.distortion.adjust_amplitude(-AMPLITUDE_STEP),
            Action::SpeedUp => next.distortion.adjust_speed(SPEED_STEP),
            Action::SpeedDown => next.distortion.adjust_speed(-SPEED_STEP),
            Action::WidthUp => next.distortion.adjust_width(WIDTH_STEP),
            Action::WidthDown => next.distortion.adjust_width(-WIDTH_STEP),
            Action::FpsUp => fx.fps_delta = Some(FPS_STEP),
            Action::FpsDown => fx.fps_delta = Some(-FPS_STEP),
            Action::ToggleHud => next.show_hud = !next.show_hud,
            Action::ToggleHelp => next.show_help = !next.show_help,
            Action::ToggleInset => next.show_inset = !next.show_inset,
        }

        (next, fx)
    }

    fn select_model(&mut self, slot: usize, model_count: usize) -> Result<bool, PipelineError> {
        if slot >= model_count {
            return Err(PipelineError::InvalidControlState(format!(
                "model slot {slot} does not exist ({model_count} loaded)"
            )));
        }
        let ch = self.channel.index();
        if self.assigned[ch] == slot {
            return Ok(false);
        }
        self.assigned[ch] = slot;
        self.blend = match self.blend {
            BlendState::Single(_) => BlendState::Single(self.assigned[0]),
            BlendState::Dual { alpha, .. } => BlendState::Dual {
                a: self.assigned[0],
                b: self.assigned[1],
                alpha,
            },
            BlendState::Triple { weights, .. } => BlendState::Triple {
                a: self.assigned[0],
                b: self.assigned[1],
                c: self.assigned[2],
                weights,
            },
        };
        Ok(true)
    }

    /// Move the blend toward (positive delta) or away from the active
    /// channel. Returns whether anything changed.
    fn adjust_blend(&mut self, delta: f32) -> bool {
        let before = self.blend;
        self.blend = match self.blend {
            BlendState::Single(a) => BlendState::Single(a),
            BlendState::Dual { a, b, alpha } => {
                let signed = if self.channel == Channel::A { -delta } else { delta };
                BlendState::Dual {
                    a,
                    b,
                    alpha: (alpha + signed).clamp(0.0, 1.0),
                }
            }
            BlendState::Triple { a, b, c, weights } => {
                let mut w = weights;
                let ch = self.channel.index();
                w[ch] = (w[ch] + delta).clamp(0.0, 1.0);
                BlendState::Triple {
                    a,
                    b,
                    c,
                    weights: normalize_weights(w),
                }
            }
        };
        self.blend != before
    }
}

/// Owns everything one interactive run needs besides the terminal.
pub struct Session {
    state: SessionState,
    catalog: ModelCatalog,
    bank: ModelBank,
    net: Box<dyn StyleNetwork>,
    waves: WaveField,
    playback: PlaybackState,
    kind: SourceKind,
    last_raw: Option<ImageBuffer>,
    rebuilds: u64,
}

impl Session {
    pub fn new(
        catalog: ModelCatalog,
        bank: ModelBank,
        mut net: Box<dyn StyleNetwork>,
        state: SessionState,
        playback: PlaybackState,
        kind: SourceKind,
        policy: CounterPolicy,
    ) -> Result<Self, PipelineError> {
        net.load_parameters(bank.compose(&state.blend)?)?;
        Ok(Self {
            state,
            catalog,
            bank,
            net,
            waves: WaveField::new(policy),
            playback,
            kind,
            last_raw: None,
            rebuilds: 1,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn waves(&self) -> &WaveField {
        &self.waves
    }

    pub fn playback(&self) -> &PlaybackState {
        &self.playback
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn last_raw(&self) -> Option<&ImageBuffer> {
        self.last_raw.as_ref()
    }

    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    pub fn network_name(&self) -> &'static str {
        self.net.name()
    }

    /// Apply one action. Returns true when the session should end.
    pub fn handle(&mut self, action: Action) -> bool {
        let (next, fx) = self.state.apply(action, self.bank.len());

        if fx.rebuild {
            match self.rebuild(&next) {
                Ok(()) => self.state = next,
                Err(err) => {
                    log::warn!("model rebuild failed, keeping previous blend: {err}");
                    return false;
                }
            }
        } else {
            self.state = next;
        }

        if fx.clear_waves {
            self.waves.clear();
        }
        if fx.spawn_wave {
            self.waves.trigger(&self.state.distortion);
        }
        if let Some(delta) = fx.fps_delta {
            if self.kind == SourceKind::File {
                self.playback.adjust_target_fps(delta);
                log::info!(
                    "target fps {:.0}, frame skip {}",
                    self.playback.target_fps(),
                    self.playback.frame_skip()
                );
            }
        }
        fx.quit
    }

    fn rebuild(&mut self, next: &SessionState) -> Result<(), PipelineError> {
        let params = self.bank.compose(&next.blend)?;
        self.net.load_parameters(params)?;
        self.rebuilds += 1;
        log::debug!("rebuilt model: {}", self.describe_blend(&next.blend));
        Ok(())
    }

    /// Pull, stylize and distort one frame.
    ///
    /// `Ok(None)` means nothing can be shown yet (camera hiccup before the
    /// first frame). An error is an unrecoverable read failure.
    pub fn step(&mut self, source: &mut dyn FrameSource) -> Result<Option<ImageBuffer>, PipelineError> {
        let styled = match self.kind {
            SourceKind::File => {
                let raw = self.read_file_frame(source)?;
                let styled = self.net.stylize(&raw);
                self.playback.set_last_processed(styled.clone());
                self.playback.advance();
                self.last_raw = Some(raw);
                styled
            }
            SourceKind::Camera => match source.read_frame() {
                Ok(Some(raw)) => {
                    let styled = self.net.stylize(&raw);
                    self.playback.set_last_processed(styled.clone());
                    self.last_raw = Some(raw);
                    styled
                }
                Ok(None) | Err(_) => {
                    log::warn!("camera read failed, holding last frame");
                    match self.playback.last_processed() {
                        Some(held) => held.clone(),
                        None => return Ok(None),
                    }
                }
            },
        };

        Ok(Some(self.waves.apply(&styled, &self.state.distortion)))
    }

    fn read_file_frame(&mut self, source: &mut dyn FrameSource) -> Result<ImageBuffer, PipelineError> {
        let index = self.playback.current_frame_index();
        let first = source.seek(index).and_then(|()| source.read_frame());
        match first {
            Ok(Some(frame)) => return Ok(frame),
            Ok(None) => log::debug!("end of stream at frame {index}, looping"),
            Err(err) => log::debug!("read failed at frame {index} ({err}), looping"),
        }

        self.playback.loop_reset();
        source.seek(0)?;
        source
            .read_frame()?
            .ok_or_else(|| PipelineError::ReadFailure("source yielded no frames".to_string()))
    }

    pub fn describe_blend(&self, blend: &BlendState) -> String {
        let name = |i: usize| self.catalog.name(i).to_string();
        match *blend {
            BlendState::Single(a) => name(a),
            BlendState::Dual { a, b, alpha } => {
                format!("{} {:.0}% / {} {:.0}%", name(a), (1.0 - alpha) * 100.0, name(b), alpha * 100.0)
            }
            BlendState::Triple { a, b, c, weights } => format!(
                "{} {:.0}% / {} {:.0}% / {} {:.0}%",
                name(a),
                weights[0] * 100.0,
                name(b),
                weights[1] * 100.0,
                name(c),
                weights[2] * 100.0
            ),
        }
    }

    /// One-line status for the HUD.
    pub fn hud_line(&self, fps: f32) -> String {
        let s = &self.state;
        let d = &s.distortion;
        let mut line = format!(
            "{} [{}] ch {} | {}",
            s.blend.mode_name(),
            self.describe_blend(&s.blend),
            s.channel.label(),
            if d.enabled { "pulse on" } else { "pulse off" },
        );
        if d.enabled {
            line.push_str(&format!(
                " amp {:.0} spd {:.0} w {:.0} waves {}",
                d.amplitude,
                d.speed,
                d.width,
                self.waves.active_waves()
            ));
        }
        if self.kind == SourceKind::File {
            line.push_str(&format!(
                " | target {:.0}/{:.0} fps skip {}",
                self.playback.target_fps(),
                self.playback.source_fps(),
                self.playback.frame_skip()
            ));
        }
        line.push_str(&format!(" | {fps:.1} fps | h help"));
        line
    }
}
