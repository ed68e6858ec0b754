use std::path::PathBuf;

use stylewave::distort::CounterPolicy;
use stylewave::error::PipelineError;
use stylewave::frame::ImageBuffer;
use stylewave::keymap::Action;
use stylewave::model::net::random_parameters;
use stylewave::model::{ModelBank, ModelCatalog, ModelSlot, PointwiseNet};
use stylewave::playback::PlaybackState;
use stylewave::session::{BlendState, Channel, Session, SessionState};
use stylewave::video::{FrameSource, SourceInfo, SourceKind};

/// In-memory source; `None` entries read as failures.
struct ScriptedSource {
    frames: Vec<Option<ImageBuffer>>,
    pos: usize,
    kind: SourceKind,
    seeks: Vec<u64>,
}

impl ScriptedSource {
    fn file(n: usize) -> Self {
        Self {
            frames: (0..n).map(|i| Some(solid(i as u8 * 20))).collect(),
            pos: 0,
            kind: SourceKind::File,
            seeks: Vec::new(),
        }
    }

    fn camera(frames: Vec<Option<ImageBuffer>>) -> Self {
        Self {
            frames,
            pos: 0,
            kind: SourceKind::Camera,
            seeks: Vec::new(),
        }
    }
}

impl FrameSource for ScriptedSource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            width: 8,
            height: 6,
            fps: 30.0,
            frame_count: Some(self.frames.len() as u64),
        }
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn read_frame(&mut self) -> Result<Option<ImageBuffer>, PipelineError> {
        let Some(entry) = self.frames.get(self.pos) else {
            return Ok(None);
        };
        self.pos += 1;
        match entry {
            Some(frame) => Ok(Some(frame.clone())),
            None => Err(PipelineError::ReadFailure("scripted".to_string())),
        }
    }

    fn seek(&mut self, index: u64) -> Result<(), PipelineError> {
        self.seeks.push(index);
        self.pos = index as usize;
        Ok(())
    }
}

fn solid(v: u8) -> ImageBuffer {
    ImageBuffer::filled(8, 6, [v, 255 - v, v / 2])
}

fn catalog(n: usize) -> ModelCatalog {
    let slots = (0..n)
        .map(|i| ModelSlot {
            key: char::from(b'1' + i as u8),
            path: PathBuf::from(format!("m{i}.json")),
            name: format!("Model {i}"),
        })
        .collect();
    ModelCatalog::new(slots).expect("valid catalog")
}

fn session(n: usize, kind: SourceKind, playback: PlaybackState) -> Session {
    let mut rng = fastrand::Rng::with_seed(3);
    let sets = (0..n).map(|_| random_parameters(4, &mut rng)).collect();
    Session::new(
        catalog(n),
        ModelBank::from_sets(sets),
        Box::new(PointwiseNet::new()),
        SessionState::new(0, n),
        playback,
        kind,
        CounterPolicy::Always,
    )
    .expect("session builds")
}

#[test]
fn mode_cycles_single_dual_triple() {
    let s0 = SessionState::new(0, 3);
    let (s1, fx1) = s0.apply(Action::CycleMode, 3);
    assert!(fx1.rebuild);
    assert_eq!(s1.blend, BlendState::Dual { a: 0, b: 1, alpha: 0.5 });

    let (s2, _) = s1.apply(Action::CycleMode, 3);
    assert!(matches!(s2.blend, BlendState::Triple { a: 0, b: 1, c: 2, .. }));

    let (s3, _) = s2.apply(Action::CycleMode, 3);
    assert_eq!(s3.blend, BlendState::Single(0));
}

#[test]
fn channel_cycles_within_mode() {
    let s = SessionState::new(0, 3);
    let (s, _) = s.apply(Action::NextChannel, 3);
    assert_eq!(s.channel, Channel::A, "single mode has one channel");

    let (s, _) = s.apply(Action::CycleMode, 3);
    let (s, _) = s.apply(Action::NextChannel, 3);
    assert_eq!(s.channel, Channel::B);
    let (s, _) = s.apply(Action::NextChannel, 3);
    assert_eq!(s.channel, Channel::A);
}

#[test]
fn selecting_missing_slot_changes_nothing() {
    let s = SessionState::new(0, 2);
    let (next, fx) = s.apply(Action::SelectModel(7), 2);
    assert_eq!(next, s);
    assert!(!fx.rebuild && !fx.quit);
}

#[test]
fn selecting_a_model_assigns_active_channel() {
    let s = SessionState::new(0, 4);
    let (s, _) = s.apply(Action::CycleMode, 4);
    let (s, _) = s.apply(Action::NextChannel, 4);
    let (s, fx) = s.apply(Action::SelectModel(3), 4);
    assert!(fx.rebuild);
    assert_eq!(s.blend, BlendState::Dual { a: 0, b: 3, alpha: 0.5 });

    let (_, fx) = s.apply(Action::SelectModel(3), 4);
    assert!(!fx.rebuild, "same model again is a no-op");
}

#[test]
fn dual_blend_moves_toward_active_channel() {
    let s = SessionState::new(0, 2);
    let (s, _) = s.apply(Action::CycleMode, 2);

    let (a, _) = s.apply(Action::BlendUpSmall, 2);
    let BlendState::Dual { alpha, .. } = a.blend else {
        panic!("expected dual");
    };
    assert!((alpha - 0.45).abs() < 1e-6);

    let (b, _) = s.apply(Action::NextChannel, 2);
    let (b, fx) = b.apply(Action::BlendUpLarge, 2);
    let BlendState::Dual { alpha, .. } = b.blend else {
        panic!("expected dual");
    };
    assert!((alpha - 0.6).abs() < 1e-6);
    assert!(fx.rebuild);
}

#[test]
fn dual_alpha_saturates() {
    let s = SessionState::new(0, 2);
    let (mut s, _) = s.apply(Action::CycleMode, 2);
    for _ in 0..20 {
        s = s.apply(Action::BlendDownLarge, 2).0;
    }
    assert_eq!(s.blend, BlendState::Dual { a: 0, b: 1, alpha: 1.0 });
    let (_, fx) = s.apply(Action::BlendDownLarge, 2);
    assert!(!fx.rebuild);
}

#[test]
fn triple_weights_renormalize_after_adjust() {
    let s = SessionState::new(0, 3);
    let (s, _) = s.apply(Action::CycleMode, 3);
    let (s, _) = s.apply(Action::CycleMode, 3);
    let (s, _) = s.apply(Action::BlendUpLarge, 3);
    let BlendState::Triple { weights, .. } = s.blend else {
        panic!("expected triple");
    };
    let sum: f32 = weights.iter().sum();
    assert!((sum - 1.0).abs() < 1e-5);
    assert!(weights[0] > weights[1]);
    assert!((weights[1] - weights[2]).abs() < 1e-6);

    let (reset, fx) = s.apply(Action::ResetBlend, 3);
    assert!(fx.rebuild);
    let BlendState::Triple { weights, .. } = reset.blend else {
        panic!("expected triple");
    };
    assert!(weights.iter().all(|w| (w - 1.0 / 3.0).abs() < 1e-6));
}

#[test]
fn pulse_controls() {
    let s = SessionState::new(0, 1);
    let (_, fx) = s.apply(Action::TriggerWave, 1);
    assert!(!fx.spawn_wave, "no waves while pulse is off");

    let (on, _) = s.apply(Action::TogglePulse, 1);
    assert!(on.distortion.enabled);
    let (_, fx) = on.apply(Action::TriggerWave, 1);
    assert!(fx.spawn_wave);

    let (off, fx) = on.apply(Action::TogglePulse, 1);
    assert!(!off.distortion.enabled);
    assert!(fx.clear_waves);

    let (louder, _) = on.apply(Action::AmplitudeUp, 1);
    assert_eq!(louder.distortion.amplitude, on.distortion.amplitude + 5.0);
}

#[test]
fn overlay_toggles_and_quit() {
    let s = SessionState::new(0, 1);
    let (s, _) = s.apply(Action::ToggleHelp, 1);
    assert!(s.show_help);
    let (s, _) = s.apply(Action::ToggleInset, 1);
    assert!(s.show_inset);
    let (_, fx) = s.apply(Action::Quit, 1);
    assert!(fx.quit);
    let (_, fx) = s.apply(Action::FpsDown, 1);
    assert_eq!(fx.fps_delta, Some(-1.0));
}

#[test]
fn file_step_seeks_by_skip_and_loops() {
    let mut src = ScriptedSource::file(5);
    let mut sess = session(1, SourceKind::File, PlaybackState::new(30.0, 10.0));

    sess.step(&mut src).expect("frame 0").expect("shown");
    assert_eq!(sess.last_raw(), Some(&solid(0)));
    sess.step(&mut src).expect("frame 3").expect("shown");
    assert_eq!(sess.last_raw(), Some(&solid(60)));

    // Index 6 is past the end: loop back to the first frame.
    sess.step(&mut src).expect("looped").expect("shown");
    assert_eq!(sess.last_raw(), Some(&solid(0)));
    assert_eq!(src.seeks, vec![0, 3, 6, 0]);
    assert_eq!(sess.playback().current_frame_index(), 3);
}

#[test]
fn file_read_failure_is_end_of_stream() {
    let mut src = ScriptedSource::file(3);
    src.frames[1] = None;
    let mut sess = session(1, SourceKind::File, PlaybackState::new(30.0, 30.0));

    sess.step(&mut src).expect("frame 0");
    sess.step(&mut src).expect("failure loops");
    assert_eq!(sess.last_raw(), Some(&solid(0)));
}

#[test]
fn empty_file_is_unrecoverable() {
    let mut src = ScriptedSource::file(0);
    let mut sess = session(1, SourceKind::File, PlaybackState::new(30.0, 30.0));
    assert!(sess.step(&mut src).is_err());
}

#[test]
fn camera_hiccup_holds_last_frame() {
    let mut src = ScriptedSource::camera(vec![None, Some(solid(40)), None, Some(solid(80))]);
    let mut sess = session(1, SourceKind::Camera, PlaybackState::live(30.0));

    assert_eq!(sess.step(&mut src).expect("no frame yet"), None);
    let first = sess.step(&mut src).expect("frame").expect("shown");
    let held = sess.step(&mut src).expect("held").expect("shown");
    assert_eq!(first, held);
    let next = sess.step(&mut src).expect("frame").expect("shown");
    assert_ne!(first, next);
    assert!(src.seeks.is_empty());
}

#[test]
fn blend_actions_rebuild_the_network() {
    let mut sess = session(2, SourceKind::Camera, PlaybackState::live(30.0));
    let before = sess.rebuilds();
    assert!(!sess.handle(Action::CycleMode));
    assert!(!sess.handle(Action::BlendUpSmall));
    assert_eq!(sess.rebuilds(), before + 2);

    assert!(!sess.handle(Action::SelectModel(9)));
    assert_eq!(sess.rebuilds(), before + 2);
    assert!(sess.handle(Action::Quit));
}

#[test]
fn fps_keys_only_affect_file_playback() {
    let mut file = session(1, SourceKind::File, PlaybackState::new(30.0, 30.0));
    file.handle(Action::FpsDown);
    assert_eq!(file.playback().target_fps(), 29.0);

    let mut cam = session(1, SourceKind::Camera, PlaybackState::live(30.0));
    cam.handle(Action::FpsDown);
    assert_eq!(cam.playback().target_fps(), 30.0);
}

#[test]
fn triggered_wave_reaches_the_field() {
    let mut sess = session(1, SourceKind::Camera, PlaybackState::live(30.0));
    sess.handle(Action::TriggerWave);
    assert_eq!(sess.waves().active_waves(), 0);
    sess.handle(Action::TogglePulse);
    sess.handle(Action::TriggerWave);
    assert_eq!(sess.waves().active_waves(), 1);
    sess.handle(Action::TogglePulse);
    assert_eq!(sess.waves().active_waves(), 0);
}
