use std::time::Duration;
use stylewave::frame::ImageBuffer;
use stylewave::playback::{compute_frame_skip, HoldSchedule, PlaybackState};

#[test]
fn thirty_to_ten_skips_three() {
    let p = PlaybackState::new(30.0, 10.0);
    assert_eq!(p.frame_skip(), 3);
    assert_eq!(compute_frame_skip(30.0, 10.0), 3);
}

#[test]
fn target_above_source_is_clamped() {
    let p = PlaybackState::new(30.0, 120.0);
    assert_eq!(p.target_fps(), 30.0);
    assert_eq!(p.frame_skip(), 1);
}

#[test]
fn target_below_one_is_clamped() {
    let mut p = PlaybackState::new(24.0, 24.0);
    p.set_target_fps(0.2);
    assert_eq!(p.target_fps(), 1.0);
    assert_eq!(p.frame_skip(), 24);
}

#[test]
fn skip_rounds_to_nearest() {
    assert_eq!(compute_frame_skip(30.0, 12.0), 3);
    assert_eq!(compute_frame_skip(30.0, 13.0), 2);
    assert_eq!(compute_frame_skip(30.0, 20.0), 2);
    assert_eq!(compute_frame_skip(29.97, 29.97), 1);
    assert_eq!(compute_frame_skip(30.0, 0.0), 1);
}

#[test]
fn fps_keys_step_and_recompute() {
    let mut p = PlaybackState::new(30.0, 15.0);
    assert_eq!(p.frame_skip(), 2);
    for _ in 0..5 {
        p.adjust_target_fps(-1.0);
    }
    assert_eq!(p.target_fps(), 10.0);
    assert_eq!(p.frame_skip(), 3);
}

#[test]
fn advance_moves_by_skip_and_loop_resets() {
    let mut p = PlaybackState::new(30.0, 10.0);
    p.advance();
    p.advance();
    assert_eq!(p.current_frame_index(), 6);

    p.set_last_processed(ImageBuffer::new(2, 2));
    assert!(p.last_processed().is_some());

    p.loop_reset();
    assert_eq!(p.current_frame_index(), 0);
    assert!(p.last_processed().is_none());
}

#[test]
fn invalid_source_rate_falls_back() {
    let p = PlaybackState::new(f32::NAN, 10.0);
    assert_eq!(p.source_fps(), 30.0);
    assert_eq!(p.frame_skip(), 3);
}

#[test]
fn live_playback_never_skips() {
    let p = PlaybackState::live(30.0);
    assert_eq!(p.frame_skip(), 1);
    assert_eq!(p.frame_interval(), Duration::from_secs_f32(1.0 / 30.0));
}

#[test]
fn hold_schedule_processes_every_nth() {
    let s = HoldSchedule::new(10);
    let picked = (0..100).filter(|i| s.should_process(*i)).collect::<Vec<_>>();
    assert_eq!(picked, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
    assert_eq!(s.processed_count(100), 10);
    assert_eq!(s.processed_count(101), 11);
}

#[test]
fn hold_schedule_zero_means_every_frame() {
    let s = HoldSchedule::new(0);
    assert_eq!(s.every_n(), 1);
    assert!((0..5).all(|i| s.should_process(i)));
}
