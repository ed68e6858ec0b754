use std::time::{Duration, Instant};

use stylewave::video::RestartGate;

#[test]
fn restart_gate_rate_limits() {
    let mut gate = RestartGate::new(Duration::from_millis(500));
    let t0 = Instant::now();
    assert!(gate.ready(t0));
    assert!(!gate.ready(t0 + Duration::from_millis(100)));
    assert!(!gate.ready(t0 + Duration::from_millis(499)));
    assert!(gate.ready(t0 + Duration::from_millis(500)));
    assert!(!gate.ready(t0 + Duration::from_millis(600)));
}

#[test]
fn zero_interval_gate_always_opens() {
    let mut gate = RestartGate::new(Duration::ZERO);
    let t0 = Instant::now();
    assert!(gate.ready(t0));
    assert!(gate.ready(t0));
}

/// A stand-in decoder: a shell script that writes exactly one 4x4 RGBA frame
/// of `A` bytes and exits, whatever arguments it is given.
#[cfg(any(target_os = "linux", target_os = "macos"))]
mod camera_decoder {
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::time::Duration;

    use stylewave::frame::ImageBuffer;
    use stylewave::video::{FfmpegSource, FrameSource, SourceKind};

    fn one_frame_decoder(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("stylewave-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create scratch dir");
        let script = dir.join("decoder.sh");
        std::fs::write(&script, "#!/bin/sh\nhead -c 64 /dev/zero | tr '\\000' 'A'\n")
            .expect("write decoder script");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("make script executable");
        script
    }

    fn open(script: &PathBuf, restart: Duration) -> FfmpegSource {
        // Freshly written executables can briefly report "text file busy".
        let mut last_err = None;
        for _ in 0..20 {
            match FfmpegSource::open_camera_with(script, 0, 4, 4, 30, restart) {
                Ok(source) => return source,
                Err(err) => last_err = Some(err),
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        panic!("decoder never started: {last_err:?}");
    }

    fn frame_a() -> ImageBuffer {
        ImageBuffer::from_rgba(4, 4, vec![b'A'; 64]).expect("4x4 rgba")
    }

    #[test]
    fn camera_recovers_after_decoder_exits() {
        let script = one_frame_decoder("cam-restart");
        let mut cam = open(&script, Duration::ZERO);
        assert_eq!(cam.kind(), SourceKind::Camera);

        assert_eq!(cam.read_frame().expect("first frame"), Some(frame_a()));
        // The decoder has exited: this read misses and restarts it.
        assert_eq!(cam.read_frame().expect("end of stream"), None);
        assert_eq!(cam.restarts(), 1);
        assert_eq!(cam.read_frame().expect("restarted"), Some(frame_a()));

        let _ = std::fs::remove_dir_all(script.parent().expect("scratch dir"));
    }

    #[test]
    fn camera_restarts_are_rate_limited() {
        let script = one_frame_decoder("cam-limit");
        let mut cam = open(&script, Duration::from_secs(3600));

        assert!(cam.read_frame().expect("first frame").is_some());
        assert_eq!(cam.read_frame().expect("end of stream"), None);
        assert_eq!(cam.restarts(), 1);
        assert!(cam.read_frame().expect("restarted").is_some());

        // Second failure falls inside the interval: no new decoder.
        assert_eq!(cam.read_frame().expect("end of stream"), None);
        assert_eq!(cam.read_frame().expect("still down"), None);
        assert_eq!(cam.restarts(), 1);

        let _ = std::fs::remove_dir_all(script.parent().expect("scratch dir"));
    }
}
