use stylewave::distort::{max_frame_radius, CounterPolicy, DistortionConfig, WaveField};
use stylewave::frame::ImageBuffer;

fn gradient(w: usize, h: usize) -> ImageBuffer {
    let mut img = ImageBuffer::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let i = (y * w + x) * 4;
            img.data[i] = (x * 255 / w.max(1)) as u8;
            img.data[i + 1] = (y * 255 / h.max(1)) as u8;
            img.data[i + 2] = ((x + y) % 256) as u8;
        }
    }
    img
}

fn enabled(speed: f32, width: f32) -> DistortionConfig {
    DistortionConfig {
        enabled: true,
        amplitude: 20.0,
        speed,
        width,
    }
}

#[test]
fn disabled_pass_is_pixel_identical() {
    let frame = gradient(64, 48);
    let mut field = WaveField::default();
    let on = enabled(8.0, 30.0);
    assert!(field.trigger(&on));

    let off = DistortionConfig { enabled: false, ..on };
    assert_eq!(field.apply(&frame, &off), frame);
}

#[test]
fn pass_without_waves_is_pixel_identical() {
    let frame = gradient(64, 48);
    let mut field = WaveField::default();
    assert_eq!(field.apply(&frame, &enabled(8.0, 30.0)), frame);
}

#[test]
fn trigger_is_ignored_while_disabled() {
    let mut field = WaveField::default();
    assert!(!field.trigger(&DistortionConfig::default()));
    assert_eq!(field.active_waves(), 0);
}

#[test]
fn active_wave_displaces_pixels() {
    let frame = gradient(96, 64);
    let cfg = enabled(6.0, 12.0);
    let mut field = WaveField::default();
    field.trigger(&cfg);
    for _ in 0..4 {
        field.apply(&frame, &cfg);
    }
    let out = field.apply(&frame, &cfg);
    assert_eq!((out.width, out.height), (96, 64));
    assert_ne!(out, frame);
}

/// Red channel equals x, so a sampled red value is the source column.
fn column_ramp(w: usize, h: usize) -> ImageBuffer {
    let mut img = ImageBuffer::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let i = (y * w + x) * 4;
            img.data[i] = x as u8;
            img.data[i + 1] = y as u8;
        }
    }
    img
}

/// Run `passes - 1` warm-up applies, then return the last output.
fn after_passes(field: &mut WaveField, frame: &ImageBuffer, cfg: &DistortionConfig, passes: usize) -> ImageBuffer {
    for _ in 1..passes {
        field.apply(frame, cfg);
    }
    field.apply(frame, cfg)
}

fn ring_config(amplitude: f32, speed: f32) -> DistortionConfig {
    DistortionConfig {
        enabled: true,
        amplitude,
        speed,
        width: 10.0,
    }
}

#[test]
fn ring_samples_outward_from_center() {
    // 200x100 centre is (100, 50); the fourth pass has ring radius 30.
    let frame = column_ramp(200, 100);
    let cfg = ring_config(10.0, 10.0);
    let mut field = WaveField::default();
    field.trigger(&cfg);
    let out = after_passes(&mut field, &frame, &cfg, 4);

    assert_eq!(out.pixel(130, 50)[0], 140);
    assert_eq!(out.pixel(70, 50)[0], 60);
    // Far from the ring nothing moves.
    assert_eq!(out.pixel(10, 50), frame.pixel(10, 50));
}

#[test]
fn coincident_waves_add_their_displacement() {
    let frame = column_ramp(200, 100);
    let cfg = ring_config(10.0, 10.0);
    let mut field = WaveField::default();
    field.trigger(&cfg);
    field.trigger(&cfg);
    let out = after_passes(&mut field, &frame, &cfg, 4);

    assert_eq!(out.pixel(130, 50)[0], 150);
    assert_eq!(out.pixel(70, 50)[0], 50);
}

#[test]
fn samples_past_the_edge_are_reflected() {
    // Twelfth pass at speed 9: radius 99 lands on x=199; 199 + 50 mirrors to 149.
    let frame = column_ramp(200, 100);
    let cfg = ring_config(50.0, 9.0);
    let mut field = WaveField::default();
    field.trigger(&cfg);
    let out = after_passes(&mut field, &frame, &cfg, 12);

    assert_eq!(out.pixel(199, 50)[0], 149);
}

#[test]
fn max_radius_is_center_to_corner() {
    assert!((max_frame_radius(640, 480) - 400.0).abs() < 1e-4);
}

#[test]
fn wave_expires_exactly_when_radius_passes_limit() {
    // 640x480: limit = 400 + 30 = 430; speed 5 puts radius 435 at age 87.
    let frame = ImageBuffer::new(640, 480);
    let on = enabled(5.0, 30.0);
    let off = DistortionConfig { enabled: false, ..on };
    let mut field = WaveField::new(CounterPolicy::Always);
    field.trigger(&on);

    for _ in 0..87 {
        field.apply(&frame, &off);
    }
    assert_eq!(field.frame_counter(), 87);
    assert_eq!(field.active_waves(), 1, "radius 430 is still inside the limit");

    field.apply(&frame, &off);
    assert_eq!(field.active_waves(), 0);
}

#[test]
fn two_staggered_waves_expire_in_birth_order() {
    let frame = ImageBuffer::new(640, 480);
    let on = enabled(5.0, 30.0);
    let off = DistortionConfig { enabled: false, ..on };
    let mut field = WaveField::default();

    field.trigger(&on);
    for _ in 0..10 {
        field.apply(&frame, &off);
    }
    field.trigger(&on);
    assert_eq!(field.waves()[1].birth_frame, 10);

    for _ in 10..40 {
        field.apply(&frame, &off);
    }
    // First wave at radius 200, well inside.
    assert_eq!(field.active_waves(), 2);

    let mut first_gone = None;
    let mut second_gone = None;
    while field.frame_counter() < 120 {
        let counter = field.frame_counter();
        field.apply(&frame, &off);
        match field.active_waves() {
            1 if first_gone.is_none() => first_gone = Some(counter),
            0 if second_gone.is_none() => second_gone = Some(counter),
            _ => {}
        }
    }
    assert_eq!(first_gone, Some(87));
    assert_eq!(second_gone, Some(97));
}

#[test]
fn while_active_policy_freezes_counter_on_identity_passes() {
    let frame = ImageBuffer::new(32, 32);
    let cfg = enabled(4.0, 10.0);

    let mut always = WaveField::new(CounterPolicy::Always);
    let mut active = WaveField::new(CounterPolicy::WhileActive);
    for _ in 0..5 {
        always.apply(&frame, &cfg);
        active.apply(&frame, &cfg);
    }
    assert_eq!(always.frame_counter(), 5);
    assert_eq!(active.frame_counter(), 0);

    active.trigger(&cfg);
    active.apply(&frame, &cfg);
    assert_eq!(active.frame_counter(), 1);
}

#[test]
fn config_adjustments_stay_in_range() {
    let mut cfg = DistortionConfig::default();
    for _ in 0..20 {
        cfg.adjust_amplitude(5.0);
        cfg.adjust_speed(-1.0);
        cfg.adjust_width(50.0);
    }
    assert_eq!(cfg.amplitude, 50.0);
    assert_eq!(cfg.speed, 1.0);
    assert_eq!(cfg.width, 200.0);

    let wild = DistortionConfig {
        enabled: true,
        amplitude: 1.0,
        speed: f32::NAN,
        width: 1e9,
    }
    .clamped();
    assert_eq!((wild.amplitude, wild.speed, wild.width), (5.0, 1.0, 200.0));
}
