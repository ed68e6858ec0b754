use stylewave::frame::ImageBuffer;
use stylewave::render::{
    draw_overlay_popup, letterbox, write_hud_line, HalfBlockRenderer, KittyRenderer, Presentation,
    Renderer,
};

/// Gradient across x so neighbouring cells differ.
fn gradient(w: usize, h: usize) -> ImageBuffer {
    let mut img = ImageBuffer::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let i = (y * w + x) * 4;
            let t = (x * 255 / w.max(1)) as u8;
            img.data[i] = t;
            img.data[i + 1] = 128;
            img.data[i + 2] = 255 - t;
        }
    }
    img
}

fn presentation<'a>(
    cols: u16,
    visual_rows: u16,
    image: &'a ImageBuffer,
    overlay: Option<&'a str>,
    sync: bool,
) -> Presentation<'a> {
    Presentation {
        term_cols: cols,
        term_rows: visual_rows + 1,
        visual_rows,
        image,
        hud: "dual [Mosaic 50% / Candy 50%] ch A | pulse off",
        hud_rows: 1,
        overlay,
        sync_updates: sync,
    }
}

fn render_to_string(r: &mut dyn Renderer, p: &Presentation<'_>) -> String {
    let mut buf = Vec::new();
    r.present(p, &mut buf).expect("render should succeed");
    String::from_utf8_lossy(&buf).into_owned()
}

#[test]
fn halfblock_wants_two_pixels_per_row() {
    assert_eq!(HalfBlockRenderer::new().pixel_size(80, 20), Some((80, 40)));
    assert_eq!(KittyRenderer::new().pixel_size(80, 20), None);
}

#[test]
fn halfblock_paints_every_cell() {
    let img = gradient(20, 10);
    let p = presentation(20, 5, &img, None, false);
    let out = render_to_string(&mut HalfBlockRenderer::new(), &p);
    assert_eq!(out.matches('\u{2580}').count(), 100);
    assert!(out.contains("dual [Mosaic 50% / C"));
    assert!(!out.contains("pulse off"), "HUD is clipped to the terminal width");
    assert!(!out.contains("\x1b[?2026h"));
}

#[test]
fn halfblock_wraps_in_sync_updates() {
    let img = gradient(8, 4);
    let p = presentation(8, 2, &img, None, true);
    let out = render_to_string(&mut HalfBlockRenderer::new(), &p);
    assert!(out.starts_with("\x1b[?2026h"));
    assert!(out.ends_with("\x1b[?2026l"));
}

#[test]
fn halfblock_skips_mismatched_image() {
    let img = gradient(7, 4);
    let p = presentation(8, 2, &img, None, false);
    assert!(render_to_string(&mut HalfBlockRenderer::new(), &p).is_empty());
}

#[test]
fn halfblock_draws_help_overlay() {
    let img = gradient(40, 24);
    let p = presentation(40, 12, &img, Some("stylewave hotkeys\nq  quit"), false);
    let out = render_to_string(&mut HalfBlockRenderer::new(), &p);
    assert!(out.contains("stylewave hotkeys"));
    assert!(out.contains("q  quit"));
}

#[test]
fn kitty_overlay_hides_image() {
    let img = gradient(16, 16);
    let p = presentation(40, 12, &img, Some("stylewave hotkeys"), false);
    let out = render_to_string(&mut KittyRenderer::new(), &p);
    assert!(out.contains("\x1b_Ga=d,d=I,i=1\x1b\\"));
    assert!(out.contains("stylewave hotkeys"));
}

#[test]
fn letterbox_centers_and_pads() {
    let img = ImageBuffer::filled(4, 2, [200, 10, 10]);
    let out = letterbox(&img, 4, 4);
    assert_eq!((out.width, out.height), (4, 4));
    assert_eq!(out.pixel(0, 0), [0, 0, 0, 255]);
    assert_eq!(out.pixel(0, 1), [200, 10, 10, 255]);
    assert_eq!(out.pixel(3, 2), [200, 10, 10, 255]);
    assert_eq!(out.pixel(3, 3), [0, 0, 0, 255]);
}

#[test]
fn hud_line_is_clipped_by_characters() {
    let mut buf = Vec::new();
    write_hud_line(&mut buf, 3, 5, Some("ünïcödé text")).expect("write");
    let out = String::from_utf8(buf).expect("utf8");
    assert!(out.starts_with("\x1b[3;1H"));
    assert!(out.contains("ünïcö"));
    assert!(!out.contains("ünïcöd"));
}

#[test]
fn popup_ignores_tiny_terminals() {
    let mut buf = Vec::new();
    draw_overlay_popup(&mut buf, 6, 3, "help").expect("draw");
    assert!(buf.is_empty());
}

#[test]
fn inset_lands_in_bottom_right() {
    let mut frame = ImageBuffer::filled(40, 30, [0, 0, 200]);
    let raw = ImageBuffer::filled(8, 6, [250, 0, 0]);
    frame.composite_inset(&raw, 0.25);
    assert_eq!(frame.pixel(0, 0), [0, 0, 200, 255]);
    assert_eq!(frame.pixel(36, 26), [250, 0, 0, 255]);
}
