use crate::render::{draw_overlay_popup, write_hud, Presentation, Renderer};
use std::io::Write;

const UPPER_HALF: char = '\u{2580}';

/// Two pixels per cell: foreground paints the top half, background the
/// bottom half.
#[derive(Default)]
pub struct HalfBlockRenderer {
    last_fg: Option<[u8; 3]>,
    last_bg: Option<[u8; 3]>,
}

impl HalfBlockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_colors(&mut self, out: &mut dyn Write, fg: [u8; 3], bg: [u8; 3]) -> std::io::Result<()> {
        if self.last_fg != Some(fg) {
            write!(out, "\x1b[38;2;{};{};{}m", fg[0], fg[1], fg[2])?;
            self.last_fg = Some(fg);
        }
        if self.last_bg != Some(bg) {
            write!(out, "\x1b[48;2;{};{};{}m", bg[0], bg[1], bg[2])?;
            self.last_bg = Some(bg);
        }
        Ok(())
    }
}

impl Renderer for HalfBlockRenderer {
    fn name(&self) -> &'static str {
        "half-block"
    }

    fn pixel_size(&self, cols: u16, visual_rows: u16) -> Option<(usize, usize)> {
        Some((cols as usize, visual_rows as usize * 2))
    }

    fn present(&mut self, p: &Presentation<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
        let cols = p.term_cols as usize;
        let rows = p.visual_rows as usize;
        let img = p.image;
        if cols == 0 || rows == 0 || img.width != cols || img.height != rows * 2 {
            return Ok(());
        }

        if p.sync_updates {
            out.write_all(b"\x1b[?2026h")?;
        }
        // Home, reset, autowrap off while painting full-width rows.
        out.write_all(b"\x1b[H\x1b[0m\x1b[?7l")?;
        self.last_fg = None;
        self.last_bg = None;

        for row in 0..rows {
            for x in 0..cols {
                let top = img.pixel(x, row * 2);
                let bot = img.pixel(x, row * 2 + 1);
                self.set_colors(out, [top[0], top[1], top[2]], [bot[0], bot[1], bot[2]])?;
                write!(out, "{UPPER_HALF}")?;
            }
            out.write_all(b"\r\n")?;
        }

        write_hud(out, p)?;
        if let Some(text) = p.overlay {
            draw_overlay_popup(out, p.term_cols, p.term_rows, text)?;
        }

        out.write_all(b"\x1b[?7h")?;
        if p.sync_updates {
            out.write_all(b"\x1b[?2026l")?;
        }
        out.flush()?;
        Ok(())
    }
}
