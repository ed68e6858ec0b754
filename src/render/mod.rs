mod halfblock;
mod kitty;

pub use halfblock::HalfBlockRenderer;
pub use kitty::KittyRenderer;

use crate::frame::ImageBuffer;
use std::io::Write;

/// One screen update: the picture plus the text layers drawn over it.
pub struct Presentation<'a> {
    pub term_cols: u16,
    pub term_rows: u16,
    /// Rows given to the picture; HUD rows follow below.
    pub visual_rows: u16,
    pub image: &'a ImageBuffer,
    pub hud: &'a str,
    pub hud_rows: u16,
    pub overlay: Option<&'a str>,
    pub sync_updates: bool,
}

pub trait Renderer {
    fn name(&self) -> &'static str;

    /// Pixel size the renderer wants for a `cols x visual_rows` cell area.
    /// `None` means any size; the terminal scales it.
    fn pixel_size(&self, cols: u16, visual_rows: u16) -> Option<(usize, usize)>;

    fn present(&mut self, p: &Presentation<'_>, out: &mut dyn Write) -> anyhow::Result<()>;
}

/// Scale `image` into `width x height`, keeping its aspect ratio and
/// padding with black.
pub fn letterbox(image: &ImageBuffer, width: usize, height: usize) -> ImageBuffer {
    let mut out = ImageBuffer::new(width, height);
    if image.width == 0 || image.height == 0 || width == 0 || height == 0 {
        return out;
    }
    let scale = (width as f32 / image.width as f32).min(height as f32 / image.height as f32);
    let fit_w = ((image.width as f32 * scale).round() as usize).clamp(1, width);
    let fit_h = ((image.height as f32 * scale).round() as usize).clamp(1, height);
    let scaled = image.resized(fit_w, fit_h);

    let x0 = (width - fit_w) / 2;
    let y0 = (height - fit_h) / 2;
    for y in 0..fit_h {
        let src = y * fit_w * 4;
        let dst = ((y0 + y) * width + x0) * 4;
        out.data[dst..dst + fit_w * 4].copy_from_slice(&scaled.data[src..src + fit_w * 4]);
    }
    out
}

/// Clear row `row` (1-based) and print `line` cut to `cols` characters.
pub fn write_hud_line(
    out: &mut dyn Write,
    row: usize,
    cols: usize,
    line: Option<&str>,
) -> anyhow::Result<()> {
    write!(out, "\x1b[{row};1H\x1b[0m\x1b[2K")?;
    if let Some(line) = line {
        let clipped: String = line.chars().take(cols).collect();
        out.write_all(b"\x1b[38;2;210;220;235m\x1b[48;2;8;10;16m")?;
        write!(out, "{clipped}")?;
        out.write_all(b"\x1b[0m")?;
    }
    Ok(())
}

pub fn write_hud(out: &mut dyn Write, p: &Presentation<'_>) -> anyhow::Result<()> {
    let mut lines = p.hud.lines();
    for i in 0..p.hud_rows as usize {
        write_hud_line(out, p.visual_rows as usize + i + 1, p.term_cols as usize, lines.next())?;
    }
    Ok(())
}

/// Centered text box over a dimmed screen, first line as the title.
pub fn draw_overlay_popup(
    out: &mut dyn Write,
    term_cols: u16,
    term_rows: u16,
    text: &str,
) -> anyhow::Result<()> {
    let cols = term_cols as usize;
    let rows = term_rows as usize;
    if text.trim().is_empty() || cols < 8 || rows < 4 {
        return Ok(());
    }

    let max_inner = cols.saturating_sub(6).max(1);
    let lines = wrap_lines(text, max_inner);
    if lines.is_empty() {
        return Ok(());
    }

    let inner_w = lines
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(1, max_inner);
    let box_w = (inner_w + 4).min(cols.saturating_sub(2)).max(4);
    let inner_w = box_w - 4;
    let body_h = lines.len().min(rows.saturating_sub(3).max(1));
    let box_h = (body_h + 2).min(rows.saturating_sub(1)).max(3);
    let left = (cols - box_w) / 2 + 1;
    let top = (rows.saturating_sub(box_h)) / 2 + 1;

    out.write_all(b"\x1b[0m\x1b[38;2;220;228;242m\x1b[48;2;2;4;10m")?;
    for row in 1..=rows {
        write!(out, "\x1b[{row};1H\x1b[2K")?;
    }

    let edge = format!("+{}+", "-".repeat(box_w - 2));
    let blank = " ".repeat(inner_w);
    out.write_all(b"\x1b[0m\x1b[38;2;236;242;255m\x1b[48;2;10;14;24m")?;
    write!(out, "\x1b[{top};{left}H{edge}")?;
    for (i, line) in lines.iter().take(body_h).enumerate() {
        let row = top + 1 + i;
        write!(out, "\x1b[{row};{left}H| {blank} |")?;
        if i == 0 {
            write!(
                out,
                "\x1b[{row};{}H\x1b[1m\x1b[38;2;255;236;160m{line}\x1b[22m\x1b[38;2;236;242;255m",
                left + 2
            )?;
        } else {
            write!(out, "\x1b[{row};{}H{line}", left + 2)?;
        }
    }
    write!(out, "\x1b[{};{left}H{edge}", top + box_h - 1)?;
    out.write_all(b"\x1b[0m")?;
    Ok(())
}

fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in text.lines() {
        let chars: Vec<char> = raw.chars().collect();
        if chars.is_empty() {
            lines.push(String::new());
            continue;
        }
        for chunk in chars.chunks(width) {
            lines.push(chunk.iter().collect());
        }
    }
    lines
}
