use crate::render::{draw_overlay_popup, write_hud, Presentation, Renderer};
use anyhow::{anyhow, Context};
use base64::Engine;
use nix::sys::mman::{mmap, munmap, shm_open, shm_unlink, MapFlags, ProtFlags};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;
use std::io::Write;
use std::num::NonZeroUsize;
use std::ptr::NonNull;

const IMAGE_ID: u32 = 1;
const PLACEMENT_ID: u32 = 1;
/// Raw bytes per direct chunk; 3072 encodes to 4096 base64 bytes.
const RAW_CHUNK: usize = 3 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Transport {
    /// POSIX shared memory named in the escape payload.
    Shm,
    /// Base64 pixels inline in chunked escapes.
    Direct,
}

impl Transport {
    fn label(self) -> &'static str {
        match self {
            Self::Shm => "shm",
            Self::Direct => "direct",
        }
    }
}

struct SharedMapping {
    ptr: NonNull<std::ffi::c_void>,
    len: usize,
}

/// Kitty graphics protocol: the stylized frame is sent at full resolution
/// and the terminal scales it into the picture area.
pub struct KittyRenderer {
    shm_name: String,
    shm_name_b64: String,
    mapping: Option<SharedMapping>,
    transports: Vec<Transport>,
    active: usize,
    b64_buf: Vec<u8>,
    overlay_was_visible: bool,
}

impl KittyRenderer {
    pub fn new() -> Self {
        // Short names: some platforms cap shm name length.
        let shm_name = format!("/sw{}", std::process::id());
        let shm_name_b64 = base64::engine::general_purpose::STANDARD.encode(shm_name.as_bytes());
        Self {
            shm_name,
            shm_name_b64,
            mapping: None,
            transports: transport_chain(),
            active: 0,
            b64_buf: Vec::new(),
            overlay_was_visible: false,
        }
    }

    fn map_shm(&mut self, len: usize) -> anyhow::Result<NonNull<std::ffi::c_void>> {
        if let Some(m) = &self.mapping {
            if m.len == len {
                return Ok(m.ptr);
            }
        }
        self.unmap();

        let len_nz = NonZeroUsize::new(len).context("empty pixel buffer")?;
        let fd = shm_open(
            self.shm_name.as_str(),
            nix::fcntl::OFlag::O_CREAT | nix::fcntl::OFlag::O_RDWR,
            Mode::from_bits_truncate(0o600),
        )
        .with_context(|| format!("shm_open({})", self.shm_name))?;
        ftruncate(&fd, len as i64).context("ftruncate shm")?;
        let ptr = unsafe {
            mmap(
                None,
                len_nz,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                fd,
                0,
            )
        }
        .context("mmap shm")?;

        self.mapping = Some(SharedMapping { ptr, len });
        Ok(ptr)
    }

    fn unmap(&mut self) {
        if let Some(m) = self.mapping.take() {
            unsafe {
                let _ = munmap(m.ptr, m.len);
            }
        }
    }

    fn send(&mut self, transport: Transport, p: &Presentation<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
        let img = p.image;
        let header = format!(
            "a=T,f=32,s={},v={},i={IMAGE_ID},p={PLACEMENT_ID},c={},r={},C=1,q=2,z=-1",
            img.width, img.height, p.term_cols, p.visual_rows
        );
        match transport {
            Transport::Shm => {
                let ptr = self.map_shm(img.data.len())?;
                unsafe {
                    std::ptr::copy_nonoverlapping(img.data.as_ptr(), ptr.as_ptr().cast::<u8>(), img.data.len());
                }
                write!(out, "\x1b_G{header},t=s;{}\x1b\\", self.shm_name_b64)?;
                Ok(())
            }
            Transport::Direct => write_direct(out, &img.data, &header, &mut self.b64_buf),
        }
    }
}

impl Default for KittyRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for KittyRenderer {
    fn name(&self) -> &'static str {
        "kitty"
    }

    fn pixel_size(&self, _cols: u16, _visual_rows: u16) -> Option<(usize, usize)> {
        None
    }

    fn present(&mut self, p: &Presentation<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
        if p.term_cols == 0 || p.visual_rows == 0 || p.image.width == 0 || p.image.height == 0 {
            return Ok(());
        }
        if p.sync_updates {
            out.write_all(b"\x1b[?2026h")?;
        }

        if let Some(text) = p.overlay {
            // Hide the image so the popup is readable.
            write!(out, "\x1b_Ga=d,d=I,i={IMAGE_ID}\x1b\\")?;
            clear_rows(out, p.term_rows as usize)?;
            write_hud(out, p)?;
            draw_overlay_popup(out, p.term_cols, p.term_rows, text)?;
            self.overlay_was_visible = true;
        } else {
            if self.overlay_was_visible {
                clear_rows(out, p.term_rows as usize)?;
                self.overlay_was_visible = false;
            }
            out.write_all(b"\x1b[H")?;

            let start = self.active.min(self.transports.len().saturating_sub(1));
            let mut last_err = None;
            let mut sent = false;
            for step in 0..self.transports.len() {
                let idx = (start + step) % self.transports.len();
                let transport = self.transports[idx];
                match self.send(transport, p, out) {
                    Ok(()) => {
                        self.active = idx;
                        sent = true;
                        break;
                    }
                    // Terminal I/O failures are not transport problems.
                    Err(err) if err.downcast_ref::<std::io::Error>().is_some() => return Err(err),
                    Err(err) => {
                        log::warn!("kitty transport '{}' failed: {err:#}", transport.label());
                        last_err = Some(err);
                    }
                }
            }
            if !sent {
                return Err(last_err.unwrap_or_else(|| anyhow!("no kitty transport succeeded")));
            }
            write_hud(out, p)?;
        }

        if p.sync_updates {
            out.write_all(b"\x1b[?2026l")?;
        }
        out.flush()?;
        Ok(())
    }
}

impl Drop for KittyRenderer {
    fn drop(&mut self) {
        self.unmap();
        let _ = shm_unlink(self.shm_name.as_str());
    }
}

/// `STYLEWAVE_KITTY_TRANSPORT=direct|shm` pins one transport.
fn transport_chain() -> Vec<Transport> {
    match std::env::var("STYLEWAVE_KITTY_TRANSPORT")
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
        .as_str()
    {
        "direct" | "d" => return vec![Transport::Direct],
        "shm" | "s" | "shared" => return vec![Transport::Shm],
        _ => {}
    }
    let term_program = std::env::var("TERM_PROGRAM")
        .unwrap_or_default()
        .to_ascii_lowercase();
    if term_program.contains("ghostty") {
        vec![Transport::Direct, Transport::Shm]
    } else {
        vec![Transport::Shm, Transport::Direct]
    }
}

fn write_direct(out: &mut dyn Write, rgba: &[u8], header: &str, b64_buf: &mut Vec<u8>) -> anyhow::Result<()> {
    let chunks: Vec<&[u8]> = rgba.chunks(RAW_CHUNK).collect();
    let last = chunks.len().saturating_sub(1);
    for (i, chunk) in chunks.iter().enumerate() {
        let b64_len = chunk.len().div_ceil(3) * 4;
        if b64_buf.len() < b64_len {
            b64_buf.resize(b64_len, 0);
        }
        let written = base64::engine::general_purpose::STANDARD
            .encode_slice(chunk, &mut b64_buf[..b64_len])
            .context("base64 encode pixels")?;

        let more = u8::from(i < last);
        if i == 0 {
            write!(out, "\x1b_G{header},t=d,m={more};")?;
        } else {
            write!(out, "\x1b_Gm={more};")?;
        }
        out.write_all(&b64_buf[..written])?;
        out.write_all(b"\x1b\\")?;
    }
    Ok(())
}

fn clear_rows(out: &mut dyn Write, rows: usize) -> anyhow::Result<()> {
    for row in 1..=rows {
        write!(out, "\x1b[{row};1H\x1b[0m\x1b[2K")?;
    }
    Ok(())
}
