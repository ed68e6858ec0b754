/// Packed RGBA8 image, row-major, no padding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageBuffer {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl ImageBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let mut data = vec![0u8; width.saturating_mul(height).saturating_mul(4)];
        for px in data.chunks_exact_mut(4) {
            px[3] = 255;
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_rgba(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        if data.len() != width.saturating_mul(height).saturating_mul(4) {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let mut img = Self::new(width, height);
        for px in img.data.chunks_exact_mut(4) {
            px[0] = rgb[0];
            px[1] = rgb[1];
            px[2] = rgb[2];
        }
        img
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.width + x) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Nearest-neighbour resample into `target_width` x `target_height`.
    pub fn resized(&self, target_width: usize, target_height: usize) -> Self {
        if self.width == target_width && self.height == target_height {
            return self.clone();
        }

        let mut out = Self::new(target_width, target_height);
        if self.width == 0 || self.height == 0 {
            return out;
        }

        let x_ratio = self.width as f32 / target_width.max(1) as f32;
        let y_ratio = self.height as f32 / target_height.max(1) as f32;

        for y in 0..target_height {
            let src_y = ((y as f32 * y_ratio) as usize).min(self.height - 1);
            for x in 0..target_width {
                let src_x = ((x as f32 * x_ratio) as usize).min(self.width - 1);
                let src_idx = (src_y * self.width + src_x) * 4;
                let dst_idx = (y * target_width + x) * 4;
                out.data[dst_idx..dst_idx + 4].copy_from_slice(&self.data[src_idx..src_idx + 4]);
            }
        }

        out
    }

    /// Paste `inset` scaled to `scale` of this image's width into the
    /// bottom-right corner, with a one-pixel light border.
    pub fn composite_inset(&mut self, inset: &ImageBuffer, scale: f32) {
        let scale = scale.clamp(0.05, 1.0);
        let iw = ((self.width as f32 * scale) as usize).max(1);
        let aspect = if inset.width == 0 {
            1.0
        } else {
            inset.height as f32 / inset.width as f32
        };
        let ih = ((iw as f32 * aspect) as usize).max(1);
        if iw + 2 >= self.width || ih + 2 >= self.height {
            return;
        }

        let thumb = inset.resized(iw, ih);
        let x0 = self.width - iw - 1;
        let y0 = self.height - ih - 1;

        for y in (y0 - 1)..(y0 + ih + 1).min(self.height) {
            for x in (x0 - 1)..(x0 + iw + 1).min(self.width) {
                let i = (y * self.width + x) * 4;
                let inside = x >= x0 && y >= y0 && x < x0 + iw && y < y0 + ih;
                if inside {
                    let s = ((y - y0) * iw + (x - x0)) * 4;
                    self.data[i..i + 4].copy_from_slice(&thumb.data[s..s + 4]);
                } else {
                    self.data[i..i + 4].copy_from_slice(&[230, 230, 230, 255]);
                }
            }
        }
    }
}
