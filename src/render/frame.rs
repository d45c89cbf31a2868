use crate::foundation::error::{ReelError, ReelResult};

/// A rendered RGBA8 frame.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Opaque frame filled with one straight-alpha color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let px = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(px * 4);
        for _ in 0..px {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
            premultiplied: false,
        }
    }

    /// Check that `data` matches `width * height * 4`.
    pub fn validate(&self) -> ReelResult<()> {
        let expected = (self.width as usize) * (self.height as usize) * 4;
        if self.width == 0 || self.height == 0 {
            return Err(ReelError::validation("frame width/height must be non-zero"));
        }
        if self.data.len() != expected {
            return Err(ReelError::validation(format!(
                "frame data is {} bytes, expected {expected} for {}x{}",
                self.data.len(),
                self.width,
                self.height
            )));
        }
        Ok(())
    }

    /// Composite over `bg_rgba` and return tightly packed opaque RGBA8.
    pub fn to_opaque_rgba8(&self, bg_rgba: [u8; 4]) -> ReelResult<Vec<u8>> {
        self.validate()?;
        let mut out = vec![0u8; self.data.len()];
        if self.premultiplied {
            flatten_premul_over_bg_to_opaque_rgba8(&mut out, &self.data, bg_rgba)?;
        } else {
            flatten_straight_over_bg_to_opaque_rgba8(&mut out, &self.data, bg_rgba)?;
        }
        Ok(out)
    }
}

/// Flatten premultiplied RGBA8 over a background color, producing opaque pixels.
pub fn flatten_premul_over_bg_to_opaque_rgba8(
    dst: &mut [u8],
    src_premul: &[u8],
    bg_rgba: [u8; 4],
) -> ReelResult<()> {
    check_rgba_pair(dst, src_premul)?;

    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = 255 - a;
        for c in 0..3 {
            d[c] = (u16::from(s[c]) + mul_div255(u16::from(bg_rgba[c]), inv)).min(255) as u8;
        }
        d[3] = 255;
    }
    Ok(())
}

/// Flatten straight-alpha RGBA8 over a background color, producing opaque pixels.
pub fn flatten_straight_over_bg_to_opaque_rgba8(
    dst: &mut [u8],
    src: &[u8],
    bg_rgba: [u8; 4],
) -> ReelResult<()> {
    check_rgba_pair(dst, src)?;

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = 255 - a;
        for c in 0..3 {
            d[c] = (mul_div255(u16::from(s[c]), a) + mul_div255(u16::from(bg_rgba[c]), inv))
                .min(255) as u8;
        }
        d[3] = 255;
    }
    Ok(())
}

fn check_rgba_pair(dst: &[u8], src: &[u8]) -> ReelResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(ReelError::validation(
            "alpha flattening expects equal-length rgba8 buffers",
        ));
    }
    Ok(())
}

/// `round(x * y / 255)` for 8-bit operands.
fn mul_div255(x: u16, y: u16) -> u16 {
    let t = u32::from(x) * u32::from(y) + 128;
    ((t + (t >> 8)) >> 8) as u16
}

#[cfg(test)]
#[path = "../../tests/unit/render/frame.rs"]
mod tests;
