//! Packed 4:2:2 (Y0 U Y1 V) to RGBA conversion.
//!
//! Every 4 input bytes describe two horizontally adjacent pixels sharing one
//! chroma pair. Output is tightly packed RGBA with opaque alpha.

/// Bytes of packed input per pixel pair.
pub const PACKED_GROUP_LEN: usize = 4;

/// Bytes of RGBA output per pixel pair.
pub const RGBA_PAIR_LEN: usize = 8;

#[inline]
fn clamp_channel(x: f64) -> u8 {
    x.floor().clamp(0.0, 255.0) as u8
}

#[inline]
fn write_pixel(out: &mut [u8], y: f64, u: f64, v: f64) {
    out[0] = clamp_channel(y + 1.4075 * (v - 128.0));
    out[1] = clamp_channel(y - 0.3455 * (u - 128.0) - 0.7169 * (v - 128.0));
    out[2] = clamp_channel(y + 1.7790 * (u - 128.0));
    out[3] = 255;
}

/// Decode `src` into the RGBA buffer `dst`, returning the number of pixels
/// written.
///
/// Stops at whichever runs out first: complete input groups or complete
/// output pixel pairs. Bytes of `dst` past the last written pair are left
/// untouched, so a truncated frame only repaints its leading rows.
pub fn decode_yuyv_into(src: &[u8], dst: &mut [u8]) -> usize {
    let mut pairs = 0;

    for (group, out) in src
        .chunks_exact(PACKED_GROUP_LEN)
        .zip(dst.chunks_exact_mut(RGBA_PAIR_LEN))
    {
        let y1 = f64::from(group[0]);
        let u = f64::from(group[1]);
        let y2 = f64::from(group[2]);
        let v = f64::from(group[3]);

        let (first, second) = out.split_at_mut(4);
        write_pixel(first, y1, u, v);
        write_pixel(second, y2, u, v);
        pairs += 1;
    }

    pairs * 2
}

/// Decode into a fresh zeroed `width` x `height` raster.
///
/// Returns `None` for an empty input so the caller can leave its current
/// picture alone.
pub fn decode_yuyv(src: &[u8], width: u32, height: u32) -> Option<Vec<u8>> {
    if src.is_empty() {
        return None;
    }

    let mut rgba = vec![0u8; width as usize * height as usize * 4];
    let written = decode_yuyv_into(src, &mut rgba);

    tracing::trace!(
        input_bytes = src.len(),
        pixels = written,
        "Decoded packed frame"
    );

    Some(rgba)
}
