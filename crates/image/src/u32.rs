use base::Vec2;

fn pack_u32(r: u8, g: u8, b: u8) -> u32 {
    0xFF00_0000 | (r as u32) << 16 | (g as u32) << 8 | b as u32
}

fn unit_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Pack HWC float RGB samples in [0, 1] into display words.
///
/// Out-of-range samples are saturated; the pipeline already clips, so this
/// only matters for callers that hand in raw model output.
pub fn unit_rgb_to_u32(size: Vec2<usize>, data: &[f32]) -> Vec<u32> {
    let mut buf = Vec::with_capacity(size.area());
    for chunk in data.chunks_exact(3) {
        buf.push(pack_u32(
            unit_to_u8(chunk[0]),
            unit_to_u8(chunk[1]),
            unit_to_u8(chunk[2]),
        ));
    }
    buf
}
