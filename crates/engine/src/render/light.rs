/// Light level of a node with no light at all.
pub const ZERO_INTENSITY: u8 = 0;
/// Light level forced onto unlit nodes at the edge of the rendered region.
pub const MAP_EDGE_INTENSITY: u8 = 11;
pub const FULL_INTENSITY: u8 = 15;

const LIGHT_TABLE: [f64; 16] = [
    0.000, 0.024, 0.059, 0.118, 0.196, 0.286, 0.384, 0.471, 0.545, 0.608, 0.659, 0.710, 0.769, 0.835,
    0.918, 1.000,
];

/// Brightness factor for the day light level stored in the low nibble.
#[inline]
pub fn decode_light(param1: u8) -> f64 {
    LIGHT_TABLE[(param1 & 0x0F) as usize]
}
