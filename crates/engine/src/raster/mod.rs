//! Color + depth buffers and depth-tested compositing.

pub mod png;

use image::{Rgba, RgbaImage};

/// Pixels with alpha at or below this value are treated as fully transparent.
pub const ALPHA_CUTOFF: u8 = 10;

/// RGBA image paired with a per-pixel depth buffer. Smaller depth is nearer.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderBuffer {
    pub color: RgbaImage,
    pub depth: Vec<f64>,
    /// Set as soon as anything is composited onto the buffer.
    pub dirty: bool,
}

/// Target-space rectangle `[x0, x1) × [y0, y1)` where a source placed at
/// `origin` overlaps the target.
struct Overlap {
    x0: usize,
    x1: usize,
    y0: usize,
    y1: usize,
}

impl RenderBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            color: RgbaImage::new(width, height),
            depth: vec![f64::INFINITY; width as usize * height as usize],
            dirty: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.color.width()
    }

    pub fn height(&self) -> u32 {
        self.color.height()
    }

    #[inline]
    pub fn depth_at(&self, x: u32, y: u32) -> f64 {
        self.depth[y as usize * self.width() as usize + x as usize]
    }

    /// Write a pixel if `depth` is nearer than or equal to the stored depth.
    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, color: Rgba<u8>, depth: f64) {
        let i = y as usize * self.width() as usize + x as usize;
        if depth <= self.depth[i] {
            self.depth[i] = depth;
            self.color.put_pixel(x, y, color);
        }
    }

    fn overlap(&self, source: &RenderBuffer, origin: (i64, i64)) -> Option<Overlap> {
        let (ox, oy) = origin;
        let x0 = ox.max(0);
        let y0 = oy.max(0);
        let x1 = (ox + source.width() as i64).min(self.width() as i64);
        let y1 = (oy + source.height() as i64).min(self.height() as i64);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some(Overlap {
            x0: x0 as usize,
            x1: x1 as usize,
            y0: y0 as usize,
            y1: y1 as usize,
        })
    }

    /// Composite `source` with its top-left corner at `origin`, copying
    /// color as-is (alpha forced to opaque) wherever the source is nearer.
    pub fn overlay_opaque(&mut self, source: Option<&RenderBuffer>, origin: (i64, i64), depth_offset: f64) {
        self.dirty = true;
        let Some(source) = source else { return };
        let Some(area) = self.overlap(source, origin) else { return };

        let target_width = self.width() as usize;
        let source_width = source.width() as usize;
        let src = source.color.as_raw();
        let Self { color, depth, .. } = self;
        let dst: &mut [u8] = color;

        // Hot loop: flat offsets, row bases computed once per row.
        let sx0 = (area.x0 as i64 - origin.0) as usize;
        for y in area.y0..area.y1 {
            let source_base = (y as i64 - origin.1) as usize * source_width + sx0;
            let target_base = y * target_width + area.x0;
            for i in 0..area.x1 - area.x0 {
                let s = source_base + i;
                let t = target_base + i;

                let z = source.depth[s] + depth_offset;
                if z > depth[t] {
                    continue;
                }

                let sp = s * 4;
                if src[sp + 3] <= ALPHA_CUTOFF {
                    continue;
                }

                depth[t] = z;
                let tp = t * 4;
                dst[tp..tp + 3].copy_from_slice(&src[sp..sp + 3]);
                dst[tp + 3] = 255;
            }
        }
    }

    /// Composite `source` at `origin` using unpremultiplied source-over
    /// blending wherever the source is nearer.
    pub fn overlay_alpha(&mut self, source: Option<&RenderBuffer>, origin: (i64, i64), depth_offset: f64) {
        self.dirty = true;
        let Some(source) = source else { return };
        let Some(area) = self.overlap(source, origin) else { return };

        let target_width = self.width() as usize;
        let source_width = source.width() as usize;
        let src = source.color.as_raw();
        let Self { color, depth, .. } = self;
        let dst: &mut [u8] = color;

        let sx0 = (area.x0 as i64 - origin.0) as usize;
        for y in area.y0..area.y1 {
            let source_base = (y as i64 - origin.1) as usize * source_width + sx0;
            let target_base = y * target_width + area.x0;
            for i in 0..area.x1 - area.x0 {
                let s = source_base + i;
                let t = target_base + i;

                let z = source.depth[s] + depth_offset;
                if z > depth[t] {
                    continue;
                }

                let sp = s * 4;
                if src[sp + 3] <= ALPHA_CUTOFF {
                    continue;
                }

                depth[t] = z;
                let tp = t * 4;
                let sa = src[sp + 3] as f64 / 255.0;
                let ta = dst[tp + 3] as f64 / 255.0;
                let out_a = sa + ta * (1.0 - sa);
                for c in 0..3 {
                    let blended = (src[sp + c] as f64 * sa + dst[tp + c] as f64 * ta * (1.0 - sa)) / out_a;
                    dst[tp + c] = blended.round().clamp(0.0, 255.0) as u8;
                }
                dst[tp + 3] = (out_a * 255.0).round() as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprite(w: u32, h: u32, color: [u8; 4], depth: f64) -> RenderBuffer {
        let mut buf = RenderBuffer::new(w, h);
        for y in 0..h {
            for x in 0..w {
                buf.put_pixel(x, y, Rgba(color), depth);
            }
        }
        buf
    }

    #[test]
    fn test_nearer_sprite_wins_regardless_of_order() {
        let a = sprite(4, 4, [255, 0, 0, 255], 0.0);
        let b = sprite(4, 4, [0, 0, 255, 255], 0.0);

        let mut ab = RenderBuffer::new(8, 8);
        ab.overlay_opaque(Some(&a), (0, 0), 0.0);
        ab.overlay_opaque(Some(&b), (2, 2), -1.0);

        let mut ba = RenderBuffer::new(8, 8);
        ba.overlay_opaque(Some(&b), (2, 2), -1.0);
        ba.overlay_opaque(Some(&a), (0, 0), 0.0);

        for (x, y) in [(2, 2), (3, 3), (2, 3)] {
            assert_eq!(ab.color.get_pixel(x, y), &Rgba([0, 0, 255, 255]));
            assert_eq!(ba.color.get_pixel(x, y), &Rgba([0, 0, 255, 255]));
            assert_eq!(ab.depth_at(x, y), -1.0);
        }
        assert_eq!(ab.color.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_faint_pixels_are_cut_out() {
        let faint = sprite(2, 2, [10, 200, 30, 5], 0.0);
        let mut target = sprite(4, 4, [1, 2, 3, 255], 5.0);
        let before = target.clone();

        target.overlay_alpha(Some(&faint), (1, 1), -3.0);
        assert_eq!(target.color, before.color);
        assert_eq!(target.depth, before.depth);
        assert!(target.dirty);
    }

    #[test]
    fn test_alpha_blend_over_opaque() {
        let glass = sprite(1, 1, [255, 255, 255, 128], 0.0);
        let mut target = sprite(1, 1, [0, 0, 0, 255], 1.0);
        target.overlay_alpha(Some(&glass), (0, 0), 0.0);

        let px = target.color.get_pixel(0, 0);
        assert_eq!(px[3], 255);
        assert_eq!(px[0], 128);
        assert_eq!(target.depth_at(0, 0), 0.0);
    }

    #[test]
    fn test_alpha_blend_onto_empty_keeps_source() {
        let glass = sprite(1, 1, [40, 80, 120, 100], 0.0);
        let mut target = RenderBuffer::new(1, 1);
        target.overlay_alpha(Some(&glass), (0, 0), 0.0);
        assert_eq!(target.color.get_pixel(0, 0), &Rgba([40, 80, 120, 100]));
    }

    #[test]
    fn test_none_source_only_marks_dirty() {
        let mut target = RenderBuffer::new(4, 4);
        target.overlay_opaque(None, (0, 0), 0.0);
        assert!(target.dirty);
        assert!(target.color.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_offscreen_and_clipped_overlay() {
        let src = sprite(4, 4, [9, 9, 9, 255], 0.0);
        let mut target = RenderBuffer::new(4, 4);
        target.overlay_opaque(Some(&src), (-10, 0), 0.0);
        assert!(target.color.pixels().all(|p| p[3] == 0));

        target.overlay_opaque(Some(&src), (-2, 3), 0.0);
        assert_eq!(target.color.get_pixel(0, 3)[3], 255);
        assert_eq!(target.color.get_pixel(1, 3)[3], 255);
        assert_eq!(target.color.get_pixel(2, 3)[3], 0);
        assert_eq!(target.color.get_pixel(0, 2)[3], 0);
    }

    #[test]
    fn test_empty_sprite_pixels_leave_target_untouched() {
        let mut src = RenderBuffer::new(2, 2);
        src.put_pixel(0, 0, Rgba([1, 1, 1, 255]), 0.0);
        let mut target = RenderBuffer::new(2, 2);
        target.overlay_opaque(Some(&src), (0, 0), 0.0);
        assert_eq!(target.depth_at(0, 0), 0.0);
        assert_eq!(target.depth_at(1, 1), f64::INFINITY);
        assert_eq!(target.color.get_pixel(1, 1)[3], 0);
    }
}
