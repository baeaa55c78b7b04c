//! Five-landmark face alignment to the canonical 112×112 ArcFace crop.

use image::{Rgb, RgbImage};

/// ArcFace reference landmarks for a 112×112 output.
const REFERENCE_LANDMARKS: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

pub const ALIGNED_SIZE: u32 = 112;

/// Similarity transform `dst = [a -b; b a] * src + [tx, ty]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub a: f32,
    pub b: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Similarity {
    pub fn apply(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (
            self.a * x - self.b * y + self.tx,
            self.b * x + self.a * y + self.ty,
        )
    }

    /// Inverse transform, or `None` when the scale is degenerate.
    pub fn inverse(&self) -> Option<Similarity> {
        let det = self.a * self.a + self.b * self.b;
        if det < 1e-12 {
            return None;
        }
        let ia = self.a / det;
        let ib = -self.b / det;
        Some(Similarity {
            a: ia,
            b: ib,
            tx: -(ia * self.tx - ib * self.ty),
            ty: -(ib * self.tx + ia * self.ty),
        })
    }
}

/// Closed-form least-squares similarity mapping `src` onto `dst`.
pub fn estimate_similarity(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Similarity {
    let n = src.len() as f32;
    let (sx, sy) = src.iter().fold((0.0, 0.0), |acc, p| (acc.0 + p.0, acc.1 + p.1));
    let (dx, dy) = dst.iter().fold((0.0, 0.0), |acc, p| (acc.0 + p.0, acc.1 + p.1));
    let (smx, smy) = (sx / n, sy / n);
    let (dmx, dmy) = (dx / n, dy / n);

    let mut dot = 0.0f32;
    let mut cross = 0.0f32;
    let mut norm = 0.0f32;
    for (s, d) in src.iter().zip(dst.iter()) {
        let (px, py) = (s.0 - smx, s.1 - smy);
        let (qx, qy) = (d.0 - dmx, d.1 - dmy);
        dot += px * qx + py * qy;
        cross += px * qy - py * qx;
        norm += px * px + py * py;
    }

    if norm < 1e-12 {
        return Similarity { a: 1.0, b: 0.0, tx: dmx - smx, ty: dmy - smy };
    }

    let a = dot / norm;
    let b = cross / norm;
    Similarity {
        a,
        b,
        tx: dmx - (a * smx - b * smy),
        ty: dmy - (b * smx + a * smy),
    }
}

/// Warp the face described by `landmarks` into a 112×112 RGB crop.
///
/// Pixels mapping outside the frame are black.
pub fn align_face(frame: &RgbImage, landmarks: &[(f32, f32); 5]) -> RgbImage {
    let forward = estimate_similarity(landmarks, &REFERENCE_LANDMARKS);
    let mut out = RgbImage::new(ALIGNED_SIZE, ALIGNED_SIZE);
    let Some(back) = forward.inverse() else {
        return out;
    };

    for (ox, oy, pixel) in out.enumerate_pixels_mut() {
        let (sx, sy) = back.apply((ox as f32, oy as f32));
        *pixel = sample_bilinear(frame, sx, sy);
    }
    out
}

fn sample_bilinear(frame: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (w, h) = frame.dimensions();
    if w == 0 || h == 0 || x < 0.0 || y < 0.0 || x > (w - 1) as f32 || y > (h - 1) as f32 {
        return Rgb([0, 0, 0]);
    }
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let (tl, tr) = (frame.get_pixel(x0, y0), frame.get_pixel(x1, y0));
    let (bl, br) = (frame.get_pixel(x0, y1), frame.get_pixel(x1, y1));

    let mut rgb = [0u8; 3];
    for (c, value) in rgb.iter_mut().enumerate() {
        let top = tl[c] as f32 * (1.0 - fx) + tr[c] as f32 * fx;
        let bottom = bl[c] as f32 * (1.0 - fx) + br[c] as f32 * fx;
        *value = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform() {
        let t = estimate_similarity(&REFERENCE_LANDMARKS, &REFERENCE_LANDMARKS);
        assert!((t.a - 1.0).abs() < 1e-4);
        assert!(t.b.abs() < 1e-4);
        assert!(t.tx.abs() < 1e-3);
        assert!(t.ty.abs() < 1e-3);
    }

    #[test]
    fn test_recovers_scale_and_translation() {
        let src: [(f32, f32); 5] = std::array::from_fn(|i| {
            let (x, y) = REFERENCE_LANDMARKS[i];
            (x * 2.0 + 10.0, y * 2.0 + 20.0)
        });
        let t = estimate_similarity(&src, &REFERENCE_LANDMARKS);
        for (s, d) in src.iter().zip(REFERENCE_LANDMARKS.iter()) {
            let (x, y) = t.apply(*s);
            assert!((x - d.0).abs() < 1e-2, "x {x} vs {}", d.0);
            assert!((y - d.1).abs() < 1e-2, "y {y} vs {}", d.1);
        }
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = Similarity { a: 0.8, b: 0.3, tx: 5.0, ty: -2.0 };
        let inv = t.inverse().unwrap();
        let (x, y) = inv.apply(t.apply((17.0, 42.0)));
        assert!((x - 17.0).abs() < 1e-3);
        assert!((y - 42.0).abs() < 1e-3);
    }

    #[test]
    fn test_align_output_size() {
        let frame = RgbImage::from_pixel(200, 200, Rgb([90, 120, 150]));
        let aligned = align_face(&frame, &REFERENCE_LANDMARKS);
        assert_eq!(aligned.dimensions(), (ALIGNED_SIZE, ALIGNED_SIZE));
        assert_eq!(aligned.get_pixel(56, 56), &Rgb([90, 120, 150]));
    }
}
