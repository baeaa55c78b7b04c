//! Face-crop image artifacts written during registration.

use image::{imageops, RgbImage};
use rollcall_core::FaceRegion;
use std::path::{Path, PathBuf};

/// Fraction of the face size added as margin on every side of a crop.
const CROP_MARGIN: f32 = 0.2;

/// Pixel rectangle within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Which capture of a registration an artifact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sequence {
    Single,
    Index(usize),
}

/// Expand `region` by the crop margin, clamped to a `frame_w`×`frame_h` frame.
pub fn crop_with_margin(region: &FaceRegion, frame_w: u32, frame_h: u32) -> CropRect {
    let top = region.y as i64;
    let left = region.x as i64;
    let bottom = region.bottom() as i64;
    let right = region.right() as i64;

    let margin_h = ((bottom - top) as f32 * CROP_MARGIN) as i64;
    let margin_w = ((right - left) as f32 * CROP_MARGIN) as i64;

    let top = (top - margin_h).clamp(0, frame_h as i64);
    let left = (left - margin_w).clamp(0, frame_w as i64);
    let bottom = (bottom + margin_h).clamp(top, frame_h as i64);
    let right = (right + margin_w).clamp(left, frame_w as i64);

    CropRect {
        x: left as u32,
        y: top as u32,
        width: (right - left) as u32,
        height: (bottom - top) as u32,
    }
}

/// `{dir}/{student_id}_single.jpg` or `{dir}/{student_id}_{n}.jpg`.
pub fn artifact_path(dir: &Path, student_id: &str, sequence: Sequence) -> PathBuf {
    let suffix = match sequence {
        Sequence::Single => "single".to_string(),
        Sequence::Index(n) => n.to_string(),
    };
    dir.join(format!("{student_id}_{suffix}.jpg"))
}

/// Crop the face with margin and write it as JPEG, creating `dir` if needed.
pub fn save_face_crop(
    frame: &RgbImage,
    region: &FaceRegion,
    dir: &Path,
    student_id: &str,
    sequence: Sequence,
) -> Result<PathBuf, image::ImageError> {
    std::fs::create_dir_all(dir)?;
    let rect = crop_with_margin(region, frame.width(), frame.height());
    let crop = imageops::crop_imm(frame, rect.x, rect.y, rect.width, rect.height).to_image();

    let path = artifact_path(dir, student_id, sequence);
    crop.save(&path)?;
    tracing::debug!(
        path = %path.display(),
        width = rect.width,
        height = rect.height,
        "saved face crop"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn region(x: f32, y: f32, w: f32, h: f32) -> FaceRegion {
        FaceRegion { x, y, width: w, height: h, confidence: 0.9, landmarks: None }
    }

    #[test]
    fn test_margin_inside_frame() {
        let rect = crop_with_margin(&region(100.0, 100.0, 50.0, 100.0), 640, 480);
        assert_eq!(rect, CropRect { x: 90, y: 80, width: 70, height: 140 });
    }

    #[test]
    fn test_margin_clamped_at_edges() {
        let rect = crop_with_margin(&region(5.0, 2.0, 100.0, 100.0), 120, 110);
        assert_eq!(rect, CropRect { x: 0, y: 0, width: 120, height: 110 });
    }

    #[test]
    fn test_artifact_names() {
        let dir = Path::new("/data/student_images");
        assert_eq!(
            artifact_path(dir, "S12345", Sequence::Single),
            PathBuf::from("/data/student_images/S12345_single.jpg")
        );
        assert_eq!(
            artifact_path(dir, "S12345", Sequence::Index(3)),
            PathBuf::from("/data/student_images/S12345_3.jpg")
        );
    }

    #[test]
    fn test_save_face_crop_creates_folder() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("nested/images");
        let frame = RgbImage::from_pixel(200, 150, Rgb([40, 80, 120]));

        let face = region(50.0, 40.0, 50.0, 50.0);
        let path = save_face_crop(&frame, &face, &dir, "S1", Sequence::Index(1)).unwrap();

        assert!(path.ends_with("S1_1.jpg"));
        let saved = image::open(&path).unwrap();
        assert_eq!((saved.width(), saved.height()), (70, 70));
    }
}
