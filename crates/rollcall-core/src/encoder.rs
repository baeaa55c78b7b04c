//! Face descriptor extraction.
//!
//! [`FaceEncoder`] is the seam the registration flow and the recognition
//! loop use to turn a frame into face regions and descriptors.
//! [`OnnxFaceEncoder`] backs it with SCRFD detection and ArcFace
//! (w600k_r50) embeddings.

use crate::alignment::{self, ALIGNED_SIZE};
use crate::detector::{DetectorError, FaceDetector};
use crate::types::{Descriptor, FaceRegion};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5;
const DESCRIPTOR_DIM: usize = 512;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Face detection and descriptor extraction over RGB frames.
pub trait FaceEncoder {
    /// Locate faces, most confident first.
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<FaceRegion>, EncoderError>;

    /// Describe one detected face. `None` when the region cannot be encoded.
    fn encode(
        &mut self,
        frame: &RgbImage,
        region: &FaceRegion,
    ) -> Result<Option<Descriptor>, EncoderError>;
}

/// ArcFace recognizer producing L2-normalized 512-dim descriptors.
pub struct FaceRecognizer {
    session: Session,
}

impl FaceRecognizer {
    pub fn load(model_path: &str) -> Result<Self, EncoderError> {
        if !Path::new(model_path).exists() {
            return Err(EncoderError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = model_path, "loaded ArcFace model");
        Ok(Self { session })
    }

    /// Extract a descriptor from an aligned 112×112 crop.
    pub fn extract(&mut self, aligned: &RgbImage) -> Result<Descriptor, EncoderError> {
        let input = to_tensor(aligned);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EncoderError::InferenceFailed(format!("embedding: {e}")))?;

        if raw.len() != DESCRIPTOR_DIM {
            return Err(EncoderError::InferenceFailed(format!(
                "expected {DESCRIPTOR_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(normalize(raw.to_vec()))
    }
}

/// SCRFD + ArcFace pipeline.
pub struct OnnxFaceEncoder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEncoder {
    /// Load `det_10g.onnx` and `w600k_r50.onnx` from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, EncoderError> {
        let detector_path = model_dir.join("det_10g.onnx");
        let recognizer_path = model_dir.join("w600k_r50.onnx");
        let detector = FaceDetector::load(&detector_path.to_string_lossy())?;
        let recognizer = FaceRecognizer::load(&recognizer_path.to_string_lossy())?;
        Ok(Self { detector, recognizer })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<FaceRegion>, EncoderError> {
        Ok(self.detector.detect(frame)?)
    }

    fn encode(
        &mut self,
        frame: &RgbImage,
        region: &FaceRegion,
    ) -> Result<Option<Descriptor>, EncoderError> {
        let Some(landmarks) = region.landmarks.as_ref() else {
            tracing::debug!("face region has no landmarks; cannot align");
            return Ok(None);
        };
        let aligned = alignment::align_face(frame, landmarks);
        self.recognizer.extract(&aligned).map(Some)
    }
}

fn to_tensor(aligned: &RgbImage) -> Array4<f32> {
    let size = ALIGNED_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in aligned.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        if x >= size || y >= size {
            continue;
        }
        for c in 0..3 {
            tensor[[0, c, y, x]] = (pixel[c] as f32 - ARCFACE_MEAN) / ARCFACE_STD;
        }
    }
    tensor
}

fn normalize(raw: Vec<f32>) -> Descriptor {
    let norm = raw.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        Descriptor::new(raw.into_iter().map(|v| v / norm).collect())
    } else {
        Descriptor::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_tensor_layout() {
        let mut crop = RgbImage::from_pixel(ALIGNED_SIZE, ALIGNED_SIZE, Rgb([255, 127, 0]));
        crop.put_pixel(3, 5, Rgb([0, 0, 255]));
        let t = to_tensor(&crop);
        assert_eq!(t.shape(), &[1, 3, 112, 112]);
        assert!((t[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((t[[0, 2, 0, 0]] + 1.0).abs() < 1e-6);
        assert!((t[[0, 2, 5, 3]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_unit_length() {
        let d = normalize(vec![3.0, 4.0]);
        assert!((d.values[0] - 0.6).abs() < 1e-6);
        assert!((d.values[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let d = normalize(vec![0.0, 0.0]);
        assert_eq!(d.values, vec![0.0, 0.0]);
    }

    #[test]
    fn test_missing_models_reported() {
        let err = OnnxFaceEncoder::load(Path::new("/nonexistent/models")).err();
        assert!(matches!(
            err,
            Some(EncoderError::Detector(DetectorError::ModelNotFound(_)))
        ));
    }
}
