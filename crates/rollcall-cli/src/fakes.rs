//! Scripted camera and encoder doubles for flow tests.

use image::{Rgb, RgbImage};
use rollcall_core::{Descriptor, EncoderError, FaceEncoder, FaceRegion};
use rollcall_hw::{CameraError, Frame, FrameSource};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Yields `count` grey frames 100 ms apart, then fails like an unplugged camera.
pub struct FakeCamera {
    remaining: usize,
    sequence: u32,
    start: Instant,
}

impl FakeCamera {
    pub fn new(count: usize) -> Self {
        Self { remaining: count, sequence: 0, start: Instant::now() }
    }
}

impl FrameSource for FakeCamera {
    fn next_frame(&mut self) -> Result<Frame, CameraError> {
        if self.remaining == 0 {
            return Err(CameraError::CaptureFailed("end of script".into()));
        }
        self.remaining -= 1;
        let frame = Frame {
            image: RgbImage::from_pixel(64, 64, Rgb([90, 90, 90])),
            timestamp: self.start + Duration::from_millis(100 * self.sequence as u64),
            sequence: self.sequence,
        };
        self.sequence += 1;
        Ok(frame)
    }
}

/// What the fake encoder sees on one `detect` call.
#[derive(Debug, Clone)]
pub enum Scene {
    Empty,
    /// Faces whose descriptors are the given values; `None` fails encoding.
    Faces(Vec<Option<Vec<f32>>>),
}

impl Scene {
    pub fn one(values: &[f32]) -> Self {
        Scene::Faces(vec![Some(values.to_vec())])
    }
}

/// Replays scenes in order; once the script runs out the last scene repeats.
pub struct FakeEncoder {
    scenes: VecDeque<Scene>,
    current: Scene,
    pub detect_calls: usize,
}

impl FakeEncoder {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self { scenes: scenes.into(), current: Scene::Empty, detect_calls: 0 }
    }
}

fn region_at(index: usize) -> FaceRegion {
    FaceRegion {
        x: 4.0 + index as f32 * 30.0,
        y: 8.0,
        width: 24.0,
        height: 30.0,
        confidence: 0.9,
        landmarks: None,
    }
}

impl FaceEncoder for FakeEncoder {
    fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<FaceRegion>, EncoderError> {
        self.detect_calls += 1;
        if let Some(next) = self.scenes.pop_front() {
            self.current = next;
        }
        Ok(match &self.current {
            Scene::Empty => Vec::new(),
            Scene::Faces(faces) => (0..faces.len()).map(region_at).collect(),
        })
    }

    fn encode(
        &mut self,
        _frame: &RgbImage,
        region: &FaceRegion,
    ) -> Result<Option<Descriptor>, EncoderError> {
        let index = ((region.x - 4.0) / 30.0).round() as usize;
        Ok(match &self.current {
            Scene::Faces(faces) => faces.get(index).cloned().flatten().map(Descriptor::new),
            Scene::Empty => None,
        })
    }
}
