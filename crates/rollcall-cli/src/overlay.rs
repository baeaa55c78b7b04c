//! Face box overlays for the recognition preview.

use image::{Rgb, RgbImage};
use rollcall_core::{Classification, FaceRegion, RunContext};

const RECOGNIZED: Rgb<u8> = Rgb([0, 255, 0]);
const UNKNOWN: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: u32 = 2;
const LABEL_BAR_HEIGHT: u32 = 35;

/// A detected face with its classification from the latest processed frame.
#[derive(Debug, Clone)]
pub struct LabeledFace {
    pub region: FaceRegion,
    pub classification: Classification,
}

/// Text shown under a face box.
pub fn label(face: &Classification, ctx: &RunContext) -> String {
    match face {
        Classification::Known { student_id, name, .. } => {
            let mut label = format!("{name} ({student_id})");
            if ctx.is_marked(student_id) {
                label.push_str(" - Already marked");
            }
            label
        }
        Classification::Unknown => "Unknown".to_string(),
    }
}

pub fn color(face: &Classification) -> Rgb<u8> {
    if face.is_known() { RECOGNIZED } else { UNKNOWN }
}

/// Draw every face box and its filled label bar onto `frame`.
pub fn annotate(frame: &mut RgbImage, faces: &[LabeledFace]) {
    for face in faces {
        let color = color(&face.classification);
        let Some((left, top, right, bottom)) =
            clamp_box(&face.region, frame.width(), frame.height())
        else {
            continue;
        };

        for t in 0..BOX_THICKNESS {
            for x in left..=right {
                put(frame, x, top.saturating_add(t), color);
                put(frame, x, bottom.saturating_sub(t), color);
            }
            for y in top..=bottom {
                put(frame, left.saturating_add(t), y, color);
                put(frame, right.saturating_sub(t), y, color);
            }
        }

        let bar_top = bottom.saturating_sub(LABEL_BAR_HEIGHT).max(top);
        for y in bar_top..=bottom {
            for x in left..=right {
                put(frame, x, y, color);
            }
        }
    }
}

fn clamp_box(region: &FaceRegion, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }
    let clamp_x = |v: f32| v.max(0.0).min((width - 1) as f32) as u32;
    let clamp_y = |v: f32| v.max(0.0).min((height - 1) as f32) as u32;
    let (left, right) = (clamp_x(region.x), clamp_x(region.right()));
    let (top, bottom) = (clamp_y(region.y), clamp_y(region.bottom()));
    (left < right && top < bottom).then_some((left, top, right, bottom))
}

fn put(frame: &mut RgbImage, x: u32, y: u32, color: Rgb<u8>) {
    if x < frame.width() && y < frame.height() {
        frame.put_pixel(x, y, color);
    }
}
