//! rollcall-hw: Webcam capture and face-crop artifacts.
//!
//! Provides V4L2-based camera access delivering RGB frames, and the
//! crop/naming rules for the images saved at registration.

pub mod artifact;
pub mod camera;
pub mod frame;

pub use artifact::{save_face_crop, Sequence};
pub use camera::{Camera, CameraError, FrameSource, FrameStream, PixelFormat};
pub use frame::Frame;
