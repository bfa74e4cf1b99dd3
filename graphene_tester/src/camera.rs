use graphene::core_modules::frame_io::{rgba_from_raw, save_png};
use graphene::{AcquisitionAdapter, AcquisitionError, FrameRef, MotionConfig, MotionGate};
use image::RgbaImage;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::path::PathBuf;
use tracing::{debug, info};

/// Where frames come from.
#[derive(Debug, Clone)]
pub enum Source {
    Device(i32),
    File(String),
}

/// Reads frames from a camera or a video file and hands one over, written to
/// `snapshot_path`, each time the motion gate fires.
pub struct CameraAcquisition {
    capture: VideoCapture,
    gate: MotionGate,
    snapshot_path: PathBuf,
    sequence: u64,
}

impl CameraAcquisition {
    pub fn open(source: &Source, motion: MotionConfig, snapshot_path: PathBuf) -> Result<Self, AcquisitionError> {
        let opened = match source {
            Source::Device(index) => VideoCapture::new(*index, videoio::CAP_ANY),
            Source::File(path) => VideoCapture::from_file(path, videoio::CAP_ANY),
        };
        let capture = opened.map_err(|e| AcquisitionError::DeviceUnavailable(e.to_string()))?;
        let is_open = capture
            .is_opened()
            .map_err(|e| AcquisitionError::DeviceUnavailable(e.to_string()))?;
        if !is_open {
            return Err(AcquisitionError::DeviceUnavailable(format!("{source:?} could not be opened")));
        }
        info!(?source, snapshot = %snapshot_path.display(), "frame source opened");

        Ok(Self {
            capture,
            gate: MotionGate::new(motion),
            snapshot_path,
            sequence: 0,
        })
    }

    fn wait_for_motion(&mut self) -> Result<FrameRef, AcquisitionError> {
        let mut frame = Mat::default();
        loop {
            let grabbed = self
                .capture
                .read(&mut frame)
                .map_err(|e| AcquisitionError::Read(e.to_string()))?;
            if !grabbed || frame.empty() {
                return Err(AcquisitionError::EndOfStream);
            }

            let rgba = to_rgba(&frame)?;
            if !self.gate.observe(&rgba) {
                continue;
            }

            save_png(&self.snapshot_path, &rgba).map_err(|e| AcquisitionError::Export {
                path: self.snapshot_path.clone(),
                reason: e.to_string(),
            })?;
            self.sequence += 1;
            debug!(frame = self.sequence, "motion detected");
            return Ok(FrameRef::new(self.sequence, &self.snapshot_path));
        }
    }
}

impl AcquisitionAdapter for CameraAcquisition {
    async fn capture(&mut self) -> Result<FrameRef, AcquisitionError> {
        // The read loop blocks; keep the other runtime tasks (the web viewer) moving.
        tokio::task::block_in_place(|| self.wait_for_motion())
    }
}

/// Converts an OpenCV BGR frame into the RGBA buffer the motion gate reads.
fn to_rgba(frame: &Mat) -> Result<RgbaImage, AcquisitionError> {
    let read_error = |e: opencv::Error| AcquisitionError::Read(e.to_string());

    let mut rgba = Mat::default();
    imgproc::cvt_color(frame, &mut rgba, imgproc::COLOR_BGR2RGBA, 0).map_err(read_error)?;
    let (width, height) = (rgba.cols() as u32, rgba.rows() as u32);
    let buffer = rgba.data_bytes().map_err(read_error)?.to_vec();

    rgba_from_raw(width, height, buffer)
        .ok_or_else(|| AcquisitionError::Read(format!("unexpected buffer size for {width}x{height} frame")))
}
