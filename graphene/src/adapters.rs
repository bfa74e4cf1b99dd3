//! The three seams between the change loop and the outside world.
//!
//! Each adapter is owned by exactly one [`ChangeLoop`](crate::pipeline::ChangeLoop)
//! and is called strictly in sequence, so the methods take `&mut self` and need
//! no internal locking.

#![allow(async_fn_in_trait)]

use crate::core_modules::triple::TripleSet;
use crate::error::{AcquisitionError, ExtractionError, RenderError};
use std::path::PathBuf;
use std::time::Instant;

/// A captured frame, already written to disk for the extractor to read.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRef {
    /// Monotonically increasing per acquisition source.
    pub sequence: u64,
    pub path: PathBuf,
    pub captured_at: Instant,
}

impl FrameRef {
    pub fn new(sequence: u64, path: impl Into<PathBuf>) -> Self {
        Self {
            sequence,
            path: path.into(),
            captured_at: Instant::now(),
        }
    }
}

/// Produces frames. `capture` does not return until motion has been seen; its
/// return is the trigger for a new cycle.
pub trait AcquisitionAdapter {
    async fn capture(&mut self) -> Result<FrameRef, AcquisitionError>;
}

/// Turns a frame into a complete, validated set of triples.
pub trait ExtractionAdapter {
    async fn extract(&mut self, frame: &FrameRef) -> Result<TripleSet, ExtractionError>;
}

/// Shows the accepted scene on top of the frame it was extracted from.
pub trait RenderAdapter {
    async fn render(&mut self, scene: &TripleSet, frame: &FrameRef) -> Result<(), RenderError>;
}

/// Renders to two surfaces. Both are always attempted; the first failure is returned.
impl<A: RenderAdapter, B: RenderAdapter> RenderAdapter for (A, B) {
    async fn render(&mut self, scene: &TripleSet, frame: &FrameRef) -> Result<(), RenderError> {
        let first = self.0.render(scene, frame).await;
        let second = self.1.render(scene, frame).await;
        first.and(second)
    }
}

/// A renderer that draws nothing, for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl RenderAdapter for NullRenderer {
    async fn render(&mut self, _scene: &TripleSet, _frame: &FrameRef) -> Result<(), RenderError> {
        Ok(())
    }
}
