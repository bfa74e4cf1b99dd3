// THEORY:
// This file is the entry point for the `graphene` library crate. Graphene
// watches a scene, and every time something moves it asks an external
// scene-graph model which relationships ("person near chair") are visible,
// compares the answer with what it believed before, reports what appeared and
// what dropped out, and hands the new picture to a renderer.
//
// The public surface is the `ChangeLoop` in `pipeline` together with the three
// adapter traits it is generic over. The data model (`Triple`, `TripleSet`,
// `SceneState`) and the supporting building blocks (graph-file parsing, motion
// gating, frame export, overlay layout) live in `core_modules` and are
// re-exported here for binaries that implement their own adapters.

pub mod adapters;
pub mod core_modules;
pub mod error;
pub mod extraction;
pub mod pipeline;

pub use adapters::{AcquisitionAdapter, ExtractionAdapter, FrameRef, NullRenderer, RenderAdapter};
pub use core_modules::motion::{MotionConfig, MotionGate};
pub use core_modules::overlay::{OverlayItem, layout};
pub use core_modules::scene_state::{ChangeEvent, ChangeKind, SceneDiff, SceneState};
pub use core_modules::triple::{BoundingBox, Triple, TripleKey, TripleSet};
pub use error::{AcquisitionError, CycleError, ExtractionError, MalformedTripleError, RenderError};
pub use extraction::{ExtractorConfig, ProcessExtractor};
pub use pipeline::{ChangeLoop, CycleReport, LoopState};
