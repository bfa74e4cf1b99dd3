// THEORY:
// The `pipeline` module is the top-level API of the engine. `ChangeLoop` wires
// the three adapters around a `SceneState` and runs the cycle
//
//     capture -> extract -> diff -> report -> commit -> render
//
// once per detected motion, forever.
//
// Key architectural principles:
// 1.  **Owned State**: The loop owns its `SceneState` by value. It is handed in
//     at construction and handed back by `into_scene`; nothing else can touch it
//     while the loop runs, and `commit` is the only mutation.
// 2.  **Consistency First**: The scene is only ever replaced by a complete,
//     validated observation. A failed extraction aborts the cycle before the
//     commit, so the state keeps its last good value.
// 3.  **Graded Failure**: Losing the frame source is fatal; a bad extraction
//     skips one cycle; a failed render is logged and otherwise ignored, because
//     the display is never the source of truth.

use crate::adapters::{AcquisitionAdapter, ExtractionAdapter, FrameRef, RenderAdapter};
use crate::core_modules::scene_state::{ChangeKind, SceneDiff, SceneState};
use crate::error::{AcquisitionError, CycleError, RenderError};
use tracing::{info, warn};

/// Where the loop currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Blocked on the acquisition adapter, waiting for motion.
    Waiting,
    /// Extracting, diffing, committing or rendering a captured frame.
    Processing,
}

/// The outcome of one successful cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub frame: FrameRef,
    /// What changed relative to the state before this cycle.
    pub diff: SceneDiff,
    /// Number of relationships in the scene after the commit.
    pub scene_len: usize,
    /// Set when rendering failed; the commit stands regardless.
    pub render_error: Option<RenderError>,
}

/// Drives acquisition, extraction, diffing and rendering around one scene.
pub struct ChangeLoop<A, E, R> {
    acquisition: A,
    extraction: E,
    renderer: R,
    scene: SceneState,
    state: LoopState,
    cycles: u64,
}

impl<A, E, R> ChangeLoop<A, E, R>
where
    A: AcquisitionAdapter,
    E: ExtractionAdapter,
    R: RenderAdapter,
{
    pub fn new(acquisition: A, extraction: E, renderer: R, scene: SceneState) -> Self {
        Self {
            acquisition,
            extraction,
            renderer,
            scene,
            state: LoopState::Waiting,
            cycles: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    /// Number of cycles that reached the commit.
    pub fn committed_cycles(&self) -> u64 {
        self.cycles
    }

    /// Stops the loop and returns the accepted scene.
    pub fn into_scene(self) -> SceneState {
        self.scene
    }

    /// Runs a single cycle. The loop is back in `Waiting` when this returns,
    /// whatever the outcome.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let result = self.process().await;
        self.state = LoopState::Waiting;
        result
    }

    async fn process(&mut self) -> Result<CycleReport, CycleError> {
        // --- 1. Acquisition (blocks until motion) ---
        let frame = self.acquisition.capture().await?;
        self.state = LoopState::Processing;
        info!(frame = frame.sequence, "change detected, generating scene graph");

        // --- 2. Extraction ---
        let observed = self
            .extraction
            .extract(&frame)
            .await
            .map_err(|source| CycleError::Extraction {
                frame: frame.sequence,
                source,
            })?;

        // --- 3. Diff ---
        let diff = self.scene.diff(&observed);

        // --- 4. Report ---
        report(&diff);

        // --- 5. Commit ---
        self.scene.commit(observed);
        self.cycles += 1;

        // --- 6. Render ---
        let render_error = match self.renderer.render(self.scene.snapshot(), &frame).await {
            Ok(()) => None,
            Err(e) => {
                warn!(frame = frame.sequence, error = %e, "render failed, scene state kept");
                Some(e)
            }
        };

        Ok(CycleReport {
            frame,
            diff,
            scene_len: self.scene.len(),
            render_error,
        })
    }

    /// Runs cycles until acquisition fails, handing every outcome to `observer`.
    /// Extraction failures are reported and the loop carries on waiting.
    /// Returns the fatal acquisition error.
    pub async fn run<F>(&mut self, mut observer: F) -> AcquisitionError
    where
        F: FnMut(Result<&CycleReport, &CycleError>),
    {
        loop {
            match self.run_cycle().await {
                Ok(report) => observer(Ok(&report)),
                Err(error) => {
                    observer(Err(&error));
                    match error {
                        CycleError::Acquisition(fatal) => return fatal,
                        skipped => warn!(error = %skipped, "cycle skipped, scene state kept"),
                    }
                }
            }
        }
    }
}

/// Emits one structured event per change.
fn report(diff: &SceneDiff) {
    for event in diff.events() {
        let key = &event.key;
        match event.kind {
            ChangeKind::Dropped => info!(
                subject = %key.subject,
                predicate = %key.predicate,
                object = %key.object,
                "{key} has dropped out"
            ),
            ChangeKind::Appeared => info!(
                subject = %key.subject,
                predicate = %key.predicate,
                object = %key.object,
                "{key} has popped up"
            ),
        }
    }
}
