//! Graphene tester: watches a camera (or a video file), runs the scene-graph
//! extractor whenever something moves and logs what appeared and what dropped
//! out of the scene.

use anyhow::Context;
use clap::Parser;
use graphene::{
    AcquisitionAdapter, ChangeLoop, ExtractionAdapter, ExtractorConfig, MotionConfig,
    ProcessExtractor, RenderAdapter, SceneState,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

mod camera;
mod overlay;

use camera::{CameraAcquisition, Source};
use overlay::OpencvOverlayRenderer;

#[derive(Parser)]
#[command(name = "graphene_tester")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Camera index to open
    #[arg(long, env = "GRAPHENE_CAMERA", default_value = "0")]
    camera: i32,

    /// Read frames from a video file instead of a camera
    #[arg(short, long, env = "GRAPHENE_INPUT")]
    input: Option<String>,

    /// Mean luminance change (0-255) for a chunk to count as changed
    #[arg(long, env = "GRAPHENE_THRESHOLD", default_value = "5.0")]
    threshold: f64,

    /// Changed chunks needed to trigger a cycle
    #[arg(long, env = "GRAPHENE_MIN_CHUNKS", default_value = "1")]
    min_chunks: usize,

    /// Side of a square motion chunk, in pixels
    #[arg(long, env = "GRAPHENE_CHUNK_SIZE", default_value = "16")]
    chunk_size: u32,

    /// Frames to settle on before motion can trigger
    #[arg(long, env = "GRAPHENE_WARMUP", default_value = "5")]
    warmup: u32,

    /// Interpreter for the extractor script
    #[arg(long, env = "GRAPHENE_PYTHON", default_value = "python")]
    python: String,

    /// Model checkout holding mkgraph.py and the checkpoint
    #[arg(long, env = "GRAPHENE_MODEL_DIR", default_value = "RelTR")]
    model_dir: PathBuf,

    /// Inference device passed to the model
    #[arg(long, env = "GRAPHENE_DEVICE", default_value = "cpu")]
    device: String,

    /// Relationships reported per frame
    #[arg(long, env = "GRAPHENE_TOPK", default_value = "5")]
    top_k: u32,

    /// Where the extractor writes its JSON
    #[arg(long, env = "GRAPHENE_GRAPH", default_value = "graph.json")]
    graph: PathBuf,

    /// Where the triggering frame is saved for the extractor
    #[arg(long, env = "GRAPHENE_SNAPSHOT", default_value = "snap.png")]
    snapshot: PathBuf,

    /// Kill the extractor after this many seconds
    #[arg(long, env = "GRAPHENE_TIMEOUT")]
    timeout_secs: Option<u64>,

    /// Show the overlay in a window
    #[arg(long, env = "GRAPHENE_PREVIEW")]
    preview: bool,

    /// Write the overlay to this image after every cycle
    #[arg(short, long, env = "GRAPHENE_OUTPUT")]
    output: Option<PathBuf>,

    /// Serve the web viewer on this address (web builds only)
    #[cfg_attr(not(feature = "web"), allow(dead_code))]
    #[arg(long, env = "GRAPHENE_BIND", default_value = "127.0.0.1:3001")]
    bind: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

impl Cli {
    fn source(&self) -> Source {
        match &self.input {
            Some(path) => Source::File(path.clone()),
            None => Source::Device(self.camera),
        }
    }

    fn motion(&self) -> MotionConfig {
        MotionConfig {
            chunk_width: self.chunk_size,
            chunk_height: self.chunk_size,
            threshold: self.threshold,
            min_changed_chunks: self.min_chunks,
            warmup_frames: self.warmup,
        }
    }

    fn extractor(&self) -> ExtractorConfig {
        ExtractorConfig {
            program: self.python.clone(),
            model_dir: self.model_dir.clone(),
            device: self.device.clone(),
            output_path: self.graph.clone(),
            top_k: self.top_k,
            timeout: self.timeout_secs.map(Duration::from_secs),
            ..ExtractorConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_ansi(!cli.no_color)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let acquisition = CameraAcquisition::open(&cli.source(), cli.motion(), cli.snapshot.clone())
        .context("failed to open the frame source")?;
    let extraction = ProcessExtractor::new(cli.extractor());
    let renderer = OpencvOverlayRenderer::new(cli.output.clone(), cli.preview);

    #[cfg(feature = "web")]
    let renderer = {
        use graphene_visualizer::{BusRenderer, FrameBus, ServerConfig, start_server};

        let bus = FrameBus::new(8);
        let _server = start_server(bus.clone(), ServerConfig { bind_addr: cli.bind.clone() }).await?;
        (renderer, BusRenderer::new(bus))
    };

    drive(acquisition, extraction, renderer).await
}

/// Runs the change loop until the frame source gives out.
async fn drive<A, E, R>(acquisition: A, extraction: E, renderer: R) -> anyhow::Result<()>
where
    A: AcquisitionAdapter,
    E: ExtractionAdapter,
    R: RenderAdapter,
{
    let mut change_loop = ChangeLoop::new(acquisition, extraction, renderer, SceneState::new());
    info!("waiting for motion");

    let fatal = change_loop
        .run(|outcome| match outcome {
            Ok(report) => {
                if let Some(e) = &report.render_error {
                    warn!(frame = report.frame.sequence, error = %e, "overlay not drawn");
                }
                info!(
                    frame = report.frame.sequence,
                    appeared = report.diff.appeared.len(),
                    dropped = report.diff.disappeared.len(),
                    relations = report.scene_len,
                    "scene updated"
                );
            }
            Err(e) if e.is_fatal() => error!(error = %e, "frame source lost"),
            Err(_) => {}
        })
        .await;

    let scene = change_loop.into_scene();
    info!(relations = scene.len(), "stopped");
    match fatal {
        graphene::AcquisitionError::EndOfStream => Ok(()),
        other => Err(other).context("acquisition failed"),
    }
}
