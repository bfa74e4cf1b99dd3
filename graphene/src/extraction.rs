// THEORY:
// The `extraction` module drives the external scene-graph model. Inference is
// not done in-process: a Python script is launched for each triggering frame,
// writes its result as a JSON array to disk and exits. This module owns that
// request/response contract and nothing else.
//
// Key architectural principles:
// 1.  **Opaque Collaborator**: The model is a swappable program. The engine only
//     knows the command line it takes and the file it writes.
// 2.  **No Stale Reads**: The previous output file is deleted before each run,
//     so a script that exits cleanly without writing anything is reported as a
//     failure instead of silently replaying the last scene.
// 3.  **Uniform Failure**: Launch errors, non-zero exits, timeouts, unreadable
//     output and malformed JSON all surface as `ExtractionError`, which the loop
//     treats as "skip this frame, keep the scene".

use crate::adapters::{ExtractionAdapter, FrameRef};
use crate::core_modules::graph_file::parse_graph;
use crate::core_modules::triple::TripleSet;
use crate::error::ExtractionError;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// How to launch the external extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorConfig {
    /// Interpreter used to run the script.
    pub program: String,
    /// Root of the model checkout; holds the script and the checkpoint.
    pub model_dir: PathBuf,
    /// Script path, relative to `model_dir`.
    pub script: PathBuf,
    /// Checkpoint path, relative to `model_dir`.
    pub checkpoint: PathBuf,
    /// Inference backend selector passed through as `--device`.
    pub device: String,
    /// Where the script writes its JSON output.
    pub output_path: PathBuf,
    /// Maximum number of relationships the script reports.
    pub top_k: u32,
    /// Kill the script if it runs longer than this.
    pub timeout: Option<Duration>,
    /// Extra environment for the child process.
    pub env: Vec<(String, String)>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            model_dir: PathBuf::from("RelTR"),
            script: PathBuf::from("mkgraph.py"),
            checkpoint: PathBuf::from("ckpt/checkpoint0149.pth"),
            device: "cpu".to_string(),
            output_path: PathBuf::from("graph.json"),
            top_k: 5,
            timeout: None,
            // The model's MKL build needs the GNU threading layer.
            env: vec![("MKL_THREADING_LAYER".to_string(), "GNU".to_string())],
        }
    }
}

impl ExtractorConfig {
    /// The argument vector passed to `program` for one frame.
    pub fn arguments(&self, frame: &FrameRef) -> Vec<OsString> {
        vec![
            self.model_dir.join(&self.script).into_os_string(),
            "--img_path".into(),
            frame.path.clone().into_os_string(),
            "--device".into(),
            self.device.clone().into(),
            "--resume".into(),
            self.model_dir.join(&self.checkpoint).into_os_string(),
            "--export_path".into(),
            self.output_path.clone().into_os_string(),
            "--topk".into(),
            self.top_k.to_string().into(),
        ]
    }
}

/// Runs the external extractor as a child process, one frame at a time.
pub struct ProcessExtractor {
    config: ExtractorConfig,
}

impl ProcessExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    async fn run_process(&self, frame: &FrameRef) -> Result<(), ExtractionError> {
        let mut command = Command::new(&self.config.program);
        command
            .args(self.config.arguments(frame))
            .envs(self.config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %self.config.program, frame = frame.sequence, "launching extractor");
        let child = command.spawn().map_err(|source| ExtractionError::Spawn {
            program: self.config.program.clone(),
            source,
        })?;

        let waiting = child.wait_with_output();
        let output = match self.config.timeout {
            // Dropping the future on timeout kills the child (`kill_on_drop`).
            Some(limit) => tokio::time::timeout(limit, waiting)
                .await
                .map_err(|_| ExtractionError::TimedOut(limit))?,
            None => waiting.await,
        }
        .map_err(|source| ExtractionError::Spawn {
            program: self.config.program.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(ExtractionError::ProcessFailed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl ExtractionAdapter for ProcessExtractor {
    async fn extract(&mut self, frame: &FrameRef) -> Result<TripleSet, ExtractionError> {
        let output_path = &self.config.output_path;
        match tokio::fs::remove_file(output_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(ExtractionError::ReadOutput {
                    path: output_path.clone(),
                    source,
                });
            }
        }

        self.run_process(frame).await?;

        let json = tokio::fs::read_to_string(output_path)
            .await
            .map_err(|source| ExtractionError::ReadOutput {
                path: output_path.clone(),
                source,
            })?;
        let triples = parse_graph(&json)?;
        info!(frame = frame.sequence, relations = triples.len(), "scene graph extracted");
        Ok(triples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("graphene_{}_{}", std::process::id(), name))
    }

    #[test]
    fn arguments_follow_the_model_contract() {
        let config = ExtractorConfig::default();
        let frame = FrameRef::new(1, "snap.png");
        let args: Vec<String> = config
            .arguments(&frame)
            .into_iter()
            .map(|a| a.into_string().unwrap())
            .collect();

        let script = PathBuf::from("RelTR").join("mkgraph.py");
        let checkpoint = PathBuf::from("RelTR").join("ckpt/checkpoint0149.pth");
        assert_eq!(
            args,
            vec![
                script.to_string_lossy().to_string(),
                "--img_path".to_string(),
                "snap.png".to_string(),
                "--device".to_string(),
                "cpu".to_string(),
                "--resume".to_string(),
                checkpoint.to_string_lossy().to_string(),
                "--export_path".to_string(),
                "graph.json".to_string(),
                "--topk".to_string(),
                "5".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let mut extractor = ProcessExtractor::new(ExtractorConfig {
            program: "graphene-no-such-interpreter".to_string(),
            output_path: temp_path("spawn.json"),
            ..ExtractorConfig::default()
        });
        let err = extractor.extract(&FrameRef::new(0, "snap.png")).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_reported() {
        let mut extractor = ProcessExtractor::new(ExtractorConfig {
            program: "false".to_string(),
            output_path: temp_path("exit.json"),
            ..ExtractorConfig::default()
        });
        let err = extractor.extract(&FrameRef::new(0, "snap.png")).await.unwrap_err();
        assert!(matches!(err, ExtractionError::ProcessFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_exit_without_output_is_not_a_stale_read() {
        let output_path = temp_path("stale.json");
        std::fs::write(&output_path, "[]").unwrap();

        // `true` ignores its arguments and writes nothing.
        let mut extractor = ProcessExtractor::new(ExtractorConfig {
            program: "true".to_string(),
            output_path: output_path.clone(),
            ..ExtractorConfig::default()
        });
        let err = extractor.extract(&FrameRef::new(0, "snap.png")).await.unwrap_err();
        assert!(matches!(err, ExtractionError::ReadOutput { .. }));
        assert!(!output_path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_extractor_times_out() {
        // Ignores its arguments and never writes output.
        let script = temp_path("slow.sh");
        std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
        let mut extractor = ProcessExtractor::new(ExtractorConfig {
            program: "sh".to_string(),
            model_dir: script.parent().unwrap().to_path_buf(),
            script: PathBuf::from(script.file_name().unwrap()),
            output_path: temp_path("slow.json"),
            timeout: Some(Duration::from_millis(100)),
            ..ExtractorConfig::default()
        });
        let err = extractor.extract(&FrameRef::new(0, "snap.png")).await.unwrap_err();
        std::fs::remove_file(&script).ok();
        assert!(matches!(err, ExtractionError::TimedOut(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reads_graph_written_by_the_process() {
        let output_path = temp_path("ok.json");
        let script = temp_path("ok.sh");
        // Positional layout: $0 script, then --img_path ... --export_path <path> --topk k.
        std::fs::write(
            &script,
            concat!(
                "#!/bin/sh\n",
                "while [ \"$#\" -gt 0 ]; do\n",
                "  if [ \"$1\" = \"--export_path\" ]; then out=\"$2\"; fi\n",
                "  shift\n",
                "done\n",
                "cat > \"$out\" <<'JSON'\n",
                "[{\"subject\":{\"id\":\"cat\",\"xmin\":0,\"ymin\":0,\"xmax\":1,\"ymax\":1},",
                "\"predicate\":{\"id\":\"on\"},",
                "\"object\":{\"id\":\"sofa\",\"xmin\":0,\"ymin\":0,\"xmax\":2,\"ymax\":2}}]\n",
                "JSON\n",
            ),
        )
        .unwrap();

        let mut extractor = ProcessExtractor::new(ExtractorConfig {
            program: "sh".to_string(),
            model_dir: script.parent().unwrap().to_path_buf(),
            script: PathBuf::from(script.file_name().unwrap()),
            output_path: output_path.clone(),
            ..ExtractorConfig::default()
        });
        let triples = extractor.extract(&FrameRef::new(0, "snap.png")).await.unwrap();
        std::fs::remove_file(&script).ok();
        std::fs::remove_file(&output_path).ok();

        assert_eq!(triples.len(), 1);
        assert!(triples.contains(&crate::core_modules::triple::TripleKey::new("cat", "on", "sofa")));
    }
}
