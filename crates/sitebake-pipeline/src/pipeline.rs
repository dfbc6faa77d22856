//! The build → preview → prerender → stop sequence.

use std::fmt;
use std::io;

use async_trait::async_trait;
use sitebake_server::ReadinessPoller;

use crate::process::{BackgroundProcess, Launcher, OutputMode, ProcessExit, ProcessSpec};

/// Preview server URL used when none is configured.
pub const DEFAULT_PREVIEW_URL: &str = "http://localhost:4173";

/// Readiness probes before the preview server is given up on.
pub const DEFAULT_MAX_READY_ATTEMPTS: u32 = 30;

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Building,
    Previewing,
    Prerendering,
    Stopped,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Building => "Build",
            Stage::Previewing => "Preview server",
            Stage::Prerendering => "Prerender",
            Stage::Stopped => "Teardown",
        })
    }
}

/// Errors that fail the pipeline. Each names the stage it happened in.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{stage} could not be started: {source}")]
    Spawn {
        stage: Stage,
        #[source]
        source: io::Error,
    },

    #[error("{stage} failed with {exit}")]
    StepFailed { stage: Stage, exit: ProcessExit },

    #[error("Preview server failed to start: {url} not ready after {attempts} attempts")]
    PreviewNotReady { url: String, attempts: u32 },
}

impl PipelineError {
    /// The stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Spawn { stage, .. } | PipelineError::StepFailed { stage, .. } => *stage,
            PipelineError::PreviewNotReady { .. } => Stage::Previewing,
        }
    }
}

/// Checks whether a server is answering.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// `true` once `url` answers, `false` if `max_attempts` probes all fail.
    async fn wait_until_ready(&self, url: &str, max_attempts: u32) -> bool;
}

#[async_trait]
impl ReadinessProbe for ReadinessPoller {
    async fn wait_until_ready(&self, url: &str, max_attempts: u32) -> bool {
        ReadinessPoller::wait_until_ready(self, url, max_attempts).await
    }
}

/// Commands and limits for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bundler command
    pub build: ProcessSpec,

    /// Preview server command
    pub preview: ProcessSpec,

    /// Prerender command
    pub prerender: ProcessSpec,

    /// URL probed for preview readiness
    pub preview_url: String,

    /// Readiness probe budget
    pub max_ready_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            build: ProcessSpec::shell("build", "npm run build"),
            preview: ProcessSpec::shell("preview", "npm run preview").output(OutputMode::Logged),
            prerender: ProcessSpec::new("prerender", "sitebake").arg("prerender"),
            preview_url: DEFAULT_PREVIEW_URL.to_string(),
            max_ready_attempts: DEFAULT_MAX_READY_ATTEMPTS,
        }
    }
}

/// Runs the static build end to end.
pub struct Pipeline<L, P> {
    config: PipelineConfig,
    launcher: L,
    probe: P,
}

impl<L: Launcher, P: ReadinessProbe> Pipeline<L, P> {
    /// Create a new pipeline.
    pub fn new(config: PipelineConfig, launcher: L, probe: P) -> Self {
        Self {
            config,
            launcher,
            probe,
        }
    }

    /// Run every stage.
    ///
    /// Once the preview server has been started it is stopped again on every path
    /// out of this function.
    pub async fn run(&self) -> Result<(), PipelineError> {
        tracing::info!("Building website for static generation");

        tracing::info!("Step 1/4: running {}", self.config.build);
        self.run_step(Stage::Building, &self.config.build).await?;
        tracing::info!("Build complete");

        tracing::info!("Step 2/4: starting preview server");
        let preview = self
            .launcher
            .spawn(&self.config.preview)
            .await
            .map_err(|source| PipelineError::Spawn {
                stage: Stage::Previewing,
                source,
            })?;

        let url = &self.config.preview_url;
        let attempts = self.config.max_ready_attempts;
        if !self.probe.wait_until_ready(url, attempts).await {
            stop_preview(preview).await;
            return Err(PipelineError::PreviewNotReady {
                url: url.clone(),
                attempts,
            });
        }
        tracing::info!("Preview server running on {}", url);

        tracing::info!("Step 3/4: prerendering routes");
        let prerendered = self
            .run_step(Stage::Prerendering, &self.config.prerender)
            .await;

        tracing::info!("Step 4/4: stopping preview server");
        stop_preview(preview).await;

        prerendered?;
        tracing::info!("Static build complete");
        Ok(())
    }

    async fn run_step(&self, stage: Stage, spec: &ProcessSpec) -> Result<(), PipelineError> {
        let exit = self
            .launcher
            .run(spec)
            .await
            .map_err(|source| PipelineError::Spawn { stage, source })?;

        if exit.success() {
            Ok(())
        } else {
            Err(PipelineError::StepFailed { stage, exit })
        }
    }
}

async fn stop_preview<B: BackgroundProcess>(preview: B) {
    match preview.terminate().await {
        Ok(()) => tracing::info!("Preview server stopped"),
        Err(e) => tracing::warn!("Failed to stop preview server: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;

    type Events = Arc<Mutex<Vec<String>>>;

    #[derive(Default)]
    struct FakeLauncher {
        /// Exit codes by label; unlisted commands exit 0
        exits: HashMap<String, i32>,
        /// Labels that fail to spawn
        unspawnable: Vec<String>,
        events: Events,
    }

    struct FakeProcess {
        label: String,
        events: Events,
    }

    struct FakeProbe {
        ready: bool,
        events: Events,
    }

    impl FakeLauncher {
        fn exiting(label: &str, code: i32) -> Self {
            let mut launcher = Self::default();
            launcher.exits.insert(label.to_string(), code);
            launcher
        }

        fn push(&self, event: String) -> io::Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }

        fn check_spawnable(&self, spec: &ProcessSpec) -> io::Result<()> {
            if self.unspawnable.contains(&spec.label) {
                return Err(io::Error::new(io::ErrorKind::NotFound, "command not found"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Launcher for FakeLauncher {
        type Process = FakeProcess;

        async fn run(&self, spec: &ProcessSpec) -> io::Result<ProcessExit> {
            self.check_spawnable(spec)?;
            self.push(format!("run {}", spec.label))?;
            Ok(ProcessExit::code(
                self.exits.get(&spec.label).copied().unwrap_or(0),
            ))
        }

        async fn spawn(&self, spec: &ProcessSpec) -> io::Result<FakeProcess> {
            self.check_spawnable(spec)?;
            self.push(format!("spawn {}", spec.label))?;
            Ok(FakeProcess {
                label: spec.label.clone(),
                events: Arc::clone(&self.events),
            })
        }
    }

    #[async_trait]
    impl BackgroundProcess for FakeProcess {
        async fn terminate(self) -> io::Result<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("terminate {}", self.label));
            Ok(())
        }
    }

    #[async_trait]
    impl ReadinessProbe for FakeProbe {
        async fn wait_until_ready(&self, url: &str, max_attempts: u32) -> bool {
            self.events
                .lock()
                .unwrap()
                .push(format!("probe {} x{}", url, max_attempts));
            self.ready
        }
    }

    fn pipeline(
        launcher: FakeLauncher,
        ready: bool,
    ) -> (Pipeline<FakeLauncher, FakeProbe>, Events) {
        let events = Arc::clone(&launcher.events);
        let probe = FakeProbe {
            ready,
            events: Arc::clone(&events),
        };
        (Pipeline::new(PipelineConfig::default(), launcher, probe), events)
    }

    fn events(events: &Events) -> Vec<String> {
        events.lock().unwrap().clone()
    }

    fn count(events: &Events, event: &str) -> usize {
        events.lock().unwrap().iter().filter(|e| *e == event).count()
    }

    #[tokio::test]
    async fn runs_stages_in_order() {
        let (pipeline, log) = pipeline(FakeLauncher::default(), true);

        pipeline.run().await.unwrap();

        assert_eq!(
            events(&log),
            vec![
                "run build",
                "spawn preview",
                "probe http://localhost:4173 x30",
                "run prerender",
                "terminate preview",
            ]
        );
    }

    #[tokio::test]
    async fn failed_build_never_starts_preview() {
        let (pipeline, log) = pipeline(FakeLauncher::exiting("build", 1), true);

        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::StepFailed {
                stage: Stage::Building,
                exit: ProcessExit { code: Some(1) },
            }
        ));
        assert_eq!(err.to_string(), "Build failed with code 1");
        assert_eq!(events(&log), vec!["run build"]);
    }

    #[tokio::test]
    async fn failed_prerender_still_stops_preview_once() {
        let (pipeline, log) = pipeline(FakeLauncher::exiting("prerender", 1), true);

        let err = pipeline.run().await.unwrap_err();

        assert_eq!(err.stage(), Stage::Prerendering);
        assert_eq!(err.to_string(), "Prerender failed with code 1");
        assert_eq!(count(&log, "terminate preview"), 1);
        assert_eq!(events(&log).last().map(String::as_str), Some("terminate preview"));
    }

    #[tokio::test]
    async fn successful_prerender_stops_preview_once() {
        let (pipeline, log) = pipeline(FakeLauncher::default(), true);

        pipeline.run().await.unwrap();

        assert_eq!(count(&log, "terminate preview"), 1);
    }

    #[tokio::test]
    async fn unspawnable_prerender_still_stops_preview() {
        let launcher = FakeLauncher {
            unspawnable: vec!["prerender".to_string()],
            ..Default::default()
        };
        let (pipeline, log) = pipeline(launcher, true);

        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Spawn {
                stage: Stage::Prerendering,
                ..
            }
        ));
        assert_eq!(count(&log, "terminate preview"), 1);
    }

    #[tokio::test]
    async fn unready_preview_is_stopped_and_prerender_skipped() {
        let (pipeline, log) = pipeline(FakeLauncher::default(), false);

        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, PipelineError::PreviewNotReady { attempts: 30, .. }));
        assert!(err.to_string().starts_with("Preview server failed to start"));
        assert_eq!(
            events(&log),
            vec![
                "run build",
                "spawn preview",
                "probe http://localhost:4173 x30",
                "terminate preview",
            ]
        );
    }

    #[tokio::test]
    async fn unspawnable_build_fails_in_build_stage() {
        let launcher = FakeLauncher {
            unspawnable: vec!["build".to_string()],
            ..Default::default()
        };
        let (pipeline, log) = pipeline(launcher, true);

        let err = pipeline.run().await.unwrap_err();

        assert_eq!(err.stage(), Stage::Building);
        assert!(events(&log).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_real_processes() {
        use crate::process::SystemLauncher;
        use std::time::Duration;

        let temp = tempfile::tempdir().unwrap();
        let marker = temp.path().join("prerendered");

        let config = PipelineConfig {
            build: ProcessSpec::shell("build", "true"),
            preview: ProcessSpec::shell("preview", "sleep 30").output(OutputMode::Logged),
            prerender: ProcessSpec::shell(
                "prerender",
                &format!("touch '{}'", marker.display()),
            ),
            preview_url: "http://localhost:4173".to_string(),
            max_ready_attempts: 1,
        };
        let probe = FakeProbe {
            ready: true,
            events: Events::default(),
        };
        let launcher = SystemLauncher {
            grace: Duration::from_secs(2),
        };

        Pipeline::new(config, launcher, probe).run().await.unwrap();

        assert!(marker.exists());
    }
}
