//! Fans a job out into one encode per ladder rung and folds the results back
//! into a single outcome.

use std::path::PathBuf;
use std::sync::Arc;

use hlsladder_core::{JobState, ResolutionSpec, StreamMode, StreamStatus, validate_ladder};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::engine::{EncodeEngine, FfmpegEngine};
use crate::layout::{Job, OutputLayout};
use crate::manifest::build_manifest;
use crate::runner::{StreamResult, TaskRunner, remove_stale};
use crate::{TranscodeError, TranscoderConfig};

/// Successful job: every rendition encoded.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: String,
    pub mode: StreamMode,
    /// One entry per ladder rung, in ladder order.
    pub streams: Vec<StreamResult>,
    /// Set for adaptive jobs only.
    pub master_url: Option<String>,
}

pub struct JobOrchestrator {
    config: Arc<TranscoderConfig>,
    layout: OutputLayout,
    runner: TaskRunner,
}

impl JobOrchestrator {
    pub fn new(config: TranscoderConfig, engine: Arc<dyn EncodeEngine>) -> Self {
        let layout = OutputLayout::new(&config.output_root, &config.base_url);
        let runner = TaskRunner::new(engine, layout.clone(), config.task_timeout());
        Self {
            config: Arc::new(config),
            layout,
            runner,
        }
    }

    /// Orchestrator backed by the configured ffmpeg binary.
    pub fn with_ffmpeg(config: TranscoderConfig) -> Self {
        let engine = Arc::new(FfmpegEngine::new(&config.ffmpeg_path));
        Self::new(config, engine)
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Run `job` against the configured ladder.
    pub async fn run(&self, job: &Job, mode: StreamMode) -> Result<JobReport, TranscodeError> {
        self.run_job(job, &self.config.ladder, mode).await
    }

    /// Encode every rung of `ladder` concurrently and wait for all of them.
    ///
    /// The job is all-or-nothing: if any rendition fails, the first failure
    /// observed becomes the job's error and no master playlist is written.
    /// Files of renditions that did succeed are left on disk.
    pub async fn run_job(
        &self,
        job: &Job,
        ladder: &[ResolutionSpec],
        mode: StreamMode,
    ) -> Result<JobReport, TranscodeError> {
        check_source(job).await?;
        validate_ladder(ladder)?;

        let mut tracker = StateTracker::new(&job.id);
        match self.fan_out_and_collect(job, ladder, mode, &mut tracker).await {
            Ok(report) => {
                tracker.advance(JobState::Completed);
                Ok(report)
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "transcode job failed");
                tracker.advance(JobState::Failed);
                Err(e)
            }
        }
    }

    async fn fan_out_and_collect(
        &self,
        job: &Job,
        ladder: &[ResolutionSpec],
        mode: StreamMode,
        tracker: &mut StateTracker,
    ) -> Result<JobReport, TranscodeError> {
        // Created: skeleton first, so no encode starts against a missing directory.
        self.layout.ensure_job_dir(&job.id).await?;
        // A master from an earlier run must not outlive a failed rerun.
        remove_stale(&self.layout.master_path(&job.id)).await?;
        let mut dirs = Vec::with_capacity(ladder.len());
        for res in ladder {
            dirs.push(self.layout.ensure_resolution_dir(&job.id, &res.label).await?);
        }

        let segment_secs = self.config.segment_secs(mode);
        let mut tasks = JoinSet::new();
        for (index, (res, dir)) in ladder.iter().zip(dirs).enumerate() {
            let runner = self.runner.clone();
            let job_id = job.id.clone();
            let source = job.source_path.clone();
            let res = res.clone();
            tasks.spawn(async move {
                let result = runner
                    .run_task(&job_id, &source, &res, &dir, segment_secs)
                    .await;
                (index, result)
            });
        }
        tracker.advance(JobState::FannedOut);
        info!(job_id = %job.id, tasks = ladder.len(), %mode, segment_secs, "encodes launched");

        tracker.advance(JobState::Aggregating);
        let mut slots: Vec<Option<StreamResult>> = vec![None; ladder.len()];
        let mut first_failure: Option<TranscodeError> = None;
        let mut join_failure: Option<String> = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if let StreamStatus::Failed(message) = &result.status {
                        if first_failure.is_none() {
                            first_failure = Some(TranscodeError::EncodeFailed {
                                label: result.resolution.label.clone(),
                                message: message.clone(),
                            });
                            if self.config.cancel_on_failure && !tasks.is_empty() {
                                warn!(job_id = %job.id, remaining = tasks.len(), "cancelling sibling encodes");
                                tasks.abort_all();
                            }
                        }
                    }
                    slots[index] = Some(result);
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "encode task panicked");
                    join_failure.get_or_insert_with(|| e.to_string());
                }
            }
        }

        if let Some(e) = first_failure {
            return Err(e);
        }

        let mut streams = Vec::with_capacity(slots.len());
        for (res, slot) in ladder.iter().zip(slots) {
            match slot {
                Some(result) => streams.push(result),
                None => {
                    return Err(TranscodeError::TaskAborted {
                        label: res.label.clone(),
                        message: join_failure
                            .clone()
                            .unwrap_or_else(|| "task was cancelled".into()),
                    });
                }
            }
        }

        let master_url = match mode {
            StreamMode::Simple => None,
            StreamMode::Adaptive => Some(self.write_master(&job.id, &streams).await?),
        };

        Ok(JobReport {
            job_id: job.id.clone(),
            mode,
            streams,
            master_url,
        })
    }

    async fn write_master(
        &self,
        job_id: &str,
        streams: &[StreamResult],
    ) -> Result<String, TranscodeError> {
        let path: PathBuf = self.layout.master_path(job_id);
        tokio::fs::write(&path, build_manifest(streams)).await?;
        info!(job_id, path = %path.display(), variants = streams.len(), "master playlist written");
        Ok(self.layout.master_url(job_id))
    }
}

async fn check_source(job: &Job) -> Result<(), TranscodeError> {
    if job.source_path.as_os_str().is_empty() {
        return Err(TranscodeError::InvalidInput("no source file supplied".into()));
    }
    match tokio::fs::metadata(&job.source_path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(TranscodeError::InvalidInput(format!(
            "source {} is not a file",
            job.source_path.display()
        ))),
        Err(e) => Err(TranscodeError::InvalidInput(format!(
            "source {} is not readable: {e}",
            job.source_path.display()
        ))),
    }
}

/// Logs job state changes and guards against illegal ones.
struct StateTracker {
    job_id: String,
    state: JobState,
}

impl StateTracker {
    fn new(job_id: &str) -> Self {
        info!(job_id, state = %JobState::Created, "transcode job created");
        Self {
            job_id: job_id.to_string(),
            state: JobState::Created,
        }
    }

    fn advance(&mut self, next: JobState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal job transition {} -> {}",
            self.state,
            next
        );
        info!(job_id = %self.job_id, from = %self.state, to = %next, "job state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EncodeRequest;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Barrier;

    /// Writes a playlist and one segment, optionally after a delay or not at all.
    #[derive(Default)]
    struct FakeEngine {
        delays: HashMap<String, Duration>,
        fail: HashSet<String>,
        barrier: Option<Barrier>,
        calls: AtomicUsize,
    }

    impl FakeEngine {
        fn delay(mut self, label: &str, ms: u64) -> Self {
            self.delays
                .insert(label.to_string(), Duration::from_millis(ms));
            self
        }

        fn failing(mut self, label: &str) -> Self {
            self.fail.insert(label.to_string());
            self
        }
    }

    #[async_trait]
    impl EncodeEngine for FakeEngine {
        async fn encode(&self, request: &EncodeRequest) -> Result<(), TranscodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            let label = &request.resolution.label;
            if let Some(delay) = self.delays.get(label) {
                tokio::time::sleep(*delay).await;
            }
            if self.fail.contains(label) {
                return Err(TranscodeError::EncodeFailed {
                    label: label.clone(),
                    message: "Conversion failed!".into(),
                });
            }
            let dir = request.playlist_path.parent().unwrap();
            tokio::fs::write(dir.join("index0.ts"), b"segment").await?;
            tokio::fs::write(&request.playlist_path, "#EXTM3U\n#EXTINF:3.0,\nindex0.ts\n").await?;
            Ok(())
        }
    }

    struct Fixture {
        _tmp: tempfile::TempDir,
        orchestrator: JobOrchestrator,
        engine: Arc<FakeEngine>,
        job: Job,
    }

    impl Fixture {
        fn new(engine: FakeEngine) -> Self {
            Self::with_config(engine, |_| {})
        }

        fn with_config(engine: FakeEngine, tweak: impl FnOnce(&mut TranscoderConfig)) -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let source = tmp.path().join("upload.bin");
            std::fs::write(&source, b"not really a video").unwrap();

            let mut config = TranscoderConfig {
                output_root: tmp.path().join("output"),
                base_url: "http://localhost:3000/output".into(),
                ladder: two_rungs(),
                ..Default::default()
            };
            tweak(&mut config);

            let engine = Arc::new(engine);
            let orchestrator = JobOrchestrator::new(config, engine.clone());
            let job = orchestrator.layout().job("job1", source).unwrap();
            Self {
                _tmp: tmp,
                orchestrator,
                engine,
                job,
            }
        }

        fn out(&self) -> &Path {
            self.orchestrator.layout().root()
        }
    }

    fn two_rungs() -> Vec<ResolutionSpec> {
        vec![
            ResolutionSpec::new(426, 240, "240p"),
            ResolutionSpec::new(640, 360, "360p"),
        ]
    }

    fn labels(report: &JobReport) -> Vec<&str> {
        report
            .streams
            .iter()
            .map(|s| s.resolution.label.as_str())
            .collect()
    }

    #[tokio::test]
    async fn adaptive_job_writes_ordered_manifest() {
        let fx = Fixture::new(FakeEngine::default());
        let report = fx.orchestrator.run(&fx.job, StreamMode::Adaptive).await.unwrap();

        assert_eq!(labels(&report), ["240p", "360p"]);
        assert_eq!(
            report.master_url.as_deref(),
            Some("http://localhost:3000/output/job1/master.m3u8")
        );

        let master = std::fs::read_to_string(fx.out().join("job1/master.m3u8")).unwrap();
        let lines: Vec<&str> = master.lines().collect();
        assert_eq!(
            lines,
            [
                "#EXTM3U",
                "#EXT-X-STREAM-INF:BANDWIDTH=1000000,RESOLUTION=426x240",
                "http://localhost:3000/output/job1/240p/index.m3u8",
                "#EXT-X-STREAM-INF:BANDWIDTH=2000000,RESOLUTION=640x360",
                "http://localhost:3000/output/job1/360p/index.m3u8",
            ]
        );
    }

    #[tokio::test]
    async fn results_follow_ladder_not_completion_order() {
        // First rung finishes last.
        let engine = FakeEngine::default()
            .delay("240p", 150)
            .delay("360p", 100)
            .delay("720p", 50);
        let fx = Fixture::with_config(engine, |c| c.ladder = hlsladder_core::default_ladder());

        let report = fx.orchestrator.run(&fx.job, StreamMode::Adaptive).await.unwrap();
        assert_eq!(labels(&report), ["240p", "360p", "720p", "1080p"]);
        assert_eq!(fx.engine.calls.load(Ordering::SeqCst), 4);

        let master = std::fs::read_to_string(fx.out().join("job1/master.m3u8")).unwrap();
        let urls: Vec<&str> = master.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(
            urls,
            [
                "http://localhost:3000/output/job1/240p/index.m3u8",
                "http://localhost:3000/output/job1/360p/index.m3u8",
                "http://localhost:3000/output/job1/720p/index.m3u8",
                "http://localhost:3000/output/job1/1080p/index.m3u8",
            ]
        );
    }

    #[tokio::test]
    async fn encodes_run_concurrently() {
        // Every encode blocks until all of them have started; sequential
        // execution would never get past the first one.
        let engine = FakeEngine {
            barrier: Some(Barrier::new(2)),
            ..Default::default()
        };
        let fx = Fixture::new(engine);

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            fx.orchestrator.run(&fx.job, StreamMode::Simple),
        )
        .await
        .expect("encodes did not run concurrently")
        .unwrap();
        assert_eq!(report.streams.len(), 2);
    }

    #[tokio::test]
    async fn simple_job_writes_no_manifest() {
        let fx = Fixture::new(FakeEngine::default());
        let report = fx.orchestrator.run(&fx.job, StreamMode::Simple).await.unwrap();

        assert!(report.master_url.is_none());
        assert!(!fx.out().join("job1/master.m3u8").exists());
        assert!(fx.out().join("job1/240p/index.m3u8").exists());
        assert!(fx.out().join("job1/360p/index.m3u8").exists());
        assert_eq!(
            report.streams[1].playlist_url,
            "http://localhost:3000/output/job1/360p/index.m3u8"
        );
    }

    #[tokio::test]
    async fn one_failure_fails_the_job() {
        let fx = Fixture::new(FakeEngine::default().failing("360p"));
        let err = fx
            .orchestrator
            .run(&fx.job, StreamMode::Adaptive)
            .await
            .unwrap_err();

        match &err {
            TranscodeError::EncodeFailed { label, message } => {
                assert_eq!(label, "360p");
                assert_eq!(message, "Conversion failed!");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.to_string(), "encode failed for 360p: Conversion failed!");
        assert!(!fx.out().join("job1/master.m3u8").exists());
        // Succeeded renditions are not rolled back.
        assert!(fx.out().join("job1/240p/index.m3u8").exists());
    }

    #[tokio::test]
    async fn siblings_run_to_completion_by_default() {
        let engine = FakeEngine::default().failing("240p").delay("360p", 100);
        let fx = Fixture::new(engine);

        let err = fx.orchestrator.run(&fx.job, StreamMode::Simple).await;
        assert!(err.is_err());
        assert!(fx.out().join("job1/360p/index.m3u8").exists());
    }

    #[tokio::test]
    async fn cancel_on_failure_aborts_siblings() {
        let engine = FakeEngine::default().failing("240p").delay("360p", 30_000);
        let fx = Fixture::with_config(engine, |c| c.cancel_on_failure = true);

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            fx.orchestrator.run(&fx.job, StreamMode::Simple),
        )
        .await
        .expect("sibling was not cancelled")
        .unwrap_err();
        assert!(matches!(err, TranscodeError::EncodeFailed { ref label, .. } if label == "240p"));
        assert!(!fx.out().join("job1/360p/index.m3u8").exists());
    }

    #[tokio::test]
    async fn empty_ladder_adaptive_is_header_only() {
        let fx = Fixture::with_config(FakeEngine::default(), |c| c.ladder.clear());
        let report = fx.orchestrator.run(&fx.job, StreamMode::Adaptive).await.unwrap();

        assert!(report.streams.is_empty());
        assert_eq!(fx.engine.calls.load(Ordering::SeqCst), 0);
        let master = std::fs::read_to_string(fx.out().join("job1/master.m3u8")).unwrap();
        assert_eq!(master, "#EXTM3U\n");
    }

    #[tokio::test]
    async fn directories_match_ladder() {
        let fx = Fixture::new(FakeEngine::default());
        fx.orchestrator.run(&fx.job, StreamMode::Simple).await.unwrap();

        let mut dirs: Vec<String> = std::fs::read_dir(fx.out().join("job1"))
            .unwrap()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().unwrap().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        dirs.sort();
        assert_eq!(dirs, ["240p", "360p"]);
    }

    #[tokio::test]
    async fn rerun_reuses_directories() {
        let fx = Fixture::new(FakeEngine::default());
        fx.orchestrator.run(&fx.job, StreamMode::Adaptive).await.unwrap();
        let report = fx.orchestrator.run(&fx.job, StreamMode::Adaptive).await.unwrap();
        assert_eq!(report.streams.len(), 2);
    }

    #[tokio::test]
    async fn failed_rerun_drops_previous_master() {
        let fx = Fixture::new(FakeEngine::default());
        fx.orchestrator.run(&fx.job, StreamMode::Adaptive).await.unwrap();
        assert!(fx.out().join("job1/master.m3u8").exists());

        let failing = JobOrchestrator::new(
            fx.orchestrator.config().clone(),
            Arc::new(FakeEngine::default().failing("360p")),
        );
        failing.run(&fx.job, StreamMode::Adaptive).await.unwrap_err();
        assert!(!fx.out().join("job1/master.m3u8").exists());
    }

    #[tokio::test]
    async fn missing_source_rejected_before_fan_out() {
        let fx = Fixture::new(FakeEngine::default());
        let job = fx
            .orchestrator
            .layout()
            .job("job2", fx.out().join("does-not-exist"))
            .unwrap();

        let err = fx
            .orchestrator
            .run(&job, StreamMode::Simple)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::InvalidInput(_)));
        assert_eq!(fx.engine.calls.load(Ordering::SeqCst), 0);
        assert!(!fx.out().join("job2").exists());
    }

    #[tokio::test]
    async fn empty_source_path_rejected() {
        let fx = Fixture::new(FakeEngine::default());
        let job = fx.orchestrator.layout().job("job3", "").unwrap();
        let err = fx.orchestrator.run(&job, StreamMode::Simple).await.unwrap_err();
        assert_eq!(err.to_string(), "invalid input: no source file supplied");
    }

    #[tokio::test]
    async fn duplicate_labels_rejected() {
        let fx = Fixture::new(FakeEngine::default());
        let ladder = vec![
            ResolutionSpec::new(426, 240, "240p"),
            ResolutionSpec::new(428, 240, "240p"),
        ];
        let err = fx
            .orchestrator
            .run_job(&fx.job, &ladder, StreamMode::Simple)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::InvalidLadder(_)));
        assert_eq!(fx.engine.calls.load(Ordering::SeqCst), 0);
    }
}
