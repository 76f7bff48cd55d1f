//! Worker pipeline
//!
//! Strictly sequential stages, each reporting progress before and after its
//! work:
//!
//! ```text
//! init(0) -> convert(10..25) -> analyze(40..70) -> export(70..100) -> done(100)
//! ```
//!
//! Every write is a merge patch. A failing stage fails the job and ends the
//! invocation; there are no internal retries.

use anyhow::{Context, Result};
use lipid_core::domain::job::{JobId, JobPatch, JobStatus, MergeOutcome, Mode};
use lipid_core::error::CoreError;
use lipid_core::storage::StorageUri;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Invocation;
use crate::repository::JobRepository;
use crate::service::{AnalysisStage, BlobStore, Converter, needs_conversion};

/// Name of the summary artifact every successful job exports
pub const SUMMARY_FILE: &str = "summary.json";

/// How one invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    /// The job was already finished; nothing was written
    AlreadyTerminal(JobStatus),
    Failed { stage: String, error: String },
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Succeeded | RunOutcome::AlreadyTerminal(_) => 0,
            RunOutcome::Failed { .. } => 1,
        }
    }
}

/// Why the stage sequence stopped early
enum Abort {
    Failed { stage: String, error: CoreError },
    /// Another invocation finished the job meanwhile
    Finished,
}

impl Abort {
    fn stage(stage: &str, err: anyhow::Error) -> Self {
        Abort::Failed {
            stage: stage.to_string(),
            error: CoreError::StageFailure {
                stage: stage.to_string(),
                message: format!("{:#}", err),
            },
        }
    }
}

type Step<T> = std::result::Result<T, Abort>;

pub struct Pipeline {
    jobs: Arc<dyn JobRepository>,
    blobs: Arc<dyn BlobStore>,
    converter: Arc<dyn Converter>,
    whole_slide: Arc<dyn AnalysisStage>,
    tiled: Arc<dyn AnalysisStage>,
    results_bucket: String,
    scratch_dir: PathBuf,
}

impl Pipeline {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        blobs: Arc<dyn BlobStore>,
        converter: Arc<dyn Converter>,
        whole_slide: Arc<dyn AnalysisStage>,
        tiled: Arc<dyn AnalysisStage>,
        results_bucket: String,
        scratch_dir: PathBuf,
    ) -> Self {
        Self {
            jobs,
            blobs,
            converter,
            whole_slide,
            tiled,
            results_bucket,
            scratch_dir,
        }
    }

    /// Runs the invocation to completion
    ///
    /// Errors are returned only when the job document cannot be read; every
    /// other failure is recorded in the document and reported as
    /// [`RunOutcome::Failed`].
    pub async fn run(&self, invocation: &Invocation) -> Result<RunOutcome> {
        let job_id = &invocation.job_id;

        let job = self
            .jobs
            .fetch(job_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Job {} not found", job_id))?;

        if job.status.is_terminal() {
            info!("Job {} already {}, nothing to do", job_id, job.status);
            return Ok(RunOutcome::AlreadyTerminal(job.status));
        }

        match self.execute(invocation).await {
            Ok(()) => {
                info!("Job {} succeeded", job_id);
                Ok(RunOutcome::Succeeded)
            }
            Err(Abort::Finished) => {
                let status = self
                    .jobs
                    .fetch(job_id)
                    .await?
                    .map_or(JobStatus::Failed, |job| job.status);
                info!("Job {} was finished by another invocation ({})", job_id, status);
                Ok(RunOutcome::AlreadyTerminal(status))
            }
            Err(Abort::Failed { stage, error }) => {
                let message = error.to_string();
                error!("Job {} failed in stage {}: {}", job_id, stage, message);

                let patch = JobPatch::failed_at(stage.as_str(), message.clone());
                if let Err(e) = self.jobs.merge(job_id, patch).await {
                    error!("Failed to record failure of job {}: {:#}", job_id, e);
                }

                Ok(RunOutcome::Failed {
                    stage,
                    error: message,
                })
            }
        }
    }

    async fn execute(&self, invocation: &Invocation) -> Step<()> {
        let job_id = &invocation.job_id;

        // Checked before the first write so a bad mode fails straight from queued
        let mode: Mode = invocation.mode.parse().map_err(|_| Abort::Failed {
            stage: "init".to_string(),
            error: CoreError::UnknownMode(invocation.mode.clone()),
        })?;

        self.progress(job_id, "init", 0, "starting").await?;

        let workdir = self.scratch_dir.join(job_id.as_str());
        let input = self.convert(job_id, &invocation.input_ref, &workdir).await?;
        let output_dir = self.analyze(job_id, mode, &input, &workdir).await?;
        self.export(job_id, mode, &output_dir).await?;

        self.write(job_id, "done", JobPatch::succeeded("done", "complete"))
            .await?;
        Ok(())
    }

    /// Fetches the source slide and normalizes it when its format needs it
    async fn convert(&self, job_id: &JobId, input_ref: &str, workdir: &Path) -> Step<PathBuf> {
        const STAGE: &str = "convert";
        self.progress(job_id, STAGE, 10, "converting to OME-TIFF / probing WSI")
            .await?;

        let source: StorageUri = input_ref
            .parse()
            .map_err(|e: CoreError| Abort::stage(STAGE, e.into()))?;

        let local = workdir.join(format!("input{}", source.extension().unwrap_or("")));
        self.blobs
            .download(&source, &local)
            .await
            .map_err(|e| Abort::stage(STAGE, e))?;

        let normalized = if needs_conversion(source.extension()) {
            let converted = workdir.join("slide.ome.tiff");
            self.converter
                .to_ome_tiff(&local, &converted)
                .await
                .map_err(|e| Abort::stage(STAGE, e))?;
            converted
        } else {
            local
        };

        self.progress(job_id, STAGE, 25, "OME-TIFF ready").await?;
        Ok(normalized)
    }

    async fn analyze(
        &self,
        job_id: &JobId,
        mode: Mode,
        input: &Path,
        workdir: &Path,
    ) -> Step<PathBuf> {
        const STAGE: &str = "analyze";
        let stage = match mode {
            Mode::X40 => &self.whole_slide,
            Mode::X20 => &self.tiled,
        };
        self.progress(job_id, STAGE, 40, stage.label()).await?;

        let output_dir = workdir.join("out");
        fresh_dir(&output_dir)
            .await
            .map_err(|e| Abort::stage(STAGE, e))?;

        stage
            .analyze(input, &output_dir)
            .await
            .map_err(|e| Abort::stage(STAGE, e))?;

        self.progress(job_id, STAGE, 70, "exporting overlays/masks/summary")
            .await?;
        Ok(output_dir)
    }

    /// Uploads every artifact and records it in `result_refs`
    async fn export(&self, job_id: &JobId, mode: Mode, output_dir: &Path) -> Step<()> {
        const STAGE: &str = "export";
        self.progress(job_id, STAGE, 70, "uploading artifacts").await?;

        let summary = serde_json::json!({ "job_id": job_id, "mode": mode, "ok": true });
        let summary = serde_json::to_vec_pretty(&summary).map_err(|e| Abort::stage(STAGE, e.into()))?;
        tokio::fs::write(output_dir.join(SUMMARY_FILE), summary)
            .await
            .context("Failed to write summary")
            .map_err(|e| Abort::stage(STAGE, e))?;

        let files = collect_files(output_dir)
            .await
            .map_err(|e| Abort::stage(STAGE, e))?;

        let mut refs = BTreeMap::new();
        for (rel_path, local) in files {
            let target = StorageUri::new(
                self.results_bucket.as_str(),
                format!("{}/{}", job_id, rel_path),
            );

            if let Err(e) = self.blobs.upload(&local, &target).await {
                // Keep what already made it to the bucket
                if !refs.is_empty() {
                    self.write(job_id, STAGE, JobPatch::results(refs)).await?;
                }
                return Err(Abort::stage(STAGE, e));
            }

            refs.insert(rel_path, target.to_string());
        }

        info!("Exported {} artifact(s) for job {}", refs.len(), job_id);
        self.write(job_id, STAGE, JobPatch::results(refs)).await
    }

    async fn progress(&self, job_id: &JobId, stage: &str, pct: u8, log: &str) -> Step<()> {
        info!("[{}] {}% | {} | {}", job_id, pct, stage, log);
        self.write(job_id, stage, JobPatch::progress(stage, pct, log))
            .await
    }

    async fn write(&self, job_id: &JobId, stage: &str, patch: JobPatch) -> Step<()> {
        let outcome = self
            .jobs
            .merge(job_id, patch)
            .await
            .map_err(|e| Abort::stage(stage, e))?;

        match outcome {
            MergeOutcome::Applied => Ok(()),
            MergeOutcome::Stale => {
                warn!("Stale progress for job {} in stage {}", job_id, stage);
                Ok(())
            }
            MergeOutcome::Terminal => Err(Abort::Finished),
            MergeOutcome::InvalidTransition => Err(Abort::stage(
                stage,
                anyhow::anyhow!("Job {} rejected the update as an invalid transition", job_id),
            )),
        }
    }
}

/// Empty directory at `dir`, clearing leftovers of an earlier invocation
async fn fresh_dir(dir: &Path) -> Result<()> {
    if tokio::fs::try_exists(dir).await? {
        tokio::fs::remove_dir_all(dir)
            .await
            .with_context(|| format!("Failed to clear {}", dir.display()))?;
    }
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))
}

/// All regular files under `root` as (`/`-separated relative path, path)
async fn collect_files(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut pending = vec![root.to_path_buf()];
    let mut files = Vec::new();

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("Failed to read {}", dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                let rel_path = path
                    .strip_prefix(root)?
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                files.push((rel_path, path));
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::FsBlobStore;
    use async_trait::async_trait;
    use lipid_core::domain::job::Job;
    use lipid_core::store::{InMemoryJobStore, JobStore};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Analysis stage that records its inputs and writes fixed artifacts
    struct FakeStage {
        label: &'static str,
        artifacts: Vec<&'static str>,
        fail: bool,
        inputs: Mutex<Vec<PathBuf>>,
    }

    impl FakeStage {
        fn new(label: &'static str) -> Self {
            Self {
                label,
                artifacts: vec![],
                fail: false,
                inputs: Mutex::new(vec![]),
            }
        }

        fn calls(&self) -> Vec<PathBuf> {
            self.inputs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AnalysisStage for FakeStage {
        fn label(&self) -> &str {
            self.label
        }

        async fn analyze(&self, input: &Path, output_dir: &Path) -> Result<()> {
            self.inputs.lock().unwrap().push(input.to_path_buf());
            if self.fail {
                anyhow::bail!("classifier crashed");
            }
            for artifact in &self.artifacts {
                let path = output_dir.join(artifact);
                tokio::fs::create_dir_all(path.parent().unwrap()).await?;
                tokio::fs::write(path, b"data").await?;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeConverter {
        calls: Mutex<Vec<(PathBuf, PathBuf)>>,
    }

    #[async_trait]
    impl Converter for FakeConverter {
        async fn to_ome_tiff(&self, input: &Path, output: &Path) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((input.to_path_buf(), output.to_path_buf()));
            tokio::fs::copy(input, output).await?;
            Ok(())
        }
    }

    /// Job repository that keeps every patch it forwards
    struct RecordingJobs {
        store: Arc<InMemoryJobStore>,
        patches: Mutex<Vec<JobPatch>>,
    }

    #[async_trait]
    impl JobRepository for RecordingJobs {
        async fn fetch(&self, job_id: &JobId) -> Result<Option<Job>> {
            JobRepository::fetch(self.store.as_ref(), job_id).await
        }

        async fn merge(&self, job_id: &JobId, patch: JobPatch) -> Result<MergeOutcome> {
            self.patches.lock().unwrap().push(patch.clone());
            JobRepository::merge(self.store.as_ref(), job_id, patch).await
        }
    }

    struct Harness {
        store: Arc<InMemoryJobStore>,
        jobs: Arc<RecordingJobs>,
        converter: Arc<FakeConverter>,
        whole_slide: Arc<FakeStage>,
        tiled: Arc<FakeStage>,
        mount: TempDir,
        _scratch: TempDir,
        pipeline: Pipeline,
    }

    fn harness(whole_slide: FakeStage, tiled: FakeStage) -> Harness {
        let store = Arc::new(InMemoryJobStore::new());
        let jobs = Arc::new(RecordingJobs {
            store: store.clone(),
            patches: Mutex::new(vec![]),
        });
        let converter = Arc::new(FakeConverter::default());
        let whole_slide = Arc::new(whole_slide);
        let tiled = Arc::new(tiled);
        let mount = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();

        let pipeline = Pipeline::new(
            jobs.clone(),
            Arc::new(FsBlobStore::new(mount.path())),
            converter.clone(),
            whole_slide.clone(),
            tiled.clone(),
            "results".to_string(),
            scratch.path().to_path_buf(),
        );

        Harness {
            store,
            jobs,
            converter,
            whole_slide,
            tiled,
            mount,
            _scratch: scratch,
            pipeline,
        }
    }

    fn default_harness() -> Harness {
        harness(FakeStage::new("QuPath 40x"), FakeStage::new("Cellpose 20x"))
    }

    impl Harness {
        /// Queues job `J1` and places its source slide in the uploads bucket
        async fn queue(&self, mode: Mode, file_name: &str) -> Invocation {
            let job_id = JobId::from("J1");
            self.store
                .insert(&Job::queued(
                    job_id.clone(),
                    "img1".into(),
                    mode,
                    chrono::Utc::now(),
                ))
                .await
                .unwrap();

            let slide = self.mount.path().join("uploads").join(file_name);
            tokio::fs::create_dir_all(slide.parent().unwrap()).await.unwrap();
            tokio::fs::write(&slide, b"slide").await.unwrap();

            Invocation {
                job_id,
                mode: mode.as_str().to_string(),
                input_ref: format!("gs://uploads/{file_name}"),
            }
        }

        async fn job(&self) -> Job {
            self.store.get(&JobId::from("J1")).await.unwrap().unwrap()
        }

        /// Statuses carried by the patches written so far
        fn written_statuses(&self) -> Vec<Option<JobStatus>> {
            self.jobs
                .patches
                .lock()
                .unwrap()
                .iter()
                .map(|patch| patch.status)
                .collect()
        }
    }

    #[tokio::test]
    async fn test_40x_job_succeeds_with_summary() {
        let h = default_harness();
        let invocation = h.queue(Mode::X40, "slide.svs").await;

        let outcome = h.pipeline.run(&invocation).await.unwrap();

        assert_eq!(outcome, RunOutcome::Succeeded);
        assert_eq!(outcome.exit_code(), 0);

        let job = h.job().await;
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.stage, "done");
        assert_eq!(job.pct, 100);
        assert!(job.finished_at.is_some());

        let mut expected = BTreeMap::new();
        expected.insert(
            "summary.json".to_string(),
            "gs://results/J1/summary.json".to_string(),
        );
        assert_eq!(job.result_refs, expected);

        let summary: serde_json::Value = serde_json::from_slice(
            &tokio::fs::read(h.mount.path().join("results/J1/summary.json"))
                .await
                .unwrap(),
        )
        .unwrap();
        assert_eq!(
            summary,
            serde_json::json!({"job_id": "J1", "mode": "40X", "ok": true})
        );

        assert_eq!(h.whole_slide.calls().len(), 1);
        assert!(h.tiled.calls().is_empty());
        assert!(h.converter.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_20x_vendor_format_is_converted() {
        let h = default_harness();
        let invocation = h.queue(Mode::X20, "scan.czi").await;

        assert_eq!(h.pipeline.run(&invocation).await.unwrap(), RunOutcome::Succeeded);

        let conversions = h.converter.calls.lock().unwrap().clone();
        assert_eq!(conversions.len(), 1);
        assert!(conversions[0].0.ends_with("J1/input.czi"));
        assert!(conversions[0].1.ends_with("J1/slide.ome.tiff"));

        let analyzed = h.tiled.calls();
        assert_eq!(analyzed, vec![conversions[0].1.clone()]);
        assert!(h.whole_slide.calls().is_empty());
    }

    #[tokio::test]
    async fn test_nested_artifacts_are_exported() {
        let mut stage = FakeStage::new("QuPath 40x");
        stage.artifacts = vec!["masks/a.png", "documents/report.pdf"];
        let h = harness(stage, FakeStage::new("Cellpose 20x"));
        let invocation = h.queue(Mode::X40, "slide.ndpi").await;

        h.pipeline.run(&invocation).await.unwrap();

        let job = h.job().await;
        assert_eq!(
            job.result_refs.keys().collect::<Vec<_>>(),
            vec!["documents/report.pdf", "masks/a.png", "summary.json"]
        );
        assert_eq!(job.result_refs["masks/a.png"], "gs://results/J1/masks/a.png");
        assert!(h.mount.path().join("results/J1/masks/a.png").exists());
    }

    #[tokio::test]
    async fn test_unknown_mode_fails_before_stage_work() {
        let h = default_harness();
        let mut invocation = h.queue(Mode::X40, "slide.svs").await;
        invocation.mode = "99X".to_string();

        let outcome = h.pipeline.run(&invocation).await.unwrap();

        assert_eq!(outcome.exit_code(), 1);
        let job = h.job().await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.stage, "init");
        assert_eq!(job.error.as_deref(), Some("Unknown mode 99X"));
        assert_eq!(job.pct, 0);
        assert_eq!(h.written_statuses(), vec![Some(JobStatus::Failed)]);
        assert!(h.whole_slide.calls().is_empty());
        assert!(h.tiled.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stage_failure_is_terminal() {
        let mut stage = FakeStage::new("QuPath 40x");
        stage.fail = true;
        let h = harness(stage, FakeStage::new("Cellpose 20x"));
        let invocation = h.queue(Mode::X40, "slide.svs").await;

        let outcome = h.pipeline.run(&invocation).await.unwrap();

        let RunOutcome::Failed { stage, error } = &outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(stage, "analyze");
        assert!(error.contains("classifier crashed"));
        assert_eq!(outcome.exit_code(), 1);

        let job = h.job().await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.stage, "analyze");
        assert_eq!(job.pct, 40);
        assert!(job.result_refs.is_empty());
        assert_eq!(h.whole_slide.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_source_fails_convert() {
        let h = default_harness();
        let mut invocation = h.queue(Mode::X40, "slide.svs").await;
        invocation.input_ref = "gs://uploads/elsewhere.svs".to_string();

        let outcome = h.pipeline.run(&invocation).await.unwrap();

        assert!(matches!(outcome, RunOutcome::Failed { ref stage, .. } if stage == "convert"));
        let job = h.job().await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.pct, 10);
    }

    #[tokio::test]
    async fn test_terminal_job_is_left_alone() {
        let h = default_harness();
        let invocation = h.queue(Mode::X40, "slide.svs").await;
        h.pipeline.run(&invocation).await.unwrap();
        let finished = h.job().await;

        let outcome = h.pipeline.run(&invocation).await.unwrap();

        assert_eq!(outcome, RunOutcome::AlreadyTerminal(JobStatus::Succeeded));
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(h.job().await, finished);
        assert_eq!(h.whole_slide.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_running_job_is_reentered() {
        let h = default_harness();
        let invocation = h.queue(Mode::X40, "slide.svs").await;
        JobStore::merge(
            h.store.as_ref(),
            &invocation.job_id,
            JobPatch::progress("analyze", 70, "first attempt"),
        )
        .await
        .unwrap();

        let outcome = h.pipeline.run(&invocation).await.unwrap();

        assert_eq!(outcome, RunOutcome::Succeeded);
        let job = h.job().await;
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.pct, 100);
        assert!(job.result_refs.contains_key("summary.json"));
    }

    #[tokio::test]
    async fn test_reentered_failure_records_failing_stage() {
        let h = default_harness();
        let mut invocation = h.queue(Mode::X40, "slide.svs").await;
        JobStore::merge(
            h.store.as_ref(),
            &invocation.job_id,
            JobPatch::progress("analyze", 70, "first attempt"),
        )
        .await
        .unwrap();
        invocation.input_ref = "gs://uploads/elsewhere.svs".to_string();

        let outcome = h.pipeline.run(&invocation).await.unwrap();

        assert!(matches!(outcome, RunOutcome::Failed { ref stage, .. } if stage == "convert"));
        let job = h.job().await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.stage, "convert");
        assert_eq!(job.pct, 70);
    }

    #[tokio::test]
    async fn test_unknown_job_is_an_error() {
        let h = default_harness();
        let invocation = Invocation {
            job_id: JobId::from("ghost"),
            mode: "40X".into(),
            input_ref: "gs://uploads/a.svs".into(),
        };

        assert!(h.pipeline.run(&invocation).await.is_err());
    }

    #[tokio::test]
    async fn test_collect_files_uses_forward_slashes() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("a/b")).await.unwrap();
        tokio::fs::write(dir.path().join("a/b/c.txt"), b"x").await.unwrap();
        tokio::fs::write(dir.path().join("top.txt"), b"x").await.unwrap();

        let files = collect_files(dir.path()).await.unwrap();
        let names: Vec<_> = files.iter().map(|(rel, _)| rel.as_str()).collect();
        assert_eq!(names, vec!["a/b/c.txt", "top.txt"]);
    }
}
