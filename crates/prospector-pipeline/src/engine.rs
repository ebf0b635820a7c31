//! Sequential harvest controller.
//!
//! Drives enumerate, filter, judge, resolve, append over one profile set.
//! Each iteration is isolated: a failure inside one profile logs, counts,
//! and moves on. The final snapshot runs no matter how the drive loop ends.

use std::sync::Arc;
use std::time::Instant;

use rand::Rng;

use prospector_judge::MatchJudge;
use prospector_types::{CandidateRecord, MonthValue, Progress, Result, TenureInterval};

use crate::events::{EventEmitter, PipelineEvent, SkipReason};
use crate::pause::PauseGate;
use crate::resolver::{artifact_name_for, normalize_display_name, ContactResolver, Resolution};
use crate::source::{FieldRole, ProfileContext, ProfileSource};
use crate::store::ResultStore;

/// Parameters for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Role brief the judge matches profile text against.
    pub brief: String,
    /// Earliest still-eligible employment end month.
    pub cutoff: MonthValue,
    /// Inclusive bounds of the randomized inter-profile delay.
    pub delay_ms: (u64, u64),
}

impl RunConfig {
    pub fn new(brief: impl Into<String>, cutoff: MonthValue) -> Self {
        Self {
            brief: brief.into(),
            cutoff,
            delay_ms: (2_000, 5_000),
        }
    }

    /// Disable the politeness delay. For tests and scripted sources.
    pub fn without_delay(mut self) -> Self {
        self.delay_ms = (0, 0);
        self
    }
}

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub progress: Progress,
    pub rows_written: usize,
    pub duration_ms: u64,
}

enum ItemOutcome {
    Appended,
    Skipped(SkipReason),
}

pub struct PipelineController {
    judge: Arc<dyn MatchJudge>,
    store: Arc<ResultStore>,
    gate: PauseGate,
    events: EventEmitter,
    config: RunConfig,
}

impl PipelineController {
    pub fn new(
        judge: Arc<dyn MatchJudge>,
        store: Arc<ResultStore>,
        gate: PauseGate,
        config: RunConfig,
    ) -> Self {
        Self {
            judge,
            store,
            gate,
            events: EventEmitter::default(),
            config,
        }
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    /// Run the pipeline over `source`. The snapshot in the finalizer runs
    /// whether the drive loop completed, failed, or was cut short, so
    /// everything appended so far reaches the sink.
    pub async fn run(&self, source: &dyn ProfileSource) -> Result<RunSummary> {
        let started = Instant::now();
        let drive_result = self.drive(source).await;

        let snapshot_result = self.store.snapshot().await;
        let progress = self.store.progress();
        let duration_ms = started.elapsed().as_millis() as u64;

        match &snapshot_result {
            Ok(report) if !report.skipped_empty => {
                self.events.emit(PipelineEvent::SnapshotSaved {
                    rows_written: report.rows_written,
                    progress: report.progress,
                });
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "final snapshot failed");
            }
        }

        if let Err(e) = drive_result {
            self.events.emit(PipelineEvent::RunFailed {
                error: e.to_string(),
                progress,
            });
            return Err(e);
        }
        let report = snapshot_result?;

        self.events.emit(PipelineEvent::RunCompleted {
            progress,
            duration_ms,
        });
        Ok(RunSummary {
            progress,
            rows_written: report.rows_written,
            duration_ms,
        })
    }

    async fn drive(&self, source: &dyn ProfileSource) -> Result<()> {
        let handles = source.list_handles().await?;
        self.events.emit(PipelineEvent::RunStarted {
            profile_count: handles.len(),
        });
        tracing::info!(profiles = handles.len(), "run started");

        for (index, handle) in handles.iter().enumerate() {
            let ordinal = index as u64 + 1;
            // The counter moves before the item is touched, so an item that
            // errors out is still counted as visited.
            self.store.advance_processed(ordinal);

            self.gate.wait_until_running().await;

            let ctx = match source.open(handle).await {
                Ok(ctx) => ctx,
                Err(e) => {
                    let progress = self.store.progress();
                    tracing::warn!(%handle, error = %e, progress = %progress, "profile open failed");
                    self.events.emit(PipelineEvent::ProfileSkipped {
                        ordinal,
                        url: handle.to_string(),
                        reason: SkipReason::OpenFailed,
                        progress,
                    });
                    self.delay().await;
                    continue;
                }
            };
            let url = ctx.url();
            self.events.emit(PipelineEvent::ProfileStarted {
                ordinal,
                url: url.clone(),
            });

            let outcome = self.process(ctx.as_ref(), ordinal).await;

            self.gate.wait_until_running().await;

            if let Err(e) = ctx.close().await {
                tracing::debug!(%url, error = %e, "profile close failed");
            }

            let progress = self.store.progress();
            match outcome {
                Ok(ItemOutcome::Appended) => {
                    tracing::info!(%url, progress = %progress, "record appended");
                    self.events.emit(PipelineEvent::RecordAppended {
                        ordinal,
                        url,
                        progress,
                    });
                }
                Ok(ItemOutcome::Skipped(reason)) => {
                    tracing::info!(%url, ?reason, progress = %progress, "profile skipped");
                    self.events.emit(PipelineEvent::ProfileSkipped {
                        ordinal,
                        url,
                        reason,
                        progress,
                    });
                }
                Err(e) => {
                    tracing::warn!(%url, error = %e, progress = %progress, "iteration failed");
                    self.events.emit(PipelineEvent::ProfileSkipped {
                        ordinal,
                        url,
                        reason: SkipReason::IterationError,
                        progress,
                    });
                }
            }

            self.delay().await;
        }

        Ok(())
    }

    /// One profile, open to verdict. Skips are modeled as values; only
    /// unexpected failures propagate as errors.
    async fn process(&self, ctx: &dyn ProfileContext, ordinal: u64) -> Result<ItemOutcome> {
        let tenure_text = match ctx.read_field(FieldRole::Tenure).await {
            Ok(text) => text,
            Err(_) => return Ok(ItemOutcome::Skipped(SkipReason::TenureMissing)),
        };
        let tenure = TenureInterval::parse(&tenure_text);
        if !tenure.is_eligible(self.config.cutoff) {
            tracing::debug!(tenure = %tenure, cutoff = %self.config.cutoff, "tenure out of range");
            return Ok(ItemOutcome::Skipped(SkipReason::TenureIneligible));
        }

        let profile_text = match ctx.read_field(FieldRole::RawContent).await {
            Ok(text) => text,
            Err(_) => return Ok(ItemOutcome::Skipped(SkipReason::ProfileTextMissing)),
        };

        self.gate.wait_until_running().await;

        // A judge failure downgrades to no-match rather than ending the run.
        match self.judge.judge(&profile_text, &self.config.brief).await {
            Ok(verdict) if verdict.is_match() => {}
            Ok(_) => return Ok(ItemOutcome::Skipped(SkipReason::NoMatch)),
            Err(e) => {
                tracing::warn!(error = %e, "judge unavailable, treating as no-match");
                return Ok(ItemOutcome::Skipped(SkipReason::JudgeError));
            }
        }

        let name = ctx.read_field(FieldRole::Name).await.ok();
        let gender = ctx.read_field(FieldRole::Gender).await.ok();
        let display_name = name.map(|n| normalize_display_name(&n, gender.as_deref()));
        let artifact_name = artifact_name_for(display_name.as_deref(), ordinal as usize);
        let contact = match ContactResolver::resolve(ctx, &artifact_name).await {
            Resolution::Resolved(handle) => handle,
            Resolution::Unresolved => {
                return Ok(ItemOutcome::Skipped(SkipReason::ContactUnresolved))
            }
        };

        // The positional label is for the image artifact only; the record
        // keeps the display name, empty when the field was unreadable.
        let record = CandidateRecord {
            name: display_name.unwrap_or_default(),
            title: ctx.read_field(FieldRole::Title).await.unwrap_or_default(),
            company: ctx.read_field(FieldRole::Company).await.unwrap_or_default(),
            tenure,
            contact,
            profile_url: ctx.url(),
            raw_text: profile_text,
        };
        self.store.append(record);
        Ok(ItemOutcome::Appended)
    }

    async fn delay(&self) {
        let (lo, hi) = self.config.delay_ms;
        if hi == 0 {
            return;
        }
        let ms = rand::rng().random_range(lo..=hi);
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ScriptedProfile, ScriptedSource};
    use async_trait::async_trait;
    use prospector_types::{ProspectorError, Verdict};
    use std::sync::Mutex;

    /// Scripted judge. Verdicts are consumed in call order; an exhausted
    /// script answers match.
    struct ScriptedJudge {
        verdicts: Mutex<Vec<Result<Verdict>>>,
    }

    impl ScriptedJudge {
        fn new(verdicts: Vec<Result<Verdict>>) -> Self {
            Self {
                verdicts: Mutex::new(verdicts),
            }
        }

        fn always_match() -> Self {
            Self::new(Vec::new())
        }
    }

    #[async_trait]
    impl MatchJudge for ScriptedJudge {
        async fn judge(&self, _profile_text: &str, _brief: &str) -> Result<Verdict> {
            let mut verdicts = self.verdicts.lock().unwrap();
            if verdicts.is_empty() {
                Ok(Verdict::Match)
            } else {
                verdicts.remove(0)
            }
        }
    }

    fn eligible_profile(url: &str) -> ScriptedProfile {
        ScriptedProfile::new(url)
            .with_name("张**")
            .with_gender("男")
            .with_company("腾讯")
            .with_title("产品经理")
            .with_tenure("2024.04 - 至今")
            .with_raw_content("张三的完整简历文本")
            .unlocked()
            .with_contact_text("13812345678")
    }

    fn controller(judge: ScriptedJudge, dir: &tempfile::TempDir) -> PipelineController {
        let store = Arc::new(ResultStore::new());
        store.set_sink_path(dir.path().join("out.csv"));
        PipelineController::new(
            Arc::new(judge),
            store,
            PauseGate::new(),
            RunConfig::new("寻找资深产品经理", MonthValue::from_parts(24, 1)).without_delay(),
        )
    }

    #[tokio::test]
    async fn eligible_matching_profile_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(ScriptedJudge::always_match(), &dir);
        let source = ScriptedSource::new(vec![eligible_profile("u1")]);

        let summary = ctl.run(&source).await.unwrap();
        assert_eq!(summary.progress.processed, 1);
        assert_eq!(summary.progress.qualified, 1);
        assert_eq!(summary.rows_written, 1);
    }

    #[tokio::test]
    async fn ineligible_tenure_never_reaches_the_judge() {
        let dir = tempfile::tempdir().unwrap();
        let judge = ScriptedJudge::always_match();
        let ctl = controller(judge, &dir);
        let source =
            ScriptedSource::new(vec![eligible_profile("u1").with_tenure("2022.01 - 2023.06")]);
        let mut rx = ctl.events().subscribe();

        let summary = ctl.run(&source).await.unwrap();
        assert_eq!(summary.progress.qualified, 0);
        // No unlock attempt either.
        assert!(source.actions().iter().all(|a| a == "u1: close"));

        let mut reasons = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let PipelineEvent::ProfileSkipped { reason, .. } = event {
                reasons.push(reason);
            }
        }
        assert_eq!(reasons, vec![SkipReason::TenureIneligible]);
    }

    #[tokio::test]
    async fn judge_rejection_skips_without_contact_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(ScriptedJudge::new(vec![Ok(Verdict::NoMatch)]), &dir);
        let source = ScriptedSource::new(vec![eligible_profile("u1")]);

        let summary = ctl.run(&source).await.unwrap();
        assert_eq!(summary.progress.qualified, 0);
        assert!(!source
            .actions()
            .iter()
            .any(|a| a.contains("activate_view_contact")));
    }

    #[tokio::test]
    async fn judge_failure_downgrades_to_skip() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(
            ScriptedJudge::new(vec![
                Err(ProspectorError::JudgeTimeout { timeout_ms: 30_000 }),
                Ok(Verdict::Match),
            ]),
            &dir,
        );
        let source = ScriptedSource::new(vec![eligible_profile("u1"), eligible_profile("u2")]);

        let summary = ctl.run(&source).await.unwrap();
        assert_eq!(summary.progress.processed, 2);
        // The timeout cost u1 but did not end the run.
        assert_eq!(summary.progress.qualified, 1);
    }

    #[tokio::test]
    async fn open_failure_is_isolated_to_its_item() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(ScriptedJudge::always_match(), &dir);
        let source = ScriptedSource::new(vec![
            eligible_profile("u1").failing_open(),
            eligible_profile("u2"),
        ]);

        let summary = ctl.run(&source).await.unwrap();
        assert_eq!(summary.progress.processed, 2);
        assert_eq!(summary.progress.qualified, 1);
    }

    #[tokio::test]
    async fn listing_failure_fails_the_run_but_still_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(ScriptedJudge::always_match(), &dir);
        let mut rx = ctl.events().subscribe();

        let err = ctl.run(&ScriptedSource::failing_listing()).await.unwrap_err();
        assert!(matches!(err, ProspectorError::Source(_)));

        // Empty store, so the snapshot was a skip, not a write.
        assert!(!dir.path().join("out.csv").exists());
        let mut saw_failed = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, PipelineEvent::RunFailed { .. }) {
                saw_failed = true;
            }
        }
        assert!(saw_failed);
    }

    #[tokio::test]
    async fn unresolved_contact_skips_the_profile() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(ScriptedJudge::always_match(), &dir);
        let mut profile = eligible_profile("u1");
        profile.contact_text = None;
        profile.raw_content = "无可用号码的简历文本".into();
        let source = ScriptedSource::new(vec![profile]);

        let summary = ctl.run(&source).await.unwrap();
        assert_eq!(summary.progress.processed, 1);
        assert_eq!(summary.progress.qualified, 0);
    }

    #[tokio::test]
    async fn record_fields_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(ScriptedJudge::always_match(), &dir);
        let source = ScriptedSource::new(vec![eligible_profile("u1")]);

        ctl.run(&source).await.unwrap();
        let contents =
            std::fs::read_to_string(dir.path().join("out.csv")).unwrap();
        let row = contents.lines().nth(1).unwrap();
        assert!(row.starts_with("张先生,产品经理,腾讯,24/4-Present,云 13812345678,u1,"));
    }

    #[tokio::test]
    async fn unreadable_name_labels_artifact_but_not_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(ScriptedJudge::always_match(), &dir);
        let mut profile = eligible_profile("u1");
        profile.name = String::new();
        let source = ScriptedSource::new(vec![profile]);

        let summary = ctl.run(&source).await.unwrap();
        assert_eq!(summary.progress.qualified, 1);

        // The positional label reaches the image strategy only.
        assert!(source
            .actions()
            .iter()
            .any(|a| a == "u1: capture_contact_image(Unknown_contact_1)"));
        let contents = std::fs::read_to_string(dir.path().join("out.csv")).unwrap();
        let row = contents.lines().nth(1).unwrap();
        assert!(row.starts_with(",产品经理,腾讯,"));
    }

    #[tokio::test]
    async fn paused_gate_holds_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = Arc::new(controller(ScriptedJudge::always_match(), &dir));
        ctl.gate.pause();
        let source = Arc::new(ScriptedSource::new(vec![eligible_profile("u1")]));

        let task = {
            let ctl = ctl.clone();
            let source = source.clone();
            tokio::spawn(async move { ctl.run(source.as_ref()).await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!task.is_finished());
        assert!(source.actions().is_empty());

        ctl.gate.resume();
        let summary = task.await.unwrap().unwrap();
        assert_eq!(summary.progress.qualified, 1);
    }
}
