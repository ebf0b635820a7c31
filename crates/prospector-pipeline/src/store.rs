//! Thread-safe result store with incremental csv persistence.
//!
//! All in-memory mutation happens under one mutex held only for the duration
//! of the operation. A snapshot takes a structural copy under the lock, then
//! releases it before the slow, fallible sink write — mutation never blocks
//! on I/O latency. Each snapshot overwrites the sink with the full current
//! record set.

use std::path::PathBuf;
use std::sync::Mutex;

use prospector_types::{CandidateRecord, Progress, ProspectorError, Result};

/// Durable sink column schema, one row per qualifying record.
pub const SINK_HEADERS: [&str; 7] = [
    "姓名",
    "职位",
    "在职公司",
    "在职时间",
    "云号码",
    "简历链接",
    "Profile",
];

/// What a snapshot did, for operator feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotReport {
    pub rows_written: usize,
    pub progress: Progress,
    /// The write was skipped because the store held no records.
    pub skipped_empty: bool,
}

struct StoreInner {
    records: Vec<CandidateRecord>,
    progress: Progress,
    sink_path: Option<PathBuf>,
}

/// Ordered collection of qualifying records plus the run's progress
/// counters. Shared between the pipeline task and the control listener.
pub struct ResultStore {
    inner: Mutex<StoreInner>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                records: Vec::new(),
                progress: Progress::default(),
                sink_path: None,
            }),
        }
    }

    /// Set the sink path for this run. Called once per run cycle, before any
    /// mutation.
    pub fn set_sink_path(&self, path: impl Into<PathBuf>) {
        self.inner.lock().unwrap().sink_path = Some(path.into());
    }

    pub fn sink_path(&self) -> Option<PathBuf> {
        self.inner.lock().unwrap().sink_path.clone()
    }

    /// Append a qualifying record and advance the qualified counter with it.
    /// Returns the updated progress pair.
    pub fn append(&self, record: CandidateRecord) -> Progress {
        let mut inner = self.inner.lock().unwrap();
        inner.records.push(record);
        inner.progress.qualified += 1;
        inner.progress
    }

    /// Mark the controller as currently on item `n` (1-based). Advanced
    /// strictly before the corresponding profile's processing begins.
    pub fn advance_processed(&self, n: u64) {
        self.inner.lock().unwrap().progress.processed = n;
    }

    pub fn progress(&self) -> Progress {
        self.inner.lock().unwrap().progress
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear records and zero both counters. Called only at the start of a
    /// new run cycle, never mid-run.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.records.clear();
        inner.progress = Progress::default();
    }

    /// Write the full current record set to the sink (overwrite semantics).
    ///
    /// An empty store skips the write but still reports the counters. A sink
    /// failure leaves the in-memory state untouched; a later snapshot can
    /// retry.
    pub async fn snapshot(&self) -> Result<SnapshotReport> {
        let (records, progress, sink_path) = {
            let inner = self.inner.lock().unwrap();
            (
                inner.records.clone(),
                inner.progress,
                inner.sink_path.clone(),
            )
        };

        let path = sink_path
            .ok_or_else(|| ProspectorError::Config("sink path not set".into()))?;

        if records.is_empty() {
            tracing::info!(progress = %progress, "snapshot requested with no records, skipping write");
            return Ok(SnapshotReport {
                rows_written: 0,
                progress,
                skipped_empty: true,
            });
        }

        let buffer = render_csv(&records).map_err(|message| ProspectorError::SinkWrite {
            path: path.display().to_string(),
            message,
        })?;

        tokio::fs::write(&path, buffer)
            .await
            .map_err(|e| ProspectorError::SinkWrite {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        tracing::info!(
            rows = records.len(),
            progress = %progress,
            path = %path.display(),
            "snapshot saved"
        );
        Ok(SnapshotReport {
            rows_written: records.len(),
            progress,
            skipped_empty: false,
        })
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

fn render_csv(records: &[CandidateRecord]) -> std::result::Result<Vec<u8>, String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(SINK_HEADERS).map_err(|e| e.to_string())?;
    for record in records {
        writer
            .write_record([
                record.name.as_str(),
                record.title.as_str(),
                record.company.as_str(),
                &record.tenure.to_string(),
                &record.contact.to_string(),
                record.profile_url.as_str(),
                record.raw_text.as_str(),
            ])
            .map_err(|e| e.to_string())?;
    }
    writer.into_inner().map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use prospector_types::{ContactHandle, TenureInterval};
    use std::sync::Arc;

    fn sample_record(name: &str) -> CandidateRecord {
        CandidateRecord {
            name: name.into(),
            title: "产品经理".into(),
            company: "腾讯".into(),
            tenure: TenureInterval::parse("2022.01 - 2023.06"),
            contact: ContactHandle::phone("13812345678"),
            profile_url: format!("https://example.com/{name}"),
            raw_text: "resume text".into(),
        }
    }

    fn store_with_sink(dir: &tempfile::TempDir) -> ResultStore {
        let store = ResultStore::new();
        store.set_sink_path(dir.path().join("out.csv"));
        store
    }

    #[test]
    fn append_advances_qualified() {
        let store = ResultStore::new();
        let p = store.append(sample_record("a"));
        assert_eq!(p.qualified, 1);
        let p = store.append(sample_record("b"));
        assert_eq!(p.qualified, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn advance_processed_sets_the_counter() {
        let store = ResultStore::new();
        for n in 1..=5 {
            store.advance_processed(n);
        }
        assert_eq!(store.progress().processed, 5);
        // Re-applying the final value is a no-op.
        store.advance_processed(5);
        assert_eq!(store.progress().processed, 5);
    }

    #[test]
    fn reset_zeroes_everything() {
        let store = ResultStore::new();
        store.advance_processed(3);
        store.append(sample_record("a"));
        store.reset();
        assert!(store.is_empty());
        assert_eq!(store.progress(), Progress::default());
    }

    #[tokio::test]
    async fn concurrent_appends_lose_no_updates() {
        let store = Arc::new(ResultStore::new());
        let mut tasks = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.append(sample_record(&format!("c{i}")));
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(store.len(), 32);
        assert_eq!(store.progress().qualified, 32);
    }

    #[tokio::test]
    async fn snapshot_without_sink_path_is_config_error() {
        let store = ResultStore::new();
        store.append(sample_record("a"));
        let err = store.snapshot().await.unwrap_err();
        assert!(matches!(err, ProspectorError::Config(_)));
    }

    #[tokio::test]
    async fn empty_snapshot_skips_write_but_reports_counters() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_sink(&dir);
        store.advance_processed(7);

        let report = store.snapshot().await.unwrap();
        assert!(report.skipped_empty);
        assert_eq!(report.rows_written, 0);
        assert_eq!(report.progress.processed, 7);
        assert!(!dir.path().join("out.csv").exists());
    }

    #[tokio::test]
    async fn snapshot_writes_schema_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_sink(&dir);
        store.append(sample_record("张先生"));
        store.append(sample_record("李女士"));

        let report = store.snapshot().await.unwrap();
        assert_eq!(report.rows_written, 2);

        let contents = std::fs::read_to_string(dir.path().join("out.csv")).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "姓名,职位,在职公司,在职时间,云号码,简历链接,Profile"
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("张先生,产品经理,腾讯,22/1-23/6,云 13812345678,"));
        assert_eq!(lines.count(), 1);
    }

    #[tokio::test]
    async fn snapshot_overwrites_with_full_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_sink(&dir);
        store.append(sample_record("a"));
        store.snapshot().await.unwrap();

        store.append(sample_record("b"));
        store.snapshot().await.unwrap();

        let contents = std::fs::read_to_string(dir.path().join("out.csv")).unwrap();
        // Header plus both records: overwrite, not incremental append.
        assert_eq!(contents.lines().count(), 3);
    }

    #[tokio::test]
    async fn failed_snapshot_leaves_store_intact_and_can_retry() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no_such_dir").join("out.csv");
        let store = ResultStore::new();
        store.set_sink_path(&missing);
        store.append(sample_record("a"));

        let err = store.snapshot().await.unwrap_err();
        assert!(matches!(err, ProspectorError::SinkWrite { .. }));
        assert_eq!(store.len(), 1);

        // Once the directory exists the next trigger succeeds.
        std::fs::create_dir_all(missing.parent().unwrap()).unwrap();
        let report = store.snapshot().await.unwrap();
        assert_eq!(report.rows_written, 1);
    }
}
