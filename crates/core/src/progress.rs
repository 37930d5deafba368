use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::types::ChunkProgress;

/// The durable snapshot external pollers read. Only state visible outside
/// the process before the job finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub status: String,
    pub progress: u32,
    pub status_index: u32,
    pub chunk_progress: ChunkProgress,
    pub timestamp: f64,
}

/// Destination for progress records. Reporting must never fail the run.
pub trait ProgressSink: Send + Sync {
    fn report(&self, status: &str, percent: u32, status_index: u32, chunk: ChunkProgress);
}

/// Discards every report. For tests and headless library use.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _status: &str, _percent: u32, _status_index: u32, _chunk: ChunkProgress) {}
}

/// Writes records to a JSON file via temp-sibling + fsync + atomic rename,
/// so a reader never observes a partially written record. Percent and stage
/// index are clamped to be non-decreasing within this run.
pub struct FileProgressSink {
    path: PathBuf,
    percent_watermark: AtomicU32,
    index_watermark: AtomicU32,
}

impl FileProgressSink {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            percent_watermark: AtomicU32::new(0),
            index_watermark: AtomicU32::new(0),
        }
    }

    /// Conventional location next to the narrative output: same stem with a
    /// `_progress.json` suffix.
    pub fn for_output(output_path: &Path) -> Self {
        let stem = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        Self::new(output_path.with_file_name(format!("{stem}_progress.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_record(&self, record: &ProgressRecord) -> std::io::Result<()> {
        let payload = serde_json::to_vec(record).map_err(std::io::Error::other)?;
        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&payload)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ProgressSink for FileProgressSink {
    fn report(&self, status: &str, percent: u32, status_index: u32, chunk: ChunkProgress) {
        let percent = self
            .percent_watermark
            .fetch_max(percent.min(100), Ordering::Relaxed)
            .max(percent.min(100));
        let status_index = self
            .index_watermark
            .fetch_max(status_index, Ordering::Relaxed)
            .max(status_index);

        let record = ProgressRecord {
            status: status.to_string(),
            progress: percent,
            status_index,
            chunk_progress: chunk,
            timestamp: now_secs(),
        };
        if let Err(err) = self.write_record(&record) {
            // losing a progress update must not abort the conversion
            tracing::warn!(path = %self.path.display(), "failed to write progress file: {err}");
        }
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_record(sink: &FileProgressSink) -> ProgressRecord {
        let raw = fs::read_to_string(sink.path()).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn progress_path_derives_from_output_stem() {
        let sink = FileProgressSink::for_output(Path::new("/out/movie_narrative.txt"));
        assert_eq!(
            sink.path(),
            Path::new("/out/movie_narrative_progress.json")
        );
    }

    #[test]
    fn canonical_file_always_holds_one_valid_record() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileProgressSink::new(dir.path().join("job_progress.json"));

        for (status, percent, index) in [
            ("Starting...", 0, 0),
            ("Extracting audio...", 12, 0),
            ("Transcribing dialogue...", 20, 1),
            ("Analyzing frames...", 55, 2),
        ] {
            sink.report(status, percent, index, ChunkProgress::default());
            let record = read_record(&sink);
            assert_eq!(record.status, status);
            assert_eq!(record.progress, percent);
            assert_eq!(record.status_index, index);
        }
    }

    #[test]
    fn temp_sibling_is_renamed_away() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileProgressSink::new(dir.path().join("job_progress.json"));
        sink.report("Starting...", 0, 0, ChunkProgress::default());
        assert!(sink.path().exists());
        assert!(!dir.path().join("job_progress.json.tmp").exists());
    }

    #[test]
    fn percent_never_regresses_within_a_run() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileProgressSink::new(dir.path().join("job_progress.json"));

        sink.report("Analyzing frames...", 55, 2, ChunkProgress::default());
        sink.report("Error: boom", 0, 0, ChunkProgress::default());

        let record = read_record(&sink);
        assert_eq!(record.status, "Error: boom");
        assert_eq!(record.progress, 55);
        assert_eq!(record.status_index, 2);
    }

    #[test]
    fn percent_is_capped_at_one_hundred() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileProgressSink::new(dir.path().join("job_progress.json"));
        sink.report("Completed", 250, 4, ChunkProgress::default());
        assert_eq!(read_record(&sink).progress, 100);
    }

    #[test]
    fn unwritable_path_is_swallowed() {
        let sink = FileProgressSink::new(PathBuf::from("/nonexistent/dir/progress.json"));
        sink.report("Starting...", 0, 0, ChunkProgress::default());
    }
}
