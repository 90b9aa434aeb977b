//! Content-addressed checkpoints.
//!
//! After each named stage the orchestrator may append the batch's
//! survivors to a per-stage NDJSON shard, bound to the exact input and
//! config fingerprints. On resume, a checkpoint is only honored when both
//! fingerprints match; anything else means start over. Checkpointing is
//! best-effort end to end: persistence failures log a warning and the run
//! continues.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use entropyguard_core::types::Record;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::Xxh3;

/// Stage names eligible for checkpointing, in pipeline order.
pub const STAGES: &[&str] = &["after_exact_dedup", "after_semantic_dedup", "after_validation"];

/// Metadata binding a shard to its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub stage: String,
    pub input_fingerprint: String,
    pub config_fingerprint: String,
    /// Milliseconds since the epoch at last save.
    pub created_ms: u64,
    /// Rows currently in the shard.
    pub rows: u64,
    /// Input rows consumed when the shard was last saved.
    pub rows_ingested: u64,
    /// Shard file name, relative to the checkpoint directory.
    pub shard: String,
}

/// Manages the checkpoint directory. Disabled (all no-ops) when built
/// without a directory.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: Option<PathBuf>,
}

impl CheckpointManager {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// xxh3 hex digest of a file's bytes, streamed. `None` when unreadable.
    pub fn fingerprint_input(path: &Path) -> Option<String> {
        let mut file = File::open(path).ok()?;
        let mut hasher = Xxh3::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => hasher.update(&buf[..n]),
                Err(_) => return None,
            }
        }
        Some(format!("{:016x}", hasher.digest()))
    }

    /// xxh3 hex digest of the canonical config JSON.
    pub fn fingerprint_config(canonical_json: &str) -> String {
        format!("{:016x}", xxhash_rust::xxh3::xxh3_64(canonical_json.as_bytes()))
    }

    /// Drop stage files that do not match this run's fingerprints (or all
    /// of them when not resuming), so stale shards never mix with fresh
    /// appends.
    pub fn begin_run(&self, input_fp: &str, config_fp: &str, resume: bool) {
        let Some(dir) = &self.dir else { return };
        if let Err(e) = std::fs::create_dir_all(dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "cannot create checkpoint dir");
            return;
        }
        for stage in STAGES {
            let keep = resume
                && self
                    .read_metadata(stage)
                    .is_some_and(|m| m.input_fingerprint == input_fp && m.config_fingerprint == config_fp);
            if !keep {
                self.remove_stage(stage);
            }
        }
    }

    /// Append `records` to the stage shard and rewrite its metadata.
    /// Returns the shard path, or `None` when disabled or on failure.
    pub fn append(
        &self,
        stage: &str,
        records: &[Record],
        input_fp: &str,
        config_fp: &str,
        rows_ingested: u64,
    ) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let shard_name = format!("checkpoint-{stage}.ndjson");
        let shard_path = dir.join(&shard_name);

        let result = (|| -> std::io::Result<u64> {
            let mut shard = OpenOptions::new().create(true).append(true).open(&shard_path)?;
            for record in records {
                let line = serde_json::to_string(record)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                shard.write_all(line.as_bytes())?;
                shard.write_all(b"\n")?;
            }
            shard.sync_all()?;

            let previous = self.read_metadata(stage).map_or(0, |m| m.rows);
            let metadata = CheckpointMetadata {
                stage: stage.to_string(),
                input_fingerprint: input_fp.to_string(),
                config_fingerprint: config_fp.to_string(),
                created_ms: now_ms(),
                rows: previous + records.len() as u64,
                rows_ingested,
                shard: shard_name.clone(),
            };
            let meta_json = serde_json::to_string_pretty(&metadata)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            std::fs::write(meta_path(dir, stage), meta_json)?;
            Ok(metadata.rows)
        })();

        match result {
            Ok(rows) => {
                tracing::debug!(stage, rows, "checkpoint saved");
                Some(shard_path)
            }
            Err(e) => {
                tracing::warn!(stage, error = %e, "checkpoint save failed (run continues)");
                None
            }
        }
    }

    /// Load a stage checkpoint iff both fingerprints match exactly.
    pub fn load(
        &self,
        stage: &str,
        input_fp: &str,
        config_fp: &str,
    ) -> Option<(CheckpointMetadata, Vec<Record>)> {
        let dir = self.dir.as_ref()?;
        let metadata = self.read_metadata(stage)?;
        if metadata.input_fingerprint != input_fp || metadata.config_fingerprint != config_fp {
            tracing::info!(stage, "checkpoint fingerprints do not match; starting over");
            return None;
        }

        let shard_path = dir.join(&metadata.shard);
        let file = File::open(&shard_path).ok()?;
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.ok()?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str::<Record>(&line).ok()?);
        }
        tracing::info!(stage, rows = records.len(), "checkpoint loaded");
        Some((metadata, records))
    }

    /// The most recently saved checkpoint across stages, if any.
    pub fn find_latest(&self) -> Option<CheckpointMetadata> {
        STAGES
            .iter()
            .filter_map(|stage| self.read_metadata(stage))
            .max_by_key(|m| (m.created_ms, stage_ordinal(&m.stage)))
    }

    /// Remove checkpoints; with `keep_latest`, the newest one survives.
    pub fn cleanup(&self, keep_latest: bool) {
        let keep = if keep_latest { self.find_latest() } else { None };
        for stage in STAGES {
            if keep.as_ref().is_some_and(|m| m.stage == *stage) {
                continue;
            }
            self.remove_stage(stage);
        }
    }

    /// All stage metadata currently on disk.
    pub fn all_metadata(&self) -> Vec<CheckpointMetadata> {
        STAGES.iter().filter_map(|s| self.read_metadata(s)).collect()
    }

    fn read_metadata(&self, stage: &str) -> Option<CheckpointMetadata> {
        let dir = self.dir.as_ref()?;
        let raw = std::fs::read_to_string(meta_path(dir, stage)).ok()?;
        serde_json::from_str(&raw).ok()
    }

    fn remove_stage(&self, stage: &str) {
        let Some(dir) = &self.dir else { return };
        let _ = std::fs::remove_file(dir.join(format!("checkpoint-{stage}.ndjson")));
        let _ = std::fs::remove_file(meta_path(dir, stage));
    }
}

fn meta_path(dir: &Path, stage: &str) -> PathBuf {
    dir.join(format!("checkpoint-{stage}.meta.json"))
}

fn stage_ordinal(stage: &str) -> usize {
    STAGES.iter().position(|s| *s == stage).unwrap_or(0)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(i: u64) -> Record {
        Record::new(i, format!("checkpoint row {i}"))
    }

    #[test]
    fn disabled_manager_is_a_no_op() {
        let m = CheckpointManager::disabled();
        assert!(!m.is_enabled());
        assert!(m.append("after_exact_dedup", &[record(0)], "a", "b", 1).is_none());
        assert!(m.load("after_exact_dedup", "a", "b").is_none());
        assert!(m.find_latest().is_none());
    }

    #[test]
    fn save_and_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let m = CheckpointManager::new(Some(tmp.path().to_path_buf()));
        m.begin_run("in-fp", "cfg-fp", false);

        let rows = vec![record(0), record(1), record(2)];
        let path = m.append("after_exact_dedup", &rows, "in-fp", "cfg-fp", 3).unwrap();
        assert!(path.exists());

        let (meta, loaded) = m.load("after_exact_dedup", "in-fp", "cfg-fp").unwrap();
        assert_eq!(meta.rows, 3);
        assert_eq!(meta.rows_ingested, 3);
        assert_eq!(loaded, rows);
    }

    #[test]
    fn append_accumulates_across_batches() {
        let tmp = tempfile::tempdir().unwrap();
        let m = CheckpointManager::new(Some(tmp.path().to_path_buf()));
        m.begin_run("fp", "cfg", false);

        m.append("after_validation", &[record(0)], "fp", "cfg", 1).unwrap();
        m.append("after_validation", &[record(1), record(2)], "fp", "cfg", 3).unwrap();

        let (meta, loaded) = m.load("after_validation", "fp", "cfg").unwrap();
        assert_eq!(meta.rows, 3);
        assert_eq!(loaded.len(), 3);
    }

    #[test]
    fn mismatched_fingerprints_yield_none() {
        let tmp = tempfile::tempdir().unwrap();
        let m = CheckpointManager::new(Some(tmp.path().to_path_buf()));
        m.begin_run("fp-a", "cfg-a", false);
        m.append("after_exact_dedup", &[record(0)], "fp-a", "cfg-a", 1).unwrap();

        assert!(m.load("after_exact_dedup", "fp-b", "cfg-a").is_none());
        assert!(m.load("after_exact_dedup", "fp-a", "cfg-b").is_none());
    }

    #[test]
    fn find_latest_prefers_newest_save() {
        let tmp = tempfile::tempdir().unwrap();
        let m = CheckpointManager::new(Some(tmp.path().to_path_buf()));
        m.begin_run("fp", "cfg", false);

        m.append("after_exact_dedup", &[record(0)], "fp", "cfg", 1).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        m.append("after_semantic_dedup", &[record(0)], "fp", "cfg", 1).unwrap();

        let latest = m.find_latest().unwrap();
        assert_eq!(latest.stage, "after_semantic_dedup");
    }

    #[test]
    fn cleanup_keep_latest_retains_exactly_one() {
        let tmp = tempfile::tempdir().unwrap();
        let m = CheckpointManager::new(Some(tmp.path().to_path_buf()));
        m.begin_run("fp", "cfg", false);

        m.append("after_exact_dedup", &[record(0)], "fp", "cfg", 1).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        m.append("after_semantic_dedup", &[record(0)], "fp", "cfg", 1).unwrap();
        assert_eq!(m.all_metadata().len(), 2);

        m.cleanup(true);
        let remaining = m.all_metadata();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].stage, "after_semantic_dedup");

        m.cleanup(false);
        assert!(m.all_metadata().is_empty());
    }

    #[test]
    fn begin_run_wipes_stale_state() {
        let tmp = tempfile::tempdir().unwrap();
        let m = CheckpointManager::new(Some(tmp.path().to_path_buf()));
        m.begin_run("fp-old", "cfg", false);
        m.append("after_validation", &[record(0)], "fp-old", "cfg", 1).unwrap();

        // Same dir, new input, resume requested: stale checkpoint must go.
        m.begin_run("fp-new", "cfg", true);
        assert!(m.load("after_validation", "fp-new", "cfg").is_none());
        assert!(m.all_metadata().is_empty());
    }

    #[test]
    fn input_fingerprint_is_stable() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("input.ndjson");
        std::fs::write(&path, "{\"text\": \"hello\"}\n").unwrap();
        let a = CheckpointManager::fingerprint_input(&path).unwrap();
        let b = CheckpointManager::fingerprint_input(&path).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);

        std::fs::write(&path, "{\"text\": \"changed\"}\n").unwrap();
        let c = CheckpointManager::fingerprint_input(&path).unwrap();
        assert_ne!(a, c);
    }
}
