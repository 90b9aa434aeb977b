//! The streaming pipeline driver.
//!
//! One sequential task streams batches from the reader and runs
//! sanitize -> chunk -> fingerprint dedup -> embed -> semantic dedup ->
//! validate over each, carrying the fingerprint map and the vector index
//! across batches so duplicates are caught globally. Parallelism lives
//! inside the stages (rayon over the rows of one batch); the driver is
//! cancelable only at batch boundaries so audit and index state stay
//! consistent. Cleaned records leave through the bounded writer channel in
//! arrival order.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use entropyguard_core::audit::{AuditLog, DropReason};
use entropyguard_core::config::PipelineConfig;
use entropyguard_core::errors::{PipelineError, ProcessingError, ResourceError, ValidationError};
use entropyguard_core::runtime::RuntimeContext;
use entropyguard_core::stats::PipelineStats;
use entropyguard_core::telemetry::{self, RunMetadata};
use entropyguard_core::types::{RawRow, Record};
use entropyguard_io::checkpoint::CheckpointManager;
use entropyguard_io::reader::{open_input, InputSource, RowErrorKind, RowReader, SchemaProbe};
use entropyguard_io::writer::{NdjsonWriter, SinkTarget};
use rayon::prelude::*;
use serde::Serialize;

use crate::chunk::Chunker;
use crate::dedup::embedder::{is_zero_vector, BatchedEmbedder, Embedder};
use crate::dedup::fingerprint::{fingerprint, FingerprintIndex, FingerprintOutcome};
use crate::dedup::index::{similarity_to_radius, VectorIndex};
use crate::guards;
use crate::sanitize::{normalize_for_fingerprint, SanitizeDrop, SanitizeOutcome, SanitizeOptions, Sanitizer};
use crate::validate::{check_length, LengthVerdict};

/// Neighbors consulted per new vector, capped by the index size.
const SEARCH_K: usize = 100;

/// Machine-readable result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub success: bool,
    pub cancelled: bool,
    pub input_path: String,
    pub output_path: Option<String>,
    pub audit_log_path: Option<String>,
    pub text_column: String,
    pub rows_written: u64,
    pub duration_ms: u64,
    pub dry_run: bool,
    pub stats: PipelineStats,
}

/// The orchestrator. Owns nothing until `run`; cross-batch state lives in
/// a `RunState` for exactly one run.
pub struct PipelineEngine {
    config: PipelineConfig,
    ctx: RuntimeContext,
}

impl PipelineEngine {
    pub fn new(config: PipelineConfig, ctx: RuntimeContext) -> Self {
        Self { config, ctx }
    }

    /// Execute the full pipeline with the given embedding backend.
    ///
    /// On failure, audit events and stats accumulated so far are flushed
    /// best-effort before the error surfaces; partial output stays on
    /// disk for forensics.
    pub fn run(&self, backend: Arc<dyn Embedder>) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        self.config.validate()?;

        let input = InputSource::parse(&self.config.effective_input_path());
        let sink_target = SinkTarget::parse(&self.config.effective_output_path());

        // Pre-flight guards.
        if let Some(estimate) = guards::estimate_output_bytes(&input) {
            guards::check_disk_space(&sink_target, estimate)?;
        }
        guards::check_memory(self.config.max_memory_mb)?;

        // Open and probe.
        let text_hint = self.config.text_column.clone().unwrap_or_else(|| "text".into());
        let raw_reader = open_input(&input, &self.ctx.capabilities, &text_hint)?;
        let (probe, mut reader) = SchemaProbe::probe(raw_reader);
        if probe.sampled_rows == 0 {
            return Err(ValidationError::EmptyInput.into());
        }
        if let Some(required) = &self.config.required_columns {
            let missing = probe.missing_columns(required);
            if !missing.is_empty() {
                return Err(ValidationError::MissingColumns { columns: missing }.into());
            }
        }
        let text_column = match &self.config.text_column {
            Some(c) if probe.has_column(c) => c.clone(),
            Some(c) => {
                return Err(ValidationError::MissingColumns {
                    columns: vec![c.clone()],
                }
                .into());
            }
            None => probe.auto_text_column()?,
        };

        // Stage components.
        let sanitizer = Sanitizer::new(SanitizeOptions {
            remove_pii: true,
            normalize_text: self.config.normalize_text.unwrap_or(false),
            missing: self.config.effective_missing_policy(),
            fill_value: self.config.fill_value.clone().unwrap_or_default(),
        });
        let chunker = if self.config.chunking_enabled() {
            let chunker = Chunker::new(
                self.config.chunk_size.unwrap_or(0),
                self.config.effective_chunk_overlap(),
                self.config.effective_separators(),
            )?;
            chunker.check_separator_depth()?;
            Some(chunker)
        } else {
            None
        };
        let embedder = BatchedEmbedder::new(backend, self.config.effective_embed_batch_size());
        let index = VectorIndex::new(embedder.dimension())
            .store_vectors(self.config.effective_store_vectors());
        let radius = similarity_to_radius(self.config.effective_dedup_threshold());

        // Checkpoints bind to the input bytes and the canonical config.
        let checkpoints =
            CheckpointManager::new(self.config.checkpoint_dir.as_ref().map(PathBuf::from));
        let checkpoint_fps = if checkpoints.is_enabled() {
            match &input {
                InputSource::Path(p) => CheckpointManager::fingerprint_input(p)
                    .map(|ifp| (ifp, CheckpointManager::fingerprint_config(&self.config.canonical_json()))),
                InputSource::Stdin => {
                    tracing::warn!("checkpointing requires a file input; disabled for stdin");
                    None
                }
            }
        } else {
            None
        };
        let resume = self.config.resume.unwrap_or(false);
        if let Some((ifp, cfp)) = &checkpoint_fps {
            checkpoints.begin_run(ifp, cfp, resume);
        }

        let writer = if self.config.is_dry_run() {
            None
        } else {
            Some(NdjsonWriter::spawn(sink_target)?)
        };

        let mut state = RunState {
            text_column,
            min_length: self.config.effective_min_length(),
            radius,
            sanitizer,
            chunker,
            embedder,
            fingerprints: FingerprintIndex::new(),
            index,
            audit: AuditLog::new(),
            stats: PipelineStats::default(),
            writer,
            checkpoints,
            checkpoint_fps,
            rows_ingested: 0,
            show_progress: self.config.effective_show_progress(),
        };

        // Resume: replay previously validated survivors and rebuild the
        // cross-batch state from them before consuming fresh input.
        let mut skip_rows = 0u64;
        if resume {
            if let Some((ifp, cfp)) = state.checkpoint_fps.clone() {
                if let Some((meta, records)) =
                    state.checkpoints.load("after_validation", &ifp, &cfp)
                {
                    skip_rows = meta.rows_ingested;
                    state.seed_from_checkpoint(records, meta.rows_ingested)?;
                    tracing::info!(
                        resumed_rows = state.stats.final_rows,
                        skipped_input_rows = skip_rows,
                        "resumed from checkpoint"
                    );
                }
            }
        }

        let loop_result = self.drive_loop(&mut state, &mut reader, skip_rows);
        match loop_result {
            Ok(cancelled) => self.finalize(state, started, cancelled, &input),
            Err(err) => {
                state.abort_flush(self.config.audit_log_path.as_deref());
                Err(err)
            }
        }
    }

    /// The batch loop. Returns whether the run was cancelled cooperatively.
    fn drive_loop(
        &self,
        state: &mut RunState,
        reader: &mut dyn RowReader,
        skip_rows: u64,
    ) -> Result<bool, PipelineError> {
        let batch_size = self.config.effective_batch_size();
        let mut skipped = 0u64;
        let mut next_index = skip_rows;
        let mut eof = false;

        while !eof {
            if self.ctx.cancel.is_cancelled() {
                tracing::warn!("cancellation requested; finalizing at batch boundary");
                return Ok(true);
            }
            if let Some(deadline) = self.ctx.deadline {
                if deadline.exceeded() {
                    return Err(ResourceError::Timeout {
                        elapsed_secs: deadline.elapsed_secs(),
                        budget_secs: deadline.budget_secs(),
                    }
                    .into());
                }
            }
            guards::check_memory(self.config.max_memory_mb)?;

            let mut batch: Vec<(u64, RawRow)> = Vec::with_capacity(batch_size.min(4096));
            while batch.len() < batch_size {
                match reader.next_row() {
                    None => {
                        eof = true;
                        break;
                    }
                    Some(Ok(row)) => {
                        if skipped < skip_rows {
                            skipped += 1;
                            continue;
                        }
                        batch.push((next_index, row));
                        next_index += 1;
                    }
                    Some(Err(e)) if e.kind == RowErrorKind::Malformed => {
                        if skipped < skip_rows {
                            skipped += 1;
                            continue;
                        }
                        // Row-scoped failure: audit and move on.
                        state.stats.original_rows += 1;
                        state.rows_ingested += 1;
                        state.audit.record(
                            next_index,
                            DropReason::ValidationEmptyOrNull,
                            format!("unreadable row: {}", e.message),
                        );
                        state.stats.record_drop(0);
                        next_index += 1;
                    }
                    Some(Err(e)) => {
                        return Err(ProcessingError::Ingest {
                            message: e.to_string(),
                        }
                        .into());
                    }
                }
            }

            if batch.is_empty() {
                continue;
            }
            state.stats.original_rows += batch.len() as u64;
            state.rows_ingested += batch.len() as u64;
            state.process_batch(batch)?;

            if state.show_progress {
                tracing::info!(
                    ingested = state.rows_ingested,
                    kept = state.stats.final_rows,
                    exact_dups = state.stats.exact_duplicates_removed,
                    semantic_dups = state.stats.semantic_duplicates_removed,
                    "batch complete"
                );
            }
        }
        Ok(false)
    }

    fn finalize(
        &self,
        state: RunState,
        started: Instant,
        cancelled: bool,
        input: &InputSource,
    ) -> Result<RunReport, PipelineError> {
        let RunState {
            audit,
            stats,
            writer,
            text_column,
            ..
        } = state;

        if let Some(path) = &self.config.audit_log_path {
            audit.flush_to(std::path::Path::new(path))?;
        }
        let rows_written = match writer {
            Some(w) => w.finish()?,
            None => 0,
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let metadata = RunMetadata::new(&input.display(), duration_ms, stats.clone());
        telemetry::deliver_run(
            &self.ctx.capabilities,
            self.config.telemetry_endpoint.as_deref(),
            &metadata,
            audit.events(),
        );

        debug_assert!(stats.is_monotone());
        Ok(RunReport {
            success: true,
            cancelled,
            input_path: input.display(),
            output_path: self.config.output_path.clone(),
            audit_log_path: self.config.audit_log_path.clone(),
            text_column,
            rows_written,
            duration_ms,
            dry_run: self.config.is_dry_run(),
            stats,
        })
    }
}

/// Cross-batch state for one run.
struct RunState {
    text_column: String,
    min_length: usize,
    radius: f32,
    sanitizer: Sanitizer,
    chunker: Option<Chunker>,
    embedder: BatchedEmbedder,
    fingerprints: FingerprintIndex,
    index: VectorIndex,
    audit: AuditLog,
    stats: PipelineStats,
    writer: Option<NdjsonWriter>,
    checkpoints: CheckpointManager,
    checkpoint_fps: Option<(String, String)>,
    rows_ingested: u64,
    show_progress: bool,
}

impl RunState {
    /// Run every stage over one batch. Stage order is fixed; the embed
    /// stage retries once on a retryable processing error before the
    /// batch fails.
    fn process_batch(&mut self, batch: Vec<(u64, RawRow)>) -> Result<(), PipelineError> {
        // Stage: sanitize (batch-parallel, pure per row).
        let outcomes = self.sanitizer.sanitize_batch(batch, &self.text_column);
        let mut records: Vec<Record> = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                SanitizeOutcome::Kept(r) => records.push(r),
                SanitizeOutcome::Dropped {
                    original_index,
                    reason,
                } => {
                    let (reason, details) = match reason {
                        SanitizeDrop::NullOrEmpty => (
                            DropReason::SanitizationDroppedNull,
                            "text null or empty after sanitization".to_string(),
                        ),
                        SanitizeDrop::MissingColumn => (
                            DropReason::SchemaMissingColumn,
                            format!("column '{}' absent from row", self.text_column),
                        ),
                    };
                    self.audit.record(original_index, reason, details);
                    self.stats.record_drop(0);
                }
            }
        }
        self.stats.after_sanitization_rows += records.len() as u64;

        // Stage: chunk. Chunks become independent rows from here on.
        let records: Vec<Record> = match &self.chunker {
            Some(chunker) => records
                .into_iter()
                .flat_map(|r| chunker.chunk_record(r))
                .collect(),
            None => records,
        };
        self.stats.after_chunking_rows += records.len() as u64;

        // Stage: fingerprint dedup. O(1) per row, before the embedder.
        let mut survivors: Vec<Record> = Vec::with_capacity(records.len());
        for record in records {
            let fp = fingerprint(&normalize_for_fingerprint(&record.text));
            match self.fingerprints.check_insert(fp, record.original_index) {
                FingerprintOutcome::Inserted => survivors.push(record),
                FingerprintOutcome::Duplicate { canonical } => {
                    self.audit.record(
                        record.original_index,
                        DropReason::ExactDuplicate,
                        format!("Duplicate of original row {canonical}"),
                    );
                    self.stats.exact_duplicates_removed += 1;
                    self.stats.record_drop(record.char_len());
                }
            }
        }
        self.stats.after_exact_dedup_rows += survivors.len() as u64;
        self.checkpoint("after_exact_dedup", &survivors);

        // Stage: embed, with one retry on transient backend failure.
        let texts: Vec<&str> = survivors.iter().map(|r| r.text.as_str()).collect();
        let vectors = match self.embedder.embed_normalized(&texts) {
            Ok(v) => v,
            Err(e) if e.is_retryable() => {
                tracing::warn!(error = %e, "embed failed; retrying batch once");
                self.embedder.embed_normalized(&texts)?
            }
            Err(e) => return Err(e.into()),
        };

        // Zero vectors are the embedder's degenerate-input sentinel.
        let mut keep: Vec<Record> = Vec::with_capacity(survivors.len());
        let mut vecs: Vec<Vec<f32>> = Vec::with_capacity(survivors.len());
        for (record, vector) in survivors.into_iter().zip(vectors) {
            if is_zero_vector(&vector) {
                self.stats.record_drop(record.char_len());
                self.audit.record(
                    record.original_index,
                    DropReason::ValidationEmptyOrNull,
                    "embedding collapsed to zero vector".to_string(),
                );
            } else {
                keep.push(record);
                vecs.push(vector);
            }
        }

        // Stage: index insert + radius query against everything seen so
        // far. Searches fan out in parallel; verdicts apply in order.
        let originals: Vec<u64> = keep.iter().map(|r| r.original_index).collect();
        let ids = self.index.add(&vecs, &originals)?;
        let k = SEARCH_K.min(self.index.len());
        let index = &self.index;
        let radius = self.radius;
        let verdicts: Vec<Option<(u64, f32)>> = vecs
            .par_iter()
            .zip(ids.par_iter())
            .map(|(vector, id)| {
                let id = (*id)?;
                index
                    .search(vector, k)
                    .into_iter()
                    .filter(|h| h.vector_id < id && h.dist_sq <= radius)
                    .min_by_key(|h| h.vector_id)
                    .map(|h| (h.original_index, h.dist_sq))
            })
            .collect();

        let mut deduped: Vec<Record> = Vec::with_capacity(keep.len());
        for (record, verdict) in keep.into_iter().zip(verdicts) {
            match verdict {
                Some((canonical, dist_sq)) => {
                    self.stats.semantic_duplicates_removed += 1;
                    self.stats.record_drop(record.char_len());
                    self.audit.record(
                        record.original_index,
                        DropReason::SemanticDuplicate,
                        format!("Duplicate of original row {canonical} (distance_sq {dist_sq:.4})"),
                    );
                }
                None => deduped.push(record),
            }
        }
        self.stats.after_semantic_dedup_rows += deduped.len() as u64;
        self.checkpoint("after_semantic_dedup", &deduped);

        // Stage: final length gate.
        let mut cleaned: Vec<Record> = Vec::with_capacity(deduped.len());
        for record in deduped {
            match check_length(&record.text, self.min_length) {
                LengthVerdict::Ok => cleaned.push(record),
                LengthVerdict::EmptyOrNull => {
                    self.stats.validation_dropped += 1;
                    self.stats.record_drop(record.char_len());
                    self.audit.record(
                        record.original_index,
                        DropReason::ValidationEmptyOrNull,
                        "text empty after sanitization".to_string(),
                    );
                }
                LengthVerdict::TooShort { len } => {
                    self.stats.validation_dropped += 1;
                    self.stats.record_drop(record.char_len());
                    self.audit.record(
                        record.original_index,
                        DropReason::ValidationTooShort,
                        format!("length {len} below minimum {}", self.min_length),
                    );
                }
            }
        }
        self.stats.after_validation_rows += cleaned.len() as u64;
        self.checkpoint("after_validation", &cleaned);

        // Stage: output, in arrival order.
        for record in &cleaned {
            self.write_record(record)?;
        }
        self.stats.final_rows += cleaned.len() as u64;
        Ok(())
    }

    /// Rebuild cross-batch state from checkpointed survivors and re-emit
    /// them to the sink.
    fn seed_from_checkpoint(
        &mut self,
        records: Vec<Record>,
        rows_ingested: u64,
    ) -> Result<(), PipelineError> {
        for record in &records {
            let fp = fingerprint(&normalize_for_fingerprint(&record.text));
            self.fingerprints.check_insert(fp, record.original_index);
        }
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        let vectors = self.embedder.embed_normalized(&texts)?;
        let mut keep_vecs = Vec::new();
        let mut keep_ids = Vec::new();
        for (record, vector) in records.iter().zip(vectors) {
            if !is_zero_vector(&vector) {
                keep_vecs.push(vector);
                keep_ids.push(record.original_index);
            }
        }
        self.index.add(&keep_vecs, &keep_ids)?;

        for record in &records {
            self.write_record(record)?;
        }

        let n = records.len() as u64;
        self.stats.original_rows = rows_ingested;
        self.stats.after_sanitization_rows = n;
        self.stats.after_chunking_rows = n;
        self.stats.after_exact_dedup_rows = n;
        self.stats.after_semantic_dedup_rows = n;
        self.stats.after_validation_rows = n;
        self.stats.final_rows = n;
        self.rows_ingested = rows_ingested;
        Ok(())
    }

    fn write_record(&mut self, record: &Record) -> Result<(), ProcessingError> {
        let Some(writer) = &self.writer else {
            return Ok(());
        };
        let line = serde_json::to_string(&record.to_output_json(&self.text_column)).map_err(|e| {
            ProcessingError::OutputWrite {
                message: e.to_string(),
            }
        })?;
        writer.write_line(line)
    }

    /// Best-effort checkpoint append; never fails the run.
    fn checkpoint(&self, stage: &str, records: &[Record]) {
        if records.is_empty() {
            return;
        }
        if let Some((ifp, cfp)) = &self.checkpoint_fps {
            self.checkpoints
                .append(stage, records, ifp, cfp, self.rows_ingested);
        }
    }

    /// Flush whatever forensics exist after a hard failure.
    fn abort_flush(self, audit_path: Option<&str>) {
        if let Some(path) = audit_path {
            if let Err(e) = self.audit.flush_to(std::path::Path::new(path)) {
                tracing::warn!(error = %e, "audit flush failed during abort");
            }
        }
        if let Some(writer) = self.writer {
            match writer.finish() {
                Ok(rows) => tracing::warn!(rows, "partial output retained after failure"),
                Err(e) => tracing::warn!(error = %e, "output flush failed during abort"),
            }
        }
        tracing::warn!(
            original_rows = self.stats.original_rows,
            final_rows = self.stats.final_rows,
            "run aborted; partial audit and output left on disk"
        );
    }
}
