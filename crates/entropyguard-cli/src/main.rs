//! EntropyGuard command line.
//!
//! Thin front end: parse flags, merge the config file, wire up the engine,
//! map errors to the exit-code contract (0 success, 1 processing,
//! 2 validation, 3 resource). Stdout carries records when `--output -`;
//! every log line goes to stderr.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use entropyguard_core::capability::CapabilityRegistry;
use entropyguard_core::config::{load_config_file, MissingPolicy, PipelineConfig};
use entropyguard_core::errors::{GuardErrorCode, PipelineError, ValidationError};
use entropyguard_core::runtime::RuntimeContext;
use entropyguard_pipeline::engine::{PipelineEngine, RunReport};
use entropyguard_pipeline::dedup::embedder::{Embedder, HashingEmbedder};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "entropyguard",
    version,
    about = "Batch data-quality firewall for text corpora",
    long_about = "Streams a dirty input table through sanitization, chunking, exact and \
semantic deduplication, and validation, emitting cleaned NDJSON plus a structured audit trail."
)]
struct Cli {
    /// Input file (.ndjson/.jsonl/.json/.csv, more via plugins), or - for
    /// stdin (the default when neither flag nor config file names one).
    #[arg(long)]
    input: Option<String>,

    /// Output file (NDJSON), or - for stdout (the default).
    #[arg(long)]
    output: Option<String>,

    /// Text column to process; auto-detected from a 100-row sample if omitted.
    #[arg(long)]
    text_column: Option<String>,

    /// Comma-separated list of columns that must exist in the input.
    #[arg(long, value_delimiter = ',')]
    required_columns: Option<Vec<String>>,

    /// Minimum text length after sanitization (default 50).
    #[arg(long)]
    min_length: Option<i64>,

    /// Similarity threshold for semantic deduplication, in [0, 1] (default 0.95).
    #[arg(long)]
    dedup_threshold: Option<f64>,

    /// Embedder identifier: "hashing" (built-in) or a model2vec model id.
    #[arg(long)]
    model_name: Option<String>,

    /// Rows per streaming batch (default 10000).
    #[arg(long)]
    batch_size: Option<i64>,

    /// Enable chunking with this maximum chunk size in characters.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Character overlap between consecutive chunks (default 50).
    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Chunk separators, tried in order. Escapes \n and \t are decoded;
    /// an empty string forces a fixed-width split.
    #[arg(long, num_args = 1..)]
    separators: Option<Vec<String>>,

    /// Write the audit trail (JSON array) to this path.
    #[arg(long)]
    audit_log: Option<String>,

    /// Config file (JSON/TOML, YAML with the yaml-config feature).
    /// Defaults to .entropyguardrc.* discovery in the working directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the machine-readable run report.
    #[arg(long)]
    json: bool,

    /// Verbose logging (debug level).
    #[arg(long)]
    verbose: bool,

    /// Quiet mode: errors only, no summary.
    #[arg(long)]
    quiet: bool,

    /// Run the full pipeline without writing the output file.
    #[arg(long)]
    dry_run: bool,

    /// Directory for stage checkpoints.
    #[arg(long)]
    checkpoint_dir: Option<String>,

    /// Resume from the latest matching checkpoint.
    #[arg(long)]
    resume: bool,

    /// Abort if resident memory exceeds this many megabytes.
    #[arg(long)]
    max_memory_mb: Option<u64>,

    /// Abort after this wall-clock budget.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Fill null/empty text with this value instead of dropping the row.
    #[arg(long, value_name = "VALUE")]
    fill_missing: Option<String>,

    /// Replace output text with its normalized (lowercased) form.
    #[arg(long)]
    normalize_text: bool,
}

impl Cli {
    /// CLI flags as a partial config; `None` fields never override the
    /// config file on merge.
    fn to_config(&self) -> PipelineConfig {
        PipelineConfig {
            input_path: self.input.clone(),
            output_path: self.output.clone(),
            text_column: self.text_column.clone(),
            required_columns: self.required_columns.clone(),
            min_length: self.min_length,
            dedup_threshold: self.dedup_threshold,
            model_name: self.model_name.clone(),
            batch_size: self.batch_size,
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            chunk_separators: self
                .separators
                .as_ref()
                .map(|s| s.iter().map(|x| decode_separator(x)).collect()),
            audit_log_path: self.audit_log.clone(),
            handle_missing: self.fill_missing.as_ref().map(|_| MissingPolicy::Fill),
            fill_value: self.fill_missing.clone(),
            normalize_text: self.normalize_text.then_some(true),
            show_progress: self.quiet.then_some(false),
            checkpoint_dir: self.checkpoint_dir.clone(),
            resume: self.resume.then_some(true),
            max_memory_mb: self.max_memory_mb,
            timeout_secs: self.timeout_secs,
            embed_batch_size: None,
            telemetry_endpoint: None,
            store_vectors: None,
            dry_run: self.dry_run.then_some(true),
        }
    }
}

/// Decode the escapes users can actually type on a shell command line.
fn decode_separator(raw: &str) -> String {
    raw.replace("\\n", "\n").replace("\\t", "\t")
}

fn build_backend(model_name: Option<&str>) -> Result<Arc<dyn Embedder>, PipelineError> {
    let name = model_name.unwrap_or("hashing");
    if name == "hashing" {
        return Ok(Arc::new(HashingEmbedder::default()));
    }
    load_model_backend(name)
}

#[cfg(feature = "model2vec")]
fn load_model_backend(name: &str) -> Result<Arc<dyn Embedder>, PipelineError> {
    use entropyguard_pipeline::dedup::embedder::Model2VecEmbedder;
    Ok(Arc::new(Model2VecEmbedder::from_pretrained(name)?))
}

#[cfg(not(feature = "model2vec"))]
fn load_model_backend(name: &str) -> Result<Arc<dyn Embedder>, PipelineError> {
    Err(entropyguard_core::errors::ResourceError::EmbedderUnavailable {
        backend: format!("{name} (built without the model2vec feature)"),
    }
    .into())
}

fn execute(cli: &Cli) -> Result<RunReport, PipelineError> {
    let file_config = load_config_file(cli.config.as_deref())?;
    let config = cli.to_config().merged_over(file_config);
    config.validate()?;
    check_json_flag(cli.json, &config)?;

    let backend = build_backend(config.model_name.as_deref())?;

    let mut ctx = RuntimeContext::new(CapabilityRegistry::new());
    if let Some(secs) = config.timeout_secs {
        ctx = ctx.with_deadline(Duration::from_secs(secs));
    }

    let engine = PipelineEngine::new(config, ctx);
    engine.run(backend)
}

/// `--json` writes the run report to stdout, so it cannot be combined
/// with stdout record output.
fn check_json_flag(json: bool, config: &PipelineConfig) -> Result<(), PipelineError> {
    if json && config.effective_output_path() == "-" {
        return Err(ValidationError::JsonRequiresFileOutput.into());
    }
    Ok(())
}

fn print_summary(cli: &Cli, report: &RunReport) {
    if cli.json {
        // Valid only with a file output (enforced up front), so stdout is
        // free for the report.
        let json = serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".into());
        println!("{json}");
        return;
    }
    if cli.quiet {
        return;
    }
    let stats = &report.stats;
    eprintln!("Pipeline completed{}", if report.cancelled { " (cancelled)" } else { "" });
    eprintln!("  Text column:          {}", report.text_column);
    eprintln!("  Original rows:        {}", stats.original_rows);
    eprintln!("  After sanitization:   {}", stats.after_sanitization_rows);
    eprintln!("  Exact duplicates:     {}", stats.exact_duplicates_removed);
    eprintln!("  Semantic duplicates:  {}", stats.semantic_duplicates_removed);
    eprintln!("  Validation drops:     {}", stats.validation_dropped);
    eprintln!("  Final rows:           {}", stats.final_rows);
    eprintln!("  Total dropped:        {}", stats.total_dropped);
    eprintln!(
        "  Estimated API savings: ${:.6}",
        stats.estimated_api_savings_usd
    );
    if let Some(audit) = &report.audit_log_path {
        eprintln!("  Audit log:            {audit}");
    }
    if report.dry_run {
        eprintln!("  (dry run: no output written)");
    } else if let Some(out) = &report.output_path {
        eprintln!("  Output:               {out} ({} rows)", report.rows_written);
    }
    eprintln!("  Duration:             {} ms", report.duration_ms);
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("entropyguard={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    let code = match execute(&cli) {
        Ok(report) => {
            print_summary(&cli, &report);
            0
        }
        Err(err) => {
            tracing::error!(
                code = err.error_code(),
                category = err.category(),
                "{err}"
            );
            eprintln!("error[{}]: {err}", err.category());
            err.exit_code()
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("entropyguard").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_are_stdio() {
        let cli = parse(&[]);
        // Absent flags stay absent so a config file can fill them in; the
        // stdio defaults apply only after merging.
        assert!(cli.input.is_none());
        assert!(cli.output.is_none());
        assert!(cli.text_column.is_none());
        let config = cli.to_config().merged_over(PipelineConfig::default());
        assert_eq!(config.effective_input_path(), "-");
        assert_eq!(config.effective_output_path(), "-");
    }

    #[test]
    fn required_columns_split_on_commas() {
        let cli = parse(&["--required-columns", "text,id,date"]);
        assert_eq!(
            cli.required_columns,
            Some(vec!["text".into(), "id".into(), "date".into()])
        );
    }

    #[test]
    fn separators_decode_escapes() {
        let cli = parse(&["--separators", "\\n\\n", "\\n", " "]);
        let config = cli.to_config();
        assert_eq!(
            config.chunk_separators,
            Some(vec!["\n\n".into(), "\n".into(), " ".into()])
        );
    }

    #[test]
    fn quiet_inverts_show_progress() {
        let cli = parse(&["--quiet"]);
        let config = cli.to_config();
        assert_eq!(config.show_progress, Some(false));

        let cli = parse(&[]);
        assert_eq!(cli.to_config().show_progress, None);
    }

    #[test]
    fn fill_missing_selects_fill_policy() {
        let cli = parse(&["--fill-missing", "N/A"]);
        let config = cli.to_config();
        assert_eq!(config.handle_missing, Some(MissingPolicy::Fill));
        assert_eq!(config.fill_value.as_deref(), Some("N/A"));

        let cli = parse(&[]);
        assert_eq!(cli.to_config().handle_missing, None);
    }

    #[test]
    fn absent_flags_do_not_override_config_file() {
        let cli = parse(&["--min-length", "100"]);
        let file = PipelineConfig {
            input_path: Some("from-config.ndjson".into()),
            output_path: Some("from-config-out.ndjson".into()),
            min_length: Some(50),
            dedup_threshold: Some(0.9),
            ..Default::default()
        };
        let merged = cli.to_config().merged_over(file);
        assert_eq!(merged.min_length, Some(100));
        assert_eq!(merged.dedup_threshold, Some(0.9));
        // No --input/--output on the command line: the file paths win.
        assert_eq!(merged.input_path.as_deref(), Some("from-config.ndjson"));
        assert_eq!(merged.output_path.as_deref(), Some("from-config-out.ndjson"));
    }

    #[test]
    fn input_and_output_flags_override_config_file() {
        let cli = parse(&["--input", "cli.ndjson", "--output", "cli-out.ndjson"]);
        let file = PipelineConfig {
            input_path: Some("from-config.ndjson".into()),
            output_path: Some("from-config-out.ndjson".into()),
            ..Default::default()
        };
        let merged = cli.to_config().merged_over(file);
        assert_eq!(merged.input_path.as_deref(), Some("cli.ndjson"));
        assert_eq!(merged.output_path.as_deref(), Some("cli-out.ndjson"));
    }

    #[test]
    fn json_with_stdout_output_is_rejected_with_exit_2() {
        // Default output (stdout) and explicit `-` both refuse --json.
        for args in [vec!["--json"], vec!["--json", "--output", "-"]] {
            let cli = parse(&args);
            let config = cli.to_config().merged_over(PipelineConfig::default());
            let err = check_json_flag(cli.json, &config).unwrap_err();
            assert!(matches!(
                err,
                PipelineError::Validation(ValidationError::JsonRequiresFileOutput)
            ));
            assert_eq!(err.exit_code(), 2);
        }

        // A file output makes --json valid.
        let cli = parse(&["--json", "--output", "report-target.ndjson"]);
        let config = cli.to_config().merged_over(PipelineConfig::default());
        assert!(check_json_flag(cli.json, &config).is_ok());
    }

    #[test]
    fn hashing_backend_is_always_available() {
        let backend = build_backend(Some("hashing")).unwrap();
        assert_eq!(backend.id(), "hashing");
        assert_eq!(build_backend(None).unwrap().id(), "hashing");
    }

    #[cfg(not(feature = "model2vec"))]
    #[test]
    fn model_backend_without_feature_is_a_resource_error() {
        let err = build_backend(Some("minishlab/potion-base-8M")).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
