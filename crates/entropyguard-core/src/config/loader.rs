//! Config file loading: JSON always, TOML always, YAML behind the
//! `yaml-config` feature. Explicit path wins; otherwise `.entropyguardrc.*`
//! is discovered in the working directory.

use std::path::{Path, PathBuf};

use serde_json::Value;

use super::PipelineConfig;
use crate::errors::ValidationError;

/// Keys accepted in a config file. Anything else is rejected up front so a
/// typo never silently becomes a no-op.
const KNOWN_KEYS: &[&str] = &[
    "input_path",
    "output_path",
    "text_column",
    "required_columns",
    "min_length",
    "dedup_threshold",
    "model_name",
    "batch_size",
    "chunk_size",
    "chunk_overlap",
    "chunk_separators",
    "audit_log_path",
    "handle_missing",
    "fill_value",
    "normalize_text",
    "show_progress",
    "checkpoint_dir",
    "resume",
    "max_memory_mb",
    "timeout_secs",
    "embed_batch_size",
    "telemetry_endpoint",
    "store_vectors",
    "dry_run",
];

const RC_BASENAME: &str = ".entropyguardrc";

/// Find a `.entropyguardrc.{json,toml,yaml,yml}` in `dir`, if any.
pub fn discover_config_file(dir: &Path) -> Option<PathBuf> {
    for ext in ["json", "toml", "yaml", "yml"] {
        let candidate = dir.join(format!("{RC_BASENAME}.{ext}"));
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Load a config file. With `path = None`, auto-discovers in the current
/// directory and returns the default (empty) config when nothing is found.
pub fn load_config_file(path: Option<&Path>) -> Result<PipelineConfig, ValidationError> {
    let path = match path {
        Some(p) => {
            if !p.is_file() {
                return Err(ValidationError::ConfigParse {
                    path: p.display().to_string(),
                    message: "config file not found".into(),
                });
            }
            p.to_path_buf()
        }
        None => match std::env::current_dir()
            .ok()
            .and_then(|d| discover_config_file(&d))
        {
            Some(p) => p,
            None => return Ok(PipelineConfig::default()),
        },
    };

    let raw = std::fs::read_to_string(&path).map_err(|e| ValidationError::ConfigParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let value = parse_by_extension(&path, &raw)?;
    reject_unknown_keys(&path, &value)?;

    let config: PipelineConfig =
        serde_json::from_value(value).map_err(|e| ValidationError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

fn parse_by_extension(path: &Path, raw: &str) -> Result<Value, ValidationError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parse_err = |message: String| ValidationError::ConfigParse {
        path: path.display().to_string(),
        message,
    };

    match ext.as_str() {
        "json" => serde_json::from_str(raw).map_err(|e| parse_err(format!("invalid JSON: {e}"))),
        "toml" => {
            let value: toml::Value =
                toml::from_str(raw).map_err(|e| parse_err(format!("invalid TOML: {e}")))?;
            serde_json::to_value(value).map_err(|e| parse_err(e.to_string()))
        }
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => {
            let value: serde_yaml::Value =
                serde_yaml::from_str(raw).map_err(|e| parse_err(format!("invalid YAML: {e}")))?;
            serde_json::to_value(value).map_err(|e| parse_err(e.to_string()))
        }
        #[cfg(not(feature = "yaml-config"))]
        "yaml" | "yml" => Err(ValidationError::MissingCapability {
            capability: "yaml-config".into(),
        }),
        other => Err(parse_err(format!(
            "unsupported config extension '.{other}' (expected .json, .toml, .yaml)"
        ))),
    }
}

fn reject_unknown_keys(path: &Path, value: &Value) -> Result<(), ValidationError> {
    let Some(obj) = value.as_object() else {
        return Err(ValidationError::ConfigParse {
            path: path.display().to_string(),
            message: "config root must be an object".into(),
        });
    };
    let unknown: Vec<String> = obj
        .keys()
        .filter(|k| !KNOWN_KEYS.contains(&k.as_str()))
        .cloned()
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::UnknownConfigKeys { keys: unknown })
    }
}
