//! Resource guards: disk, memory, wall clock.
//!
//! Pre-flight checks run before the first row is read; the deadline is
//! consulted by the driver at batch boundaries. Every guard reports a
//! structured `ResourceError` — guards never panic and never crash the
//! process on their own.

use std::path::Path;

use entropyguard_core::errors::ResourceError;
use entropyguard_io::reader::InputSource;
use entropyguard_io::writer::SinkTarget;
use sysinfo::System;

/// Required free-disk multiple of the estimated output footprint.
pub const DISK_HEADROOM: f64 = 1.2;

/// Estimate the output footprint in bytes. The cleaned output cannot
/// exceed the input, so the input size is the (conservative) estimate.
/// Stdin cannot be sized ahead of time.
pub fn estimate_output_bytes(input: &InputSource) -> Option<u64> {
    match input {
        InputSource::Stdin => None,
        InputSource::Path(p) => std::fs::metadata(p).ok().map(|m| m.len()),
    }
}

/// Verify free space on the output volume covers `estimated_bytes` plus
/// headroom. Stdout output needs no disk.
pub fn check_disk_space(target: &SinkTarget, estimated_bytes: u64) -> Result<(), ResourceError> {
    let SinkTarget::File(path) = target else {
        return Ok(());
    };
    let required = (estimated_bytes as f64 * DISK_HEADROOM) as u64;
    let probe: &Path = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let available = match fs2::available_space(probe) {
        Ok(a) => a,
        Err(e) => {
            // An unreadable volume is not a verdict; log and let the write
            // itself surface any real failure.
            tracing::warn!(path = %probe.display(), error = %e, "cannot query free disk space");
            return Ok(());
        }
    };
    if available < required {
        return Err(ResourceError::InsufficientDisk {
            required,
            available,
        });
    }
    tracing::debug!(required, available, "disk pre-flight ok");
    Ok(())
}

/// Verify this process's resident memory sits under the configured
/// ceiling. No ceiling means no check.
pub fn check_memory(ceiling_mb: Option<u64>) -> Result<(), ResourceError> {
    let Some(ceiling_mb) = ceiling_mb else {
        return Ok(());
    };
    let Ok(pid) = sysinfo::get_current_pid() else {
        tracing::warn!("cannot resolve current pid; skipping memory guard");
        return Ok(());
    };
    let mut sys = System::new();
    sys.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
    let used_mb = sys.process(pid).map_or(0, |p| p.memory() / (1024 * 1024));
    if used_mb > ceiling_mb {
        return Err(ResourceError::MemoryCeiling {
            used_mb,
            ceiling_mb,
        });
    }
    tracing::debug!(used_mb, ceiling_mb, "memory pre-flight ok");
    Ok(())
}
