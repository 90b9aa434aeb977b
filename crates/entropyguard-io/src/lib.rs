//! # entropyguard-io
//!
//! Persistence edge of the pipeline: lazy row readers over the supported
//! input formats, the schema probe, the dedicated NDJSON writer thread,
//! and the checkpoint manager.

pub mod checkpoint;
pub mod reader;
pub mod writer;

pub use checkpoint::{CheckpointManager, CheckpointMetadata};
pub use reader::{open_input, InputSource, ProbedReader, RowError, RowErrorKind, RowReader, SchemaProbe};
pub use writer::{NdjsonWriter, SinkTarget};
