//! Checkpoint encoding of statement trees
//!
//! A checkpoint is a JSON envelope `{"format": N, "root": <node>}` where each
//! node carries its kind in a `t` field followed by the kind's fields, its
//! location and its access statistics. Breakpoints and the may-suspend
//! cache are not persisted. Decoding either returns a complete tree or an
//! error; switch dispatch indices are rebuilt and re-validated on the way.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::switch::Case;
use super::{Stmt, StmtTag};
use crate::errors::CheckpointError;

/// Version written into every envelope
pub const CHECKPOINT_FORMAT: u32 = 1;

/// Which root kind a decode accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFilter {
    Any,
    Exact(StmtTag),
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    format: u32,
    root: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    format: u32,
    root: Value,
}

fn encode<T: Serialize>(root: &T, pretty: bool) -> Result<Vec<u8>, CheckpointError> {
    let envelope = EnvelopeRef {
        format: CHECKPOINT_FORMAT,
        root,
    };
    let bytes = if pretty {
        serde_json::to_vec_pretty(&envelope)?
    } else {
        serde_json::to_vec(&envelope)?
    };
    Ok(bytes)
}

fn open(bytes: &[u8]) -> Result<Value, CheckpointError> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    if envelope.format != CHECKPOINT_FORMAT {
        return Err(CheckpointError::UnsupportedFormat {
            found: envelope.format,
            expected: CHECKPOINT_FORMAT,
        });
    }
    Ok(envelope.root)
}

impl Stmt {
    pub fn encode(&self) -> Result<Vec<u8>, CheckpointError> {
        encode(self, false)
    }

    /// Indented form for people; decodes the same
    pub fn encode_pretty(&self) -> Result<Vec<u8>, CheckpointError> {
        encode(self, true)
    }

    pub fn decode(bytes: &[u8], filter: TagFilter) -> Result<Stmt, CheckpointError> {
        let root = open(bytes)?;
        if let TagFilter::Exact(expected) = filter {
            let found = root.get("t").and_then(Value::as_str).unwrap_or("<none>");
            if found != expected.name() {
                return Err(CheckpointError::TagMismatch {
                    expected,
                    found: found.to_string(),
                });
            }
        }
        Ok(serde_json::from_value(root)?)
    }
}

impl Case {
    pub fn encode(&self) -> Result<Vec<u8>, CheckpointError> {
        encode(self, false)
    }

    pub fn decode(bytes: &[u8]) -> Result<Case, CheckpointError> {
        Ok(serde_json::from_value(open(bytes)?)?)
    }
}
