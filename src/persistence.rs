//! Model snapshot serialization.
//!
//! The on-disk layout is a single JSON document holding both networks and
//! the exploration rate. Reads validate the format version before any
//! engine state is touched, so a failed load leaves the engine unchanged.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::network::ValueNetwork;

pub(crate) const SNAPSHOT_VERSION: u32 = 1;

/// Everything needed to reproduce `predict` outputs after a round trip.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ModelSnapshot {
    pub version: u32,
    pub live: ValueNetwork,
    pub target: ValueNetwork,
    pub epsilon: f64,
}

pub(crate) fn write_snapshot(path: &Path, snapshot: &ModelSnapshot) -> Result<(), EngineError> {
    let file = File::create(path).map_err(|e| EngineError::Persistence(e.to_string()))?;
    serde_json::to_writer(BufWriter::new(file), snapshot)
        .map_err(|e| EngineError::Persistence(e.to_string()))
}

pub(crate) fn read_snapshot(path: &Path) -> Result<ModelSnapshot, EngineError> {
    let file = File::open(path).map_err(|e| EngineError::Persistence(e.to_string()))?;
    let snapshot: ModelSnapshot = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| EngineError::Persistence(e.to_string()))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(EngineError::Persistence(format!(
            "unsupported snapshot version {} (expected {})",
            snapshot.version, SNAPSHOT_VERSION
        )));
    }
    Ok(snapshot)
}
