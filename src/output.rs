//! JSON persistence of the final packet collection
//!
//! The artifact is written to a temporary file next to the destination and
//! renamed into place, so a failed write never leaves a partial file behind.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

use crate::protocol::Packet;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode packets as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> OutputError + '_ {
    move |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `packets` as a pretty-printed JSON array to `path`.
pub fn write_packets(path: &Path, packets: &[Packet]) -> Result<(), OutputError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(io_err(dir))?;

    let tmp = NamedTempFile::new_in(dir).map_err(io_err(dir))?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut w, packets)?;
        w.write_all(b"\n").map_err(io_err(tmp.path()))?;
        w.flush().map_err(io_err(tmp.path()))?;
    }
    tmp.as_file().sync_all().map_err(io_err(tmp.path()))?;
    tmp.persist(path).map_err(|e| OutputError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    info!(path = %path.display(), packets = packets.len(), "packets saved");
    Ok(())
}

pub fn read_packets(path: &Path) -> Result<Vec<Packet>, OutputError> {
    let file = File::open(path).map_err(io_err(path))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
