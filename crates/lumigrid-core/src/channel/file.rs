//! File-based cross-process channel.
//!
//! Both documents (inbound control command, outbound status) are written by
//! serializing into a temp file in the destination directory and atomically
//! renaming it over the target, so a reader never observes a partial write.
//! Reads tolerate a missing file and malformed content alike; both simply
//! yield `None`.

use super::command::ControlCommand;
use crate::config::ChannelConfig;
use crate::error::{LumigridError, Result};
use crate::runtime::StatusSnapshot;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// One end of the control/status file pair in a shared state directory.
pub struct FileChannel {
    dir: PathBuf,
}

impl FileChannel {
    /// Open (and create if needed) the shared state directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| LumigridError::io_with_path(e, &dir))?;
        Ok(Self { dir })
    }

    pub fn control_path(&self) -> PathBuf {
        self.dir.join(ChannelConfig::CONTROL_FILE)
    }

    pub fn status_path(&self) -> PathBuf {
        self.dir.join(ChannelConfig::STATUS_FILE)
    }

    /// Publish a control command (UI side).
    pub fn write_command(&self, command: &ControlCommand) -> Result<()> {
        self.write_json(&self.control_path(), command)
    }

    /// Latest control command, if a readable one exists (owner side).
    pub fn read_command(&self) -> Option<ControlCommand> {
        self.read_json(&self.control_path())
    }

    /// Publish the runtime status (owner side).
    pub fn write_status(&self, status: &StatusSnapshot) -> Result<()> {
        self.write_json(&self.status_path(), status)
    }

    /// Latest published status, if a readable one exists (UI side).
    pub fn read_status(&self) -> Option<StatusSnapshot> {
        self.read_json(&self.status_path())
    }

    /// Raw status document for display purposes.
    pub fn read_status_value(&self) -> Option<serde_json::Value> {
        self.read_json(&self.status_path())
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        // Temp file in the same directory so the rename stays on one
        // filesystem and is atomic.
        let mut staged =
            NamedTempFile::new_in(&self.dir).map_err(|e| LumigridError::io_with_path(e, &self.dir))?;
        serde_json::to_writer_pretty(&mut staged, value)?;
        staged
            .flush()
            .map_err(|e| LumigridError::io_with_path(e, path))?;
        staged
            .persist(path)
            .map_err(|e| LumigridError::io_with_path(e.error, path))?;
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(_) => return None,
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Ignoring malformed document {}: {}", path.display(), e);
                None
            }
        }
    }
}
