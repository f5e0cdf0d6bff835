//! Crash-safe snapshot files.
//!
//! A snapshot is first written in full to `<path>.tmp`, fsynced, and only then
//! renamed over the live file, so readers never observe a half-written
//! snapshot. Writing and renaming are split into two phases so that a caller
//! persisting several files can stage all of them before committing any.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use resmatch_core::error::Result;

/// A fully written, fsynced temporary file waiting to replace its target.
///
/// Dropping a `StagedFile` without calling [`StagedFile::commit`] removes the
/// temporary file and leaves the target untouched.
#[derive(Debug)]
pub struct StagedFile {
    tmp_path: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedFile {
    /// Path of the file this snapshot will replace.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Atomically replace the target with the staged contents.
    pub fn commit(mut self) -> Result<()> {
        fs::rename(&self.tmp_path, &self.target)?;
        self.committed = true;
        sync_parent_dir(&self.target);
        debug!(path = %self.target.display(), "Snapshot committed");
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = fs::remove_file(&self.tmp_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.tmp_path.display(), error = %e, "Failed to remove staged snapshot");
            }
        }
    }
}

/// Write a snapshot for `path` into its temporary sibling and fsync it.
///
/// The closure receives a buffered writer over the temporary file. Nothing
/// visible at `path` changes until the returned handle is committed.
pub fn stage<F>(path: &Path, write: F) -> Result<StagedFile>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let staged = StagedFile {
        tmp_path: tmp_path_for(path),
        target: path.to_path_buf(),
        committed: false,
    };

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&staged.tmp_path)?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;

    Ok(staged)
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    let Some(parent) = path.parent() else {
        return;
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    if let Ok(dir) = File::open(parent) {
        let _ = dir.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}
