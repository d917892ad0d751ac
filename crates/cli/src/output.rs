//! Writing slices to disk

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tallcrop_slicer::{Delivery, SkippedSlice, SliceBatch, SliceFile, UploadTarget};
use tracing::info;

/// A directory that receives slices the way the browser's upload input does
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl UploadTarget for OutputDir {
    type Error = io::Error;

    /// Write every slice into the directory.
    ///
    /// Inputs from different folders can share a file name; their slices would
    /// overwrite each other, so such a batch is refused before anything is written.
    fn replace_files(&self, files: &[SliceFile]) -> io::Result<()> {
        let mut names = HashSet::new();
        if let Some(duplicate) = files.iter().find(|file| !names.insert(file.name.as_str())) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!(
                    "Two inputs produce {}; rename one of them",
                    duplicate.name
                ),
            ));
        }

        fs::create_dir_all(&self.root)?;
        for file in files {
            fs::write(self.root.join(&file.name), &file.bytes)?;
        }
        Ok(())
    }

    fn notify_changed(&self) -> io::Result<()> {
        info!("Slices written to {}", self.root.display());
        Ok(())
    }
}

/// What a run produced, for `--json`
#[derive(Debug, Serialize)]
pub struct Summary {
    pub out_dir: PathBuf,
    pub written: Vec<WrittenSlice>,
    pub skipped: Vec<SkippedSlice>,
}

#[derive(Debug, Serialize)]
pub struct WrittenSlice {
    pub name: String,
    pub size_bytes: u64,
}

impl Summary {
    pub fn new(target: &OutputDir, batch: &SliceBatch, delivery: Delivery) -> Self {
        let written = match delivery {
            Delivery::Delivered { .. } => batch
                .files
                .iter()
                .map(|file| WrittenSlice {
                    name: file.name.clone(),
                    size_bytes: file.size(),
                })
                .collect(),
            Delivery::Nothing => Vec::new(),
        };
        Self {
            out_dir: target.root().to_path_buf(),
            written,
            skipped: batch.skipped.clone(),
        }
    }
}
