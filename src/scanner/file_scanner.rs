//! Directory scanner for image files.
//!
//! - Recursive or flat directory walks using walkdir
//! - Media type detection by file extension
//! - Stable, path-sorted output so the grid order is reproducible

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::models::MediaId;

/// Kinds of media the grid can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Image,
}

impl MediaType {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "webp" | "gif" | "bmp" | "tiff" | "tif" => Some(Self::Image),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// Configuration for the file scanner.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Whether to scan directories recursively.
    pub recursive: bool,
    /// Maximum directory depth (0 = unlimited).
    pub max_depth: usize,
    /// Whether to follow symbolic links.
    pub follow_symlinks: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            max_depth: 0,
            follow_symlinks: false,
        }
    }
}

/// Finds media files below a directory.
#[derive(Debug, Clone, Default)]
pub struct FileScanner {
    config: ScanConfig,
}

impl FileScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Media file paths under `dir`, sorted by path.
    pub fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            bail!("Not a directory: {:?}", dir);
        }

        let mut walker = WalkDir::new(dir).follow_links(self.config.follow_symlinks);
        if !self.config.recursive {
            walker = walker.max_depth(1);
        } else if self.config.max_depth > 0 {
            walker = walker.max_depth(self.config.max_depth);
        }

        let mut paths = Vec::new();
        let mut skipped = 0usize;
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Failed to read directory entry");
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }
            if MediaType::from_path(entry.path()).is_none() {
                skipped += 1;
                continue;
            }
            paths.push(entry.into_path());
        }

        paths.sort();
        debug!(?dir, skipped, "Skipped non-media files");
        info!(?dir, count = paths.len(), "Discovered media files");
        Ok(paths)
    }

    /// Discovered files as grid ids. Paths that are not valid UTF-8 cannot
    /// be turned back into a file name and are skipped.
    pub fn media_ids(&self, dir: &Path) -> Result<Vec<MediaId>> {
        Ok(self
            .discover(dir)?
            .iter()
            .filter_map(|path| {
                let id = media_id_for(path);
                if id.is_none() {
                    warn!(path = %path.display(), "Skipping file with a non UTF-8 path");
                }
                id
            })
            .collect())
    }
}

fn media_id_for(path: &Path) -> Option<MediaId> {
    path.to_str().map(MediaId::from)
}
