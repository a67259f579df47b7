//! Recursive discovery of audio files under a library root.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::LayoutError;

/// File extensions picked up when collecting a corpus from a directory.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac", "m4a", "aac", "aif", "aiff"];

pub fn is_audio_file(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    AUDIO_EXTENSIONS.contains(&ext.as_str())
}

/// Recursively list audio files under `root`, sorted by path.
///
/// Unreadable subdirectories are logged and skipped; an unreadable root is an error.
/// Symlinked directories are not followed.
pub fn collect_audio_files(root: &Path) -> Result<Vec<PathBuf>, LayoutError> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(source) if dir != root => {
                warn!(
                    dir = %dir.display(),
                    error = %source,
                    "Failed to read directory while collecting audio"
                );
                continue;
            }
            Err(source) => return Err(LayoutError::Io { path: dir, source }),
        };
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "Failed to read directory entry");
                    continue;
                }
            };
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let path = entry.path();
            if file_type.is_dir() {
                stack.push(path);
            } else if (file_type.is_file() || file_type.is_symlink())
                && path.is_file()
                && is_audio_file(&path)
            {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}
