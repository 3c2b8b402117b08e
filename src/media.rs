//! Partitioning of the media directory into images and videos.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "avi", "webm", "m4v"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path
            .extension()
            .and_then(OsStr::to_str)
            .map(|s| s.to_ascii_lowercase())?;
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

/// Playable content of the media directory, each list in file name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaSet {
    pub images: Vec<PathBuf>,
    pub videos: Vec<PathBuf>,
}

impl MediaSet {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.videos.is_empty()
    }
}

/// Classify the immediate regular files of `dir`.
///
/// Symlinks are followed; dangling links, directories and unknown extensions
/// are skipped. Names sort bytewise, so upper-case names come first.
pub fn classify(dir: &Path) -> MediaSet {
    let mut set = MediaSet::default();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                if err.depth() == 0 {
                    warn!(dir = %dir.display(), error = %err, "media directory unreadable");
                } else {
                    debug!(error = %err, "skipping unreadable media entry");
                }
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        match MediaKind::from_path(&path) {
            Some(MediaKind::Image) => set.images.push(path),
            Some(MediaKind::Video) => set.videos.push(path),
            None => debug!(path = %path.display(), "ignoring unsupported file"),
        }
    }
    debug!(
        images = set.images.len(),
        videos = set.videos.len(),
        "classified media directory"
    );
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(
            MediaKind::from_path(Path::new("HOLIDAY.JPEG")),
            Some(MediaKind::Image)
        );
        assert_eq!(
            MediaKind::from_path(Path::new("clip.M4V")),
            Some(MediaKind::Video)
        );
        assert_eq!(MediaKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(MediaKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let set = classify(&dir.path().join("absent"));
        assert!(set.is_empty());
    }
}
