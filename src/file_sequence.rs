use std::path::{Path, PathBuf};

use anyhow::Result;
use lazy_regex::regex_captures;
use log::warn;
use walkdir::{DirEntry, WalkDir};

#[derive(Debug)]
pub struct SequenceFile {
    pub index: u32,
    pub file_name: PathBuf,
}

/// Frames of an animation as written to disk, ordered by file name.
#[derive(Debug)]
pub struct FileSequence {
    pub dir: PathBuf,
    pub files: Vec<SequenceFile>,
}

impl FileSequence {
    pub fn len(&self) -> usize {
        self.files.len()
    }
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
    pub fn paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.files.iter().map(|file| self.dir.join(&file.file_name))
    }
}

fn sequence_index(entry: &DirEntry) -> Option<u32> {
    let file_name = entry.file_name().to_str()?;
    let (_, digits) = regex_captures!(r"^(\d+)\.\w{3,4}$", file_name)?;
    digits.parse().ok()
}

/// Collects any file that matches `^(\d+)\.\w{3,4}$` within the given `path`
/// where the group `(\d+)` denotes the sequence index.
///
/// E.g. `0001.png` or `002.webp`
pub fn file_sequence_blocking(path: &Path) -> Result<FileSequence> {
    let mut files = Vec::new();
    for entry in WalkDir::new(path).max_depth(1).min_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(index) = sequence_index(&entry) {
            files.push(SequenceFile {
                index,
                file_name: PathBuf::from(entry.file_name()),
            });
        }
    }
    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    if let (Some(first), Some(last)) = (files.first(), files.last()) {
        if files.len() as u64 != u64::from(last.index) - u64::from(first.index) + 1 {
            warn!("numbers in filenames in `{}` are inconsistent", path.display());
        }
    } else {
        warn!("no files matched the file_sequence query in `{}`", path.display());
    }

    Ok(FileSequence {
        dir: path.to_owned(),
        files,
    })
}

pub async fn file_sequence(path: impl AsRef<Path>) -> Result<FileSequence> {
    let path = path.as_ref().to_owned();
    tokio::task::spawn_blocking(move || file_sequence_blocking(&path)).await?
}
