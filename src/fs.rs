use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Result;
use simple_error::simple_error;

/// Creates the directory if needed, losing a creation race is fine.
pub async fn assert_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(simple_error!("`{}` exists but is not a directory", path.display()).into()),
        Err(_) => match tokio::fs::create_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(err) => Err(err.into()),
        },
    }
}

pub async fn exists(path: impl AsRef<Path>) -> bool {
    tokio::fs::metadata(path.as_ref()).await.is_ok()
}

pub async fn file_size(path: impl AsRef<Path>) -> Result<u64> {
    let meta = tokio::fs::metadata(path.as_ref()).await?;
    Ok(meta.len())
}

/// Where work on `path` happens until it's complete.
///
/// `frames/<id>` becomes `frames/<id>.part`, `out/<id>.webp` becomes
/// `out/<id>.part.webp` so tools that pick the format by extension still work.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::new();
    if let Some(stem) = path.file_stem() {
        name.push(stem);
    }
    name.push(".part");
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    path.with_file_name(name)
}

/// Removes leftovers of an interrupted run at `path`, file or directory.
pub async fn remove_stale(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let result = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(_) => return Ok(()),
    };
    match result {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
        _ => {
            log::debug!("removed stale `{}`", path.display());
            Ok(())
        }
    }
}

/// Moves finished work into its final place.
pub async fn commit(partial: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<()> {
    Ok(tokio::fs::rename(partial.as_ref(), path.as_ref()).await?)
}
