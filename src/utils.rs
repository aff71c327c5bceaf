//! Utility functionality

use std::fs::{self, File};
use std::io;
use std::ops::Deref;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use anyhow::Result;
use nix::sys::stat::{utimensat, UtimensatFlags};
use nix::sys::time::TimeSpec;

pub fn write_file<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, contents).with_context(|| format!("failed to write to {:?}", path))?;
    Ok(())
}

pub fn create_dir_all<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    fs::create_dir_all(path).with_context(|| format!("failed to create directory {:?}", path))
}

pub fn open<P: AsRef<Path>>(path: P) -> Result<File> {
    let path = path.as_ref();
    File::open(path).with_context(|| format!("failed to open {:?}", path))
}

/// Copies a regular file and carries over its mode and timestamps. Failures
/// keep their OS error so callers can report the real errno.
pub fn copy_with_metadata<P: AsRef<Path>, Q: AsRef<Path>>(from: P, to: Q) -> io::Result<()> {
    let from = from.as_ref();
    let to = to.as_ref();
    fs::copy(from, to)?;

    let metadata = from.metadata()?;
    let atime = TimeSpec::from(libc::timespec {
        tv_sec: metadata.atime(),
        tv_nsec: metadata.atime_nsec(),
    });
    let mtime = TimeSpec::from(libc::timespec {
        tv_sec: metadata.mtime(),
        tv_nsec: metadata.mtime_nsec(),
    });
    utimensat(None, to, &atime, &mtime, UtimensatFlags::FollowSymlink)
        .map_err(|e| io::Error::from_raw_os_error(e as i32))?;
    Ok(())
}

pub struct TempDir {
    path: Option<PathBuf>,
}

impl TempDir {
    pub fn new<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let p = path.into();
        std::fs::create_dir_all(&p)
            .with_context(|| format!("failed to create directory {}", p.display()))?;
        Ok(Self { path: Some(p) })
    }

    pub fn path(&self) -> &Path {
        self.path
            .as_ref()
            .expect("temp dir has already been removed")
    }

    pub fn remove(&mut self) {
        if let Some(p) = &self.path {
            let _ = fs::remove_dir_all(p);
            self.path = None;
        }
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        self.remove();
    }
}

impl AsRef<Path> for TempDir {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}

impl Deref for TempDir {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.path()
    }
}

pub fn create_temp_dir(test_name: &str) -> Result<TempDir> {
    let dir = TempDir::new(std::env::temp_dir().join(test_name))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_with_metadata() -> Result<()> {
        let tmp = create_temp_dir("test_copy_with_metadata")?;
        let src = tmp.join("src.json");
        let dst = tmp.join("dst.json");
        write_file(&src, "{\"token\":\"abc\"}")?;

        copy_with_metadata(&src, &dst)?;

        assert_eq!(fs::read(&dst)?, fs::read(&src)?);
        let src_meta = src.metadata()?;
        let dst_meta = dst.metadata()?;
        assert_eq!(src_meta.mtime(), dst_meta.mtime());
        assert_eq!(src_meta.mode(), dst_meta.mode());
        Ok(())
    }
}
