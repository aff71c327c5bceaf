//! Backing-directory seeding and FUSE mount lifecycle.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use fuser::MountOption;

use crate::filesystem::{CredentialFs, CredentialFuse};
use crate::utils;

pub const REGISTRY_FILE: &str = "pid-map.json";
pub const PID_FILE: &str = "pid";
pub const READY_FILE: &str = "ready";

/// Credential files that get per-account routing, by tool.
pub const CLAUDE_CRED_FILES: &[&str] = &[".credentials.json"];
pub const CODEX_CRED_FILES: &[&str] = &["auth.json"];

/// Seeds the shared backing directory for a tool from the current contents
/// of its mount point, once. An existing backing directory is returned
/// untouched: the shared view is a snapshot taken before the first mount.
pub fn prepare_backing_dir(run_dir: &Path, mount_point: &Path, tool: &str) -> Result<PathBuf> {
    let backing = run_dir.join(format!("backing-{}", tool));
    if backing.exists() {
        log::debug!("backing directory {:?} already seeded", backing);
        return Ok(backing);
    }

    utils::create_dir_all(&backing)?;
    if mount_point.is_dir() {
        for entry in fs::read_dir(mount_point)
            .with_context(|| format!("failed to read mount point {:?}", mount_point))?
        {
            let entry = entry?;
            let src = entry.path();
            let dst = backing.join(entry.file_name());
            let file_type = entry.file_type()?;
            if file_type.is_symlink() {
                let target = fs::read_link(&src)?;
                std::os::unix::fs::symlink(target, &dst)?;
            } else if file_type.is_dir() {
                copy_dir_recursive(&src, &dst)?;
            } else {
                utils::copy_with_metadata(&src, &dst)?;
            }
        }
    }
    log::info!("seeded backing directory {:?} from {:?}", backing, mount_point);

    Ok(backing)
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    utils::create_dir_all(dst)?;
    for entry in
        fs::read_dir(src).with_context(|| format!("failed to read directory {:?}", src))?
    {
        let entry = entry?;
        let src = entry.path();
        let dst = dst.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_symlink() {
            let target = fs::read_link(&src)?;
            std::os::unix::fs::symlink(target, &dst)?;
        } else if file_type.is_dir() {
            copy_dir_recursive(&src, &dst)?;
        } else {
            utils::copy_with_metadata(&src, &dst)?;
        }
    }
    Ok(())
}

/// Runs the FUSE session for one tool on its own thread. The session ends
/// when the mount point is unmounted.
pub fn spawn_mount(fs: CredentialFs, mount_point: PathBuf) -> JoinHandle<()> {
    thread::spawn(move || {
        let tool = fs.tool().to_owned();
        let options = [
            MountOption::FSName("credfs".to_string()),
            MountOption::AllowOther,
        ];
        log::info!("mounting {} at {:?}", tool, mount_point);
        if let Err(e) = fuser::mount2(CredentialFuse::new(fs), &mount_point, &options) {
            log::error!("mount for {} at {:?} failed: {}", tool, mount_point, e);
        }
        log::info!("mount for {} at {:?} ended", tool, mount_point);
    })
}

/// Best-effort unmount through the host utility; failures are ignored.
pub fn unmount(mount_point: &Path) {
    let _ = Command::new("fusermount")
        .arg("-u")
        .arg(mount_point)
        .stderr(Stdio::null())
        .status();
}

pub fn write_pid_file(run_dir: &Path) -> Result<()> {
    utils::write_file(run_dir.join(PID_FILE), std::process::id().to_string())
}

/// Touched last, once every mount thread is live.
pub fn write_ready_marker(run_dir: &Path) -> Result<()> {
    utils::write_file(run_dir.join(READY_FILE), "1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::create_temp_dir;

    #[test]
    fn test_prepare_backing_copies_top_level_entries() -> Result<()> {
        let tmp = create_temp_dir("test_prepare_backing_copies")?;
        let mount_point = tmp.join("mount");
        let run_dir = tmp.join("run");
        utils::create_dir_all(&mount_point)?;
        utils::write_file(mount_point.join("settings.json"), "{\"theme\":\"dark\"}")?;
        utils::create_dir_all(mount_point.join("projects"))?;
        utils::write_file(mount_point.join("projects/notes.md"), "notes")?;
        std::os::unix::fs::symlink("settings.json", mount_point.join("link.json"))?;

        let backing = prepare_backing_dir(&run_dir, &mount_point, "claude")?;

        assert_eq!(backing, run_dir.join("backing-claude"));
        assert_eq!(
            fs::read_to_string(backing.join("settings.json"))?,
            "{\"theme\":\"dark\"}"
        );
        assert_eq!(
            fs::read_to_string(backing.join("projects/notes.md"))?,
            "notes"
        );
        let link = backing.join("link.json");
        assert!(fs::symlink_metadata(&link)?.file_type().is_symlink());
        assert_eq!(fs::read_link(&link)?, PathBuf::from("settings.json"));
        Ok(())
    }

    #[test]
    fn test_prepare_backing_is_a_snapshot() -> Result<()> {
        let tmp = create_temp_dir("test_prepare_backing_is_a_snapshot")?;
        let mount_point = tmp.join("mount");
        let run_dir = tmp.join("run");
        utils::create_dir_all(&mount_point)?;
        utils::write_file(mount_point.join("first.json"), "1")?;

        let backing = prepare_backing_dir(&run_dir, &mount_point, "codex")?;
        assert!(backing.join("first.json").exists());

        // Files added after seeding do not appear in the shared view.
        utils::write_file(mount_point.join("second.json"), "2")?;
        let backing = prepare_backing_dir(&run_dir, &mount_point, "codex")?;
        assert!(!backing.join("second.json").exists());
        Ok(())
    }

    #[test]
    fn test_prepare_backing_with_missing_mount_point() -> Result<()> {
        let tmp = create_temp_dir("test_prepare_backing_missing_mount")?;
        let backing = prepare_backing_dir(&tmp.join("run"), &tmp.join("nope"), "claude")?;
        assert!(backing.is_dir());
        Ok(())
    }

    #[test]
    fn test_run_state_files() -> Result<()> {
        let tmp = create_temp_dir("test_run_state_files")?;
        write_pid_file(&tmp)?;
        write_ready_marker(&tmp)?;

        assert_eq!(
            fs::read_to_string(tmp.join(PID_FILE))?,
            std::process::id().to_string()
        );
        assert_eq!(fs::read_to_string(tmp.join(READY_FILE))?, "1");
        Ok(())
    }
}
