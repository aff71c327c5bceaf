//! Path resolution for the credential filesystem.
//!
//! Every path operation funnels through [`CredentialFs::resolve`], which
//! classifies the mount-relative path as *credential* (final component in
//! the tool's allow-list) or *shared*. Credential paths land under the
//! account profile selected by the caller's pid; everything else lands in
//! the shared backing directory, so caches and config stay identical across
//! accounts.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::registry::AccountRegistry;
use crate::utils;

pub struct CredentialFs {
    tool: String,
    backing_dir: PathBuf,
    profiles_dir: PathBuf,
    registry: Arc<AccountRegistry>,
    cred_basenames: HashSet<OsString>,
    init_lock: Mutex<()>,
}

impl CredentialFs {
    pub fn new(
        tool: &str,
        backing_dir: PathBuf,
        profiles_dir: PathBuf,
        registry: Arc<AccountRegistry>,
        cred_basenames: &[&str],
    ) -> Self {
        Self {
            tool: tool.to_owned(),
            backing_dir,
            profiles_dir,
            registry,
            cred_basenames: cred_basenames.iter().map(OsString::from).collect(),
            init_lock: Mutex::new(()),
        }
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// True if the final component of `path` is one of the tool's
    /// credential file names, at any depth.
    pub fn is_credential(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| self.cred_basenames.contains(name))
            .unwrap_or(false)
    }

    /// Resolves a mount path against the shared backing directory,
    /// regardless of classification. Directory listings and the link-ish
    /// operations use this on purpose: only credential file *contents* are
    /// split per account, never the namespace.
    pub fn backing_path(&self, path: &Path) -> PathBuf {
        self.backing_dir.join(mount_relative(path))
    }

    /// Resolves a mount path to the real file that should serve the caller.
    ///
    /// Credential paths resolve to `<profiles>/<account>/<tool>/<rel>` for
    /// the account registered on the caller's ancestry (pid 0 yields the
    /// default account) and are created on first use. Shared paths resolve
    /// into the backing directory.
    pub fn resolve(&self, path: &Path, pid: i32) -> io::Result<PathBuf> {
        let rel = mount_relative(path);
        if !self.is_credential(&rel) {
            return Ok(self.backing_dir.join(rel));
        }

        let account = self.registry.lookup(pid);
        log::debug!(
            "resolve {:?} pid={} -> account '{}' ({})",
            path,
            pid,
            account,
            self.tool
        );
        let target = self
            .profiles_dir
            .join(&account)
            .join(&self.tool)
            .join(&rel);
        self.ensure_profile_file(&target, &rel)?;
        Ok(target)
    }

    /// Creates the per-account credential file on first resolution: from the
    /// backing copy when one exists, otherwise as an empty JSON object.
    /// Double-checked around the instance lock so concurrent first reads
    /// initialize exactly once.
    fn ensure_profile_file(&self, target: &Path, rel: &Path) -> io::Result<()> {
        if target.exists() {
            return Ok(());
        }

        let _guard = self.init_lock.lock().unwrap();
        if target.exists() {
            return Ok(());
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let backing = self.backing_dir.join(rel);
        if backing.exists() {
            utils::copy_with_metadata(&backing, target)?;
            log::info!("initialized {:?} from backing copy", target);
        } else {
            fs::write(target, "{}")?;
            log::info!("initialized {:?} as empty credentials", target);
        }

        Ok(())
    }
}

/// Strips any leading separators, yielding the mount-relative path.
fn mount_relative(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}
