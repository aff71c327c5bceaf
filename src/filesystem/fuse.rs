//! fuser adapter for [`CredentialFs`].
//!
//! The kernel speaks inodes; the resolver speaks mount-relative paths. This
//! adapter keeps an inode table (ino 1 is the mount root) and translates
//! every operation into a resolve-then-syscall sequence. Inodes are keyed by
//! path only, never by account: two processes looking up the same credential
//! file share one inode, and the split happens when the operation resolves
//! the path for its own caller.
//!
//! Entry and attribute TTLs are zero and opens reply with direct IO, so the
//! kernel never serves one account's credential bytes out of the dentry,
//! attribute, or page cache to a process registered to another account.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{DirBuilderExt, FileTypeExt};
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::consts::FOPEN_DIRECT_IO;
use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request, TimeOrNow,
};
use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::sys::stat::{lstat, utimensat, FileStat, Mode, UtimensatFlags};
use nix::sys::statvfs::statvfs;
use nix::sys::time::TimeSpec;
use nix::sys::uio::{pread, pwrite};
use nix::unistd::{access, chown, close, fdatasync, fsync, ftruncate, AccessFlags, Gid, Uid};

use super::resolver::CredentialFs;

const TTL: Duration = Duration::from_secs(0);

const ROOT_INO: u64 = 1;

pub struct CredentialFuse {
    fs: CredentialFs,
    inodes: HashMap<u64, PathBuf>,
    paths: HashMap<PathBuf, u64>,
    next_ino: u64,
}

impl CredentialFuse {
    pub fn new(fs: CredentialFs) -> Self {
        let mut inodes = HashMap::new();
        let mut paths = HashMap::new();
        inodes.insert(ROOT_INO, PathBuf::new());
        paths.insert(PathBuf::new(), ROOT_INO);
        Self {
            fs,
            inodes,
            paths,
            next_ino: ROOT_INO + 1,
        }
    }

    fn path_of(&self, ino: u64) -> Result<PathBuf, libc::c_int> {
        self.inodes.get(&ino).cloned().ok_or(libc::ENOENT)
    }

    fn child_of(&self, parent: u64, name: &OsStr) -> Result<PathBuf, libc::c_int> {
        Ok(self.path_of(parent)?.join(name))
    }

    /// Returns the inode for a mount-relative path, allocating one on first
    /// sight. The same path always maps to the same inode.
    fn ino_for(&mut self, rel: &Path) -> u64 {
        if let Some(ino) = self.paths.get(rel) {
            return *ino;
        }
        let ino = self.next_ino;
        self.next_ino += 1;
        self.inodes.insert(ino, rel.to_path_buf());
        self.paths.insert(rel.to_path_buf(), ino);
        ino
    }

    /// Moves `old` (and everything under it) to `new` in the inode table.
    fn rekey(&mut self, old: &Path, new: &Path) {
        let affected: Vec<(u64, PathBuf)> = self
            .inodes
            .iter()
            .filter(|(_, rel)| rel.as_path() == old || rel.starts_with(old))
            .map(|(ino, rel)| (*ino, rel.clone()))
            .collect();
        for (ino, rel) in affected {
            let moved = if rel.as_path() == old {
                new.to_path_buf()
            } else {
                new.join(rel.strip_prefix(old).unwrap())
            };
            self.paths.remove(&rel);
            self.paths.insert(moved.clone(), ino);
            self.inodes.insert(ino, moved);
        }
    }

    fn drop_path(&mut self, rel: &Path) {
        if let Some(ino) = self.paths.remove(rel) {
            self.inodes.remove(&ino);
        }
    }

    fn resolve(&self, rel: &Path, pid: i32) -> Result<PathBuf, libc::c_int> {
        self.fs.resolve(rel, pid).map_err(|e| io_errno(&e))
    }

    fn attr_of(&mut self, rel: &Path, pid: i32) -> Result<FileAttr, libc::c_int> {
        let real = self.resolve(rel, pid)?;
        let st = lstat(&real).map_err(nix_errno)?;
        let ino = self.ino_for(rel);
        Ok(attr_from_stat(&st, ino))
    }
}

fn io_errno(e: &io::Error) -> libc::c_int {
    e.raw_os_error().unwrap_or(libc::EIO)
}

fn nix_errno(e: Errno) -> libc::c_int {
    match e as libc::c_int {
        0 => libc::EIO,
        code => code,
    }
}

fn caller_pid(req: &Request<'_>) -> i32 {
    req.pid() as i32
}

fn systime(sec: i64, nsec: i64) -> SystemTime {
    if sec >= 0 {
        UNIX_EPOCH + Duration::new(sec as u64, nsec as u32)
    } else {
        UNIX_EPOCH - Duration::from_secs((-sec) as u64)
    }
}

fn kind_of_mode(mode: u32) -> FileType {
    match mode & libc::S_IFMT {
        libc::S_IFDIR => FileType::Directory,
        libc::S_IFLNK => FileType::Symlink,
        libc::S_IFCHR => FileType::CharDevice,
        libc::S_IFBLK => FileType::BlockDevice,
        libc::S_IFIFO => FileType::NamedPipe,
        libc::S_IFSOCK => FileType::Socket,
        _ => FileType::RegularFile,
    }
}

fn kind_of_dir_entry(file_type: &fs::FileType) -> FileType {
    if file_type.is_dir() {
        FileType::Directory
    } else if file_type.is_symlink() {
        FileType::Symlink
    } else if file_type.is_fifo() {
        FileType::NamedPipe
    } else if file_type.is_socket() {
        FileType::Socket
    } else if file_type.is_char_device() {
        FileType::CharDevice
    } else if file_type.is_block_device() {
        FileType::BlockDevice
    } else {
        FileType::RegularFile
    }
}

fn attr_from_stat(st: &FileStat, ino: u64) -> FileAttr {
    FileAttr {
        ino,
        size: st.st_size as u64,
        blocks: st.st_blocks as u64,
        atime: systime(st.st_atime, st.st_atime_nsec),
        mtime: systime(st.st_mtime, st.st_mtime_nsec),
        ctime: systime(st.st_ctime, st.st_ctime_nsec),
        crtime: UNIX_EPOCH,
        kind: kind_of_mode(st.st_mode),
        perm: (st.st_mode & 0o7777) as u16,
        nlink: st.st_nlink as u32,
        uid: st.st_uid,
        gid: st.st_gid,
        rdev: st.st_rdev as u32,
        blksize: st.st_blksize as u32,
        flags: 0,
    }
}

fn timespec_of(time: Option<TimeOrNow>) -> TimeSpec {
    let raw = match time {
        Some(TimeOrNow::SpecificTime(at)) => {
            let since_epoch = at.duration_since(UNIX_EPOCH).unwrap_or_default();
            libc::timespec {
                tv_sec: since_epoch.as_secs() as libc::time_t,
                tv_nsec: since_epoch.subsec_nanos() as libc::c_long,
            }
        }
        Some(TimeOrNow::Now) => libc::timespec {
            tv_sec: 0,
            tv_nsec: libc::UTIME_NOW,
        },
        None => libc::timespec {
            tv_sec: 0,
            tv_nsec: libc::UTIME_OMIT,
        },
    };
    TimeSpec::from(raw)
}

impl Filesystem for CredentialFuse {
    fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let rel = match self.child_of(parent, name) {
            Ok(rel) => rel,
            Err(errno) => return reply.error(errno),
        };
        match self.attr_of(&rel, caller_pid(req)) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn getattr(&mut self, req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let rel = match self.path_of(ino) {
            Ok(rel) => rel,
            Err(errno) => return reply.error(errno),
        };
        match self.attr_of(&rel, caller_pid(req)) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let pid = caller_pid(req);
        let rel = match self.path_of(ino) {
            Ok(rel) => rel,
            Err(errno) => return reply.error(errno),
        };
        let real = match self.resolve(&rel, pid) {
            Ok(real) => real,
            Err(errno) => return reply.error(errno),
        };

        if let Some(mode) = mode {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(&real, fs::Permissions::from_mode(mode)) {
                return reply.error(io_errno(&e));
            }
        }
        if uid.is_some() || gid.is_some() {
            if let Err(e) = chown(&real, uid.map(Uid::from_raw), gid.map(Gid::from_raw)) {
                return reply.error(nix_errno(e));
            }
        }
        if let Some(size) = size {
            let truncated = match fh {
                Some(fh) => ftruncate(fh as RawFd, size as libc::off_t).map_err(nix_errno),
                None => fs::OpenOptions::new()
                    .write(true)
                    .open(&real)
                    .and_then(|f| f.set_len(size))
                    .map_err(|e| io_errno(&e)),
            };
            if let Err(errno) = truncated {
                return reply.error(errno);
            }
        }
        if atime.is_some() || mtime.is_some() {
            if let Err(e) = utimensat(
                None,
                &real,
                &timespec_of(atime),
                &timespec_of(mtime),
                UtimensatFlags::FollowSymlink,
            ) {
                return reply.error(nix_errno(e));
            }
        }

        match self.attr_of(&rel, pid) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        let rel = match self.path_of(ino) {
            Ok(rel) => rel,
            Err(errno) => return reply.error(errno),
        };
        match fs::read_link(self.fs.backing_path(&rel)) {
            Ok(target) => reply.data(target.as_os_str().as_bytes()),
            Err(e) => reply.error(io_errno(&e)),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let rel = match self.child_of(parent, name) {
            Ok(rel) => rel,
            Err(errno) => return reply.error(errno),
        };
        let real = self.fs.backing_path(&rel);
        if let Err(e) = fs::DirBuilder::new().mode(mode).create(&real) {
            return reply.error(io_errno(&e));
        }
        match lstat(&real) {
            Ok(st) => {
                let ino = self.ino_for(&rel);
                reply.entry(&TTL, &attr_from_stat(&st, ino), 0);
            }
            Err(e) => reply.error(nix_errno(e)),
        }
    }

    fn unlink(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let rel = match self.child_of(parent, name) {
            Ok(rel) => rel,
            Err(errno) => return reply.error(errno),
        };
        let real = match self.resolve(&rel, caller_pid(req)) {
            Ok(real) => real,
            Err(errno) => return reply.error(errno),
        };
        match fs::remove_file(real) {
            Ok(()) => {
                self.drop_path(&rel);
                reply.ok()
            }
            Err(e) => reply.error(io_errno(&e)),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let rel = match self.child_of(parent, name) {
            Ok(rel) => rel,
            Err(errno) => return reply.error(errno),
        };
        match fs::remove_dir(self.fs.backing_path(&rel)) {
            Ok(()) => {
                self.drop_path(&rel);
                reply.ok()
            }
            Err(e) => reply.error(io_errno(&e)),
        }
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        link: &Path,
        reply: ReplyEntry,
    ) {
        let rel = match self.child_of(parent, name) {
            Ok(rel) => rel,
            Err(errno) => return reply.error(errno),
        };
        let real = self.fs.backing_path(&rel);
        if let Err(e) = std::os::unix::fs::symlink(link, &real) {
            return reply.error(io_errno(&e));
        }
        match lstat(&real) {
            Ok(st) => {
                let ino = self.ino_for(&rel);
                reply.entry(&TTL, &attr_from_stat(&st, ino), 0);
            }
            Err(e) => reply.error(nix_errno(e)),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        // Renames act on the shared view even for credential basenames;
        // renaming a credential file is not something a correct caller does.
        let old_rel = match self.child_of(parent, name) {
            Ok(rel) => rel,
            Err(errno) => return reply.error(errno),
        };
        let new_rel = match self.child_of(newparent, newname) {
            Ok(rel) => rel,
            Err(errno) => return reply.error(errno),
        };
        match fs::rename(
            self.fs.backing_path(&old_rel),
            self.fs.backing_path(&new_rel),
        ) {
            Ok(()) => {
                self.drop_path(&new_rel);
                self.rekey(&old_rel, &new_rel);
                reply.ok()
            }
            Err(e) => reply.error(io_errno(&e)),
        }
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        let target_rel = match self.path_of(ino) {
            Ok(rel) => rel,
            Err(errno) => return reply.error(errno),
        };
        let new_rel = match self.child_of(newparent, newname) {
            Ok(rel) => rel,
            Err(errno) => return reply.error(errno),
        };
        let real = self.fs.backing_path(&new_rel);
        if let Err(e) = fs::hard_link(self.fs.backing_path(&target_rel), &real) {
            return reply.error(io_errno(&e));
        }
        match lstat(&real) {
            Ok(st) => {
                let new_ino = self.ino_for(&new_rel);
                reply.entry(&TTL, &attr_from_stat(&st, new_ino), 0);
            }
            Err(e) => reply.error(nix_errno(e)),
        }
    }

    fn open(&mut self, req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let rel = match self.path_of(ino) {
            Ok(rel) => rel,
            Err(errno) => return reply.error(errno),
        };
        let real = match self.resolve(&rel, caller_pid(req)) {
            Ok(real) => real,
            Err(errno) => return reply.error(errno),
        };
        match open(&real, OFlag::from_bits_truncate(flags), Mode::empty()) {
            Ok(fd) => reply.opened(fd as u64, FOPEN_DIRECT_IO),
            Err(e) => reply.error(nix_errno(e)),
        }
    }

    fn create(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        let rel = match self.child_of(parent, name) {
            Ok(rel) => rel,
            Err(errno) => return reply.error(errno),
        };
        let real = match self.resolve(&rel, caller_pid(req)) {
            Ok(real) => real,
            Err(errno) => return reply.error(errno),
        };
        if let Some(parent_dir) = real.parent() {
            if let Err(e) = fs::create_dir_all(parent_dir) {
                return reply.error(io_errno(&e));
            }
        }
        let fd = match open(
            &real,
            OFlag::from_bits_truncate(flags) | OFlag::O_CREAT,
            Mode::from_bits_truncate(mode),
        ) {
            Ok(fd) => fd,
            Err(e) => return reply.error(nix_errno(e)),
        };
        match lstat(&real) {
            Ok(st) => {
                let ino = self.ino_for(&rel);
                reply.created(&TTL, &attr_from_stat(&st, ino), 0, fd as u64, FOPEN_DIRECT_IO);
            }
            Err(e) => {
                let _ = close(fd);
                reply.error(nix_errno(e));
            }
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let mut buf = vec![0u8; size as usize];
        match pread(fh as RawFd, &mut buf, offset as libc::off_t) {
            Ok(read) => reply.data(&buf[..read]),
            Err(e) => reply.error(nix_errno(e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        match pwrite(fh as RawFd, data, offset as libc::off_t) {
            Ok(written) => reply.written(written as u32),
            Err(e) => reply.error(nix_errno(e)),
        }
    }

    fn flush(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        match fsync(fh as RawFd) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(nix_errno(e)),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        let _ = close(fh as RawFd);
        reply.ok();
    }

    fn fsync(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, datasync: bool, reply: ReplyEmpty) {
        let result = if datasync {
            fdatasync(fh as RawFd)
        } else {
            fsync(fh as RawFd)
        };
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(nix_errno(e)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let rel = match self.path_of(ino) {
            Ok(rel) => rel,
            Err(errno) => return reply.error(errno),
        };

        let parent_ino = match rel.parent() {
            Some(parent) => self.ino_for(&parent.to_path_buf()),
            None => ROOT_INO,
        };
        // Listings always come from the backing directory: every caller sees
        // the same entries, only credential file contents differ.
        let mut entries: Vec<(u64, FileType, std::ffi::OsString)> = vec![
            (ino, FileType::Directory, ".".into()),
            (parent_ino, FileType::Directory, "..".into()),
        ];
        if let Ok(dir) = fs::read_dir(self.fs.backing_path(&rel)) {
            for entry in dir.flatten() {
                let kind = entry
                    .file_type()
                    .map(|t| kind_of_dir_entry(&t))
                    .unwrap_or(FileType::RegularFile);
                let child_ino = self.ino_for(&rel.join(entry.file_name()));
                entries.push((child_ino, kind, entry.file_name()));
            }
        }

        for (i, (entry_ino, kind, name)) in entries.into_iter().enumerate().skip(offset as usize) {
            if reply.add(entry_ino, (i + 1) as i64, kind, &name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, req: &Request<'_>, ino: u64, reply: ReplyStatfs) {
        let rel = match self.path_of(ino) {
            Ok(rel) => rel,
            Err(errno) => return reply.error(errno),
        };
        let real = match self.resolve(&rel, caller_pid(req)) {
            Ok(real) => real,
            Err(errno) => return reply.error(errno),
        };
        match statvfs(&real) {
            Ok(st) => reply.statfs(
                st.blocks() as u64,
                st.blocks_free() as u64,
                st.blocks_available() as u64,
                st.files() as u64,
                st.files_free() as u64,
                st.block_size() as u32,
                st.name_max() as u32,
                st.fragment_size() as u32,
            ),
            Err(e) => reply.error(nix_errno(e)),
        }
    }

    fn access(&mut self, req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        let rel = match self.path_of(ino) {
            Ok(rel) => rel,
            Err(errno) => return reply.error(errno),
        };
        let real = match self.resolve(&rel, caller_pid(req)) {
            Ok(real) => real,
            Err(errno) => return reply.error(errno),
        };
        match access(&real, AccessFlags::from_bits_truncate(mask)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(nix_errno(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AccountRegistry;
    use crate::utils::create_temp_dir;
    use anyhow::Result;
    use std::sync::Arc;

    fn test_adapter(root: &Path) -> CredentialFuse {
        let registry = Arc::new(AccountRegistry::load(root.join("pid-map.json"), "default"));
        fs::create_dir_all(root.join("backing")).unwrap();
        CredentialFuse::new(CredentialFs::new(
            "claude",
            root.join("backing"),
            root.join("profiles"),
            registry,
            &[".credentials.json"],
        ))
    }

    #[test]
    fn test_inodes_are_stable_per_path() -> Result<()> {
        let tmp = create_temp_dir("test_inodes_are_stable_per_path")?;
        let mut adapter = test_adapter(&tmp);

        let first = adapter.ino_for(Path::new("settings.json"));
        let second = adapter.ino_for(Path::new("settings.json"));
        let other = adapter.ino_for(Path::new("other.json"));
        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_ne!(first, ROOT_INO);
        Ok(())
    }

    #[test]
    fn test_root_inode_is_the_empty_path() -> Result<()> {
        let tmp = create_temp_dir("test_root_inode_is_the_empty_path")?;
        let adapter = test_adapter(&tmp);
        assert_eq!(adapter.path_of(ROOT_INO).unwrap(), PathBuf::new());
        assert_eq!(adapter.path_of(999), Err(libc::ENOENT));
        Ok(())
    }

    #[test]
    fn test_rename_rekeys_descendants() -> Result<()> {
        let tmp = create_temp_dir("test_rename_rekeys_descendants")?;
        let mut adapter = test_adapter(&tmp);

        let dir = adapter.ino_for(Path::new("projects"));
        let child = adapter.ino_for(Path::new("projects/notes.md"));
        adapter.rekey(Path::new("projects"), Path::new("archive"));

        assert_eq!(adapter.path_of(dir).unwrap(), PathBuf::from("archive"));
        assert_eq!(
            adapter.path_of(child).unwrap(),
            PathBuf::from("archive/notes.md")
        );
        assert_eq!(adapter.ino_for(Path::new("archive")), dir);
        Ok(())
    }

    #[test]
    fn test_attr_of_resolves_per_caller() -> Result<()> {
        let tmp = create_temp_dir("test_attr_of_resolves_per_caller")?;
        let mut adapter = test_adapter(&tmp);
        crate::utils::write_file(tmp.join("backing/.credentials.json"), "{\"k\":1}")?;

        let attr = adapter.attr_of(Path::new(".credentials.json"), 0).unwrap();
        assert_eq!(attr.kind, FileType::RegularFile);
        assert_eq!(attr.size, 7);
        assert!(tmp
            .join("profiles/default/claude/.credentials.json")
            .exists());
        Ok(())
    }

    #[test]
    fn test_kind_of_mode() {
        assert_eq!(kind_of_mode(libc::S_IFDIR | 0o755), FileType::Directory);
        assert_eq!(kind_of_mode(libc::S_IFREG | 0o644), FileType::RegularFile);
        assert_eq!(kind_of_mode(libc::S_IFLNK | 0o777), FileType::Symlink);
    }
}
