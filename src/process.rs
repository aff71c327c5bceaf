//! Read-only view of the OS process table, used to resolve the account of a
//! filesystem caller by walking its ancestry.

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use procfs::process::Process;

/// Returns true if the kernel still knows a process with this pid.
///
/// Delivers a null signal. ESRCH means the process is gone; any other
/// outcome (including EPERM) means it exists.
pub fn is_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }

    match kill(Pid::from_raw(pid), None) {
        Err(Errno::ESRCH) => false,
        _ => true,
    }
}

/// Returns the parent pid of `pid`, or 0 if the process has vanished or its
/// stat record cannot be read.
///
/// procfs locates the ppid field by splitting on the last `)` of the comm
/// field, so a process name containing `)` or whitespace cannot shift it.
pub fn parent_of(pid: i32) -> i32 {
    if pid <= 0 {
        return 0;
    }

    match Process::new(pid) {
        Ok(proc) => proc.stat.ppid,
        Err(_) => 0,
    }
}
