// src/exec/tree.rs

//! The set of processes a spawned child started, addressed as one unit.
//!
//! On Unix this is the child's process group (the child is spawned with
//! `process_group(0)`, so the group id equals its pid). On Windows it is a
//! job object with `KILL_ON_JOB_CLOSE`; when no job could be created the
//! tree falls back to the direct child only.
//!
//! Once the leader exits, the rest of the tree is reaped with a forced kill
//! unless the tree was detached or a graceful stop owns the escalation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;

pub(crate) struct ProcessTree {
    pid: u32,
    detached: AtomicBool,
    stopping: AtomicBool,
    /// Wakes the waiter task to kill the direct child.
    #[cfg_attr(unix, allow(dead_code))]
    leader_kill: Arc<Notify>,
    #[cfg(windows)]
    job: Option<job::Job>,
}

impl ProcessTree {
    #[cfg(not(windows))]
    pub(crate) fn new(pid: u32, leader_kill: Arc<Notify>) -> Self {
        Self {
            pid,
            detached: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            leader_kill,
        }
    }

    #[cfg(windows)]
    pub(crate) fn new(
        pid: u32,
        leader_kill: Arc<Notify>,
        process: Option<std::os::windows::io::RawHandle>,
    ) -> Self {
        let job = process.and_then(|handle| match job::Job::assign(handle) {
            Ok(job) => Some(job),
            Err(e) => {
                tracing::warn!(pid, error = %e, "could not place process in a job object; only the process itself will be killed");
                None
            }
        });
        Self {
            pid,
            detached: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            leader_kill,
            job,
        }
    }

    /// First step of a stop. Marks the tree so leader exit does not reap it.
    pub(crate) fn terminate(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        #[cfg(unix)]
        signal_group(self.pid, nix::sys::signal::Signal::SIGTERM);
        // No graceful console signal for arbitrary processes; terminate now.
        #[cfg(not(unix))]
        self.force();
    }

    pub(crate) fn force(&self) {
        #[cfg(unix)]
        signal_group(self.pid, nix::sys::signal::Signal::SIGKILL);
        #[cfg(windows)]
        {
            if let Some(job) = &self.job {
                job.terminate();
                return;
            }
        }
        #[cfg(not(unix))]
        {
            debug!(pid = self.pid, "forcing termination");
            self.leader_kill.notify_one();
        }
    }

    /// Whether any member of the tree is still running.
    ///
    /// On Windows only the leader is tracked; callers consult the leader's
    /// exit first.
    pub(crate) fn is_alive(&self) -> bool {
        #[cfg(unix)]
        {
            group_alive(self.pid)
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    /// Called by the waiter once the leader has exited.
    pub(crate) fn reap(&self) {
        if self.detached.load(Ordering::SeqCst) || self.stopping.load(Ordering::SeqCst) {
            return;
        }
        if self.is_alive() {
            debug!(pid = self.pid, "leader exited; killing the rest of its tree");
            self.force();
        }
        #[cfg(windows)]
        if let Some(job) = &self.job {
            job.terminate();
        }
    }

    /// Leave the tree running past the supervisor's lifetime.
    pub(crate) fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
        #[cfg(windows)]
        if let Some(job) = &self.job {
            job.release();
        }
    }
}

/// Signal the whole process group led by `pid`.
#[cfg(unix)]
fn signal_group(pid: u32, sig: nix::sys::signal::Signal) {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        tracing::warn!(pid, "pid out of range; cannot signal");
        return;
    };
    match killpg(Pid::from_raw(raw), sig) {
        Ok(()) => debug!(pid, signal = %sig, "signalled process group"),
        Err(Errno::ESRCH) => debug!(pid, signal = %sig, "process group already gone"),
        Err(e) => tracing::warn!(pid, signal = %sig, error = %e, "failed to signal process group"),
    }
}

#[cfg(unix)]
fn group_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match killpg(Pid::from_raw(raw), None) {
        Ok(()) => true,
        // Members exist but belong to someone else.
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(windows)]
mod job {
    use std::ffi::c_void;
    use std::io;
    use std::os::windows::io::RawHandle;

    use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
    use windows_sys::Win32::System::JobObjects::{
        AssignProcessToJobObject, CreateJobObjectW, JobObjectExtendedLimitInformation,
        SetInformationJobObject, TerminateJobObject, JOBOBJECT_EXTENDED_LIMIT_INFORMATION,
        JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE,
    };

    /// Job object that takes every member down when its last handle closes.
    pub(super) struct Job(HANDLE);

    // SAFETY: the handle is owned by this value and only passed to the
    // job object API, which may be called from any thread.
    unsafe impl Send for Job {}
    unsafe impl Sync for Job {}

    impl Job {
        pub(super) fn assign(process: RawHandle) -> io::Result<Self> {
            // SAFETY: null attributes and name create an anonymous job.
            let handle = unsafe { CreateJobObjectW(std::ptr::null(), std::ptr::null()) };
            if handle.is_null() {
                return Err(io::Error::last_os_error());
            }
            let job = Job(handle);
            job.set_limits(JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE)?;

            // SAFETY: `process` is the live handle owned by the tokio child.
            if unsafe { AssignProcessToJobObject(job.0, process as HANDLE) } == 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(job)
        }

        fn set_limits(&self, flags: u32) -> io::Result<()> {
            // SAFETY: all-zero is a valid value for this plain C struct.
            let mut info: JOBOBJECT_EXTENDED_LIMIT_INFORMATION = unsafe { std::mem::zeroed() };
            info.BasicLimitInformation.LimitFlags = flags;

            // SAFETY: `info` outlives the call and the size matches its type.
            let ok = unsafe {
                SetInformationJobObject(
                    self.0,
                    JobObjectExtendedLimitInformation,
                    &info as *const JOBOBJECT_EXTENDED_LIMIT_INFORMATION as *const c_void,
                    std::mem::size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32,
                )
            };
            if ok == 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }

        pub(super) fn terminate(&self) {
            // SAFETY: the handle is valid until drop.
            if unsafe { TerminateJobObject(self.0, 1) } == 0 {
                tracing::debug!(error = %io::Error::last_os_error(), "terminating job failed; it may be empty");
            }
        }

        /// Drop the kill-on-close limit so members survive the handle.
        pub(super) fn release(&self) {
            if let Err(e) = self.set_limits(0) {
                tracing::warn!(error = %e, "could not release job object; detached process may be killed on exit");
            }
        }
    }

    impl Drop for Job {
        fn drop(&mut self) {
            // SAFETY: the handle is owned and closed exactly once.
            unsafe {
                CloseHandle(self.0);
            }
        }
    }
}
