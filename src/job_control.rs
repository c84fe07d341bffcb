use std::io::{self, Write};
use std::os::fd::BorrowedFd;
use std::sync::atomic::{AtomicI32, Ordering};

use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, kill, sigaction};
use nix::sys::termios::{SetArg, Termios, tcgetattr, tcsetattr};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{Pid, tcsetpgrp};

use crate::execution::ExitStatus;

/// Process group that receives a forwarded SIGINT; 0 when nothing waits in the foreground.
static FOREGROUND_PGID: AtomicI32 = AtomicI32::new(0);

extern "C" fn forward_sigint(_: libc::c_int) {
    let pgid = FOREGROUND_PGID.load(Ordering::SeqCst);
    if pgid > 0 {
        unsafe {
            libc::kill(-pgid, libc::SIGINT);
        }
    }
}

/// Restores default dispositions in a freshly forked child.
pub fn reset_child_signals() {
    let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for &sig in &[
        Signal::SIGINT,
        Signal::SIGTSTP,
        Signal::SIGQUIT,
        Signal::SIGTTIN,
        Signal::SIGTTOU,
        Signal::SIGCHLD,
        Signal::SIGPIPE,
    ] {
        let _ = unsafe { sigaction(sig, &action) };
    }
}

pub fn set_terminal_foreground(pgid: Pid) -> io::Result<()> {
    let fd = unsafe { BorrowedFd::borrow_raw(libc::STDIN_FILENO) };
    match tcsetpgrp(fd, pgid) {
        Ok(()) => Ok(()),
        Err(Errno::ENOTTY) => Ok(()),
        Err(err) => Err(io::Error::other(err.to_string())),
    }
}

/// While alive, SIGINT delivered to the shell is forwarded to one process group.
pub struct SigintForwardGuard {
    previous: SigAction,
}

impl SigintForwardGuard {
    pub fn new(pgid: Pid) -> io::Result<Self> {
        FOREGROUND_PGID.store(pgid.as_raw(), Ordering::SeqCst);
        let action = SigAction::new(
            SigHandler::Handler(forward_sigint),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        let previous = unsafe { sigaction(Signal::SIGINT, &action) }.map_err(|err| {
            FOREGROUND_PGID.store(0, Ordering::SeqCst);
            io::Error::other(err.to_string())
        })?;
        debug!("signal event=forward pgid={}", pgid);
        Ok(Self { previous })
    }
}

impl Drop for SigintForwardGuard {
    fn drop(&mut self) {
        if let Err(err) = unsafe { sigaction(Signal::SIGINT, &self.previous) } {
            warn!("signal event=restore sigint error={}", err);
        }
        FOREGROUND_PGID.store(0, Ordering::SeqCst);
    }
}

pub struct TermiosGuard {
    saved: Option<Termios>,
}

impl TermiosGuard {
    pub fn new() -> Self {
        Self {
            saved: tcgetattr(unsafe { BorrowedFd::borrow_raw(libc::STDIN_FILENO) }).ok(),
        }
    }
}

impl Default for TermiosGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TermiosGuard {
    fn drop(&mut self) {
        if let Some(ref termios) = self.saved {
            let fd = unsafe { BorrowedFd::borrow_raw(libc::STDIN_FILENO) };
            if let Err(err) = tcsetattr(fd, SetArg::TCSANOW, termios) {
                warn!("termios event=restore error={}", err);
            }
        }
    }
}

pub struct TerminalGuard {
    shell_pgid: Pid,
    active: bool,
}

impl TerminalGuard {
    pub fn new(shell_pgid: Pid) -> Self {
        Self {
            shell_pgid,
            active: false,
        }
    }

    pub fn set_foreground(&mut self, pgid: Pid) -> io::Result<()> {
        set_terminal_foreground(pgid)?;
        self.active = true;
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.active {
            if let Err(err) = set_terminal_foreground(self.shell_pgid) {
                warn!("tty event=restore error={}", err);
            }
        }
    }
}

/// Runs `wait` with `pgid` as the foreground job: SIGINT is forwarded to it
/// and, when the shell owns the terminal, the terminal is handed over.
/// Everything is restored on every exit path.
pub fn with_foreground<T>(
    pgid: Pid,
    terminal: Option<Pid>,
    wait: impl FnOnce() -> T,
) -> io::Result<T> {
    let _forward = SigintForwardGuard::new(pgid)?;
    let _termios = terminal.map(|_| TermiosGuard::new());
    let mut tty = terminal.map(TerminalGuard::new);
    if let Some(tty) = tty.as_mut() {
        tty.set_foreground(pgid)?;
    }
    Ok(wait())
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum JobStatus {
    Running,
    Stopped,
}

#[derive(Debug)]
pub struct Job {
    pub id: usize,
    pub pgid: Pid,
    pub pids: Vec<Pid>,
    pub command: String,
    pub status: JobStatus,
}

pub enum JobPoll {
    Done,
    Stopped,
    Running,
    NoChange,
}

#[derive(Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    Exited,
    Stopped,
}

#[derive(Debug)]
pub struct WaitResult {
    pub outcome: WaitOutcome,
    /// Status of the last process in the job
    pub status: ExitStatus,
}

/// Background jobs of the interactive shell.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
    next_id: usize,
}

impl JobTable {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            next_id: 1,
        }
    }

    pub fn add(&mut self, pgid: Pid, pids: Vec<Pid>, command: &str, status: JobStatus) -> usize {
        if self.jobs.is_empty() {
            self.next_id = 1;
        }
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        debug!("job event=add id={} pgid={} count={}", id, pgid, pids.len());
        self.jobs.push(Job {
            id,
            pgid,
            pids,
            command: command.trim_end_matches('&').trim().to_string(),
            status,
        });
        id
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn write_list(&self, out: &mut impl Write) -> io::Result<()> {
        for job in &self.jobs {
            let status = match job.status {
                JobStatus::Running => "Running",
                JobStatus::Stopped => "Stopped",
            };
            writeln!(out, "[{}] {status} {}", job.id, job.command)?;
        }
        Ok(())
    }

    /// Removes the job with `id`, or the most recent one.
    pub fn take(&mut self, id: Option<usize>) -> Option<Job> {
        let index = match id {
            Some(id) => self.jobs.iter().position(|job| job.id == id)?,
            None => self.jobs.len().checked_sub(1)?,
        };
        Some(self.jobs.remove(index))
    }

    pub fn find(&mut self, id: Option<usize>) -> Option<&mut Job> {
        match id {
            Some(id) => self.jobs.iter_mut().find(|job| job.id == id),
            None => self.jobs.last_mut(),
        }
    }

    pub fn push(&mut self, job: Job) {
        self.jobs.push(job);
    }

    /// Polls every job without blocking and returns status lines for the
    /// ones that changed.
    pub fn reap(&mut self) -> Vec<String> {
        let mut notices = Vec::new();
        let mut index = 0;
        while index < self.jobs.len() {
            let pgid = self.jobs[index].pgid;
            match poll_job_status(pgid) {
                JobPoll::Done => {
                    let job = self.jobs.remove(index);
                    debug!("job event=reap done pgid={} id={}", job.pgid, job.id);
                    notices.push(format!("[{}] Done {}", job.id, job.command));
                }
                JobPoll::Stopped => {
                    let job = &mut self.jobs[index];
                    if job.status != JobStatus::Stopped {
                        job.status = JobStatus::Stopped;
                        debug!("job event=reap stopped pgid={} id={}", job.pgid, job.id);
                        notices.push(format!("[{}] Stopped {}", job.id, job.command));
                    }
                    index += 1;
                }
                JobPoll::Running => {
                    let job = &mut self.jobs[index];
                    if job.status != JobStatus::Running {
                        job.status = JobStatus::Running;
                        debug!("job event=reap running pgid={} id={}", job.pgid, job.id);
                        notices.push(format!("[{}] Running {}", job.id, job.command));
                    }
                    index += 1;
                }
                JobPoll::NoChange => {
                    index += 1;
                }
            }
        }
        notices
    }
}

pub fn parse_job_id(arg: Option<&String>) -> io::Result<Option<usize>> {
    if let Some(value) = arg {
        let trimmed = value.strip_prefix('%').unwrap_or(value);
        trimmed
            .parse::<usize>()
            .map(Some)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "job id must be a number"))
    } else {
        Ok(None)
    }
}

pub fn continue_job(pgid: Pid) -> io::Result<()> {
    debug!("job event=cont pgid={}", pgid);
    kill(Pid::from_raw(-pgid.as_raw()), Signal::SIGCONT)
        .map_err(|err| io::Error::other(err.to_string()))
}

/// Waits for every process of a job in order. The reported status is the
/// one of the last process. Returns early if a member stops.
pub fn wait_for_job(pids: &[Pid], untraced: bool) -> io::Result<WaitResult> {
    debug!(
        "job event=wait count={} last_pid={:?}",
        pids.len(),
        pids.last()
    );
    let flags = untraced.then_some(WaitPidFlag::WUNTRACED);
    let mut status = ExitStatus::SUCCESS;
    for (index, &pid) in pids.iter().enumerate() {
        let last = index + 1 == pids.len();
        loop {
            match waitpid(pid, flags) {
                Ok(WaitStatus::Exited(pid, code)) => {
                    debug!("job event=exit pid={} code={}", pid, code);
                    if last {
                        status = ExitStatus::Exited(code);
                    }
                    break;
                }
                Ok(WaitStatus::Signaled(pid, sig, _)) => {
                    debug!("job event=signal pid={} signal={}", pid, sig as i32);
                    if last {
                        status = ExitStatus::Signaled(sig as i32);
                    }
                    break;
                }
                Ok(WaitStatus::Stopped(pid, _)) => {
                    debug!("job event=stopped pid={}", pid);
                    return Ok(WaitResult {
                        outcome: WaitOutcome::Stopped,
                        status: ExitStatus::Signaled(libc::SIGTSTP),
                    });
                }
                Ok(WaitStatus::PtraceEvent(_, _, _)) | Ok(WaitStatus::PtraceSyscall(_)) => continue,
                Ok(WaitStatus::StillAlive) | Ok(WaitStatus::Continued(_)) => continue,
                Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => break,
                Err(err) => {
                    debug!("job event=wait error={}", err);
                    return Err(io::Error::other(err.to_string()));
                }
            }
        }
    }
    Ok(WaitResult {
        outcome: WaitOutcome::Exited,
        status,
    })
}

fn poll_job_status(pgid: Pid) -> JobPoll {
    let mut outcome = JobPoll::NoChange;
    loop {
        match waitpid(
            Pid::from_raw(-pgid.as_raw()),
            Some(WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED),
        ) {
            Ok(WaitStatus::Exited(_, _)) | Ok(WaitStatus::Signaled(_, _, _)) => {
                debug!("job event=poll exit pgid={}", pgid);
                continue;
            }
            Ok(WaitStatus::Stopped(_, _)) => {
                debug!("job event=poll stopped pgid={}", pgid);
                outcome = JobPoll::Stopped;
                break;
            }
            Ok(WaitStatus::Continued(_)) => {
                debug!("job event=poll continued pgid={}", pgid);
                outcome = JobPoll::Running;
                continue;
            }
            Ok(WaitStatus::PtraceEvent(_, _, _)) | Ok(WaitStatus::PtraceSyscall(_)) => continue,
            Ok(WaitStatus::StillAlive) => break,
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => {
                outcome = JobPoll::Done;
                break;
            }
            Err(_) => break,
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::{ForkResult, fork, setpgid};
    use serial_test::serial;

    /// Forks a child in its own process group that exits with `code`,
    /// optionally stopping itself first.
    fn spawn_child(pgid: Option<Pid>, code: i32, stop_first: bool) -> Pid {
        match unsafe { fork() }.unwrap() {
            ForkResult::Child => {
                reset_child_signals();
                let _ = setpgid(Pid::from_raw(0), pgid.unwrap_or(Pid::from_raw(0)));
                if stop_first {
                    unsafe {
                        libc::raise(libc::SIGSTOP);
                    }
                }
                unsafe { libc::_exit(code) }
            }
            ForkResult::Parent { child } => {
                let _ = setpgid(child, pgid.unwrap_or(child));
                child
            }
        }
    }

    #[test]
    #[serial]
    fn wait_reports_last_status() {
        let leader = spawn_child(None, 0, false);
        let follower = spawn_child(Some(leader), 7, false);
        let result = wait_for_job(&[leader, follower], true).unwrap();
        assert_eq!(result.outcome, WaitOutcome::Exited);
        assert_eq!(result.status, ExitStatus::Exited(7));
    }

    #[test]
    #[serial]
    fn wait_returns_when_a_member_stops() {
        let pid = spawn_child(None, 3, true);
        let result = wait_for_job(&[pid], true).unwrap();
        assert_eq!(result.outcome, WaitOutcome::Stopped);
        continue_job(pid).unwrap();
        let result = wait_for_job(&[pid], true).unwrap();
        assert_eq!(result.status, ExitStatus::Exited(3));
    }

    #[test]
    #[serial]
    fn reap_reports_finished_jobs() {
        let pid = spawn_child(None, 0, false);
        let mut table = JobTable::new();
        let id = table.add(pid, vec![pid], "true &", JobStatus::Running);
        assert_eq!(id, 1);
        let mut notices = Vec::new();
        for _ in 0..200 {
            notices = table.reap();
            if !notices.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(notices, vec!["[1] Done true".to_string()]);
        assert!(table.is_empty());
    }

    #[test]
    fn job_ids_and_listing() {
        let mut table = JobTable::new();
        table.add(Pid::from_raw(100), vec![], "sleep 5 &", JobStatus::Running);
        table.add(Pid::from_raw(200), vec![], "vi", JobStatus::Stopped);
        let mut out = Vec::new();
        table.write_list(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[1] Running sleep 5\n[2] Stopped vi\n"
        );
        assert_eq!(table.take(None).map(|job| job.id), Some(2));
        assert_eq!(table.find(Some(1)).map(|job| job.pgid), Some(Pid::from_raw(100)));
        assert!(table.take(Some(9)).is_none());
    }

    #[test]
    fn job_id_parsing() {
        assert_eq!(parse_job_id(Some(&"%2".to_string())).unwrap(), Some(2));
        assert_eq!(parse_job_id(None).unwrap(), None);
        assert!(parse_job_id(Some(&"x".to_string())).is_err());
    }
}
