use std::io;

use log::debug;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

use crate::job_control::set_terminal_foreground;

/// Ignores the job-control signals an interactive shell must survive.
pub fn install_signal_handlers(interactive: bool) -> io::Result<()> {
    let action = SigAction::new(SigHandler::SigIgn, SaFlags::SA_RESTART, SigSet::empty());
    // Needed whenever the shell hands the terminal back to itself.
    install_action(Signal::SIGTTOU, &action)?;
    if interactive {
        install_action(Signal::SIGINT, &action)?;
        install_action(Signal::SIGTSTP, &action)?;
        install_action(Signal::SIGQUIT, &action)?;
        install_action(Signal::SIGTTIN, &action)?;
    }
    debug!("signal event=install mode=ignore interactive={}", interactive);
    Ok(())
}

/// Puts the shell in its own process group when interactive and returns the
/// group id if the shell now owns the controlling terminal.
pub fn init_session(interactive: bool) -> io::Result<Option<i32>> {
    let pid = unsafe { libc::getpid() };
    let pgid = unsafe { libc::getpgrp() };
    if interactive && pgid != pid {
        let rc = unsafe { libc::setpgid(0, 0) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    if unsafe { libc::isatty(libc::STDIN_FILENO) } != 1 {
        return Ok(None);
    }
    let pgid = unsafe { libc::getpgrp() };
    if interactive {
        set_terminal_foreground(nix::unistd::Pid::from_raw(pgid))?;
    }
    let owner = unsafe { libc::tcgetpgrp(libc::STDIN_FILENO) };
    debug!("signal event=session pgid={} owner={}", pgid, owner);
    Ok((owner == pgid).then_some(pgid))
}

fn install_action(signal: Signal, action: &SigAction) -> io::Result<()> {
    unsafe { sigaction(signal, action) }
        .map(|_| ())
        .map_err(|err| io::Error::other(err.to_string()))
}
