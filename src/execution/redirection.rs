//! File-descriptor redirection.
//!
//! `RedirectControl::oneshot` saves every descriptor it overwrites and puts
//! them back when dropped, so builtins and compound statements run in the
//! shell process cannot leak redirections into the shell's own stdio.
//! `RedirectControl::permanent` is for forked children about to exec.
use std::io::{self, Write};
use std::os::fd::RawFd;

use log::{debug, warn};
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, FdFlag, OFlag, fcntl, open};
use nix::sys::stat::Mode;
use nix::unistd::{close, dup2};

use crate::error::{ErrorKind, ShellError, ShellResult};
use crate::parse::RedirectOp;

/// Saved copies of overwritten descriptors live at or above this number.
pub const SHELL_FD_BASE: RawFd = 10;

/// A redirection whose target word has been expanded to a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRedirect {
    pub op: RedirectOp,
    pub dest: RawFd,
    pub src: Option<RawFd>,
    pub path: Option<String>,
}

impl ResolvedRedirect {
    pub fn file(op: RedirectOp, dest: RawFd, path: impl Into<String>) -> Self {
        Self {
            op,
            dest,
            src: None,
            path: Some(path.into()),
        }
    }

    pub fn copy(op: RedirectOp, dest: RawFd, src: RawFd) -> Self {
        Self {
            op,
            dest,
            src: Some(src),
            path: None,
        }
    }

    pub fn close(dest: RawFd) -> Self {
        Self {
            op: RedirectOp::Close,
            dest,
            src: None,
            path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RedirectMode {
    Oneshot,
    Permanent,
}

#[derive(Debug)]
pub struct RedirectControl {
    mode: RedirectMode,
    /// Overwritten descriptors and their saved copies; `None` when the
    /// descriptor was not open before.
    saved: Vec<(RawFd, Option<RawFd>)>,
}

impl RedirectControl {
    /// Applies `redirects` and restores the previous descriptors on drop.
    pub fn oneshot(redirects: &[ResolvedRedirect]) -> ShellResult<Self> {
        let mut control = Self {
            mode: RedirectMode::Oneshot,
            saved: Vec::new(),
        };
        control.apply_all(redirects)?;
        Ok(control)
    }

    /// Applies `redirects` for good.
    pub fn permanent(redirects: &[ResolvedRedirect]) -> ShellResult<()> {
        let mut control = Self {
            mode: RedirectMode::Permanent,
            saved: Vec::new(),
        };
        control.apply_all(redirects)
    }

    fn apply_all(&mut self, redirects: &[ResolvedRedirect]) -> ShellResult<()> {
        if redirects.is_empty() {
            return Ok(());
        }
        flush_std_streams();
        for redirect in redirects {
            if self.mode == RedirectMode::Oneshot {
                self.save(redirect.dest)?;
            }
            apply(redirect)?;
        }
        Ok(())
    }

    fn save(&mut self, fd: RawFd) -> ShellResult<()> {
        if self.saved.iter().any(|(dest, _)| *dest == fd) {
            return Ok(());
        }
        let copy = match fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(SHELL_FD_BASE)) {
            Ok(copy) => Some(copy),
            Err(Errno::EBADF) => None,
            Err(err) => return Err(err.into()),
        };
        debug!("redirect event=save fd={} copy={:?}", fd, copy);
        self.saved.push((fd, copy));
        Ok(())
    }

    fn restore(&mut self) {
        if self.saved.is_empty() {
            return;
        }
        flush_std_streams();
        for (fd, copy) in self.saved.drain(..).rev() {
            match copy {
                Some(copy) => {
                    if let Err(err) = dup2(copy, fd) {
                        warn!("redirect event=restore fd={} error={}", fd, err);
                    }
                    let _ = close(copy);
                }
                None => {
                    let _ = close(fd);
                }
            }
            debug!("redirect event=restore fd={}", fd);
        }
    }
}

impl Drop for RedirectControl {
    fn drop(&mut self) {
        if self.mode == RedirectMode::Oneshot {
            self.restore();
        }
    }
}

fn flush_std_streams() {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
}

fn apply(redirect: &ResolvedRedirect) -> ShellResult<()> {
    debug!(
        "redirect event=apply op={:?} fd={} src={:?}",
        redirect.op, redirect.dest, redirect.src
    );
    match redirect.op {
        RedirectOp::Close => match close(redirect.dest) {
            Ok(()) | Err(Errno::EBADF) => Ok(()),
            Err(err) => Err(err.into()),
        },
        RedirectOp::CopyRead | RedirectOp::CopyWrite => {
            let src = redirect.src.ok_or_else(|| {
                ShellError::new(ErrorKind::UnknownType, "duplication without a source descriptor")
            })?;
            dup2(src, redirect.dest)
                .map_err(|err| ShellError::new(ErrorKind::Io, format!("{src}: {}", err.desc())))?;
            Ok(())
        }
        RedirectOp::Read | RedirectOp::Write | RedirectOp::Append | RedirectOp::ReadWrite => {
            let path = redirect.path.as_deref().ok_or_else(|| {
                ShellError::new(ErrorKind::UnknownType, "file redirection without a target")
            })?;
            let fd = open_target(redirect.op, path)?;
            if fd == redirect.dest {
                // Landed on the target itself; it must survive exec.
                fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty()))?;
            } else {
                let result = dup2(fd, redirect.dest);
                let _ = close(fd);
                result?;
            }
            Ok(())
        }
    }
}

fn open_target(op: RedirectOp, path: &str) -> ShellResult<RawFd> {
    let flags = match op {
        RedirectOp::Read => OFlag::O_RDONLY,
        RedirectOp::Write => OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
        RedirectOp::Append => OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_APPEND,
        _ => OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_APPEND,
    };
    let mode = Mode::from_bits_truncate(0o644);
    open(path, flags | OFlag::O_CLOEXEC, mode).map_err(|err| {
        let kind = if err == Errno::ENOENT {
            ErrorKind::FileNotFound
        } else {
            ErrorKind::Io
        };
        ShellError::new(kind, format!("{path}: {}", err.desc()))
    })
}
