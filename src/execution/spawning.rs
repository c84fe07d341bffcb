use std::ffi::CString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;
use nix::errno::Errno;
use nix::unistd::{ForkResult, Pid, execve, fork, setpgid};

use crate::error::{ErrorKind, ShellError, ShellResult};
use crate::job_control::reset_child_signals;

/// Process group a forked child should end up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessGroup {
    /// Stay in the parent's group
    Inherit,
    /// Lead a new group
    Lead,
    /// Join an existing group
    Join(Pid),
}

/// Forks and runs `child` in the new process. The child exits with the code
/// `child` returns and never comes back.
pub fn fork_child(group: ProcessGroup, child: impl FnOnce() -> i32) -> ShellResult<Pid> {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            reset_child_signals();
            join_group(Pid::from_raw(0), group);
            let code = child();
            exit_child(code)
        }
        Ok(ForkResult::Parent { child }) => {
            // Both sides call setpgid so the group exists before either proceeds.
            join_group(child, group);
            debug!("job event=spawn pid={} group={:?}", child, group);
            Ok(child)
        }
        Err(err) => Err(ShellError::new(
            ErrorKind::Io,
            format!("fork: {}", err.desc()),
        )),
    }
}

fn join_group(pid: Pid, group: ProcessGroup) {
    let result = match group {
        ProcessGroup::Inherit => return,
        ProcessGroup::Lead => setpgid(pid, Pid::from_raw(0)),
        ProcessGroup::Join(pgid) => setpgid(pid, pgid),
    };
    // EACCES: the child already exec'd; ESRCH: it already exited.
    if let Err(err) = result {
        if err != Errno::EACCES && err != Errno::ESRCH {
            debug!("job event=setpgid pid={} error={}", pid, err);
        }
    }
}

/// Leaves a forked child without running destructors or atexit handlers.
pub fn exit_child(code: i32) -> ! {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
    unsafe { libc::_exit(code) }
}

/// Resolves `name` through `path`. Names containing `/` are used as given.
pub fn find_executable(name: &str, path: Option<&str>) -> Option<PathBuf> {
    if name.contains('/') {
        return Some(PathBuf::from(name));
    }
    if name.is_empty() {
        return None;
    }
    path?
        .split(':')
        .map(|dir| if dir.is_empty() { Path::new(".") } else { Path::new(dir) })
        .map(|dir| dir.join(name))
        .find(|candidate| {
            fs::metadata(candidate)
                .map(|meta| meta.is_file())
                .unwrap_or(false)
        })
}

/// Replaces the current (forked) process with `argv`. Only returns on
/// failure, with the exit code the child should report.
pub fn exec_program(argv: &[String], env: &[(String, String)], path: Option<&str>) -> i32 {
    let Some(name) = argv.first() else {
        return 0;
    };
    let Some(program) = find_executable(name, path) else {
        eprintln!("cinder: {name}: command not found");
        return ErrorKind::CommandNotFound.exit_code();
    };
    let Some(program) = to_cstring(program.to_string_lossy().as_ref()) else {
        eprintln!("cinder: {name}: invalid program name");
        return 1;
    };
    let args: Option<Vec<CString>> = argv.iter().map(|arg| to_cstring(arg)).collect();
    let envp: Option<Vec<CString>> = env
        .iter()
        .map(|(key, value)| to_cstring(&format!("{key}={value}")))
        .collect();
    let (Some(args), Some(envp)) = (args, envp) else {
        eprintln!("cinder: {name}: argument contains a NUL byte");
        return 1;
    };
    let err = match execve(&program, &args, &envp) {
        Ok(never) => match never {},
        Err(err) => err,
    };
    let (message, code) = exec_error_message(name, err);
    eprintln!("cinder: {message}");
    code
}

fn to_cstring(text: &str) -> Option<CString> {
    CString::new(text.as_bytes()).ok()
}

fn exec_error_message(name: &str, err: Errno) -> (String, i32) {
    match err {
        Errno::ENOENT => (
            format!("{name}: No such file or directory"),
            ErrorKind::CommandNotFound.exit_code(),
        ),
        Errno::EACCES | Errno::ENOEXEC | Errno::EISDIR => {
            let is_dir = fs::metadata(name).map(|meta| meta.is_dir()).unwrap_or(false);
            if is_dir {
                (format!("{name}: is a directory"), ErrorKind::ExecFailure.exit_code())
            } else {
                (format!("{name}: {}", err.desc()), ErrorKind::ExecFailure.exit_code())
            }
        }
        other => (format!("{name}: {}", other.desc()), 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::wait::{WaitStatus, waitpid};
    use serial_test::serial;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    #[test]
    fn path_search_takes_first_regular_file() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        fs::create_dir(first.path().join("tool")).unwrap();
        let file = second.path().join("tool");
        fs::write(&file, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o755)).unwrap();
        let path = format!("{}:{}", first.path().display(), second.path().display());
        assert_eq!(find_executable("tool", Some(&path)), Some(file));
        assert_eq!(find_executable("missing", Some(&path)), None);
    }

    #[test]
    fn names_with_slash_bypass_the_search() {
        assert_eq!(
            find_executable("./run.sh", Some("/nonexistent")),
            Some(PathBuf::from("./run.sh"))
        );
        assert_eq!(find_executable("", Some("/bin")), None);
    }

    #[test]
    fn exec_errors_map_to_conventional_codes() {
        assert_eq!(exec_error_message("x", Errno::ENOENT).1, 127);
        assert_eq!(exec_error_message("x", Errno::EACCES).1, 126);
        assert_eq!(exec_error_message("x", Errno::E2BIG).1, 1);
    }

    #[test]
    #[serial]
    fn forked_child_reports_its_code() {
        let pid = fork_child(ProcessGroup::Lead, || 5).unwrap();
        match waitpid(pid, None).unwrap() {
            WaitStatus::Exited(_, code) => assert_eq!(code, 5),
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn missing_program_exits_127() {
        let pid = fork_child(ProcessGroup::Inherit, || {
            exec_program(&["cinder-no-such-program".to_string()], &[], Some("/nonexistent"))
        })
        .unwrap();
        match waitpid(pid, None).unwrap() {
            WaitStatus::Exited(_, code) => assert_eq!(code, 127),
            other => panic!("unexpected status {other:?}"),
        }
    }
}
