use std::os::fd::RawFd;

use nix::errno::Errno;
use nix::unistd::read;

use crate::execution::ExitStatus;
use crate::expansion::DEFAULT_IFS;
use crate::parse::is_valid_name;
use crate::variables::Variables;

use super::builtin_error;

/// `read [-u fd] [NAME...]`
pub(crate) fn run_read(vars: &mut Variables, args: &[String]) -> ExitStatus {
    let mut fd: RawFd = 0;
    let mut rest = args;
    while let Some((first, tail)) = rest.split_first() {
        match first.as_str() {
            "-u" => {
                let Some((value, tail)) = tail.split_first() else {
                    return builtin_error("read", "-u: option requires an argument");
                };
                match value.parse::<RawFd>() {
                    Ok(n) if n >= 0 => fd = n,
                    _ => return builtin_error("read", format!("{value}: invalid file descriptor")),
                }
                rest = tail;
            }
            "--" => {
                rest = tail;
                break;
            }
            _ => break,
        }
    }
    let names: Vec<&str> = if rest.is_empty() {
        vec!["REPLY"]
    } else {
        rest.iter().map(String::as_str).collect()
    };
    if let Some(bad) = names.iter().find(|name| !is_valid_name(name)) {
        return builtin_error("read", format!("`{bad}': not a valid identifier"));
    }

    let line = match read_line(fd) {
        Ok(line) => line,
        Err(err) => return builtin_error("read", format!("{fd}: {}", err.desc())),
    };
    let ifs = vars.get("IFS").unwrap_or_else(|| DEFAULT_IFS.to_string());
    let text = line.as_deref().unwrap_or_default();
    let fields = split_line(text, &ifs, names.len());
    for (index, name) in names.iter().enumerate() {
        vars.set(name, fields.get(index).map(String::as_str).unwrap_or_default());
    }
    ExitStatus::from_bool(line.is_some())
}

/// Reads up to and excluding the next newline, one byte at a time so
/// nothing past it is consumed. `None` means end of input with no data.
fn read_line(fd: RawFd) -> Result<Option<String>, Errno> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match read(fd, &mut byte) {
            Ok(0) => {
                if bytes.is_empty() {
                    return Ok(None);
                }
                break;
            }
            Ok(_) if byte[0] == b'\n' => break,
            Ok(_) => bytes.push(byte[0]),
            Err(Errno::EINTR) => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Splits into at most `count` fields; the last one keeps the remainder.
fn split_line(text: &str, ifs: &str, count: usize) -> Vec<String> {
    let is_sep = |c: char| ifs.contains(c);
    let mut rest = text.trim_start_matches(is_sep);
    let mut fields = Vec::new();
    while fields.len() + 1 < count {
        let Some(end) = rest.find(is_sep) else {
            break;
        };
        fields.push(rest[..end].to_string());
        rest = rest[end..].trim_start_matches(is_sep);
    }
    let rest = rest.trim_end_matches(is_sep);
    if !rest.is_empty() {
        fields.push(rest.to_string());
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::{close, pipe, write};
    use serial_test::serial;
    use std::os::fd::IntoRawFd;

    #[test]
    fn split_keeps_the_remainder() {
        assert_eq!(split_line("  a b  c d ", DEFAULT_IFS, 2), vec!["a", "b  c d"]);
        assert_eq!(split_line("a b", DEFAULT_IFS, 3), vec!["a", "b"]);
        assert_eq!(split_line("x:y:z", ":", 1), vec!["x:y:z"]);
        assert!(split_line("   ", DEFAULT_IFS, 1).is_empty());
    }

    #[test]
    #[serial]
    fn reads_one_line_per_call() {
        let (read_end, write_end) = pipe().unwrap();
        write(&write_end, b"first line\nsecond").unwrap();
        drop(write_end);
        let fd = read_end.into_raw_fd();
        let fd_arg = fd.to_string();
        let mut vars = Variables::new();

        let args: Vec<String> = vec!["-u".into(), fd_arg.clone(), "A".into(), "B".into()];
        assert_eq!(run_read(&mut vars, &args), ExitStatus::SUCCESS);
        assert_eq!(vars.get("A").as_deref(), Some("first"));
        assert_eq!(vars.get("B").as_deref(), Some("line"));

        let args: Vec<String> = vec!["-u".into(), fd_arg.clone()];
        assert_eq!(run_read(&mut vars, &args), ExitStatus::SUCCESS);
        assert_eq!(vars.get("REPLY").as_deref(), Some("second"));

        assert_eq!(run_read(&mut vars, &args), ExitStatus::FAILURE);
        assert_eq!(vars.get("REPLY").as_deref(), Some(""));
        close(fd).unwrap();
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut vars = Variables::new();
        let args: Vec<String> = vec!["-u".into(), "0".into(), "1X".into()];
        assert_eq!(run_read(&mut vars, &args), ExitStatus::FAILURE);
    }
}
