//! Interpreter core of the `cinder` shell.
//!
//! The library holds everything except line editing: parsing, expansion,
//! execution and job control. The binary adds the interactive front end, and
//! fuzz targets link only what they need with default features off.

pub mod builtins;
pub mod config;
pub mod error;
pub mod execution;
pub mod expansion;
pub mod job_control;
pub mod parse;
pub mod signals;
pub mod variables;

pub use builtins::{Builtin, Builtins};
pub use error::{ErrorKind, ShellError, ShellResult};
pub use execution::{ExecOptions, ExitStatus, Executor, LoopSignal};
pub use parse::{Node, parse};
pub use variables::Variables;

/// Fuzz helper for parser-only targets.
pub fn fuzz_parse_bytes(data: &[u8]) {
    let input = String::from_utf8_lossy(data);
    if let Ok(Some(node)) = parse::parse(&input) {
        // Printing must not panic, and reparsing the printed form must not either.
        let _ = parse::parse(&node.to_string());
    }
}
