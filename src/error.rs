//! Error types and reporting for the shell.
//!
//! Parsing and execution report failures as a `ShellError` carrying:
//! - an error kind, which also decides the exit status reported for it
//! - a human-readable message
//! - optional context explaining what was being processed
//! - an optional byte offset pointing at the problem location
//!
//! Syntax errors raised because the input simply ended too early are flagged
//! as `incomplete`, so an interactive driver can ask for a continuation line
//! instead of reporting them.

use std::fmt;
use std::io;

/// Categorized error types for diagnostics and exit statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input found by the lexer or parser
    Syntax,
    /// A reserved word in a position where it cannot appear
    UnexpectedKeyword,
    /// An operator or node kind the executor does not understand
    UnknownType,
    /// Program lookup failed
    CommandNotFound,
    /// A redirection target could not be opened
    FileNotFound,
    /// The program was found but could not be started
    ExecFailure,
    /// A child process was terminated by a signal
    ChildSignaled,
    /// Any other operating system failure
    Io,
}

impl ErrorKind {
    /// Exit status the shell reports when a statement fails with this kind.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Syntax | ErrorKind::UnexpectedKeyword => 2,
            ErrorKind::CommandNotFound => 127,
            ErrorKind::ExecFailure => 126,
            ErrorKind::ChildSignaled => 128 + libc::SIGINT,
            ErrorKind::UnknownType | ErrorKind::FileNotFound | ErrorKind::Io => 1,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::Syntax => write!(f, "syntax error"),
            ErrorKind::UnexpectedKeyword => write!(f, "syntax error"),
            ErrorKind::UnknownType => write!(f, "unknown type"),
            ErrorKind::CommandNotFound => write!(f, "command not found"),
            ErrorKind::FileNotFound => write!(f, "file not found"),
            ErrorKind::ExecFailure => write!(f, "exec failure"),
            ErrorKind::ChildSignaled => write!(f, "child signaled"),
            ErrorKind::Io => write!(f, "I/O error"),
        }
    }
}

/// Rich error type with context information
#[derive(Debug, Clone)]
pub struct ShellError {
    pub kind: ErrorKind,
    pub message: String,
    /// Additional context explaining what was being processed
    pub context: Option<String>,
    /// Byte offset in the input where the error occurred
    pub position: Option<usize>,
    /// Set when more input could complete the construct
    pub incomplete: bool,
}

impl ShellError {
    /// Create a new error with just the kind and message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ShellError {
            kind,
            message: message.into(),
            context: None,
            position: None,
            incomplete: false,
        }
    }

    /// Add context string (e.g., "expected `fi`")
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add byte position in input where error occurred
    pub fn with_position(mut self, pos: usize) -> Self {
        self.position = Some(pos);
        self
    }

    /// Mark the error as caused by premature end of input.
    pub fn incomplete(mut self) -> Self {
        self.incomplete = true;
        self
    }

    pub fn is_incomplete(&self) -> bool {
        self.incomplete
    }

    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    /// Format error with a snippet of the input showing where the problem is
    pub fn display_with_input(&self, input: &str) -> String {
        let mut msg = format!("{}: {}", self.kind, self.message);

        match self.position {
            Some(pos) if pos < input.len() => {
                let start = floor_char_boundary(input, pos.saturating_sub(15));
                let end = floor_char_boundary(input, (pos + 15).min(input.len()));
                let snippet = &input[start..end];

                msg.push_str(&format!("\n  near: '{}'", snippet.replace('\n', "↵")));
                msg.push('\n');

                let offset = input[start..pos].chars().count();
                msg.push_str(&format!("  {}{}", " ".repeat(offset + 9), "^"));
            }
            Some(pos) => {
                msg.push_str(&format!("\n  at position {} (end of input)", pos));
            }
            None => {
                if let Some(context) = &self.context {
                    msg.push_str(&format!("\n  hint: {}", context));
                }
            }
        }

        msg
    }

    /// Simplified display without input context
    pub fn display_simple(&self) -> String {
        let mut msg = format!("{}: {}", self.kind, self.message);
        if let Some(context) = &self.context {
            msg.push_str(&format!("\n  hint: {}", context));
        }
        msg
    }
}

fn floor_char_boundary(input: &str, mut index: usize) -> usize {
    while index > 0 && !input.is_char_boundary(index) {
        index -= 1;
    }
    index
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.display_simple())
    }
}

impl std::error::Error for ShellError {}

impl From<io::Error> for ShellError {
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            _ => ErrorKind::Io,
        };
        ShellError::new(kind, err.to_string())
    }
}

impl From<nix::errno::Errno> for ShellError {
    fn from(err: nix::errno::Errno) -> Self {
        io::Error::from(err).into()
    }
}

/// Convenience type alias for Results with ShellError
pub type ShellResult<T> = Result<T, ShellError>;
