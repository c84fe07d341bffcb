//! Builtin commands.
//!
//! Plain builtins are closures registered by name in `Builtins`; they only
//! see their arguments. Builtins that need the executor (loop control,
//! variables, jobs) are `SpecialBuiltin`s and get `&mut Executor`.
use std::collections::HashMap;
use std::env;
use std::fmt;

use log::debug;

use crate::execution::{ExitStatus, Executor, Flow};
use crate::parse::is_valid_name;

mod control_flow;
mod job_cmds;
mod read;
mod text;

pub type Builtin = Box<dyn Fn(&[String]) -> ExitStatus>;

#[derive(Default)]
pub struct Builtins {
    table: HashMap<String, Builtin>,
}

impl Builtins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `cd`, `echo` and `puts`.
    pub fn with_defaults() -> Self {
        let mut builtins = Self::new();
        builtins.register("cd", Box::new(cd));
        builtins.register("echo", Box::new(text::echo));
        builtins.register("puts", Box::new(text::puts));
        builtins
    }

    pub fn register(&mut self, name: &str, builtin: Builtin) {
        debug!("builtin event=register name={}", name);
        self.table.insert(name.to_string(), builtin);
    }

    pub fn get(&self, name: &str) -> Option<&Builtin> {
        self.table.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }
}

impl fmt::Debug for Builtins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.table.keys().collect();
        names.sort();
        f.debug_struct("Builtins").field("names", &names).finish()
    }
}

/// Builtins that run against the executor itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialBuiltin {
    Break,
    Continue,
    Read,
    Export,
    Unset,
    Exit,
    Builtin,
    Jobs,
    Fg,
    Bg,
}

impl SpecialBuiltin {
    pub fn lookup(name: &str) -> Option<Self> {
        let special = match name {
            "break" => Self::Break,
            "continue" | "next" => Self::Continue,
            "read" => Self::Read,
            "export" => Self::Export,
            "unset" => Self::Unset,
            "exit" => Self::Exit,
            "builtin" => Self::Builtin,
            "jobs" => Self::Jobs,
            "fg" => Self::Fg,
            "bg" => Self::Bg,
            _ => return None,
        };
        Some(special)
    }

    pub(crate) fn run(self, exec: &mut Executor, args: &[String]) -> Flow {
        match self {
            Self::Break => control_flow::run_break(exec, args),
            Self::Continue => control_flow::run_continue(exec, args),
            Self::Exit => control_flow::run_exit(exec, args),
            Self::Builtin => control_flow::run_builtin(exec, args),
            Self::Read => Flow::from(read::run_read(exec.variables_mut(), args)),
            Self::Export => Flow::from(export(exec, args)),
            Self::Unset => Flow::from(unset(exec, args)),
            Self::Jobs => Flow::from(job_cmds::run_jobs(exec)),
            Self::Fg => Flow::from(job_cmds::run_fg(exec, args)),
            Self::Bg => Flow::from(job_cmds::run_bg(exec, args)),
        }
    }
}

pub(crate) fn builtin_error(name: &str, message: impl fmt::Display) -> ExitStatus {
    eprintln!("cinder: {name}: {message}");
    ExitStatus::FAILURE
}

fn cd(args: &[String]) -> ExitStatus {
    if args.len() > 1 {
        return builtin_error("cd", "too many arguments");
    }
    let dest = match args.first().map(String::as_str) {
        None => match env::var("HOME") {
            Ok(home) => home,
            Err(_) => return builtin_error("cd", "HOME not set"),
        },
        Some("-") => match env::var("OLDPWD") {
            Ok(old) => old,
            Err(_) => return builtin_error("cd", "OLDPWD not set"),
        },
        Some(path) => path.to_string(),
    };
    let previous = env::current_dir().ok();
    if let Err(err) = env::set_current_dir(&dest) {
        return builtin_error("cd", format!("{dest}: {err}"));
    }
    if let Some(previous) = previous {
        env::set_var("OLDPWD", previous);
    }
    if let Ok(current) = env::current_dir() {
        env::set_var("PWD", current);
    }
    ExitStatus::SUCCESS
}

fn export(exec: &mut Executor, args: &[String]) -> ExitStatus {
    let mut status = ExitStatus::SUCCESS;
    for arg in args {
        let (name, value) = match arg.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (arg.as_str(), None),
        };
        if !is_valid_name(name) {
            status = builtin_error("export", format!("`{arg}': not a valid identifier"));
            continue;
        }
        exec.variables_mut().export(name, value);
    }
    status
}

fn unset(exec: &mut Executor, args: &[String]) -> ExitStatus {
    let mut status = ExitStatus::SUCCESS;
    for name in args {
        if !is_valid_name(name) {
            status = builtin_error("unset", format!("`{name}': not a valid identifier"));
            continue;
        }
        exec.variables_mut().unset(name);
    }
    status
}
