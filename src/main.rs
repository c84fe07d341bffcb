use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use cinder::config::{Config, LOG_ENV};
use cinder::signals::{init_session, install_signal_handlers};
use cinder::{Builtins, Executor, Variables};
use log::debug;
use nix::unistd::Pid;
use signal_hook::consts::signal::SIGCHLD;
use signal_hook::flag;

mod io_helpers;
mod repl;

use io_helpers::LineSource;
use repl::Repl;

const USAGE: &str = "usage: cinder [-x] [-i] [-c COMMAND | SCRIPT]";

enum Mode {
    Command(String),
    Script(String),
    Stdin,
}

struct Options {
    mode: Mode,
    trace: bool,
    force_interactive: bool,
}

fn main() {
    let config = Config::from_env();
    init_logging(&config);
    let options = match parse_args(env::args().skip(1)) {
        Ok(options) => options,
        Err(msg) => {
            eprintln!("cinder: {msg}");
            eprintln!("{USAGE}");
            process::exit(2);
        }
    };
    process::exit(run(options, config));
}

fn init_logging(config: &Config) {
    let env = env_logger::Env::default().filter_or(LOG_ENV, config.log_filter.as_str());
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut options = Options {
        mode: Mode::Stdin,
        trace: false,
        force_interactive: false,
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-x" => options.trace = true,
            "-i" => options.force_interactive = true,
            "-c" => {
                let text = args.next().ok_or("-c: option requires an argument")?;
                options.mode = Mode::Command(text);
                break;
            }
            "--" => {
                if let Some(path) = args.next() {
                    options.mode = Mode::Script(path);
                }
                break;
            }
            _ if arg.starts_with('-') && arg.len() > 1 => {
                return Err(format!("{arg}: invalid option"));
            }
            _ => {
                options.mode = Mode::Script(arg);
                break;
            }
        }
    }
    Ok(options)
}

fn run(options: Options, config: Config) -> i32 {
    let stdin_tty = unsafe { libc::isatty(libc::STDIN_FILENO) == 1 };
    let interactive =
        options.force_interactive || (matches!(options.mode, Mode::Stdin) && stdin_tty);
    if let Err(err) = install_signal_handlers(interactive) {
        eprintln!("cinder: {err}");
        return 1;
    }
    let terminal = match init_session(interactive) {
        Ok(pgid) => pgid.map(Pid::from_raw),
        Err(err) => {
            eprintln!("cinder: {err}");
            return 1;
        }
    };
    debug!(
        "shell event=start interactive={} terminal={:?}",
        interactive, terminal
    );

    let mut executor = Executor::new(Variables::new(), Rc::new(Builtins::with_defaults()))
        .with_terminal(terminal);
    executor.set_trace(options.trace);
    executor.set_interactive(interactive);

    let source = match options.mode {
        Mode::Command(text) => return run_command(executor, &text),
        Mode::Script(path) => match fs::read_to_string(&path) {
            Ok(text) => LineSource::script(&text),
            Err(err) => {
                eprintln!("cinder: {path}: {err}");
                return 127;
            }
        },
        Mode::Stdin if interactive && stdin_tty => {
            match LineSource::interactive(config.edit_mode) {
                Ok(source) => source,
                Err(err) => {
                    eprintln!("cinder: {err}");
                    return 1;
                }
            }
        }
        Mode::Stdin => {
            // Read the whole script first so commands never compete for buffered input.
            let mut text = String::new();
            if let Err(err) = io::stdin().read_to_string(&mut text) {
                eprintln!("cinder: {err}");
                return 1;
            }
            LineSource::script(&text)
        }
    };

    let sigchld_flag = Arc::new(AtomicBool::new(false));
    if let Err(err) = flag::register(SIGCHLD, Arc::clone(&sigchld_flag)) {
        eprintln!("cinder: {err}");
        return 1;
    }
    let mut repl = Repl::new(
        source,
        executor,
        config.prompt_template,
        sigchld_flag,
        interactive,
    );
    repl.run() & 0xff
}

fn run_command(mut executor: Executor, text: &str) -> i32 {
    match executor.run_text(text) {
        Ok(status) => executor.exit_request().unwrap_or(status.code()) & 0xff,
        Err(err) => {
            eprintln!("cinder: {}", err.display_with_input(text));
            err.exit_code()
        }
    }
}
