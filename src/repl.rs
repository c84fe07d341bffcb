use std::env;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cinder::config::{CONTINUATION_PROMPT, build_prompt};
use cinder::{ExitStatus, Executor, Node, ShellError, parse};
use log::debug;

use crate::io_helpers::{Input, LineSource};

/// Status reported for statements that fail to parse.
const SYNTAX_ERROR_STATUS: i32 = 2;

enum Statement {
    Parsed(Option<Node>),
    Broken(ShellError, String),
    Discarded,
}

pub struct Repl {
    source: LineSource,
    executor: Executor,
    prompt_template: Option<String>,
    // Set by the SIGCHLD handler; reaping happens between statements.
    sigchld_flag: Arc<AtomicBool>,
    interactive: bool,
}

impl Repl {
    pub fn new(
        source: LineSource,
        executor: Executor,
        prompt_template: Option<String>,
        sigchld_flag: Arc<AtomicBool>,
        interactive: bool,
    ) -> Self {
        Self {
            source,
            executor,
            prompt_template,
            sigchld_flag,
            interactive,
        }
    }

    /// Reads and runs statements until end of input or `exit`; returns the exit code.
    pub fn run(&mut self) -> i32 {
        loop {
            if let Some(code) = self.executor.exit_request() {
                self.source.save_history();
                return code;
            }
            self.reap();
            match self.read_statement() {
                Ok(Some(statement)) => self.run_statement(statement),
                Ok(None) => break,
                Err(err) => {
                    eprintln!("cinder: {err}");
                    break;
                }
            }
        }
        if self.interactive {
            println!();
        }
        self.source.save_history();
        self.executor
            .exit_request()
            .unwrap_or_else(|| self.executor.last_status().code())
    }

    fn reap(&mut self) {
        let signalled = self.sigchld_flag.swap(false, Ordering::SeqCst);
        let notices = self.executor.reap_jobs();
        if signalled {
            debug!("repl event=sigchld notices={}", notices.len());
        }
        if self.interactive {
            for notice in notices {
                eprintln!("{notice}");
            }
        }
    }

    fn prompt(&self) -> String {
        if !self.interactive {
            return String::new();
        }
        let cwd = env::current_dir().unwrap_or_else(|_| "/".into());
        build_prompt(
            self.prompt_template.as_deref(),
            self.executor.last_status().code(),
            &cwd,
        )
    }

    /// Accumulates lines until they form a complete statement.
    fn read_statement(&mut self) -> io::Result<Option<Statement>> {
        let mut buffer = String::new();
        let mut prompt = self.prompt();
        loop {
            let line = match self.source.read_input(&prompt)? {
                Input::Line(line) => line,
                Input::Interrupted => return Ok(Some(Statement::Discarded)),
                Input::Eof if buffer.is_empty() => return Ok(None),
                Input::Eof => {
                    let err = ShellError::new(
                        cinder::ErrorKind::Syntax,
                        "syntax error: unexpected end of file",
                    );
                    return Ok(Some(Statement::Broken(err, buffer)));
                }
            };
            if !buffer.is_empty() {
                buffer.push('\n');
            }
            buffer.push_str(&line);
            match parse(&buffer) {
                Ok(node) => return Ok(Some(Statement::Parsed(node))),
                Err(err) if err.is_incomplete() => {
                    if self.interactive {
                        prompt = CONTINUATION_PROMPT.to_string();
                    }
                }
                Err(err) => return Ok(Some(Statement::Broken(err, buffer))),
            }
        }
    }

    fn run_statement(&mut self, statement: Statement) {
        match statement {
            Statement::Parsed(Some(node)) => {
                debug!("repl event=statement node={}", node);
                self.executor.exec(&node, Default::default());
            }
            Statement::Parsed(None) | Statement::Discarded => {}
            Statement::Broken(err, text) => {
                eprintln!("cinder: {}", err.display_with_input(&text));
                self.executor
                    .set_last_status(ExitStatus::Exited(SYNTAX_ERROR_STATUS));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder::{Builtins, Variables};
    use std::rc::Rc;

    fn script_repl(text: &str) -> Repl {
        let executor = Executor::new(Variables::new(), Rc::new(Builtins::with_defaults()));
        Repl::new(
            LineSource::script(text),
            executor,
            None,
            Arc::new(AtomicBool::new(false)),
            false,
        )
    }

    #[test]
    fn multi_line_statement_runs_once_complete() {
        let mut repl = script_repl("X=1\nwhile test $X = 1\ndo\nX=2\ndone\n");
        assert_eq!(repl.run(), 0);
        assert_eq!(repl.executor.variables().get("X").as_deref(), Some("2"));
    }

    #[test]
    fn syntax_error_sets_status_and_continues() {
        let mut repl = script_repl("&& echo x\nY=ok\n");
        repl.run();
        assert_eq!(repl.executor.last_status(), ExitStatus::SUCCESS);
        assert_eq!(repl.executor.variables().get("Y").as_deref(), Some("ok"));
    }

    #[test]
    fn unterminated_statement_at_eof_is_an_error() {
        let mut repl = script_repl("if true\nthen echo\n");
        assert_eq!(repl.run(), SYNTAX_ERROR_STATUS);
    }

    #[test]
    fn exit_stops_reading() {
        let mut repl = script_repl("exit 4\nZ=1\n");
        assert_eq!(repl.run(), 4);
        assert_eq!(repl.executor.variables().get("Z"), None);
    }
}
