//! Tree-walking executor.
//!
//! One `Executor` lives for the whole shell session. Simple commands are
//! either run in-process (builtins, assignments) under oneshot redirection or
//! forked and exec'd. Pipeline stages and background nodes that cannot be
//! exec'd directly run in a forked copy of the executor.
use std::fs::File;
use std::io::Read;
use std::os::fd::{FromRawFd, IntoRawFd, RawFd};
use std::rc::Rc;

use log::debug;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{Pid, close, dup2, pipe2};

use crate::builtins::{Builtins, SpecialBuiltin};
use crate::error::{ErrorKind, ShellError, ShellResult};
use crate::expansion::{self, DEFAULT_IFS, ExpansionContext};
use crate::job_control::{JobStatus, JobTable, WaitOutcome, wait_for_job, with_foreground};
use crate::parse::{
    Command, Connector, ConnectorKind, ForStatement, IfStatement, Node, Redirect, RedirectOp,
    WhileStatement, WordList, parse,
};
use crate::variables::Variables;

pub mod redirection;
pub mod spawning;

use redirection::{RedirectControl, ResolvedRedirect};
use spawning::{ProcessGroup, exec_program, fork_child};

/// Result of running a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Exited(i32),
    Signaled(i32),
    /// Started in the background; carries the pid of the last process
    Pending(i32),
}

impl ExitStatus {
    pub const SUCCESS: ExitStatus = ExitStatus::Exited(0);
    pub const FAILURE: ExitStatus = ExitStatus::Exited(1);

    pub fn from_bool(ok: bool) -> Self {
        if ok { Self::SUCCESS } else { Self::FAILURE }
    }

    /// A pending background job never counts as a failure.
    pub fn success(self) -> bool {
        matches!(self, ExitStatus::Exited(0) | ExitStatus::Pending(_))
    }

    /// Numeric status as seen by `$?`.
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Exited(code) => code,
            ExitStatus::Signaled(sig) => 128 + sig,
            ExitStatus::Pending(_) => 0,
        }
    }

    pub fn signal(self) -> Option<i32> {
        match self {
            ExitStatus::Signaled(sig) => Some(sig),
            _ => None,
        }
    }
}

/// Pending `break`/`continue` levels travelling outward to enclosing loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopSignal {
    #[default]
    None,
    Break(usize),
    Continue(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Flow {
    pub status: ExitStatus,
    pub signal: LoopSignal,
}

impl From<ExitStatus> for Flow {
    fn from(status: ExitStatus) -> Self {
        Flow {
            status,
            signal: LoopSignal::None,
        }
    }
}

enum LoopStep {
    Next,
    Stop(LoopSignal),
}

/// What a loop frame does with the signal its body returned.
fn loop_step(signal: LoopSignal) -> LoopStep {
    match signal {
        LoopSignal::None => LoopStep::Next,
        LoopSignal::Break(n) if n > 1 => LoopStep::Stop(LoopSignal::Break(n - 1)),
        LoopSignal::Break(_) => LoopStep::Stop(LoopSignal::None),
        LoopSignal::Continue(n) if n > 1 => LoopStep::Stop(LoopSignal::Continue(n - 1)),
        LoopSignal::Continue(_) => LoopStep::Next,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOptions {
    pub stdin: Option<RawFd>,
    pub stdout: Option<RawFd>,
    /// Send stderr wherever stdout goes (`|&`)
    pub stderr_to_stdout: bool,
    pub background: bool,
    /// Part of a pipeline that someone else waits for
    pub pipeline_stage: bool,
}

impl ExecOptions {
    fn forks(&self) -> bool {
        self.background || self.pipeline_stage
    }

    fn redirects(&self) -> Vec<ResolvedRedirect> {
        let mut list = Vec::new();
        if let Some(fd) = self.stdin {
            list.push(ResolvedRedirect::copy(RedirectOp::CopyRead, 0, fd));
        }
        if let Some(fd) = self.stdout {
            list.push(ResolvedRedirect::copy(RedirectOp::CopyWrite, 1, fd));
        }
        if self.stderr_to_stdout {
            list.push(ResolvedRedirect::copy(RedirectOp::CopyWrite, 2, 1));
        }
        list
    }
}

pub struct Executor {
    pub(crate) vars: Variables,
    pub(crate) builtins: Rc<Builtins>,
    pub(crate) last_status: ExitStatus,
    pub(crate) loop_depth: usize,
    pub(crate) jobs: JobTable,
    pub(crate) exit_request: Option<i32>,
    /// Shell process group, when the shell owns the terminal
    pub(crate) terminal: Option<Pid>,
    pub(crate) job_control: bool,
    job_pgid: Option<Pid>,
    job_pids: Vec<Pid>,
    /// Pipe ends held by this process that forked children must not keep
    open_pipes: Vec<RawFd>,
    interrupted: bool,
    trace: bool,
    interactive: bool,
}

impl Executor {
    pub fn new(vars: Variables, builtins: Rc<Builtins>) -> Self {
        Self {
            vars,
            builtins,
            last_status: ExitStatus::SUCCESS,
            loop_depth: 0,
            jobs: JobTable::new(),
            exit_request: None,
            terminal: None,
            job_control: true,
            job_pgid: None,
            job_pids: Vec::new(),
            open_pipes: Vec::new(),
            interrupted: false,
            trace: false,
            interactive: false,
        }
    }

    /// Executor for a forked child: no process groups, no terminal.
    pub fn subshell(vars: Variables, builtins: Rc<Builtins>, last_status: ExitStatus) -> Self {
        let mut executor = Self::new(vars, builtins);
        executor.last_status = last_status;
        executor.job_control = false;
        executor
    }

    pub fn with_terminal(mut self, shell_pgid: Option<Pid>) -> Self {
        self.terminal = shell_pgid;
        self
    }

    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    pub fn variables(&self) -> &Variables {
        &self.vars
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.vars
    }

    pub fn last_status(&self) -> ExitStatus {
        self.last_status
    }

    pub fn set_last_status(&mut self, status: ExitStatus) {
        self.last_status = status;
    }

    /// Code passed to `exit`, once it ran.
    pub fn exit_request(&self) -> Option<i32> {
        self.exit_request
    }

    /// Polls background jobs and returns notices for the ones that changed.
    pub fn reap_jobs(&mut self) -> Vec<String> {
        self.jobs.reap()
    }

    pub fn run_text(&mut self, text: &str) -> ShellResult<ExitStatus> {
        match parse(text)? {
            Some(node) => Ok(self.exec(&node, ExecOptions::default())),
            None => Ok(self.last_status),
        }
    }

    pub fn exec(&mut self, node: &Node, opts: ExecOptions) -> ExitStatus {
        self.interrupted = false;
        let flow = self.eval(node, opts);
        self.last_status = flow.status;
        flow.status
    }

    /// Runs `text` in a subshell and returns its output split on IFS.
    pub fn capture(&mut self, text: &str) -> ShellResult<Vec<String>> {
        let output = self.capture_output(text)?;
        let ifs = self.vars.get("IFS").unwrap_or_else(|| DEFAULT_IFS.to_string());
        Ok(expansion::split_fields(&output, &ifs))
    }

    pub(crate) fn eval(&mut self, node: &Node, opts: ExecOptions) -> Flow {
        let opts = ExecOptions {
            background: opts.background || node.is_async(),
            ..opts
        };
        let flow = match node {
            Node::Command(cmd) => self.exec_command(cmd, opts),
            Node::Connector(conn) if conn.kind == ConnectorKind::Pipeline => {
                Flow::from(self.exec_pipeline(conn, opts))
            }
            _ if opts.forks() => {
                let status = self.exec_subshell(
                    opts,
                    || node.to_string(),
                    |this| this.eval_compound(node).status,
                );
                Flow::from(status)
            }
            _ => self.eval_compound(node),
        };
        if node.is_async() && !opts.pipeline_stage {
            self.record_background_job(node);
        }
        self.last_status = flow.status;
        flow
    }

    fn should_stop(&self) -> bool {
        self.interrupted || self.exit_request.is_some()
    }

    fn eval_compound(&mut self, node: &Node) -> Flow {
        match node {
            Node::Command(cmd) => self.exec_command(cmd, ExecOptions::default()),
            Node::Connector(conn) => self.exec_connector(conn),
            Node::If(stmt) => self.with_redirects(&stmt.redirects, |this| this.exec_if(stmt)),
            Node::While(stmt) => {
                self.with_redirects(&stmt.redirects, |this| this.exec_while(stmt))
            }
            Node::For(stmt) => self.with_redirects(&stmt.redirects, |this| this.exec_for(stmt)),
        }
    }

    /// Applies statement-level redirections once around `body`.
    fn with_redirects(&mut self, redirects: &[Redirect], body: impl FnOnce(&mut Self) -> Flow) -> Flow {
        if redirects.is_empty() {
            return body(self);
        }
        let guard = self
            .resolve_redirects(redirects)
            .and_then(|resolved| RedirectControl::oneshot(&resolved));
        match guard {
            Ok(_guard) => body(self),
            Err(err) => Flow::from(self.report(err)),
        }
    }

    fn exec_connector(&mut self, conn: &Connector) -> Flow {
        let left = self.eval(&conn.left, ExecOptions::default());
        if left.signal != LoopSignal::None || self.should_stop() {
            return left;
        }
        let run_right = match conn.kind {
            ConnectorKind::And => left.status.success(),
            ConnectorKind::Or => !left.status.success(),
            ConnectorKind::Semicolon | ConnectorKind::Pipeline => true,
        };
        if !run_right {
            return left;
        }
        self.eval(&conn.right, ExecOptions::default())
    }

    fn exec_if(&mut self, stmt: &IfStatement) -> Flow {
        let cond = self.eval(&stmt.condition, ExecOptions::default());
        if cond.signal != LoopSignal::None || self.should_stop() {
            return cond;
        }
        if cond.status.success() != stmt.reverse {
            self.eval(&stmt.then_branch, ExecOptions::default())
        } else if let Some(ref branch) = stmt.else_branch {
            self.eval(branch, ExecOptions::default())
        } else {
            Flow::from(ExitStatus::SUCCESS)
        }
    }

    fn exec_while(&mut self, stmt: &WhileStatement) -> Flow {
        self.loop_depth += 1;
        let mut status = ExitStatus::SUCCESS;
        let mut signal = LoopSignal::None;
        while !self.should_stop() {
            let cond = self.eval(&stmt.condition, ExecOptions::default());
            if let LoopStep::Stop(outer) = loop_step(cond.signal) {
                signal = outer;
                break;
            }
            if cond.signal != LoopSignal::None {
                continue;
            }
            if cond.status.success() == stmt.reverse || self.should_stop() {
                break;
            }
            let body = self.eval(&stmt.body, ExecOptions::default());
            status = body.status;
            if let LoopStep::Stop(outer) = loop_step(body.signal) {
                signal = outer;
                break;
            }
        }
        self.loop_depth -= 1;
        Flow { status, signal }
    }

    fn exec_for(&mut self, stmt: &ForStatement) -> Flow {
        let items = match self.expand_words(&stmt.items) {
            Ok(items) => items,
            Err(err) => return Flow::from(self.report(err)),
        };
        self.loop_depth += 1;
        let mut status = ExitStatus::SUCCESS;
        let mut signal = LoopSignal::None;
        for item in items {
            if self.should_stop() {
                break;
            }
            self.vars.set(&stmt.variable, &item);
            let body = self.eval(&stmt.body, ExecOptions::default());
            status = body.status;
            if let LoopStep::Stop(outer) = loop_step(body.signal) {
                signal = outer;
                break;
            }
        }
        self.loop_depth -= 1;
        Flow { status, signal }
    }

    fn exec_pipeline(&mut self, conn: &Connector, opts: ExecOptions) -> ExitStatus {
        let (read_end, write_end) = match pipe2(OFlag::O_CLOEXEC) {
            Ok((read_end, write_end)) => (read_end.into_raw_fd(), write_end.into_raw_fd()),
            Err(err) => {
                return self.report(ShellError::new(
                    ErrorKind::Io,
                    format!("pipe: {}", err.desc()),
                ));
            }
        };
        debug!("job event=pipe read={} write={}", read_end, write_end);
        self.open_pipes.extend([read_end, write_end]);

        let left = ExecOptions {
            stdin: opts.stdin,
            stdout: Some(write_end),
            stderr_to_stdout: conn.pipe_stderr,
            background: true,
            pipeline_stage: true,
        };
        // `$?` in every stage names the status from before the pipeline.
        let previous = self.last_status;
        self.eval(&conn.left, left);
        self.last_status = previous;
        let right = ExecOptions {
            stdin: Some(read_end),
            stdout: opts.stdout,
            stderr_to_stdout: opts.stderr_to_stdout,
            background: true,
            pipeline_stage: true,
        };
        let status = self.eval(&conn.right, right);

        self.open_pipes.retain(|fd| *fd != read_end && *fd != write_end);
        let _ = close(read_end);
        let _ = close(write_end);

        if opts.forks() {
            return status.status;
        }
        self.wait_foreground(|| Node::Connector(conn.clone()).to_string())
    }

    fn exec_command(&mut self, cmd: &Command, opts: ExecOptions) -> Flow {
        match self.try_exec_command(cmd, opts) {
            Ok(flow) => flow,
            Err(err) => Flow::from(self.report(err)),
        }
    }

    fn try_exec_command(&mut self, cmd: &Command, opts: ExecOptions) -> ShellResult<Flow> {
        let argv = self.expand_words(&cmd.words)?;
        let mut assignments = Vec::with_capacity(cmd.assignments.len());
        for assignment in &cmd.assignments {
            let value = expansion::expand_joined(&assignment.value, &self.expansion_context())?;
            assignments.push((assignment.name.clone(), value));
        }
        let redirects = self.resolve_redirects(&cmd.redirects)?;

        let Some(name) = argv.first() else {
            if opts.forks() {
                let status = self.exec_subshell(
                    opts,
                    || Node::Command(cmd.clone()).to_string(),
                    |this| this.assign(&assignments, &redirects),
                );
                return Ok(Flow::from(status));
            }
            return Ok(Flow::from(self.assign(&assignments, &redirects)));
        };

        if SpecialBuiltin::lookup(name).is_some() || self.builtins.contains(name) {
            if opts.forks() {
                let status = self.exec_subshell(
                    opts,
                    || argv.join(" "),
                    |this| this.run_builtin(&argv, &assignments, &redirects).status,
                );
                return Ok(Flow::from(status));
            }
            return Ok(self.run_builtin(&argv, &assignments, &redirects));
        }

        self.spawn_external(&argv, &assignments, redirects, opts)
            .map(Flow::from)
    }

    /// A command made only of assignments keeps them for the session.
    fn assign(&mut self, assignments: &[(String, String)], redirects: &[ResolvedRedirect]) -> ExitStatus {
        let _guard = match RedirectControl::oneshot(redirects) {
            Ok(guard) => guard,
            Err(err) => return self.report(err),
        };
        for (name, value) in assignments {
            debug!("vars event=assign name={}", name);
            self.vars.set(name, value);
        }
        ExitStatus::SUCCESS
    }

    fn run_builtin(
        &mut self,
        argv: &[String],
        assignments: &[(String, String)],
        redirects: &[ResolvedRedirect],
    ) -> Flow {
        let _guard = match RedirectControl::oneshot(redirects) {
            Ok(guard) => guard,
            Err(err) => return Flow::from(self.report(err)),
        };
        let saved = self.vars.push_overrides(assignments);
        let flow = self.call_builtin(argv);
        self.vars.pop_overrides(saved);
        flow
    }

    pub(crate) fn call_builtin(&mut self, argv: &[String]) -> Flow {
        let Some((name, args)) = argv.split_first() else {
            return Flow::from(ExitStatus::SUCCESS);
        };
        debug!("builtin event=call name={}", name);
        if let Some(special) = SpecialBuiltin::lookup(name) {
            return special.run(self, args);
        }
        let builtins = Rc::clone(&self.builtins);
        match builtins.get(name) {
            Some(builtin) => Flow::from(builtin(args)),
            None => {
                eprintln!("cinder: {name}: not a shell builtin");
                Flow::from(ExitStatus::FAILURE)
            }
        }
    }

    fn spawn_external(
        &mut self,
        argv: &[String],
        assignments: &[(String, String)],
        redirects: Vec<ResolvedRedirect>,
        opts: ExecOptions,
    ) -> ShellResult<ExitStatus> {
        if self.trace {
            eprintln!("+ {}", argv.join(" "));
        }
        let env = self.vars.child_environment(assignments);
        let path = assignments
            .iter()
            .rev()
            .find(|(name, _)| name == "PATH")
            .map(|(_, value)| value.clone())
            .or_else(|| self.vars.get("PATH"));
        let overrides = opts.redirects();
        let pipes = self.open_pipes.clone();
        let group = self.child_group();
        let pid = fork_child(group, || {
            if let Err(err) = RedirectControl::permanent(&overrides) {
                eprintln!("cinder: {}", err.message);
                return 1;
            }
            close_all(&pipes);
            if let Err(err) = RedirectControl::permanent(&redirects) {
                eprintln!("cinder: {}", err.message);
                return 1;
            }
            exec_program(argv, &env, path.as_deref())
        })?;
        self.track_child(pid);
        Ok(self.finish_child(opts, || argv.join(" ")))
    }

    /// Forks a copy of the shell that runs `body` and exits with its code.
    fn exec_subshell(
        &mut self,
        opts: ExecOptions,
        describe: impl FnOnce() -> String,
        body: impl FnOnce(&mut Self) -> ExitStatus,
    ) -> ExitStatus {
        let overrides = opts.redirects();
        let group = self.child_group();
        let forked = fork_child(group, || {
            let pipes = std::mem::take(&mut self.open_pipes);
            self.enter_subshell();
            if let Err(err) = RedirectControl::permanent(&overrides) {
                eprintln!("cinder: {}", err.message);
                return 1;
            }
            close_all(&pipes);
            let status = body(self);
            self.exit_request.unwrap_or(status.code())
        });
        match forked {
            Ok(pid) => {
                self.track_child(pid);
                self.finish_child(opts, describe)
            }
            Err(err) => self.report(err),
        }
    }

    fn enter_subshell(&mut self) {
        self.job_control = false;
        self.terminal = None;
        self.interactive = false;
        self.jobs = JobTable::new();
        self.job_pgid = None;
        self.job_pids.clear();
    }

    fn child_group(&self) -> ProcessGroup {
        if !self.job_control {
            return ProcessGroup::Inherit;
        }
        match self.job_pgid {
            Some(pgid) => ProcessGroup::Join(pgid),
            None => ProcessGroup::Lead,
        }
    }

    fn track_child(&mut self, pid: Pid) {
        if self.job_pgid.is_none() {
            self.job_pgid = Some(pid);
        }
        self.job_pids.push(pid);
    }

    fn finish_child(&mut self, opts: ExecOptions, describe: impl FnOnce() -> String) -> ExitStatus {
        if opts.forks() {
            let last = self.job_pids.last().map(|pid| pid.as_raw()).unwrap_or(0);
            return ExitStatus::Pending(last);
        }
        self.wait_foreground(describe)
    }

    /// Blocks until the current job finishes or stops.
    fn wait_foreground(&mut self, describe: impl FnOnce() -> String) -> ExitStatus {
        let pids = std::mem::take(&mut self.job_pids);
        let Some(pgid) = self.job_pgid.take() else {
            return ExitStatus::SUCCESS;
        };
        let untraced = self.job_control && self.terminal.is_some();
        let result = if self.job_control {
            with_foreground(pgid, self.terminal, || wait_for_job(&pids, untraced))
                .and_then(|result| result)
        } else {
            wait_for_job(&pids, false)
        };
        match result {
            Ok(result) if result.outcome == WaitOutcome::Stopped => {
                let command = describe();
                let id = self.jobs.add(pgid, pids, &command, JobStatus::Stopped);
                eprintln!("[{id}] Stopped {command}");
                result.status
            }
            Ok(result) => {
                if result.status.signal() == Some(libc::SIGINT) {
                    self.interrupted = true;
                }
                result.status
            }
            Err(err) => {
                eprintln!("cinder: wait: {err}");
                ExitStatus::FAILURE
            }
        }
    }

    fn record_background_job(&mut self, node: &Node) {
        let pids = std::mem::take(&mut self.job_pids);
        let Some(pgid) = self.job_pgid.take() else {
            return;
        };
        if !self.job_control {
            return;
        }
        let id = self.jobs.add(pgid, pids, &node.to_string(), JobStatus::Running);
        if self.interactive {
            eprintln!("[{id}] {pgid}");
        }
    }

    pub(crate) fn report(&mut self, err: ShellError) -> ExitStatus {
        if err.kind == ErrorKind::ChildSignaled {
            self.interrupted = true;
        }
        eprintln!("cinder: {}", err.message);
        ExitStatus::Exited(err.exit_code())
    }

    fn expansion_context(&self) -> ExpansionContext<'_> {
        ExpansionContext {
            lookup_var: Box::new(move |name| self.vars.get(name)),
            command_subst: Box::new(move |text| self.capture_output(text)),
            last_status: self.last_status.code(),
        }
    }

    fn expand_words(&self, words: &WordList) -> ShellResult<Vec<String>> {
        expansion::expand_words(words, &self.expansion_context())
    }

    fn resolve_redirects(&self, redirects: &[Redirect]) -> ShellResult<Vec<ResolvedRedirect>> {
        let mut resolved = Vec::with_capacity(redirects.len());
        for redirect in redirects {
            let path = match redirect.target {
                Some(ref target) if redirect.op.needs_target() => {
                    let mut fields = self.expand_words(target)?;
                    if fields.len() != 1 {
                        return Err(ShellError::new(
                            ErrorKind::Io,
                            format!("{target}: ambiguous redirect"),
                        ));
                    }
                    fields.pop()
                }
                _ => None,
            };
            resolved.push(ResolvedRedirect {
                op: redirect.op,
                dest: redirect.dest,
                src: redirect.src,
                path,
            });
        }
        Ok(resolved)
    }

    /// Runs `text` in a forked subshell and returns its standard output
    /// without the final newline.
    fn capture_output(&self, text: &str) -> ShellResult<String> {
        let Some(node) = parse(text)? else {
            return Ok(String::new());
        };
        let (read_end, write_end) = pipe2(OFlag::O_CLOEXEC)?;
        let (read_end, write_end) = (read_end.into_raw_fd(), write_end.into_raw_fd());
        let pid = fork_child(ProcessGroup::Inherit, || {
            if dup2(write_end, 1).is_err() {
                return 1;
            }
            let _ = close(read_end);
            let _ = close(write_end);
            close_all(&self.open_pipes);
            let mut sub = Executor::subshell(
                self.vars.clone(),
                Rc::clone(&self.builtins),
                self.last_status,
            );
            let status = sub.exec(&node, ExecOptions::default());
            sub.exit_request.unwrap_or(status.code())
        });
        let _ = close(write_end);
        let pid = match pid {
            Ok(pid) => pid,
            Err(err) => {
                let _ = close(read_end);
                return Err(err);
            }
        };
        debug!("job event=capture pid={}", pid);

        let mut output = Vec::new();
        let mut reader = unsafe { File::from_raw_fd(read_end) };
        let read_result = reader.read_to_end(&mut output);
        drop(reader);

        let status = loop {
            match waitpid(pid, None) {
                Ok(WaitStatus::Exited(_, code)) => break ExitStatus::Exited(code),
                Ok(WaitStatus::Signaled(_, sig, _)) => break ExitStatus::Signaled(sig as i32),
                Ok(_) | Err(Errno::EINTR) => continue,
                Err(err) => return Err(err.into()),
            }
        };
        debug!("job event=capture done status={}", status.code());
        read_result?;
        if status.signal().is_some() {
            return Err(ShellError::new(
                ErrorKind::ChildSignaled,
                "command substitution interrupted",
            ));
        }
        let mut output = String::from_utf8_lossy(&output).into_owned();
        if output.ends_with('\n') {
            output.pop();
        }
        Ok(output)
    }
}

fn close_all(fds: &[RawFd]) {
    for &fd in fds {
        let _ = close(fd);
    }
}
