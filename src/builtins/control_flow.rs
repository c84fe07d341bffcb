use crate::execution::{ExitStatus, Executor, Flow, LoopSignal};

use super::builtin_error;

pub(crate) fn run_break(exec: &mut Executor, args: &[String]) -> Flow {
    loop_control(exec, "break", args, LoopSignal::Break)
}

pub(crate) fn run_continue(exec: &mut Executor, args: &[String]) -> Flow {
    loop_control(exec, "continue", args, LoopSignal::Continue)
}

fn loop_control(
    exec: &mut Executor,
    name: &str,
    args: &[String],
    signal: fn(usize) -> LoopSignal,
) -> Flow {
    let levels = match parse_levels(args) {
        Ok(levels) => levels,
        Err(message) => return Flow::from(builtin_error(name, message)),
    };
    if exec.loop_depth == 0 {
        return Flow::from(builtin_error(name, "only meaningful in a loop"));
    }
    Flow {
        status: ExitStatus::SUCCESS,
        signal: signal(levels.min(exec.loop_depth)),
    }
}

fn parse_levels(args: &[String]) -> Result<usize, String> {
    match args {
        [] => Ok(1),
        [arg] => match arg.parse::<i64>() {
            Ok(n) if n > 0 => Ok(n as usize),
            Ok(_) => Err(format!("{arg}: loop count out of range")),
            Err(_) => Err(format!("{arg}: numeric argument required")),
        },
        _ => Err("too many arguments".to_string()),
    }
}

pub(crate) fn run_exit(exec: &mut Executor, args: &[String]) -> Flow {
    let code = match args.first() {
        None => exec.last_status.code(),
        Some(arg) => match arg.parse::<i32>() {
            Ok(code) => code & 0xff,
            Err(_) => {
                builtin_error("exit", format!("{arg}: numeric argument required"));
                2
            }
        },
    };
    exec.exit_request = Some(code);
    Flow::from(ExitStatus::Exited(code))
}

/// `builtin NAME args...`
pub(crate) fn run_builtin(exec: &mut Executor, args: &[String]) -> Flow {
    match args.first() {
        None => Flow::from(ExitStatus::SUCCESS),
        Some(name) if name == "builtin" => exec.call_builtin(&args[1..]),
        Some(_) => exec.call_builtin(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::Builtins;
    use crate::variables::Variables;
    use std::rc::Rc;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn executor(depth: usize) -> Executor {
        let mut exec = Executor::new(Variables::new(), Rc::new(Builtins::with_defaults()));
        exec.loop_depth = depth;
        exec
    }

    #[test]
    fn levels_are_clamped_to_depth() {
        let mut exec = executor(2);
        assert_eq!(run_break(&mut exec, &args(&["5"])).signal, LoopSignal::Break(2));
        assert_eq!(run_continue(&mut exec, &[]).signal, LoopSignal::Continue(1));
    }

    #[test]
    fn bad_levels_have_no_loop_effect() {
        let mut exec = executor(1);
        for bad in ["0", "-1", "x"] {
            let flow = run_break(&mut exec, &args(&[bad]));
            assert_eq!(flow.status, ExitStatus::FAILURE);
            assert_eq!(flow.signal, LoopSignal::None);
        }
    }

    #[test]
    fn outside_a_loop_is_an_error() {
        let mut exec = executor(0);
        let flow = run_continue(&mut exec, &[]);
        assert_eq!(flow.status, ExitStatus::FAILURE);
        assert_eq!(flow.signal, LoopSignal::None);
    }

    #[test]
    fn exit_defaults_to_last_status() {
        let mut exec = executor(0);
        exec.last_status = ExitStatus::Exited(3);
        assert_eq!(run_exit(&mut exec, &[]).status, ExitStatus::Exited(3));
        assert_eq!(exec.exit_request, Some(3));
        run_exit(&mut exec, &args(&["256"]));
        assert_eq!(exec.exit_request, Some(0));
    }
}
