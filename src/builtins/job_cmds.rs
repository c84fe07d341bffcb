use std::io;

use crate::execution::{ExitStatus, Executor};
use crate::job_control::{
    JobStatus, WaitOutcome, continue_job, parse_job_id, wait_for_job, with_foreground,
};

use super::builtin_error;

pub(crate) fn run_jobs(exec: &mut Executor) -> ExitStatus {
    match exec.jobs.write_list(&mut io::stdout().lock()) {
        Ok(()) => ExitStatus::SUCCESS,
        Err(err) => builtin_error("jobs", err),
    }
}

pub(crate) fn run_fg(exec: &mut Executor, args: &[String]) -> ExitStatus {
    if !exec.job_control {
        return builtin_error("fg", "no job control");
    }
    let job_id = match parse_job_id(args.first()) {
        Ok(id) => id,
        Err(err) => return builtin_error("fg", err),
    };
    let Some(mut job) = exec.jobs.take(job_id) else {
        return builtin_error("fg", "no such job");
    };
    eprintln!("{}", job.command);
    let untraced = exec.terminal.is_some();
    let result = with_foreground(job.pgid, exec.terminal, || {
        continue_job(job.pgid)?;
        wait_for_job(&job.pids, untraced)
    })
    .and_then(|result| result);
    match result {
        Ok(result) if result.outcome == WaitOutcome::Stopped => {
            eprintln!("[{}] Stopped {}", job.id, job.command);
            job.status = JobStatus::Stopped;
            exec.jobs.push(job);
            result.status
        }
        Ok(result) => result.status,
        Err(err) => builtin_error("fg", err),
    }
}

pub(crate) fn run_bg(exec: &mut Executor, args: &[String]) -> ExitStatus {
    let job_id = match parse_job_id(args.first()) {
        Ok(id) => id,
        Err(err) => return builtin_error("bg", err),
    };
    let Some(job) = exec.jobs.find(job_id) else {
        return builtin_error("bg", "no such job");
    };
    if let Err(err) = continue_job(job.pgid) {
        return builtin_error("bg", err);
    }
    job.status = JobStatus::Running;
    eprintln!("[{}] {} &", job.id, job.command);
    ExitStatus::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::Builtins;
    use crate::variables::Variables;
    use std::rc::Rc;

    #[test]
    fn missing_jobs_are_errors() {
        let mut exec = Executor::new(Variables::new(), Rc::new(Builtins::with_defaults()));
        assert_eq!(run_fg(&mut exec, &["%3".to_string()]), ExitStatus::FAILURE);
        assert_eq!(run_bg(&mut exec, &[]), ExitStatus::FAILURE);
        assert_eq!(run_jobs(&mut exec), ExitStatus::SUCCESS);
    }
}
