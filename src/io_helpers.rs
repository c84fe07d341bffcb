use std::env;
use std::io;
use std::path::PathBuf;

use cinder::config::EditMode;
use log::debug;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};

pub enum Input {
    Line(String),
    /// Ctrl-C at the prompt
    Interrupted,
    Eof,
}

/// Where program text comes from: the line editor or a script already in memory.
pub enum LineSource {
    Editor(Box<Editor<(), DefaultHistory>>),
    Script(std::vec::IntoIter<String>),
}

impl LineSource {
    pub fn interactive(edit_mode: EditMode) -> io::Result<Self> {
        let edit_mode = match edit_mode {
            EditMode::Vi => rustyline::EditMode::Vi,
            EditMode::Emacs => rustyline::EditMode::Emacs,
        };
        let config = Config::builder()
            .auto_add_history(true)
            .edit_mode(edit_mode)
            .build();
        let mut editor = Editor::with_config(config).map_err(io::Error::other)?;
        if let Some(path) = history_path() {
            let _ = editor.load_history(&path);
        }
        Ok(LineSource::Editor(Box::new(editor)))
    }

    pub fn script(text: &str) -> Self {
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        debug!("repl event=script lines={}", lines.len());
        LineSource::Script(lines.into_iter())
    }

    pub fn read_input(&mut self, prompt: &str) -> io::Result<Input> {
        match self {
            LineSource::Editor(editor) => match editor.readline(prompt) {
                Ok(line) => Ok(Input::Line(line)),
                Err(ReadlineError::Interrupted) => Ok(Input::Interrupted),
                Err(ReadlineError::Eof) => Ok(Input::Eof),
                Err(err) => Err(io::Error::other(err)),
            },
            LineSource::Script(lines) => Ok(lines.next().map_or(Input::Eof, Input::Line)),
        }
    }

    pub fn save_history(&mut self) {
        if let (LineSource::Editor(editor), Some(path)) = (self, history_path()) {
            if let Err(err) = editor.save_history(&path) {
                debug!("repl event=history-save error={}", err);
            }
        }
    }
}

fn history_path() -> Option<PathBuf> {
    env::var_os("HOME").map(|home| PathBuf::from(home).join(".cinder_history"))
}
