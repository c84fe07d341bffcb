//! Syntax tree for shell programs.
//!
//! Words are kept as typed segments so that quoting survives until expansion:
//! a command line such as `echo a"$B"c` is one field made of three words, and
//! `Separator` words mark where one field ends and the next begins.
use std::fmt;
use std::os::fd::RawFd;

use crate::error::ShellResult;

mod command_parser;
mod redirection_parser;
mod tokenizer;

pub use command_parser::Parser;
pub(crate) use command_parser::is_valid_name;
pub use tokenizer::{Keyword, Lexer, Token, TokenKind, tokenize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordKind {
    /// Unquoted text; `$NAME` is expanded
    Normal,
    /// Single quotes or `%q`; taken verbatim
    Quoted,
    /// Double quotes or `%Q`; `$NAME` is expanded
    DoubleQuoted,
    /// Field boundary
    Separator,
    /// Backticks or `$(...)`; replaced by the command's output
    Substituted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub kind: WordKind,
    pub text: String,
}

impl Word {
    pub fn new(kind: WordKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn normal(text: impl Into<String>) -> Self {
        Self::new(WordKind::Normal, text)
    }

    pub fn separator() -> Self {
        Self::new(WordKind::Separator, " ")
    }

    pub fn is_separator(&self) -> bool {
        self.kind == WordKind::Separator
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordList {
    pub words: Vec<Word>,
}

impl WordList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_words(words: Vec<Word>) -> Self {
        Self { words }
    }

    pub fn push(&mut self, word: Word) {
        self.words.push(word);
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(Word::is_separator)
    }

    /// Groups of adjacent words, one per field. Empty groups are dropped.
    pub fn fields(&self) -> Vec<&[Word]> {
        self.words
            .split(Word::is_separator)
            .filter(|group| !group.is_empty())
            .collect()
    }

    /// Text of a single unquoted field, used where a name is expected.
    pub fn as_name(&self) -> Option<&str> {
        match self.fields().as_slice() {
            [[word]] if word.kind == WordKind::Normal => Some(word.text.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectOp {
    /// `<`
    Read,
    /// `>`
    Write,
    /// `>>`
    Append,
    /// `<>`
    ReadWrite,
    /// `<&N`
    CopyRead,
    /// `>&N`
    CopyWrite,
    /// `<&-` and `>&-`
    Close,
}

impl RedirectOp {
    pub fn needs_target(self) -> bool {
        matches!(
            self,
            RedirectOp::Read | RedirectOp::Write | RedirectOp::Append | RedirectOp::ReadWrite
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub op: RedirectOp,
    pub dest: RawFd,
    pub src: Option<RawFd>,
    pub target: Option<WordList>,
}

impl Redirect {
    pub fn file(op: RedirectOp, dest: RawFd, target: WordList) -> Self {
        Self {
            op,
            dest,
            src: None,
            target: Some(target),
        }
    }

    pub fn copy(op: RedirectOp, dest: RawFd, src: RawFd) -> Self {
        Self {
            op,
            dest,
            src: Some(src),
            target: None,
        }
    }

    pub fn close(dest: RawFd) -> Self {
        Self {
            op: RedirectOp::Close,
            dest,
            src: None,
            target: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: WordList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    pub assignments: Vec<Assignment>,
    pub words: WordList,
    pub redirects: Vec<Redirect>,
    pub is_async: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorKind {
    And,
    Or,
    Semicolon,
    Pipeline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connector {
    pub kind: ConnectorKind,
    pub left: Box<Node>,
    pub right: Box<Node>,
    /// `|&`: the left side's stderr joins the pipe as well
    pub pipe_stderr: bool,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfStatement {
    pub condition: Box<Node>,
    /// `unless`
    pub reverse: bool,
    pub then_branch: Box<Node>,
    pub else_branch: Option<Box<Node>>,
    pub redirects: Vec<Redirect>,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhileStatement {
    pub condition: Box<Node>,
    /// `until`
    pub reverse: bool,
    pub body: Box<Node>,
    pub redirects: Vec<Redirect>,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForStatement {
    pub variable: String,
    pub items: WordList,
    pub body: Box<Node>,
    pub redirects: Vec<Redirect>,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Command(Command),
    Connector(Connector),
    If(IfStatement),
    While(WhileStatement),
    For(ForStatement),
}

impl Node {
    pub fn is_async(&self) -> bool {
        match self {
            Node::Command(cmd) => cmd.is_async,
            Node::Connector(conn) => conn.is_async,
            Node::If(stmt) => stmt.is_async,
            Node::While(stmt) => stmt.is_async,
            Node::For(stmt) => stmt.is_async,
        }
    }

    pub fn set_async(&mut self, value: bool) {
        match self {
            Node::Command(cmd) => cmd.is_async = value,
            Node::Connector(conn) => conn.is_async = value,
            Node::If(stmt) => stmt.is_async = value,
            Node::While(stmt) => stmt.is_async = value,
            Node::For(stmt) => stmt.is_async = value,
        }
    }

    /// Statement-level redirections of compound nodes.
    pub fn redirects_mut(&mut self) -> Option<&mut Vec<Redirect>> {
        match self {
            Node::If(stmt) => Some(&mut stmt.redirects),
            Node::While(stmt) => Some(&mut stmt.redirects),
            Node::For(stmt) => Some(&mut stmt.redirects),
            Node::Command(cmd) => Some(&mut cmd.redirects),
            Node::Connector(_) => None,
        }
    }

    pub fn connector(kind: ConnectorKind, left: Node, right: Node) -> Self {
        Node::Connector(Connector {
            kind,
            left: Box::new(left),
            right: Box::new(right),
            pipe_stderr: false,
            is_async: false,
        })
    }
}

/// Parse a complete program. Blank input yields `None`.
pub fn parse(input: &str) -> ShellResult<Option<Node>> {
    Parser::new(input)?.parse_program()
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            WordKind::Normal | WordKind::Separator => write!(f, "{}", self.text),
            WordKind::Quoted => write!(f, "'{}'", self.text),
            WordKind::DoubleQuoted => write!(f, "\"{}\"", self.text),
            WordKind::Substituted => write!(f, "$({})", self.text),
        }
    }
}

impl fmt::Display for WordList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, field) in self.fields().into_iter().enumerate() {
            if index > 0 {
                write!(f, " ")?;
            }
            for word in field {
                write!(f, "{word}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let op = match self.op {
            RedirectOp::Read => "<",
            RedirectOp::Write => ">",
            RedirectOp::Append => ">>",
            RedirectOp::ReadWrite => "<>",
            RedirectOp::CopyRead => "<&",
            RedirectOp::CopyWrite => ">&",
            RedirectOp::Close if self.dest == 0 => "<&",
            RedirectOp::Close => ">&",
        };
        write!(f, "{}{op}", self.dest)?;
        match (&self.target, self.src) {
            (Some(target), _) => write!(f, "{target}"),
            (None, Some(src)) => write!(f, "{src}"),
            (None, None) => write!(f, "-"),
        }
    }
}

fn write_redirects(f: &mut fmt::Formatter, redirects: &[Redirect]) -> fmt::Result {
    for redirect in redirects {
        write!(f, " {redirect}")?;
    }
    Ok(())
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Node::Command(cmd) => {
                let mut first = true;
                for assignment in &cmd.assignments {
                    if !first {
                        write!(f, " ")?;
                    }
                    write!(f, "{}={}", assignment.name, assignment.value)?;
                    first = false;
                }
                if !cmd.words.is_empty() {
                    if !first {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", cmd.words)?;
                    first = false;
                }
                for redirect in &cmd.redirects {
                    if !first {
                        write!(f, " ")?;
                    }
                    write!(f, "{redirect}")?;
                    first = false;
                }
            }
            Node::Connector(conn) => {
                let op = match conn.kind {
                    ConnectorKind::And => " && ",
                    ConnectorKind::Or => " || ",
                    ConnectorKind::Semicolon => "; ",
                    ConnectorKind::Pipeline if conn.pipe_stderr => " |& ",
                    ConnectorKind::Pipeline => " | ",
                };
                write!(f, "{}{op}{}", conn.left, conn.right)?;
            }
            Node::If(stmt) => {
                let keyword = if stmt.reverse { "unless" } else { "if" };
                write!(f, "{keyword} {}; then {}", stmt.condition, stmt.then_branch)?;
                if let Some(else_branch) = &stmt.else_branch {
                    write!(f, "; else {else_branch}")?;
                }
                write!(f, "; fi")?;
                write_redirects(f, &stmt.redirects)?;
            }
            Node::While(stmt) => {
                let keyword = if stmt.reverse { "until" } else { "while" };
                write!(f, "{keyword} {}; do {}; done", stmt.condition, stmt.body)?;
                write_redirects(f, &stmt.redirects)?;
            }
            Node::For(stmt) => {
                write!(
                    f,
                    "for {} in {}; do {}; done",
                    stmt.variable, stmt.items, stmt.body
                )?;
                write_redirects(f, &stmt.redirects)?;
            }
        }
        if self.is_async() {
            write!(f, " &")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_split_on_separators() {
        let list = WordList::from_words(vec![
            Word::normal("a"),
            Word::new(WordKind::DoubleQuoted, "b"),
            Word::separator(),
            Word::separator(),
            Word::normal("c"),
            Word::separator(),
        ]);
        let fields = list.fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].len(), 2);
        assert_eq!(fields[1][0].text, "c");
    }

    #[test]
    fn separator_only_list_is_empty() {
        let list = WordList::from_words(vec![Word::separator()]);
        assert!(list.is_empty());
        assert!(list.fields().is_empty());
    }

    #[test]
    fn name_requires_single_unquoted_word() {
        let list = WordList::from_words(vec![Word::normal("item")]);
        assert_eq!(list.as_name(), Some("item"));
        let quoted = WordList::from_words(vec![Word::new(WordKind::Quoted, "item")]);
        assert_eq!(quoted.as_name(), None);
    }

    #[test]
    fn async_flag_round_trips_through_every_node() {
        let mut node = parse("while true; do echo; done").unwrap().unwrap();
        assert!(!node.is_async());
        node.set_async(true);
        assert!(node.is_async());
    }

    #[test]
    fn display_renders_normalized_text() {
        let node = parse("a=1 echo \"x\" 'y' 2>&1 | cat &").unwrap().unwrap();
        assert_eq!(node.to_string(), "a=1 echo \"x\" 'y' 2>&1 | cat &");
    }
}
