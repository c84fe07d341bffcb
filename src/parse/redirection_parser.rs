use std::os::fd::RawFd;

use crate::error::{ErrorKind, ShellError, ShellResult};
use crate::parse::command_parser::Parser;
use crate::parse::tokenizer::TokenKind;
use crate::parse::{Redirect, RedirectOp, WordList};

impl Parser {
    pub(super) fn at_redirect(&self) -> bool {
        match self.peek() {
            Some(TokenKind::Number(_)) => true,
            Some(kind) => kind.is_redirect_op(),
            None => false,
        }
    }

    /// Parses one redirection. `&>` and friends expand to two entries: the
    /// file on stdout followed by a copy of stdout onto stderr.
    pub(super) fn parse_redirect(&mut self) -> ShellResult<Vec<Redirect>> {
        let explicit_fd = match self.peek() {
            Some(TokenKind::Number(n)) => {
                let n = *n;
                self.advance();
                Some(n)
            }
            _ => None,
        };
        if !matches!(self.peek(), Some(kind) if kind.is_redirect_op()) {
            return Err(self.unexpected("a redirection operator"));
        }
        let op = match self.advance() {
            Some(token) => token,
            None => return Err(self.unexpected("a redirection operator")),
        };

        let redirects = match op.kind {
            TokenKind::Less => vec![Redirect::file(
                RedirectOp::Read,
                explicit_fd.unwrap_or(0),
                self.parse_target()?,
            )],
            TokenKind::Great => vec![Redirect::file(
                RedirectOp::Write,
                explicit_fd.unwrap_or(1),
                self.parse_target()?,
            )],
            TokenKind::DGreat => vec![Redirect::file(
                RedirectOp::Append,
                explicit_fd.unwrap_or(1),
                self.parse_target()?,
            )],
            TokenKind::LessGreat => vec![Redirect::file(
                RedirectOp::ReadWrite,
                explicit_fd.unwrap_or(0),
                self.parse_target()?,
            )],
            TokenKind::LessAnd => {
                vec![self.parse_duplicate(RedirectOp::CopyRead, explicit_fd.unwrap_or(0))?]
            }
            TokenKind::GreatAnd => match (self.peek(), explicit_fd) {
                (Some(TokenKind::Word(_)), None) => {
                    self.both_to_file(RedirectOp::Write, op.offset, None)?
                }
                _ => vec![self.parse_duplicate(RedirectOp::CopyWrite, explicit_fd.unwrap_or(1))?],
            },
            TokenKind::AndGreat => self.both_to_file(RedirectOp::Write, op.offset, explicit_fd)?,
            TokenKind::AndDGreat | TokenKind::DGreatAnd => {
                self.both_to_file(RedirectOp::Append, op.offset, explicit_fd)?
            }
            other => {
                return Err(ShellError::new(
                    ErrorKind::UnknownType,
                    format!("unknown redirection operator `{other}`"),
                )
                .with_position(op.offset));
            }
        };
        Ok(redirects)
    }

    fn parse_duplicate(&mut self, op: RedirectOp, dest: RawFd) -> ShellResult<Redirect> {
        match self.peek() {
            Some(TokenKind::Number(src)) => {
                let src = *src;
                self.advance();
                Ok(Redirect::copy(op, dest, src))
            }
            Some(TokenKind::Minus) => {
                self.advance();
                Ok(Redirect::close(dest))
            }
            _ => Err(self.unexpected("a file descriptor or `-`")),
        }
    }

    fn both_to_file(
        &mut self,
        op: RedirectOp,
        offset: usize,
        explicit_fd: Option<RawFd>,
    ) -> ShellResult<Vec<Redirect>> {
        if explicit_fd.is_some() {
            return Err(ShellError::new(
                ErrorKind::Syntax,
                "a descriptor number cannot precede this operator",
            )
            .with_position(offset));
        }
        let target = self.parse_target()?;
        Ok(vec![
            Redirect::file(op, 1, target),
            Redirect::copy(RedirectOp::CopyWrite, 2, 1),
        ])
    }

    fn parse_target(&mut self) -> ShellResult<WordList> {
        self.skip_separators();
        let field = self.take_field();
        if field.is_empty() {
            return Err(self.unexpected("a file name"));
        }
        Ok(WordList::from_words(field))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::parse::{Node, RedirectOp, parse};

    fn redirects(input: &str) -> Vec<(RedirectOp, i32, Option<i32>, Option<String>)> {
        let Some(Node::Command(cmd)) = parse(input).unwrap() else {
            panic!("expected a simple command")
        };
        cmd.redirects
            .into_iter()
            .map(|r| (r.op, r.dest, r.src, r.target.map(|t| t.to_string())))
            .collect()
    }

    #[test]
    fn file_redirections_default_descriptors() {
        assert_eq!(
            redirects("cat < in >> log 2> err"),
            vec![
                (RedirectOp::Read, 0, None, Some("in".into())),
                (RedirectOp::Append, 1, None, Some("log".into())),
                (RedirectOp::Write, 2, None, Some("err".into())),
            ]
        );
        assert_eq!(
            redirects("cat 3<> rw"),
            vec![(RedirectOp::ReadWrite, 3, None, Some("rw".into()))]
        );
    }

    #[test]
    fn duplication_and_close() {
        assert_eq!(
            redirects("cmd 2>&1 <&3 4>&-"),
            vec![
                (RedirectOp::CopyWrite, 2, Some(1), None),
                (RedirectOp::CopyRead, 0, Some(3), None),
                (RedirectOp::Close, 4, None, None),
            ]
        );
    }

    #[test]
    fn both_streams_to_file() {
        let expected = vec![
            (RedirectOp::Write, 1, None, Some("out".into())),
            (RedirectOp::CopyWrite, 2, Some(1), None),
        ];
        assert_eq!(redirects("cmd &> out"), expected);
        assert_eq!(redirects("cmd >&out"), expected);
        assert_eq!(redirects("cmd &>>out")[0].0, RedirectOp::Append);
        assert_eq!(redirects("cmd >>& out")[0].0, RedirectOp::Append);
    }

    #[test]
    fn target_is_one_field() {
        let Some(Node::Command(cmd)) = parse("echo a >\"my file\"x b").unwrap() else {
            panic!("expected a simple command")
        };
        assert_eq!(cmd.redirects[0].target.as_ref().unwrap().words.len(), 2);
        assert_eq!(cmd.words.to_string(), "echo a b");
    }

    #[test]
    fn redirect_only_command() {
        assert_eq!(
            redirects("3> f 4>&3"),
            vec![
                (RedirectOp::Write, 3, None, Some("f".into())),
                (RedirectOp::CopyWrite, 4, Some(3), None),
            ]
        );
    }

    #[test]
    fn malformed_redirections() {
        let err = parse("cat <").unwrap_err();
        assert!(err.is_incomplete());
        let err = parse("cat >&;").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
        let err = parse("cat 2>&").unwrap_err();
        assert!(err.is_incomplete());
        let err = parse("cat 2>").unwrap_err();
        assert!(err.is_incomplete());
    }
}
