use crate::error::{ErrorKind, ShellError, ShellResult};
use crate::parse::tokenizer::{Keyword, Token, TokenKind, tokenize};
use crate::parse::{
    Assignment, Command, Connector, ConnectorKind, ForStatement, IfStatement, Node, WhileStatement, Word,
    WordKind, WordList,
};

/// Statements joined by `;`, `&&` and `||`, kept flat until the enclosing
/// construct decides how to fold them.
struct Chain {
    first: Node,
    rest: Vec<(ConnectorKind, Node)>,
}

impl Chain {
    fn new(first: Node) -> Self {
        Self {
            first,
            rest: Vec::new(),
        }
    }

    fn push(&mut self, kind: ConnectorKind, node: Node) {
        self.rest.push((kind, node));
    }

    fn last_mut(&mut self) -> &mut Node {
        match self.rest.last_mut() {
            Some((_, node)) => node,
            None => &mut self.first,
        }
    }

    /// Left-associative fold: `a; b && c` becomes `((a; b) && c)`.
    fn fold(self) -> Node {
        self.rest
            .into_iter()
            .fold(self.first, |left, (kind, right)| {
                Node::connector(kind, left, right)
            })
    }

    /// Splits off the leading statement for `if`/`while` written without
    /// `then`/`do`: the condition is everything before the first `;`.
    fn split_condition(self) -> Option<(Node, Node)> {
        let index = self
            .rest
            .iter()
            .position(|(kind, _)| *kind == ConnectorKind::Semicolon)?;
        let mut head = self.rest;
        let tail = head.split_off(index);
        let condition = Chain {
            first: self.first,
            rest: head,
        }
        .fold();
        let mut tail = tail.into_iter();
        let (_, body_first) = tail.next()?;
        let body = Chain {
            first: body_first,
            rest: tail.collect(),
        }
        .fold();
        Some((condition, body))
    }
}

/// Recursive-descent parser over the token stream.
pub struct Parser {
    pub(super) tokens: Vec<Token>,
    pub(super) pos: usize,
    pub(super) input_len: usize,
}

impl Parser {
    pub fn new(input: &str) -> ShellResult<Self> {
        Ok(Self {
            tokens: tokenize(input)?,
            pos: 0,
            input_len: input.len(),
        })
    }

    pub(super) fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|token| &token.kind)
    }

    pub(super) fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|token| token.offset)
            .unwrap_or(self.input_len)
    }

    pub(super) fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(TokenKind::Word(word)) if word.is_separator()) {
            self.pos += 1;
        }
    }

    fn skip_newlines(&mut self) {
        loop {
            match self.peek() {
                Some(TokenKind::Newline) => self.pos += 1,
                Some(TokenKind::Word(word)) if word.is_separator() => self.pos += 1,
                _ => break,
            }
        }
    }

    fn at_keyword(&self, keywords: &[Keyword]) -> Option<Keyword> {
        match self.peek() {
            Some(TokenKind::Keyword(keyword)) if keywords.contains(keyword) => Some(*keyword),
            _ => None,
        }
    }

    /// Error for whatever token sits at the cursor.
    pub(super) fn unexpected(&self, expected: &str) -> ShellError {
        let offset = self.offset();
        match self.peek() {
            None => ShellError::new(ErrorKind::Syntax, "unexpected end of input")
                .with_context(format!("expected {expected}"))
                .with_position(offset)
                .incomplete(),
            Some(TokenKind::Keyword(keyword)) => ShellError::new(
                ErrorKind::UnexpectedKeyword,
                format!("unexpected keyword `{}`", keyword.as_str()),
            )
            .with_context(format!("expected {expected}"))
            .with_position(offset),
            Some(kind) => {
                ShellError::new(ErrorKind::Syntax, format!("unexpected token `{kind}`"))
                    .with_context(format!("expected {expected}"))
                    .with_position(offset)
            }
        }
    }

    fn expect_keyword(&mut self, keywords: &[Keyword]) -> ShellResult<Keyword> {
        self.skip_newlines();
        match self.at_keyword(keywords) {
            Some(keyword) => {
                self.pos += 1;
                Ok(keyword)
            }
            None => {
                let names: Vec<String> = keywords
                    .iter()
                    .map(|keyword| format!("`{}`", keyword.as_str()))
                    .collect();
                let err = self.unexpected(&names.join(" or "));
                if self.peek().is_none() {
                    Err(ShellError {
                        kind: ErrorKind::UnexpectedKeyword,
                        ..err
                    })
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Parse the whole input as one program.
    pub fn parse_program(&mut self) -> ShellResult<Option<Node>> {
        let chain = self.parse_list(&[])?;
        self.skip_newlines();
        if self.peek().is_some() {
            return Err(self.unexpected("end of input"));
        }
        Ok(chain.map(Chain::fold))
    }

    fn parse_list(&mut self, stop: &[Keyword]) -> ShellResult<Option<Chain>> {
        let mut chain: Option<Chain> = None;
        let mut pending: Option<ConnectorKind> = None;
        loop {
            self.skip_separators();
            match self.peek() {
                None => break,
                Some(TokenKind::Keyword(keyword)) if stop.contains(keyword) => break,
                Some(TokenKind::Newline) => {
                    self.pos += 1;
                    if chain.is_some() && pending.is_none() {
                        pending = Some(ConnectorKind::Semicolon);
                    }
                }
                Some(TokenKind::Semi) => {
                    if chain.is_none() || pending.is_some() {
                        return Err(self.unexpected("a command"));
                    }
                    self.pos += 1;
                    pending = Some(ConnectorKind::Semicolon);
                }
                Some(TokenKind::Amp) => {
                    match chain.as_mut() {
                        Some(chain) if pending.is_none() => chain.last_mut().set_async(true),
                        _ => return Err(self.unexpected("a command")),
                    }
                    self.pos += 1;
                    pending = Some(ConnectorKind::Semicolon);
                }
                Some(TokenKind::AndIf) | Some(TokenKind::OrIf) => {
                    if chain.is_none() || pending.is_some() {
                        return Err(self.unexpected("a command"));
                    }
                    let kind = if self.peek() == Some(&TokenKind::AndIf) {
                        ConnectorKind::And
                    } else {
                        ConnectorKind::Or
                    };
                    self.pos += 1;
                    pending = Some(kind);
                }
                Some(_) => {
                    if chain.is_some() && pending.is_none() {
                        return Err(self.unexpected("`;` or newline"));
                    }
                    let node = self.parse_pipeline()?;
                    match chain.as_mut() {
                        None => chain = Some(Chain::new(node)),
                        Some(chain) => {
                            chain.push(pending.unwrap_or(ConnectorKind::Semicolon), node)
                        }
                    }
                    pending = None;
                }
            }
        }
        if matches!(pending, Some(ConnectorKind::And) | Some(ConnectorKind::Or)) {
            return Err(self.unexpected("a command"));
        }
        Ok(chain)
    }

    fn parse_pipeline(&mut self) -> ShellResult<Node> {
        let mut node = self.parse_command()?;
        loop {
            self.skip_separators();
            let pipe_stderr = match self.peek() {
                Some(TokenKind::Pipe) => false,
                Some(TokenKind::PipeAnd) => true,
                _ => break,
            };
            self.pos += 1;
            self.skip_newlines();
            let right = self.parse_command()?;
            node = Node::Connector(Connector {
                kind: ConnectorKind::Pipeline,
                left: Box::new(node),
                right: Box::new(right),
                pipe_stderr,
                is_async: false,
            });
        }
        Ok(node)
    }

    fn parse_command(&mut self) -> ShellResult<Node> {
        self.skip_separators();
        let mut node = match self.peek() {
            Some(TokenKind::Keyword(Keyword::If)) => self.parse_if(false)?,
            Some(TokenKind::Keyword(Keyword::Unless)) => self.parse_if(true)?,
            Some(TokenKind::Keyword(Keyword::While)) => self.parse_while(false)?,
            Some(TokenKind::Keyword(Keyword::Until)) => self.parse_while(true)?,
            Some(TokenKind::Keyword(Keyword::For)) => self.parse_for()?,
            Some(TokenKind::Word(_)) | Some(TokenKind::Number(_)) => {
                return self.parse_simple_command().map(Node::Command);
            }
            Some(kind) if kind.is_redirect_op() => {
                return self.parse_simple_command().map(Node::Command);
            }
            _ => return Err(self.unexpected("a command")),
        };

        // Statement-level redirections follow the closing keyword.
        loop {
            self.skip_separators();
            if !self.at_redirect() {
                break;
            }
            let redirects = self.parse_redirect()?;
            if let Some(list) = node.redirects_mut() {
                list.extend(redirects);
            }
        }
        Ok(node)
    }

    fn parse_simple_command(&mut self) -> ShellResult<Command> {
        let mut command = Command::default();
        let mut seen_program = false;
        loop {
            match self.peek() {
                Some(TokenKind::Word(word)) if word.is_separator() => {
                    self.pos += 1;
                }
                Some(TokenKind::Word(_)) => {
                    let field = self.take_field();
                    if !seen_program {
                        if let Some(assignment) = as_assignment(&field) {
                            command.assignments.push(assignment);
                            continue;
                        }
                    }
                    seen_program = true;
                    if !command.words.words.is_empty() {
                        command.words.push(Word::separator());
                    }
                    command.words.words.extend(field);
                }
                _ if self.at_redirect() => {
                    let redirects = self.parse_redirect()?;
                    command.redirects.extend(redirects);
                }
                _ => break,
            }
        }
        if command.assignments.is_empty() && command.words.is_empty() && command.redirects.is_empty()
        {
            return Err(self.unexpected("a command"));
        }
        Ok(command)
    }

    /// Consumes adjacent non-separator words forming one field.
    pub(super) fn take_field(&mut self) -> Vec<Word> {
        let mut field = Vec::new();
        while let Some(TokenKind::Word(word)) = self.peek() {
            if word.is_separator() {
                break;
            }
            field.push(word.clone());
            self.pos += 1;
        }
        field
    }

    /// Condition list up to `terminator`, or the leading statement when the
    /// terminator keyword is omitted. Returns `(condition, body_if_split)`.
    fn parse_condition(
        &mut self,
        terminator: Keyword,
        stop: &[Keyword],
    ) -> ShellResult<(Node, Option<Node>)> {
        let chain = match self.parse_list(stop)? {
            Some(chain) => chain,
            None => return Err(self.unexpected("a condition")),
        };
        if self.at_keyword(&[terminator]).is_some() {
            self.pos += 1;
            return Ok((chain.fold(), None));
        }
        match chain.split_condition() {
            Some((condition, body)) => Ok((condition, Some(body))),
            None => Err(self.unexpected(&format!("`{}`", terminator.as_str()))),
        }
    }

    fn parse_body(&mut self, stop: &[Keyword], what: &str) -> ShellResult<Node> {
        match self.parse_list(stop)? {
            Some(chain) => Ok(chain.fold()),
            None => Err(self.unexpected(what)),
        }
    }

    fn parse_if(&mut self, reverse: bool) -> ShellResult<Node> {
        self.pos += 1;
        let stop = [
            Keyword::Then,
            Keyword::Elif,
            Keyword::Elsif,
            Keyword::Else,
            Keyword::Fi,
            Keyword::End,
        ];
        let (condition, then_branch) = self.parse_condition(Keyword::Then, &stop)?;
        let then_branch = match then_branch {
            Some(body) => body,
            None => self.parse_body(&stop[1..], "a command")?,
        };
        let else_branch = self.parse_if_tail()?;
        Ok(Node::If(IfStatement {
            condition: Box::new(condition),
            reverse,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
            redirects: Vec::new(),
            is_async: false,
        }))
    }

    /// Parses `elif ...`, `else ...` and the closing keyword.
    fn parse_if_tail(&mut self) -> ShellResult<Option<Node>> {
        let keyword = self.expect_keyword(&[
            Keyword::Elif,
            Keyword::Elsif,
            Keyword::Else,
            Keyword::Fi,
            Keyword::End,
        ])?;
        match keyword {
            Keyword::Else => {
                let body = self.parse_body(&[Keyword::Fi, Keyword::End], "a command")?;
                self.expect_keyword(&[Keyword::Fi, Keyword::End])?;
                Ok(Some(body))
            }
            Keyword::Elif | Keyword::Elsif => {
                // The nested statement shares the outer closing keyword.
                self.pos -= 1;
                self.parse_if(false).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn parse_while(&mut self, reverse: bool) -> ShellResult<Node> {
        self.pos += 1;
        let stop = [Keyword::Do, Keyword::Done, Keyword::End];
        let (condition, body) = self.parse_condition(Keyword::Do, &stop)?;
        let body = match body {
            Some(body) => body,
            None => self.parse_body(&stop[1..], "a command")?,
        };
        self.expect_keyword(&[Keyword::Done, Keyword::End])?;
        Ok(Node::While(WhileStatement {
            condition: Box::new(condition),
            reverse,
            body: Box::new(body),
            redirects: Vec::new(),
            is_async: false,
        }))
    }

    fn parse_for(&mut self) -> ShellResult<Node> {
        self.pos += 1;
        self.skip_separators();
        let field = self.take_field();
        let variable = match WordList::from_words(field).as_name() {
            Some(name) if is_valid_name(name) => name.to_string(),
            _ => return Err(self.unexpected("a variable name")),
        };
        self.expect_keyword(&[Keyword::In])?;

        let mut items = WordList::new();
        loop {
            match self.peek() {
                Some(TokenKind::Word(word)) => {
                    items.push(word.clone());
                    self.pos += 1;
                }
                _ => break,
            }
        }
        if matches!(self.peek(), Some(TokenKind::Semi)) {
            self.pos += 1;
        }
        self.skip_newlines();

        let terminators: &[Keyword] = match self.at_keyword(&[Keyword::Do, Keyword::LBrace]) {
            Some(Keyword::LBrace) => {
                self.pos += 1;
                &[Keyword::RBrace]
            }
            Some(_) => {
                self.pos += 1;
                &[Keyword::Done, Keyword::End]
            }
            None => &[Keyword::Done, Keyword::End, Keyword::RBrace],
        };
        let body = self.parse_body(terminators, "a command")?;
        self.expect_keyword(terminators)?;
        Ok(Node::For(ForStatement {
            variable,
            items,
            body: Box::new(body),
            redirects: Vec::new(),
            is_async: false,
        }))
    }
}

pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn as_assignment(field: &[Word]) -> Option<Assignment> {
    let first = field.first()?;
    if first.kind != WordKind::Normal {
        return None;
    }
    let (name, value) = first.text.split_once('=')?;
    if !is_valid_name(name) {
        return None;
    }
    let mut words = Vec::new();
    if !value.is_empty() {
        words.push(Word::normal(value));
    }
    words.extend(field[1..].iter().cloned());
    Some(Assignment {
        name: name.to_string(),
        value: WordList::from_words(words),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse, RedirectOp};

    fn parse_one(input: &str) -> Node {
        parse(input).unwrap().unwrap()
    }

    fn command(node: &Node) -> &Command {
        match node {
            Node::Command(cmd) => cmd,
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn blank_input_is_empty_program() {
        assert!(parse("").unwrap().is_none());
        assert!(parse("  \n # just a comment\n").unwrap().is_none());
    }

    #[test]
    fn connectors_fold_left() {
        let node = parse_one("a; b && c || d");
        assert_eq!(node.to_string(), "a; b && c || d");
        let Node::Connector(outer) = node else {
            panic!("expected connector")
        };
        assert_eq!(outer.kind, ConnectorKind::Or);
        let Node::Connector(middle) = *outer.left else {
            panic!("expected connector")
        };
        assert_eq!(middle.kind, ConnectorKind::And);
    }

    #[test]
    fn pipeline_binds_tighter_than_and() {
        let Node::Connector(conn) = parse_one("a | b && c") else {
            panic!("expected connector")
        };
        assert_eq!(conn.kind, ConnectorKind::And);
        assert!(matches!(*conn.left, Node::Connector(ref p) if p.kind == ConnectorKind::Pipeline));
    }

    #[test]
    fn trailing_ampersand_marks_rightmost_operand() {
        let Node::Connector(conn) = parse_one("a && b &") else {
            panic!("expected connector")
        };
        assert!(!conn.is_async);
        assert!(conn.right.is_async());
        assert!(!conn.left.is_async());

        let node = parse_one("a | b &");
        assert!(node.is_async());
    }

    #[test]
    fn ampersand_separates_statements() {
        let Node::Connector(conn) = parse_one("sleep 1 & echo hi") else {
            panic!("expected connector")
        };
        assert_eq!(conn.kind, ConnectorKind::Semicolon);
        assert!(conn.left.is_async());
        assert!(!conn.right.is_async());
    }

    #[test]
    fn assignments_precede_program() {
        let node = parse_one("A=1 B=x\"y\" env C=2");
        let cmd = command(&node);
        assert_eq!(cmd.assignments.len(), 2);
        assert_eq!(cmd.assignments[0].name, "A");
        assert_eq!(cmd.assignments[1].value.words.len(), 2);
        assert_eq!(cmd.words.fields().len(), 2);
    }

    #[test]
    fn bare_assignment_with_empty_value() {
        let node = parse_one("EMPTY=");
        let cmd = command(&node);
        assert!(cmd.words.is_empty());
        assert!(cmd.assignments[0].value.is_empty());
    }

    #[test]
    fn if_with_elif_and_else() {
        let node = parse_one("if a; then b; elif c; then d; else e; fi");
        let Node::If(stmt) = node else {
            panic!("expected if")
        };
        let Some(else_branch) = stmt.else_branch else {
            panic!("expected elif")
        };
        let Node::If(nested) = *else_branch else {
            panic!("expected nested if")
        };
        assert_eq!(nested.condition.to_string(), "c");
        assert_eq!(nested.else_branch.unwrap().to_string(), "e");
    }

    #[test]
    fn unless_end_form() {
        let Node::If(stmt) = parse_one("unless false\n echo no\nend") else {
            panic!("expected if")
        };
        assert!(stmt.reverse);
        assert_eq!(stmt.condition.to_string(), "false");
        assert_eq!(stmt.then_branch.to_string(), "echo no");
    }

    #[test]
    fn omitted_then_takes_first_statement_as_condition() {
        let Node::If(stmt) = parse_one("if test -f x; echo a; echo b; fi") else {
            panic!("expected if")
        };
        assert_eq!(stmt.condition.to_string(), "test -f x");
        assert_eq!(stmt.then_branch.to_string(), "echo a; echo b");
    }

    #[test]
    fn while_without_do() {
        let Node::While(stmt) = parse_one("while [ $X -ne 3 ]; echo $X; X=`expr $X + 1`; end")
        else {
            panic!("expected while")
        };
        assert_eq!(stmt.condition.to_string(), "[ $X -ne 3 ]");
        assert_eq!(stmt.body.to_string(), "echo $X; X=$(expr $X + 1)");
    }

    #[test]
    fn until_with_do() {
        let Node::While(stmt) = parse_one("until a && b; do c; done") else {
            panic!("expected while")
        };
        assert!(stmt.reverse);
        assert_eq!(stmt.condition.to_string(), "a && b");
    }

    #[test]
    fn for_forms() {
        for input in [
            "for i in a b c; do echo $i; done",
            "for i in a b c; echo $i; end",
            "for i in a b c { echo $i; }",
            "for i in a b c\ndo\n echo $i\ndone",
        ] {
            let Node::For(stmt) = parse_one(input) else {
                panic!("expected for: {input}")
            };
            assert_eq!(stmt.variable, "i");
            assert_eq!(stmt.items.fields().len(), 3, "{input}");
            assert_eq!(stmt.body.to_string(), "echo $i", "{input}");
        }
    }

    #[test]
    fn compound_redirects_and_pipes() {
        let node = parse_one("while read l; echo $l; end < in.txt > out.txt | cat");
        let Node::Connector(conn) = node else {
            panic!("expected pipeline")
        };
        let Node::While(stmt) = *conn.left else {
            panic!("expected while")
        };
        assert_eq!(stmt.redirects.len(), 2);
        assert_eq!(stmt.redirects[0].op, RedirectOp::Read);
        assert_eq!(stmt.redirects[1].dest, 1);
    }

    #[test]
    fn nested_compounds() {
        let node = parse_one("for a in 1 2; do for b in 3 4; do echo $a$b; done; done");
        let Node::For(outer) = node else {
            panic!("expected for")
        };
        assert!(matches!(*outer.body, Node::For(_)));
    }

    #[test]
    fn incomplete_inputs_are_flagged() {
        for input in [
            "if true; then",
            "while true; do echo",
            "for i in a b",
            "echo a &&",
            "echo a |",
            "if true",
        ] {
            let err = parse(input).unwrap_err();
            assert!(err.is_incomplete(), "{input}: {err}");
        }
    }

    #[test]
    fn misplaced_tokens_are_errors() {
        let err = parse("; echo").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
        assert!(!err.is_incomplete());

        let err = parse("if true; then fi").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedKeyword);

        let err = parse("echo a && && b").unwrap_err();
        assert!(!err.is_incomplete());

        let err = parse("if true; then echo; fi echo").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
    }

    #[test]
    fn newline_after_operator_continues() {
        let node = parse_one("echo a &&\n echo b");
        assert_eq!(node.to_string(), "echo a && echo b");
    }
}
