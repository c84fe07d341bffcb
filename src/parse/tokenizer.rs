use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::{ErrorKind, ShellError, ShellResult};
use crate::parse::{Word, WordKind};

const MAX_SUBST_DEPTH: usize = 32;

/// Longest operators first so `&>>` wins over `&>` and `&`.
const OPERATORS: &[(&str, TokenKind)] = &[
    ("&>>", TokenKind::AndDGreat),
    (">>&", TokenKind::DGreatAnd),
    ("&&", TokenKind::AndIf),
    ("&>", TokenKind::AndGreat),
    ("||", TokenKind::OrIf),
    ("|&", TokenKind::PipeAnd),
    ("<>", TokenKind::LessGreat),
    ("<&", TokenKind::LessAnd),
    (">>", TokenKind::DGreat),
    (">&", TokenKind::GreatAnd),
    ("<", TokenKind::Less),
    (">", TokenKind::Great),
    ("&", TokenKind::Amp),
    ("|", TokenKind::Pipe),
    (";", TokenKind::Semi),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Unless,
    Then,
    Elif,
    Elsif,
    Else,
    Fi,
    While,
    Until,
    For,
    In,
    Do,
    Done,
    End,
    LBrace,
    RBrace,
}

impl Keyword {
    fn lookup(text: &str) -> Option<Self> {
        let keyword = match text {
            "if" => Keyword::If,
            "unless" => Keyword::Unless,
            "then" => Keyword::Then,
            "elif" => Keyword::Elif,
            "elsif" => Keyword::Elsif,
            "else" => Keyword::Else,
            "fi" => Keyword::Fi,
            "while" => Keyword::While,
            "until" => Keyword::Until,
            "for" => Keyword::For,
            "in" => Keyword::In,
            "do" => Keyword::Do,
            "done" => Keyword::Done,
            "end" => Keyword::End,
            "{" => Keyword::LBrace,
            "}" => Keyword::RBrace,
            _ => return None,
        };
        Some(keyword)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::Unless => "unless",
            Keyword::Then => "then",
            Keyword::Elif => "elif",
            Keyword::Elsif => "elsif",
            Keyword::Else => "else",
            Keyword::Fi => "fi",
            Keyword::While => "while",
            Keyword::Until => "until",
            Keyword::For => "for",
            Keyword::In => "in",
            Keyword::Do => "do",
            Keyword::Done => "done",
            Keyword::End => "end",
            Keyword::LBrace => "{",
            Keyword::RBrace => "}",
        }
    }

    fn opens_statement(self) -> bool {
        matches!(
            self,
            Keyword::If | Keyword::Unless | Keyword::While | Keyword::Until | Keyword::For
        )
    }

    fn closes_statement(self) -> bool {
        matches!(
            self,
            Keyword::Fi | Keyword::Done | Keyword::End | Keyword::RBrace
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Word(Word),
    /// File descriptor number written directly before `<`/`>` or after `<&`/`>&`
    Number(i32),
    /// `-` after `<&`/`>&`
    Minus,
    Keyword(Keyword),
    Less,
    LessGreat,
    LessAnd,
    Great,
    DGreat,
    GreatAnd,
    AndGreat,
    AndDGreat,
    DGreatAnd,
    Amp,
    AndIf,
    Pipe,
    PipeAnd,
    OrIf,
    Semi,
    Newline,
}

impl TokenKind {
    pub fn is_redirect_op(&self) -> bool {
        matches!(
            self,
            TokenKind::Less
                | TokenKind::LessGreat
                | TokenKind::LessAnd
                | TokenKind::Great
                | TokenKind::DGreat
                | TokenKind::GreatAnd
                | TokenKind::AndGreat
                | TokenKind::AndDGreat
                | TokenKind::DGreatAnd
        )
    }

    fn ends_command(&self) -> bool {
        matches!(
            self,
            TokenKind::Amp
                | TokenKind::AndIf
                | TokenKind::Pipe
                | TokenKind::PipeAnd
                | TokenKind::OrIf
                | TokenKind::Semi
                | TokenKind::Newline
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenKind::Word(word) => write!(f, "{word}"),
            TokenKind::Number(n) => write!(f, "{n}"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Keyword(keyword) => write!(f, "{}", keyword.as_str()),
            TokenKind::Newline => write!(f, "newline"),
            other => {
                let text = OPERATORS
                    .iter()
                    .find(|(_, kind)| kind == other)
                    .map(|(text, _)| *text)
                    .unwrap_or("?");
                write!(f, "{text}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token in the input
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ForState {
    Idle,
    ExpectVar,
    ExpectIn,
    List,
}

/// Converts source text into tokens.
///
/// Reserved words are only recognized where a statement may begin. Closing
/// and middle words (`then`, `do`, `fi`, `done`, `end`, `}`, ...) additionally
/// require an open compound statement, so `end` at top level is an ordinary
/// command name.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    head: bool,
    after_word: bool,
    after_dup: bool,
    nesting: usize,
    for_state: ForState,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            head: true,
            after_word: false,
            after_dup: false,
            nesting: 0,
            for_state: ForState::Idle,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn error(&self, message: impl Into<String>, offset: usize) -> ShellError {
        ShellError::new(ErrorKind::Syntax, message).with_position(offset)
    }

    fn unterminated(&self, what: &str, offset: usize) -> ShellError {
        ShellError::new(ErrorKind::Syntax, format!("unterminated {what}"))
            .with_position(offset)
            .incomplete()
    }

    /// Skips blanks and escaped newlines; returns whether anything was skipped.
    fn skip_blanks(&mut self) -> bool {
        let start = self.pos;
        loop {
            match self.peek_char() {
                Some(' ') | Some('\t') => {
                    self.pos += 1;
                }
                Some('\\') if self.peek_second() == Some('\n') => {
                    self.pos += 2;
                }
                _ => break,
            }
        }
        self.pos != start
    }

    pub fn next_token(&mut self) -> ShellResult<Option<Token>> {
        loop {
            let start = self.pos;
            if self.skip_blanks() && self.after_word {
                return Ok(Some(self.emit(TokenKind::Word(Word::separator()), start)));
            }
            match self.peek_char() {
                None => return Ok(None),
                Some('#') => {
                    while let Some(ch) = self.peek_char() {
                        if ch == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(_) => break,
            }
        }

        let start = self.pos;
        let ch = match self.peek_char() {
            Some(ch) => ch,
            None => return Ok(None),
        };

        if ch == '\n' {
            while matches!(self.peek_char(), Some('\n') | Some(' ') | Some('\t')) {
                self.bump();
            }
            return Ok(Some(self.emit(TokenKind::Newline, start)));
        }

        if ch.is_ascii_digit() {
            if let Some(number) = self.read_fd_number()? {
                return Ok(Some(self.emit(TokenKind::Number(number), start)));
            }
        }

        if ch == '-' && self.after_dup {
            self.bump();
            return Ok(Some(self.emit(TokenKind::Minus, start)));
        }

        for (text, kind) in OPERATORS {
            if self.rest().starts_with(text) {
                self.pos += text.len();
                return Ok(Some(self.emit(kind.clone(), start)));
            }
        }

        if let Some(keyword) = self.keyword_here() {
            self.pos += keyword.as_str().len();
            return Ok(Some(self.emit(TokenKind::Keyword(keyword), start)));
        }

        let word = self.read_word()?;
        Ok(Some(self.emit(TokenKind::Word(word), start)))
    }

    fn emit(&mut self, kind: TokenKind, offset: usize) -> Token {
        self.after_dup = matches!(kind, TokenKind::LessAnd | TokenKind::GreatAnd);
        match &kind {
            TokenKind::Word(word) if word.is_separator() => {
                self.after_word = false;
            }
            TokenKind::Word(_) => {
                self.after_word = true;
                self.head = false;
                if self.for_state == ForState::ExpectVar {
                    self.for_state = ForState::ExpectIn;
                }
            }
            TokenKind::Keyword(keyword) => {
                self.after_word = false;
                let keyword = *keyword;
                if keyword.opens_statement() {
                    self.nesting += 1;
                    self.head = true;
                    if keyword == Keyword::For {
                        self.for_state = ForState::ExpectVar;
                    }
                } else if keyword.closes_statement() {
                    self.nesting = self.nesting.saturating_sub(1);
                    self.head = false;
                } else if keyword == Keyword::In {
                    self.for_state = ForState::List;
                    self.head = false;
                } else {
                    self.for_state = ForState::Idle;
                    self.head = true;
                }
            }
            other if other.ends_command() => {
                self.after_word = false;
                self.head = true;
                if self.for_state == ForState::List {
                    self.for_state = ForState::Idle;
                }
            }
            _ => {
                self.after_word = false;
            }
        }
        Token { kind, offset }
    }

    /// Reads a descriptor number if the digits at the cursor form one.
    fn read_fd_number(&mut self) -> ShellResult<Option<i32>> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let digits = &rest[..len];
        let followed_by_redirect = matches!(rest[len..].chars().next(), Some('<') | Some('>'));
        if !(self.after_dup || followed_by_redirect) {
            return Ok(None);
        }
        let number = digits
            .parse::<i32>()
            .map_err(|_| self.error(format!("bad file descriptor `{digits}`"), self.pos))?;
        self.pos += len;
        Ok(Some(number))
    }

    fn keyword_here(&self) -> Option<Keyword> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| matches!(c, ' ' | '\t' | '\n' | ';' | '&' | '|' | '<' | '>'))
            .unwrap_or(rest.len());
        let candidate = &rest[..len];
        match self.for_state {
            ForState::ExpectIn if candidate == "in" => return Some(Keyword::In),
            ForState::List if candidate == "{" => return Some(Keyword::LBrace),
            ForState::ExpectVar => return None,
            _ => {}
        }
        if !self.head {
            return None;
        }
        let keyword = Keyword::lookup(candidate)?;
        if keyword.opens_statement() {
            Some(keyword)
        } else if keyword == Keyword::In || self.nesting == 0 {
            None
        } else {
            Some(keyword)
        }
    }

    fn read_word(&mut self) -> ShellResult<Word> {
        let start = self.pos;
        match self.peek_char() {
            Some('\'') => {
                self.bump();
                self.read_quoted(start)
            }
            Some('"') => {
                self.bump();
                self.read_double_quoted(start)
            }
            Some('`') => {
                self.bump();
                self.read_backticks(start)
            }
            Some('$') if self.peek_second() == Some('(') => {
                self.pos += 2;
                self.read_substitution(start)
            }
            Some('%') => match percent_opener(self.rest(), true) {
                Some((kind, open, prefix)) => {
                    self.pos += prefix;
                    self.read_percent(kind, open, start)
                }
                None => self.read_normal(start),
            },
            _ => self.read_normal(start),
        }
    }

    fn read_normal(&mut self, start: usize) -> ShellResult<Word> {
        let mut text = String::new();
        while let Some(ch) = self.peek_char() {
            match ch {
                ' ' | '\t' | '\n' | ';' | '&' | '|' | '<' | '>' | '\'' | '"' | '`' => break,
                '$' if self.peek_second() == Some('(') => break,
                '%' if self.pos != start && percent_opener(self.rest(), false).is_some() => break,
                '\\' => {
                    self.bump();
                    match self.bump() {
                        Some('\n') => {}
                        Some(next @ ('$' | '\\')) => {
                            text.push('\\');
                            text.push(next);
                        }
                        Some(next) => text.push(next),
                        None => {
                            return Err(self.unterminated("escape at end of input", self.pos));
                        }
                    }
                }
                _ => {
                    text.push(ch);
                    self.bump();
                }
            }
        }
        if text.is_empty() && self.pos == start {
            return Err(self.error(format!("unexpected character `{}`", self.rest()), start));
        }
        Ok(Word::new(WordKind::Normal, text))
    }

    fn read_quoted(&mut self, start: usize) -> ShellResult<Word> {
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('\'') => return Ok(Word::new(WordKind::Quoted, text)),
                Some('\\') if self.peek_char() == Some('\'') => {
                    self.bump();
                    text.push('\'');
                }
                Some(ch) => text.push(ch),
                None => return Err(self.unterminated("single quote", start)),
            }
        }
    }

    fn read_double_quoted(&mut self, start: usize) -> ShellResult<Word> {
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(Word::new(WordKind::DoubleQuoted, text)),
                Some('\\') => match self.bump() {
                    Some('\n') => {}
                    Some(next @ ('"' | '`')) => text.push(next),
                    Some(next) => {
                        text.push('\\');
                        text.push(next);
                    }
                    None => return Err(self.unterminated("double quote", start)),
                },
                Some(ch) => text.push(ch),
                None => return Err(self.unterminated("double quote", start)),
            }
        }
    }

    fn read_backticks(&mut self, start: usize) -> ShellResult<Word> {
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('`') => return Ok(Word::new(WordKind::Substituted, text)),
                Some('\\') => match self.bump() {
                    Some('`') => text.push('`'),
                    Some(next) => {
                        text.push('\\');
                        text.push(next);
                    }
                    None => return Err(self.unterminated("backtick substitution", start)),
                },
                Some(ch) => text.push(ch),
                None => return Err(self.unterminated("backtick substitution", start)),
            }
        }
    }

    fn read_substitution(&mut self, start: usize) -> ShellResult<Word> {
        let mut chars = self.rest().char_indices().peekable();
        match scan_substitution(&mut chars).map_err(|err| err.with_position(start))? {
            Some((inner, consumed)) => {
                self.pos += consumed;
                Ok(Word::new(WordKind::Substituted, inner))
            }
            None => Err(self.unterminated("command substitution $(...)", start)),
        }
    }

    fn read_percent(&mut self, kind: WordKind, open: char, start: usize) -> ShellResult<Word> {
        let close = closing_delimiter(open);
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.peek_char() {
                    Some(next) if next == close || next == open => {
                        self.bump();
                        text.push(next);
                    }
                    Some(_) => text.push('\\'),
                    None => return Err(self.unterminated("percent literal", start)),
                },
                Some(ch) if ch == close => return Ok(Word::new(kind, text)),
                Some(ch) => text.push(ch),
                None => return Err(self.unterminated("percent literal", start)),
            }
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = ShellResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

/// Tokenize a whole input.
pub fn tokenize(input: &str) -> ShellResult<Vec<Token>> {
    Lexer::new(input).collect()
}

/// Recognizes `%q<d>`, `%Q<d>` and the bare `%<d>` form.
///
/// Inside a word the bare form only opens on a bracket or `!`, so `a%b` and
/// `50%.` stay plain text. At the start of a word any punctuation opens it
/// except the job-spec characters `%`, `+` and `-` and the control operators.
fn percent_opener(rest: &str, word_start: bool) -> Option<(WordKind, char, usize)> {
    let mut chars = rest.chars();
    if chars.next() != Some('%') {
        return None;
    }
    match chars.next()? {
        flavor @ ('q' | 'Q') => {
            let open = chars.next()?;
            if !open.is_ascii_punctuation() {
                return None;
            }
            let kind = if flavor == 'q' {
                WordKind::Quoted
            } else {
                WordKind::DoubleQuoted
            };
            Some((kind, open, 3))
        }
        open @ ('!' | '(' | '[' | '{' | '<') => Some((WordKind::DoubleQuoted, open, 2)),
        open if word_start && bare_delimiter(open) => Some((WordKind::DoubleQuoted, open, 2)),
        _ => None,
    }
}

fn bare_delimiter(ch: char) -> bool {
    ch.is_ascii_punctuation() && !matches!(ch, '%' | '+' | '-' | ';' | '&' | '|' | '>')
}

fn closing_delimiter(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        '<' => '>',
        other => other,
    }
}

enum ScanMode {
    Normal,
    Single,
    Double,
}

/// Scans the body of `$(...)` just after the opening parenthesis.
///
/// Returns the inner text and the number of bytes consumed including the
/// closing parenthesis, or `None` when the input ends first.
fn scan_substitution(chars: &mut Peekable<CharIndices<'_>>) -> ShellResult<Option<(String, usize)>> {
    let mut inner = String::new();
    let mut depth = 1usize;
    let mut mode = ScanMode::Normal;

    while let Some((index, ch)) = chars.next() {
        match mode {
            ScanMode::Normal => match ch {
                '\\' => {
                    inner.push('\\');
                    if let Some((_, next)) = chars.next() {
                        inner.push(next);
                    }
                }
                '\'' => {
                    mode = ScanMode::Single;
                    inner.push(ch);
                }
                '"' => {
                    mode = ScanMode::Double;
                    inner.push(ch);
                }
                '$' if matches!(chars.peek(), Some((_, '('))) => {
                    chars.next();
                    depth += 1;
                    if depth > MAX_SUBST_DEPTH {
                        return Err(ShellError::new(
                            ErrorKind::Syntax,
                            format!(
                                "command substitution nesting exceeds limit of {}",
                                MAX_SUBST_DEPTH
                            ),
                        ));
                    }
                    inner.push_str("$(");
                }
                '(' => {
                    depth += 1;
                    inner.push(ch);
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Some((inner, index + 1)));
                    }
                    inner.push(ch);
                }
                _ => inner.push(ch),
            },
            ScanMode::Single => {
                if ch == '\'' {
                    mode = ScanMode::Normal;
                }
                inner.push(ch);
            }
            ScanMode::Double => {
                match ch {
                    '"' => mode = ScanMode::Normal,
                    '\\' => {
                        inner.push('\\');
                        if let Some((_, next)) = chars.next() {
                            inner.push(next);
                        }
                        continue;
                    }
                    _ => {}
                }
                inner.push(ch);
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    fn word(kind: WordKind, text: &str) -> TokenKind {
        TokenKind::Word(Word::new(kind, text))
    }

    fn sep() -> TokenKind {
        TokenKind::Word(Word::separator())
    }

    #[test]
    fn words_and_separators() {
        assert_eq!(
            kinds("ls  -la /tmp"),
            vec![
                word(WordKind::Normal, "ls"),
                sep(),
                word(WordKind::Normal, "-la"),
                sep(),
                word(WordKind::Normal, "/tmp"),
            ]
        );
    }

    #[test]
    fn adjacent_segments_share_a_field() {
        assert_eq!(
            kinds("a\"b\"'c'"),
            vec![
                word(WordKind::Normal, "a"),
                word(WordKind::DoubleQuoted, "b"),
                word(WordKind::Quoted, "c"),
            ]
        );
    }

    #[test]
    fn operators_take_longest_match() {
        assert_eq!(
            kinds("a &>> f"),
            vec![
                word(WordKind::Normal, "a"),
                sep(),
                TokenKind::AndDGreat,
                word(WordKind::Normal, "f"),
            ]
        );
        assert_eq!(
            kinds("a|&b||c"),
            vec![
                word(WordKind::Normal, "a"),
                TokenKind::PipeAnd,
                word(WordKind::Normal, "b"),
                TokenKind::OrIf,
                word(WordKind::Normal, "c"),
            ]
        );
    }

    #[test]
    fn numbers_only_next_to_redirections() {
        assert_eq!(
            kinds("echo 2>&1"),
            vec![
                word(WordKind::Normal, "echo"),
                sep(),
                TokenKind::Number(2),
                TokenKind::GreatAnd,
                TokenKind::Number(1),
            ]
        );
        assert_eq!(
            kinds("echo 2 >x"),
            vec![
                word(WordKind::Normal, "echo"),
                sep(),
                word(WordKind::Normal, "2"),
                sep(),
                TokenKind::Great,
                word(WordKind::Normal, "x"),
            ]
        );
        assert_eq!(
            kinds("3<&-"),
            vec![TokenKind::Number(3), TokenKind::LessAnd, TokenKind::Minus]
        );
    }

    #[test]
    fn keywords_only_at_statement_start() {
        let tokens = kinds("if echo then; then echo fi; fi");
        assert_eq!(tokens[0], TokenKind::Keyword(Keyword::If));
        assert_eq!(tokens[3], word(WordKind::Normal, "then"));
        assert_eq!(tokens[5], TokenKind::Keyword(Keyword::Then));
        assert_eq!(tokens[8], word(WordKind::Normal, "fi"));
        assert_eq!(tokens.last(), Some(&TokenKind::Keyword(Keyword::Fi)));
    }

    #[test]
    fn closing_words_are_plain_outside_compounds() {
        assert_eq!(
            kinds("end; done"),
            vec![
                word(WordKind::Normal, "end"),
                TokenKind::Semi,
                word(WordKind::Normal, "done"),
            ]
        );
    }

    #[test]
    fn for_header_recognizes_in_and_brace() {
        let tokens = kinds("for in in a b { echo $in; }");
        assert_eq!(tokens[0], TokenKind::Keyword(Keyword::For));
        assert_eq!(tokens[1], word(WordKind::Normal, "in"));
        assert_eq!(tokens[3], TokenKind::Keyword(Keyword::In));
        assert!(tokens.contains(&TokenKind::Keyword(Keyword::LBrace)));
        assert_eq!(tokens.last(), Some(&TokenKind::Keyword(Keyword::RBrace)));
    }

    #[test]
    fn percent_literals() {
        assert_eq!(kinds("%q(a b)"), vec![word(WordKind::Quoted, "a b")]);
        assert_eq!(kinds("%Q[$x]"), vec![word(WordKind::DoubleQuoted, "$x")]);
        assert_eq!(kinds("%!a\\!b!"), vec![word(WordKind::DoubleQuoted, "a!b")]);
        assert_eq!(kinds("100%"), vec![word(WordKind::Normal, "100%")]);
    }

    #[test]
    fn bare_percent_takes_any_punctuation_at_word_start() {
        assert_eq!(kinds("%|a b|"), vec![word(WordKind::DoubleQuoted, "a b")]);
        assert_eq!(kinds("%/x\\/y/"), vec![word(WordKind::DoubleQuoted, "x/y")]);
        assert_eq!(kinds("%^$v^"), vec![word(WordKind::DoubleQuoted, "$v")]);
        assert_eq!(kinds("50%/"), vec![word(WordKind::Normal, "50%/")]);
        assert_eq!(kinds("%+"), vec![word(WordKind::Normal, "%+")]);
        assert_eq!(kinds("%%"), vec![word(WordKind::Normal, "%%")]);
        assert_eq!(kinds("%-"), vec![word(WordKind::Normal, "%-")]);
    }

    #[test]
    fn substitutions() {
        assert_eq!(
            kinds("echo `date`"),
            vec![
                word(WordKind::Normal, "echo"),
                sep(),
                word(WordKind::Substituted, "date"),
            ]
        );
        assert_eq!(
            kinds("x$(echo $(echo ')'))y"),
            vec![
                word(WordKind::Normal, "x"),
                word(WordKind::Substituted, "echo $(echo ')')"),
                word(WordKind::Normal, "y"),
            ]
        );
    }

    #[test]
    fn escapes() {
        assert_eq!(kinds("a\\ b"), vec![word(WordKind::Normal, "a b")]);
        assert_eq!(kinds("\\$HOME"), vec![word(WordKind::Normal, "\\$HOME")]);
        assert_eq!(kinds("\"a\\\"b\\n\""), vec![word(WordKind::DoubleQuoted, "a\"b\\n")]);
        assert_eq!(kinds("'it\\'s'"), vec![word(WordKind::Quoted, "it's")]);
    }

    #[test]
    fn comments_and_newlines() {
        assert_eq!(
            kinds("a # note\n\n b#c"),
            vec![
                word(WordKind::Normal, "a"),
                sep(),
                TokenKind::Newline,
                word(WordKind::Normal, "b#c"),
            ]
        );
    }

    #[test]
    fn unterminated_input_is_incomplete() {
        for input in ["'abc", "\"abc", "`abc", "$(abc", "%q(abc", "abc\\"] {
            let err = tokenize(input).unwrap_err();
            assert!(err.is_incomplete(), "{input}");
            assert_eq!(err.kind, ErrorKind::Syntax);
        }
    }

    #[test]
    fn substitution_nesting_limit() {
        let mut input = String::new();
        for _ in 0..=MAX_SUBST_DEPTH {
            input.push_str("$(");
        }
        input.push('x');
        for _ in 0..=MAX_SUBST_DEPTH {
            input.push(')');
        }
        let err = tokenize(&input).unwrap_err();
        assert!(!err.is_incomplete());
        assert!(err.message.contains("nesting"));
    }

    proptest! {
        #[test]
        fn lexing_never_panics(input in "[ a-z0-9;&|<>'\"`$(){}%#\\\\\n-]{0,40}") {
            let _ = tokenize(&input);
        }

        #[test]
        fn plain_words_round_trip(words in proptest::collection::vec("[a-z][a-z0-9_./-]{0,8}", 1..6)) {
            prop_assume!(words.iter().all(|w| Keyword::lookup(w).is_none()));
            let input = words.join(" ");
            let tokens = tokenize(&input).unwrap();
            let texts: Vec<String> = tokens
                .into_iter()
                .filter_map(|token| match token.kind {
                    TokenKind::Word(word) if !word.is_separator() => Some(word.text),
                    _ => None,
                })
                .collect();
            prop_assert_eq!(texts, words);
        }
    }
}
