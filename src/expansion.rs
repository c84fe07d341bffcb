//! Word expansion turns a `WordList` into argument strings.
//!
//! Variables expand inside normal and double-quoted words, single-quoted
//! words are taken verbatim, and only command substitution output is split
//! on IFS. Expansion never re-splits variable values.
use crate::error::ShellResult;
use crate::parse::{Word, WordKind, WordList};

pub const DEFAULT_IFS: &str = " \t\n";

type LookupVar<'a> = Box<dyn Fn(&str) -> Option<String> + 'a>;
type CommandSubst<'a> = Box<dyn Fn(&str) -> ShellResult<String> + 'a>;

pub struct ExpansionContext<'a> {
    pub lookup_var: LookupVar<'a>,
    /// Runs the text as a program and returns its output, minus one trailing newline
    pub command_subst: CommandSubst<'a>,
    pub last_status: i32,
}

impl ExpansionContext<'_> {
    fn ifs(&self) -> String {
        (self.lookup_var)("IFS").unwrap_or_else(|| DEFAULT_IFS.to_string())
    }
}

/// Expands `$NAME`, `${NAME}` and `$?` and removes the `\$` and `\\` escapes.
pub fn expand_text(text: &str, ctx: &ExpansionContext<'_>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.peek() {
                Some(&next @ ('$' | '\\')) => {
                    chars.next();
                    out.push(next);
                }
                _ => out.push('\\'),
            },
            '$' => match chars.peek().copied() {
                Some('?') => {
                    chars.next();
                    out.push_str(&ctx.last_status.to_string());
                }
                Some('{') => {
                    let rest: String = chars.clone().skip(1).collect();
                    match rest.find('}') {
                        Some(end) if end > 0 && rest[..end].chars().all(is_name_char) => {
                            let name = &rest[..end];
                            for _ in 0..end + 2 {
                                chars.next();
                            }
                            out.push_str(&(ctx.lookup_var)(name).unwrap_or_default());
                        }
                        _ => out.push('$'),
                    }
                }
                Some(c) if is_name_char(c) => {
                    let mut name = String::new();
                    while let Some(&c) = chars.peek() {
                        if !is_name_char(c) {
                            break;
                        }
                        name.push(c);
                        chars.next();
                    }
                    out.push_str(&(ctx.lookup_var)(&name).unwrap_or_default());
                }
                _ => out.push('$'),
            },
            _ => out.push(ch),
        }
    }
    out
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Splits on IFS characters, dropping empty pieces.
pub fn split_fields(text: &str, ifs: &str) -> Vec<String> {
    text.split(|c: char| ifs.contains(c))
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolves a word list into the final argument strings.
pub fn expand_words(list: &WordList, ctx: &ExpansionContext<'_>) -> ShellResult<Vec<String>> {
    let mut fields = Vec::new();
    for group in list.fields() {
        expand_field(group, ctx, &mut fields)?;
    }
    Ok(fields)
}

/// Resolves a word list into one string, joining fields with a space.
pub fn expand_joined(list: &WordList, ctx: &ExpansionContext<'_>) -> ShellResult<String> {
    Ok(expand_words(list, ctx)?.join(" "))
}

fn expand_field(
    group: &[Word],
    ctx: &ExpansionContext<'_>,
    fields: &mut Vec<String>,
) -> ShellResult<()> {
    let mut current = String::new();
    // Quotes keep an empty field alive: `""` is one empty argument.
    let mut keep = false;
    for word in group {
        match word.kind {
            WordKind::Quoted => {
                current.push_str(&word.text);
                keep = true;
            }
            WordKind::DoubleQuoted => {
                current.push_str(&expand_text(&word.text, ctx));
                keep = true;
            }
            WordKind::Normal => current.push_str(&expand_text(&word.text, ctx)),
            WordKind::Substituted => {
                let output = (ctx.command_subst)(&word.text)?;
                let ifs = ctx.ifs();
                let is_ifs = |ch: char| ifs.contains(ch);
                // Separators at either edge of the output end the field around it.
                let mut boundary = output.starts_with(is_ifs);
                for piece in split_fields(&output, &ifs) {
                    if boundary && (keep || !current.is_empty()) {
                        fields.push(std::mem::take(&mut current));
                        keep = false;
                    }
                    current.push_str(&piece);
                    boundary = true;
                }
                if output.ends_with(is_ifs) && (keep || !current.is_empty()) {
                    fields.push(std::mem::take(&mut current));
                    keep = false;
                }
            }
            WordKind::Separator => {}
        }
    }
    if keep || !current.is_empty() {
        fields.push(current);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ShellError};
    use crate::parse::{Node, parse};

    fn ctx() -> ExpansionContext<'static> {
        ExpansionContext {
            lookup_var: Box::new(|name| match name {
                "HOME" => Some("/home/user".to_string()),
                "X" => Some("a b".to_string()),
                "EMPTY" => Some(String::new()),
                _ => None,
            }),
            command_subst: Box::new(|text| match text {
                "words" => Ok("one two\nthree\n".trim_end_matches('\n').to_string()),
                "padded" => Ok(" x".to_string()),
                "trailing" => Ok("y ".to_string()),
                "blank" => Ok("  ".to_string()),
                "fail" => Err(ShellError::new(ErrorKind::ChildSignaled, "interrupted")),
                other => Ok(other.to_string()),
            }),
            last_status: 3,
        }
    }

    fn expand(input: &str) -> Vec<String> {
        let Some(Node::Command(cmd)) = parse(input).unwrap() else {
            panic!("expected a simple command")
        };
        expand_words(&cmd.words, &ctx()).unwrap()
    }

    #[test]
    fn variables_expand_without_splitting() {
        assert_eq!(expand("echo $X ${HOME}/bin $?"), vec!["echo", "a b", "/home/user/bin", "3"]);
    }

    #[test]
    fn unset_and_empty_variables_vanish_unless_quoted() {
        assert_eq!(expand("echo $NOPE $EMPTY x"), vec!["echo", "x"]);
        assert_eq!(expand("echo \"$NOPE\" ''"), vec!["echo", "", ""]);
    }

    #[test]
    fn single_quotes_are_verbatim() {
        assert_eq!(expand("echo '$HOME' %q($HOME)"), vec!["echo", "$HOME", "$HOME"]);
        assert_eq!(expand("echo \"$HOME\" %Q($HOME)"), vec!["echo", "/home/user", "/home/user"]);
    }

    #[test]
    fn escaped_dollar_is_literal() {
        assert_eq!(expand("echo \\$HOME \"\\$X\" a\\\\b"), vec!["echo", "$HOME", "$X", "a\\b"]);
    }

    #[test]
    fn substitution_output_is_split() {
        assert_eq!(expand("echo `words`"), vec!["echo", "one", "two", "three"]);
        assert_eq!(expand("echo pre$(words)post"), vec!["echo", "preone", "two", "threepost"]);
    }

    #[test]
    fn separators_at_substitution_edges_split_neighbours() {
        assert_eq!(expand("echo a$(padded)"), vec!["echo", "a", "x"]);
        assert_eq!(expand("echo $(trailing)b"), vec!["echo", "y", "b"]);
        assert_eq!(expand("echo a$(blank)b"), vec!["echo", "a", "b"]);
        assert_eq!(expand("echo 'q'$(padded)"), vec!["echo", "q", "x"]);
        assert_eq!(expand("echo $(padded)"), vec!["echo", "x"]);
    }

    #[test]
    fn dollar_without_name_is_literal() {
        assert_eq!(expand("echo $ a$ ${"), vec!["echo", "$", "a$", "${"]);
    }

    #[test]
    fn substitution_errors_propagate() {
        let Some(Node::Command(cmd)) = parse("echo $(fail)").unwrap() else {
            panic!("expected a simple command")
        };
        let err = expand_words(&cmd.words, &ctx()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ChildSignaled);
    }

    #[test]
    fn split_fields_drops_empty_pieces() {
        assert_eq!(split_fields("  a\t\tb \n", DEFAULT_IFS), vec!["a", "b"]);
        assert_eq!(split_fields("a:b::c", ":"), vec!["a", "b", "c"]);
        assert!(split_fields("", DEFAULT_IFS).is_empty());
    }

    #[test]
    fn joined_expansion() {
        let Some(Node::Command(cmd)) = parse("X=`words`").unwrap() else {
            panic!("expected a simple command")
        };
        assert_eq!(expand_joined(&cmd.assignments[0].value, &ctx()).unwrap(), "one two three");
    }
}
