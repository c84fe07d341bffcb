use std::io::{self, Write};

use crate::execution::ExitStatus;

use super::builtin_error;

/// `echo [-neEs] args...`. Leading arguments made only of option letters
/// are options; anything else starts the text.
pub(crate) fn echo(args: &[String]) -> ExitStatus {
    let mut newline = true;
    let mut escapes = false;
    let mut separator = " ";
    let mut rest = args;
    while let Some((first, tail)) = rest.split_first() {
        let Some(flags) = first.strip_prefix('-') else {
            break;
        };
        if flags.is_empty() || !flags.chars().all(|c| "neEs".contains(c)) {
            break;
        }
        for flag in flags.chars() {
            match flag {
                'n' => newline = false,
                'e' => escapes = true,
                'E' => escapes = false,
                _ => separator = "",
            }
        }
        rest = tail;
    }
    let mut text = rest.join(separator);
    if escapes {
        text = unescape(&text);
    }
    if newline {
        text.push('\n');
    }
    write_out("echo", &text)
}

/// `puts args...`: one line per argument, escapes interpreted.
pub(crate) fn puts(args: &[String]) -> ExitStatus {
    let mut text = String::new();
    for arg in args {
        let line = unescape(arg);
        text.push_str(&line);
        if !line.ends_with('\n') {
            text.push('\n');
        }
    }
    if args.is_empty() {
        text.push('\n');
    }
    write_out("puts", &text)
}

fn write_out(name: &str, text: &str) -> ExitStatus {
    let mut stdout = io::stdout().lock();
    match stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()) {
        Ok(()) => ExitStatus::SUCCESS,
        Err(err) => builtin_error(name, format!("write error: {err}")),
    }
}

/// Interprets backslash escapes: `\NNN` octal, `\xHH`, `\uHHHH`,
/// `\UHHHHHHHH`, `\u{H H ...}` and the single-letter forms.
fn unescape(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '\\' || i + 1 == chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let next = chars[i + 1];
        let consumed = match next {
            '0'..='7' => octal(&chars[i + 1..], &mut out),
            'x' => hex_digits(&chars[i + 2..], 2, 2, &mut out).map(|n| n + 1),
            'u' if chars.get(i + 2) == Some(&'{') => braced_codepoints(&chars[i + 3..], &mut out)
                .map(|n| n + 2),
            'u' => hex_digits(&chars[i + 2..], 1, 4, &mut out).map(|n| n + 1),
            'U' => hex_digits(&chars[i + 2..], 1, 8, &mut out).map(|n| n + 1),
            _ => None,
        };
        match consumed {
            Some(count) => i += 1 + count,
            None => {
                out.push(single_escape(next));
                i += 2;
            }
        }
    }
    out
}

fn single_escape(c: char) -> char {
    match c {
        't' => '\t',
        'v' => '\u{0b}',
        'n' => '\n',
        'r' => '\r',
        'f' => '\u{0c}',
        'b' => '\u{08}',
        'a' => '\u{07}',
        'e' => '\u{1b}',
        's' => ' ',
        other => other,
    }
}

/// Exactly three octal digits.
fn octal(chars: &[char], out: &mut String) -> Option<usize> {
    let digits = chars.get(..3)?;
    if !digits.iter().all(|c| c.is_digit(8)) {
        return None;
    }
    let value = digits.iter().fold(0u32, |acc, c| acc * 8 + c.to_digit(8).unwrap_or(0));
    out.push(char::from_u32(value)?);
    Some(3)
}

fn hex_digits(chars: &[char], min: usize, max: usize, out: &mut String) -> Option<usize> {
    let count = chars
        .iter()
        .take(max)
        .take_while(|c| c.is_ascii_hexdigit())
        .count();
    if count < min {
        return None;
    }
    let digits: String = chars[..count].iter().collect();
    let value = u32::from_str_radix(&digits, 16).ok()?;
    out.push(char::from_u32(value)?);
    Some(count)
}

/// `H H ...}` after `\u{`; returns the characters consumed including `}`.
fn braced_codepoints(chars: &[char], out: &mut String) -> Option<usize> {
    let end = chars.iter().position(|c| *c == '}')?;
    let body: String = chars[..end].iter().collect();
    if body.trim().is_empty() {
        return None;
    }
    let mut decoded = String::new();
    for piece in body.split(' ').filter(|piece| !piece.is_empty()) {
        let value = u32::from_str_radix(piece, 16).ok()?;
        decoded.push(char::from_u32(value)?);
    }
    out.push_str(&decoded);
    Some(end + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_letter_escapes() {
        assert_eq!(unescape(r"a\tb\nc\sd\qe"), "a\tb\nc dqe");
        assert_eq!(unescape(r"\\"), "\\");
        assert_eq!(unescape("trailing\\"), "trailing\\");
    }

    #[test]
    fn numeric_escapes() {
        assert_eq!(unescape(r"\101\x42C\U00000044"), "ABCD");
        assert_eq!(unescape(r"\u{48 49}!"), "HI!");
        assert_eq!(unescape(r"\u3042"), "\u{3042}");
    }

    #[test]
    fn malformed_numeric_escapes_fall_back() {
        assert_eq!(unescape(r"\xZZ"), "xZZ");
        assert_eq!(unescape(r"\18"), "18");
        assert_eq!(unescape(r"\u{}"), "u{}");
    }
}
