use regex::Regex;
use std::sync::LazyLock;

use crate::ConvertError;

/// How much generated text is quoted when no public class is found.
const EXCERPT_LEN: usize = 200;

static PUBLIC_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bpublic\s+(?:(?:final|abstract|strictfp)\s+)*class\s+([A-Za-z_$][A-Za-z0-9_$]*)",
    )
    .expect("public class pattern is valid")
});

/// Name of the single top-level `public class` in `java_code`.
///
/// Declarations inside braces (nested classes) are ignored; comments and
/// string literals are masked before scanning.
pub fn extract_public_class(java_code: &str) -> Result<String, ConvertError> {
    if java_code.trim().is_empty() {
        return Err(ConvertError::EmptyGeneration);
    }

    let masked = mask_comments_and_literals(java_code);
    let mut names = Vec::new();
    let mut depth: i64 = 0;
    let mut cursor = 0;

    for captures in PUBLIC_CLASS.captures_iter(&masked) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        depth += brace_delta(&masked[cursor..whole.start()]);
        cursor = whole.start();
        if depth <= 0 {
            if let Some(name) = captures.get(1) {
                names.push(name.as_str().to_string());
            }
        }
    }

    match names.len() {
        0 => Err(ConvertError::NoPublicClass {
            excerpt: java_code.chars().take(EXCERPT_LEN).collect(),
        }),
        1 => Ok(names.remove(0)),
        _ => Err(ConvertError::MultiplePublicClasses(names)),
    }
}

fn brace_delta(segment: &str) -> i64 {
    segment.chars().fold(0, |acc, c| match c {
        '{' => acc + 1,
        '}' => acc - 1,
        _ => acc,
    })
}

/// Replace comments, string, text-block and char literals with spaces.
/// Newlines are kept so the text stays line-aligned.
fn mask_comments_and_literals(code: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str,
        TextBlock,
        Char,
    }

    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len());
    let mut state = State::Code;
    let mut i = 0;

    let blank = |c: char| if c == '\n' { '\n' } else { ' ' };

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match state {
            State::Code => {
                if c == '/' && next == Some('/') {
                    state = State::LineComment;
                    out.push_str("  ");
                    i += 2;
                    continue;
                }
                if c == '/' && next == Some('*') {
                    state = State::BlockComment;
                    out.push_str("  ");
                    i += 2;
                    continue;
                }
                if c == '"' && next == Some('"') && chars.get(i + 2) == Some(&'"') {
                    state = State::TextBlock;
                    out.push_str("   ");
                    i += 3;
                    continue;
                }
                if c == '"' {
                    state = State::Str;
                } else if c == '\'' {
                    state = State::Char;
                }
                out.push(if state == State::Code { c } else { ' ' });
            }
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                }
                out.push(blank(c));
            }
            State::BlockComment => {
                if c == '*' && next == Some('/') {
                    state = State::Code;
                    out.push_str("  ");
                    i += 2;
                    continue;
                }
                out.push(blank(c));
            }
            State::TextBlock => {
                if c == '\\' {
                    out.push(' ');
                    if let Some(escaped) = next {
                        out.push(blank(escaped));
                    }
                    i += 2;
                    continue;
                }
                if c == '"' && next == Some('"') && chars.get(i + 2) == Some(&'"') {
                    state = State::Code;
                    out.push_str("   ");
                    i += 3;
                    continue;
                }
                out.push(blank(c));
            }
            State::Str | State::Char => {
                let quote = if state == State::Str { '"' } else { '\'' };
                if c == '\\' {
                    out.push(' ');
                    if let Some(escaped) = next {
                        out.push(blank(escaped));
                    }
                    i += 2;
                    continue;
                }
                // Unterminated literals end at the line break.
                if c == quote || c == '\n' {
                    state = State::Code;
                }
                out.push(blank(c));
            }
        }
        i += 1;
    }
    out
}
