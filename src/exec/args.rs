// src/exec/args.rs

//! Splitting the raw `args` string of a definition into argv entries.

/// Split a command-line style argument string.
///
/// - Unquoted whitespace separates arguments.
/// - `"..."` and `'...'` group text (quotes are removed); an empty pair
///   yields an empty argument.
/// - Inside double quotes, `\"` and `\\` are escapes.
/// - An unterminated quote runs to the end of the input.
pub fn split_args(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_arg = true;
                while let Some(c) = chars.next() {
                    match c {
                        '"' => break,
                        '\\' if matches!(chars.peek(), Some('"') | Some('\\')) => {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        }
                        other => current.push(other),
                    }
                }
            }
            '\'' => {
                in_arg = true;
                for c in chars.by_ref() {
                    if c == '\'' {
                        break;
                    }
                    current.push(c);
                }
            }
            c if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            other => {
                in_arg = true;
                current.push(other);
            }
        }
    }

    if in_arg {
        args.push(current);
    }
    args
}
