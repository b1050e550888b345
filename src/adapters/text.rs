/// Collapses runs of whitespace to a single space and trims both ends, leaving
/// quoted sections untouched. With `backslash_escapes` a `\` escapes the next
/// character inside quotes (CSS); without it quotes close on the first match
/// (HTML attributes).
pub fn collapse_whitespace(input: &str, backslash_escapes: bool) -> String {
    let mut out = String::with_capacity(input.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut pending_space = false;

    for ch in input.chars() {
        if let Some(q) = quote {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if backslash_escapes && ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        if ch == '"' || ch == '\'' {
            quote = Some(ch);
        }
        out.push(ch);
    }
    out
}

/// Collapses whitespace in free text where quotes carry no meaning.
pub fn collapse_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace_respects_quotes() {
        assert_eq!(
            collapse_whitespace("  a   b  \"x   y\"\n c ", false),
            "a b \"x   y\" c"
        );
    }

    #[test]
    fn test_collapse_whitespace_escapes() {
        assert_eq!(
            collapse_whitespace(r#"content:   "a\"   b"   x"#, true),
            r#"content: "a\"   b" x"#
        );
    }

    #[test]
    fn test_collapse_text() {
        assert_eq!(collapse_text(" don't \n\t  panic "), "don't panic");
    }
}
