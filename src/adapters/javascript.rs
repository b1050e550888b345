//! Style-only formatter for JavaScript-like source.
//!
//! The source is split into tokens and printed back with normalized spacing
//! and brace-driven indentation. Nothing is parsed into a tree, so loose or
//! partial input formats just as well as valid programs. String, template,
//! regex and comment tokens are copied byte for byte.

use crate::domain::model::FormatOptions;
use crate::utils::error::TransformError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Word,
    Number,
    Str,
    Template,
    Regex,
    LineComment,
    BlockComment,
    Punct,
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    kind: Kind,
    text: &'a str,
    /// Line breaks in the whitespace before this token.
    newlines_before: usize,
}

impl Token<'_> {
    fn is(&self, punct: &str) -> bool {
        self.kind == Kind::Punct && self.text == punct
    }

    fn is_any(&self, puncts: &[&str]) -> bool {
        self.kind == Kind::Punct && puncts.contains(&self.text)
    }

    fn is_comment(&self) -> bool {
        matches!(self.kind, Kind::LineComment | Kind::BlockComment)
    }

    fn is_keyword(&self, words: &[&str]) -> bool {
        self.kind == Kind::Word && words.contains(&self.text)
    }
}

/// Multi-character punctuators, longest first.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>",
];

/// Keywords after which an expression starts.
const EXPRESSION_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

/// Keywords separated from a following `(` by a space.
const PAREN_KEYWORDS: &[&str] = &["if", "for", "while", "switch", "catch", "with"];

/// Tokens that may follow `}` on the same line.
const AFTER_BRACE: &[&str] = &[
    ")", "]", ",", ";", ".", "?.", "(", "[", ":", "?", "=", "||", "&&", "??",
];
const AFTER_BRACE_WORDS: &[&str] = &["else", "catch", "finally", "while", "as", "from"];

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

fn line_end(text: &str, pos: usize) -> usize {
    text[pos..].find('\n').map_or(text.len(), |idx| pos + idx)
}

/// End of a quoted string. An unterminated string stops at the line break.
fn string_end(text: &str, pos: usize, quote: u8) -> usize {
    let bytes = text.as_bytes();
    let mut i = pos + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn template_end(text: &str, pos: usize) -> usize {
    let bytes = text.as_bytes();
    let mut i = pos + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return i + 1,
            b'$' if bytes.get(i + 1) == Some(&b'{') => i = substitution_end(text, i + 2),
            _ => i += 1,
        }
    }
    bytes.len()
}

/// End of a `${ ... }` substitution, `pos` pointing just past the `{`.
fn substitution_end(text: &str, pos: usize) -> usize {
    let bytes = text.as_bytes();
    let mut depth = 1;
    let mut i = pos;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            q @ (b'"' | b'\'') => {
                i = string_end(text, i, q);
                continue;
            }
            b'`' => {
                i = template_end(text, i);
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// End of a regex literal including flags, or `None` if the line ends first.
fn regex_end(text: &str, pos: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut in_class = false;
    let mut i = pos + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'\n' => return None,
            b'[' => in_class = true,
            b']' => in_class = false,
            b'/' if !in_class => {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }
                return Some(i);
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn number_end(text: &str, pos: usize) -> usize {
    let bytes = text.as_bytes();
    let radix_prefixed = bytes[pos] == b'0'
        && bytes
            .get(pos + 1)
            .is_some_and(|b| matches!(b, b'x' | b'X' | b'b' | b'B' | b'o' | b'O'));
    let mut seen_dot = false;
    let mut seen_exponent = false;
    let mut i = pos;
    while i < bytes.len() {
        match bytes[i] {
            b'e' | b'E' if !radix_prefixed => {
                seen_exponent = true;
                i += 1;
                if matches!(bytes.get(i), Some(b'+' | b'-')) {
                    i += 1;
                }
            }
            b'.' if !seen_dot && !seen_exponent && !radix_prefixed => {
                seen_dot = true;
                i += 1;
            }
            b if b.is_ascii_alphanumeric() || b == b'_' => i += 1,
            _ => break,
        }
    }
    i
}

fn punct_end(text: &str, pos: usize) -> usize {
    let rest = &text[pos..];
    for punct in PUNCTUATORS {
        if rest.starts_with(punct) {
            // `a?.5:1` is a conditional, not optional chaining
            if *punct == "?." && rest[2..].starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            return pos + punct.len();
        }
    }
    pos + rest.chars().next().map_or(1, char::len_utf8)
}

/// A `/` starts a regex when no operand precedes it.
fn regex_allowed(previous: Option<&Token<'_>>) -> bool {
    match previous {
        None => true,
        Some(token) => match token.kind {
            Kind::Punct => !token.is_any(&[")", "]", "}"]),
            Kind::Word => token.is_keyword(EXPRESSION_KEYWORDS),
            _ => false,
        },
    }
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens: Vec<Token<'_>> = Vec::new();
    let mut newlines = 0;
    let mut pos = 0;

    if text.starts_with("#!") {
        pos = line_end(text, 0);
        tokens.push(Token {
            kind: Kind::LineComment,
            text: text[..pos].trim_end(),
            newlines_before: 0,
        });
    }

    while let Some(ch) = text[pos..].chars().next() {
        if ch.is_whitespace() {
            if ch == '\n' {
                newlines += 1;
            }
            pos += ch.len_utf8();
            continue;
        }

        let rest = &text[pos..];
        let next_is_digit = rest[ch.len_utf8()..].starts_with(|c: char| c.is_ascii_digit());
        let (kind, end) = if rest.starts_with("//") {
            (Kind::LineComment, line_end(text, pos))
        } else if rest.starts_with("/*") {
            let end = rest[2..].find("*/").map_or(text.len(), |idx| pos + 2 + idx + 2);
            (Kind::BlockComment, end)
        } else if ch == '"' || ch == '\'' {
            (Kind::Str, string_end(text, pos, ch as u8))
        } else if ch == '`' {
            (Kind::Template, template_end(text, pos))
        } else if ch == '/' && regex_allowed(tokens.iter().rev().find(|t| !t.is_comment())) {
            match regex_end(text, pos) {
                Some(end) => (Kind::Regex, end),
                None => (Kind::Punct, punct_end(text, pos)),
            }
        } else if ch.is_ascii_digit() || (ch == '.' && next_is_digit) {
            (Kind::Number, number_end(text, pos))
        } else if is_ident_start(ch) {
            let len = rest
                .char_indices()
                .find(|(_, c)| !is_ident_char(*c))
                .map_or(rest.len(), |(idx, _)| idx);
            (Kind::Word, pos + len)
        } else {
            (Kind::Punct, punct_end(text, pos))
        };

        let mut slice = &text[pos..end];
        if kind == Kind::LineComment {
            slice = slice.trim_end();
        }
        tokens.push(Token {
            kind,
            text: slice,
            newlines_before: newlines,
        });
        newlines = 0;
        pos = end;
    }

    tokens
}

struct Open {
    /// Indent of the line the bracket was opened on.
    outer: usize,
    ch: char,
    ternaries: usize,
}

struct Printer<'a> {
    unit: String,
    lines: Vec<String>,
    line: String,
    line_indent: usize,
    stack: Vec<Open>,
    root_ternaries: usize,
    previous: Option<Token<'a>>,
    /// Last non-comment token.
    operand: Option<Token<'a>>,
    previous_tight: bool,
    in_case_label: bool,
    after_case_colon: bool,
}

impl<'a> Printer<'a> {
    fn new(options: &FormatOptions) -> Self {
        Self {
            unit: options.indent_unit(),
            lines: Vec::new(),
            line: String::new(),
            line_indent: 0,
            stack: Vec::new(),
            root_ternaries: 0,
            previous: None,
            operand: None,
            previous_tight: false,
            in_case_label: false,
            after_case_colon: false,
        }
    }

    fn innermost(&self) -> Option<char> {
        self.stack.last().map(|open| open.ch)
    }

    fn ternaries(&mut self) -> &mut usize {
        match self.stack.last_mut() {
            Some(open) => &mut open.ternaries,
            None => &mut self.root_ternaries,
        }
    }

    /// True when the operand before the current token ends an expression, so
    /// `+`/`-` are binary and `++`/`--` are postfix.
    fn follows_operand(&self) -> bool {
        match &self.operand {
            None => false,
            Some(token) => match token.kind {
                Kind::Word => !token.is_keyword(EXPRESSION_KEYWORDS),
                Kind::Punct => token.is_any(&[")", "]", "}"]),
                _ => true,
            },
        }
    }

    fn forced_newline(&self, token: &Token<'_>) -> usize {
        let Some(previous) = &self.previous else {
            return 0;
        };
        let forced = if previous.kind == Kind::LineComment {
            true
        } else if token.is_comment() && token.newlines_before == 0 {
            // trailing comments stay on their line
            false
        } else if previous.is("{") {
            !token.is("}")
        } else if token.is("}") || self.after_case_colon {
            true
        } else if previous.is(";") {
            self.innermost() != Some('(')
        } else if previous.is(",") {
            self.innermost() == Some('{')
        } else if previous.is("}") {
            !(token.is_any(AFTER_BRACE) || token.is_keyword(AFTER_BRACE_WORDS))
        } else {
            false
        };
        usize::from(forced)
    }

    fn space_before(&self, token: &Token<'_>, ternary_colon: bool) -> bool {
        let Some(previous) = &self.previous else {
            return false;
        };
        if self.previous_tight {
            return must_separate(previous, token);
        }
        if token.is_comment() || previous.kind == Kind::BlockComment {
            return true;
        }

        let spaced = match token.kind {
            Kind::Punct => match token.text {
                ")" | "]" | "," | ";" | "." | "?." => false,
                ":" => ternary_colon,
                "}" => !previous.is("{"),
                "(" => match previous.kind {
                    Kind::Word => {
                        previous.is_keyword(PAREN_KEYWORDS)
                            || previous.is_keyword(EXPRESSION_KEYWORDS)
                    }
                    Kind::Punct => !previous.is_any(&[")", "]"]),
                    _ => false,
                },
                "[" => match previous.kind {
                    Kind::Word => previous.is_keyword(EXPRESSION_KEYWORDS),
                    Kind::Punct => !previous.is_any(&[")", "]"]),
                    _ => false,
                },
                "++" | "--" => !self.follows_operand(),
                _ => true,
            },
            Kind::Template => {
                !(previous.kind == Kind::Word && !previous.is_keyword(EXPRESSION_KEYWORDS))
            }
            _ => true,
        };
        spaced || must_separate(previous, token)
    }

    fn break_line(&mut self, newlines: usize, token: &Token<'_>) {
        let finished = std::mem::take(&mut self.line);
        self.lines.push(finished.trim_end().to_string());
        for _ in 1..newlines {
            self.lines.push(String::new());
        }

        let closing = token.is_any(&[")", "]", "}"]);
        self.line_indent = match self.stack.last() {
            Some(open) if closing => open.outer,
            Some(open) => open.outer + 1,
            None => 0,
        };
        self.line = self.unit.repeat(self.line_indent);
    }

    fn push(&mut self, token: Token<'a>) {
        let ternary_colon = token.is(":") && *self.ternaries() > 0;
        let case_colon = token.is(":") && !ternary_colon && self.in_case_label;

        let newlines = if self.previous.is_none() {
            0
        } else {
            self.forced_newline(&token).max(token.newlines_before.min(2))
        };
        if newlines > 0 {
            self.break_line(newlines, &token);
        } else if self.space_before(&token, ternary_colon) {
            self.line.push(' ');
        }
        self.line.push_str(token.text);

        let tight = match token.kind {
            Kind::Punct => match token.text {
                "(" | "[" | "." | "?." | "..." | "!" | "~" | "#" | "@" => true,
                "+" | "-" | "++" | "--" => !self.follows_operand(),
                _ => false,
            },
            _ => false,
        };

        self.after_case_colon = case_colon;
        if token.is_keyword(&["case", "default"]) {
            self.in_case_label = true;
        }

        if token.kind == Kind::Punct {
            match token.text {
                "(" | "[" | "{" => {
                    if token.is("{") {
                        self.in_case_label = false;
                    }
                    self.stack.push(Open {
                        outer: self.line_indent,
                        ch: token.text.chars().next().unwrap_or('{'),
                        ternaries: 0,
                    });
                }
                ")" | "]" | "}" => {
                    self.stack.pop();
                }
                "?" => *self.ternaries() += 1,
                ":" if ternary_colon => *self.ternaries() -= 1,
                ":" if case_colon => self.in_case_label = false,
                ";" => self.in_case_label = false,
                _ => {}
            }
        }

        self.previous_tight = tight;
        if !token.is_comment() {
            self.operand = Some(token);
        }
        self.previous = Some(token);
    }

    fn finish(mut self) -> String {
        if self.previous.is_some() {
            self.lines.push(self.line.trim_end().to_string());
        }
        self.lines.join("\n")
    }
}

/// True when printing two tokens side by side would lex differently.
fn must_separate(previous: &Token<'_>, token: &Token<'_>) -> bool {
    let (Some(last), Some(first)) = (previous.text.chars().last(), token.text.chars().next())
    else {
        return false;
    };
    if is_ident_char(last) && is_ident_char(first) {
        return true;
    }
    if previous.kind == Kind::Number && first == '.' {
        return !previous.text.contains(['.', 'e', 'E', 'x', 'X']);
    }
    if previous.kind == Kind::Punct && matches!(token.kind, Kind::Punct | Kind::Regex) {
        let joined = format!("{}{}", previous.text, first);
        return joined == "//"
            || joined == "/*"
            || PUNCTUATORS.iter().any(|punct| punct.starts_with(&joined));
    }
    false
}

/// Re-indents and re-spaces source without changing any token. Author line
/// breaks are kept, collapsing longer runs of blank lines to one.
pub fn format(text: &str, options: &FormatOptions) -> Result<String, TransformError> {
    let mut printer = Printer::new(options);
    for token in tokenize(text) {
        printer.push(token);
    }
    Ok(printer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(source: &str) -> String {
        format(source, &FormatOptions::default()).unwrap()
    }

    #[test]
    fn test_format_function_body() {
        assert_eq!(
            fmt("function add(a,b){return a+b;}"),
            "function add(a, b) {\n    return a + b;\n}"
        );
    }

    #[test]
    fn test_format_control_flow() {
        assert_eq!(
            fmt("if(x){a++}else{b--;c=[1,2]}"),
            "if (x) {\n    a++\n} else {\n    b--;\n    c = [1, 2]\n}"
        );
        assert_eq!(
            fmt("for(let i=0;i<n;i++){sum+=i}"),
            "for (let i = 0; i < n; i++) {\n    sum += i\n}"
        );
    }

    #[test]
    fn test_format_object_literal() {
        assert_eq!(
            format("const o={a:1,b:{c:2}};", &FormatOptions::with_indent(2)).unwrap(),
            "const o = {\n  a: 1,\n  b: {\n    c: 2\n  }\n};"
        );
    }

    #[test]
    fn test_format_keeps_comments_and_limits_blank_lines() {
        assert_eq!(
            fmt("const a = 1; // one\n\n\n\nlet b = 2;/* two */"),
            "const a = 1; // one\n\nlet b = 2; /* two */"
        );
    }

    #[test]
    fn test_format_preserves_literals() {
        assert_eq!(
            fmt("let t = tag`x  ${ y }`;x = /a b/g;s='q  \"r\"'"),
            "let t = tag`x  ${ y }`;\nx = /a b/g;\ns = 'q  \"r\"'"
        );
    }

    #[test]
    fn test_format_unary_operators() {
        assert_eq!(
            fmt("x = -1 + +y; return !a && typeof b;"),
            "x = -1 + +y;\nreturn !a && typeof b;"
        );
        assert_eq!(fmt("a - -b"), "a - -b");
        assert_eq!(fmt("a?.b?.[0]"), "a?.b?.[0]");
    }

    #[test]
    fn test_format_switch_and_ternary() {
        let formatted = fmt("switch(k){case 1:x=a?b:c;break;default:y()}");
        assert!(formatted.starts_with("switch (k) {\n"));
        assert!(formatted.contains("case 1:\n"));
        assert!(formatted.contains("x = a ? b : c;"));
        assert!(formatted.ends_with("y()\n}"));
    }

    #[test]
    fn test_format_never_fails_on_loose_input() {
        assert!(format("}}) foo( [ 'open", &FormatOptions::default()).is_ok());
        assert_eq!(fmt(""), "");
        assert_eq!(fmt("   \n  "), "");
    }

    #[test]
    fn test_format_is_idempotent() {
        let options = FormatOptions::default();
        let samples = [
            "function add(a,b){return a+b;}",
            "const o={a:1,b:{c:[1,2,{d:3}]}};foo({x},function(){bar()})",
            "#!/usr/bin/env node\nimport {a,b} from 'x'\n\n\n\nexport default a",
            "let r=a/b/c; let s=x.replace(/[/]+/g,'')\n// done",
            "promise.then(v=>{console.log(`v=${v}`)}).catch(e=>{throw e})",
            "}}) foo( [ 'open",
            "x = cond ? {a:1} : {b:2}; label: for(;;){break label}",
            "a = 1.5.toFixed(); b = 1 .toString(); c = .5e-3 + 0x1F",
        ];
        for sample in samples {
            let once = format(sample, &options).unwrap();
            assert_eq!(format(&once, &options).unwrap(), once, "sample: {sample}");
        }
    }
}
