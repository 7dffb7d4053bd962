//! Character-level tokenizer for `.bml` source.
//!
//! The tokenizer never fails. Characters that start no token are skipped and
//! grammar problems are left for the tree builder to report.
//!
//! The only non-obvious state is `colon_on_line`: the first `:` on a logical
//! line separates a property name from its value, every later `:` on that
//! line belongs to the value (`a ? b : c`, `{ x: 1 }`). A newline or a
//! statement-ending `;` clears it.

use std::fmt;

use serde::Serialize;

// ── Token ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    /// Uppercase-initial word: an element type, a base type, or a delegate target.
    Element(String),
    /// Property name, property value, or captured inline block.
    Expression(String),
    ScopeStart,
    ScopeEnd,
    Colon,
    /// `@` between a defined type name and its base type.
    IsA,
    Semicolon,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Element(name) => write!(f, "element type `{name}`"),
            TokenKind::Expression(text) => write!(f, "expression `{text}`"),
            TokenKind::ScopeStart => f.write_str("'{'"),
            TokenKind::ScopeEnd => f.write_str("'}'"),
            TokenKind::Colon => f.write_str("':'"),
            TokenKind::IsA => f.write_str("'@'"),
            TokenKind::Semicolon => f.write_str("';'"),
        }
    }
}

/// A token with the source position it started at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    #[serde(flatten)]
    pub kind: TokenKind,
    /// 1-based source line.
    pub line: usize,
    /// Remainder of the source line from the token start, for diagnostics.
    pub context: String,
}

// ── Tokenizer ─────────────────────────────────────────────────────────────

pub struct Tokenizer<'s> {
    src: &'s str,
    pos: usize,
    line: usize,
    colon_on_line: bool,
    tokens: Vec<Token>,
}

impl<'s> Tokenizer<'s> {
    pub fn new(src: &'s str) -> Self {
        Self { src, pos: 0, line: 1, colon_on_line: false, tokens: Vec::new() }
    }

    pub fn tokenize(mut self) -> Vec<Token> {
        while let Some(ch) = self.peek() {
            let start = self.pos;
            match ch {
                '\n' => {
                    self.advance();
                    self.newline();
                }
                '/' if self.rest().starts_with("//") => self.skip_line_comment(),
                '/' if self.rest().starts_with("/*") => self.skip_block_comment(),
                '{' if self.in_value_position() => self.lex_inline_block(start),
                '{' => {
                    self.advance();
                    self.push(TokenKind::ScopeStart, start, self.line);
                }
                '}' => {
                    self.advance();
                    self.colon_on_line = false;
                    self.push(TokenKind::ScopeEnd, start, self.line);
                }
                ':' => {
                    self.advance();
                    self.colon_on_line = true;
                    self.push(TokenKind::Colon, start, self.line);
                }
                '@' => {
                    self.advance();
                    self.push(TokenKind::IsA, start, self.line);
                }
                ';' => {
                    self.advance();
                    self.colon_on_line = false;
                    self.push(TokenKind::Semicolon, start, self.line);
                }
                c if c.is_whitespace() => {
                    self.advance();
                }
                c if c.is_ascii_uppercase() => {
                    if self.in_value_position() && !self.bare_word_ahead() {
                        self.lex_expression(start);
                    } else {
                        self.lex_element(start);
                    }
                }
                c if self.in_value_position() || starts_expression(c) => self.lex_expression(start),
                _ => {
                    log::trace!("line {}: skipping {:?}", self.line, ch);
                    self.advance();
                }
            }
        }
        log::debug!("tokenized {} lines into {} tokens", self.line, self.tokens.len());
        self.tokens
    }

    // ── cursor ────────────────────────────────────────────────────────────

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.rest().chars().next()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn newline(&mut self) {
        self.line += 1;
        self.colon_on_line = false;
    }

    /// A `:` was the last token, so whatever comes next is a property value.
    fn in_value_position(&self) -> bool {
        matches!(self.tokens.last(), Some(Token { kind: TokenKind::Colon, .. }))
    }

    fn push(&mut self, kind: TokenKind, start: usize, line: usize) {
        let rest = &self.src[start..];
        let end = rest.find('\n').unwrap_or(rest.len());
        let context = rest[..end].trim_end().to_string();
        log::trace!("line {line}: {kind}");
        self.tokens.push(Token { kind, line, context });
    }

    // ── comments ──────────────────────────────────────────────────────────

    fn skip_line_comment(&mut self) {
        while !matches!(self.peek(), None | Some('\n')) {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) {
        self.advance();
        self.advance();
        loop {
            if self.rest().starts_with("*/") {
                self.advance();
                self.advance();
                break;
            }
            match self.advance() {
                None => break,
                Some('\n') => self.newline(),
                Some(_) => {}
            }
        }
    }

    /// Skip a quoted string starting at the opening quote. Stops at the
    /// closing quote or, for an unterminated string, before the newline.
    fn skip_string(&mut self, quote: char) {
        self.advance();
        loop {
            match self.peek() {
                None | Some('\n') => break,
                Some('\\') => {
                    self.advance();
                    if self.peek() != Some('\n') {
                        self.advance();
                    }
                }
                Some(c) => {
                    self.advance();
                    if c == quote {
                        break;
                    }
                }
            }
        }
    }

    // ── ELEMENT ───────────────────────────────────────────────────────────

    fn lex_element(&mut self, start: usize) {
        while matches!(self.peek(), Some(c) if is_element_char(c)) {
            self.advance();
        }
        let name = self.src[start..self.pos].to_string();
        if self.peek() == Some(';') {
            self.advance();
            self.colon_on_line = false;
        }
        self.push(TokenKind::Element(name), start, self.line);
    }

    /// In value position an uppercase word is a delegate type only when
    /// nothing but a statement end follows it: `delegate: Item` versus
    /// `width: Math.max(a, b)`.
    fn bare_word_ahead(&self) -> bool {
        let rest = self.rest();
        let word_end = rest.find(|c: char| !is_element_char(c)).unwrap_or(rest.len());
        let after = rest[word_end..].trim_start_matches([' ', '\t', '\r']);
        after.is_empty()
            || after.starts_with(['\n', ';', '}'])
            || after.starts_with("//")
    }

    // ── EXPRESSION ────────────────────────────────────────────────────────

    /// Scan a property name or value. In a value, a `;` followed by more
    /// statements on the same line stays part of the text
    /// (`onClick: a(); b();`); one followed by a new property or element
    /// ends it.
    fn lex_expression(&mut self, start: usize) {
        let line = self.line;
        let in_value = self.colon_on_line;
        let mut depth = 0usize;
        let mut terminated = false;

        while let Some(c) = self.peek() {
            match c {
                '\n' => break,
                '"' | '\'' | '`' => {
                    self.skip_string(c);
                    continue;
                }
                '/' if self.rest().starts_with("//") => break,
                '(' | '[' | '{' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                '}' if depth == 0 => break,
                '}' => depth -= 1,
                ';' if depth == 0 && !(in_value && statement_continues(&self.rest()[1..])) => {
                    terminated = true;
                    break;
                }
                ':' if depth == 0 && !self.colon_on_line => break,
                _ => {}
            }
            self.advance();
        }

        let text = self.src[start..self.pos].trim();
        let text = text.strip_suffix(';').unwrap_or(text).trim_end().to_string();
        if terminated {
            self.advance();
            self.colon_on_line = false;
        }
        if !text.is_empty() {
            self.push(TokenKind::Expression(text), start, line);
        }
    }

    // ── inline block ──────────────────────────────────────────────────────

    /// Capture a `{ ... }` right-hand side as a single EXPRESSION token.
    ///
    /// Line comments inside the block are dropped so that the body can be
    /// emitted on a single line.
    fn lex_inline_block(&mut self, start: usize) {
        let line = self.line;
        let mut raw = String::new();
        let mut segment = self.pos;
        let mut depth = 0usize;

        while let Some(c) = self.peek() {
            match c {
                '"' | '\'' | '`' => {
                    self.skip_string(c);
                    continue;
                }
                '/' if self.rest().starts_with("//") => {
                    raw.push_str(&self.src[segment..self.pos]);
                    self.skip_line_comment();
                    segment = self.pos;
                    continue;
                }
                '\n' => {
                    self.advance();
                    self.newline();
                    continue;
                }
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        break;
                    }
                }
                _ => {}
            }
            self.advance();
        }
        raw.push_str(&self.src[segment..self.pos]);
        self.colon_on_line = false;

        // A `;` straight after the block ends the statement.
        let trailing = self.rest().len() - self.rest().trim_start_matches([' ', '\t']).len();
        if self.rest()[trailing..].starts_with(';') {
            self.pos += trailing + 1;
            self.colon_on_line = false;
        }

        let text = match classify_block(&raw) {
            BlockKind::ObjectLiteral => raw.trim().to_string(),
            BlockKind::Statements => strip_braces(&raw).trim().to_string(),
        };
        self.push(TokenKind::Expression(text), start, line);
    }
}

// ── helpers ───────────────────────────────────────────────────────────────

fn is_element_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Whether the text after a `;` in a value continues the same value: more
/// statements rather than the end of the line, a comment, a `name:` or
/// `name(args):` property, or an `Element {` / `Element @`.
fn statement_continues(after: &str) -> bool {
    let after = after.trim_start_matches([' ', '\t', '\r']);
    if after.is_empty() || after.starts_with(['\n', '}']) || after.starts_with("//") {
        return false;
    }
    !property_ahead(after) && !element_ahead(after)
}

fn property_ahead(text: &str) -> bool {
    let name_end = text
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .unwrap_or(text.len());
    if name_end == 0 {
        return false;
    }
    let mut rest = text[name_end..].trim_start();
    if let Some(args) = rest.strip_prefix('(') {
        let Some(close) = args.find(')') else {
            return false;
        };
        rest = args[close + 1..].trim_start();
    }
    rest.starts_with(':')
}

fn element_ahead(text: &str) -> bool {
    if !text.starts_with(|c: char| c.is_ascii_uppercase()) {
        return false;
    }
    let word_end = text.find(|c: char| !is_element_char(c)).unwrap_or(text.len());
    text[word_end..].trim_start().starts_with(['{', '@'])
}

fn starts_expression(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '"' | '\'' | '(' | '-' | '_' | '[')
}

/// What a braced right-hand side holds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// `{ a: 1, b: 2 }`: kept as a value, braces included.
    ObjectLiteral,
    /// `{ doStuff(); }`: a function body, braces trimmed.
    Statements,
}

/// Decide whether a captured `{ ... }` block is an object literal or a
/// statement block.
///
/// An empty block is an object. Otherwise the block is an object when its
/// first top-level item is `key:` with a name, string, or number key and no
/// top-level `;` appears. A labelled statement (`{ outer: for (...) {} }`)
/// is indistinguishable from a one-entry object and is read as an object.
pub fn classify_block(raw: &str) -> BlockKind {
    let body = strip_braces(raw).trim();
    if body.is_empty() {
        return BlockKind::ObjectLiteral;
    }

    let mut depth = 0usize;
    let mut first_colon = None;
    let mut quote = None;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => return BlockKind::Statements,
            ':' if depth == 0 && first_colon.is_none() => first_colon = Some(i),
            _ => {}
        }
    }

    match first_colon {
        Some(i) if is_object_key(body[..i].trim()) => BlockKind::ObjectLiteral,
        _ => BlockKind::Statements,
    }
}

fn is_object_key(key: &str) -> bool {
    let quoted = key.len() >= 2
        && ((key.starts_with('"') && key.ends_with('"'))
            || (key.starts_with('\'') && key.ends_with('\'')));
    let name = !key.is_empty()
        && key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    quoted || name
}

fn strip_braces(raw: &str) -> &str {
    let raw = raw.trim();
    let raw = raw.strip_prefix('{').unwrap_or(raw);
    raw.strip_suffix('}').unwrap_or(raw)
}

/// Tokenize a `.bml` source string.
pub fn tokenize(src: &str) -> Vec<Token> {
    Tokenizer::new(src).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use TokenKind::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).into_iter().map(|t| t.kind).collect()
    }

    fn el(s: &str) -> TokenKind {
        Element(s.to_string())
    }

    fn ex(s: &str) -> TokenKind {
        Expression(s.to_string())
    }

    #[test]
    fn empty_element() {
        assert_eq!(kinds("Element {\n}\n"), vec![el("Element"), ScopeStart, ScopeEnd]);
    }

    #[test]
    fn single_property() {
        assert_eq!(
            kinds("Element {\nleft: 100;\n}\n"),
            vec![el("Element"), ScopeStart, ex("left"), Colon, ex("100"), ScopeEnd]
        );
    }

    #[test]
    fn comment_only() {
        assert_eq!(kinds("// comment\n"), vec![]);
    }

    #[test]
    fn block_comment_counts_lines() {
        let tokens = tokenize("/* one\ntwo\n*/ Item {\n}");
        assert_eq!(tokens[0].kind, el("Item"));
        assert_eq!(tokens[0].line, 3);
        assert_eq!(tokens[2].line, 4);
    }

    #[test]
    fn trailing_comment_ends_value() {
        assert_eq!(
            kinds("Item {\n  width: 10 // pixels\n}"),
            vec![el("Item"), ScopeStart, ex("width"), Colon, ex("10"), ScopeEnd]
        );
    }

    #[test]
    fn later_colons_stay_in_value() {
        assert_eq!(
            kinds("Item {\n  color: pressed ? \"red\" : \"blue\"\n}"),
            vec![
                el("Item"),
                ScopeStart,
                ex("color"),
                Colon,
                ex("pressed ? \"red\" : \"blue\""),
                ScopeEnd,
            ]
        );
    }

    #[test]
    fn semicolon_separates_properties_on_one_line() {
        assert_eq!(
            kinds("Item { left: 1; top: 2 }"),
            vec![
                el("Item"),
                ScopeStart,
                ex("left"),
                Colon,
                ex("1"),
                ex("top"),
                Colon,
                ex("2"),
                ScopeEnd,
            ]
        );
    }

    #[test]
    fn strings_hide_terminators() {
        assert_eq!(
            kinds("Text {\n  text: \"a; b } // c\";\n}"),
            vec![el("Text"), ScopeStart, ex("text"), Colon, ex("\"a; b } // c\""), ScopeEnd]
        );
    }

    #[test]
    fn type_definition() {
        assert_eq!(
            kinds("Button @ Item {\n}"),
            vec![el("Button"), IsA, el("Item"), ScopeStart, ScopeEnd]
        );
    }

    #[test]
    fn delegate_value_is_element() {
        assert_eq!(
            kinds("List {\n  delegate: Row;\n}"),
            vec![el("List"), ScopeStart, ex("delegate"), Colon, el("Row"), ScopeEnd]
        );
    }

    #[test]
    fn uppercase_call_value_is_expression() {
        assert_eq!(
            kinds("Item {\n  width: Math.max(a, b)\n}"),
            vec![el("Item"), ScopeStart, ex("width"), Colon, ex("Math.max(a, b)"), ScopeEnd]
        );
    }

    #[test]
    fn value_may_start_with_any_character() {
        assert_eq!(
            kinds("Item {\n  visible: !hidden\n}"),
            vec![el("Item"), ScopeStart, ex("visible"), Colon, ex("!hidden"), ScopeEnd]
        );
    }

    #[test]
    fn method_name_keeps_parameters() {
        assert_eq!(
            kinds("Item {\n  add(a, b): return a + b;\n}"),
            vec![el("Item"), ScopeStart, ex("add(a, b)"), Colon, ex("return a + b"), ScopeEnd]
        );
    }

    #[test]
    fn inline_statement_block_is_trimmed() {
        assert_eq!(
            kinds("Item {\n  onClick: { doStuff(); other(); }\n}"),
            vec![
                el("Item"),
                ScopeStart,
                ex("onClick"),
                Colon,
                ex("doStuff(); other();"),
                ScopeEnd,
            ]
        );
    }

    #[test]
    fn inline_object_literal_keeps_braces() {
        assert_eq!(
            kinds("Item {\n  model: { a: 1, b: { c: 2 } };\n}"),
            vec![
                el("Item"),
                ScopeStart,
                ex("model"),
                Colon,
                ex("{ a: 1, b: { c: 2 } }"),
                ScopeEnd,
            ]
        );
    }

    #[test]
    fn multiline_block_advances_line_counter() {
        let tokens = tokenize("Item {\n  onClick: {\n    a();\n    // note\n    b();\n  }\n  x: 1\n}");
        assert_eq!(tokens[4].kind, ex("a();\n    \n    b();"));
        assert_eq!(tokens[4].line, 2);
        assert_eq!(tokens[5].kind, ex("x"));
        assert_eq!(tokens[5].line, 7);
    }

    #[test]
    fn context_is_line_remainder() {
        let tokens = tokenize("Item {\n  left: 100\n}");
        assert_eq!(tokens[2].context, "left: 100");
        assert_eq!(tokens[4].context, "100");
        assert_eq!(tokens[4].line, 2);
    }

    #[test]
    fn statements_share_one_value() {
        assert_eq!(
            kinds("Item {\n  onClick: a(); b();\n}"),
            vec![el("Item"), ScopeStart, ex("onClick"), Colon, ex("a(); b()"), ScopeEnd]
        );
    }

    #[test]
    fn semicolon_before_element_ends_value() {
        assert_eq!(
            kinds("Item { x: 1; Row { } }"),
            vec![
                el("Item"),
                ScopeStart,
                ex("x"),
                Colon,
                ex("1"),
                el("Row"),
                ScopeStart,
                ScopeEnd,
                ScopeEnd,
            ]
        );
    }

    #[test]
    fn sibling_elements_on_one_line() {
        assert_eq!(
            kinds("A { B { x: 1 } C { y: 2 } }"),
            vec![
                el("A"),
                ScopeStart,
                el("B"),
                ScopeStart,
                ex("x"),
                Colon,
                ex("1"),
                ScopeEnd,
                el("C"),
                ScopeStart,
                ex("y"),
                Colon,
                ex("2"),
                ScopeEnd,
                ScopeEnd,
            ]
        );
    }

    #[test]
    fn property_after_multiline_block_on_closing_line() {
        assert_eq!(
            kinds("Item {\n  onClick: {\n    a();\n  } x: 1\n}"),
            vec![
                el("Item"),
                ScopeStart,
                ex("onClick"),
                Colon,
                ex("a();"),
                ex("x"),
                Colon,
                ex("1"),
                ScopeEnd,
            ]
        );
    }

    #[test]
    fn stray_semicolon_is_a_token() {
        assert_eq!(kinds("Item {};"), vec![el("Item"), ScopeStart, ScopeEnd, Semicolon]);
    }

    #[test]
    fn classify_blocks() {
        assert_eq!(classify_block("{}"), BlockKind::ObjectLiteral);
        assert_eq!(classify_block("{ \"a\": 1 }"), BlockKind::ObjectLiteral);
        assert_eq!(classify_block("{ a: 1; }"), BlockKind::Statements);
        assert_eq!(classify_block("{ x ? 1 : 2 }"), BlockKind::Statements);
        assert_eq!(classify_block("{ foo() }"), BlockKind::Statements);
    }

    #[test]
    fn leading_digit_name_is_still_expression() {
        assert_eq!(
            kinds("Item {\n1prop: 1;\n}"),
            vec![el("Item"), ScopeStart, ex("1prop"), Colon, ex("1"), ScopeEnd]
        );
    }
}
