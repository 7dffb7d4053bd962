//! Heuristic source analysis for completion and hover.
//!
//! Files are usually incomplete at the cursor, so the full tree builder would
//! fail on most keystrokes. Cursor classification uses text heuristics and
//! the (never failing) tokenizer instead.

use std::collections::BTreeMap;

use bml_compiler::{TokenKind, tokenize};
use tower_lsp::lsp_types::Position;

// ── Context kind ──────────────────────────────────────────────────────────────

/// What the cursor is positioned inside, used to drive completions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Context {
    /// Top level, or the start of a line inside a block with an uppercase
    /// prefix: an element type is expected.
    Element,
    /// Inside an element block, on a key position (before `:`).
    Property { element: String },
    /// After the `:` on a `key: value` line.
    Value { element: String, prop: String },
}

// ── word_at ───────────────────────────────────────────────────────────────────

/// Extract the identifier (or partial identifier) that contains or immediately
/// precedes the cursor column.
pub fn word_at<'t>(text: &'t str, pos: &Position) -> Option<&'t str> {
    let line = text.lines().nth(pos.line as usize)?;
    let col = char_boundary(line, pos.character as usize);
    let is_word = |c: char| c.is_alphanumeric() || c == '_';

    let start = line[..col]
        .rfind(|c: char| !is_word(c))
        .map(|i| i + 1)
        .unwrap_or(0);

    let end = col
        + line[col..]
            .find(|c: char| !is_word(c))
            .unwrap_or(line.len() - col);

    if start < end {
        Some(&line[start..end])
    } else {
        None
    }
}

// ── find_enclosing_element ────────────────────────────────────────────────────

/// Walk backwards through `before` (text up to the cursor) counting braces to
/// find the nearest unclosed `{` block, then return the element type that
/// opened it. For `Name @ Base {` that is `Name`.
pub fn find_enclosing_element(before: &str) -> Option<String> {
    let mut depth: i32 = 0;

    for line in before.lines().rev() {
        let trimmed = strip_comment(line).trim();
        for ch in trimmed.chars().rev() {
            match ch {
                '}' => depth += 1,
                '{' => {
                    if depth == 0 {
                        return element_name_on_line(trimmed);
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
    }
    None
}

fn element_name_on_line(line: &str) -> Option<String> {
    let word = line.split_whitespace().next()?;
    // Element types start with uppercase; `key: {` blocks are values.
    if word.chars().next()?.is_uppercase() {
        Some(word.trim_end_matches('{').to_string())
    } else {
        None
    }
}

// ── completion_context ────────────────────────────────────────────────────────

/// Classify the cursor position for completion.
pub fn completion_context(text: &str, pos: &Position) -> Context {
    let line_idx = pos.line as usize;
    let col = pos.character as usize;

    let current_line = text.lines().nth(line_idx).unwrap_or("");
    let before_cursor = &current_line[..char_boundary(current_line, col)];
    let effective = strip_comment(before_cursor);
    let before = text_before(text, line_idx, col);

    // After the first colon → completing a value.
    if let Some(colon_idx) = effective.find(':') {
        let prop = effective[..colon_idx].trim().to_string();
        let element = find_enclosing_element(&before).unwrap_or_default();
        return Context::Value { element, prop };
    }

    if brace_depth(&before) == 0 {
        return Context::Element;
    }

    // Inside a block: uppercase start → child element, else → property key.
    let trimmed = effective.trim();
    if trimmed.chars().next().is_some_and(|c| c.is_uppercase()) {
        Context::Element
    } else {
        let element = find_enclosing_element(&before).unwrap_or_default();
        Context::Property { element }
    }
}

// ── known types ───────────────────────────────────────────────────────────────

/// Element type names appearing in `text`, mapped to their base type when the
/// name is defined in the document with `Name @ Base`.
pub fn known_types(text: &str) -> BTreeMap<String, Option<String>> {
    let tokens = tokenize(text);
    let mut types: BTreeMap<String, Option<String>> = BTreeMap::new();

    for (i, tok) in tokens.iter().enumerate() {
        let TokenKind::Element(name) = &tok.kind else {
            continue;
        };
        let base = match (tokens.get(i + 1), tokens.get(i + 2)) {
            (Some(at), Some(next)) if at.kind == TokenKind::IsA => match &next.kind {
                TokenKind::Element(base) => Some(base.clone()),
                _ => None,
            },
            _ => None,
        };
        let entry = types.entry(name.clone()).or_default();
        if base.is_some() {
            *entry = base;
        }
    }
    types
}

// ── helpers ───────────────────────────────────────────────────────────────────

fn strip_comment(s: &str) -> &str {
    s.find("//").map(|i| &s[..i]).unwrap_or(s)
}

fn brace_depth(text: &str) -> i32 {
    text.lines()
        .flat_map(|line| strip_comment(line).chars())
        .fold(0i32, |d, c| match c {
            '{' => d + 1,
            '}' => (d - 1).max(0),
            _ => d,
        })
}

/// Largest char boundary in `line` that is `<= col`.
fn char_boundary(line: &str, col: usize) -> usize {
    let mut col = col.min(line.len());
    while !line.is_char_boundary(col) {
        col -= 1;
    }
    col
}

/// Build the source text from the beginning of the file up to `(line, col)`.
fn text_before(text: &str, line_idx: usize, col: usize) -> String {
    let mut out = String::new();
    for (i, line) in text.lines().enumerate() {
        if i < line_idx {
            out.push_str(line);
            out.push('\n');
        } else if i == line_idx {
            out.push_str(&line[..char_boundary(line, col)]);
            break;
        } else {
            break;
        }
    }
    out
}
