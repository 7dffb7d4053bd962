use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::tokenizer::Token;

// ── ErrorCode ─────────────────────────────────────────────────────────────

/// Closed set of compile failure categories.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Generic,
    UnknownElement,
    NoProperty,
    #[serde(rename = "NO_ELEMENTTYPE")]
    NoElementType,
    #[serde(rename = "NO_TYPENAME")]
    NoTypeName,
    NoExpression,
    NoColon,
    InvalidPropertyName,
    UnexpectedEnd,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Generic => "GENERIC",
            ErrorCode::UnknownElement => "UNKNOWN_ELEMENT",
            ErrorCode::NoProperty => "NO_PROPERTY",
            ErrorCode::NoElementType => "NO_ELEMENTTYPE",
            ErrorCode::NoTypeName => "NO_TYPENAME",
            ErrorCode::NoExpression => "NO_EXPRESSION",
            ErrorCode::NoColon => "NO_COLON",
            ErrorCode::InvalidPropertyName => "INVALID_PROPERTY_NAME",
            ErrorCode::UnexpectedEnd => "UNEXPECTED_END",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── CompileError ──────────────────────────────────────────────────────────

/// A compile failure from the `.bml` tree builder.
///
/// The tokenizer never fails, so every error points at the token the tree
/// builder was looking at when the grammar broke.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("line {line}: {message}")]
pub struct CompileError {
    pub code: ErrorCode,
    pub message: String,
    /// 1-based source line number where the error occurred.
    pub line: usize,
    /// Remainder of the offending source line.
    pub context: String,
}

impl CompileError {
    pub fn new(
        code: ErrorCode,
        msg: impl Into<String>,
        line: usize,
        context: impl Into<String>,
    ) -> Self {
        Self { code, message: msg.into(), line, context: context.into() }
    }

    /// Error positioned at `token`.
    pub(crate) fn at(code: ErrorCode, msg: impl Into<String>, token: &Token) -> Self {
        Self::new(code, msg, token.line, token.context.clone())
    }

    /// One-line diagnostic followed by the source context, if any.
    ///
    /// ```text
    /// line 3: INVALID_PROPERTY_NAME: property name "1prop" starts with a digit
    ///     1prop: 1
    /// ```
    pub fn report(&self) -> String {
        if self.context.is_empty() {
            format!("line {}: {}: {}", self.line, self.code, self.message)
        } else {
            format!(
                "line {}: {}: {}\n    {}",
                self.line, self.code, self.message, self.context
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_names_match_wire_names() {
        assert_eq!(ErrorCode::NoElementType.to_string(), "NO_ELEMENTTYPE");
        assert_eq!(ErrorCode::NoTypeName.to_string(), "NO_TYPENAME");
        assert_eq!(ErrorCode::InvalidPropertyName.to_string(), "INVALID_PROPERTY_NAME");
    }

    #[test]
    fn report_includes_context_line() {
        let e = CompileError::new(ErrorCode::NoColon, "expected ':'", 4, "left 100");
        assert_eq!(e.to_string(), "line 4: expected ':'");
        assert_eq!(e.report(), "line 4: NO_COLON: expected ':'\n    left 100");
    }

    #[test]
    fn report_without_context() {
        let e = CompileError::new(ErrorCode::UnexpectedEnd, "unclosed '{'", 1, "");
        assert_eq!(e.report(), "line 1: UNEXPECTED_END: unclosed '{'");
    }
}
