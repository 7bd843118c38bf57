use std::ops::Range;

use thiserror::Error;

use crate::encoding::StringEncoding;

/// Broad classes of expression failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed number, string or identifier, or an unexpected character.
    Lexical,
    /// Bad token adjacency, unbalanced parentheses or an address-mode violation.
    Semantic,
    /// A symbol with no value during strict evaluation.
    UnknownSymbol,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at column {column}")]
    UnexpectedCharacter { ch: char, column: usize },
    #[error("invalid number '{literal}' at column {column}")]
    InvalidNumber { literal: String, column: usize },
    #[error("unterminated string literal at column {column}")]
    UnterminatedString { column: usize },
    #[error("invalid escape sequence '{sequence}' at column {column}")]
    InvalidEscape { sequence: String, column: usize },
    #[error("character '{ch}' at column {column} can't be represented in {encoding}")]
    UnencodableCharacter {
        ch: char,
        encoding: StringEncoding,
        column: usize,
    },
    #[error("the string {text} generates more than two bytes")]
    StringTooLong { text: String, column: usize },
    #[error("invalid expression: {token} (item {position}) can't be preceded by {previous}")]
    InvalidAdjacency {
        token: String,
        previous: String,
        /// 1-based index of the offending item.
        position: usize,
    },
    #[error("invalid expression: it can't end with the operator {operator}")]
    EndsWithOperator { operator: String },
    #[error("invalid expression: {token} can't be the only item")]
    InvalidSingleItem { token: String },
    #[error("invalid expression: a string of more than two bytes must be alone")]
    RawBytesNotAlone,
    #[error("the string {text} generates more than two bytes and only has a value as DEFB data")]
    RawBytesNotEvaluable { text: String },
    #[error("invalid expression: missing opening parenthesis")]
    MissingOpeningParenthesis,
    #[error("invalid expression: missing closing parenthesis")]
    MissingClosingParenthesis,
    #[error("operator {operator} is not allowed on {lhs} and {rhs} values")]
    ModeMismatch {
        operator: &'static str,
        lhs: String,
        rhs: String,
    },
    #[error("division by zero in operator {operator}")]
    DivisionByZero { operator: &'static str },
    #[error(
        "operator {operator} is not allowed in expressions involving relocatable addresses that evaluate to a single byte"
    )]
    ByteRelocatableOperator { operator: &'static str },
    #[error("operator {operator} can't be used in expressions evaluated at link time")]
    OperatorNotLinkable { operator: &'static str },
    #[error("unknown symbol: {name}")]
    UnknownSymbol { name: String },
}

impl ExprError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnexpectedCharacter { .. }
            | Self::InvalidNumber { .. }
            | Self::UnterminatedString { .. }
            | Self::InvalidEscape { .. }
            | Self::UnencodableCharacter { .. }
            | Self::StringTooLong { .. } => ErrorCategory::Lexical,
            Self::UnknownSymbol { .. } => ErrorCategory::UnknownSymbol,
            _ => ErrorCategory::Semantic,
        }
    }

    /// 1-based column of the offending text, for lexical errors.
    pub fn column(&self) -> Option<usize> {
        match self {
            Self::UnexpectedCharacter { column, .. }
            | Self::InvalidNumber { column, .. }
            | Self::UnterminatedString { column }
            | Self::InvalidEscape { column, .. }
            | Self::UnencodableCharacter { column, .. }
            | Self::StringTooLong { column, .. } => Some(*column),
            _ => None,
        }
    }

    /// Byte range of the offending text inside `source`, when known.
    pub fn span(&self, source: &str) -> Option<Range<usize>> {
        let start = self.column()?.checked_sub(1)?;
        let len = match self {
            Self::UnexpectedCharacter { ch, .. } | Self::UnencodableCharacter { ch, .. } => {
                ch.len_utf8()
            }
            Self::InvalidNumber { literal, .. } => literal.len(),
            Self::InvalidEscape { sequence, .. } => sequence.len(),
            Self::StringTooLong { text, .. } => text.len(),
            Self::UnterminatedString { .. } => source.len().saturating_sub(start),
            _ => 1,
        };
        let end = (start + len.max(1)).min(source.len());
        (start < end).then_some(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors() {
        let lexical = ExprError::InvalidNumber {
            literal: "12G".to_string(),
            column: 3,
        };
        assert_eq!(lexical.category(), ErrorCategory::Lexical);
        assert_eq!(lexical.span("1+12G"), Some(2..5));

        let unknown = ExprError::UnknownSymbol {
            name: "FOO".to_string(),
        };
        assert_eq!(unknown.category(), ErrorCategory::UnknownSymbol);
        assert_eq!(unknown.column(), None);
        assert_eq!(unknown.to_string(), "unknown symbol: FOO");

        assert_eq!(
            ExprError::MissingClosingParenthesis.category(),
            ErrorCategory::Semantic
        );
        assert_eq!(
            ExprError::RawBytesNotEvaluable {
                text: "'ABC'".to_string()
            }
            .category(),
            ErrorCategory::Semantic
        );
    }

    #[test]
    fn adjacency_errors_name_the_item() {
        let error = ExprError::InvalidAdjacency {
            token: "the operator *".to_string(),
            previous: "the operator +".to_string(),
            position: 3,
        };
        assert_eq!(
            error.to_string(),
            "invalid expression: the operator * (item 3) can't be preceded by the operator +"
        );
        assert_eq!(error.span("1 + * 2"), None);
    }
}
