use std::fmt;

use crate::address::Address;
use crate::config::ExprConfig;
use crate::error::ExprError;
use crate::lexer::Lexer;
use crate::operators::OperatorId;
use crate::symbols::SymbolResolver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolReference {
    pub name: String,
    /// Written with a `##` suffix.
    pub is_external_ref: bool,
    /// Written with a `:` prefix.
    pub is_root_ref: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionPart {
    Address(Address),
    Symbol(SymbolReference),
    Operator(OperatorId),
    OpeningParen,
    ClosingParen,
    /// String literal lexed in DEFB mode, kept as bytes.
    RawBytes { bytes: Vec<u8>, text: String },
}

impl ExpressionPart {
    pub fn is_operand(&self) -> bool {
        matches!(
            self,
            Self::Address(_) | Self::Symbol(_) | Self::RawBytes { .. }
        )
    }

    pub fn operator(&self) -> Option<OperatorId> {
        match self {
            Self::Operator(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for ExpressionPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) if address.is_absolute() => {
                write!(f, "{:04X}h", address.value())
            }
            Self::Address(address) => write!(f, "{address}"),
            Self::Symbol(symbol) => {
                if symbol.is_root_ref {
                    f.write_str(":")?;
                }
                f.write_str(&symbol.name)?;
                if symbol.is_external_ref {
                    f.write_str("##")?;
                }
                Ok(())
            }
            Self::Operator(id) => f.write_str(id.name()),
            Self::OpeningParen => f.write_str("("),
            Self::ClosingParen => f.write_str(")"),
            Self::RawBytes { text, .. } => f.write_str(text),
        }
    }
}

/// A parsed expression, either still in source order or converted to postfix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    pub(crate) source: String,
    pub(crate) parts: Vec<ExpressionPart>,
    pub(crate) is_byte: bool,
    pub(crate) postfixed: bool,
}

impl Expression {
    /// Lexes `text` into a raw (source-order) expression.
    ///
    /// `$` is resolved right away through `symbols`.
    pub fn parse(
        text: &str,
        for_defb: bool,
        is_byte: bool,
        config: &ExprConfig,
        symbols: &dyn SymbolResolver,
    ) -> Result<Self, ExprError> {
        let text = text.trim_matches(|ch: char| ch == ' ' || ch == '\t');
        let parts = Lexer::new(text, config, for_defb, symbols).lex_all()?;
        Ok(Self {
            source: text.to_string(),
            parts,
            is_byte,
            postfixed: false,
        })
    }

    pub fn empty() -> Self {
        Self {
            source: String::new(),
            parts: Vec::new(),
            is_byte: false,
            postfixed: true,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn parts(&self) -> &[ExpressionPart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn is_byte(&self) -> bool {
        self.is_byte
    }

    pub fn set_is_byte(&mut self, is_byte: bool) {
        self.is_byte = is_byte;
    }

    pub fn is_postfixed(&self) -> bool {
        self.postfixed
    }

    /// Bytes of a DEFB string that makes up the whole expression.
    pub fn raw_bytes(&self) -> Option<&[u8]> {
        match self.parts.as_slice() {
            [ExpressionPart::RawBytes { bytes, .. }] => Some(bytes),
            _ => None,
        }
    }

    pub fn referenced_symbols(&self) -> impl Iterator<Item = &SymbolReference> {
        self.parts.iter().filter_map(|part| match part {
            ExpressionPart::Symbol(symbol) => Some(symbol),
            _ => None,
        })
    }

    pub fn has_symbols(&self) -> bool {
        self.referenced_symbols().next().is_some()
    }

    pub fn contains_operator(&self, id: OperatorId) -> bool {
        self.parts.iter().any(|part| part.operator() == Some(id))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, part) in self.parts.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}
