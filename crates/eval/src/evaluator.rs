//! Stack-machine evaluation of postfixed expressions.

use std::borrow::Cow;

use tracing::debug;

use crate::address::Address;
use crate::error::ExprError;
use crate::expression::{Expression, ExpressionPart, SymbolReference};
use crate::operators::{EXTERNAL_TYPE_TAG, OperatorDescriptor, OperatorId, type_tag};
use crate::symbols::{SymbolResolver, SymbolValue};

/// What became of an evaluation that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Resolved(Address),
    /// A referenced symbol has no value yet; retry on a later pass.
    NotYetResolvable,
    /// Byte-sized result depending on a relocatable address; store it as a
    /// link-time expression.
    DeferredByte,
    /// The value depends on symbols of other modules.
    ContainsExternal,
}

impl Evaluation {
    pub fn address(&self) -> Option<&Address> {
        match self {
            Self::Resolved(address) => Some(address),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// Unknown symbols are errors.
    Strict,
    /// Any symbol at all stops the evaluation.
    Lookahead,
    /// Unknown symbols stop the evaluation.
    BestEffort,
}

/// Early exit from the stack machine, with or without an error.
pub(crate) enum Halt {
    Outcome(Evaluation),
    Error(ExprError),
}

impl From<ExprError> for Halt {
    fn from(error: ExprError) -> Self {
        Self::Error(error)
    }
}

impl Expression {
    /// Strict evaluation.
    ///
    /// Every referenced symbol is registered first, so later passes know
    /// about it even when this evaluation fails.
    pub fn evaluate(
        &self,
        symbols: &mut dyn SymbolResolver,
    ) -> Result<Evaluation, ExprError> {
        for symbol in self.referenced_symbols() {
            symbols.resolve_symbol(&symbol.name, symbol.is_external_ref, symbol.is_root_ref);
        }
        self.run(Resolution::Strict, Some(symbols))
    }

    /// Evaluates only expressions free of symbol references.
    ///
    /// Nothing is registered anywhere.
    pub fn evaluate_if_no_symbols(&self) -> Result<Evaluation, ExprError> {
        if self.has_symbols() {
            return Ok(self.report(Evaluation::NotYetResolvable));
        }
        self.run(Resolution::Lookahead, None)
    }

    /// Best-effort evaluation; unknown symbols give
    /// [`Evaluation::NotYetResolvable`] instead of an error.
    pub fn try_evaluate(
        &self,
        symbols: &mut dyn SymbolResolver,
    ) -> Result<Evaluation, ExprError> {
        self.run(Resolution::BestEffort, Some(symbols))
    }

    fn run(
        &self,
        resolution: Resolution,
        mut symbols: Option<&mut (dyn SymbolResolver + '_)>,
    ) -> Result<Evaluation, ExprError> {
        assert!(
            self.postfixed,
            "expression '{}' evaluated before postfixization",
            self.source
        );
        if self.parts.is_empty() {
            return Ok(Evaluation::Resolved(Address::absolute(0)));
        }

        let result = self
            .fold_types(resolution, symbols.as_deref_mut())
            .and_then(|parts| self.execute(&parts, resolution, symbols.as_deref_mut()));
        match result {
            Ok(address) => Ok(Evaluation::Resolved(address)),
            Err(Halt::Outcome(outcome)) => Ok(self.report(outcome)),
            Err(Halt::Error(error)) => Err(error),
        }
    }

    fn report(&self, outcome: Evaluation) -> Evaluation {
        debug!(source = %self.source, outcome = ?outcome, "expression not resolved");
        outcome
    }

    /// Replaces every `TYPE` applied directly to a literal or symbol by its tag.
    ///
    /// An external operand yields its own tag instead of making the whole
    /// expression external, so this must run before the stack machine.
    pub(crate) fn fold_types(
        &self,
        resolution: Resolution,
        mut symbols: Option<&mut (dyn SymbolResolver + '_)>,
    ) -> Result<Cow<'_, [ExpressionPart]>, Halt> {
        if !self.contains_operator(OperatorId::Type) {
            return Ok(Cow::Borrowed(self.parts.as_slice()));
        }

        let mut folded: Vec<ExpressionPart> = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            if part.operator() != Some(OperatorId::Type) {
                folded.push(part.clone());
                continue;
            }
            let tag = match folded.last() {
                Some(ExpressionPart::Address(address)) => Some(type_tag(address)),
                Some(ExpressionPart::Symbol(symbol)) => {
                    match lookup(symbol, resolution, symbols.as_deref_mut())? {
                        (_, SymbolValue::Known(address)) => Some(type_tag(&address)),
                        (_, SymbolValue::External) => Some(EXTERNAL_TYPE_TAG),
                        // Undefined symbols have an all-zero tag.
                        (_, SymbolValue::Unknown) => Some(0),
                    }
                }
                _ => None,
            };
            match tag {
                Some(tag) => {
                    folded.pop();
                    folded.push(ExpressionPart::Address(Address::absolute(tag)));
                }
                None => folded.push(part.clone()),
            }
        }
        Ok(Cow::Owned(folded))
    }

    fn execute(
        &self,
        parts: &[ExpressionPart],
        resolution: Resolution,
        mut symbols: Option<&mut (dyn SymbolResolver + '_)>,
    ) -> Result<Address, Halt> {
        let mut stack: Vec<Address> = Vec::with_capacity(parts.len());
        let mut external_found = false;

        for part in parts {
            match part {
                ExpressionPart::Address(address) => stack.push(address.clone()),
                ExpressionPart::Symbol(symbol) => {
                    match lookup(symbol, resolution, symbols.as_deref_mut())? {
                        (_, SymbolValue::Known(address)) => stack.push(address),
                        (_, SymbolValue::External) => {
                            external_found = true;
                            stack.push(Address::absolute(0));
                        }
                        (name, SymbolValue::Unknown) => {
                            return Err(Halt::Error(ExprError::UnknownSymbol { name }));
                        }
                    }
                }
                ExpressionPart::Operator(id) => {
                    let descriptor = id.descriptor();
                    let result = if descriptor.is_unary() {
                        let operand = pop(&mut stack);
                        let result = descriptor.apply_unary(&operand);
                        self.check_byte_result(descriptor, &[&operand], &result)?;
                        result
                    } else {
                        let rhs = pop(&mut stack);
                        let lhs = pop(&mut stack);
                        let result = descriptor.apply_binary(&lhs, &rhs)?;
                        self.check_byte_result(descriptor, &[&lhs, &rhs], &result)?;
                        result
                    };
                    stack.push(result);
                }
                ExpressionPart::RawBytes { text, .. } => {
                    return Err(Halt::Error(ExprError::RawBytesNotEvaluable {
                        text: text.clone(),
                    }));
                }
                ExpressionPart::OpeningParen | ExpressionPart::ClosingParen => {
                    panic!("'{part}' can't appear in a postfixed expression")
                }
            }
        }

        assert_eq!(
            stack.len(),
            1,
            "postfix expression '{}' left {} values on the stack",
            self.source,
            stack.len()
        );
        if external_found {
            return Err(Halt::Outcome(Evaluation::ContainsExternal));
        }
        Ok(pop(&mut stack))
    }

    /// A relocatable value squeezed into a byte has to be computed by the linker.
    fn check_byte_result(
        &self,
        descriptor: &OperatorDescriptor,
        operands: &[&Address],
        result: &Address,
    ) -> Result<(), Halt> {
        if !self.is_byte
            || descriptor.is_identity()
            || result.is_absolute()
            || operands.iter().all(|operand| operand.is_absolute())
        {
            return Ok(());
        }
        match descriptor.link_code {
            Some(_) => Err(Halt::Outcome(Evaluation::DeferredByte)),
            None => Err(Halt::Error(ExprError::ByteRelocatableOperator {
                operator: descriptor.name,
            })),
        }
    }
}

/// Resolves a symbol to its qualified name and value.
///
/// Outside strict mode an unknown symbol halts the evaluation; in strict mode
/// the caller decides between an error and the undefined `TYPE` tag.
pub(crate) fn lookup(
    symbol: &SymbolReference,
    resolution: Resolution,
    symbols: Option<&mut (dyn SymbolResolver + '_)>,
) -> Result<(String, SymbolValue), Halt> {
    let Some(symbols) = symbols else {
        return Err(Halt::Outcome(Evaluation::NotYetResolvable));
    };
    let handle = symbols.resolve_symbol(&symbol.name, symbol.is_external_ref, symbol.is_root_ref);
    if handle.value == SymbolValue::Unknown && resolution != Resolution::Strict {
        return Err(Halt::Outcome(Evaluation::NotYetResolvable));
    }
    Ok((handle.name, handle.value))
}

fn pop(stack: &mut Vec<Address>) -> Address {
    stack.pop().expect("postfix expression is missing an operand")
}
