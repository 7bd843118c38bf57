//! Conversion of deferred expressions into extended link items.

use std::fmt;

use crate::address::Address;
use crate::error::ExprError;
use crate::evaluator::{Halt, Resolution, lookup};
use crate::expression::{Expression, ExpressionPart};
use crate::operators::{OperatorDescriptor, OperatorId};
use crate::symbols::{SymbolResolver, SymbolValue};

/// Arithmetic operator code that stores the computed value as a byte.
pub const STORE_AS_BYTE: u8 = 1;
/// Arithmetic operator code that stores the computed value as a word.
pub const STORE_AS_WORD: u8 = 2;

/// One item of a link-time expression, in postfix order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkItem {
    Address(Address),
    ExternalSymbol(String),
    /// Extended link item arithmetic operator code.
    Operator(u8),
}

impl fmt::Display for LinkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => write!(f, "{address}"),
            Self::ExternalSymbol(name) => write!(f, "EXTERNAL {name}"),
            Self::Operator(STORE_AS_BYTE) => f.write_str("OPERATOR 1 (store as byte)"),
            Self::Operator(STORE_AS_WORD) => f.write_str("OPERATOR 2 (store as word)"),
            Self::Operator(code) => match operator_for_code(*code) {
                Some(id) => write!(f, "OPERATOR {code} ({id})"),
                None => write!(f, "OPERATOR {code}"),
            },
        }
    }
}

fn operator_for_code(code: u8) -> Option<OperatorId> {
    crate::operators::all_operators()
        .iter()
        .find(|descriptor| descriptor.link_code == Some(code))
        .map(|descriptor| descriptor.id)
}

/// Link items of one postfix subtree.
struct Operand {
    items: Vec<LinkItem>,
    /// Value of a subtree built only from known addresses.
    value: Option<Address>,
}

impl Operand {
    fn known(address: Address) -> Self {
        Self {
            items: vec![LinkItem::Address(address.clone())],
            value: Some(address),
        }
    }
}

fn apply(descriptor: &OperatorDescriptor, operands: &[&Address]) -> Result<Address, ExprError> {
    match operands {
        [operand] => Ok(descriptor.apply_unary(operand)),
        [lhs, rhs] => descriptor.apply_binary(lhs, rhs),
        _ => unreachable!("operators take one or two operands"),
    }
}

impl Expression {
    /// Link items that let the linker compute this expression.
    ///
    /// Operators the linker doesn't know are computed here when all their
    /// operands are absolute. The last item stores the result as a byte or a
    /// word depending on [`Expression::is_byte`].
    pub fn to_link_items(
        &self,
        symbols: &mut dyn SymbolResolver,
    ) -> Result<Vec<LinkItem>, ExprError> {
        assert!(
            self.postfixed,
            "expression '{}' converted to link items before postfixization",
            self.source
        );

        let parts = self
            .fold_types(Resolution::Strict, Some(&mut *symbols))
            .map_err(strict_error)?;

        let mut stack: Vec<Operand> = Vec::with_capacity(parts.len());
        for part in parts.iter() {
            match part {
                ExpressionPart::Address(address) => stack.push(Operand::known(address.clone())),
                ExpressionPart::Symbol(symbol) => {
                    match lookup(symbol, Resolution::Strict, Some(&mut *symbols))
                        .map_err(strict_error)?
                    {
                        (_, SymbolValue::Known(address)) => stack.push(Operand::known(address)),
                        (name, SymbolValue::External) => stack.push(Operand {
                            items: vec![LinkItem::ExternalSymbol(name)],
                            value: None,
                        }),
                        (name, SymbolValue::Unknown) => {
                            return Err(ExprError::UnknownSymbol { name });
                        }
                    }
                }
                ExpressionPart::Operator(id) => {
                    let descriptor = id.descriptor();
                    if descriptor.is_identity() {
                        continue;
                    }
                    let arity = if descriptor.is_unary() { 1 } else { 2 };
                    assert!(
                        stack.len() >= arity,
                        "postfix expression '{}' is missing an operand",
                        self.source
                    );
                    let operands = stack.split_off(stack.len() - arity);
                    let values: Option<Vec<&Address>> = operands
                        .iter()
                        .map(|operand| operand.value.as_ref())
                        .collect();

                    let operand = match descriptor.link_code {
                        Some(code) => {
                            let value = values.and_then(|values| apply(descriptor, &values).ok());
                            let mut items: Vec<LinkItem> = operands
                                .into_iter()
                                .flat_map(|operand| operand.items)
                                .collect();
                            items.push(LinkItem::Operator(code));
                            Operand { items, value }
                        }
                        None => match values {
                            Some(values) if values.iter().all(|value| value.is_absolute()) => {
                                Operand::known(apply(descriptor, &values)?)
                            }
                            _ => {
                                return Err(ExprError::OperatorNotLinkable {
                                    operator: descriptor.name,
                                });
                            }
                        },
                    };
                    stack.push(operand);
                }
                ExpressionPart::RawBytes { text, .. } => {
                    return Err(ExprError::RawBytesNotEvaluable { text: text.clone() });
                }
                ExpressionPart::OpeningParen | ExpressionPart::ClosingParen => {
                    panic!("'{part}' can't appear in a postfixed expression")
                }
            }
        }

        let mut items = match stack.pop() {
            Some(operand) if stack.is_empty() => operand.items,
            // An empty expression stores zero.
            None => vec![LinkItem::Address(Address::absolute(0))],
            Some(_) => panic!(
                "postfix expression '{}' left {} values on the stack",
                self.source,
                stack.len() + 1
            ),
        };
        items.push(LinkItem::Operator(if self.is_byte {
            STORE_AS_BYTE
        } else {
            STORE_AS_WORD
        }));
        Ok(items)
    }
}

fn strict_error(halt: Halt) -> ExprError {
    match halt {
        Halt::Error(error) => error,
        Halt::Outcome(outcome) => {
            unreachable!("strict symbol lookup halted with {outcome:?}")
        }
    }
}
