//! Token adjacency validation and shunting-yard conversion to postfix order.

use tracing::trace;

use crate::address::Address;
use crate::error::ExprError;
use crate::expression::{Expression, ExpressionPart};
use crate::operators::OperatorId;

impl Expression {
    /// Validates the raw parts and reorders them into postfix form.
    ///
    /// Calling this on an expression that is already postfixed does nothing.
    pub fn validate_and_postfixize(&mut self) -> Result<(), ExprError> {
        if self.postfixed {
            return Ok(());
        }

        let parts = absorb_short_strings(collapse_nul(std::mem::take(&mut self.parts)));
        let result = validate(&parts).and_then(|()| to_postfix(&parts));
        match result {
            Ok(postfix) => {
                trace!(source = %self.source, postfix = ?postfix, "postfixized expression");
                self.parts = postfix;
                self.postfixed = true;
                Ok(())
            }
            Err(error) => {
                self.parts = parts;
                Err(error)
            }
        }
    }
}

/// Everything around `NUL` is dropped; its truth value is the whole expression.
fn collapse_nul(parts: Vec<ExpressionPart>) -> Vec<ExpressionPart> {
    let Some(index) = parts
        .iter()
        .position(|part| part.operator() == Some(OperatorId::Nul))
    else {
        return parts;
    };
    parts.into_iter().skip(index + 1).take(1).collect()
}

fn absorb_short_strings(parts: Vec<ExpressionPart>) -> Vec<ExpressionPart> {
    parts
        .into_iter()
        .map(|part| match part {
            ExpressionPart::RawBytes { bytes, .. } if bytes.len() <= 2 => {
                let value = match bytes.as_slice() {
                    [] => 0,
                    [low] => u16::from(*low),
                    [low, high] => u16::from_le_bytes([*low, *high]),
                    _ => unreachable!(),
                };
                ExpressionPart::Address(Address::absolute(value))
            }
            other => other,
        })
        .collect()
}

fn validate(parts: &[ExpressionPart]) -> Result<(), ExprError> {
    match parts {
        [] => return Ok(()),
        [single] if single.is_operand() => return Ok(()),
        [single] => {
            return Err(ExprError::InvalidSingleItem {
                token: single.to_string(),
            });
        }
        _ => {}
    }

    if parts
        .iter()
        .any(|part| matches!(part, ExpressionPart::RawBytes { .. }))
    {
        return Err(ExprError::RawBytesNotAlone);
    }

    let mut previous: Option<&ExpressionPart> = None;
    for (index, part) in parts.iter().enumerate() {
        let after_operator_or_open = matches!(
            previous,
            None | Some(ExpressionPart::Operator(_) | ExpressionPart::OpeningParen)
        );
        let after_operand_or_close = matches!(
            previous,
            Some(
                ExpressionPart::Address(_)
                    | ExpressionPart::Symbol(_)
                    | ExpressionPart::ClosingParen
            )
        );
        let valid = match part {
            ExpressionPart::Operator(id) if id.descriptor().is_unary() => after_operator_or_open,
            ExpressionPart::Operator(_) => after_operand_or_close,
            ExpressionPart::Address(_)
            | ExpressionPart::Symbol(_)
            | ExpressionPart::RawBytes { .. }
            | ExpressionPart::OpeningParen => after_operator_or_open,
            ExpressionPart::ClosingParen => after_operand_or_close,
        };
        if !valid {
            return Err(ExprError::InvalidAdjacency {
                token: describe(Some(part)),
                previous: describe(previous),
                position: index + 1,
            });
        }
        previous = Some(part);
    }

    if let Some(ExpressionPart::Operator(id)) = parts.last() {
        return Err(ExprError::EndsWithOperator {
            operator: id.name().to_string(),
        });
    }
    Ok(())
}

fn describe(part: Option<&ExpressionPart>) -> String {
    match part {
        None => "the start of the expression".to_string(),
        Some(ExpressionPart::Operator(id)) => format!("the operator {id}"),
        Some(ExpressionPart::Symbol(symbol)) => format!("the symbol {}", symbol.name),
        Some(other) => other.to_string(),
    }
}

fn to_postfix(parts: &[ExpressionPart]) -> Result<Vec<ExpressionPart>, ExprError> {
    let mut output = Vec::with_capacity(parts.len());
    let mut stack: Vec<ExpressionPart> = Vec::new();

    for part in parts {
        match part {
            ExpressionPart::Address(_)
            | ExpressionPart::Symbol(_)
            | ExpressionPart::RawBytes { .. } => output.push(part.clone()),
            ExpressionPart::OpeningParen => stack.push(part.clone()),
            ExpressionPart::ClosingParen => loop {
                match stack.pop() {
                    Some(ExpressionPart::OpeningParen) => break,
                    Some(other) => output.push(other),
                    None => return Err(ExprError::MissingOpeningParenthesis),
                }
            },
            ExpressionPart::Operator(id) if id.descriptor().is_unary() => {
                stack.push(part.clone());
            }
            ExpressionPart::Operator(id) => {
                let precedence = id.descriptor().precedence;
                while let Some(&ExpressionPart::Operator(top)) = stack.last() {
                    let top = top.descriptor();
                    if !top.is_unary() && top.precedence > precedence {
                        break;
                    }
                    output.extend(stack.pop());
                }
                stack.push(part.clone());
            }
        }
    }

    while let Some(part) = stack.pop() {
        if part == ExpressionPart::OpeningParen {
            return Err(ExprError::MissingClosingParenthesis);
        }
        output.push(part);
    }
    Ok(output)
}
