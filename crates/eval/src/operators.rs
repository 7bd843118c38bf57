//! Operator catalog and the address algebra each operator follows.

use std::fmt;

use crate::address::Address;
use crate::error::ExprError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorId {
    Plus,
    Minus,
    Multiply,
    Divide,
    Mod,
    Shr,
    Shl,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Xor,
    UnaryPlus,
    UnaryMinus,
    Not,
    High,
    Low,
    Type,
    Nul,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Unary,
    Binary,
}

/// Which operand segments a binary operator accepts, and which segment wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeRule {
    /// At least one operand absolute; the other operand's segment wins.
    OneAbsolute,
    /// Right operand absolute keeps the left segment; equal segments cancel.
    Subtraction,
    BothAbsolute,
    /// Right operand absolute; the left segment wins.
    RightAbsolute,
    /// Both operands in the same segment; the result is absolute.
    SameMode,
}

impl ModeRule {
    /// The result address, with the value still to be filled in.
    fn combine(self, lhs: &Address, rhs: &Address) -> Option<Address> {
        match self {
            Self::OneAbsolute if lhs.is_absolute() => Some(rhs.clone()),
            Self::OneAbsolute if rhs.is_absolute() => Some(lhs.clone()),
            Self::Subtraction if rhs.is_absolute() => Some(lhs.clone()),
            Self::Subtraction | Self::SameMode if lhs.same_mode_as(rhs) => {
                Some(Address::absolute(0))
            }
            Self::BothAbsolute if lhs.is_absolute() && rhs.is_absolute() => Some(lhs.clone()),
            Self::RightAbsolute if rhs.is_absolute() => Some(lhs.clone()),
            _ => None,
        }
    }
}

#[derive(Clone, Copy)]
enum Compute {
    Unary(fn(&Address) -> Address),
    /// `None` from the value function means division by zero.
    Binary(ModeRule, fn(u16, u16) -> Option<u16>),
}

#[derive(Clone, Copy)]
pub struct OperatorDescriptor {
    pub id: OperatorId,
    pub name: &'static str,
    /// Lower binds tighter.
    pub precedence: u8,
    pub arity: Arity,
    /// Arithmetic operator code of the extended link item, if the linker knows it.
    pub link_code: Option<u8>,
    compute: Compute,
}

impl fmt::Debug for OperatorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorDescriptor")
            .field("name", &self.name)
            .field("precedence", &self.precedence)
            .field("arity", &self.arity)
            .field("link_code", &self.link_code)
            .finish()
    }
}

impl OperatorDescriptor {
    pub fn is_unary(&self) -> bool {
        self.arity == Arity::Unary
    }

    /// Result is always the operand, untouched.
    pub fn is_identity(&self) -> bool {
        self.id == OperatorId::UnaryPlus
    }

    pub fn apply_unary(&self, operand: &Address) -> Address {
        match self.compute {
            Compute::Unary(apply) => apply(operand),
            Compute::Binary(..) => panic!("operator {} is binary", self.name),
        }
    }

    pub fn apply_binary(&self, lhs: &Address, rhs: &Address) -> Result<Address, ExprError> {
        let Compute::Binary(rule, value) = self.compute else {
            panic!("operator {} is unary", self.name);
        };
        let template = rule
            .combine(lhs, rhs)
            .ok_or_else(|| ExprError::ModeMismatch {
                operator: self.name,
                lhs: lhs.mode_description(),
                rhs: rhs.mode_description(),
            })?;
        let value = value(lhs.value(), rhs.value()).ok_or(ExprError::DivisionByZero {
            operator: self.name,
        })?;
        Ok(template.with_value(value))
    }
}

const fn unary(
    id: OperatorId,
    name: &'static str,
    precedence: u8,
    link_code: Option<u8>,
    apply: fn(&Address) -> Address,
) -> OperatorDescriptor {
    OperatorDescriptor {
        id,
        name,
        precedence,
        arity: Arity::Unary,
        link_code,
        compute: Compute::Unary(apply),
    }
}

const fn binary(
    id: OperatorId,
    name: &'static str,
    precedence: u8,
    link_code: Option<u8>,
    rule: ModeRule,
    value: fn(u16, u16) -> Option<u16>,
) -> OperatorDescriptor {
    OperatorDescriptor {
        id,
        name,
        precedence,
        arity: Arity::Binary,
        link_code,
        compute: Compute::Binary(rule, value),
    }
}

fn flag(value: bool) -> Option<u16> {
    Some(if value { 0xFFFF } else { 0 })
}

fn shift_count(count: u16) -> Option<u32> {
    (count < 16).then_some(u32::from(count))
}

/// Value produced by `TYPE` for an operand of the given segment.
pub fn type_tag(address: &Address) -> u16 {
    0x20 | u16::from(address.mode().code())
}

/// Value produced by `TYPE` for an external symbol.
pub const EXTERNAL_TYPE_TAG: u16 = 0x80;

// Indexed by `OperatorId as usize`.
static OPERATORS: [OperatorDescriptor; 23] = [
    binary(OperatorId::Plus, "+", 4, Some(8), ModeRule::OneAbsolute, |a, b| {
        Some(a.wrapping_add(b))
    }),
    binary(OperatorId::Minus, "-", 4, Some(7), ModeRule::Subtraction, |a, b| {
        Some(a.wrapping_sub(b))
    }),
    binary(OperatorId::Multiply, "*", 2, Some(9), ModeRule::BothAbsolute, |a, b| {
        Some(a.wrapping_mul(b))
    }),
    binary(OperatorId::Divide, "/", 2, Some(10), ModeRule::RightAbsolute, |a, b| {
        a.checked_div(b)
    }),
    binary(OperatorId::Mod, "MOD", 2, Some(11), ModeRule::RightAbsolute, |a, b| {
        a.checked_rem(b)
    }),
    binary(OperatorId::Shr, "SHR", 2, Some(12), ModeRule::RightAbsolute, |a, b| {
        Some(shift_count(b).map_or(0, |count| a >> count))
    }),
    binary(OperatorId::Shl, "SHL", 2, Some(13), ModeRule::BothAbsolute, |a, b| {
        Some(shift_count(b).map_or(0, |count| a << count))
    }),
    binary(OperatorId::Eq, "EQ", 5, Some(14), ModeRule::SameMode, |a, b| flag(a == b)),
    binary(OperatorId::Ne, "NE", 5, Some(15), ModeRule::SameMode, |a, b| flag(a != b)),
    binary(OperatorId::Lt, "LT", 5, Some(16), ModeRule::SameMode, |a, b| flag(a < b)),
    binary(OperatorId::Le, "LE", 5, Some(17), ModeRule::SameMode, |a, b| flag(a <= b)),
    binary(OperatorId::Gt, "GT", 5, Some(18), ModeRule::SameMode, |a, b| flag(a > b)),
    binary(OperatorId::Ge, "GE", 5, Some(19), ModeRule::SameMode, |a, b| flag(a >= b)),
    binary(OperatorId::And, "AND", 7, Some(20), ModeRule::OneAbsolute, |a, b| {
        Some(a & b)
    }),
    binary(OperatorId::Or, "OR", 8, Some(21), ModeRule::OneAbsolute, |a, b| Some(a | b)),
    binary(OperatorId::Xor, "XOR", 8, Some(22), ModeRule::OneAbsolute, |a, b| {
        Some(a ^ b)
    }),
    unary(OperatorId::UnaryPlus, "u+", 3, None, Address::clone),
    unary(OperatorId::UnaryMinus, "u-", 3, Some(6), |a| {
        a.with_value(a.value().wrapping_neg())
    }),
    unary(OperatorId::Not, "NOT", 6, Some(5), |a| a.with_value(!a.value())),
    unary(OperatorId::High, "HIGH", 1, Some(3), |a| {
        a.with_value(u16::from(a.high_byte()))
    }),
    unary(OperatorId::Low, "LOW", 1, Some(4), |a| {
        a.with_value(u16::from(a.low_byte()))
    }),
    unary(OperatorId::Type, "TYPE", 0, None, |a| {
        Address::absolute(type_tag(a))
    }),
    unary(OperatorId::Nul, "NUL", 0, None, Address::clone),
];

const KEYWORDS: [OperatorId; 15] = [
    OperatorId::Mod,
    OperatorId::Shr,
    OperatorId::Shl,
    OperatorId::Eq,
    OperatorId::Ne,
    OperatorId::Lt,
    OperatorId::Le,
    OperatorId::Gt,
    OperatorId::Ge,
    OperatorId::And,
    OperatorId::Or,
    OperatorId::Xor,
    OperatorId::Not,
    OperatorId::High,
    OperatorId::Low,
];

impl OperatorId {
    pub fn descriptor(self) -> &'static OperatorDescriptor {
        &OPERATORS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Operator spelled as a word, matched case-insensitively.
    ///
    /// `NUL` and `TYPE` are included; the lexer gives `NUL` its own handling.
    pub fn from_keyword(word: &str) -> Option<Self> {
        KEYWORDS
            .iter()
            .copied()
            .chain([Self::Type, Self::Nul])
            .find(|id| id.name().eq_ignore_ascii_case(word))
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every operator of the catalog, in table order.
pub fn all_operators() -> &'static [OperatorDescriptor] {
    &OPERATORS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(id: OperatorId, lhs: Address, rhs: Address) -> Result<Address, ExprError> {
        id.descriptor().apply_binary(&lhs, &rhs)
    }

    #[test]
    fn table_is_indexed_by_id() {
        for (index, descriptor) in all_operators().iter().enumerate() {
            assert_eq!(descriptor.id as usize, index, "{}", descriptor.name);
        }
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(OperatorId::from_keyword("and"), Some(OperatorId::And));
        assert_eq!(OperatorId::from_keyword("High"), Some(OperatorId::High));
        assert_eq!(OperatorId::from_keyword("type"), Some(OperatorId::Type));
        assert_eq!(OperatorId::from_keyword("nul"), Some(OperatorId::Nul));
        assert_eq!(OperatorId::from_keyword("u-"), None);
        assert_eq!(OperatorId::from_keyword("FOO"), None);
    }

    #[test]
    fn addition_takes_the_relocatable_mode() {
        assert_eq!(
            apply(OperatorId::Plus, Address::code(100), Address::absolute(5)),
            Ok(Address::code(105))
        );
        assert_eq!(
            apply(OperatorId::Plus, Address::absolute(5), Address::data(100)),
            Ok(Address::data(105))
        );
        assert!(matches!(
            apply(OperatorId::Plus, Address::code(1), Address::code(2)),
            Err(ExprError::ModeMismatch { operator: "+", .. })
        ));
    }

    #[test]
    fn subtraction_cancels_equal_modes() {
        assert_eq!(
            apply(OperatorId::Minus, Address::code(100), Address::code(40)),
            Ok(Address::absolute(60))
        );
        assert_eq!(
            apply(OperatorId::Minus, Address::code(100), Address::absolute(40)),
            Ok(Address::code(60))
        );
        assert_eq!(
            apply(
                OperatorId::Minus,
                Address::common("BUF", 9),
                Address::common("BUF", 4)
            ),
            Ok(Address::absolute(5))
        );
        assert!(
            apply(
                OperatorId::Minus,
                Address::common("BUF", 9),
                Address::common("STK", 4)
            )
            .is_err()
        );
        assert!(apply(OperatorId::Minus, Address::absolute(9), Address::code(4)).is_err());
    }

    #[test]
    fn multiplication_requires_absolute_operands() {
        let err = apply(OperatorId::Multiply, Address::code(1), Address::code(2))
            .expect_err("must fail");
        assert_eq!(
            err.to_string(),
            "operator * is not allowed on CODE and CODE values"
        );
        assert_eq!(
            apply(OperatorId::Multiply, Address::absolute(300), Address::absolute(300)),
            Ok(Address::absolute(300u16.wrapping_mul(300)))
        );
    }

    #[test]
    fn division_keeps_left_mode_and_rejects_zero() {
        assert_eq!(
            apply(OperatorId::Divide, Address::data(100), Address::absolute(3)),
            Ok(Address::data(33))
        );
        assert_eq!(
            apply(OperatorId::Mod, Address::absolute(100), Address::absolute(3)),
            Ok(Address::absolute(1))
        );
        assert_eq!(
            apply(OperatorId::Divide, Address::absolute(1), Address::absolute(0)),
            Err(ExprError::DivisionByZero { operator: "/" })
        );
    }

    #[test]
    fn shifts() {
        assert_eq!(
            apply(OperatorId::Shr, Address::code(0x1234), Address::absolute(8)),
            Ok(Address::code(0x12))
        );
        assert_eq!(
            apply(OperatorId::Shl, Address::absolute(1), Address::absolute(4)),
            Ok(Address::absolute(16))
        );
        assert_eq!(
            apply(OperatorId::Shl, Address::absolute(1), Address::absolute(16)),
            Ok(Address::absolute(0))
        );
        assert!(apply(OperatorId::Shl, Address::code(1), Address::absolute(1)).is_err());
    }

    #[test]
    fn comparisons_yield_flags() {
        assert_eq!(
            apply(OperatorId::Lt, Address::code(1), Address::code(2)),
            Ok(Address::absolute(0xFFFF))
        );
        assert_eq!(
            apply(OperatorId::Eq, Address::absolute(1), Address::absolute(2)),
            Ok(Address::absolute(0))
        );
        assert!(apply(OperatorId::Eq, Address::code(1), Address::data(1)).is_err());
    }

    #[test]
    fn unary_operators_keep_the_mode() {
        let high = OperatorId::High.descriptor().apply_unary(&Address::code(0x1234));
        assert_eq!(high, Address::code(0x12));
        let low = OperatorId::Low.descriptor().apply_unary(&Address::code(0x1234));
        assert_eq!(low, Address::code(0x34));
        let not = OperatorId::Not.descriptor().apply_unary(&Address::absolute(0));
        assert_eq!(not, Address::absolute(0xFFFF));
        let neg = OperatorId::UnaryMinus
            .descriptor()
            .apply_unary(&Address::absolute(1));
        assert_eq!(neg, Address::absolute(0xFFFF));
        let tag = OperatorId::Type
            .descriptor()
            .apply_unary(&Address::common("BUF", 1));
        assert_eq!(tag, Address::absolute(0x23));
    }

    #[test]
    fn only_linkable_operators_carry_codes() {
        assert_eq!(OperatorId::High.descriptor().link_code, Some(3));
        assert_eq!(OperatorId::Plus.descriptor().link_code, Some(8));
        assert_eq!(OperatorId::Type.descriptor().link_code, None);
        assert_eq!(OperatorId::Nul.descriptor().link_code, None);
    }
}
