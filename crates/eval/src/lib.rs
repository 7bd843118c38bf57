//! Expression subsystem of a multi-pass Z80/Z280 assembler.
//!
//! Text goes through the lexer, the postfix converter and the evaluator:
//!
//! ```
//! use zexpr_eval::{Address, AssemblyContext, Evaluation, ExprConfig, SymbolTable};
//!
//! let mut context = AssemblyContext::new(ExprConfig::default()).unwrap();
//! let mut symbols = SymbolTable::new();
//! symbols.define("START", Address::code(0x100));
//!
//! let expression = context.parse("START + 2 * 3", false, false, &symbols).unwrap();
//! assert_eq!(
//!     expression.evaluate(&mut symbols).unwrap(),
//!     Evaluation::Resolved(Address::code(0x106))
//! );
//! ```

mod address;
mod cache;
mod config;
mod diag;
mod encoding;
mod error;
mod evaluator;
mod expression;
mod lexer;
mod link;
mod operators;
mod postfix;
mod symbols;

pub use address::{Address, AddressMode};
pub use cache::{AssemblyContext, CacheStats, ExpressionCache};
pub use config::{ConfigError, ExprConfig, MAX_RADIX, MIN_RADIX, load_config};
pub use diag::{RenderOptions, render_error};
pub use encoding::{StringEncoding, UnknownEncoding};
pub use error::{ErrorCategory, ExprError};
pub use evaluator::Evaluation;
pub use expression::{Expression, ExpressionPart, SymbolReference};
pub use link::{LinkItem, STORE_AS_BYTE, STORE_AS_WORD};
pub use operators::{
    Arity, EXTERNAL_TYPE_TAG, ModeRule, OperatorDescriptor, OperatorId, all_operators, type_tag,
};
pub use symbols::{SymbolHandle, SymbolResolver, SymbolTable, SymbolValue};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_pass_evaluation_of_a_forward_reference() {
        let mut context = AssemblyContext::new(ExprConfig::default()).expect("context");
        let mut symbols = SymbolTable::new();

        // Pass 1: LATER is not defined yet.
        context.begin_run();
        let expression = context
            .parse("LATER - 2", false, false, &symbols)
            .expect("parse");
        assert_eq!(
            expression.try_evaluate(&mut symbols),
            Ok(Evaluation::NotYetResolvable)
        );
        assert!(symbols.is_registered("LATER"));
        symbols.define("LATER", Address::code(0x80));

        // Pass 2 reuses the cached parse.
        let expression = context
            .parse("LATER - 2", false, false, &symbols)
            .expect("parse");
        assert_eq!(
            expression.evaluate(&mut symbols),
            Ok(Evaluation::Resolved(Address::code(0x7E)))
        );
        assert_eq!(context.cache().stats().hits, 1);
    }
}
