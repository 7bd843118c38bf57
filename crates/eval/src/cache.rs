//! Per-run cache of postfixed expressions and the context that owns it.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::{ConfigError, ExprConfig, check_radix};
use crate::error::ExprError;
use crate::expression::Expression;
use crate::symbols::SymbolResolver;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Postfixed expressions keyed by source text and DEFB mode.
///
/// Text containing `$` is never stored: its value follows the location counter.
#[derive(Debug, Default)]
pub struct ExpressionCache {
    entries: FxHashMap<(String, bool), Expression>,
    hits: u64,
    misses: u64,
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, text: &str, for_defb: bool) -> Option<&Expression> {
        let found = self.entries.get(&(text.to_string(), for_defb));
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    /// Returns false when the text may not be cached.
    pub fn insert(&mut self, text: &str, for_defb: bool, expression: Expression) -> bool {
        if text.contains('$') {
            return false;
        }
        debug_assert!(expression.is_postfixed());
        self.entries.insert((text.to_string(), for_defb), expression);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}

/// State of one assembly run as far as expressions are concerned.
///
/// Each run owns its context; nothing is shared between runs.
#[derive(Debug)]
pub struct AssemblyContext {
    config: ExprConfig,
    cache: ExpressionCache,
}

impl AssemblyContext {
    pub fn new(config: ExprConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            cache: ExpressionCache::new(),
        })
    }

    pub fn config(&self) -> &ExprConfig {
        &self.config
    }

    pub fn cache(&self) -> &ExpressionCache {
        &self.cache
    }

    /// Starts a new assembly run with an empty cache.
    pub fn begin_run(&mut self) {
        self.cache.clear();
    }

    pub fn set_default_radix(&mut self, radix: u32) -> Result<(), ConfigError> {
        check_radix(radix)?;
        if radix != self.config.default_radix {
            self.config.default_radix = radix;
            self.cache.clear();
        }
        Ok(())
    }

    /// Lexes and postfixes `text`, reusing an earlier parse of the same text.
    ///
    /// `symbols` is only consulted for `$`.
    pub fn parse(
        &mut self,
        text: &str,
        for_defb: bool,
        is_byte: bool,
        symbols: &dyn SymbolResolver,
    ) -> Result<Expression, ExprError> {
        if let Some(cached) = self.cache.get(text, for_defb) {
            debug!(text, "expression cache hit");
            let mut expression = cached.clone();
            expression.set_is_byte(is_byte);
            return Ok(expression);
        }

        debug!(text, "expression cache miss");
        let mut expression = Expression::parse(text, for_defb, is_byte, &self.config, symbols)?;
        expression.validate_and_postfixize()?;
        self.cache.insert(text, for_defb, expression.clone());
        Ok(expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::evaluator::Evaluation;
    use crate::symbols::SymbolTable;

    fn context() -> AssemblyContext {
        AssemblyContext::new(ExprConfig::default()).expect("context")
    }

    #[test]
    fn reuses_parsed_expressions() {
        let mut context = context();
        let table = SymbolTable::new();
        let first = context.parse("1 + 2", false, false, &table).expect("parse");
        let second = context.parse("1 + 2", false, true, &table).expect("parse");
        assert_eq!(first.parts(), second.parts());
        assert!(!first.is_byte());
        assert!(second.is_byte());
        assert_eq!(
            context.cache().stats(),
            CacheStats {
                entries: 1,
                hits: 1,
                misses: 1,
            }
        );
    }

    #[test]
    fn defb_mode_is_part_of_the_key() {
        let mut context = context();
        let table = SymbolTable::new();
        context.parse("'ABC'", true, false, &table).expect("defb");
        assert!(matches!(
            context.parse("'ABC'", false, false, &table),
            Err(ExprError::StringTooLong { .. })
        ));
        assert_eq!(context.cache().len(), 1);
    }

    #[test]
    fn never_caches_the_location_counter() {
        let mut context = context();
        let mut table = SymbolTable::new();
        table.set_location(Address::code(0x10));
        let first = context.parse("$ + 1", false, false, &table).expect("parse");
        table.set_location(Address::code(0x20));
        let second = context.parse("$ + 1", false, false, &table).expect("parse");
        assert!(context.cache().is_empty());
        assert_eq!(
            first.evaluate_if_no_symbols(),
            Ok(Evaluation::Resolved(Address::code(0x11)))
        );
        assert_eq!(
            second.evaluate_if_no_symbols(),
            Ok(Evaluation::Resolved(Address::code(0x21)))
        );
    }

    #[test]
    fn failed_parses_are_not_cached() {
        let mut context = context();
        let table = SymbolTable::new();
        assert!(context.parse("(1", false, false, &table).is_err());
        assert!(context.cache().is_empty());
    }

    #[test]
    fn new_run_and_radix_change_clear_the_cache() {
        let mut context = context();
        let table = SymbolTable::new();
        let decimal = context.parse("10", false, false, &table).expect("parse");
        assert_eq!(
            decimal.evaluate_if_no_symbols(),
            Ok(Evaluation::Resolved(Address::absolute(10)))
        );

        context.set_default_radix(10).expect("same radix");
        assert_eq!(context.cache().len(), 1);

        context.set_default_radix(16).expect("radix");
        assert!(context.cache().is_empty());
        let hex = context.parse("10", false, false, &table).expect("parse");
        assert_eq!(
            hex.evaluate_if_no_symbols(),
            Ok(Evaluation::Resolved(Address::absolute(0x10)))
        );

        context.begin_run();
        assert_eq!(context.cache().stats(), CacheStats::default());
        assert!(matches!(
            context.set_default_radix(17),
            Err(ConfigError::InvalidRadix { radix: 17 })
        ));
    }

    #[test]
    fn rejects_invalid_configuration() {
        let config = ExprConfig {
            default_radix: 1,
            ..ExprConfig::default()
        };
        assert!(AssemblyContext::new(config).is_err());
    }
}
