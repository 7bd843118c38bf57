use indexmap::IndexMap;

use crate::address::Address;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolValue {
    Known(Address),
    /// Registered but not defined yet.
    Unknown,
    /// Defined in another module; resolved by the linker.
    External,
}

/// Result of resolving a name: the fully-qualified name plus what is known of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolHandle {
    pub name: String,
    pub value: SymbolValue,
}

impl SymbolHandle {
    pub fn is_external(&self) -> bool {
        matches!(self.value, SymbolValue::External)
    }

    pub fn address(&self) -> Option<&Address> {
        match &self.value {
            SymbolValue::Known(address) => Some(address),
            _ => None,
        }
    }
}

/// Symbol table seen from the expression evaluator.
pub trait SymbolResolver {
    /// Looks up `name`, registering it on first sight.
    ///
    /// Calling this repeatedly for the same name within a pass must not create
    /// duplicate registrations.
    fn resolve_symbol(&mut self, name: &str, is_external_ref: bool, is_root_ref: bool)
    -> SymbolHandle;

    /// Address bound to `$`.
    fn current_location(&self) -> Address;
}

/// In-memory symbol table with module-prefix name mangling.
///
/// Names are case-insensitive. Inside a module, references are prefixed with
/// `MODULE.` unless they are root references or external references.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: IndexMap<String, SymbolValue>,
    module: Option<String>,
    location: Address,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            symbols: IndexMap::new(),
            module: None,
            location: Address::code(0),
        }
    }

    pub fn set_module(&mut self, module: Option<&str>) {
        self.module = module.map(str::to_ascii_uppercase);
    }

    pub fn set_location(&mut self, location: Address) {
        self.location = location;
    }

    pub fn qualified_name(&self, name: &str, is_external_ref: bool, is_root_ref: bool) -> String {
        let name = name.to_ascii_uppercase();
        match &self.module {
            Some(module) if !is_root_ref && !is_external_ref => format!("{module}.{name}"),
            _ => name,
        }
    }

    /// Binds `name`, in the current module, to a value.
    pub fn define(&mut self, name: &str, address: Address) {
        let name = self.qualified_name(name, false, false);
        self.symbols.insert(name, SymbolValue::Known(address));
    }

    pub fn declare_external(&mut self, name: &str) {
        let name = self.qualified_name(name, true, false);
        self.symbols
            .entry(name)
            .and_modify(|value| {
                if matches!(value, SymbolValue::Unknown) {
                    *value = SymbolValue::External;
                }
            })
            .or_insert(SymbolValue::External);
    }

    pub fn get(&self, qualified_name: &str) -> Option<&SymbolValue> {
        self.symbols.get(&qualified_name.to_ascii_uppercase())
    }

    pub fn is_registered(&self, qualified_name: &str) -> bool {
        self.get(qualified_name).is_some()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Registered symbols in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SymbolValue)> {
        self.symbols
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }
}

impl SymbolResolver for SymbolTable {
    fn resolve_symbol(
        &mut self,
        name: &str,
        is_external_ref: bool,
        is_root_ref: bool,
    ) -> SymbolHandle {
        let name = self.qualified_name(name, is_external_ref, is_root_ref);
        let value = self
            .symbols
            .entry(name.clone())
            .and_modify(|value| {
                if is_external_ref && matches!(value, SymbolValue::Unknown) {
                    *value = SymbolValue::External;
                }
            })
            .or_insert(if is_external_ref {
                SymbolValue::External
            } else {
                SymbolValue::Unknown
            })
            .clone();
        SymbolHandle { name, value }
    }

    fn current_location(&self) -> Address {
        self.location.clone()
    }
}
