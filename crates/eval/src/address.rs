use std::fmt;

/// Memory segment an [`Address`] is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Absolute,
    Code,
    Data,
    Common,
}

impl AddressMode {
    /// Numeric mode code, as reported by `TYPE` and stored in link items.
    pub const fn code(self) -> u8 {
        match self {
            Self::Absolute => 0,
            Self::Code => 1,
            Self::Data => 2,
            Self::Common => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Absolute => "ABSOLUTE",
            Self::Code => "CODE",
            Self::Data => "DATA",
            Self::Common => "COMMON",
        }
    }
}

impl fmt::Display for AddressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A 16-bit value tagged with the segment it is relative to.
///
/// The common block name is present exactly when the mode is
/// [`AddressMode::Common`]; the constructors keep that invariant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    mode: AddressMode,
    value: u16,
    common_block: Option<String>,
}

impl Address {
    pub const fn absolute(value: u16) -> Self {
        Self {
            mode: AddressMode::Absolute,
            value,
            common_block: None,
        }
    }

    pub const fn code(value: u16) -> Self {
        Self {
            mode: AddressMode::Code,
            value,
            common_block: None,
        }
    }

    pub const fn data(value: u16) -> Self {
        Self {
            mode: AddressMode::Data,
            value,
            common_block: None,
        }
    }

    pub fn common(block: impl Into<String>, value: u16) -> Self {
        Self {
            mode: AddressMode::Common,
            value,
            common_block: Some(block.into()),
        }
    }

    /// All ones for true, zero for false.
    pub const fn from_bool(value: bool) -> Self {
        Self::absolute(if value { 0xFFFF } else { 0 })
    }

    pub const fn mode(&self) -> AddressMode {
        self.mode
    }

    pub const fn value(&self) -> u16 {
        self.value
    }

    pub fn common_block(&self) -> Option<&str> {
        self.common_block.as_deref()
    }

    pub const fn is_absolute(&self) -> bool {
        matches!(self.mode, AddressMode::Absolute)
    }

    pub const fn low_byte(&self) -> u8 {
        (self.value & 0xFF) as u8
    }

    pub const fn high_byte(&self) -> u8 {
        (self.value >> 8) as u8
    }

    /// Same mode and, for common blocks, the same block.
    pub fn same_mode_as(&self, other: &Address) -> bool {
        self.mode == other.mode && self.common_block == other.common_block
    }

    /// Copy of this address with another value in the same segment.
    pub fn with_value(&self, value: u16) -> Self {
        Self {
            mode: self.mode,
            value,
            common_block: self.common_block.clone(),
        }
    }

    /// Mode name used in diagnostics, e.g. `CODE` or `COMMON /BUF/`.
    pub fn mode_description(&self) -> String {
        match &self.common_block {
            Some(block) => format!("{} /{block}/", self.mode),
            None => self.mode.to_string(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:04X}h", self.mode_description(), self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_addresses_compare_block_names() {
        let a = Address::common("BUF", 1);
        let b = Address::common("BUF", 7);
        let c = Address::common("STACK", 1);
        assert!(a.same_mode_as(&b));
        assert!(!a.same_mode_as(&c));
        assert!(!Address::code(1).same_mode_as(&Address::data(1)));
    }

    #[test]
    fn with_value_keeps_segment() {
        let moved = Address::common("BUF", 1).with_value(0x1234);
        assert_eq!(moved.mode(), AddressMode::Common);
        assert_eq!(moved.common_block(), Some("BUF"));
        assert_eq!(moved.high_byte(), 0x12);
        assert_eq!(moved.low_byte(), 0x34);
    }

    #[test]
    fn displays_mode_and_hex_value() {
        assert_eq!(Address::code(0x69).to_string(), "CODE 0069h");
        assert_eq!(Address::common("BUF", 16).to_string(), "COMMON /BUF/ 0010h");
        assert_eq!(Address::from_bool(true), Address::absolute(0xFFFF));
    }
}
