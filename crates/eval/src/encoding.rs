//! Output encodings for string literals.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub enum StringEncoding {
    #[default]
    Ascii,
    Latin1,
    Utf8,
}

impl StringEncoding {
    pub fn canonical_name(self) -> &'static str {
        match self {
            Self::Ascii => "ascii",
            Self::Latin1 => "latin1",
            Self::Utf8 => "utf8",
        }
    }

    /// Appends the encoded form of `ch` to `out`.
    ///
    /// Returns `false`, leaving `out` untouched, when the encoding has no
    /// representation for the character.
    pub fn encode_char(self, ch: char, out: &mut Vec<u8>) -> bool {
        match self {
            Self::Ascii if ch.is_ascii() => out.push(ch as u8),
            Self::Latin1 if (ch as u32) <= 0xFF => out.push(ch as u32 as u8),
            Self::Utf8 => {
                let mut buffer = [0; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buffer).as_bytes());
            }
            _ => return false,
        }
        true
    }

}

impl fmt::Display for StringEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown string encoding '{0}'")]
pub struct UnknownEncoding(pub String);

impl FromStr for StringEncoding {
    type Err = UnknownEncoding;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(Self::Latin1),
            "utf8" | "utf-8" => Ok(Self::Utf8),
            _ => Err(UnknownEncoding(name.to_string())),
        }
    }
}
