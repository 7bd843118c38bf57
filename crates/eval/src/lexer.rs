use crate::address::Address;
use crate::config::ExprConfig;
use crate::encoding::StringEncoding;
use crate::error::ExprError;
use crate::expression::{ExpressionPart, SymbolReference};
use crate::operators::OperatorId;
use crate::symbols::SymbolResolver;

/// Splits one expression string into parts, in source order.
///
/// A lexer owns its own cursor and is built fresh for every expression.
pub(crate) struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    radix: u32,
    encoding: StringEncoding,
    escapes_enabled: bool,
    for_defb: bool,
    symbols: &'a dyn SymbolResolver,
    parts: Vec<ExpressionPart>,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(
        input: &'a str,
        config: &ExprConfig,
        for_defb: bool,
        symbols: &'a dyn SymbolResolver,
    ) -> Self {
        debug_assert!(
            config.validate().is_ok(),
            "radix {} out of range",
            config.default_radix
        );
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            radix: config.default_radix,
            encoding: config.encoding,
            escapes_enabled: config.escapes_enabled,
            for_defb,
            symbols,
            parts: Vec::new(),
        }
    }

    pub(crate) fn lex_all(mut self) -> Result<Vec<ExpressionPart>, ExprError> {
        loop {
            self.skip_ws();
            let Some(ch) = self.peek_char(0) else {
                break;
            };
            let part = match ch {
                '0'..='9' => self.lex_number()?,
                '#' => self.lex_prefixed_number(16)?,
                '%' => self.lex_prefixed_number(2)?,
                '\'' | '"' => self.lex_string()?,
                'x' | 'X' if self.peek_char(1) == Some('\'') => self.lex_hex_string()?,
                '+' | '-' => self.lex_sign(ch),
                '*' => self.single(ExpressionPart::Operator(OperatorId::Multiply)),
                '/' => self.single(ExpressionPart::Operator(OperatorId::Divide)),
                '=' => self.single(ExpressionPart::Operator(OperatorId::Eq)),
                '(' => self.single(ExpressionPart::OpeningParen),
                ')' => self.single(ExpressionPart::ClosingParen),
                ':' => self.lex_word()?,
                ch if is_symbol_start(ch) => self.lex_word()?,
                _ => return Err(self.unexpected_character(self.pos)),
            };
            self.parts.push(part);
        }
        Ok(self.parts)
    }

    fn single(&mut self, part: ExpressionPart) -> ExpressionPart {
        self.pos += 1;
        part
    }

    fn lex_sign(&mut self, ch: char) -> ExpressionPart {
        self.pos += 1;
        let unary = matches!(
            self.parts.last(),
            None | Some(ExpressionPart::Operator(_) | ExpressionPart::OpeningParen)
        );
        let id = match (ch, unary) {
            ('+', true) => OperatorId::UnaryPlus,
            ('+', false) => OperatorId::Plus,
            (_, true) => OperatorId::UnaryMinus,
            (_, false) => OperatorId::Minus,
        };
        ExpressionPart::Operator(id)
    }

    fn lex_number(&mut self) -> Result<ExpressionPart, ExprError> {
        let start = self.pos;
        self.take_while(|ch| ch.is_ascii_alphanumeric());
        let literal = &self.input[start..self.pos];
        let (digits, radix) = split_radix_suffix(literal, self.radix);
        let value = parse_digits(digits, radix).ok_or_else(|| ExprError::InvalidNumber {
            literal: literal.to_string(),
            column: start + 1,
        })?;
        Ok(ExpressionPart::Address(Address::absolute(value)))
    }

    fn lex_prefixed_number(&mut self, radix: u32) -> Result<ExpressionPart, ExprError> {
        let start = self.pos;
        self.pos += 1;
        let digits_start = self.pos;
        self.take_while(|ch| ch.is_ascii_alphanumeric());
        let value = parse_digits(&self.input[digits_start..self.pos], radix).ok_or_else(|| {
            ExprError::InvalidNumber {
                literal: self.input[start..self.pos].to_string(),
                column: start + 1,
            }
        })?;
        Ok(ExpressionPart::Address(Address::absolute(value)))
    }

    /// `x'1F2E'`: always hexadecimal, empty means zero.
    fn lex_hex_string(&mut self) -> Result<ExpressionPart, ExprError> {
        let start = self.pos;
        self.pos += 2;
        let digits_start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\'' {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() {
            return Err(ExprError::UnterminatedString { column: start + 1 });
        }
        let digits = &self.input[digits_start..self.pos];
        self.pos += 1;
        let value = if digits.is_empty() {
            0
        } else {
            parse_digits(digits, 16).ok_or_else(|| ExprError::InvalidNumber {
                literal: self.input[start..self.pos].to_string(),
                column: start + 1,
            })?
        };
        Ok(ExpressionPart::Address(Address::absolute(value)))
    }

    fn lex_string(&mut self) -> Result<ExpressionPart, ExprError> {
        let start = self.pos;
        let delimiter = self.bytes[start] as char;
        let escapes = self.escapes_enabled && delimiter == '"';
        self.pos += 1;

        let mut bytes = Vec::new();
        loop {
            let Some(ch) = self.next_char() else {
                return Err(ExprError::UnterminatedString { column: start + 1 });
            };
            match ch {
                ch if ch == delimiter && !escapes && self.peek_char(0) == Some(delimiter) => {
                    self.pos += 1;
                }
                ch if ch == delimiter => break,
                '\\' if escapes => {
                    self.lex_escape(&mut bytes)?;
                    continue;
                }
                _ => {}
            }
            if !self.encoding.encode_char(ch, &mut bytes) {
                return Err(ExprError::UnencodableCharacter {
                    ch,
                    encoding: self.encoding,
                    column: self.pos - ch.len_utf8() + 1,
                });
            }
        }

        let text = self.input[start..self.pos].to_string();
        if self.for_defb {
            return Ok(ExpressionPart::RawBytes { bytes, text });
        }
        let value = match bytes.as_slice() {
            [] => 0,
            [low] => u16::from(*low),
            [low, high] => u16::from_le_bytes([*low, *high]),
            _ => {
                return Err(ExprError::StringTooLong {
                    text,
                    column: start + 1,
                });
            }
        };
        Ok(ExpressionPart::Address(Address::absolute(value)))
    }

    /// Backslash already consumed.
    fn lex_escape(&mut self, bytes: &mut Vec<u8>) -> Result<(), ExprError> {
        let escape_start = self.pos - 1;
        let Some(code) = self.next_char() else {
            return Err(ExprError::UnterminatedString {
                column: escape_start + 1,
            });
        };
        let byte = match code {
            'a' => 0x07,
            'b' => 0x08,
            'e' => 0x1B,
            'f' => 0x0C,
            'n' => b'\n',
            'r' => b'\r',
            't' => b'\t',
            'v' => 0x0B,
            '0' => 0x00,
            '\\' | '\'' | '"' => code as u8,
            'x' => {
                let digits_start = self.pos;
                while self.pos - digits_start < 2
                    && self.peek_char(0).is_some_and(|ch| ch.is_ascii_hexdigit())
                {
                    self.pos += 1;
                }
                u8::from_str_radix(&self.input[digits_start..self.pos], 16)
                    .map_err(|_| self.invalid_escape(escape_start))?
            }
            _ => return Err(self.invalid_escape(escape_start)),
        };
        bytes.push(byte);
        Ok(())
    }

    fn invalid_escape(&self, escape_start: usize) -> ExprError {
        ExprError::InvalidEscape {
            sequence: self.input[escape_start..self.pos].to_string(),
            column: escape_start + 1,
        }
    }

    fn lex_word(&mut self) -> Result<ExpressionPart, ExprError> {
        let start = self.pos;
        let is_root_ref = self.peek_char(0) == Some(':');
        if is_root_ref {
            self.pos += 1;
        }
        if !self.peek_char(0).is_some_and(is_symbol_start) {
            return Err(self.unexpected_character(start));
        }
        let name_start = self.pos;
        self.take_while(is_symbol_char);
        let name = &self.input[name_start..self.pos];
        let is_external_ref = self.input[self.pos..].starts_with("##");
        if is_external_ref {
            self.pos += 2;
        }

        if !is_root_ref && !is_external_ref {
            if name == "$" {
                return Ok(ExpressionPart::Address(self.symbols.current_location()));
            }
            match OperatorId::from_keyword(name) {
                Some(OperatorId::Nul) => return Ok(self.lex_nul()),
                Some(id) => return Ok(ExpressionPart::Operator(id)),
                None => {}
            }
        }

        Ok(ExpressionPart::Symbol(SymbolReference {
            name: name.to_string(),
            is_external_ref,
            is_root_ref,
        }))
    }

    /// `NUL` swallows the rest of the text and becomes true when nothing follows.
    fn lex_nul(&mut self) -> ExpressionPart {
        let rest = &self.input[self.pos..];
        let rest_is_empty = rest.trim_matches(|ch: char| ch == ' ' || ch == '\t').is_empty();
        self.pos = self.input.len();
        self.parts.push(ExpressionPart::Operator(OperatorId::Nul));
        ExpressionPart::Address(Address::from_bool(rest_is_empty))
    }

    fn unexpected_character(&self, pos: usize) -> ExprError {
        let ch = self.input[pos..].chars().next().unwrap_or(' ');
        ExprError::UnexpectedCharacter {
            ch,
            column: pos + 1,
        }
    }

    fn skip_ws(&mut self) {
        self.take_while(|ch| ch == ' ' || ch == '\t');
    }

    fn take_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.peek_char(0).is_some_and(&predicate) {
            self.pos += 1;
        }
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.input[self.pos..].chars().next()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    /// Byte-wise peek; only meaningful for ASCII.
    fn peek_char(&self, offset: usize) -> Option<char> {
        self.bytes.get(self.pos + offset).map(|b| *b as char)
    }
}

fn is_symbol_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || matches!(ch, '?' | '_' | '@' | '.' | '$')
}

fn is_symbol_char(ch: char) -> bool {
    is_symbol_start(ch) || ch.is_ascii_digit()
}

/// Separates a radix suffix from a number literal.
///
/// A suffix letter that is also a digit of the default radix stays a digit,
/// so `12d` is hexadecimal when the default radix is 16.
fn split_radix_suffix(literal: &str, radix: u32) -> (&str, u32) {
    let Some(last) = literal.chars().last() else {
        return (literal, radix);
    };
    let body = &literal[..literal.len() - last.len_utf8()];
    let is_digit = last.is_digit(radix);
    match last.to_ascii_lowercase() {
        'h' => (body, 16),
        'b' if !is_digit => (body, 2),
        'd' if !is_digit => (body, 10),
        'o' | 'q' => (body, 8),
        _ => (literal, radix),
    }
}

/// Overflow truncates to 16 bits.
fn parse_digits(digits: &str, radix: u32) -> Option<u16> {
    if digits.is_empty() {
        return None;
    }
    let mut value: u16 = 0;
    for ch in digits.chars() {
        let digit = ch.to_digit(radix)?;
        value = value.wrapping_mul(radix as u16).wrapping_add(digit as u16);
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolTable;

    fn lex_with(
        text: &str,
        config: &ExprConfig,
        for_defb: bool,
    ) -> Result<Vec<ExpressionPart>, ExprError> {
        let mut symbols = SymbolTable::new();
        symbols.set_location(Address::code(0x0120));
        Lexer::new(text, config, for_defb, &symbols).lex_all()
    }

    fn lex(text: &str) -> Result<Vec<ExpressionPart>, ExprError> {
        lex_with(text, &ExprConfig::default(), false)
    }

    fn number_at(text: &str, radix: u32) -> Result<u16, ExprError> {
        let config = ExprConfig::with_radix(radix).expect("radix");
        match lex_with(text, &config, false)?.as_slice() {
            [ExpressionPart::Address(address)] => Ok(address.value()),
            other => panic!("expected a single number, got {other:?}"),
        }
    }

    fn abs(value: u16) -> ExpressionPart {
        ExpressionPart::Address(Address::absolute(value))
    }

    fn op(id: OperatorId) -> ExpressionPart {
        ExpressionPart::Operator(id)
    }

    #[test]
    fn number_prefixes_and_suffixes() {
        assert_eq!(number_at("#1F", 10), Ok(0x1F));
        assert_eq!(number_at("0FFh", 10), Ok(0xFF));
        assert_eq!(number_at("%1010", 10), Ok(0b1010));
        assert_eq!(number_at("1010b", 10), Ok(0b1010));
        assert_eq!(number_at("777o", 10), Ok(0o777));
        assert_eq!(number_at("777Q", 10), Ok(0o777));
        assert_eq!(number_at("1234", 10), Ok(1234));
        assert_eq!(number_at("1234", 8), Ok(0o1234));
        assert_eq!(number_at("101", 2), Ok(5));
    }

    #[test]
    fn suffix_letters_that_are_digits_stay_digits() {
        assert_eq!(number_at("1234d", 16), Ok(0x234D));
        assert_eq!(number_at("1234d", 10), Ok(1234));
        assert_eq!(number_at("101b", 16), Ok(0x101B));
        assert_eq!(number_at("101b", 8), Ok(5));
        assert_eq!(number_at("1234D", 12), Ok(1234));
    }

    #[test]
    fn decimal_suffix_matches_plain_decimal() {
        for text in ["0", "7", "99", "1234", "65535", "32768"] {
            let decimal = number_at(text, 10).expect("decimal");
            for radix in 2..=13 {
                assert_eq!(
                    number_at(&format!("{text}d"), radix),
                    Ok(decimal),
                    "{text}d at radix {radix}"
                );
            }
        }
    }

    #[test]
    fn numbers_truncate_to_sixteen_bits() {
        assert_eq!(number_at("65536", 10), Ok(0));
        assert_eq!(number_at("12345h", 10), Ok(0x2345));
    }

    #[test]
    fn hex_string_literal_ignores_default_radix() {
        assert_eq!(number_at("x'12eF'", 2), Ok(0x12EF));
        assert_eq!(number_at("X'12eF'", 10), Ok(0x12EF));
        assert_eq!(number_at("x''", 10), Ok(0));
        assert!(matches!(
            number_at("x'12", 10),
            Err(ExprError::UnterminatedString { column: 1 })
        ));
        assert!(matches!(
            number_at("x'1G'", 10),
            Err(ExprError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn malformed_numbers_are_errors() {
        assert_eq!(
            lex("1 + 12G"),
            Err(ExprError::InvalidNumber {
                literal: "12G".to_string(),
                column: 5,
            })
        );
        assert!(matches!(lex("#"), Err(ExprError::InvalidNumber { .. })));
        assert!(matches!(lex("%102"), Err(ExprError::InvalidNumber { .. })));
        assert!(number_at("12", 2).is_err());
    }

    #[test]
    fn strings_fold_into_words() {
        assert_eq!(lex("'AB'"), Ok(vec![abs(0x4241)]));
        assert_eq!(lex("\"A\""), Ok(vec![abs(0x41)]));
        assert_eq!(lex("''"), Ok(vec![abs(0)]));
        assert_eq!(lex("''''"), Ok(vec![abs(0x27)]));
        assert_eq!(lex("\"a\"\"\""), Ok(vec![abs(0x2261)]));
    }

    #[test]
    fn long_strings_need_defb_mode() {
        assert_eq!(
            lex("'ABC'"),
            Err(ExprError::StringTooLong {
                text: "'ABC'".to_string(),
                column: 1,
            })
        );
        assert_eq!(
            lex("'ABC'").expect_err("too long").to_string(),
            "the string 'ABC' generates more than two bytes"
        );
        assert_eq!(
            lex_with("'ABC'", &ExprConfig::default(), true),
            Ok(vec![ExpressionPart::RawBytes {
                bytes: b"ABC".to_vec(),
                text: "'ABC'".to_string(),
            }])
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert_eq!(
            lex("1 + 'AB"),
            Err(ExprError::UnterminatedString { column: 5 })
        );
    }

    #[test]
    fn escapes_apply_to_double_quotes_only_when_enabled() {
        let config = ExprConfig {
            escapes_enabled: true,
            ..ExprConfig::default()
        };
        assert_eq!(lex_with("\"\\n\"", &config, false), Ok(vec![abs(0x0A)]));
        assert_eq!(
            lex_with("\"\\x41\\\"\"", &config, false),
            Ok(vec![abs(0x2241)])
        );
        assert_eq!(lex_with("'\\n'", &config, false), Ok(vec![abs(0x6E5C)]));
        assert_eq!(lex("\"\\n\""), Ok(vec![abs(0x6E5C)]));
        assert!(matches!(
            lex_with("\"\\q\"", &config, false),
            Err(ExprError::InvalidEscape { column: 2, .. })
        ));
    }

    #[test]
    fn strings_use_the_configured_encoding() {
        assert!(matches!(
            lex("'é'"),
            Err(ExprError::UnencodableCharacter { ch: 'é', column: 2, .. })
        ));
        let latin1 = ExprConfig {
            encoding: StringEncoding::Latin1,
            ..ExprConfig::default()
        };
        assert_eq!(lex_with("'é'", &latin1, false), Ok(vec![abs(0xE9)]));
        let utf8 = ExprConfig {
            encoding: StringEncoding::Utf8,
            ..ExprConfig::default()
        };
        assert_eq!(lex_with("'é'", &utf8, false), Ok(vec![abs(0xA9C3)]));
    }

    #[test]
    fn signs_are_unary_after_operators_and_parens() {
        assert_eq!(
            lex("-(-3-4)"),
            Ok(vec![
                op(OperatorId::UnaryMinus),
                ExpressionPart::OpeningParen,
                op(OperatorId::UnaryMinus),
                abs(3),
                op(OperatorId::Minus),
                abs(4),
                ExpressionPart::ClosingParen,
            ])
        );
        assert_eq!(
            lex("1 + +2"),
            Ok(vec![abs(1), op(OperatorId::Plus), op(OperatorId::UnaryPlus), abs(2)])
        );
        assert_eq!(
            lex("HIGH -1"),
            Ok(vec![op(OperatorId::High), op(OperatorId::UnaryMinus), abs(1)])
        );
    }

    #[test]
    fn words_become_operators_symbols_or_location() {
        assert_eq!(
            lex("foo and 2 MOD bar##"),
            Ok(vec![
                ExpressionPart::Symbol(SymbolReference {
                    name: "foo".to_string(),
                    is_external_ref: false,
                    is_root_ref: false,
                }),
                op(OperatorId::And),
                abs(2),
                op(OperatorId::Mod),
                ExpressionPart::Symbol(SymbolReference {
                    name: "bar".to_string(),
                    is_external_ref: true,
                    is_root_ref: false,
                }),
            ])
        );
        assert_eq!(
            lex("$+2"),
            Ok(vec![
                ExpressionPart::Address(Address::code(0x0120)),
                op(OperatorId::Plus),
                abs(2),
            ])
        );
        assert_eq!(
            lex(":?start.1"),
            Ok(vec![ExpressionPart::Symbol(SymbolReference {
                name: "?start.1".to_string(),
                is_external_ref: false,
                is_root_ref: true,
            })])
        );
        assert_eq!(lex("1=1"), Ok(vec![abs(1), op(OperatorId::Eq), abs(1)]));
    }

    #[test]
    fn nul_discards_the_rest_of_the_text() {
        assert_eq!(
            lex("1 2 NUL"),
            Ok(vec![abs(1), abs(2), op(OperatorId::Nul), abs(0xFFFF)])
        );
        assert_eq!(
            lex("1 2 nul 3 4 FOO"),
            Ok(vec![abs(1), abs(2), op(OperatorId::Nul), abs(0)])
        );
    }

    #[test]
    fn unexpected_characters_are_reported() {
        assert_eq!(
            lex("1 & 2"),
            Err(ExprError::UnexpectedCharacter { ch: '&', column: 3 })
        );
        assert_eq!(
            lex(": 1"),
            Err(ExprError::UnexpectedCharacter { ch: ':', column: 1 })
        );
    }
}
