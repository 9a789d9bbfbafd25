//! Renders byte buffers back into expression syntax for diagnostics

use crate::types::{ADDRESS_LEN, SC_ADDRESS_LEADING_ZEROS, VM_TYPE_LEN};
use num_bigint::BigUint;

/// Buffers shorter than this are also shown as a decimal number
const MAX_BYTES_INTERPRETED_AS_NUMBER: usize = 15;

/// Hex characters shown before code gets abbreviated
const CODE_PREVIEW_HEX_CHARS: usize = 20;

/// How a buffer is expected to be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExprHint {
    #[default]
    NoHint,
    Number,
    Str,
    Address,
    Code,
}

/// Produces human readable expressions from raw bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct ExprReconstructor;

impl ExprReconstructor {
    pub fn new() -> Self {
        Self
    }

    pub fn reconstruct(&self, value: &[u8], hint: ExprHint) -> String {
        match hint {
            ExprHint::Number => BigUint::from_bytes_be(value).to_string(),
            ExprHint::Str => format!("str:{}", String::from_utf8_lossy(value)),
            ExprHint::Address => address_pretty(value),
            ExprHint::Code => code_pretty(value),
            ExprHint::NoHint => unknown_byte_array_pretty(value),
        }
    }

    pub fn reconstruct_from_u64(&self, value: u64) -> String {
        value.to_string()
    }

    /// `["a", "b"]` style rendering of a list of values
    pub fn reconstruct_list(&self, values: &[Vec<u8>], hint: ExprHint) -> String {
        let items: Vec<String> = values
            .iter()
            .map(|value| format!("\"{}\"", self.reconstruct(value, hint)))
            .collect();
        format!("[{}]", items.join(", "))
    }
}

fn can_interpret_as_string(bytes: &[u8]) -> bool {
    !bytes.is_empty() && bytes.iter().all(|b| (32..=126).contains(b))
}

fn unknown_byte_array_pretty(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    let hex = hex::encode(bytes);

    if can_interpret_as_string(bytes) {
        return format!("0x{hex} (str:{})", String::from_utf8_lossy(bytes));
    }

    if bytes.len() < MAX_BYTES_INTERPRETED_AS_NUMBER {
        return format!("0x{hex} ({})", BigUint::from_bytes_be(bytes));
    }

    format!("0x{hex} (str:{:?})", String::from_utf8_lossy(bytes))
}

fn trim_padding(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .rposition(|b| *b != b'_')
        .map_or(0, |pos| pos + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn address_pretty(value: &[u8]) -> String {
    if value.len() != ADDRESS_LEN {
        return unknown_byte_array_pretty(value);
    }
    let last = value[ADDRESS_LEN - 1];

    if value[..SC_ADDRESS_LEADING_ZEROS].iter().all(|b| *b == 0) {
        let name_start = SC_ADDRESS_LEADING_ZEROS + VM_TYPE_LEN;
        if last == b'_' {
            return format!("sc:{}", trim_padding(&value[name_start..]));
        }
        return format!(
            "sc:{}#{last:02x}",
            trim_padding(&value[name_start..ADDRESS_LEN - 1])
        );
    }

    if last == b'_' {
        return format!("address:{}", trim_padding(value));
    }
    format!(
        "address:{}#{last:02x}",
        trim_padding(&value[..ADDRESS_LEN - 1])
    )
}

fn code_pretty(value: &[u8]) -> String {
    if value.is_empty() {
        return String::new();
    }
    let encoded = hex::encode(value);
    if encoded.len() > CODE_PREVIEW_HEX_CHARS {
        format!("0x{}...", &encoded[..CODE_PREVIEW_HEX_CHARS])
    } else {
        format!("0x{encoded}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ExprInterpreter;
    use proptest::prelude::*;

    fn er() -> ExprReconstructor {
        ExprReconstructor::new()
    }

    #[test]
    fn test_number_hint() {
        assert_eq!(er().reconstruct(&[], ExprHint::Number), "0");
        assert_eq!(er().reconstruct(&[0], ExprHint::Number), "0");
        assert_eq!(er().reconstruct(&[1, 0], ExprHint::Number), "256");
        assert_eq!(er().reconstruct_from_u64(12), "12");
    }

    #[test]
    fn test_address_hint() {
        let ei = ExprInterpreter::new().with_vm_type(*b"VM");
        for (expr, expected) in [
            ("address:", "address:"),
            ("address:an_address", "address:an_address"),
            ("address:#05", "address:#05"),
            ("address:a#bb", "address:a#bb"),
            ("address:1234567890123456789012345678901\x01", "address:1234567890123456789012345678901#01"),
            ("sc:a", "sc:a"),
            ("sc:123456789012345678912s", "sc:123456789012345678912#73"),
            ("sc:a#44", "sc:a#44"),
        ] {
            let bytes = ei.interpret_string(expr).unwrap();
            assert_eq!(er().reconstruct(&bytes, ExprHint::Address), expected);
        }
        assert_eq!(er().reconstruct(b"ab", ExprHint::Address), "0x6162 (str:ab)");
    }

    #[test]
    fn test_unknown_hint() {
        assert_eq!(er().reconstruct(&[], ExprHint::NoHint), "");
        assert_eq!(er().reconstruct(b"abc", ExprHint::NoHint), "0x616263 (str:abc)");
        assert_eq!(er().reconstruct(&[1, 0], ExprHint::NoHint), "0x0100 (256)");
        let long = [0u8; 16];
        assert_eq!(
            er().reconstruct(&long, ExprHint::NoHint),
            format!("0x{} (str:{:?})", "00".repeat(16), "\0".repeat(16))
        );
    }

    #[test]
    fn test_code_and_list() {
        assert_eq!(er().reconstruct(&[0xab; 4], ExprHint::Code), "0xabababab");
        assert_eq!(
            er().reconstruct(&[0xab; 20], ExprHint::Code),
            format!("0x{}...", "ab".repeat(10))
        );
        assert_eq!(
            er().reconstruct_list(&[vec![5], b"x".to_vec()], ExprHint::Number),
            r#"["5", "120"]"#
        );
        assert_eq!(er().reconstruct_list(&[], ExprHint::NoHint), "[]");
    }

    #[test]
    fn test_empty_code_renders_empty() {
        assert_eq!(er().reconstruct(&[], ExprHint::Code), "");
        assert_eq!(er().reconstruct(&[0x01], ExprHint::Code), "0x01");
    }

    proptest! {
        #[test]
        fn prop_number_round_trip(n in any::<u128>()) {
            let bytes = ExprInterpreter::new().interpret_string(&n.to_string()).unwrap();
            let text = er().reconstruct(&bytes, ExprHint::Number);
            prop_assert_eq!(ExprInterpreter::new().interpret_string(&text).unwrap(), bytes);
        }

        #[test]
        fn prop_address_round_trip(name in "[a-z0-9]{0,34}", shard in prop::option::of(any::<u8>()), sc in any::<bool>()) {
            let ei = ExprInterpreter::new();
            let prefix = if sc { "sc:" } else { "address:" };
            let expr = match shard {
                Some(shard) => format!("{prefix}{name}#{shard:02x}"),
                None => format!("{prefix}{name}"),
            };
            let bytes = ei.interpret_string(&expr).unwrap();
            let text = er().reconstruct(&bytes, ExprHint::Address);
            prop_assert_eq!(ei.interpret_string(&text).unwrap(), bytes);
        }

        #[test]
        fn prop_str_round_trip(s in "[a-zA-Z0-9 :_]{0,40}") {
            let ei = ExprInterpreter::new();
            let bytes = ei.interpret_string(&format!("str:{s}")).unwrap();
            let text = er().reconstruct(&bytes, ExprHint::Str);
            prop_assert_eq!(ei.interpret_string(&text).unwrap(), bytes);
        }
    }
}
