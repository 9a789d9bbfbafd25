//! Byte expression interpreter

use crate::ojson::OrderedJson;
use crate::resolver::FileResolver;
use crate::types::{ADDRESS_LEN, SC_ADDRESS_LEADING_ZEROS, VM_TYPE_LEN};
use crate::{CoreError, CoreResult, Hash};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;
use std::sync::Arc;

const STR_PREFIXES: [&str; 3] = ["str:", "``", "''"];
const ADDRESS_PREFIX: &str = "address:";
const SC_ADDRESS_PREFIX: &str = "sc:";
const FILE_PREFIX: &str = "file:";
const KECCAK256_PREFIX: &str = "keccak256:";
const BIGUINT_PREFIX: &str = "biguint:";
const BIGFLOAT_PREFIX: &str = "bigfloat:";
const NESTED_PREFIX: &str = "nested:";

/// Fixed width prefixes with their byte width and signedness
const FIXED_WIDTH_PREFIXES: [(&str, usize, bool); 8] = [
    ("u64:", 8, false),
    ("u32:", 4, false),
    ("u16:", 2, false),
    ("u8:", 1, false),
    ("i64:", 8, true),
    ("i32:", 4, true),
    ("i16:", 2, true),
    ("i8:", 1, true),
];

/// VM type marker embedded in `sc:` addresses unless configured otherwise
pub const DEFAULT_VM_TYPE: [u8; VM_TYPE_LEN] = [5, 0];

/// Turns scenario value expressions into byte buffers
#[derive(Clone)]
pub struct ExprInterpreter {
    resolver: Option<Arc<dyn FileResolver>>,
    vm_type: [u8; VM_TYPE_LEN],
}

impl Default for ExprInterpreter {
    fn default() -> Self {
        Self {
            resolver: None,
            vm_type: DEFAULT_VM_TYPE,
        }
    }
}

impl std::fmt::Debug for ExprInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExprInterpreter")
            .field("has_resolver", &self.resolver.is_some())
            .field("vm_type", &self.vm_type)
            .finish()
    }
}

impl ExprInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn FileResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_vm_type(mut self, vm_type: [u8; VM_TYPE_LEN]) -> Self {
        self.vm_type = vm_type;
        self
    }

    pub fn vm_type(&self) -> [u8; VM_TYPE_LEN] {
        self.vm_type
    }

    pub fn resolver(&self) -> Option<&Arc<dyn FileResolver>> {
        self.resolver.as_ref()
    }

    /// Evaluate a JSON subtree: strings are interpreted, lists concatenate
    /// their items and maps concatenate their values in key order. Map keys
    /// only document the value.
    pub fn interpret_sub_tree(&self, obj: &OrderedJson) -> CoreResult<Vec<u8>> {
        match obj {
            OrderedJson::String(s) => self.interpret_string(s),
            OrderedJson::List(items) => {
                let mut concat = Vec::new();
                for item in items {
                    concat.extend(self.interpret_sub_tree(item)?);
                }
                Ok(concat)
            }
            OrderedJson::Map(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut concat = Vec::new();
                for (_, value) in entries {
                    concat.extend(self.interpret_sub_tree(value)?);
                }
                Ok(concat)
            }
            OrderedJson::Bool(_) => Err(CoreError::expr(
                "cannot interpret given JSON subtree as value",
            )),
        }
    }

    /// Evaluate a single expression string
    pub fn interpret_string(&self, raw: &str) -> CoreResult<Vec<u8>> {
        if raw.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(path) = raw.strip_prefix(FILE_PREFIX) {
            let resolver = self
                .resolver
                .as_ref()
                .ok_or_else(|| CoreError::expr("parser file resolver not provided"))?;
            return resolver.resolve_file_value(path);
        }

        if let Some(arg) = raw.strip_prefix(KECCAK256_PREFIX) {
            let value = self.interpret_string(arg).map_err(|e| {
                CoreError::expr(format!("cannot parse keccak256 argument: {e}"))
            })?;
            return Ok(Hash::keccak256(&value).as_bytes().to_vec());
        }

        if raw.contains('|') {
            let mut concat = Vec::new();
            for part in raw.split('|') {
                concat.extend(self.interpret_string(part)?);
            }
            return Ok(concat);
        }

        match raw {
            "false" => return Ok(Vec::new()),
            "true" => return Ok(vec![0x01]),
            _ => {}
        }

        for prefix in STR_PREFIXES {
            if let Some(s) = raw.strip_prefix(prefix) {
                return Ok(s.as_bytes().to_vec());
            }
        }

        if let Some(arg) = raw.strip_prefix(ADDRESS_PREFIX) {
            return address_expression(arg);
        }

        if let Some(arg) = raw.strip_prefix(SC_ADDRESS_PREFIX) {
            return sc_address_expression(arg, self.vm_type);
        }

        if let Some(result) = self.try_interpret_prefixed_number(raw)? {
            return Ok(result);
        }

        interpret_number(raw, 0)
    }

    fn try_interpret_prefixed_number(&self, raw: &str) -> CoreResult<Option<Vec<u8>>> {
        for (prefix, width, signed) in FIXED_WIDTH_PREFIXES {
            if let Some(arg) = raw.strip_prefix(prefix) {
                let result = if signed {
                    interpret_number(arg, width)?
                } else {
                    interpret_unsigned_fixed_width(arg, width)?
                };
                return Ok(Some(result));
            }
        }

        if let Some(arg) = raw.strip_prefix(BIGUINT_PREFIX) {
            return Ok(Some(length_prefixed(interpret_unsigned(arg)?)));
        }

        if raw.starts_with(BIGFLOAT_PREFIX) {
            return Err(CoreError::expr(format!("bigfloat values are not supported: {raw}")));
        }

        if let Some(arg) = raw.strip_prefix(NESTED_PREFIX) {
            return Ok(Some(length_prefixed(self.interpret_string(arg)?)));
        }

        Ok(None)
    }
}

fn length_prefixed(payload: Vec<u8>) -> Vec<u8> {
    let mut result = (payload.len() as u32).to_be_bytes().to_vec();
    result.extend(payload);
    result
}

/// Pads `name` with `_` into `len` bytes, truncating anything longer
fn padded_name(name: &str, len: usize) -> Vec<u8> {
    let mut bytes: Vec<u8> = name.as_bytes().iter().copied().take(len).collect();
    bytes.resize(len, b'_');
    bytes
}

fn split_shard(arg: &str) -> CoreResult<(&str, Option<u8>)> {
    match arg.rsplit_once('#') {
        Some((name, shard_hex)) => {
            let shard = hex::decode(shard_hex)
                .ok()
                .filter(|bytes| bytes.len() == 1)
                .ok_or_else(|| {
                    CoreError::expr(format!("invalid address shard id: {shard_hex}"))
                })?;
            Ok((name, Some(shard[0])))
        }
        None => Ok((arg, None)),
    }
}

fn address_expression(arg: &str) -> CoreResult<Vec<u8>> {
    let (name, shard) = split_shard(arg)?;
    Ok(match shard {
        Some(shard) => {
            let mut bytes = padded_name(name, ADDRESS_LEN - 1);
            bytes.push(shard);
            bytes
        }
        None => padded_name(name, ADDRESS_LEN),
    })
}

fn sc_address_expression(arg: &str, vm_type: [u8; VM_TYPE_LEN]) -> CoreResult<Vec<u8>> {
    let (name, shard) = split_shard(arg)?;
    let mut bytes = vec![0u8; SC_ADDRESS_LEADING_ZEROS];
    bytes.extend_from_slice(&vm_type);
    let name_len = ADDRESS_LEN - SC_ADDRESS_LEADING_ZEROS - VM_TYPE_LEN;
    match shard {
        Some(shard) => {
            bytes.extend(padded_name(name, name_len - 1));
            bytes.push(shard);
        }
        None => bytes.extend(padded_name(name, name_len)),
    }
    Ok(bytes)
}

/// `target_width == 0` means the minimal length that holds the result
fn interpret_number(raw: &str, target_width: usize) -> CoreResult<Vec<u8>> {
    if raw.contains('.') {
        return Err(CoreError::expr(format!(
            "decimal point numbers are not supported: {raw}"
        )));
    }

    match raw.as_bytes().first() {
        None => Err(CoreError::expr("empty number")),
        Some(b'-') | Some(b'+') => interpret_signed(raw, target_width),
        Some(_) if target_width == 0 => interpret_unsigned(raw),
        Some(_) => interpret_unsigned_fixed_width(raw, target_width),
    }
}

fn interpret_signed(raw: &str, target_width: usize) -> CoreResult<Vec<u8>> {
    let magnitude = BigUint::from_bytes_be(&interpret_unsigned(&raw[1..])?);
    let sign = if raw.starts_with('-') {
        Sign::Minus
    } else {
        Sign::Plus
    };
    let number = BigInt::from_biguint(sign, magnitude);
    let minimal = twos_complement_minimal(&number);
    if target_width == 0 {
        return Ok(minimal);
    }
    if minimal.len() > target_width {
        return Err(does_not_fit(raw, target_width));
    }
    let fill = if number.sign() == Sign::Minus { 0xff } else { 0x00 };
    let mut result = vec![fill; target_width - minimal.len()];
    result.extend(minimal);
    Ok(result)
}

/// Minimal two's complement encoding, empty for zero
pub fn twos_complement_minimal(number: &BigInt) -> Vec<u8> {
    if number.is_zero() {
        return Vec::new();
    }
    number.to_signed_bytes_be()
}

fn does_not_fit(raw: &str, width: usize) -> CoreError {
    CoreError::expr(format!(
        "representation of {raw} does not fit in {width} bytes"
    ))
}

fn interpret_unsigned(raw: &str) -> CoreResult<Vec<u8>> {
    let cleaned: String = raw.chars().filter(|c| *c != '_' && *c != ',').collect();

    if let Some(digits) = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        let padded = if digits.len() % 2 == 1 {
            format!("0{digits}")
        } else {
            digits.to_string()
        };
        return Ok(hex::decode(padded)?);
    }

    if let Some(digits) = cleaned
        .strip_prefix("0b")
        .or_else(|| cleaned.strip_prefix("0B"))
    {
        let value = BigUint::parse_bytes(digits.as_bytes(), 2)
            .ok_or_else(|| CoreError::expr(format!("could not parse binary value: {raw}")))?;
        return Ok(biguint_minimal(&value));
    }

    if cleaned.starts_with('-') {
        return Err(CoreError::expr(format!(
            "negative numbers not allowed in this context: {raw}"
        )));
    }

    let value = BigUint::parse_bytes(cleaned.as_bytes(), 10)
        .ok_or_else(|| CoreError::expr(format!("could not parse base 10 value: {raw}")))?;
    Ok(biguint_minimal(&value))
}

fn interpret_unsigned_fixed_width(raw: &str, width: usize) -> CoreResult<Vec<u8>> {
    let bytes = interpret_unsigned(raw)?;
    if bytes.len() > width {
        return Err(does_not_fit(raw, width));
    }
    let mut result = vec![0u8; width - bytes.len()];
    result.extend(bytes);
    Ok(result)
}

/// Minimal big-endian encoding, empty for zero
pub fn biguint_minimal(value: &BigUint) -> Vec<u8> {
    if value.is_zero() {
        Vec::new()
    } else {
        value.to_bytes_be()
    }
}
