use super::{parse_str, FieldContext, FieldError, FieldResult, ScenarioParser};
use crate::model::{CheckValue, CheckValueList, JsonBigInt, JsonBytes, JsonUint64};
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use scenario_core::{OrderedJson, ADDRESS_LEN};

/// `"*"` in a check field
pub(crate) fn is_star(obj: &OrderedJson) -> bool {
    obj.as_str() == Some("*")
}

impl ScenarioParser {
    pub(crate) fn process_big_int(&self, obj: &OrderedJson) -> FieldResult<JsonBigInt> {
        let raw = parse_str(obj)?;
        let bytes = self.interpreter().interpret_string(raw)?;
        Ok(JsonBigInt::new(BigUint::from_bytes_be(&bytes), raw))
    }

    pub(crate) fn process_uint64(&self, obj: &OrderedJson) -> FieldResult<JsonUint64> {
        let big = self.process_big_int(obj)?;
        let value = big
            .value
            .to_u64()
            .ok_or_else(|| FieldError::new("value is not uint64"))?;
        Ok(JsonUint64::new(value, big.original))
    }

    pub(crate) fn process_check_big_int(
        &self,
        obj: &OrderedJson,
    ) -> FieldResult<CheckValue<JsonBigInt>> {
        if is_star(obj) {
            return Ok(CheckValue::Star);
        }
        self.process_big_int(obj).map(CheckValue::Exact)
    }

    pub(crate) fn process_check_uint64(
        &self,
        obj: &OrderedJson,
    ) -> FieldResult<CheckValue<JsonUint64>> {
        if is_star(obj) {
            return Ok(CheckValue::Star);
        }
        self.process_uint64(obj).map(CheckValue::Exact)
    }

    /// A single expression string
    pub(crate) fn process_string_as_bytes(&self, obj: &OrderedJson) -> FieldResult<JsonBytes> {
        let raw = parse_str(obj)?;
        let value = self.interpreter().interpret_string(raw)?;
        Ok(JsonBytes::from_string(value, raw))
    }

    /// Any subtree: lists and maps concatenate their parts
    pub(crate) fn process_sub_tree_as_bytes(&self, obj: &OrderedJson) -> FieldResult<JsonBytes> {
        let value = self.interpreter().interpret_sub_tree(obj)?;
        Ok(JsonBytes::from_tree(value, obj.clone()))
    }

    pub(crate) fn process_check_bytes(
        &self,
        obj: &OrderedJson,
    ) -> FieldResult<CheckValue<JsonBytes>> {
        if is_star(obj) {
            return Ok(CheckValue::Star);
        }
        self.process_sub_tree_as_bytes(obj).map(CheckValue::Exact)
    }

    pub(crate) fn process_check_list(&self, obj: &OrderedJson) -> FieldResult<CheckValueList> {
        if is_star(obj) {
            return Ok(CheckValueList::Star);
        }
        let items = obj
            .as_list()
            .ok_or_else(|| FieldError::new("not a JSON list"))?;
        let values = items
            .iter()
            .map(|item| self.process_check_bytes(item))
            .collect::<FieldResult<Vec<_>>>()?;
        Ok(CheckValueList::Values(values))
    }

    pub(crate) fn process_value_list(&self, obj: &OrderedJson) -> FieldResult<Vec<JsonBytes>> {
        let items = obj
            .as_list()
            .ok_or_else(|| FieldError::new("not a JSON list"))?;
        items
            .iter()
            .map(|item| self.process_sub_tree_as_bytes(item))
            .collect()
    }

    pub(crate) fn parse_account_address(&self, raw: &str) -> FieldResult<JsonBytes> {
        if raw.is_empty() {
            return Err(FieldError::new("missing account address"));
        }
        let value = self
            .interpreter()
            .interpret_string(raw)
            .context("invalid account address")?;
        if value.len() != ADDRESS_LEN {
            return Err(FieldError::new("account address is not 32 bytes in length"));
        }
        Ok(JsonBytes::from_string(value, raw))
    }
}

pub(crate) fn parse_string_list(obj: &OrderedJson) -> FieldResult<Vec<String>> {
    let items = obj
        .as_list()
        .ok_or_else(|| FieldError::new("not a JSON list"))?;
    items
        .iter()
        .map(|item| parse_str(item).map(str::to_string))
        .collect()
}
