//! Typed access to a decoded JSON object
//!
//! Every accessor names the schema and the full field path in its error, so
//! a rejected response says exactly which key broke the contract.

use crate::error::SchemaError;
use crate::schema::{SchemaTag, WireEnum};
use serde_json::{Map, Value};

pub(crate) struct Fields<'a> {
    schema: SchemaTag,
    prefix: Option<String>,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(schema: SchemaTag, map: &'a Map<String, Value>) -> Self {
        Self {
            schema,
            prefix: None,
            map,
        }
    }

    /// Accessor for an object nested under `prefix`
    pub(crate) fn nested<'b>(&self, prefix: String, map: &'b Map<String, Value>) -> Fields<'b> {
        Fields {
            schema: self.schema,
            prefix: Some(prefix),
            map,
        }
    }

    fn path(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.to_string(),
        }
    }

    fn missing(&self, key: &str) -> SchemaError {
        SchemaError::missing(self.schema, self.path(key))
    }

    fn wrong_type(&self, key: &str, expected: &'static str) -> SchemaError {
        SchemaError::wrong_type(self.schema, self.path(key), expected)
    }

    /// Present and non-null
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    pub(crate) fn optional_str(&self, key: &str) -> Result<Option<String>, SchemaError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.wrong_type(key, "a string")),
        }
    }

    pub(crate) fn required_str(&self, key: &str) -> Result<String, SchemaError> {
        self.optional_str(key)?.ok_or_else(|| self.missing(key))
    }

    pub(crate) fn required_bool(&self, key: &str) -> Result<bool, SchemaError> {
        match self.get(key) {
            None => Err(self.missing(key)),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(self.wrong_type(key, "a boolean")),
        }
    }

    pub(crate) fn optional_object(
        &self,
        key: &str,
    ) -> Result<Option<&'a Map<String, Value>>, SchemaError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(_) => Err(self.wrong_type(key, "an object")),
        }
    }

    pub(crate) fn required_array(&self, key: &str) -> Result<&'a Vec<Value>, SchemaError> {
        match self.get(key) {
            None => Err(self.missing(key)),
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(self.wrong_type(key, "an array")),
        }
    }

    /// Array whose elements must all be strings
    pub(crate) fn string_list(&self, key: &str, required: bool) -> Result<Vec<String>, SchemaError> {
        let items = match self.get(key) {
            None if required => return Err(self.missing(key)),
            None => return Ok(Vec::new()),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(self.wrong_type(key, "an array of strings")),
        };
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.wrong_type(key, "an array of strings"))
            })
            .collect()
    }

    /// Integer, integral float, or numeric string
    pub(crate) fn optional_int(&self, key: &str) -> Result<Option<i64>, SchemaError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                        .map(|f| f as i64)
                })
                .map(Some)
                .ok_or_else(|| self.wrong_type(key, "an integer")),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| self.wrong_type(key, "an integer")),
            Some(_) => Err(self.wrong_type(key, "an integer")),
        }
    }

    pub(crate) fn optional_count(&self, key: &str) -> Result<u32, SchemaError> {
        match self.optional_int(key)? {
            None => Ok(0),
            Some(n) => u32::try_from(n).map_err(|_| self.wrong_type(key, "a non-negative integer")),
        }
    }

    pub(crate) fn optional_f64(&self, key: &str) -> Result<Option<f64>, SchemaError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(_) => Err(self.wrong_type(key, "a number")),
        }
    }

    pub(crate) fn required_enum<E: WireEnum>(&self, key: &str) -> Result<E, SchemaError> {
        let raw = self.required_str(key)?;
        E::from_wire(raw.trim()).ok_or_else(|| SchemaError::InvalidEnum {
            schema: self.schema,
            field: self.path(key),
            value: raw,
            allowed: E::ALLOWED.join("|"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Severity;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn null_counts_as_missing() {
        let map = object(json!({"summary": null}));
        let fields = Fields::new(SchemaTag::Audit, &map);
        assert_eq!(
            fields.required_str("summary"),
            Err(SchemaError::missing(SchemaTag::Audit, "summary"))
        );
    }

    #[test]
    fn nested_paths_appear_in_errors() {
        let map = object(json!({"severity": "URGENT"}));
        let root = object(json!({}));
        let fields = Fields::new(SchemaTag::Audit, &root).nested("issues[3]".into(), &map);
        match fields.required_enum::<Severity>("severity") {
            Err(SchemaError::InvalidEnum { field, value, allowed, .. }) => {
                assert_eq!(field, "issues[3].severity");
                assert_eq!(value, "URGENT");
                assert_eq!(allowed, "CRITICAL|HIGH|MEDIUM|LOW");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn integers_accept_integral_floats_and_strings() {
        let map = object(json!({"a": 12, "b": 12.0, "c": "12", "d": 1.5, "e": true}));
        let fields = Fields::new(SchemaTag::Audit, &map);
        assert_eq!(fields.optional_int("a"), Ok(Some(12)));
        assert_eq!(fields.optional_int("b"), Ok(Some(12)));
        assert_eq!(fields.optional_int("c"), Ok(Some(12)));
        assert!(fields.optional_int("d").is_err());
        assert!(fields.optional_int("e").is_err());
        assert_eq!(fields.optional_int("missing"), Ok(None));
    }

    #[test]
    fn string_list_rejects_mixed_arrays() {
        let map = object(json!({"ok": ["a", "b"], "bad": ["a", 1]}));
        let fields = Fields::new(SchemaTag::Judge, &map);
        assert_eq!(fields.string_list("ok", true).unwrap(), vec!["a", "b"]);
        assert!(fields.string_list("bad", true).is_err());
        assert!(fields.string_list("absent", true).is_err());
        assert!(fields.string_list("absent", false).unwrap().is_empty());
    }

    #[test]
    fn negative_counts_are_rejected() {
        let map = object(json!({"n": -1}));
        let fields = Fields::new(SchemaTag::Judge, &map);
        assert!(fields.optional_count("n").is_err());
        assert_eq!(fields.optional_count("absent"), Ok(0));
    }
}
