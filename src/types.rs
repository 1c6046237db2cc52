// Copyright 2026 reflect-rpc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The type model: immutable descriptions of primitives, enumerations, named
//! records, and typed arrays, plus their projection to the introspection wire
//! shape described in the crate's module-level docs.
//!
//! Enumerations and records are built through their respective builders
//! (`EnumType::new`/`add_value`, `RecordType::new`/`add_field`) and only
//! become part of a [`crate::registry::Registry`] once handed to
//! `RegistryBuilder::add_custom_type`, at which point they are frozen.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

/// A parsed type tag: either one of the closed set of primitives, a typed
/// array `array<T>`, or a reference to a custom (enum or record) type by
/// name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeTag {
    Bool,
    Int,
    Float,
    String,
    /// Untyped array.
    Array,
    /// Untyped record ("hash" in the source terminology).
    Hash,
    /// An opaque byte string, transported as a JSON string with no decoding.
    Base64,
    /// `array<T>`.
    TypedArray(Box<TypeTag>),
    /// A custom type name, beginning with an upper-case letter.
    Custom(String),
}

/// A type tag string did not parse: not a known primitive, not valid
/// `array<T>` syntax, and not a custom type name (upper-case first letter).
#[derive(Debug, thiserror::Error)]
#[error("invalid type tag: {0:?}")]
pub struct InvalidTypeTag(pub String);

impl TypeTag {
    /// True for any tag whose wire representation is a bare identifier
    /// starting with an upper-case letter.
    fn is_custom_name(s: &str) -> bool {
        s.chars().next().map(char::is_uppercase).unwrap_or(false)
    }

    /// Parses `array<T>` into its element tag, or returns `None` if `s` is
    /// not typed-array syntax.
    fn parse_typed_array(s: &str) -> Option<&str> {
        let inner = s.strip_prefix("array<")?;
        inner.strip_suffix('>')
    }
}

impl FromStr for TypeTag {
    type Err = InvalidTypeTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bool" => return Ok(TypeTag::Bool),
            "int" => return Ok(TypeTag::Int),
            "float" => return Ok(TypeTag::Float),
            "string" => return Ok(TypeTag::String),
            "array" => return Ok(TypeTag::Array),
            "hash" => return Ok(TypeTag::Hash),
            "base64" => return Ok(TypeTag::Base64),
            _ => {}
        }
        if let Some(inner) = TypeTag::parse_typed_array(s) {
            return Ok(TypeTag::TypedArray(Box::new(inner.parse()?)));
        }
        if TypeTag::is_custom_name(s) {
            return Ok(TypeTag::Custom(s.to_owned()));
        }
        Err(InvalidTypeTag(s.to_owned()))
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Bool => write!(f, "bool"),
            TypeTag::Int => write!(f, "int"),
            TypeTag::Float => write!(f, "float"),
            TypeTag::String => write!(f, "string"),
            TypeTag::Array => write!(f, "array"),
            TypeTag::Hash => write!(f, "hash"),
            TypeTag::Base64 => write!(f, "base64"),
            TypeTag::TypedArray(inner) => write!(f, "array<{}>", inner),
            TypeTag::Custom(name) => write!(f, "{}", name),
        }
    }
}

impl Serialize for TypeTag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// A single named, described value inside an [`EnumType`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EnumValue {
    pub name: String,
    pub intvalue: i64,
    pub description: String,
}

/// Attempted to register a duplicate name or value inside an enumeration
/// under construction.
#[derive(Debug, thiserror::Error)]
pub enum EnumBuildError {
    #[error("enum value name {0:?} already registered")]
    DuplicateName(String),
}

/// An enumeration type: an ordered list of named, integer-valued, described
/// members. Integers are assigned sequentially starting at `base`
/// (default 0); a value satisfies the enum if it is one of the declared
/// names, or an integer within the enum's `[start, next)` range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumType {
    name: String,
    description: String,
    base: i64,
    values: Vec<EnumValue>,
}

impl EnumType {
    /// Starts a new enumeration with values assigned from 0.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        EnumType::with_base(name, description, 0)
    }

    /// Starts a new enumeration with values assigned from `base`.
    pub fn with_base(name: impl Into<String>, description: impl Into<String>, base: i64) -> Self {
        EnumType {
            name: name.into(),
            description: description.into(),
            base,
            values: Vec::new(),
        }
    }

    /// Appends the next value, auto-assigning its integer as `base + index`.
    pub fn add_value(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<&mut Self, EnumBuildError> {
        let name = name.into();
        if self.values.iter().any(|v| v.name == name) {
            return Err(EnumBuildError::DuplicateName(name));
        }
        let intvalue = self.base + self.values.len() as i64;
        self.values.push(EnumValue {
            name,
            intvalue,
            description: description.into(),
        });
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[EnumValue] {
        &self.values
    }

    /// The half-open range `[start, next)` of integers this enum accepts.
    pub fn int_range(&self) -> (i64, i64) {
        (self.base, self.base + self.values.len() as i64)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&EnumValue> {
        self.values.iter().find(|v| v.name == name)
    }

    /// Projection to the `__describe_custom_types` wire shape.
    pub fn describe(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "type": "enum",
            "description": self.description,
            "values": self.values,
        })
    }
}

/// A single field inside a [`RecordType`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    pub description: String,
}

/// Attempted to register a duplicate field name inside a record under
/// construction.
#[derive(Debug, thiserror::Error)]
#[error("field name {0:?} already registered")]
pub struct RecordBuildError(pub String);

/// A named composite ("hash") type: an insertion-ordered list of typed,
/// described fields. Field names are unique per record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordType {
    name: String,
    description: String,
    fields: Vec<FieldDescriptor>,
}

impl RecordType {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        RecordType {
            name: name.into(),
            description: description.into(),
            fields: Vec::new(),
        }
    }

    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        type_tag: TypeTag,
        description: impl Into<String>,
    ) -> Result<&mut Self, RecordBuildError> {
        let name = name.into();
        if self.fields.iter().any(|f| f.name == name) {
            return Err(RecordBuildError(name));
        }
        self.fields.push(FieldDescriptor {
            name,
            type_tag,
            description: description.into(),
        });
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Projection to the `__describe_custom_types` wire shape.
    pub fn describe(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "type": "hash",
            "description": self.description,
            "fields": self.fields,
        })
    }
}

/// A registered custom type: either an enumeration or a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CustomType {
    Enum(EnumType),
    Record(RecordType),
}

impl CustomType {
    pub fn name(&self) -> &str {
        match self {
            CustomType::Enum(e) => e.name(),
            CustomType::Record(r) => r.name(),
        }
    }

    pub fn describe(&self) -> Value {
        match self {
            CustomType::Enum(e) => e.describe(),
            CustomType::Record(r) => r.describe(),
        }
    }
}

/// A single parameter of a [`crate::registry::FunctionDescriptor`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParamDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    pub description: String,
}

/// The service-wide descriptor returned by `__describe_service`: name,
/// human description, version, and an open operator-supplied map.
#[derive(Clone, Debug, Default)]
pub struct ServiceDescriptor {
    pub name: String,
    pub description: String,
    pub version: String,
    pub custom_fields: Map<String, Value>,
}

impl ServiceDescriptor {
    pub fn describe(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "version": self.version,
            "custom_fields": Value::Object(self.custom_fields.clone()),
        })
    }
}

/// Maps a parsed JSON value to the primitive kind name used in type-error
/// messages and in the primitive-check step of the validator.
pub fn json_kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "int"
            } else {
                "float"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "hash",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_primitives() {
        assert_eq!("bool".parse::<TypeTag>().unwrap(), TypeTag::Bool);
        assert_eq!("base64".parse::<TypeTag>().unwrap(), TypeTag::Base64);
    }

    #[test]
    fn parses_typed_arrays_recursively() {
        let tag: TypeTag = "array<array<int>>".parse().unwrap();
        assert_eq!(
            tag,
            TypeTag::TypedArray(Box::new(TypeTag::TypedArray(Box::new(TypeTag::Int))))
        );
        assert_eq!(tag.to_string(), "array<array<int>>");
    }

    #[test]
    fn parses_custom_names() {
        let tag: TypeTag = "PhoneType".parse().unwrap();
        assert_eq!(tag, TypeTag::Custom("PhoneType".to_owned()));
    }

    #[test]
    fn rejects_lowercase_custom_names() {
        assert!("phoneType".parse::<TypeTag>().is_err());
    }

    #[test]
    fn enum_assigns_sequential_ints_from_base() {
        let mut e = EnumType::new("PhoneType", "a phone type");
        e.add_value("HOME", "").unwrap();
        e.add_value("WORK", "").unwrap();
        e.add_value("MOBILE", "").unwrap();
        e.add_value("FAX", "").unwrap();
        assert_eq!(e.value_by_name("MOBILE").unwrap().intvalue, 2);
        assert_eq!(e.int_range(), (0, 4));
    }

    #[test]
    fn enum_rejects_duplicate_names() {
        let mut e = EnumType::new("E", "");
        e.add_value("A", "").unwrap();
        assert!(e.add_value("A", "").is_err());
    }

    #[test]
    fn record_rejects_duplicate_fields() {
        let mut r = RecordType::new("R", "");
        r.add_field("a", TypeTag::Int, "").unwrap();
        assert!(r.add_field("a", TypeTag::Bool, "").is_err());
    }
}
