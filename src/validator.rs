// Copyright 2026 reflect-rpc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Module C: the request validator.
//!
//! Given a [`FunctionDescriptor`] and the already-parsed parameter array,
//! checks the parameters against the declared signature, recursing into
//! typed arrays and record fields, and stops at the first violation.
//! Traversal order (declared field order, array index order) and the
//! missing-before-unknown tie-break are what make the "first violation" of
//! §4.C deterministic — see the property tests in `tests/`.

use serde_json::Value;

use crate::registry::{FunctionDescriptor, Registry};
use crate::types::{json_kind_name, CustomType, TypeTag};

/// A single validation failure, not yet rendered to its wire message — the
/// caller (the dispatcher) knows the method name needed to format it.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Arity { expected: usize, actual: usize },
    Type {
        path: String,
        expected: String,
        actual: &'static str,
    },
    EnumValue {
        path: String,
        value: String,
        enum_name: String,
    },
    EnumKind {
        path: String,
        enum_name: String,
    },
    MissingField {
        parent_path: String,
        field: String,
    },
    UnknownField {
        parent_path: String,
        field: String,
    },
}

impl ValidationError {
    /// Renders the final wire `(name, message)` pair, per the message forms
    /// fixed by spec.md §8's scenarios (S3, S4, S5) and §8 bullet 2.
    pub fn into_wire(self, method: &str) -> (&'static str, String) {
        use crate::message::ErrorObject;
        match self {
            ValidationError::Arity { expected, actual } => (
                ErrorObject::PARAM_ERROR,
                format!(
                    "Expected {} parameters for '{}' but got {}",
                    expected, method, actual
                ),
            ),
            ValidationError::Type {
                path,
                expected,
                actual,
            } => (
                ErrorObject::TYPE_ERROR,
                format!(
                    "{}: Expected value of type '{}' for parameter '{}' but got value of type '{}'",
                    method, expected, path, actual
                ),
            ),
            ValidationError::EnumValue {
                path,
                value,
                enum_name,
            } => (
                ErrorObject::TYPE_ERROR,
                format!(
                    "{}: '{}' is not a valid value for parameter '{}' of enum type '{}'",
                    method, value, path, enum_name
                ),
            ),
            ValidationError::EnumKind { path, enum_name } => (
                ErrorObject::TYPE_ERROR,
                format!(
                    "{}: Parameter '{}' requires value of type int or string for enum type '{}'",
                    method, path, enum_name
                ),
            ),
            ValidationError::MissingField { parent_path, field } => (
                ErrorObject::TYPE_ERROR,
                format!(
                    "{}: Missing field '{}' for parameter '{}'",
                    method, field, parent_path
                ),
            ),
            ValidationError::UnknownField { parent_path, field } => (
                ErrorObject::TYPE_ERROR,
                format!(
                    "{}: Unknown field '{}' for parameter '{}'",
                    method, field, parent_path
                ),
            ),
        }
    }
}

/// Validates `params` against `func`'s signature. Stops and returns at the
/// first violation, traversing fields in declaration order and array
/// elements in index order (§4.C "Determinism").
pub fn validate_params(
    registry: &Registry,
    func: &FunctionDescriptor,
    params: &[Value],
) -> Result<(), ValidationError> {
    if params.len() != func.params.len() {
        return Err(ValidationError::Arity {
            expected: func.params.len(),
            actual: params.len(),
        });
    }
    for (param, value) in func.params.iter().zip(params) {
        validate_value(registry, &param.type_tag, value, &param.name)?;
    }
    Ok(())
}

fn validate_value(
    registry: &Registry,
    tag: &TypeTag,
    value: &Value,
    path: &str,
) -> Result<(), ValidationError> {
    match tag {
        TypeTag::Bool => expect(value.is_boolean(), "bool", path, value),
        TypeTag::Int => expect(
            matches!(value, Value::Number(n) if n.is_i64() || n.is_u64()),
            "int",
            path,
            value,
        ),
        TypeTag::Float => expect(value.is_number(), "float", path, value),
        TypeTag::String => expect(value.is_string(), "string", path, value),
        TypeTag::Base64 => expect(value.is_string(), "base64", path, value),
        TypeTag::Array => expect(value.is_array(), "array", path, value),
        TypeTag::Hash => expect(value.is_object(), "hash", path, value),
        TypeTag::TypedArray(inner) => {
            let items = match value.as_array() {
                Some(items) => items,
                None => {
                    return Err(ValidationError::Type {
                        path: path.to_owned(),
                        expected: tag.to_string(),
                        actual: json_kind_name(value),
                    })
                }
            };
            for (i, item) in items.iter().enumerate() {
                validate_value(registry, inner, item, &format!("{}[{}]", path, i))?;
            }
            Ok(())
        }
        TypeTag::Custom(name) => {
            // The registry guarantees every referenced custom type exists by
            // the time a function is registered (see RegistryBuilder::add_function),
            // so lookup cannot fail here.
            let custom = registry
                .custom_type(name)
                .expect("registry invariant: referenced custom type is registered");
            match custom {
                CustomType::Enum(e) => validate_enum(e, value, path),
                CustomType::Record(r) => validate_record(registry, r, value, path),
            }
        }
    }
}

fn expect(ok: bool, expected: &str, path: &str, value: &Value) -> Result<(), ValidationError> {
    if ok {
        Ok(())
    } else {
        Err(ValidationError::Type {
            path: path.to_owned(),
            expected: expected.to_owned(),
            actual: json_kind_name(value),
        })
    }
}

fn validate_enum(
    e: &crate::types::EnumType,
    value: &Value,
    path: &str,
) -> Result<(), ValidationError> {
    match value {
        Value::String(s) => {
            if e.value_by_name(s).is_some() {
                Ok(())
            } else {
                Err(ValidationError::EnumValue {
                    path: path.to_owned(),
                    value: s.clone(),
                    enum_name: e.name().to_owned(),
                })
            }
        }
        Value::Number(n) => {
            let (start, next) = e.int_range();
            match n.as_i64() {
                Some(i) if i >= start && i < next => Ok(()),
                _ => Err(ValidationError::EnumValue {
                    path: path.to_owned(),
                    value: n.to_string(),
                    enum_name: e.name().to_owned(),
                }),
            }
        }
        _ => Err(ValidationError::EnumKind {
            path: path.to_owned(),
            enum_name: e.name().to_owned(),
        }),
    }
}

fn validate_record(
    registry: &Registry,
    r: &crate::types::RecordType,
    value: &Value,
    path: &str,
) -> Result<(), ValidationError> {
    let obj = match value.as_object() {
        Some(obj) => obj,
        None => {
            return Err(ValidationError::Type {
                path: path.to_owned(),
                expected: r.name().to_owned(),
                actual: json_kind_name(value),
            })
        }
    };
    if !registry.validate_records() {
        return Ok(());
    }
    for field in r.fields() {
        match obj.get(&field.name) {
            Some(field_value) => {
                validate_value(
                    registry,
                    &field.type_tag,
                    field_value,
                    &format!("{}.{}", path, field.name),
                )?;
            }
            None => {
                return Err(ValidationError::MissingField {
                    parent_path: path.to_owned(),
                    field: field.name.clone(),
                })
            }
        }
    }
    for key in obj.keys() {
        if r.field(key).is_none() {
            return Err(ValidationError::UnknownField {
                parent_path: path.to_owned(),
                field: key.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{CallContext, Handler, HandlerFuture};
    use crate::registry::{FunctionDescriptor, RegistryBuilder};
    use crate::types::{CustomType, EnumType, ParamDescriptor, RecordType};
    use futures::FutureExt;
    use serde_json::json;
    use std::sync::Arc;

    struct Noop;
    impl Handler for Noop {
        fn call(&self, _ctx: Option<&CallContext>, _params: Vec<Value>) -> HandlerFuture {
            futures::future::ready(Ok(Value::Null)).boxed()
        }
    }

    fn param(name: &str, tag: TypeTag) -> ParamDescriptor {
        ParamDescriptor {
            name: name.into(),
            type_tag: tag,
            description: String::new(),
        }
    }

    fn make_func(name: &str, params: Vec<ParamDescriptor>) -> FunctionDescriptor {
        FunctionDescriptor {
            name: name.into(),
            description: String::new(),
            params,
            result_type: TypeTag::Bool,
            result_desc: String::new(),
            needs_context: false,
            validate_params: true,
            handler: Arc::new(Noop),
        }
    }

    #[test]
    fn arity_mismatch() {
        let reg = RegistryBuilder::new().build();
        let f = make_func("add", vec![param("a", TypeTag::Int), param("b", TypeTag::Int)]);
        let err = validate_params(&reg, &f, &[json!(1)]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Arity {
                expected: 2,
                actual: 1
            }
        );
        let (kind, msg) = err.into_wire("add");
        assert_eq!(kind, "ParamError");
        assert_eq!(msg, "Expected 2 parameters for 'add' but got 1");
    }

    #[test]
    fn scenario_s3_type_mismatch() {
        let reg = RegistryBuilder::new().build();
        let f = make_func("add", vec![param("a", TypeTag::Int), param("b", TypeTag::Int)]);
        let err = validate_params(&reg, &f, &[json!(4), json!(8.9)]).unwrap_err();
        let (kind, msg) = err.into_wire("add");
        assert_eq!(kind, "TypeError");
        assert_eq!(
            msg,
            "add: Expected value of type 'int' for parameter 'b' but got value of type 'float'"
        );
    }

    #[test]
    fn scenario_s4_enum() {
        let mut b = RegistryBuilder::new();
        let mut phone = EnumType::new("PhoneType", "");
        for v in ["HOME", "WORK", "MOBILE", "FAX"] {
            phone.add_value(v, "").unwrap();
        }
        b.add_custom_type(CustomType::Enum(phone)).unwrap();
        let reg = b.build();
        let f = make_func("echo_enum", vec![param("type", TypeTag::Custom("PhoneType".into()))]);

        assert!(validate_params(&reg, &f, &[json!("MOBILE")]).is_ok());

        let err = validate_params(&reg, &f, &[json!("BLABLA")]).unwrap_err();
        let (kind, msg) = err.into_wire("echo_enum");
        assert_eq!(kind, "TypeError");
        assert_eq!(
            msg,
            "echo_enum: 'BLABLA' is not a valid value for parameter 'type' of enum type 'PhoneType'"
        );
    }

    #[test]
    fn scenario_s5_nested_record_path() {
        let mut b = RegistryBuilder::new();
        let mut type3 = RecordType::new("Type3", "");
        type3.add_field("somebool", TypeTag::Bool, "").unwrap();
        b.add_custom_type(CustomType::Record(type3)).unwrap();
        let mut type2 = RecordType::new("Type2", "");
        type2.add_field("someint", TypeTag::Int, "").unwrap();
        type2
            .add_field("type3", TypeTag::Custom("Type3".into()), "")
            .unwrap();
        b.add_custom_type(CustomType::Record(type2)).unwrap();
        let mut type1 = RecordType::new("Type1", "");
        type1.add_field("somestr", TypeTag::String, "").unwrap();
        type1
            .add_field("type2", TypeTag::Custom("Type2".into()), "")
            .unwrap();
        b.add_custom_type(CustomType::Record(type1)).unwrap();
        let reg = b.build();

        let f = make_func(
            "echo_hash",
            vec![param("value", TypeTag::Custom("Type1".into()))],
        );
        let value = json!({
            "somestr": "s",
            "type2": {
                "someint": 5,
                "type3": { "somebool": 8 }
            }
        });
        let err = validate_params(&reg, &f, &[value]).unwrap_err();
        let (kind, msg) = err.into_wire("echo_hash");
        assert_eq!(kind, "TypeError");
        assert_eq!(
            msg,
            "echo_hash: Expected value of type 'bool' for parameter 'value.type2.type3.somebool' but got value of type 'int'"
        );
    }

    #[test]
    fn missing_field_reported_before_unknown_field() {
        let mut b = RegistryBuilder::new();
        let mut r = RecordType::new("R", "");
        r.add_field("a", TypeTag::Int, "").unwrap();
        r.add_field("b", TypeTag::Int, "").unwrap();
        b.add_custom_type(CustomType::Record(r)).unwrap();
        let reg = b.build();
        let f = make_func("f", vec![param("value", TypeTag::Custom("R".into()))]);
        let value = json!({"a": 1, "c": 2});
        let err = validate_params(&reg, &f, &[value]).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { field, .. } if field == "b"));
    }

    #[test]
    fn typed_array_reports_index_path() {
        let reg = RegistryBuilder::new().build();
        let f = make_func(
            "f",
            vec![param("numbers", TypeTag::TypedArray(Box::new(TypeTag::Int)))],
        );
        let err = validate_params(&reg, &f, &[json!([1, 2, "x"])]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Type {
                path: "numbers[2]".to_owned(),
                expected: "int".to_owned(),
                actual: "string",
            }
        );
    }

    #[test]
    fn empty_array_satisfies_any_typed_array() {
        let reg = RegistryBuilder::new().build();
        let f = make_func(
            "f",
            vec![param(
                "numbers",
                TypeTag::TypedArray(Box::new(TypeTag::Custom("NoSuchType".into()))),
            )],
        );
        assert!(validate_params(&reg, &f, &[json!([])]).is_ok());
    }

    #[test]
    fn record_validation_can_be_disabled() {
        let mut b = RegistryBuilder::new();
        b.toggle_record_validation(false);
        let mut r = RecordType::new("R", "");
        r.add_field("a", TypeTag::Int, "").unwrap();
        b.add_custom_type(CustomType::Record(r)).unwrap();
        let reg = b.build();
        let f = make_func("f", vec![param("value", TypeTag::Custom("R".into()))]);
        // Missing declared field and an extra field: both ignored when disabled.
        assert!(validate_params(&reg, &f, &[json!({"whatever": 1})]).is_ok());
        // Still must be an object.
        assert!(validate_params(&reg, &f, &[json!([1, 2])]).is_err());
    }
}
