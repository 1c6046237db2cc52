// Copyright 2026 reflect-rpc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The three reserved introspection methods (§3 "Reserved builtins", §6
//! "Introspection shapes"). These are handled directly by the dispatcher,
//! outside the regular function-lookup path, and take no parameters.

use serde_json::Value;

use crate::registry::Registry;

/// Returns `Some(Ok(result))` / `Some(Err(message))` if `method` names a
/// builtin, `None` if it's an ordinary (or unknown) method name.
pub fn dispatch(registry: &Registry, method: &str, params: &[Value]) -> Option<Result<Value, String>> {
    match method {
        "__describe_service" => Some(expect_no_params(params, || registry.describe_service())),
        "__describe_functions" => Some(expect_no_params(params, || registry.describe_functions())),
        "__describe_custom_types" => {
            Some(expect_no_params(params, || registry.describe_custom_types()))
        }
        _ => None,
    }
}

fn expect_no_params(params: &[Value], produce: impl FnOnce() -> Value) -> Result<Value, String> {
    if params.is_empty() {
        Ok(produce())
    } else {
        Err(format!("Expected 0 parameters but got {}", params.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;
    use crate::types::{CustomType, EnumType};

    #[test]
    fn describe_service_round_trips_custom_fields() {
        let mut b = RegistryBuilder::new();
        let mut custom_fields = serde_json::Map::new();
        custom_fields.insert("build".into(), serde_json::json!("abc123"));
        b.set_service_description("demo", "a demo", "1.2.3", custom_fields);
        let reg = b.build();
        let result = dispatch(&reg, "__describe_service", &[]).unwrap().unwrap();
        assert_eq!(result["name"], "demo");
        assert_eq!(result["version"], "1.2.3");
        assert_eq!(result["custom_fields"]["build"], "abc123");
    }

    #[test]
    fn describe_custom_types_projects_enum_shape() {
        let mut b = RegistryBuilder::new();
        let mut phone = EnumType::new("PhoneType", "a phone type");
        phone.add_value("HOME", "home phone").unwrap();
        b.add_custom_type(CustomType::Enum(phone)).unwrap();
        let reg = b.build();
        let result = dispatch(&reg, "__describe_custom_types", &[])
            .unwrap()
            .unwrap();
        let types = result.as_array().unwrap();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0]["type"], "enum");
        assert_eq!(types[0]["values"][0]["name"], "HOME");
        assert_eq!(types[0]["values"][0]["intvalue"], 0);
    }

    #[test]
    fn unknown_method_is_not_a_builtin() {
        let reg = RegistryBuilder::new().build();
        assert!(dispatch(&reg, "echo", &[]).is_none());
    }
}
