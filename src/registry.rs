// Copyright 2026 reflect-rpc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Module B: the function registry.
//!
//! A `RegistryBuilder` accumulates the service description, custom types,
//! and functions. `RegistryBuilder::build` freezes it into a [`Registry`],
//! which is `Clone`-cheap (everything is behind `Arc`) and read-only for the
//! rest of the process's life, matching §5's "registry is read-only after
//! startup" contract.

use std::collections::HashMap;
use std::sync::Arc;

use crate::dispatcher::Handler;
use crate::types::{CustomType, ParamDescriptor, ServiceDescriptor, TypeTag};

/// The three reserved builtin method names. Present unconditionally; no
/// user function may share their name.
pub const RESERVED_METHODS: [&str; 3] = [
    "__describe_service",
    "__describe_functions",
    "__describe_custom_types",
];

pub fn is_reserved(method: &str) -> bool {
    RESERVED_METHODS.contains(&method)
}

/// A registered function: its handler plus the signature the validator and
/// introspection builtins read.
pub struct FunctionDescriptor {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamDescriptor>,
    pub result_type: TypeTag,
    pub result_desc: String,
    /// Whether the handler wants the [`crate::dispatcher::CallContext`] as
    /// its first argument.
    pub needs_context: bool,
    /// Whether the dispatcher should run the validator before invoking this
    /// function's handler.
    pub validate_params: bool,
    pub handler: Arc<dyn Handler>,
}

impl FunctionDescriptor {
    pub fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "result_type": self.result_type,
            "result_desc": self.result_desc,
            "params": self.params,
        })
    }
}

/// Failures raised while building a registry. All of them are programmer
/// errors surfaced at process start, not runtime request errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{kind} {name:?} is already registered")]
    AlreadyExists { kind: &'static str, name: String },
    #[error("{name:?} is reserved for a builtin method")]
    Reserved { name: String },
    #[error("function {function:?} references unknown custom type {type_name:?}")]
    UnknownType { function: String, type_name: String },
}

/// A builder for a [`Registry`]. Not `Sync`/`Send` by necessity — construct
/// it, wire up functions and types, then call [`RegistryBuilder::build`]
/// once and share the resulting `Arc<Registry>`.
#[derive(Default)]
pub struct RegistryBuilder {
    service: ServiceDescriptor,
    functions: HashMap<String, FunctionDescriptor>,
    custom_types: HashMap<String, CustomType>,
    validate_records: bool,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        RegistryBuilder {
            validate_records: true,
            ..Default::default()
        }
    }

    pub fn set_service_description(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        version: impl Into<String>,
        custom_fields: serde_json::Map<String, serde_json::Value>,
    ) -> &mut Self {
        self.service = ServiceDescriptor {
            name: name.into(),
            description: description.into(),
            version: version.into(),
            custom_fields,
        };
        self
    }

    /// Toggles whether record values are checked field-by-field (missing /
    /// unknown field detection) or merely checked for being a JSON object.
    /// Defaults to enabled.
    pub fn toggle_record_validation(&mut self, enabled: bool) -> &mut Self {
        self.validate_records = enabled;
        self
    }

    pub fn add_custom_type(&mut self, t: CustomType) -> Result<&mut Self, RegistryError> {
        let name = t.name().to_owned();
        if self.custom_types.contains_key(&name) {
            return Err(RegistryError::AlreadyExists {
                kind: "custom type",
                name,
            });
        }
        self.custom_types.insert(name, t);
        Ok(self)
    }

    /// Validates that every custom type `f` references is already
    /// registered, and that `f`'s name doesn't collide with an existing
    /// function or a reserved builtin, then adds it.
    pub fn add_function(&mut self, f: FunctionDescriptor) -> Result<&mut Self, RegistryError> {
        if is_reserved(&f.name) {
            return Err(RegistryError::Reserved { name: f.name });
        }
        if self.functions.contains_key(&f.name) {
            return Err(RegistryError::AlreadyExists {
                kind: "function",
                name: f.name,
            });
        }
        for param in &f.params {
            self.check_type_known(&f.name, &param.type_tag)?;
        }
        self.check_type_known(&f.name, &f.result_type)?;
        self.functions.insert(f.name.clone(), f);
        Ok(self)
    }

    fn check_type_known(&self, function: &str, tag: &TypeTag) -> Result<(), RegistryError> {
        match tag {
            TypeTag::TypedArray(inner) => self.check_type_known(function, inner),
            TypeTag::Custom(name) => {
                if self.custom_types.contains_key(name) {
                    Ok(())
                } else {
                    Err(RegistryError::UnknownType {
                        function: function.to_owned(),
                        type_name: name.clone(),
                    })
                }
            }
            _ => Ok(()),
        }
    }

    pub fn build(self) -> Registry {
        Registry {
            service: self.service,
            functions: self.functions,
            custom_types: self.custom_types,
            validate_records: self.validate_records,
        }
    }
}

/// An immutable, read-only-after-startup registry of functions and custom
/// types, plus the service descriptor. Cheap to share via `Arc`.
pub struct Registry {
    service: ServiceDescriptor,
    functions: HashMap<String, FunctionDescriptor>,
    custom_types: HashMap<String, CustomType>,
    validate_records: bool,
}

impl Registry {
    pub fn lookup(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.get(name)
    }

    pub fn custom_type(&self, name: &str) -> Option<&CustomType> {
        self.custom_types.get(name)
    }

    pub fn validate_records(&self) -> bool {
        self.validate_records
    }

    pub fn service(&self) -> &ServiceDescriptor {
        &self.service
    }

    pub fn describe_service(&self) -> serde_json::Value {
        self.service.describe()
    }

    pub fn describe_functions(&self) -> serde_json::Value {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        serde_json::Value::Array(
            names
                .into_iter()
                .map(|n| self.functions[n].describe())
                .collect(),
        )
    }

    pub fn describe_custom_types(&self) -> serde_json::Value {
        let mut names: Vec<&String> = self.custom_types.keys().collect();
        names.sort();
        serde_json::Value::Array(
            names
                .into_iter()
                .map(|n| self.custom_types[n].describe())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{CallContext, HandlerFuture};
    use crate::types::{EnumType, RecordType};
    use futures::FutureExt;

    struct Noop;
    impl Handler for Noop {
        fn call(&self, _ctx: Option<&CallContext>, _params: Vec<serde_json::Value>) -> HandlerFuture {
            futures::future::ready(Ok(serde_json::Value::Null)).boxed()
        }
    }

    fn func(name: &str) -> FunctionDescriptor {
        FunctionDescriptor {
            name: name.to_owned(),
            description: String::new(),
            params: vec![],
            result_type: TypeTag::Bool,
            result_desc: String::new(),
            needs_context: false,
            validate_params: true,
            handler: Arc::new(Noop),
        }
    }

    #[test]
    fn rejects_reserved_names() {
        let mut b = RegistryBuilder::new();
        assert!(matches!(
            b.add_function(func("__describe_service")),
            Err(RegistryError::Reserved { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_function_names() {
        let mut b = RegistryBuilder::new();
        b.add_function(func("f")).unwrap();
        assert!(matches!(
            b.add_function(func("f")),
            Err(RegistryError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn rejects_unknown_custom_type_reference() {
        let mut b = RegistryBuilder::new();
        let mut f = func("f");
        f.params.push(ParamDescriptor {
            name: "x".into(),
            type_tag: TypeTag::Custom("Missing".into()),
            description: String::new(),
        });
        assert!(matches!(
            b.add_function(f),
            Err(RegistryError::UnknownType { .. })
        ));
    }

    #[test]
    fn accepts_known_custom_type_reference() {
        let mut b = RegistryBuilder::new();
        let mut e = EnumType::new("E", "");
        e.add_value("A", "").unwrap();
        b.add_custom_type(CustomType::Enum(e)).unwrap();
        let mut f = func("f");
        f.params.push(ParamDescriptor {
            name: "x".into(),
            type_tag: TypeTag::Custom("E".into()),
            description: String::new(),
        });
        b.add_function(f).unwrap();
        let r = b.build();
        assert!(r.lookup("f").is_some());
    }

    #[test]
    fn describe_functions_is_sorted_by_name() {
        let mut b = RegistryBuilder::new();
        b.add_function(func("zeta")).unwrap();
        b.add_function(func("alpha")).unwrap();
        let r = b.build();
        let names: Vec<_> = r
            .describe_functions()
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["name"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn custom_type_checked_through_typed_array() {
        let mut b = RegistryBuilder::new();
        let r = RecordType::new("R", "");
        b.add_custom_type(CustomType::Record(r)).unwrap();
        let mut f = func("f");
        f.params.push(ParamDescriptor {
            name: "items".into(),
            type_tag: TypeTag::TypedArray(Box::new(TypeTag::Custom("R".into()))),
            description: String::new(),
        });
        assert!(b.add_function(f).is_ok());
    }
}
