// Copyright 2026 reflect-rpc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The request and reply envelopes (§3, §6) and the wire error object.

use std::borrow::Cow;

use serde::Serialize;
use serde_json::Value;

/// The `id = -1` fallback used whenever a reply must be produced before an
/// `id` could be read from the request at all.
pub const UNKNOWN_ID: i64 = -1;

/// A parsed, well-formed request envelope. Malformed envelopes never reach
/// this type — they are turned into an [`InvalidRequest`](ErrorObject) reply
/// directly by [`crate::dispatcher::Dispatcher`].
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    /// Any JSON scalar; `Value::Null` marks a notification.
    pub id: Value,
    pub method: String,
    pub params: Vec<Value>,
}

impl Request {
    /// A notification is a request whose `id` is JSON `null`.
    pub fn is_notification(&self) -> bool {
        self.id.is_null()
    }
}

/// The wire error object: a kind tag plus a human message.
///
/// `name` is free-form on purpose: builtin kinds use the constants below,
/// but a handler-raised domain error may carry any tag it likes (see
/// `DomainError` in [`crate::dispatcher`] and the open-question decision in
/// `SPEC_FULL.md`).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorObject {
    pub name: Cow<'static, str>,
    pub message: String,
}

impl ErrorObject {
    pub const INVALID_REQUEST: &'static str = "InvalidRequest";
    pub const PARAM_ERROR: &'static str = "ParamError";
    pub const TYPE_ERROR: &'static str = "TypeError";
    pub const INTERNAL_ERROR: &'static str = "InternalError";
    pub const JSON_RPC_ERROR: &'static str = "JsonRpcError";

    pub fn new(name: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        ErrorObject {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        ErrorObject::new(Self::INVALID_REQUEST, message)
    }

    pub fn param_error(message: impl Into<String>) -> Self {
        ErrorObject::new(Self::PARAM_ERROR, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        ErrorObject::new(Self::TYPE_ERROR, message)
    }

    pub fn internal_error() -> Self {
        ErrorObject::new(Self::INTERNAL_ERROR, "Internal error")
    }
}

/// The reply envelope. Exactly one of `result`/`error` is non-null.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reply {
    pub id: Value,
    pub result: Value,
    pub error: Option<ErrorObject>,
}

impl Reply {
    pub fn success(id: Value, result: Value) -> Self {
        Reply {
            id,
            result,
            error: None,
        }
    }

    pub fn failure(id: Value, error: ErrorObject) -> Self {
        Reply {
            id,
            result: Value::Null,
            error: Some(error),
        }
    }

    /// A reply for a request whose `id` could not be read at all.
    pub fn unknown_id_failure(error: ErrorObject) -> Self {
        Reply::failure(Value::from(UNKNOWN_ID), error)
    }
}

/// Parses a raw JSON-RPC request object's fields (§4.D step 2), without
/// deciding what to do about failures — that policy lives in the dispatcher,
/// which needs to choose the right `id` to echo back depending on how far
/// parsing got.
pub(crate) enum EnvelopeParse {
    Ok(Request),
    /// `id` itself could not be determined; reply must use [`UNKNOWN_ID`].
    BadBeforeId(String),
    /// `id` is known, but some other field is missing or ill-typed.
    BadAfterId { id: Value, message: String },
}

pub(crate) fn parse_envelope(value: &Value) -> EnvelopeParse {
    let obj = match value.as_object() {
        Some(obj) => obj,
        None => return EnvelopeParse::BadBeforeId("Received invalid JSON".to_owned()),
    };

    let id = match obj.get("id") {
        Some(id) if matches!(id, Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)) => {
            id.clone()
        }
        Some(_) => {
            return EnvelopeParse::BadBeforeId(
                "Field 'id' must be a scalar value".to_owned(),
            )
        }
        None => return EnvelopeParse::BadBeforeId("Field 'id' missing in request".to_owned()),
    };

    let method = match obj.get("method") {
        Some(Value::String(m)) => m.clone(),
        Some(_) => {
            return EnvelopeParse::BadAfterId {
                id,
                message: "Field 'method' must contain a string value".to_owned(),
            }
        }
        None => {
            return EnvelopeParse::BadAfterId {
                id,
                message: "Field 'method' missing in request".to_owned(),
            }
        }
    };

    let params = match obj.get("params") {
        Some(Value::Array(p)) => p.clone(),
        Some(_) => {
            return EnvelopeParse::BadAfterId {
                id,
                message: "Field 'params' must contain an array".to_owned(),
            }
        }
        None => {
            return EnvelopeParse::BadAfterId {
                id,
                message: "Field 'params' missing in request".to_owned(),
            }
        }
    };

    EnvelopeParse::Ok(Request { id, method, params })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_well_formed_request() {
        let v = json!({"id": 1, "method": "echo", "params": ["hi"]});
        match parse_envelope(&v) {
            EnvelopeParse::Ok(req) => {
                assert_eq!(req.method, "echo");
                assert_eq!(req.params, vec![json!("hi")]);
                assert!(!req.is_notification());
            }
            _ => panic!("expected Ok"),
        }
    }

    #[test]
    fn null_id_is_a_notification() {
        let v = json!({"id": null, "method": "notify", "params": []});
        match parse_envelope(&v) {
            EnvelopeParse::Ok(req) => assert!(req.is_notification()),
            _ => panic!("expected Ok"),
        }
    }

    #[test]
    fn missing_id_is_unrecoverable() {
        let v = json!({"method": "echo", "params": []});
        assert!(matches!(parse_envelope(&v), EnvelopeParse::BadBeforeId(_)));
    }

    #[test]
    fn missing_method_keeps_id() {
        let v = json!({"id": 7, "params": []});
        match parse_envelope(&v) {
            EnvelopeParse::BadAfterId { id, .. } => assert_eq!(id, json!(7)),
            _ => panic!("expected BadAfterId"),
        }
    }
}
