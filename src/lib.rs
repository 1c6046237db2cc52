// Copyright 2026 reflect-rpc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A JSON-RPC 1.0 server toolkit with runtime introspection of functions and
//! custom types.
//!
//! A [`Registry`](registry::Registry) declares the functions a service
//! exposes and the custom types (enumerations and records) their parameters
//! and results reference. A [`Dispatcher`](dispatcher::Dispatcher) wraps a
//! registry and turns one raw request message into one reply, running
//! parameter validation and demoting unexpected handler panics to a safe
//! `InternalError` along the way. Three reserved methods —
//! `__describe_service`, `__describe_functions`, `__describe_custom_types` —
//! let a client discover the rest at runtime without an out-of-band schema.
//!
//! Wire framing is pluggable: [`codec::LineCodec`] speaks newline-delimited
//! JSON over any duplex stream, `http_codec` speaks JSON-RPC-over-HTTP/1.1.
//! [`listener`] drives either framer over TCP, TLS, or a UNIX domain socket
//! and spawns one independent task per connection. [`client::Client`] is the
//! matching piece on the requesting side.
//!
//! ```
//! use reflect_rpc::dispatcher::{CallContext, Dispatcher, HandlerError, SyncFn};
//! use reflect_rpc::registry::{FunctionDescriptor, RegistryBuilder};
//! use reflect_rpc::types::{ParamDescriptor, TypeTag};
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let mut builder = RegistryBuilder::new();
//! builder.set_service_description("demo", "a demo service", "1.0", Default::default());
//! builder
//!     .add_function(FunctionDescriptor {
//!         name: "echo".into(),
//!         description: "Returns the message it was sent".into(),
//!         params: vec![ParamDescriptor {
//!             name: "message".into(),
//!             type_tag: TypeTag::String,
//!             description: String::new(),
//!         }],
//!         result_type: TypeTag::String,
//!         result_desc: "The message previously received".into(),
//!         needs_context: false,
//!         validate_params: true,
//!         handler: Arc::new(SyncFn(|params: Vec<Value>| Ok(params[0].clone()))),
//!     })
//!     .unwrap();
//!
//! let dispatcher = Dispatcher::new(Arc::new(builder.build()));
//! let reply = dispatcher
//!     .dispatch(r#"{"method":"echo","params":["hi"],"id":1}"#, None)
//!     .await
//!     .unwrap();
//! assert_eq!(reply.result, json!("hi"));
//! # }
//! ```

/// Re-exported so handlers can decode a `base64`-tagged parameter without
/// adding their own dependency on the crate. The validator only checks that
/// such a value is a JSON string (§3 "base64 ... transported as a string
/// with no decoding"); decoding, if wanted, is the handler's job.
pub use base64;

pub mod builtins;
pub mod client;
pub mod codec;
pub mod dispatcher;
pub mod http_codec;
pub mod listener;
pub mod message;
pub mod registry;
pub mod types;
pub mod validator;

pub use client::{Client, ClientConfig, ClientError};
pub use dispatcher::{CallContext, DomainError, Dispatcher, Handler, HandlerError};
pub use listener::{ListenerConfig, ListenerError};
pub use message::{ErrorObject, Reply, Request};
pub use registry::{Registry, RegistryBuilder, RegistryError};
pub use types::{CustomType, EnumType, FieldDescriptor, ParamDescriptor, RecordType, TypeTag};
