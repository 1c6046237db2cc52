// Copyright 2026 reflect-rpc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A small line-framed demo service: `echo`, `add`, and an `echo_enum` that
//! round-trips a custom `PhoneType` enumeration, served over plain TCP.
//!
//! Run with `cargo run --example server`, then talk to it with `--example
//! client` or a raw `nc 127.0.0.1:3030`.

use std::sync::Arc;

use serde_json::Value;
use slog::Drain;

use reflect_rpc::dispatcher::{Dispatcher, HandlerError, SyncFn};
use reflect_rpc::listener::{self, ListenerConfig};
use reflect_rpc::registry::{FunctionDescriptor, RegistryBuilder};
use reflect_rpc::types::{CustomType, EnumType, ParamDescriptor, TypeTag};

fn build_registry() -> reflect_rpc::Registry {
    let mut builder = RegistryBuilder::new();
    builder.set_service_description(
        "demo",
        "A tiny service demonstrating reflect-rpc's introspection",
        "1.0",
        Default::default(),
    );

    let mut phone_type = EnumType::new("PhoneType", "The kind of phone number on file");
    for (name, desc) in [
        ("HOME", "A home phone"),
        ("WORK", "A work phone"),
        ("MOBILE", "A mobile phone"),
        ("FAX", "A fax line"),
    ] {
        phone_type.add_value(name, desc).unwrap();
    }
    builder
        .add_custom_type(CustomType::Enum(phone_type))
        .unwrap();

    builder
        .add_function(FunctionDescriptor {
            name: "echo".into(),
            description: "Returns the message it was sent".into(),
            params: vec![ParamDescriptor {
                name: "message".into(),
                type_tag: TypeTag::String,
                description: "The message to echo back".into(),
            }],
            result_type: TypeTag::String,
            result_desc: "The message previously received".into(),
            needs_context: false,
            validate_params: true,
            handler: Arc::new(SyncFn(|params: Vec<Value>| Ok(params[0].clone()))),
        })
        .unwrap();

    builder
        .add_function(FunctionDescriptor {
            name: "add".into(),
            description: "Adds two integers".into(),
            params: vec![
                ParamDescriptor {
                    name: "a".into(),
                    type_tag: TypeTag::Int,
                    description: String::new(),
                },
                ParamDescriptor {
                    name: "b".into(),
                    type_tag: TypeTag::Int,
                    description: String::new(),
                },
            ],
            result_type: TypeTag::Int,
            result_desc: "The sum of the two parameters".into(),
            needs_context: false,
            validate_params: true,
            handler: Arc::new(SyncFn(|params: Vec<Value>| {
                let a = params[0].as_i64().ok_or_else(|| {
                    HandlerError::internal(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "validator should have rejected a non-int 'a'",
                    ))
                })?;
                let b = params[1].as_i64().unwrap();
                Ok(Value::from(a + b))
            })),
        })
        .unwrap();

    builder
        .add_function(FunctionDescriptor {
            name: "echo_enum".into(),
            description: "Returns the PhoneType it was sent".into(),
            params: vec![ParamDescriptor {
                name: "type".into(),
                type_tag: TypeTag::Custom("PhoneType".into()),
                description: String::new(),
            }],
            result_type: TypeTag::Custom("PhoneType".into()),
            result_desc: "The phone type previously received".into(),
            needs_context: false,
            validate_params: true,
            handler: Arc::new(SyncFn(|params: Vec<Value>| Ok(params[0].clone()))),
        })
        .unwrap();

    builder.build()
}

fn root_logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    slog::Logger::root(drain, slog::o!("service" => "reflect-rpc-demo"))
}

#[tokio::main]
async fn main() {
    let logger = root_logger();
    let registry = Arc::new(build_registry());
    let dispatcher = Dispatcher::with_logger(registry, logger.clone());

    let config = ListenerConfig::new("127.0.0.1:3030");
    slog::info!(logger, "starting demo server"; "address" => &config.bind_address);
    if let Err(e) = listener::serve(config, dispatcher, logger.clone()).await {
        slog::crit!(logger, "server exited"; "error" => %e);
    }
}
