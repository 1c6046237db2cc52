// Copyright 2026 reflect-rpc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Talks to the `server` demo: calls `echo` and `add`, round-trips a
//! `PhoneType` enum value, and fetches the service's own introspection.
//!
//! Run `cargo run --example server` in one terminal, then this in another.

use reflect_rpc::{Client, ClientConfig};
use serde_json::{json, Value};
use slog::Drain;

fn root_logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    slog::Logger::root(drain, slog::o!("service" => "reflect-rpc-demo-client"))
}

#[tokio::main]
async fn main() {
    let logger = root_logger();
    let client = Client::new(ClientConfig::new("127.0.0.1:3030"));

    let echoed = client
        .call("echo", vec![json!("Hello Server")])
        .await
        .expect("echo call failed");
    slog::info!(logger, "echo"; "result" => %echoed);

    let sum = client
        .call("add", vec![json!(5), json!(6)])
        .await
        .expect("add call failed");
    slog::info!(logger, "add"; "result" => %sum);

    let phone = client
        .call("echo_enum", vec![Value::String("MOBILE".into())])
        .await
        .expect("echo_enum call failed");
    slog::info!(logger, "echo_enum"; "result" => %phone);

    let functions = client
        .call("__describe_functions", vec![])
        .await
        .expect("__describe_functions call failed");
    slog::info!(logger, "describe_functions"; "count" => functions.as_array().map(Vec::len).unwrap_or(0));
}
