// Copyright 2026 reflect-rpc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Module D: the dispatcher.
//!
//! Parses one request message, routes it to a builtin or a registered
//! function, validates parameters when asked to, invokes the handler, and
//! demotes unexpected failures to a safe `InternalError`. Handlers return a
//! boxed future uniformly — the "deferred vs immediate" distinction from
//! the source material collapses naturally onto `Future`: a handler that
//! has its answer ready just returns `futures::future::ready(..).boxed()`,
//! and `Dispatcher::dispatch` never needs to special-case which kind it
//! got (see `DESIGN.md`).

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use slog::Logger;

use crate::builtins;
use crate::message::{self, parse_envelope, EnvelopeParse, ErrorObject, Reply};
use crate::registry::Registry;
use crate::validator::validate_params;

/// The optional identity context threaded to handlers that opt in via
/// `FunctionDescriptor::needs_context`. Populated by the listener after TLS
/// client-certificate extraction or HTTP Basic Auth.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallContext {
    pub authenticated: bool,
    pub username: String,
}

/// A domain error a handler raises deliberately; passed through to the
/// wire verbatim (§7 "Handler-raised domain errors are passed through
/// verbatim"). `name` defaults to `"JsonRpcError"` but a handler may use any
/// tag it likes — see the Open Question Decision in `SPEC_FULL.md`.
#[derive(Clone, Debug, PartialEq)]
pub struct DomainError {
    pub name: Cow<'static, str>,
    pub message: String,
}

impl DomainError {
    pub fn new(name: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        DomainError {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn msg(message: impl Into<String>) -> Self {
        DomainError::new(ErrorObject::JSON_RPC_ERROR, message)
    }
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for DomainError {}

/// What a handler can fail with: a domain error (passed through verbatim)
/// or anything else, which gets demoted to `InternalError` with the real
/// cause logged but never revealed (§7).
#[derive(Debug)]
pub enum HandlerError {
    Domain(DomainError),
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl From<DomainError> for HandlerError {
    fn from(e: DomainError) -> Self {
        HandlerError::Domain(e)
    }
}

impl HandlerError {
    /// Wraps any other error as an internal failure to be demoted (§7).
    /// Not a blanket `From` impl: `DomainError` itself implements
    /// `std::error::Error` for ergonomic use with `?` outside the handler
    /// boundary, and a blanket impl would conflict with `From<DomainError>`
    /// above.
    pub fn internal(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        HandlerError::Internal(Box::new(cause))
    }
}

/// The result a handler produces, now or later.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, HandlerError>> + Send>>;

/// A registered function's implementation: an opaque callable over
/// already-parsed JSON parameters, optionally given the call context.
pub trait Handler: Send + Sync {
    fn call(&self, ctx: Option<&CallContext>, params: Vec<Value>) -> HandlerFuture;
}

/// Adapts a plain synchronous closure `Fn(Vec<Value>) -> Result<Value, HandlerError>`
/// into a [`Handler`].
pub struct SyncFn<F>(pub F);

impl<F> Handler for SyncFn<F>
where
    F: Fn(Vec<Value>) -> Result<Value, HandlerError> + Send + Sync,
{
    fn call(&self, _ctx: Option<&CallContext>, params: Vec<Value>) -> HandlerFuture {
        futures::future::ready((self.0)(params)).boxed()
    }
}

/// Like [`SyncFn`] but receives the call context.
pub struct SyncCtxFn<F>(pub F);

impl<F> Handler for SyncCtxFn<F>
where
    F: Fn(Option<&CallContext>, Vec<Value>) -> Result<Value, HandlerError> + Send + Sync,
{
    fn call(&self, ctx: Option<&CallContext>, params: Vec<Value>) -> HandlerFuture {
        futures::future::ready((self.0)(ctx, params)).boxed()
    }
}

/// Adapts an async closure into a [`Handler`] for handlers that genuinely
/// defer (the "deferred" abstraction from the source material).
pub struct AsyncFn<F>(pub F);

impl<F, Fut> Handler for AsyncFn<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    fn call(&self, _ctx: Option<&CallContext>, params: Vec<Value>) -> HandlerFuture {
        (self.0)(params).boxed()
    }
}

/// Owns a reference to the shared, immutable registry and dispatches
/// individual request messages against it.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    logger: Logger,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Dispatcher::with_logger(registry, Logger::root(slog::Discard, slog::o!()))
    }

    pub fn with_logger(registry: Arc<Registry>, logger: Logger) -> Self {
        Dispatcher { registry, logger }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Dispatches one raw request message. Returns `None` for notifications
    /// (§4.D: no reply is ever emitted for them, even on error) and for any
    /// other case returns the reply to serialize back to the client.
    pub async fn dispatch(&self, raw: &str, ctx: Option<&CallContext>) -> Option<Reply> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(_) => {
                return Some(Reply::unknown_id_failure(ErrorObject::invalid_request(
                    "Received invalid JSON",
                )))
            }
        };

        let request = match parse_envelope(&value) {
            EnvelopeParse::Ok(req) => req,
            EnvelopeParse::BadBeforeId(message) => {
                return Some(Reply::unknown_id_failure(ErrorObject::invalid_request(
                    message,
                )))
            }
            EnvelopeParse::BadAfterId { id, message } => {
                return Some(Reply::failure(id, ErrorObject::invalid_request(message)))
            }
        };

        let is_notification = request.is_notification();
        let reply = self.dispatch_request(request, ctx).await;

        if is_notification {
            if let Some(err) = &reply.error {
                slog::debug!(self.logger, "notification produced an error, swallowed";
                    "error" => %err.message);
            }
            None
        } else {
            Some(reply)
        }
    }

    async fn dispatch_request(
        &self,
        request: message::Request,
        ctx: Option<&CallContext>,
    ) -> Reply {
        let message::Request { id, method, params } = request;

        if let Some(result) = builtins::dispatch(&self.registry, &method, &params) {
            return match result {
                Ok(value) => Reply::success(id, value),
                Err(message) => Reply::failure(id, ErrorObject::invalid_request(message)),
            };
        }

        let func = match self.registry.lookup(&method) {
            Some(f) => f,
            None => {
                return Reply::failure(
                    id,
                    ErrorObject::invalid_request(format!(
                        "No such method: {}. Call '__describe_functions' to get details on available function calls",
                        method
                    )),
                )
            }
        };

        if func.validate_params {
            if let Err(validation_error) = validate_params(&self.registry, func, &params) {
                let (kind, message) = validation_error.into_wire(&method);
                return Reply::failure(id, ErrorObject::new(kind, message));
            }
        }

        let call_ctx = if func.needs_context { ctx } else { None };
        match func.handler.call(call_ctx, params).await {
            Ok(value) => Reply::success(id, value),
            Err(HandlerError::Domain(domain)) => {
                Reply::failure(id, ErrorObject::new(domain.name, domain.message))
            }
            Err(HandlerError::Internal(cause)) => {
                slog::warn!(self.logger, "handler failed with an internal error";
                    "method" => %method, "cause" => %cause);
                Reply::failure(id, ErrorObject::internal_error())
            }
        }
    }
}
