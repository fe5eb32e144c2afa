//! CLI command implementations
//!
//! `serve` boots in a fixed order: config, logger level, built-in routes,
//! dispatcher, HTTP server. The other commands are one-shot and never touch
//! the network.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::Config;
use crate::dispatch::{Dispatcher, StaticTokenAuthenticator};
use crate::envelope::{CodecOptions, EnvelopeCodec, Pagination, ResponseEnvelope};
use crate::errors::{ConventionError, ConventionResult};
use crate::http_server::HttpServer;
use crate::meta::MetaBuilder;
use crate::observability::{log_event, log_event_with_fields, Event, Logger};
use crate::routing::{HandlerCall, HandlerError, HandlerOutput, HandlerResult, RouteTable, Router};

use super::args::{Command, EnvelopeKind};
use super::errors::{CliError, CliResult};
use super::io::{read_input, write_error, write_json, write_response};

/// Dispatch a parsed command
pub fn run_command(command: Command) -> CliResult<()> {
    match command {
        Command::Serve { config } => serve(&config),
        Command::Validate { kind, lazy_binary } => validate(kind, lazy_binary),
        Command::Meta {
            code,
            message,
            page,
            page_size,
            total,
        } => meta(code, message, page, page_size, total),
        Command::Routes => routes(),
    }
}

/// Load config and serve until interrupted
pub fn serve(config_path: &Path) -> CliResult<()> {
    log_event(Event::BootStart);

    let config = Config::load(config_path)?;
    Logger::set_min_severity(config.logging.level);
    log_event_with_fields(
        Event::ConfigLoaded,
        &[("path", &config_path.display().to_string())],
    );

    let router = builtin_router()?;
    let dispatcher = Arc::new(build_dispatcher(&config, router));
    let server = HttpServer::new(config.server.clone(), dispatcher);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })
}

/// Decode an envelope from stdin and echo its normalized form
pub fn validate(kind: EnvelopeKind, lazy_binary: bool) -> CliResult<()> {
    let raw = read_input()?;
    let codec = EnvelopeCodec::new(CodecOptions {
        eager_binary_validation: !lazy_binary,
        ..CodecOptions::default()
    });

    match decode_envelope(&codec, kind, &raw) {
        Ok(value) => write_response(value),
        Err(err) => {
            write_error(err.code(), &err.to_string(), &err.details())?;
            Err(err.into())
        }
    }
}

/// Print a response envelope built from the arguments
pub fn meta(
    code: u16,
    message: Option<String>,
    page: Option<u64>,
    page_size: Option<u64>,
    total: Option<u64>,
) -> CliResult<()> {
    let pagination = match (page, page_size) {
        (Some(page), Some(page_size)) => {
            let pagination = Pagination::new(page, page_size)?;
            Some(match total {
                Some(total) => pagination.with_total(total),
                None => pagination,
            })
        }
        _ => None,
    };

    let envelope = meta_envelope(&MetaBuilder::new(), code, message, pagination)?;
    write_json(&serde_json::to_value(&envelope)?)
}

/// Print the built-in route keys
pub fn routes() -> CliResult<()> {
    let router = builtin_router()?;
    let keys: Vec<String> = router.snapshot().keys().map(ToString::to_string).collect();
    write_json(&json!(keys))
}

/// Routes every server carries
pub fn builtin_router() -> CliResult<Arc<Router>> {
    let mut builder = RouteTable::builder();
    builder.register(1, "system", "ping", |_: &HandlerCall| -> HandlerResult {
        Ok(HandlerOutput::ok(json!({ "pong": true })))
    })?;
    let router = Arc::new(Router::new(builder.build()));

    let weak = Arc::downgrade(&router);
    router.register(1, "system", "routes", move |_: &HandlerCall| -> HandlerResult {
        let router = weak
            .upgrade()
            .ok_or_else(|| HandlerError::internal("router dropped"))?;
        let keys: Vec<String> = router.snapshot().keys().map(ToString::to_string).collect();
        Ok(HandlerOutput::ok(json!(keys)))
    })?;

    Ok(router)
}

pub fn build_dispatcher(config: &Config, router: Arc<Router>) -> Dispatcher {
    let dispatcher = Dispatcher::new(router, EnvelopeCodec::new(config.codec))
        .require_token(config.auth.require_token);

    match &config.auth.static_token {
        Some(token) => dispatcher.with_authenticator(Arc::new(StaticTokenAuthenticator::new(
            token.clone(),
            "static",
        ))),
        None => dispatcher,
    }
}

fn decode_envelope(codec: &EnvelopeCodec, kind: EnvelopeKind, raw: &[u8]) -> ConventionResult<Value> {
    let value = match kind {
        EnvelopeKind::Request => serde_json::to_value(codec.decode_request(raw)?),
        EnvelopeKind::Response => serde_json::to_value(codec.decode_response(raw)?),
    };
    value.map_err(|e| ConventionError::malformed("$", e.to_string()))
}

fn meta_envelope(
    builder: &MetaBuilder,
    code: u16,
    message: Option<String>,
    pagination: Option<Pagination>,
) -> ConventionResult<ResponseEnvelope> {
    if matches!(code, 200 | 201) {
        let meta = builder.success_meta(code, message, pagination)?;
        return Ok(ResponseEnvelope::new(meta).with_data(json!([])));
    }
    if pagination.is_some() {
        return Err(ConventionError::InvalidPagination(
            "pagination is only valid on success responses".to_string(),
        ));
    }
    builder.build_error(code, message.as_deref().unwrap_or(""), Vec::new())
}
