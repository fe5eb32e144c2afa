//! # HTTP Server
//!
//! Thin axum adapter around the [`Dispatcher`]. Every path except the
//! operational endpoints falls through to the dispatcher, which decides
//! between envelope handling (POST), existence checks (HEAD), preflight
//! (OPTIONS) and method rejection.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::dispatch::{
    Dispatcher, InboundRequest, OutboundResponse, RequestMethod, META_CODE_HEADER,
};
use crate::errors::ConventionError;
use crate::observability::{log_event, log_event_with_fields, Event};

use super::config::HttpServerConfig;
use super::observability_routes::observability_routes;

/// Shared state for the fallback handler
#[derive(Clone)]
pub struct DispatchState {
    pub dispatcher: Arc<Dispatcher>,
    /// Body limit enforced by the router, reported back in rejections
    pub max_body_bytes: usize,
}

/// HTTP front end for a dispatcher
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, dispatcher: Arc<Dispatcher>) -> Self {
        let router = Self::build_router(&config, dispatcher);
        Self { config, router }
    }

    fn build_router(config: &HttpServerConfig, dispatcher: Arc<Dispatcher>) -> Router {
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<HeaderValue> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods([Method::POST, Method::HEAD, Method::OPTIONS])
                .allow_headers(Any)
        };

        Router::new()
            .merge(observability_routes())
            .fallback(envelope_handler)
            .with_state(DispatchState {
                dispatcher,
                max_body_bytes: config.max_body_bytes,
            })
            .layer(DefaultBodyLimit::max(config.max_body_bytes))
            .layer(cors)
    }

    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until Ctrl-C
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Invalid socket address {}: {}", self.config.socket_addr(), e),
            )
        })?;

        let listener = TcpListener::bind(addr).await?;
        log_event_with_fields(Event::Serving, &[("addr", &addr.to_string())]);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        log_event(Event::ShutdownComplete);
        Ok(())
    }
}

async fn shutdown_signal() {
    // A failed handler install means we simply run until killed
    let _ = tokio::signal::ctrl_c().await;
}

async fn envelope_handler(
    State(state): State<DispatchState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let mut request = InboundRequest {
        method: RequestMethod::parse(method.as_str()),
        path: uri.path().to_string(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body: Vec::new(),
    };

    // A body the router refused still gets an envelope, never a bare 4xx
    match body {
        Ok(bytes) => request.body = bytes.to_vec(),
        Err(rejection) => {
            let err = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ConventionError::PayloadTooLarge {
                    limit: state.max_body_bytes,
                }
            } else {
                ConventionError::malformed("body", rejection.body_text())
            };
            return into_response(state.dispatcher.reject_request(request, err));
        }
    }

    // Handlers are synchronous
    let dispatcher = Arc::clone(&state.dispatcher);
    match tokio::task::spawn_blocking(move || dispatcher.dispatch(request)).await {
        Ok(outbound) => into_response(outbound),
        Err(e) => {
            log_event_with_fields(Event::InternalFault, &[("error", &e.to_string())]);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn into_response(outbound: OutboundResponse) -> Response {
    let status =
        StatusCode::from_u16(outbound.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let has_body = outbound.has_body();

    let mut response = Response::new(Body::from(outbound.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    if has_body {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }
    if let Some(code) = outbound.meta_code {
        headers.insert(META_CODE_HEADER, HeaderValue::from(code));
    }
    response
}
