//! Request dispatcher
//!
//! Per POST request:
//! 1. Parse the path
//! 2. Decode the envelope (empty body is `{}`)
//! 3. Extract the bearer token and authenticate
//! 4. Resolve the route
//! 5. Invoke the handler
//! 6. Wrap the output with the meta builder and encode
//!
//! Every failure along the way becomes an error envelope. Only server
//! failures (5xx) change the transport status.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use uuid::Uuid;

use crate::envelope::{EnvelopeCodec, ErrorBody, Meta, ResponseEnvelope};
use crate::errors::{ConventionError, FieldDetail};
use crate::meta::{MetaBuilder, MetaCode};
use crate::observability::{log_event_with_fields, DispatchMetrics, Event};
use crate::routing::{HandlerCall, HandlerError, HandlerOutput, RoutePath, Router};

use super::auth::{AuthFailure, Authenticator, BearerToken, Principal};

/// Header carrying the application code on HEAD responses
pub const META_CODE_HEADER: &str = "x-meta-code";

/// Transport methods the dispatcher distinguishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestMethod {
    Post,
    Head,
    Options,
    Other(String),
}

impl RequestMethod {
    pub fn parse(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "POST" => RequestMethod::Post,
            "HEAD" => RequestMethod::Head,
            "OPTIONS" => RequestMethod::Options,
            other => RequestMethod::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RequestMethod::Post => "POST",
            RequestMethod::Head => "HEAD",
            RequestMethod::Options => "OPTIONS",
            RequestMethod::Other(method) => method,
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transport-neutral request
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: RequestMethod,
    pub path: String,
    /// Raw `Authorization` header value
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

impl InboundRequest {
    pub fn post(path: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: RequestMethod::Post,
            path: path.into(),
            authorization: None,
            body: body.into(),
        }
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self {
            method: RequestMethod::Head,
            path: path.into(),
            authorization: None,
            body: Vec::new(),
        }
    }

    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }
}

/// Transport-neutral response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundResponse {
    pub status: u16,
    /// Encoded envelope; empty for HEAD and OPTIONS
    pub body: Vec<u8>,
    /// Application code. `None` for OPTIONS.
    pub meta_code: Option<u16>,
}

impl OutboundResponse {
    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }
}

/// Routes envelopes to handlers
pub struct Dispatcher {
    router: Arc<Router>,
    codec: EnvelopeCodec,
    meta: MetaBuilder,
    authenticator: Option<Arc<dyn Authenticator>>,
    require_token: bool,
    metrics: Arc<DispatchMetrics>,
}

impl Dispatcher {
    pub fn new(router: Arc<Router>, codec: EnvelopeCodec) -> Self {
        Self {
            router,
            codec,
            meta: MetaBuilder::new(),
            authenticator: None,
            require_token: false,
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    pub fn with_meta_builder(mut self, meta: MetaBuilder) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Reject requests without a bearer token
    pub fn require_token(mut self, required: bool) -> Self {
        self.require_token = required;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<DispatchMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn codec(&self) -> &EnvelopeCodec {
        &self.codec
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    pub fn dispatch(&self, request: InboundRequest) -> OutboundResponse {
        let (request_id, started) = self.begin(&request);
        let id = request_id.to_string();

        let response = match &request.method {
            RequestMethod::Post => {
                let envelope = self.handle_post(request_id, &request);
                self.finish(envelope)
            }
            RequestMethod::Head => self.handle_head(&id, &request.path),
            RequestMethod::Options => OutboundResponse {
                status: 204,
                body: Vec::new(),
                meta_code: None,
            },
            RequestMethod::Other(method) => {
                self.reject(&id, "METHOD_NOT_ALLOWED");
                let envelope = self.error_envelope(
                    405,
                    "Method Not Allowed",
                    vec![FieldDetail::new(
                        "method",
                        format!("{} is not supported; use POST", method),
                    )],
                    ErrorBody::new("METHOD_NOT_ALLOWED", "Only POST carries an envelope"),
                );
                self.finish(envelope)
            }
        };

        self.complete(&id, started, response)
    }

    /// Answer a request whose body the transport could not hand over (too
    /// large, unreadable) with an error envelope instead of a bare status
    pub fn reject_request(&self, request: InboundRequest, err: ConventionError) -> OutboundResponse {
        let (request_id, started) = self.begin(&request);
        let id = request_id.to_string();
        self.metrics.increment_envelopes_rejected();
        let envelope = self.convention_failure(&id, err);
        let response = self.finish(envelope);
        self.complete(&id, started, response)
    }

    fn begin(&self, request: &InboundRequest) -> (Uuid, Instant) {
        let request_id = Uuid::new_v4();
        self.metrics.increment_requests_received();
        log_event_with_fields(
            Event::RequestReceived,
            &[
                ("method", request.method.as_str()),
                ("path", &request.path),
                ("request_id", &request_id.to_string()),
            ],
        );
        (request_id, Instant::now())
    }

    fn complete(&self, id: &str, started: Instant, response: OutboundResponse) -> OutboundResponse {
        log_event_with_fields(
            Event::RequestCompleted,
            &[
                ("duration_ms", &started.elapsed().as_millis().to_string()),
                (
                    "meta_code",
                    &response
                        .meta_code
                        .map(|code| code.to_string())
                        .unwrap_or_default(),
                ),
                ("request_id", id),
                ("status", &response.status.to_string()),
            ],
        );
        response
    }

    fn handle_post(&self, request_id: Uuid, request: &InboundRequest) -> ResponseEnvelope {
        let id = request_id.to_string();

        if let Err(err) = RoutePath::parse(&request.path) {
            return self.convention_failure(&id, err);
        }

        let body: &[u8] = if request.body.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &request.body
        };
        let envelope = match self.codec.decode_request(body) {
            Ok(envelope) => envelope,
            Err(err) => {
                self.metrics.increment_envelopes_rejected();
                return self.convention_failure(&id, err);
            }
        };

        let token = request
            .authorization
            .as_deref()
            .and_then(BearerToken::from_header);
        let principal = match self.authenticate(token.as_ref()) {
            Ok(principal) => principal,
            Err(failure) => {
                self.metrics.increment_auth_rejected();
                self.reject(&id, "UNAUTHORIZED");
                return self.error_envelope(
                    failure.meta_code(),
                    &failure.to_string(),
                    Vec::new(),
                    ErrorBody::new("UNAUTHORIZED", failure.to_string()),
                );
            }
        };

        let resolved = match self.router.resolve_path(&request.path) {
            Ok(resolved) => resolved,
            Err(err) => {
                if matches!(err, ConventionError::RouteNotFound(_)) {
                    self.metrics.increment_routes_not_found();
                }
                return self.convention_failure(&id, err);
            }
        };

        let call = HandlerCall {
            request_id,
            route: resolved.key,
            path_params: resolved.path_params,
            envelope,
            token,
            principal,
        };

        let handler = &resolved.handler;
        let result = match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&call))) {
            Ok(result) => result,
            Err(payload) => {
                let message = format!("handler panicked: {}", panic_message(&*payload));
                return self.internal_failure(&id, &message);
            }
        };

        match result {
            Ok(output) => self.wrap_output(&id, output),
            Err(HandlerError::Application {
                code,
                message,
                details,
            }) => {
                self.metrics.increment_application_errors();
                log_event_with_fields(
                    Event::HandlerFailed,
                    &[
                        ("code", &code.to_string()),
                        ("request_id", &id),
                        ("route", &call.route.to_string()),
                    ],
                );
                self.error_envelope(
                    code,
                    &message,
                    details,
                    ErrorBody::new("APPLICATION_ERROR", message.clone()),
                )
            }
            Err(HandlerError::Internal(message)) => self.internal_failure(&id, &message),
        }
    }

    fn handle_head(&self, id: &str, path: &str) -> OutboundResponse {
        let code = match self.router.resolve_path(path) {
            Ok(_) => 200,
            Err(err) => {
                self.reject(id, err.code());
                err.meta_code()
            }
        };
        OutboundResponse {
            status: 200,
            body: Vec::new(),
            meta_code: Some(code),
        }
    }

    fn authenticate(&self, token: Option<&BearerToken>) -> Result<Option<Principal>, AuthFailure> {
        match (token, &self.authenticator) {
            (Some(token), Some(authenticator)) => authenticator.authenticate(token).map(Some),
            (None, _) if self.require_token => Err(AuthFailure::MissingToken),
            _ => Ok(None),
        }
    }

    fn wrap_output(&self, id: &str, output: HandlerOutput) -> ResponseEnvelope {
        let meta = match self
            .meta
            .success_meta(output.code, output.message, output.pagination)
        {
            Ok(meta) => meta,
            Err(err) => return self.internal_failure(id, &err.to_string()),
        };
        self.metrics.increment_requests_succeeded();
        let mut envelope = ResponseEnvelope::new(meta).with_data(output.data);
        if let Some(binary) = output.binary {
            envelope = envelope.with_binary(binary);
        }
        envelope
    }

    fn convention_failure(&self, id: &str, err: ConventionError) -> ResponseEnvelope {
        self.reject(id, err.code());
        self.error_envelope(err.meta_code(), &err.to_string(), err.details(), ErrorBody::from(&err))
    }

    fn internal_failure(&self, id: &str, message: &str) -> ResponseEnvelope {
        self.metrics.increment_internal_errors();
        log_event_with_fields(
            Event::InternalFault,
            &[("error", message), ("request_id", id)],
        );
        self.server_error()
    }

    fn error_envelope(
        &self,
        code: u16,
        message: &str,
        details: Vec<FieldDetail>,
        error: ErrorBody,
    ) -> ResponseEnvelope {
        match self.meta.build_error(code, message, details) {
            Ok(envelope) => envelope.with_error(error),
            Err(err) => {
                self.metrics.increment_internal_errors();
                log_event_with_fields(Event::InternalFault, &[("error", &err.to_string())]);
                self.server_error()
            }
        }
    }

    // Internal details stay in the log
    fn server_error(&self) -> ResponseEnvelope {
        let meta = Meta {
            code: 500,
            message: "Internal Server Error".to_string(),
            time: self.meta.now(),
            pagination: None,
            details: Vec::new(),
        };
        ResponseEnvelope::new(meta)
            .with_data(Value::Array(Vec::new()))
            .with_error(ErrorBody::new("INTERNAL_ERROR", "Internal Server Error"))
    }

    fn finish(&self, envelope: ResponseEnvelope) -> OutboundResponse {
        let code = envelope.meta.code;
        OutboundResponse {
            status: transport_status(code),
            body: self.codec.encode_response(&envelope),
            meta_code: Some(code),
        }
    }

    fn reject(&self, id: &str, reason: &str) {
        log_event_with_fields(
            Event::RequestRejected,
            &[("reason", reason), ("request_id", id)],
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

fn transport_status(code: u16) -> u16 {
    MetaCode::success(code)
        .or_else(|_| MetaCode::error(code))
        .map(|code| code.transport_status())
        .unwrap_or(500)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::StaticTokenAuthenticator;
    use crate::envelope::{BinaryPayload, CodecOptions, Criterion, Pagination};
    use crate::meta::ManualClock;
    use crate::routing::{HandlerResult, RouteTable};
    use serde_json::json;

    fn list_users(call: &HandlerCall) -> HandlerResult {
        let page = Pagination::new(1, 10)?.with_total(2);
        let name = match call.envelope.filter.as_ref().and_then(|f| f.get("name")) {
            Some(Criterion::Exact(value)) => value.clone(),
            _ => Value::Null,
        };
        Ok(HandlerOutput::ok(json!([{"id": 1, "name": name}])).paginated(page))
    }

    fn dispatcher() -> Dispatcher {
        let mut builder = RouteTable::builder();
        builder.register(1, "user", "list", list_users).unwrap();
        builder
            .register(1, "user", "save", |_: &HandlerCall| -> HandlerResult {
                Err(HandlerError::application(422, "Validation failed")
                    .with_detail("name", "Name is required."))
            })
            .unwrap();
        builder
            .register(1, "user", "delete", |_: &HandlerCall| -> HandlerResult {
                Err(HandlerError::internal("database offline"))
            })
            .unwrap();
        builder
            .register(1, "user", "modify", |_: &HandlerCall| -> HandlerResult {
                Ok(HandlerOutput::with_code(302, json!([])))
            })
            .unwrap();
        builder
            .register(1, "user", "avatar", |call: &HandlerCall| -> HandlerResult {
                let id = call.path_param(0).unwrap_or("none").to_string();
                Ok(HandlerOutput::ok(json!({"id": id}))
                    .with_binary(BinaryPayload::from_bytes(b"png")))
            })
            .unwrap();
        let router = Arc::new(Router::new(builder.build()));
        Dispatcher::new(router, EnvelopeCodec::new(CodecOptions::default()))
            .with_meta_builder(MetaBuilder::with_clock(Arc::new(ManualClock::new(
                1734432019759,
            ))))
    }

    fn body(response: &OutboundResponse) -> Value {
        serde_json::from_slice(&response.body).unwrap()
    }

    #[test]
    fn test_post_success() {
        let response = dispatcher().dispatch(InboundRequest::post(
            "/1/user/list",
            r#"{"filter": {"name": "Ada"}}"#,
        ));
        assert_eq!(response.status, 200);
        assert_eq!(response.meta_code, Some(200));

        let body = body(&response);
        assert_eq!(body["meta"]["code"], 200);
        assert_eq!(body["meta"]["time"], 1734432019759i64);
        assert_eq!(body["meta"]["total"], 2);
        assert_eq!(body["meta"]["page_total"], 1);
        assert_eq!(body["data"][0]["name"], "Ada");
    }

    #[test]
    fn test_empty_body_is_empty_envelope() {
        let response = dispatcher().dispatch(InboundRequest::post("/1/user/list", ""));
        assert_eq!(response.meta_code, Some(200));
    }

    #[test]
    fn test_malformed_envelope() {
        let response = dispatcher().dispatch(InboundRequest::post(
            "/1/user/list",
            r#"{"data": {"nested": {"a": 1}}}"#,
        ));
        assert_eq!(response.status, 200);
        let body = body(&response);
        assert_eq!(body["meta"]["code"], 400);
        assert_eq!(body["meta"]["details"][0]["field"], "data.nested");
        assert_eq!(body["error"]["code"], "MALFORMED_ENVELOPE");
    }

    #[test]
    fn test_route_not_found() {
        let d = dispatcher();
        let response = d.dispatch(InboundRequest::post("/2/user/list", "{}"));
        assert_eq!(response.status, 200);
        assert_eq!(response.meta_code, Some(404));
        assert_eq!(body(&response)["data"], json!([]));
        assert_eq!(d.metrics().snapshot().routes_not_found, 1);
    }

    #[test]
    fn test_invalid_path() {
        let response = dispatcher().dispatch(InboundRequest::post("/v1/user/list", "{}"));
        assert_eq!(response.meta_code, Some(400));
        assert_eq!(body(&response)["error"]["code"], "INVALID_ROUTE");
    }

    #[test]
    fn test_application_error() {
        let response = dispatcher().dispatch(InboundRequest::post("/1/user/save", "{}"));
        assert_eq!(response.status, 200);
        let body = body(&response);
        assert_eq!(body["meta"]["code"], 422);
        assert_eq!(body["meta"]["message"], "Validation failed");
        assert_eq!(body["meta"]["details"][0]["message"], "Name is required.");
        assert_eq!(body["error"]["code"], "APPLICATION_ERROR");
    }

    #[test]
    fn test_internal_error_hides_message() {
        let d = dispatcher();
        let response = d.dispatch(InboundRequest::post("/1/user/delete", "{}"));
        assert_eq!(response.status, 500);
        let text = String::from_utf8(response.body.clone()).unwrap();
        assert!(!text.contains("database offline"));
        assert_eq!(body(&response)["meta"]["code"], 500);
        assert_eq!(d.metrics().snapshot().internal_errors, 1);
    }

    #[test]
    fn test_handler_with_invalid_success_code() {
        let response = dispatcher().dispatch(InboundRequest::post("/1/user/modify", "{}"));
        assert_eq!(response.status, 500);
        assert_eq!(response.meta_code, Some(500));
    }

    #[test]
    fn test_path_params_and_binary() {
        let response =
            dispatcher().dispatch(InboundRequest::post("/1/user/avatar/42", "{}"));
        let body = body(&response);
        assert_eq!(body["data"]["id"], "42");
        assert!(body["binary64"].is_string());
    }

    #[test]
    fn test_head_existence_check() {
        let d = dispatcher();
        let found = d.dispatch(InboundRequest::head("/1/user/list"));
        assert_eq!(found.status, 200);
        assert_eq!(found.meta_code, Some(200));
        assert!(!found.has_body());

        let missing = d.dispatch(InboundRequest::head("/1/order/list"));
        assert_eq!(missing.status, 200);
        assert_eq!(missing.meta_code, Some(404));
        assert!(!missing.has_body());
    }

    #[test]
    fn test_options_preflight() {
        let mut request = InboundRequest::post("/1/user/list", "");
        request.method = RequestMethod::Options;
        let response = dispatcher().dispatch(request);
        assert_eq!(response.status, 204);
        assert!(!response.has_body());
        assert_eq!(response.meta_code, None);
    }

    #[test]
    fn test_other_method() {
        let mut request = InboundRequest::post("/1/user/list", "");
        request.method = RequestMethod::parse("get");
        let response = dispatcher().dispatch(request);
        assert_eq!(response.status, 200);
        assert_eq!(body(&response)["meta"]["code"], 405);
    }

    #[test]
    fn test_require_token() {
        let d = dispatcher().require_token(true);
        let response = d.dispatch(InboundRequest::post("/1/user/list", "{}"));
        let body = body(&response);
        assert_eq!(response.status, 200);
        assert_eq!(body["meta"]["code"], 401);
        assert_eq!(body["meta"]["message"], "Missing bearer token");
        assert_eq!(d.metrics().snapshot().auth_rejected, 1);
    }

    #[test]
    fn test_authenticator() {
        let d = dispatcher()
            .with_authenticator(Arc::new(StaticTokenAuthenticator::new("t0k", "ops")))
            .require_token(true);

        let request = |auth: &str| {
            InboundRequest::post("/1/user/list", "{}").with_authorization(auth)
        };

        assert_eq!(d.dispatch(request("Bearer t0k")).meta_code, Some(200));
        assert_eq!(d.dispatch(request("t0k")).meta_code, Some(200));
        assert_eq!(d.dispatch(request("Bearer x")).meta_code, Some(401));
    }

    #[test]
    fn test_token_passed_through_without_authenticator() {
        let mut builder = RouteTable::builder();
        builder
            .register(1, "session", "whoami", |call: &HandlerCall| -> HandlerResult {
                let token = call.token.as_ref().map(|t| t.as_str().to_string());
                Ok(HandlerOutput::ok(json!({ "token": token })))
            })
            .unwrap();
        let d = Dispatcher::new(
            Arc::new(Router::new(builder.build())),
            EnvelopeCodec::default(),
        );
        let response = d.dispatch(
            InboundRequest::post("/1/session/whoami", "{}").with_authorization("opaque-value"),
        );
        assert_eq!(body(&response)["data"]["token"], "opaque-value");
    }

    #[test]
    fn test_panicking_handler_becomes_server_error() {
        let mut builder = RouteTable::builder();
        builder
            .register(1, "user", "crash", |_: &HandlerCall| -> HandlerResult {
                panic!("index out of range")
            })
            .unwrap();
        let d = Dispatcher::new(
            Arc::new(Router::new(builder.build())),
            EnvelopeCodec::default(),
        );

        let response = d.dispatch(InboundRequest::post("/1/user/crash", "{}"));
        assert_eq!(response.status, 500);
        let value = body(&response);
        assert_eq!(value["meta"]["code"], 500);
        assert_eq!(value["error"]["code"], "INTERNAL_ERROR");
        assert!(!value.to_string().contains("index out of range"));
        assert_eq!(d.metrics().snapshot().internal_errors, 1);

        // The dispatcher keeps serving after the panic
        let response = d.dispatch(InboundRequest::post("/1/user/crash", "{}"));
        assert_eq!(response.status, 500);
    }

    #[test]
    fn test_rejected_body_is_an_envelope() {
        let d = dispatcher();
        let response = d.reject_request(
            InboundRequest::post("/1/user/list", Vec::new()),
            ConventionError::PayloadTooLarge { limit: 1024 },
        );

        assert_eq!(response.status, 200);
        assert_eq!(response.meta_code, Some(413));
        let value = body(&response);
        assert_eq!(value["meta"]["code"], 413);
        assert_eq!(value["error"]["code"], "PAYLOAD_TOO_LARGE");
        assert_eq!(value["meta"]["details"][0]["field"], "body");

        let snapshot = d.metrics().snapshot();
        assert_eq!(snapshot.requests_received, 1);
        assert_eq!(snapshot.envelopes_rejected, 1);
    }

    #[test]
    fn test_transport_status() {
        assert_eq!(transport_status(200), 200);
        assert_eq!(transport_status(201), 201);
        assert_eq!(transport_status(404), 200);
        assert_eq!(transport_status(503), 503);
        assert_eq!(transport_status(42), 200);
        assert_eq!(transport_status(4001), 200);
    }
}
