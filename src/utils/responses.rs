//! HTTP response handling
//!
//! One place for building error bodies, redirects and JSON responses so every
//! handler answers with the same shapes. Error bodies are
//! `{ "error": <code>, "message": <text> }`.

use actix_web::{
    http::{header, StatusCode},
    HttpResponse,
};
use serde_json::{json, Value};

/// Unified response builder
pub struct ResponseBuilder;

impl ResponseBuilder {
    // ===============================
    // ERROR RESPONSE METHODS
    // ===============================

    /// `BadRequest` (400)
    #[must_use]
    pub fn bad_request() -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(ErrorType::BadRequest)
    }

    /// `Unauthorized` (401)
    #[must_use]
    pub fn unauthorized() -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(ErrorType::Unauthorized)
    }

    /// `PaymentRequired` (402), used for inline payment failures
    #[must_use]
    pub fn payment_required() -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(ErrorType::PaymentRequired)
    }

    /// `NotFound` (404)
    #[must_use]
    pub fn not_found() -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(ErrorType::NotFound)
    }

    /// `Conflict` (409)
    #[must_use]
    pub fn conflict() -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(ErrorType::Conflict)
    }

    /// `InternalServerError` (500)
    #[must_use]
    pub fn internal_server_error() -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(ErrorType::InternalServerError)
    }

    /// `BadGateway` (502)
    #[must_use]
    pub fn bad_gateway() -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(ErrorType::BadGateway)
    }

    /// `ServiceUnavailable` (503)
    #[must_use]
    pub fn service_unavailable() -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(ErrorType::ServiceUnavailable)
    }

    // ===============================
    // SUCCESS RESPONSE METHODS
    // ===============================

    /// Redirect (302 Found)
    #[must_use]
    pub fn redirect(location: &str) -> RedirectBuilder {
        RedirectBuilder::new(location)
    }

    /// OK (200) with JSON content
    #[must_use]
    pub fn ok() -> JsonResponseBuilder {
        JsonResponseBuilder::new(StatusCode::OK)
    }

    /// Accepted (202) with JSON content
    #[must_use]
    pub fn accepted() -> JsonResponseBuilder {
        JsonResponseBuilder::new(StatusCode::ACCEPTED)
    }

    // ===============================
    // CONVENIENCE METHODS
    // ===============================

    /// Auth check still in flight; clients retry after `retry_after_seconds`
    #[must_use]
    pub fn pending(retry_after_seconds: u32, body: &Value) -> HttpResponse {
        Self::accepted()
            .with_header(header::RETRY_AFTER.as_str(), &retry_after_seconds.to_string())
            .json(body)
    }

    /// Authentication failure
    #[must_use]
    pub fn authentication_failed(reason: &str) -> HttpResponse {
        Self::unauthorized()
            .with_error_code("authentication_failed")
            .with_message(reason)
            .build()
    }

    #[must_use]
    pub fn registration_failed(reason: &str) -> HttpResponse {
        Self::bad_request()
            .with_error_code("registration_failed")
            .with_message(reason)
            .build()
    }
}

// ===============================
// BUILDER TYPES
// ===============================

/// Builder for error responses with fluent interface
pub struct ErrorResponseBuilder {
    error_type: ErrorType,
    error_code: Option<String>,
    message: Option<String>,
    additional_fields: Option<Value>,
}

/// Builder for redirect responses
pub struct RedirectBuilder {
    location: String,
}

/// Builder for JSON responses
pub struct JsonResponseBuilder {
    status: StatusCode,
    headers: Vec<(String, String)>,
}

/// Supported HTTP error response types
#[derive(Clone, Copy)]
enum ErrorType {
    BadRequest,
    Unauthorized,
    PaymentRequired,
    NotFound,
    Conflict,
    InternalServerError,
    BadGateway,
    ServiceUnavailable,
}

impl ErrorType {
    fn status(self) -> StatusCode {
        match self {
            ErrorType::BadRequest => StatusCode::BAD_REQUEST,
            ErrorType::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorType::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            ErrorType::NotFound => StatusCode::NOT_FOUND,
            ErrorType::Conflict => StatusCode::CONFLICT,
            ErrorType::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorType::BadGateway => StatusCode::BAD_GATEWAY,
            ErrorType::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn default_code(self) -> &'static str {
        match self {
            ErrorType::BadRequest => "invalid_request",
            ErrorType::Unauthorized => "unauthorized",
            ErrorType::PaymentRequired => "payment_failed",
            ErrorType::NotFound => "not_found",
            ErrorType::Conflict => "conflict",
            ErrorType::InternalServerError => "server_error",
            ErrorType::BadGateway => "bad_gateway",
            ErrorType::ServiceUnavailable => "service_unavailable",
        }
    }

    fn default_message(self) -> &'static str {
        match self {
            ErrorType::BadRequest => "The request is malformed or invalid",
            ErrorType::Unauthorized => "Authentication is required to access this resource",
            ErrorType::PaymentRequired => "The payment could not be completed",
            ErrorType::NotFound => "The requested resource does not exist",
            ErrorType::Conflict => "The request conflicts with an operation in progress",
            ErrorType::InternalServerError => "An internal server error occurred",
            ErrorType::BadGateway => "An upstream service failed",
            ErrorType::ServiceUnavailable => "The service is temporarily unavailable",
        }
    }
}

// ===============================
// ERROR RESPONSE BUILDER IMPL
// ===============================

impl ErrorResponseBuilder {
    fn new(error_type: ErrorType) -> Self {
        Self {
            error_type,
            error_code: None,
            message: None,
            additional_fields: None,
        }
    }

    /// Set a custom error code (e.g., "`invalid_request`", "`payment_failed`")
    #[must_use]
    pub fn with_error_code(mut self, code: &str) -> Self {
        self.error_code = Some(code.to_string());
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    /// Merge extra JSON fields into the body
    #[must_use]
    pub fn with_additional_fields(mut self, fields: Value) -> Self {
        self.additional_fields = Some(fields);
        self
    }

    /// Build the final `HttpResponse`
    #[must_use]
    pub fn build(self) -> HttpResponse {
        let mut body = json!({
            "error": self.error_code.unwrap_or_else(|| self.error_type.default_code().to_string()),
            "message": self.message.unwrap_or_else(|| self.error_type.default_message().to_string()),
        });

        if let (Some(Value::Object(extra)), Some(map)) =
            (self.additional_fields, body.as_object_mut())
        {
            for (key, value) in extra {
                map.insert(key, value);
            }
        }

        HttpResponse::build(self.error_type.status())
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .json(body)
    }
}

// ===============================
// REDIRECT BUILDER IMPL
// ===============================

impl RedirectBuilder {
    fn new(location: &str) -> Self {
        Self {
            location: location.to_string(),
        }
    }

    /// Build the final redirect response
    #[must_use]
    pub fn build(self) -> HttpResponse {
        HttpResponse::Found()
            .append_header((header::LOCATION, self.location))
            .finish()
    }
}

// ===============================
// JSON RESPONSE BUILDER IMPL
// ===============================

impl JsonResponseBuilder {
    fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    /// Add a custom header
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Build the response with JSON content
    #[must_use]
    pub fn json<T: serde::Serialize>(self, data: &T) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status);
        for (name, value) in self.headers {
            builder.insert_header((name, value));
        }
        builder.json(data)
    }
}
