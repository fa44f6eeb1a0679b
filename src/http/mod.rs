// ============================================================================
// HTTP API
// ============================================================================
//
// Thin actix-web layer over the services. Every response uses the same
// envelope: `{"success": true, "data": ...}` on the happy path and
// `{"success": false, "error": {"code", "message"}}` otherwise, with the
// status code derived from the error's kind. Handlers do no business logic;
// they parse, delegate and count.
//
// ============================================================================

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::domain::sale::errors::{ErrorKind, SaleError};
use crate::metrics::Metrics;
use crate::services::{
    BalanceService, CheckoutService, PaymentService, QuoteService, ShipmentService,
};

pub mod handlers;

pub struct AppState {
    pub checkout: CheckoutService,
    pub payments: PaymentService,
    pub shipments: ShipmentService,
    pub quotes: QuoteService,
    pub reports: BalanceService,
    pub metrics: Arc<Metrics>,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiErrorBody {
                code,
                message: message.into(),
            }),
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(err: &SaleError, metrics: &Metrics) -> HttpResponse {
    let kind = err.kind();
    metrics.record_api_error(kind.as_str());

    // Internal failure details stay in the logs, not on the wire.
    let message = if kind == ErrorKind::Internal {
        tracing::error!(error = %err, "request failed");
        "internal error".to_string()
    } else {
        err.to_string()
    };
    HttpResponse::build(status_for(kind)).json(ApiResponse::failure(kind.as_str(), message))
}

pub(crate) fn respond<T: Serialize>(result: Result<T, SaleError>, metrics: &Metrics) -> HttpResponse {
    match result {
        Ok(data) => HttpResponse::Ok().json(ApiResponse::ok(data)),
        Err(err) => error_response(&err, metrics),
    }
}

/// Deserialization failures answer with the same envelope as domain
/// validation errors.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        let response =
            HttpResponse::BadRequest().json(ApiResponse::failure("validation", message));
        actix_web::error::InternalError::from_response(err, response).into()
    })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        let response =
            HttpResponse::BadRequest().json(ApiResponse::failure("validation", message));
        actix_web::error::InternalError::from_response(err, response).into()
    })
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health))
        .route("/metrics", web::get().to(handlers::metrics))
        .service(
            web::scope("/api/v1")
                .route("/sales", web::post().to(handlers::create_sale))
                .route("/sales/{id}", web::get().to(handlers::get_sale))
                .route(
                    "/sales/{id}/payment-method",
                    web::patch().to(handlers::change_payment_method),
                )
                .route("/sales/{id}/cancel", web::post().to(handlers::cancel_sale))
                .route(
                    "/sales/{id}/shipment",
                    web::post().to(handlers::dispatch_shipment),
                )
                .route(
                    "/sales/{id}/shipment/label",
                    web::get().to(handlers::shipment_label),
                )
                .route(
                    "/sales/{id}/shipment/sync",
                    web::post().to(handlers::sync_shipment),
                )
                .route(
                    "/shipping/quote",
                    web::post().to(handlers::quote_shipping),
                )
                .route(
                    "/reports/balance/{year}",
                    web::get().to(handlers::annual_balance),
                )
                .route(
                    "/webhooks/gateway",
                    web::post().to(handlers::gateway_webhook),
                ),
        );
}
