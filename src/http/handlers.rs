// ============================================================================
// Request Handlers
// ============================================================================

use std::time::Instant;

use actix_web::{web, HttpRequest, HttpResponse};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::clients::QuoteRequest;
use crate::domain::sale::errors::SaleError;
use crate::domain::sale::pricing;
use crate::domain::sale::value_objects::PaymentMethod;
use crate::services::checkout::CreateSaleRequest;

use super::{error_response, respond, ApiResponse, AppState};

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "sales-engine"
    }))
}

pub async fn metrics(state: web::Data<AppState>) -> HttpResponse {
    let encoder = TextEncoder::new();
    let families = state.metrics.registry().gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&families, &mut buffer) {
        tracing::error!(error = %err, "failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

pub async fn create_sale(
    state: web::Data<AppState>,
    body: web::Json<CreateSaleRequest>,
) -> HttpResponse {
    match state.checkout.create(body.into_inner()).await {
        Ok(sale) => {
            state.metrics.record_sale_created(
                &sale.payment_method.to_string(),
                &sale.delivery_type.to_string(),
            );
            HttpResponse::Created().json(ApiResponse::ok(sale))
        }
        Err(err) => error_response(&err, &state.metrics),
    }
}

pub async fn get_sale(state: web::Data<AppState>, path: web::Path<Uuid>) -> HttpResponse {
    respond(state.checkout.sale(path.into_inner()).await, &state.metrics)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMethodRequest {
    pub payment_method: PaymentMethod,
}

pub async fn change_payment_method(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<ChangeMethodRequest>,
) -> HttpResponse {
    match state
        .checkout
        .change_payment_method(path.into_inner(), body.payment_method)
        .await
    {
        Ok(sale) => {
            state.metrics.method_changes_total.inc();
            HttpResponse::Ok().json(ApiResponse::ok(sale))
        }
        Err(err) => error_response(&err, &state.metrics),
    }
}

pub async fn cancel_sale(state: web::Data<AppState>, path: web::Path<Uuid>) -> HttpResponse {
    match state.checkout.cancel(path.into_inner()).await {
        Ok(sale) => {
            state.metrics.sales_cancelled_total.inc();
            HttpResponse::Ok().json(ApiResponse::ok(sale))
        }
        Err(err) => error_response(&err, &state.metrics),
    }
}

/// Gateway notification endpoint. The raw bytes matter: the signature is
/// computed over the body exactly as sent, so it must not pass through any
/// JSON extractor first.
pub async fn gateway_webhook(
    state: web::Data<AppState>,
    request: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    let started = Instant::now();
    let signature = request
        .headers()
        .get("x-signature")
        .and_then(|value| value.to_str().ok());

    let result = state.payments.handle_webhook(signature, &body).await;
    let outcome = match &result {
        Ok(()) => "ok",
        Err(err) => err.kind().as_str(),
    };
    state
        .metrics
        .record_webhook(outcome, started.elapsed().as_secs_f64());

    match result {
        Ok(()) => HttpResponse::Ok().json(ApiResponse::ok(json!({ "received": true }))),
        Err(err) => error_response(&err, &state.metrics),
    }
}

pub async fn dispatch_shipment(state: web::Data<AppState>, path: web::Path<Uuid>) -> HttpResponse {
    match state.shipments.dispatch(path.into_inner()).await {
        Ok(sale) => {
            state.metrics.shipments_dispatched_total.inc();
            HttpResponse::Ok().json(ApiResponse::ok(sale))
        }
        Err(err) => error_response(&err, &state.metrics),
    }
}

pub async fn shipment_label(state: web::Data<AppState>, path: web::Path<Uuid>) -> HttpResponse {
    match state.shipments.label(path.into_inner()).await {
        Ok(url) => HttpResponse::Ok().json(ApiResponse::ok(json!({ "labelUrl": url }))),
        Err(err) => error_response(&err, &state.metrics),
    }
}

pub async fn sync_shipment(state: web::Data<AppState>, path: web::Path<Uuid>) -> HttpResponse {
    match state.shipments.sync(path.into_inner()).await {
        Ok(sale) => {
            state
                .metrics
                .record_shipment_sync(&sale.shipment_status.to_string());
            HttpResponse::Ok().json(ApiResponse::ok(sale))
        }
        Err(err) => error_response(&err, &state.metrics),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingQuoteRequest {
    pub zip_code: String,
    pub total_weight_grams: i64,
    #[serde(default)]
    pub declared_value: i64,
}

#[derive(Debug, Serialize)]
pub struct ShippingQuote {
    pub carrier: Option<String>,
    pub cost: i64,
    pub fallback: bool,
}

/// Standalone cost preview. Answers with the same taxed figure order
/// creation would charge for the parcel.
pub async fn quote_shipping(
    state: web::Data<AppState>,
    body: web::Json<ShippingQuoteRequest>,
) -> HttpResponse {
    let request = body.into_inner();
    if request.zip_code.trim().is_empty() {
        let err = SaleError::Validation("a destination zip code is required".into());
        return error_response(&err, &state.metrics);
    }
    if request.total_weight_grams < 0 || request.declared_value < 0 {
        let err = SaleError::Validation("weight and declared value cannot be negative".into());
        return error_response(&err, &state.metrics);
    }

    let selected = state
        .quotes
        .select(&QuoteRequest {
            zip_code: request.zip_code,
            total_weight_grams: request.total_weight_grams,
            declared_value: request.declared_value,
        })
        .await;
    HttpResponse::Ok().json(ApiResponse::ok(ShippingQuote {
        carrier: selected.carrier,
        cost: pricing::taxed_shipping(selected.base_cost),
        fallback: selected.fallback,
    }))
}

pub async fn annual_balance(state: web::Data<AppState>, path: web::Path<i32>) -> HttpResponse {
    respond(state.reports.annual(path.into_inner()).await, &state.metrics)
}

// ============================================================================
// Tests
// ============================================================================
