use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use common::{EnrollmentSummary, format_amount};
use compute::payment as checkout;
use model::entities::payment::{self, PaymentStatus};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::ValidatedJson;
use crate::schemas::{ApiResponse, AppState, ErrorResponse, ok};

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreatePaymentRequest {
    pub course_id: Uuid,
    /// Decimal amount, sent as a string, e.g. `"100"`
    #[schema(value_type = String)]
    pub amount: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatePaymentResponse {
    pub payment_id: Uuid,
    pub preference_id: String,
    /// Hosted checkout page the buyer is redirected to
    pub checkout_url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub course_id: Uuid,
    #[schema(value_type = String)]
    pub amount: Decimal,
    /// Amount formatted for display in the configured currency
    pub formatted_amount: String,
    pub status: PaymentStatus,
    pub payment_method: String,
    pub description: String,
    pub provider_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentResponse {
    fn new(model: payment::Model, currency: &str) -> Self {
        Self {
            formatted_amount: format_amount(model.amount, currency),
            id: model.id,
            course_id: model.course_id,
            amount: model.amount,
            status: model.status,
            payment_method: model.payment_method,
            description: model.description,
            provider_payment_id: model.provider_payment_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentStatusResponse {
    pub payment: PaymentResponse,
    /// Present once the payment is completed
    pub enrollment: Option<EnrollmentSummary>,
}

/// Start the checkout of a course
#[utoipa::path(
    post,
    path = "/api/payments/create",
    tag = "payments",
    request_body = CreatePaymentRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Checkout created", body = ApiResponse<CreatePaymentResponse>),
        (status = 400, description = "Invalid amount", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 502, description = "The payment provider refused the checkout", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request), fields(user_id = %auth.id(), course_id = %request.course_id))]
pub async fn create_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<CreatePaymentRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<CreatePaymentResponse>>)> {
    let settings = state.config.payments.checkout_settings();
    let created = checkout::create_payment(
        &state.db,
        state.gateway.as_ref(),
        &settings,
        &auth.0,
        request.course_id,
        request.amount,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        ok(
            CreatePaymentResponse {
                payment_id: created.payment.id,
                preference_id: created.preference.id,
                checkout_url: created.preference.checkout_url,
            },
            "Pago creado exitosamente",
        ),
    ))
}

/// The provider announces events either in the JSON body
/// (`{"type": "payment", "data": {"id": "123"}}`) or in the query string
/// (`?type=payment&data.id=123`, or the older `?topic=payment&id=123`).
fn payment_event(query: &HashMap<String, String>, body: &Bytes) -> Option<String> {
    let json: Option<Value> = serde_json::from_slice(body).ok();
    let json_str = |pointer: &str| {
        json.as_ref()
            .and_then(|v| v.pointer(pointer))
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    };

    let kind = json_str("/type")
        .or_else(|| json_str("/topic"))
        .or_else(|| query.get("type").cloned())
        .or_else(|| query.get("topic").cloned())?;
    if kind != "payment" {
        debug!(kind = %kind, "Ignoring non-payment event");
        return None;
    }

    json_str("/data/id")
        .or_else(|| query.get("data.id").cloned())
        .or_else(|| query.get("id").cloned())
}

/// Payment provider notifications
///
/// Always acknowledged with 200 unless processing failed, in which case the
/// provider is answered 500 so that it delivers the event again.
#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    tag = "payments",
    responses(
        (status = 200, description = "Event processed or ignored"),
        (status = 500, description = "Processing failed, the provider should retry", body = ErrorResponse)
    )
)]
#[instrument(skip(state, query, body))]
pub async fn payment_webhook(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let Some(provider_id) = payment_event(&query, &body) else {
        return ok(None::<PaymentResponse>, "Evento ignorado").into_response();
    };

    let today = Utc::now().date_naive();
    match checkout::reconcile_payment(&state.db, state.gateway.as_ref(), &provider_id, today).await
    {
        Ok(outcome) => {
            info!(
                payment_id = %outcome.payment.id,
                status = ?outcome.payment.status,
                enrolled = outcome.enrollment.is_some(),
                "Webhook processed"
            );
            let data = PaymentResponse::new(outcome.payment, &state.config.payments.currency);
            ok(Some(data), "Notificación procesada").into_response()
        }
        Err(e) => {
            error!(provider_payment_id = %provider_id, "Webhook processing failed: {e}");
            let body = ErrorResponse {
                success: false,
                message: "Error procesando la notificación".to_string(),
                error: "WEBHOOK_PROCESSING_ERROR".to_string(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

/// Status of a payment and, once completed, the enrollment it bought
#[utoipa::path(
    get,
    path = "/api/payments/status/{payment_id}",
    tag = "payments",
    params(("payment_id" = Uuid, Path, description = "Payment ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Payment status", body = ApiResponse<PaymentStatusResponse>),
        (status = 403, description = "Payment of another user", body = ErrorResponse),
        (status = 404, description = "Payment not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_payment_status(
    Path(payment_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<PaymentStatusResponse>>> {
    let view = checkout::payment_status(&state.db, payment_id, &auth.0).await?;
    let data = PaymentStatusResponse {
        enrollment: view.enrollment.as_ref().map(|e| e.summary()),
        payment: PaymentResponse::new(view.payment, &state.config.payments.currency),
    };
    Ok(ok(data, "Estado del pago obtenido exitosamente"))
}

/// Payments of the caller
#[utoipa::path(
    get,
    path = "/api/payments/me",
    tag = "payments",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Payments of the caller", body = ApiResponse<Vec<PaymentResponse>>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth), fields(user_id = %auth.id()))]
pub async fn get_my_payments(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<PaymentResponse>>>> {
    let payments = payment::Entity::find()
        .filter(payment::Column::UserId.eq(auth.id()))
        .order_by_desc(payment::Column::CreatedAt)
        .all(&state.db)
        .await?;
    let currency = &state.config.payments.currency;
    let data = payments
        .into_iter()
        .map(|p| PaymentResponse::new(p, currency))
        .collect();
    Ok(ok(data, "Pagos obtenidos exitosamente"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_from_json_body() {
        let body = Bytes::from_static(br#"{"type":"payment","data":{"id":"123"}}"#);
        assert_eq!(payment_event(&HashMap::new(), &body), Some("123".to_string()));
    }

    #[test]
    fn test_event_with_numeric_id() {
        let body = Bytes::from_static(br#"{"type":"payment","data":{"id":456}}"#);
        assert_eq!(payment_event(&HashMap::new(), &body), Some("456".to_string()));
    }

    #[test]
    fn test_event_from_query_string() {
        let query = HashMap::from([
            ("topic".to_string(), "payment".to_string()),
            ("id".to_string(), "789".to_string()),
        ]);
        assert_eq!(payment_event(&query, &Bytes::new()), Some("789".to_string()));
    }

    #[test]
    fn test_other_events_are_ignored() {
        let body = Bytes::from_static(br#"{"type":"merchant_order","data":{"id":"1"}}"#);
        assert_eq!(payment_event(&HashMap::new(), &body), None);
        assert_eq!(payment_event(&HashMap::new(), &Bytes::new()), None);
    }
}
