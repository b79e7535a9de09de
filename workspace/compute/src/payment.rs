//! Checkout and reconciliation of course payments.
//!
//! A payment row is written as `pending` before the provider is contacted and
//! its id travels to the provider as the external reference. The provider
//! later reports back through a webhook; [`reconcile_payment`] asks the
//! provider for the authoritative state and applies it. Only the call that
//! moves a payment into `completed` creates the paid enrollment, so repeated
//! deliveries of the same event are harmless.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use model::entities::{
    course, enrollment, payment,
    payment::PaymentStatus,
    school,
    user::{self, Role},
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set, TransactionTrait, sea_query::Expr,
};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::enrollment::{EnrollmentOutcome, create_paid_enrollment};
use crate::error::{ComputeError, Result};

pub const PAYMENT_METHOD: &str = "mercadopago";

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Provider answered {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Unexpected provider response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payer {
    pub name: String,
    pub surname: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

/// Provider-independent description of a single-item checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceRequest {
    pub external_reference: String,
    pub title: String,
    pub description: String,
    pub unit_price: Decimal,
    pub currency_id: String,
    pub payer: Payer,
    pub back_urls: BackUrls,
    pub notification_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preference {
    pub id: String,
    pub checkout_url: String,
}

/// A payment as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPayment {
    pub id: String,
    pub status: String,
    pub external_reference: Option<String>,
    pub transaction_amount: Option<Decimal>,
    /// Raw JSON document, stored for auditing.
    pub raw: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> std::result::Result<Preference, GatewayError>;

    async fn fetch_payment(
        &self,
        payment_id: &str,
    ) -> std::result::Result<ProviderPayment, GatewayError>;
}

/// Checkout settings that do not depend on the payment.
#[derive(Debug, Clone, Default)]
pub struct CheckoutSettings {
    pub currency_id: String,
    pub back_urls: BackUrls,
    pub notification_url: Option<String>,
}

pub fn map_provider_status(status: &str) -> PaymentStatus {
    match status {
        "approved" => PaymentStatus::Completed,
        "rejected" => PaymentStatus::Failed,
        "pending" | "in_process" => PaymentStatus::Pending,
        other => {
            debug!(status = other, "Unmapped provider status, keeping payment pending");
            PaymentStatus::Pending
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatedPayment {
    pub payment: payment::Model,
    pub preference: Preference,
}

#[instrument(skip(db, gateway, settings, payer), fields(payer_id = %payer.id))]
pub async fn create_payment(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    settings: &CheckoutSettings,
    payer: &user::Model,
    course_id: Uuid,
    amount: Decimal,
) -> Result<CreatedPayment> {
    if amount <= Decimal::ZERO {
        return Err(ComputeError::Validation(
            "El monto debe ser mayor que cero".to_string(),
        ));
    }

    let course = course::Entity::find_by_id(course_id)
        .one(db)
        .await?
        .ok_or(ComputeError::NotFound("Course"))?;

    let now = Utc::now();
    let pending = payment::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(payer.id),
        course_id: Set(course.id),
        amount: Set(amount),
        status: Set(PaymentStatus::Pending),
        payment_method: Set(PAYMENT_METHOD.to_string()),
        description: Set(format!("Inscripción al curso {}", course.name)),
        provider_payment_id: Set(None),
        provider_payload: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    let request = PreferenceRequest {
        external_reference: pending.id.to_string(),
        title: course.name.clone(),
        description: pending.description.clone(),
        unit_price: amount,
        currency_id: settings.currency_id.clone(),
        payer: Payer {
            name: payer.name.clone(),
            surname: payer.lastname.clone(),
            email: payer.email.clone(),
        },
        back_urls: settings.back_urls.clone(),
        notification_url: settings.notification_url.clone(),
    };

    match gateway.create_preference(&request).await {
        Ok(preference) => {
            info!(payment_id = %pending.id, preference_id = %preference.id, "Checkout created");
            Ok(CreatedPayment {
                payment: pending,
                preference,
            })
        }
        Err(e) => {
            error!(payment_id = %pending.id, "Gateway refused the checkout: {e}");
            let mut failed = pending.into_active_model();
            failed.status = Set(PaymentStatus::Failed);
            failed.updated_at = Set(Utc::now());
            failed.update(db).await?;
            Err(e.into())
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub payment: payment::Model,
    /// Set only for the delivery that completed the payment.
    pub enrollment: Option<enrollment::Model>,
}

/// Applies the provider's view of payment `provider_payment_id`.
#[instrument(skip(db, gateway))]
pub async fn reconcile_payment(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    provider_payment_id: &str,
    today: NaiveDate,
) -> Result<ReconcileOutcome> {
    let remote = gateway.fetch_payment(provider_payment_id).await?;

    let local = match remote
        .external_reference
        .as_deref()
        .and_then(|r| Uuid::parse_str(r).ok())
    {
        Some(id) => payment::Entity::find_by_id(id).one(db).await?,
        None => {
            payment::Entity::find()
                .filter(payment::Column::ProviderPaymentId.eq(remote.id.as_str()))
                .one(db)
                .await?
        }
    }
    .ok_or(ComputeError::NotFound("Payment"))?;

    let status = map_provider_status(&remote.status);
    debug!(payment_id = %local.id, remote_status = %remote.status, ?status, "Reconciling payment");

    let txn = db.begin().await?;
    let mut enrollment = None;

    if status == PaymentStatus::Completed {
        let won = payment::Entity::update_many()
            .col_expr(payment::Column::Status, Expr::value(PaymentStatus::Completed))
            .col_expr(payment::Column::ProviderPaymentId, Expr::value(Some(remote.id.clone())))
            .col_expr(payment::Column::ProviderPayload, Expr::value(Some(remote.raw.clone())))
            .col_expr(payment::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(payment::Column::Id.eq(local.id))
            .filter(payment::Column::Status.ne(PaymentStatus::Completed))
            .exec(&txn)
            .await?
            .rows_affected
            == 1;

        if won {
            let price = remote.transaction_amount.unwrap_or(local.amount);
            enrollment =
                create_paid_enrollment(&txn, local.user_id, local.course_id, price, today).await?;
        } else {
            info!(payment_id = %local.id, "Payment already completed, ignoring delivery");
        }
    } else if local.status == PaymentStatus::Completed {
        warn!(
            payment_id = %local.id,
            ?status,
            "Provider reports a completed payment as not approved"
        );
    } else {
        let mut active = local.clone().into_active_model();
        active.status = Set(status);
        active.provider_payment_id = Set(Some(remote.id.clone()));
        active.provider_payload = Set(Some(remote.raw.clone()));
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;
    }

    txn.commit().await?;

    let payment = payment::Entity::find_by_id(local.id)
        .one(db)
        .await?
        .ok_or(ComputeError::NotFound("Payment"))?;
    Ok(ReconcileOutcome {
        payment,
        enrollment,
    })
}

#[derive(Debug, Clone)]
pub struct PaymentView {
    pub payment: payment::Model,
    pub enrollment: Option<EnrollmentOutcome>,
}

/// A payment as seen by its owner or an administrator.
#[instrument(skip(db, requester), fields(requester_id = %requester.id))]
pub async fn payment_status(
    db: &DatabaseConnection,
    payment_id: Uuid,
    requester: &user::Model,
) -> Result<PaymentView> {
    let payment = payment::Entity::find_by_id(payment_id)
        .one(db)
        .await?
        .ok_or(ComputeError::NotFound("Payment"))?;

    if payment.user_id != requester.id && requester.role != Role::Admin {
        return Err(ComputeError::Forbidden(
            "No puedes consultar pagos de otro usuario".to_string(),
        ));
    }

    let mut enrollment = None;
    if payment.status == PaymentStatus::Completed {
        if let Some(row) = enrollment::find_active(db, payment.user_id, payment.course_id).await? {
            let course = course::Entity::find_by_id(payment.course_id)
                .one(db)
                .await?
                .ok_or(ComputeError::NotFound("Course"))?;
            let school = school::Entity::find_by_id(course.school_id)
                .one(db)
                .await?
                .ok_or(ComputeError::NotFound("School"))?;
            enrollment = Some(EnrollmentOutcome {
                enrollment: row,
                course,
                school,
            });
        }
    }

    Ok(PaymentView {
        payment,
        enrollment,
    })
}
