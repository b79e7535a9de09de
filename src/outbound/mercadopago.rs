//! Mercado Pago checkout API client.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use compute::payment::{
    GatewayError, PaymentGateway, Preference, PreferenceRequest, ProviderPayment,
};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

pub struct MercadoPagoGateway {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

#[derive(Serialize)]
struct PreferenceItem<'a> {
    title: &'a str,
    description: &'a str,
    quantity: u32,
    unit_price: f64,
    currency_id: &'a str,
}

#[derive(Serialize)]
struct PreferencePayer<'a> {
    name: &'a str,
    surname: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
struct PreferenceBackUrls<'a> {
    success: &'a str,
    failure: &'a str,
    pending: &'a str,
}

#[derive(Serialize)]
struct PreferenceBody<'a> {
    items: Vec<PreferenceItem<'a>>,
    payer: PreferencePayer<'a>,
    back_urls: PreferenceBackUrls<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auto_return: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification_url: Option<&'a str>,
    external_reference: &'a str,
}

#[derive(Deserialize)]
struct PreferenceCreated {
    id: String,
    init_point: String,
}

impl MercadoPagoGateway {
    pub fn new(base_url: &str, access_token: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }

    async fn read_body(response: reqwest::Response) -> Result<String, GatewayError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

fn body_for(request: &PreferenceRequest) -> Result<PreferenceBody<'_>, GatewayError> {
    let unit_price = request
        .unit_price
        .to_f64()
        .ok_or_else(|| {
            GatewayError::Decode(format!("Amount {} out of range", request.unit_price))
        })?;
    let back_urls = &request.back_urls;
    Ok(PreferenceBody {
        items: vec![PreferenceItem {
            title: &request.title,
            description: &request.description,
            quantity: 1,
            unit_price,
            currency_id: &request.currency_id,
        }],
        payer: PreferencePayer {
            name: &request.payer.name,
            surname: &request.payer.surname,
            email: &request.payer.email,
        },
        back_urls: PreferenceBackUrls {
            success: &back_urls.success,
            failure: &back_urls.failure,
            pending: &back_urls.pending,
        },
        // The provider refuses auto_return without a success URL.
        auto_return: Some("approved").filter(|_| !back_urls.success.is_empty()),
        notification_url: request.notification_url.as_deref(),
        external_reference: &request.external_reference,
    })
}

/// Reads the fields used for reconciliation out of a payment document.
fn parse_payment(raw: String) -> Result<ProviderPayment, GatewayError> {
    let value: Value = serde_json::from_str(&raw).map_err(|e| GatewayError::Decode(e.to_string()))?;

    let id = match &value["id"] {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return Err(GatewayError::Decode("payment without id".to_string())),
    };
    let status = value["status"]
        .as_str()
        .ok_or_else(|| GatewayError::Decode("payment without status".to_string()))?
        .to_string();
    let external_reference = value["external_reference"]
        .as_str()
        .filter(|r| !r.is_empty())
        .map(str::to_string);
    let transaction_amount = match &value["transaction_amount"] {
        Value::Number(n) => n.to_string().parse::<Decimal>().ok(),
        Value::String(s) => s.parse::<Decimal>().ok(),
        _ => None,
    };

    Ok(ProviderPayment {
        id,
        status,
        external_reference,
        transaction_amount,
        raw,
    })
}

#[async_trait]
impl PaymentGateway for MercadoPagoGateway {
    #[instrument(skip(self, request), fields(reference = %request.external_reference))]
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<Preference, GatewayError> {
        let body = body_for(request)?;
        let response = self
            .client
            .post(format!("{}/checkout/preferences", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let text = Self::read_body(response).await?;
        let created: PreferenceCreated =
            serde_json::from_str(&text).map_err(|e| GatewayError::Decode(e.to_string()))?;
        debug!(preference_id = %created.id, "Preference created");
        Ok(Preference {
            id: created.id,
            checkout_url: created.init_point,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_payment(&self, payment_id: &str) -> Result<ProviderPayment, GatewayError> {
        let response = self
            .client
            .get(format!("{}/v1/payments/{payment_id}", self.base_url))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let raw = Self::read_body(response).await?;
        parse_payment(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compute::payment::{BackUrls, Payer};

    #[test]
    fn test_parse_numeric_id_and_amount() {
        let raw = r#"{"id": 123456, "status": "approved", "external_reference": "ref-1", "transaction_amount": 100.5}"#;
        let payment = parse_payment(raw.to_string()).unwrap();
        assert_eq!(payment.id, "123456");
        assert_eq!(payment.status, "approved");
        assert_eq!(payment.external_reference.as_deref(), Some("ref-1"));
        assert_eq!(payment.transaction_amount, Some(Decimal::new(1005, 1)));
        assert_eq!(payment.raw, raw);
    }

    #[test]
    fn test_parse_rejects_missing_status() {
        assert!(matches!(
            parse_payment(r#"{"id": "1"}"#.to_string()),
            Err(GatewayError::Decode(_))
        ));
    }

    #[test]
    fn test_preference_body_shape() {
        let request = PreferenceRequest {
            external_reference: "abc".to_string(),
            title: "Natación".to_string(),
            description: "Inscripción al curso Natación".to_string(),
            unit_price: Decimal::new(100, 0),
            currency_id: "COP".to_string(),
            payer: Payer {
                name: "Ana".to_string(),
                surname: "Gomez".to_string(),
                email: "ana@example.com".to_string(),
            },
            back_urls: BackUrls::default(),
            notification_url: None,
        };

        let json = serde_json::to_value(body_for(&request).unwrap()).unwrap();
        assert_eq!(json["items"][0]["quantity"], 1);
        assert_eq!(json["items"][0]["unit_price"], 100.0);
        assert_eq!(json["external_reference"], "abc");
        assert!(json.get("auto_return").is_none());
        assert!(json.get("notification_url").is_none());
    }
}
