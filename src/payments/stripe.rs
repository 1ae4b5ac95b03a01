use std::collections::HashMap;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::StripeSettings;
use crate::error::{msg, AppError, Result};

use super::{
    AccountStatus, CheckoutParams, CheckoutSession, PaymentProcessor, SessionDetail, META_ANSWERS,
    META_FORM_ID,
};

type HmacSha256 = Hmac<Sha256>;

const API_BASE: &str = "https://api.stripe.com/v1";

/// Thin client over the Stripe REST API.
///
/// Uses express connected accounts and destination charges: the checkout
/// session's payment intent carries the application fee and routes the
/// remainder to the mentor's account.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    webhook_secret: String,
}

impl StripeClient {
    pub fn new(settings: &StripeSettings) -> Self {
        Self {
            client: Client::new(),
            secret_key: settings.secret_key.clone(),
            webhook_secret: settings.webhook_secret.clone(),
        }
    }

    async fn post_form<T: serde::Serialize + ?Sized>(&self, path: &str, form: &T) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{}", API_BASE, path))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("request to {} failed: {}", path, e)))?;

        check_status(path, response).await
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(format!("{}{}", API_BASE, path))
            .basic_auth(&self.secret_key, None::<&str>)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("request to {} failed: {}", path, e)))?;

        check_status(path, response).await
    }

    /// Maximum age of a webhook timestamp before it's rejected (in seconds).
    const SIGNATURE_TOLERANCE_SECS: i64 = 300;
    /// Allowed clock skew for timestamps from the future (in seconds).
    const FUTURE_SKEW_SECS: i64 = 60;
}

/// Surface a non-2xx processor response as `Upstream` with the processor's
/// message verbatim, for support triage.
async fn check_status(path: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::error!("Stripe {} returned {}: {}", path, status, body);
    Err(AppError::Upstream(body))
}

#[derive(Debug, Deserialize)]
struct AccountObject {
    id: String,
    #[serde(default)]
    details_submitted: bool,
    #[serde(default)]
    charges_enabled: bool,
}

#[derive(Debug, Deserialize)]
struct AccountLinkObject {
    url: String,
}

#[derive(Debug, Deserialize)]
struct CreatedSession {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct RetrievedSession {
    id: String,
    payment_status: String,
    amount_total: Option<i64>,
    currency: Option<String>,
    payment_intent: Option<ExpandedPaymentIntent>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ExpandedPaymentIntent {
    id: String,
    application_fee_amount: Option<i64>,
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    async fn create_account(&self, email: &str) -> Result<String> {
        let response = self
            .post_form("/accounts", &[("type", "express"), ("email", email)])
            .await?;

        let account: AccountObject = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse account response: {}", e)))?;

        Ok(account.id)
    }

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String> {
        let response = self
            .post_form(
                "/account_links",
                &[
                    ("account", account_id),
                    ("refresh_url", refresh_url),
                    ("return_url", return_url),
                    ("type", "account_onboarding"),
                ],
            )
            .await?;

        let link: AccountLinkObject = response.json().await.map_err(|e| {
            AppError::Internal(format!("Failed to parse account link response: {}", e))
        })?;

        Ok(link.url)
    }

    async fn account_status(&self, account_id: &str) -> Result<AccountStatus> {
        let response = self.get(&format!("/accounts/{}", account_id), &[]).await?;

        let account: AccountObject = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse account response: {}", e)))?;

        Ok(AccountStatus {
            details_submitted: account.details_submitted,
            charges_enabled: account.charges_enabled,
        })
    }

    async fn create_checkout_session(&self, params: &CheckoutParams) -> Result<CheckoutSession> {
        let form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), params.success_url.clone()),
            ("cancel_url".into(), params.cancel_url.clone()),
            (
                "line_items[0][price_data][currency]".into(),
                params.currency.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".into(),
                params.price_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".into(),
                params.form_title.clone(),
            ),
            ("line_items[0][quantity]".into(), "1".into()),
            (
                "payment_intent_data[application_fee_amount]".into(),
                params.application_fee_cents.to_string(),
            ),
            (
                "payment_intent_data[transfer_data][destination]".into(),
                params.destination_account.clone(),
            ),
            (format!("metadata[{}]", META_FORM_ID), params.form_id.clone()),
            (format!("metadata[{}]", META_ANSWERS), params.answers_json.clone()),
        ];

        let response = self.post_form("/checkout/sessions", &form).await?;

        let session: CreatedSession = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse session response: {}", e)))?;

        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }

    async fn checkout_session(&self, session_id: &str) -> Result<SessionDetail> {
        let response = self
            .get(
                &format!("/checkout/sessions/{}", session_id),
                &[("expand[]", "payment_intent")],
            )
            .await?;

        let mut session: RetrievedSession = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse session response: {}", e)))?;

        let (payment_intent, application_fee_cents) = match session.payment_intent {
            Some(pi) => (Some(pi.id), pi.application_fee_amount),
            None => (None, None),
        };

        Ok(SessionDetail {
            id: session.id,
            payment_status: session.payment_status,
            payment_intent,
            amount_total: session.amount_total,
            currency: session.currency,
            application_fee_cents,
            form_id: session.metadata.remove(META_FORM_ID),
            answers_json: session.metadata.remove(META_ANSWERS),
        })
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature_header: &str) -> Result<bool> {
        let (timestamp_raw, candidate) = split_signature_header(signature_header)?;

        // Reject stale and far-future timestamps before any crypto; replayed
        // deliveries must not be accepted with an old but valid signature.
        let timestamp: i64 = timestamp_raw
            .parse()
            .map_err(|_| AppError::BadRequest(msg::INVALID_TIMESTAMP_IN_SIGNATURE.into()))?;
        let age = chrono::Utc::now().timestamp() - timestamp;

        if age > Self::SIGNATURE_TOLERANCE_SECS {
            tracing::warn!(
                "Webhook rejected: timestamp too old (age={}s, max={}s)",
                age,
                Self::SIGNATURE_TOLERANCE_SECS
            );
            return Ok(false);
        }
        if age < -Self::FUTURE_SKEW_SECS {
            tracing::warn!("Webhook rejected: timestamp in the future (age={}s)", age);
            return Ok(false);
        }

        // The signed payload is "<timestamp>.<raw body>" over the exact
        // bytes the processor sent; any body rewriting upstream breaks this.
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| AppError::Internal("Invalid webhook secret".into()))?;
        mac.update(timestamp_raw.as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = hex::encode(mac.finalize().into_bytes());

        // Constant-time comparison; the length check leaks nothing since
        // SHA-256 signatures are always 64 hex chars.
        if expected.len() != candidate.len() {
            return Ok(false);
        }
        Ok(expected.as_bytes().ct_eq(candidate.as_bytes()).into())
    }
}

/// Parse a `t=<ts>,v1=<sig>` signature header into its two parts.
fn split_signature_header(header: &str) -> Result<(String, String)> {
    let mut timestamp = None;
    let mut candidate = None;

    for part in header.split(',') {
        match part.split_once('=') {
            Some(("t", v)) => timestamp = Some(v),
            Some(("v1", v)) => candidate = Some(v),
            _ => {}
        }
    }

    match (timestamp, candidate) {
        (Some(t), Some(c)) => Ok((t.to_string(), c.to_string())),
        _ => Err(AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into())),
    }
}

// ============ Webhook payloads ============

/// Generic webhook event envelope - object is parsed based on event_type.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

/// `checkout.session.completed` payload subset.
#[derive(Debug, Deserialize)]
pub struct WebhookSession {
    pub id: String,
    pub payment_status: String,
}

/// `account.updated` payload subset.
#[derive(Debug, Deserialize)]
pub struct WebhookAccount {
    pub id: String,
    #[serde(default)]
    pub details_submitted: bool,
    #[serde(default)]
    pub charges_enabled: bool,
}
