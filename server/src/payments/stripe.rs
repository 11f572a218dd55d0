use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, error};

use super::{CheckoutSession, PaymentError, PaymentProvider, PaymentStatus, SessionRequest, SessionStatus};

/// Checkout sessions over Stripe's form-encoded REST API.
#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    api_base: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct SessionBody {
    id: String,
    url: Option<String>,
    payment_status: Option<PaymentStatus>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl StripeClient {
    pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    async fn read_session(response: reqwest::Response) -> Result<SessionBody, PaymentError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<SessionBody>().await?);
        }

        let message = match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => envelope
                .error
                .message
                .unwrap_or_else(|| "no error message".to_string()),
            Err(e) => format!("unreadable error body: {}", e),
        };
        error!(status = status.as_u16(), message = %message, "Stripe API error");
        Err(PaymentError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Builds `<api_base>/v1/checkout/sessions[/<id>]`. The id is appended as a
/// single percent-encoded path segment, so it can never leave the sessions
/// collection or add query parameters.
pub fn sessions_url(api_base: &str, session_id: Option<&str>) -> Result<Url, PaymentError> {
    let mut url = Url::parse(api_base)
        .map_err(|e| PaymentError::InvalidRequest(format!("bad api base '{}': {}", api_base, e)))?;
    url.set_query(None);
    url.set_fragment(None);
    {
        let mut segments = url.path_segments_mut().map_err(|_| {
            PaymentError::InvalidRequest(format!("api base '{}' cannot carry a path", api_base))
        })?;
        segments.pop_if_empty().extend(["v1", "checkout", "sessions"]);
        if let Some(id) = session_id {
            if id.is_empty() || id == "." || id == ".." {
                return Err(PaymentError::InvalidRequest(format!(
                    "invalid session id '{}'",
                    id
                )));
            }
            segments.push(id);
        }
    }
    Ok(url)
}

/// Flattens a session request into Stripe's bracketed form keys.
pub fn session_form(request: &SessionRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("customer_email".to_string(), request.customer_email.clone()),
        (
            "expires_at".to_string(),
            request.expires_at.timestamp().to_string(),
        ),
        (
            "metadata[booking_id]".to_string(),
            request.metadata.booking_id.to_string(),
        ),
        (
            "metadata[event_id]".to_string(),
            request.metadata.event_id.to_string(),
        ),
        (
            "metadata[user_id]".to_string(),
            request.metadata.user_id.to_string(),
        ),
    ];

    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{}]", i);
        form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
        form.push((format!("{prefix}[price_data][currency]"), item.currency.clone()));
        form.push((
            format!("{prefix}[price_data][unit_amount]"),
            item.unit_amount.to_string(),
        ));
        form.push((
            format!("{prefix}[price_data][product_data][name]"),
            item.name.clone(),
        ));
        if let Some(image) = &item.image_url {
            form.push((
                format!("{prefix}[price_data][product_data][images][0]"),
                image.clone(),
            ));
        }
    }

    form
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_session(
        &self,
        request: SessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let response = self
            .http
            .post(sessions_url(&self.api_base, None)?)
            .bearer_auth(&self.secret_key)
            .form(&session_form(&request))
            .send()
            .await?;

        let body = Self::read_session(response).await?;
        let url = body.url.ok_or_else(|| {
            PaymentError::InvalidResponse(format!("session {} has no redirect url", body.id))
        })?;

        debug!(session_id = %body.id, "Stripe checkout session created");
        Ok(CheckoutSession { id: body.id, url })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus, PaymentError> {
        let response = self
            .http
            .get(sessions_url(&self.api_base, Some(session_id))?)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        let body = Self::read_session(response).await?;
        let payment_status = body.payment_status.ok_or_else(|| {
            PaymentError::InvalidResponse(format!("session {} has no payment_status", body.id))
        })?;

        Ok(SessionStatus {
            id: body.id,
            payment_status,
        })
    }
}
