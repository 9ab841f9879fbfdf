//! # Delivery Service
//!
//! Transport for redeemable verification links. The trait allows switching
//! between a real provider and mock implementations; the core only records
//! delivery outcomes, it never retries on its own.
//!
//! ## Implementations
//!
//! - [`LogSender`] - Development/testing implementation that logs to console
//! - [`ExternalSender`] - Production implementation using an external API

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info, instrument};

/// Errors that can occur while delivering a verification link
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Failed to deliver verification link: {0}")]
    SendFailed(String),
}

/// Trait for verification-link delivery transports
#[async_trait]
pub trait DeliverySender: Send + Sync {
    /// Attempts to deliver a redeemable link for `token` to `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::SendFailed`] on network issues, provider API
    /// errors, or other delivery problems. A failure here never revokes the
    /// already-minted token.
    async fn deliver(
        &self,
        identity: &str,
        token: &str,
        payload: &serde_json::Value,
    ) -> Result<(), DeliveryError>;
}

/// Mock transport for development and testing
///
/// Logs the link details to the console instead of contacting a provider.
pub struct LogSender;

#[async_trait]
impl DeliverySender for LogSender {
    #[instrument(skip(self, payload), fields(identity = %identity))]
    async fn deliver(
        &self,
        identity: &str,
        token: &str,
        payload: &serde_json::Value,
    ) -> Result<(), DeliveryError> {
        info!("Delivering mock verification link");

        println!("====== MOCK DELIVERY ======");
        println!("To: {identity}");
        println!("Token: {token}");
        println!("Payload: {payload}");
        println!("===========================");

        debug!("Mock delivery logged to console");
        Ok(())
    }
}

/// External transport for production use
///
/// Posts the link to a provider API that renders and sends the actual
/// message.
///
/// # Configuration
///
/// Requires the following environment variables in production:
/// - `DELIVERY_API_URL` - Base URL of the provider API
/// - `DELIVERY_API_KEY` - Authentication key for the provider API
/// - `SENDER_ADDRESS` - Address to use as sender
pub struct ExternalSender {
    api_url: String,
    api_key: String,
    sender_address: String,
    http_client: reqwest::Client,
}

impl ExternalSender {
    pub fn new(api_url: String, api_key: String, sender_address: String) -> Self {
        info!(
            api_url = %api_url,
            sender_address = %sender_address,
            "Initializing external delivery service"
        );

        Self {
            api_url,
            api_key,
            sender_address,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DeliverySender for ExternalSender {
    #[instrument(
        skip(self, token, payload),
        fields(identity = %identity, sender = %self.sender_address)
    )]
    async fn deliver(
        &self,
        identity: &str,
        token: &str,
        payload: &serde_json::Value,
    ) -> Result<(), DeliveryError> {
        debug!("Preparing to deliver link via external API");

        let body = json!({
            "to": identity,
            "from": self.sender_address,
            "link_token": token,
            "payload": payload,
        });

        debug!("Sending HTTP request to delivery API");
        let response = self
            .http_client
            .post(&self.api_url)
            .basic_auth("api", Some(&self.api_key))
            .json(&body)
            .send()
            .await;

        match response {
            Ok(res) if res.status().is_success() => {
                info!("Link delivered successfully via external API");
                Ok(())
            }
            Ok(res) => {
                let status = res.status();
                let error_body = res
                    .text()
                    .await
                    .unwrap_or_else(|_| "Failed to read error response body".to_string());

                error!(
                    status = %status,
                    error_body = %error_body,
                    "External delivery API returned error"
                );

                Err(DeliveryError::SendFailed(format!(
                    "Delivery provider API error: {error_body}"
                )))
            }
            Err(e) => {
                error!(error = %e, "Network request to delivery API failed");
                Err(DeliveryError::SendFailed(format!(
                    "Network request error: {e}"
                )))
            }
        }
    }
}
