//! SMSAPI.pl client
//!
//! Sends single text messages through the SMSAPI HTTP endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use url::Url;

use crate::ports::{SendOutcome, SmsSender};

pub const DEFAULT_SMSAPI_URL: &str = "https://api.smsapi.pl/sms.do";

/// SMSAPI client
#[derive(Debug)]
pub struct SmsApiSender {
    client: Client,
    url: String,
    token: String,
    from: Option<String>,
}

/// Reply body of `sms.do` with `format=json`
#[derive(Debug, Deserialize)]
struct SmsApiResponse {
    #[serde(default)]
    error: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    list: Vec<SmsApiMessage>,
}

#[derive(Debug, Deserialize)]
struct SmsApiMessage {
    #[serde(default)]
    id: Option<String>,
}

impl SmsApiSender {
    /// Create a client for `url` authenticated with a bearer `token`
    pub fn new(url: &str, token: &str, from: Option<&str>) -> Result<Self> {
        let parsed = Url::parse(url).context("Invalid SMSAPI URL")?;
        if !matches!(parsed.scheme(), "https" | "http") {
            anyhow::bail!("SMSAPI URL must use HTTP(S)");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            url: parsed.to_string(),
            token: token.trim().to_string(),
            from: from.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
        })
    }

    fn deliver(&self, phone_number: &str, text: &str) -> Result<String> {
        if self.token.is_empty() {
            anyhow::bail!("missing SMS API token");
        }
        let to = api_phone_number(phone_number)
            .with_context(|| format!("invalid phone number: {}", phone_number))?;

        let mut form = vec![("to", to), ("message", text.to_string()), ("format", "json".to_string())];
        if let Some(from) = &self.from {
            form.push(("from", from.clone()));
        }

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .form(&form)
            .send()
            .map_err(map_request_error)?;

        let status = response.status().as_u16();
        let body = response.text().context("Failed to read SMSAPI response")?;
        let reply: Option<SmsApiResponse> = serde_json::from_str(&body).ok();

        match reply {
            Some(reply) if status == 200 && (reply.error == Some(0) || !reply.list.is_empty()) => {
                let id = reply.list.first().and_then(|m| m.id.clone()).unwrap_or_default();
                Ok(format!("SMS sent (id: {})", id))
            }
            Some(SmsApiResponse { message: Some(message), error, .. }) => {
                anyhow::bail!("SMSAPI error {}: {}", error.unwrap_or_default(), message)
            }
            _ => anyhow::bail!("SMSAPI error: HTTP {}", status),
        }
    }
}

impl SmsSender for SmsApiSender {
    fn name(&self) -> &str {
        "smsapi"
    }

    fn send(&self, phone_number: &str, text: &str) -> SendOutcome {
        match self.deliver(phone_number, text) {
            Ok(message) => (true, message),
            Err(e) => {
                tracing::debug!(error = %e, "SMS delivery failed");
                (false, format!("{:#}", e))
            }
        }
    }
}

/// Normalise a Polish mobile number to the `48XXXXXXXXX` form the API expects
pub fn api_phone_number(phone: &str) -> Result<String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let national = match digits.strip_prefix("0048") {
        Some(rest) => rest,
        None if digits.len() == 11 => digits.strip_prefix("48").unwrap_or(digits.as_str()),
        None => digits.as_str(),
    };
    if national.len() != 9 {
        anyhow::bail!("expected 9 digits, got {}", national.len());
    }
    Ok(format!("48{}", national))
}

fn map_request_error(error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        anyhow::anyhow!("Connection timed out after 30 seconds")
    } else if error.is_connect() {
        anyhow::anyhow!("Unable to connect to SMSAPI servers")
    } else {
        anyhow::anyhow!("SMSAPI request failed: {}", error)
    }
}
