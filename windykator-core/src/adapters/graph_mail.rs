//! Microsoft Graph mail client
//!
//! Sends mail from a Microsoft 365 mailbox via `users/{mailbox}/sendMail`.
//! The caller supplies a ready access token.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Serialize;
use url::Url;

use crate::ports::{EmailSender, SendOutcome};

pub const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com/v1.0";

/// Graph sendMail client
#[derive(Debug)]
pub struct GraphMailSender {
    client: Client,
    base_url: String,
    access_token: String,
    mailbox: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMailRequest<'a> {
    message: GraphMessage<'a>,
    save_to_sent_items: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphMessage<'a> {
    subject: &'a str,
    body: GraphBody<'a>,
    to_recipients: Vec<GraphRecipient<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphBody<'a> {
    content_type: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphRecipient<'a> {
    email_address: GraphAddress<'a>,
}

#[derive(Debug, Serialize)]
struct GraphAddress<'a> {
    address: &'a str,
}

impl GraphMailSender {
    pub fn new(graph_url: &str, access_token: &str, mailbox: &str) -> Result<Self> {
        let parsed = Url::parse(graph_url).context("Invalid Graph API URL")?;
        if parsed.scheme() != "https" {
            anyhow::bail!("Graph API URL must use HTTPS");
        }
        if mailbox.trim().is_empty() {
            anyhow::bail!("Sender mailbox is not configured");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: graph_url.trim_end_matches('/').to_string(),
            access_token: access_token.trim().to_string(),
            mailbox: mailbox.trim().to_string(),
        })
    }

    fn send_url(&self) -> String {
        format!("{}/users/{}/sendMail", self.base_url, self.mailbox)
    }

    fn deliver(&self, to: &str, subject: &str, html_body: &str) -> Result<String> {
        if self.access_token.is_empty() {
            anyhow::bail!("missing Graph access token");
        }

        let request = SendMailRequest {
            message: GraphMessage {
                subject,
                body: GraphBody {
                    content_type: "HTML",
                    content: html_body,
                },
                to_recipients: vec![GraphRecipient {
                    email_address: GraphAddress { address: to },
                }],
            },
            save_to_sent_items: true,
        };

        let response = self
            .client
            .post(self.send_url())
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .map_err(map_request_error)?;

        match response.status().as_u16() {
            202 => Ok(format!("Email sent to {}", to)),
            401 => anyhow::bail!("Graph authentication failed. The access token may be expired."),
            403 => anyhow::bail!("Graph access denied. The token lacks Mail.Send permission for {}", self.mailbox),
            404 => anyhow::bail!("Mailbox {} not found", self.mailbox),
            429 => anyhow::bail!("Graph rate limit exceeded. Please wait a moment and try again."),
            status => {
                let detail = response.text().unwrap_or_default();
                anyhow::bail!("Graph API error: HTTP {} {}", status, detail.trim())
            }
        }
    }
}

impl EmailSender for GraphMailSender {
    fn name(&self) -> &str {
        "graph"
    }

    fn send(&self, to: &str, subject: &str, html_body: &str) -> SendOutcome {
        match self.deliver(to, subject, html_body) {
            Ok(message) => (true, message),
            Err(e) => {
                tracing::debug!(error = %e, "email delivery failed");
                (false, format!("{:#}", e))
            }
        }
    }
}

fn map_request_error(error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        anyhow::anyhow!("Connection timed out after 30 seconds")
    } else if error.is_connect() {
        anyhow::anyhow!("Unable to connect to Microsoft Graph")
    } else {
        anyhow::anyhow!("Graph request failed: {}", error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_url() {
        let sender = GraphMailSender::new("https://graph.microsoft.com/v1.0/", "t", " biuro@firma.pl ").unwrap();
        assert_eq!(
            sender.send_url(),
            "https://graph.microsoft.com/v1.0/users/biuro@firma.pl/sendMail"
        );
    }

    #[test]
    fn test_rejects_bad_configuration() {
        assert!(GraphMailSender::new("http://graph.microsoft.com", "t", "a@b.pl").is_err());
        assert!(GraphMailSender::new(DEFAULT_GRAPH_URL, "t", "").is_err());
    }

    #[test]
    fn test_request_body_shape() {
        let request = SendMailRequest {
            message: GraphMessage {
                subject: "S",
                body: GraphBody { content_type: "HTML", content: "<p>x</p>" },
                to_recipients: vec![GraphRecipient {
                    email_address: GraphAddress { address: "a@b.pl" },
                }],
            },
            save_to_sent_items: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["message"]["body"]["contentType"], "HTML");
        assert_eq!(json["message"]["toRecipients"][0]["emailAddress"]["address"], "a@b.pl");
        assert_eq!(json["saveToSentItems"], true);
    }

    #[test]
    fn test_missing_token_fails_without_request() {
        let sender = GraphMailSender::new(DEFAULT_GRAPH_URL, "", "a@b.pl").unwrap();
        let (ok, message) = sender.send("x@y.pl", "S", "<p>x</p>");
        assert!(!ok);
        assert_eq!(message, "missing Graph access token");
    }
}
