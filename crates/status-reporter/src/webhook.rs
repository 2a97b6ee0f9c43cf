//! Discord webhook transport over HTTPS.

use crate::message::Message;
use crate::notifier::{WebhookError, WebhookTransport};
use crate::types::MessageId;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "status-reporter/0.1";

#[derive(Debug, Deserialize)]
struct CreatedMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

/// Webhook identified by its execute URL
#[derive(Debug, Clone)]
pub struct DiscordWebhook {
    url: Url,
    client: Client,
}

impl DiscordWebhook {
    pub fn new(url: Url, request_timeout: Duration) -> Result<Self, WebhookError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WebhookError::Transport(e.to_string()))?;
        Ok(Self { url, client })
    }

    fn create_url(&self) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("wait", "true");
        url
    }

    fn message_url(&self, id: &MessageId) -> Result<Url, WebhookError> {
        let mut url = self.url.clone();
        url.path_segments_mut()
            .map_err(|_| WebhookError::Transport(format!("cannot extend webhook URL {}", self.url)))?
            .pop_if_empty()
            .push("messages")
            .push(id.as_str());
        Ok(url)
    }
}

fn transport(e: reqwest::Error) -> WebhookError {
    WebhookError::Transport(e.to_string())
}

fn retry_after(headers: &reqwest::header::HeaderMap, body: &str) -> Duration {
    let from_body = serde_json::from_str::<RateLimitBody>(body)
        .ok()
        .map(|b| b.retry_after);
    let from_header = || {
        headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok())
    };
    from_body
        .or_else(from_header)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or(Duration::ZERO)
}

/// Map non-success statuses onto [`WebhookError`].
async fn check(response: Response) -> Result<Response, WebhookError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(WebhookError::NotFound);
    }

    let headers = response.headers().clone();
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(WebhookError::RateLimited {
            retry_after: retry_after(&headers, &body),
        });
    }
    Err(WebhookError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl WebhookTransport for DiscordWebhook {
    async fn create(&self, message: &Message) -> Result<MessageId, WebhookError> {
        let response = self
            .client
            .post(self.create_url())
            .json(message)
            .send()
            .await
            .map_err(transport)?;
        let response = check(response).await?;
        let created: CreatedMessage = response
            .json()
            .await
            .map_err(|e| WebhookError::Decode(e.to_string()))?;
        debug!(id = %created.id, "Webhook message created");
        Ok(MessageId::new(created.id))
    }

    async fn edit(&self, id: &MessageId, message: &Message) -> Result<(), WebhookError> {
        // The display name is fixed at creation. PATCH keeps any field it
        // is not sent, so an absent content must be cleared explicitly.
        let body = Message {
            username: None,
            content: Some(message.content.clone().unwrap_or_default()),
            ..message.clone()
        };
        let response = self
            .client
            .patch(self.message_url(id)?)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        check(response).await?;
        debug!(id = %id, "Webhook message edited");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn webhook() -> DiscordWebhook {
        let url = Url::parse("https://discord.com/api/webhooks/123/token").unwrap();
        DiscordWebhook::new(url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_create_url_waits() {
        assert_eq!(
            webhook().create_url().as_str(),
            "https://discord.com/api/webhooks/123/token?wait=true"
        );
    }

    #[test]
    fn test_message_url() {
        let url = webhook().message_url(&MessageId::new("456")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://discord.com/api/webhooks/123/token/messages/456"
        );
    }

    #[test]
    fn test_retry_after_prefers_body() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "7".parse().unwrap());

        assert_eq!(
            retry_after(&headers, r#"{"message":"slow down","retry_after":1.5}"#),
            Duration::from_millis(1500)
        );
        assert_eq!(retry_after(&headers, "not json"), Duration::from_secs(7));
        assert_eq!(
            retry_after(&reqwest::header::HeaderMap::new(), ""),
            Duration::ZERO
        );
    }
}
