//! Discord webhook notifier
//!
//! Sends plain messages, embeds, and result pages (embed + HTML attachment)
//! to a Discord channel via webhook. Delivery is best-effort: one attempt,
//! failures are logged and returned to the caller.

use crate::config::NotifierConfig;
use crate::monitor::fetcher::ResultMetadata;
use crate::monitor::registration::RegistrationNumber;
use crate::utils::AppError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Discord rejects message content longer than this
pub const MAX_CONTENT_CHARS: usize = 2000;

/// Discord webhook message payload
#[derive(Debug, Serialize)]
pub struct DiscordMessage {
    /// Message content (plain text)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Rich embeds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeds: Option<Vec<DiscordEmbed>>,
}

/// Discord embed for rich messages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscordEmbed {
    pub title: String,
    pub description: String,
    /// Color (as decimal integer)
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<DiscordEmbedField>>,
    /// Timestamp (ISO 8601)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<DiscordFooter>,
}

/// Discord embed field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscordEmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

/// Discord embed footer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscordFooter {
    pub text: String,
}

/// Discord color constants (decimal)
pub mod colors {
    /// Error - red
    pub const ERROR: u32 = 15158332; // #E74C3C
    /// Warning - orange
    pub const WARNING: u32 = 16750848; // #FF9900
    /// Info - blue
    pub const INFO: u32 = 39423; // #0099FF
    /// Success - green
    pub const SUCCESS: u32 = 3066993; // #2ECC71
}

impl DiscordEmbed {
    pub fn new(title: impl Into<String>, description: impl Into<String>, color: u32) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            color,
            fields: None,
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
            footer: None,
        }
    }

    /// Append a field
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.get_or_insert_with(Vec::new).push(DiscordEmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }
}

/// Outbound notification channel
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a plain text message
    async fn send_text(&self, content: &str) -> Result<(), AppError>;

    /// Send a single embed
    async fn send_embed(&self, embed: DiscordEmbed) -> Result<(), AppError>;

    /// Send a published result: summary embed plus the page as attachment
    async fn send_result(&self, body: &[u8], metadata: &ResultMetadata) -> Result<(), AppError>;
}

/// [`Notifier`] posting to a Discord webhook
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    webhook_url: String,
    client: Client,
    config: NotifierConfig,
}

impl DiscordNotifier {
    pub fn new(webhook_url: impl Into<String>, config: NotifierConfig) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            client: Client::new(),
            config,
        }
    }

    /// Create a disabled notifier (for dry runs and testing)
    pub fn disabled() -> Self {
        Self::new(String::new(), NotifierConfig::default())
    }

    pub fn is_enabled(&self) -> bool {
        !self.webhook_url.is_empty()
    }

    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    fn message(&self, content: Option<String>, embeds: Option<Vec<DiscordEmbed>>) -> DiscordMessage {
        let embeds = embeds.map(|embeds| {
            embeds
                .into_iter()
                .map(|mut embed| {
                    embed.footer.get_or_insert_with(|| DiscordFooter {
                        text: self.config.username.clone(),
                    });
                    embed
                })
                .collect()
        });
        DiscordMessage {
            content: content.map(|c| truncate_content(&c)),
            username: Some(self.config.username.clone()),
            avatar_url: self.config.avatar_url.clone(),
            embeds,
        }
    }

    async fn send_payload(&self, payload: &DiscordMessage) -> Result<(), AppError> {
        let request = self.client.post(&self.webhook_url).json(payload);
        self.dispatch(request).await
    }

    async fn send_multipart(
        &self,
        payload: &DiscordMessage,
        file_name: String,
        file: Vec<u8>,
    ) -> Result<(), AppError> {
        let payload_json = serde_json::to_string(payload)
            .map_err(|e| AppError::Internal(format!("failed to encode webhook payload: {}", e)))?;
        let part = Part::bytes(file)
            .file_name(file_name)
            .mime_str("text/html")
            .map_err(|e| AppError::Internal(format!("invalid attachment mime type: {}", e)))?;
        let form = Form::new()
            .text("payload_json", payload_json)
            .part("files[0]", part);

        let request = self.client.post(&self.webhook_url).multipart(form);
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: reqwest::RequestBuilder) -> Result<(), AppError> {
        let response = request.send().await.map_err(|e| {
            error!(error = %e, "Failed to send Discord webhook");
            AppError::Webhook(format!("Failed to send Discord webhook: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Discord webhook returned error");
            return Err(AppError::Webhook(format!(
                "Discord webhook error: {} - {}",
                status, body
            )));
        }

        debug!("Discord webhook accepted message");
        self.pause().await;
        Ok(())
    }

    async fn pause(&self) {
        if self.config.message_delay > Duration::ZERO {
            tokio::time::sleep(self.config.message_delay).await;
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send_text(&self, content: &str) -> Result<(), AppError> {
        if !self.is_enabled() {
            debug!("Discord notifier disabled, skipping");
            return Ok(());
        }
        let payload = self.message(Some(content.to_string()), None);
        self.send_payload(&payload).await
    }

    async fn send_embed(&self, embed: DiscordEmbed) -> Result<(), AppError> {
        if !self.is_enabled() {
            debug!("Discord notifier disabled, skipping");
            return Ok(());
        }
        let payload = self.message(None, Some(vec![embed]));
        self.send_payload(&payload).await
    }

    #[instrument(skip(self, body, metadata), fields(reg_no = %metadata.reg_no, size = body.len()))]
    async fn send_result(&self, body: &[u8], metadata: &ResultMetadata) -> Result<(), AppError> {
        if !self.is_enabled() {
            debug!("Discord notifier disabled, skipping");
            return Ok(());
        }

        let attach = body.len() <= self.config.max_attachment_bytes;
        let embed = result_embed(metadata, attach, self.config.max_attachment_bytes);
        let content = format!("📄 **Result for {}**", metadata.reg_no);
        let payload = self.message(Some(content), Some(vec![embed]));

        let result = if attach {
            self.send_multipart(&payload, attachment_name(&metadata.reg_no), body.to_vec())
                .await
        } else {
            info!(
                size = body.len(),
                limit = self.config.max_attachment_bytes,
                "Result page exceeds attachment limit, sending embed only"
            );
            self.send_payload(&payload).await
        };

        if result.is_ok() {
            info!(reg_no = %metadata.reg_no, "Result notification sent");
        }
        result
    }
}

/// Attachment file name for a result page
pub fn attachment_name(reg_no: &RegistrationNumber) -> String {
    format!("{}_result.html", reg_no)
}

/// Summary embed for a published result
pub fn result_embed(metadata: &ResultMetadata, attached: bool, limit: usize) -> DiscordEmbed {
    let attachment = if attached {
        attachment_name(&metadata.reg_no)
    } else {
        format!("omitted: {} bytes exceeds {} byte limit", metadata.size, limit)
    };

    let mut embed = DiscordEmbed::new(
        "🎯 Result Found!",
        format!(
            "Result published for registration number: **{}**",
            metadata.reg_no
        ),
        colors::SUCCESS,
    )
    .field("Registration Number", metadata.reg_no.as_str(), true)
    .field("Status", "✅ Available", true)
    .field(
        "Fetched At",
        metadata.fetched_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        true,
    )
    .field("Attachment", attachment, false)
    .field("Source", metadata.url.clone(), false);

    if let Some(title) = &metadata.title {
        embed = embed.field("Page Title", title.clone(), false);
    }
    embed.timestamp = Some(metadata.fetched_at.to_rfc3339());
    embed
}

/// Truncate to Discord's content limit on a char boundary
pub fn truncate_content(content: &str) -> String {
    if content.chars().count() <= MAX_CONTENT_CHARS {
        return content.to_string();
    }
    let mut truncated: String = content.chars().take(MAX_CONTENT_CHARS - 1).collect();
    truncated.push('…');
    truncated
}
