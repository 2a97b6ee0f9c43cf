//! Discord webhook message payload.
//!
//! Field names follow the Discord execute-webhook JSON body so a
//! [`Message`] serializes directly into a request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_TITLE: usize = 256;
const MAX_DESCRIPTION: usize = 4096;
const MAX_FIELDS: usize = 25;
const MAX_FIELD_NAME: usize = 256;
const MAX_FIELD_VALUE: usize = 1024;
const MAX_FOOTER: usize = 2048;
const MAX_EMBED_TOTAL: usize = 6000;
const MAX_CONTENT: usize = 2000;
const MAX_EMBEDS: usize = 10;
const MAX_BUTTONS_PER_ROW: usize = 5;
const MAX_ROWS: usize = 5;
const MAX_BUTTON_LABEL: usize = 80;

/// Payload rejected before it reaches the network.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("message has neither content nor embeds")]
    Empty,

    #[error("{what} is {len} characters, limit is {limit}")]
    TooLong {
        what: &'static str,
        len: usize,
        limit: usize,
    },

    #[error("{what} has {count} entries, limit is {limit}")]
    TooMany {
        what: &'static str,
        count: usize,
        limit: usize,
    },

    #[error("field {0} has an empty name or value")]
    EmptyField(usize),

    #[error("color {0:#x} is not a 24-bit RGB value")]
    InvalidColor(u32),

    #[error("button URL must be http(s): {0}")]
    InvalidButtonUrl(String),
}

/// Message body for create and edit calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default)]
    pub embeds: Vec<Embed>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ActionRow>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_mentions: Option<AllowedMentions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub color: u32,

    #[serde(default)]
    pub fields: Vec<Field>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<Footer>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Media>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Media>,

    /// Shown by Discord next to the footer text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline: false,
        }
    }

    pub fn inline(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            inline: true,
            ..Self::new(name, value)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footer {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub url: String,
}

/// Row of link buttons (component type 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    pub kind: u8,
    pub components: Vec<LinkButton>,
}

impl ActionRow {
    pub fn new(buttons: Vec<LinkButton>) -> Self {
        Self {
            kind: 1,
            components: buttons,
        }
    }
}

/// Button that opens a URL (component type 2, style 5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkButton {
    #[serde(rename = "type")]
    pub kind: u8,
    pub style: u8,
    pub label: String,
    pub url: String,
}

impl LinkButton {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: 2,
            style: 5,
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Restricts which mentions in `content` actually ping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedMentions {
    #[serde(default)]
    pub parse: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

impl AllowedMentions {
    /// Allow pinging exactly these roles.
    pub fn roles(roles: Vec<String>) -> Self {
        Self {
            parse: Vec::new(),
            roles,
        }
    }
}

fn check_len(what: &'static str, text: &str, limit: usize) -> Result<usize, MessageError> {
    let len = text.chars().count();
    if len > limit {
        return Err(MessageError::TooLong { what, len, limit });
    }
    Ok(len)
}

fn check_count(what: &'static str, count: usize, limit: usize) -> Result<(), MessageError> {
    if count > limit {
        return Err(MessageError::TooMany { what, count, limit });
    }
    Ok(())
}

impl Embed {
    fn validate(&self) -> Result<(), MessageError> {
        let mut total = check_len("title", &self.title, MAX_TITLE)?;
        if let Some(description) = &self.description {
            total += check_len("description", description, MAX_DESCRIPTION)?;
        }
        if self.color > 0xFF_FF_FF {
            return Err(MessageError::InvalidColor(self.color));
        }

        check_count("fields", self.fields.len(), MAX_FIELDS)?;
        for (i, field) in self.fields.iter().enumerate() {
            if field.name.trim().is_empty() || field.value.trim().is_empty() {
                return Err(MessageError::EmptyField(i));
            }
            total += check_len("field name", &field.name, MAX_FIELD_NAME)?;
            total += check_len("field value", &field.value, MAX_FIELD_VALUE)?;
        }

        if let Some(footer) = &self.footer {
            total += check_len("footer", &footer.text, MAX_FOOTER)?;
        }
        if total > MAX_EMBED_TOTAL {
            return Err(MessageError::TooLong {
                what: "embed",
                len: total,
                limit: MAX_EMBED_TOTAL,
            });
        }
        Ok(())
    }
}

impl Message {
    /// Check Discord's payload limits.
    pub fn validate(&self) -> Result<(), MessageError> {
        let has_content = self.content.as_deref().is_some_and(|c| !c.trim().is_empty());
        if !has_content && self.embeds.is_empty() {
            return Err(MessageError::Empty);
        }
        if let Some(content) = &self.content {
            check_len("content", content, MAX_CONTENT)?;
        }

        check_count("embeds", self.embeds.len(), MAX_EMBEDS)?;
        for embed in &self.embeds {
            embed.validate()?;
        }

        check_count("action rows", self.components.len(), MAX_ROWS)?;
        for row in &self.components {
            check_count("buttons", row.components.len(), MAX_BUTTONS_PER_ROW)?;
            for button in &row.components {
                check_len("button label", &button.label, MAX_BUTTON_LABEL)?;
                if !(button.url.starts_with("https://") || button.url.starts_with("http://")) {
                    return Err(MessageError::InvalidButtonUrl(button.url.clone()));
                }
            }
        }
        Ok(())
    }

    /// The message with run timestamps removed; equal fingerprints mean
    /// there is nothing new to show.
    pub fn fingerprint(&self) -> Message {
        let mut copy = self.clone();
        for embed in &mut copy.embeds {
            embed.timestamp = None;
        }
        copy
    }

    /// Structural comparison ignoring when each message was rendered.
    pub fn same_content(&self, other: &Message) -> bool {
        self.fingerprint() == other.fingerprint()
    }
}
