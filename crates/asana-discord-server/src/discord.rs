use anyhow::Context;
use serde::Serialize;

/// Discord component type for an action row.
const COMPONENT_ACTION_ROW: u8 = 1;
/// Discord component type for a button.
const COMPONENT_BUTTON: u8 = 2;
/// Button style that opens `url` instead of sending an interaction.
const BUTTON_STYLE_LINK: u8 = 5;

/// Discord ids are snowflakes: unsigned integers sent as decimal strings.
pub fn is_channel_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

/// Client for the Discord Bot API (v10).
pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CreateMessage<'a> {
    pub content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ActionRow<'a>>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ActionRow<'a> {
    #[serde(rename = "type")]
    pub kind: u8,
    pub components: Vec<LinkButton<'a>>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LinkButton<'a> {
    #[serde(rename = "type")]
    pub kind: u8,
    pub style: u8,
    pub label: &'a str,
    pub url: &'a str,
}

impl<'a> CreateMessage<'a> {
    /// A message with a single link button below the text.
    pub fn with_link_button(content: &'a str, label: &'a str, url: &'a str) -> Self {
        Self {
            content,
            components: vec![ActionRow {
                kind: COMPONENT_ACTION_ROW,
                components: vec![LinkButton {
                    kind: COMPONENT_BUTTON,
                    style: BUTTON_STYLE_LINK,
                    label,
                    url,
                }],
            }],
        }
    }
}

impl DiscordClient {
    pub fn new(http: reqwest::Client, api_base: &str, bot_token: String) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token,
        }
    }

    /// Post a message to a Discord channel. Any non-2xx answer is an error.
    pub async fn create_message(
        &self,
        channel_id: &str,
        message: &CreateMessage<'_>,
    ) -> anyhow::Result<()> {
        anyhow::ensure!(is_channel_id(channel_id), "invalid discord channel id {channel_id:?}");
        let url = format!("{}/channels/{}/messages", self.api_base, channel_id);

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(message)
            .send()
            .await
            .context("discord create_message")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Discord API error {status}: {text}");
        }

        Ok(())
    }
}
