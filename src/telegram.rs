//! Channel history from Telegram's public web preview (`/s/{channel}`).
//!
//! The preview serves about twenty posts per page, oldest first, and pages
//! backwards through `?before={id}`. Forward counts are not published there,
//! so [`ChannelMessage::forwards`] is always `None` from this source.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::models::ChannelMessage;
use crate::source::ChannelSource;

const USER_AGENT: &str = concat!("telegram-warehouse/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the public preview pages
pub struct TelegramPreviewClient {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramPreviewClient {
    /// Create a client for `base_url` (normally `https://t.me`)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn page_url(&self, channel: &str, before: Option<i64>) -> String {
        let channel = channel.trim_start_matches('@');
        match before {
            Some(id) => format!("{}/s/{}?before={}", self.base_url, channel, id),
            None => format!("{}/s/{}", self.base_url, channel),
        }
    }

    async fn get(&self, channel: &str, url: &str) -> Result<reqwest::Response> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::Platform {
                channel: channel.to_string(),
                message: format!("GET {url} returned {status}"),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl ChannelSource for TelegramPreviewClient {
    async fn fetch_page(&self, channel: &str, before: Option<i64>) -> Result<Vec<ChannelMessage>> {
        let url = self.page_url(channel, before);
        debug!(channel, before, url = %url, "Fetching preview page");

        let html = self.get(channel, &url).await?.text().await?;
        let mut page = parse_preview_page(&html).map_err(|message| PipelineError::Platform {
            channel: channel.to_string(),
            message,
        })?;

        // The preview lists oldest first
        page.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(page)
    }

    async fn fetch_media(&self, channel: &str, message: &ChannelMessage) -> Result<Vec<u8>> {
        let Some(url) = message.photo_url.as_deref() else {
            return Err(PipelineError::Platform {
                channel: channel.to_string(),
                message: format!("message {} has no photo", message.id),
            });
        };

        let bytes = self.get(channel, url).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

fn selector(css: &str) -> std::result::Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("bad selector {css}: {e}"))
}

/// Parse the posts out of one preview page, in page order.
pub fn parse_preview_page(html: &str) -> std::result::Result<Vec<ChannelMessage>, String> {
    let document = Html::parse_document(html);
    let message_sel = selector("div.tgme_widget_message[data-post]")?;
    let text_sel = selector("div.tgme_widget_message_text")?;
    let time_sel = selector("a.tgme_widget_message_date time[datetime]")?;
    let views_sel = selector("span.tgme_widget_message_views")?;
    let photo_sel = selector("a.tgme_widget_message_photo_wrap")?;
    let media_sel = selector(
        "a.tgme_widget_message_photo_wrap, .tgme_widget_message_video_player, \
         .tgme_widget_message_document, .tgme_widget_message_voice, .tgme_widget_message_sticker",
    )?;
    let background_url = Regex::new(r#"background-image:\s*url\(['"]?([^'")]+)['"]?\)"#).map_err(|e| e.to_string())?;

    let mut messages = Vec::new();
    for element in document.select(&message_sel) {
        let Some(id) = element
            .value()
            .attr("data-post")
            .and_then(|post| post.rsplit('/').next())
            .and_then(|id| id.parse::<i64>().ok())
        else {
            continue;
        };

        let date = element
            .select(&time_sel)
            .next()
            .and_then(|time| time.value().attr("datetime"))
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok());

        let text = element
            .select(&text_sel)
            .next()
            .map(element_text)
            .filter(|text| !text.is_empty());

        let views = element
            .select(&views_sel)
            .next()
            .and_then(|span| parse_count(&span.text().collect::<String>()));

        // Albums carry several photo wraps; the first one is the message's own photo
        let photo_url = element
            .select(&photo_sel)
            .next()
            .and_then(|wrap| wrap.value().attr("style"))
            .and_then(|style| background_url.captures(style))
            .map(|caps| caps[1].to_string());

        messages.push(ChannelMessage {
            id,
            date,
            text,
            has_media: element.select(&media_sel).next().is_some(),
            photo_url,
            views,
            forwards: None,
        });
    }

    Ok(messages)
}

/// Text content with `<br>` turned into newlines.
fn element_text(element: ElementRef<'_>) -> String {
    let mut text = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(e) if e.name() == "br" => text.push('\n'),
            _ => {}
        }
    }
    text.trim().to_string()
}

/// Parse preview counters such as `532`, `1.2K` or `3M`.
#[must_use]
pub fn parse_count(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (number, multiplier) = match raw.chars().last()? {
        'K' | 'k' => (&raw[..raw.len() - 1], 1_000.0),
        'M' | 'm' => (&raw[..raw.len() - 1], 1_000_000.0),
        _ => (raw, 1.0),
    };
    let value: f64 = number.trim().parse().ok()?;
    #[allow(clippy::cast_possible_truncation)]
    let count = (value * multiplier).round() as i64;
    Some(count)
}
