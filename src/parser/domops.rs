//! Non-GraphQL feed mode, part one: the "domops" envelope carries one
//! embedded HTML string. We strip the hijack preamble, locate the HTML at its
//! fixed array position, scrape one partial post record per content block and
//! fish the response-level cursor out of a URL-encoded attribute blob.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use super::{strip_preamble, ParseError, SkipReason, Skipped};

const EMBEDDED_HTML: &str = "/domops/0/3/__html";

/// The cursor is escaped JSON inside an HTML attribute, so this is string
/// scraping by contract, not structured traversal. Kept behind this one
/// regex so a format change touches nothing else.
static CURSOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"timeline_cursor%22%3A%22(.*?)%22%2C%22timeline_section_cursor").unwrap()
});

static CONTENT_BLOCK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.userContentWrapper").unwrap());
static IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());
static SUBTITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[data-testid="story-subtitle"]"#).unwrap());
static ABBR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("abbr[data-utime]").unwrap());
static MESSAGE_DIV: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[data-testid="post_message"]"#).unwrap());
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static SPAN: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span").unwrap());
static NESTED_SPAN: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span > span").unwrap());
static HOVER_ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[data-lynx-mode="hover"]"#).unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

/// Partial post record scraped from one content block; engagement counters
/// arrive separately via the jsmods payload.
#[derive(Debug, Clone)]
pub struct DomPost {
    pub name: String,
    pub page_id: String,
    pub post_id: String,
    pub creation_time: i64,
    pub message: String,
    pub attachment_title: String,
    pub attachment_description: String,
    pub actor_url: String,
    pub post_url: String,
}

pub struct DomOps {
    pub posts: Vec<DomPost>,
    pub skipped: Vec<Skipped>,
    /// Response-level cursor, shared by every post in the page.
    pub cursor: String,
}

pub fn parse(body: &str) -> Result<DomOps, ParseError> {
    let doc: Value = serde_json::from_str(strip_preamble(body))?;
    let html = doc
        .pointer(EMBEDDED_HTML)
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingHtml)?;
    let cursor = extract_cursor(html)?;

    let fragment = Html::parse_fragment(html);
    let mut posts = Vec::new();
    let mut skipped = Vec::new();
    for (index, block) in fragment.select(&CONTENT_BLOCK).enumerate() {
        match parse_block(block) {
            Ok(post) => posts.push(post),
            Err(reason) => skipped.push(Skipped { index, reason }),
        }
    }

    Ok(DomOps {
        posts,
        skipped,
        cursor,
    })
}

/// Contract: raw embedded HTML in, cursor string or failure out.
pub fn extract_cursor(html: &str) -> Result<String, ParseError> {
    CURSOR_RE
        .captures(html)
        .map(|c| c[1].to_string())
        .ok_or(ParseError::CursorNotFound)
}

fn parse_block(block: ElementRef<'_>) -> Result<DomPost, SkipReason> {
    let name = block
        .select(&IMG)
        .next()
        .and_then(|img| img.value().attr("aria-label"))
        .ok_or(SkipReason::MissingField("name"))?
        .to_string();

    let data_id = block
        .select(&SUBTITLE)
        .next()
        .and_then(|d| d.value().attr("id"))
        .ok_or(SkipReason::MissingField("data_id"))?;
    let (page_id, post_id) =
        split_data_id(data_id).ok_or(SkipReason::MissingField("data_id"))?;

    let creation_time = block
        .select(&ABBR)
        .next()
        .and_then(|a| a.value().attr("data-utime"))
        .ok_or(SkipReason::MissingField("creation_time"))?
        .trim()
        .parse::<i64>()
        .map_err(|_| SkipReason::BadTimestamp("creation_time"))?;

    let message = block
        .select(&MESSAGE_DIV)
        .next()
        .map(message_text)
        .unwrap_or_default();

    // Title and description default independently: a hover anchor without an
    // aria-label still contributes its text as the description.
    let hover = block.select(&HOVER_ANCHOR).next();
    let attachment_title = hover
        .and_then(|a| a.value().attr("aria-label"))
        .unwrap_or_default()
        .to_string();
    let attachment_description = hover
        .map(|a| a.text().collect::<String>())
        .unwrap_or_default();

    let actor_url = block
        .select(&ANCHOR)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.split('?').next().unwrap_or(href).to_string())
        .ok_or(SkipReason::MissingField("actor_url"))?;

    let post_url = format!("https://www.facebook.com/{post_id}");

    Ok(DomPost {
        name,
        page_id,
        post_id,
        creation_time,
        message,
        attachment_title,
        attachment_description,
        actor_url,
        post_url,
    })
}

/// Message text. Paragraph-structured content concatenates every `<p>` in
/// document order; span-structured content (nested spans) takes the first
/// span's text; anything else is empty.
fn message_text(div: ElementRef<'_>) -> String {
    let paragraphs: Vec<_> = div.select(&PARAGRAPH).collect();
    if !paragraphs.is_empty() {
        return paragraphs
            .iter()
            .map(|p| p.text().collect::<String>())
            .collect();
    }
    if div.select(&NESTED_SPAN).count() >= 2 {
        return div
            .select(&SPAN)
            .next()
            .map(|s| s.text().collect())
            .unwrap_or_default();
    }
    String::new()
}

/// Composite subtitle id: `feed_subtitle_<page_id>;<post_id>;…`.
fn split_data_id(id: &str) -> Option<(String, String)> {
    let rest = id.strip_prefix("feed_subtitle_")?;
    let mut parts = rest.split(';');
    let page_id = parts.next().filter(|s| !s.is_empty())?;
    let post_id = parts.next().filter(|s| !s.is_empty())?;
    Some((page_id.to_string(), post_id.to_string()))
}
