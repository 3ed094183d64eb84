//! Thin fetch layer. Bootstraps request parameters from the page's homepage
//! and fetches feed pages, threading the cursor from one response into the
//! next request. All interpretation of response bodies lives in `parser`.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde_json::json;
use tracing::info;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0";
const GRAPHQL_URL: &str = "https://www.facebook.com/api/graphql/";
const NOJS_FEED_URL: &str = "https://www.facebook.com/pages_reaction_units/more/";
const POSTS_PER_PAGE: u32 = 8;

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""pageID":"(\d+)"|"identifier":"?(\d+)"?|"userID":"(\d+)""#).unwrap());
static DOC_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""docID":"(\d+)""#).unwrap());

const PAGINATION_QUERY_MARKER: &str = "CometModernPageFeedPaginationQuery";

/// Which feed endpoint the page serves, decided at bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    Graphql,
    NoJs,
}

pub struct Session {
    client: reqwest::Client,
    pub mode: FeedMode,
    identifier: String,
    doc_id: Option<String>,
}

impl Session {
    /// Fetch the page's homepage and derive the opaque request parameters
    /// (`identifier`, `doc_id`, feed mode) from it.
    pub async fn bootstrap(page_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()?;

        info!(url = %page_url, "fetching homepage");
        let html = client
            .get(page_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
            .context("failed to fetch homepage")?;

        let identifier = parse_identifier(&html)
            .with_context(|| format!("no page identifier found at {page_url}"))?;
        let doc_id = parse_doc_id(&html);
        let mode = if doc_id.is_some() {
            FeedMode::Graphql
        } else {
            FeedMode::NoJs
        };
        info!(identifier, ?mode, "bootstrapped session");

        Ok(Self {
            client,
            mode,
            identifier,
            doc_id,
        })
    }

    /// Fetch one feed page; `cursor` is the previous page's output, `None`
    /// for the first page. Returns the raw body for the parser.
    pub async fn fetch_feed(&self, cursor: Option<&str>) -> Result<String> {
        match self.mode {
            FeedMode::Graphql => self.fetch_graphql(cursor).await,
            FeedMode::NoJs => self.fetch_nojs(cursor).await,
        }
    }

    async fn fetch_graphql(&self, cursor: Option<&str>) -> Result<String> {
        let Some(doc_id) = &self.doc_id else {
            bail!("graphql mode without a doc_id");
        };
        let variables = json!({
            "id": self.identifier,
            "count": 3,
            "cursor": cursor,
        })
        .to_string();
        let body = self
            .client
            .post(GRAPHQL_URL)
            .form(&[("doc_id", doc_id.as_str()), ("variables", variables.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }

    async fn fetch_nojs(&self, cursor: Option<&str>) -> Result<String> {
        let cursor_param = json!({ "timeline_cursor": cursor.unwrap_or_default() }).to_string();
        let unit_count = POSTS_PER_PAGE.to_string();
        let body = self
            .client
            .get(NOJS_FEED_URL)
            .query(&[
                ("page_id", self.identifier.as_str()),
                ("cursor", cursor_param.as_str()),
                ("surface", "www_pages_home"),
                ("unit_count", unit_count.as_str()),
                ("__a", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

/// Page identifier from homepage markup, trying the known key spellings.
fn parse_identifier(html: &str) -> Option<String> {
    IDENTIFIER_RE.captures(html).and_then(|caps| {
        caps.iter()
            .skip(1)
            .flatten()
            .next()
            .map(|m| m.as_str().to_string())
    })
}

/// GraphQL query id for timeline pagination. Preferred: the docID nearest the
/// pagination query marker; fallback: the first docID anywhere.
fn parse_doc_id(html: &str) -> Option<String> {
    if let Some(pos) = html.find(PAGINATION_QUERY_MARKER) {
        if let Some(caps) = DOC_ID_RE.captures(&html[pos..]) {
            return Some(caps[1].to_string());
        }
    }
    DOC_ID_RE.captures(html).map(|caps| caps[1].to_string())
}
