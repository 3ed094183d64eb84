//! Composite assemblers: turn one raw response into the canonical post table
//! plus the `(max_timestamp, cursor)` pair that drives pagination.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::db::PostRecord;

use super::edges::{self, EdgePost};
use super::jsmods::FeedbackPatch;
use super::{domops, format_time, jsmods, ParseError, ParsedPage, Skipped};

/// GraphQL mode: edge list → per-edge normalization → table. Failed edges
/// are dropped from the table but reported in the skip list. The returned
/// cursor is the one on the last successfully normalized row (not
/// necessarily the response's true last edge).
pub fn from_graphql(body: &str) -> Result<ParsedPage, ParseError> {
    let edge_list = edges::parse_edge_list(body)?;

    let mut posts: Vec<EdgePost> = Vec::new();
    let mut skipped: Vec<Skipped> = Vec::new();
    for (index, edge) in edge_list.iter().enumerate() {
        match edges::normalize_edge(edge) {
            Ok(post) => posts.push(post),
            Err(reason) => {
                debug!(index, %reason, "edge dropped");
                skipped.push(Skipped { index, reason });
            }
        }
    }

    let cursor = posts.last().map(|p| p.cursor.clone());
    let rows: Vec<PostRecord> = posts.into_iter().map(edge_row).collect();
    let max_time = max_time(&rows);
    report(&max_time);

    Ok(ParsedPage {
        rows,
        skipped,
        max_time,
        cursor,
    })
}

/// Non-GraphQL mode: scrape the domops HTML, parse the jsmods counters and
/// inner-join the two on `(page_id, post_id)`. The cursor is response-level,
/// taken from the embedded HTML.
pub fn from_domops_jsmods(body: &str) -> Result<ParsedPage, ParseError> {
    let dom = domops::parse(body)?;
    let patches = jsmods::parse(body)?;

    let by_id: HashMap<(&str, &str), &FeedbackPatch> = patches
        .iter()
        .map(|p| ((p.page_id.as_str(), p.post_id.as_str()), p))
        .collect();

    let mut rows = Vec::new();
    for post in &dom.posts {
        match by_id.get(&(post.page_id.as_str(), post.post_id.as_str())) {
            Some(patch) => rows.push(joined_row(post, patch, &dom.cursor)),
            None => debug!(
                page_id = %post.page_id,
                post_id = %post.post_id,
                "no feedback patch for content block, excluded from join"
            ),
        }
    }

    let max_time = max_time(&rows);
    report(&max_time);

    Ok(ParsedPage {
        rows,
        skipped: dom.skipped,
        max_time,
        cursor: Some(dom.cursor),
    })
}

fn edge_row(post: EdgePost) -> PostRecord {
    PostRecord {
        name: post.name,
        page_id: post.page_id,
        post_id: post.post_id,
        time: format_time(post.creation_time),
        message: post.message,
        attachment_title: post.attachment_title,
        attachment_description: post.attachment_description,
        attachment_photos: post.attachment_photos,
        reaction_count: post.reaction_count,
        comment_count: post.comment_count,
        display_comment_count: post.display_comment_count,
        share_count: post.share_count,
        top_reactions: post.top_reactions,
        cursor: post.cursor,
        actor_url: post.actor_url,
        post_url: post.post_url,
    }
}

fn joined_row(post: &domops::DomPost, patch: &FeedbackPatch, cursor: &str) -> PostRecord {
    PostRecord {
        name: post.name.clone(),
        page_id: post.page_id.clone(),
        post_id: post.post_id.clone(),
        time: format_time(post.creation_time),
        message: post.message.clone(),
        attachment_title: post.attachment_title.clone(),
        attachment_description: post.attachment_description.clone(),
        // This wire shape carries no photo gallery.
        attachment_photos: String::new(),
        reaction_count: Some(patch.reaction_count),
        comment_count: Some(patch.comment_count),
        display_comment_count: Some(patch.display_comment_count),
        share_count: Some(patch.share_count),
        top_reactions: patch.top_reactions.clone(),
        cursor: cursor.to_string(),
        actor_url: post.actor_url.clone(),
        post_url: post.post_url.clone(),
    }
}

/// Formatted timestamps sort lexicographically, so a plain max works.
fn max_time(rows: &[PostRecord]) -> Option<String> {
    rows.iter().map(|r| r.time.clone()).max()
}

fn report(max_time: &Option<String>) {
    if let Some(t) = max_time {
        info!(max_date = %t, "batch parsed, keep crawling");
    }
}
