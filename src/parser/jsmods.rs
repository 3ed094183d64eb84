//! Non-GraphQL feed mode, part two: the "jsmods" envelope carries engagement
//! counters keyed by the same `(post_id, page_id)` pair as the domops HTML.
//! Two independent lists are scanned; entries that don't match the expected
//! shape are silently skipped.

use serde_json::Value;

use super::value;
use super::{strip_preamble, ParseError};

const STANDARD_FEEDBACK: &str = "/3/1/__bbox/result/data/feedback";
const VIDEO_FEEDBACK: &str = "/3/2/feedbacktarget";

/// Counts for one post, to be inner-joined against the domops records.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackPatch {
    pub post_id: String,
    pub page_id: String,
    pub comment_count: i64,
    pub reaction_count: i64,
    pub share_count: i64,
    pub top_reactions: Vec<Value>,
    pub display_comment_count: i64,
}

pub fn parse(body: &str) -> Result<Vec<FeedbackPatch>, ParseError> {
    let doc: Value = serde_json::from_str(strip_preamble(body))?;
    let jsmods = doc
        .get("jsmods")
        .ok_or(ParseError::MissingSection("jsmods"))?;

    let mut patches = Vec::new();
    for entry in list(jsmods, "/pre_display_requires") {
        if let Some(patch) = standard_patch(entry) {
            patches.push(patch);
        }
    }
    for entry in list(jsmods, "/require") {
        if let Some(patch) = video_patch(entry) {
            patches.push(patch);
        }
    }
    Ok(patches)
}

fn list<'a>(jsmods: &'a Value, pointer: &str) -> &'a [Value] {
    jsmods
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Standard post: nested feedback structure at a fixed offset.
fn standard_patch(entry: &Value) -> Option<FeedbackPatch> {
    let fb = entry.pointer(STANDARD_FEEDBACK)?;
    Some(FeedbackPatch {
        post_id: value::id_string(fb.get("subscription_target_id")?)?,
        page_id: value::id_string(fb.pointer("/owning_profile/id")?)?,
        comment_count: fb.pointer("/comment_count/total_count")?.as_i64()?,
        reaction_count: fb.pointer("/reaction_count/count")?.as_i64()?,
        share_count: fb.pointer("/share_count/count")?.as_i64()?,
        top_reactions: fb.pointer("/top_reactions/edges")?.as_array()?.clone(),
        display_comment_count: fb.pointer("/display_comments_count/count")?.as_i64()?,
    })
}

/// Video post: flat keys on the feedback target, no top-reactions data, and
/// the comment count doubles as the display count.
fn video_patch(entry: &Value) -> Option<FeedbackPatch> {
    let target = entry.pointer(VIDEO_FEEDBACK)?;
    let comment_count = target.get("commentcount")?.as_i64()?;
    Some(FeedbackPatch {
        post_id: value::id_string(target.get("entidentifier")?)?,
        page_id: value::id_string(target.get("actorid")?)?,
        comment_count,
        reaction_count: target.get("likecount")?.as_i64()?,
        share_count: target.get("sharecount")?.as_i64()?,
        top_reactions: Vec::new(),
        display_comment_count: comment_count,
    })
}
