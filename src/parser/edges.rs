//! GraphQL feed mode: locate the edge list across the known top-level shapes,
//! then normalize each edge into a post record via fixed `comet_sections`
//! paths with documented fallbacks.

use serde_json::Value;
use tracing::debug;

use super::value;
use super::{ParseError, SkipReason};

// ── Top-level edge-list shapes ──
const FEED_EDGES: &str = "/data/node/timeline_feed_units/edges";
const LINE_UNIT_EDGE: &str = "/data/node/timeline_list_feed_units/edges/0";
const LINE_DATA: &str = "/data";

// ── Per-edge fallback table (all pointers relative to the edge object) ──
const ACTOR: &[&str] =
    &["/node/comet_sections/context_layout/story/comet_sections/actor_photo/story/actors/0"];
const CREATION_TIME: &[&str] =
    &["/node/comet_sections/context_layout/story/comet_sections/metadata/0/story/creation_time"];
const MESSAGE: &[&str] = &[
    "/node/comet_sections/content/story/comet_sections/message/story/message/text",
    "/node/comet_sections/content/story/comet_sections/message_container/story/message/text",
];
const FEEDBACK: &[&str] = &[
    "/node/comet_sections/feedback/story/feedback_context/feedback_target_with_context/ufi_renderer/feedback",
];
const FOOTER_ATTACHMENT: &[&str] =
    &["/node/comet_sections/content/story/attachments/0/comet_footer_renderer/attachment"];
const STYLES_ATTACHMENT: &[&str] =
    &["/node/comet_sections/content/story/attachments/0/styles/attachment"];
const POST_URL: &[&str] = &["/node/comet_sections/content/story/wwwURL"];
const CURSOR: &[&str] = &["/cursor"];

// Relative to the feedback target.
const REACTION_COUNT: &[&str] =
    &["/comet_ufi_summary_and_actions_renderer/feedback/reaction_count/count"];
const SHARE_COUNT: &[&str] =
    &["/comet_ufi_summary_and_actions_renderer/feedback/share_count/count"];

/// One normalized edge, timestamp still in epoch seconds.
#[derive(Debug, Clone)]
pub struct EdgePost {
    pub name: String,
    pub page_id: String,
    pub post_id: String,
    pub creation_time: i64,
    pub message: String,
    pub reaction_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub display_comment_count: Option<i64>,
    pub share_count: Option<i64>,
    pub top_reactions: Vec<Value>,
    pub attachment_title: String,
    pub attachment_description: String,
    pub attachment_photos: String,
    pub cursor: String,
    pub actor_url: String,
    pub post_url: String,
}

/// Locate the edge list. Shape (a) is a single document with the feed units
/// at a fixed path; failing that, the body is a `\r\n`-delimited stream of
/// documents each carrying one unit in shape (b) or (c). No edge is dropped
/// here even if it later fails normalization.
pub fn parse_edge_list(body: &str) -> Result<Vec<Value>, ParseError> {
    if let Ok(doc) = serde_json::from_str::<Value>(body) {
        if let Some(edges) = doc.pointer(FEED_EDGES).and_then(Value::as_array) {
            return Ok(edges.clone());
        }
    }

    let mut edges = Vec::new();
    let mut parsed_any = false;
    for (i, line) in body
        .split("\r\n")
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .enumerate()
    {
        let Ok(doc) = serde_json::from_str::<Value>(line) else {
            debug!(line = i, "feed line is not valid JSON, skipping");
            continue;
        };
        parsed_any = true;
        if let Some(edge) = doc.pointer(LINE_UNIT_EDGE) {
            edges.push(edge.clone());
        } else if let Some(data) = doc.pointer(LINE_DATA) {
            edges.push(data.clone());
        } else {
            debug!(line = i, "feed line matches no known unit shape, skipping");
        }
    }

    if !parsed_any {
        return Err(ParseError::UnrecognizedBody);
    }
    Ok(edges)
}

/// Normalize one edge. Any missing required field drops the whole record with
/// a reason; optional fields default to empty.
pub fn normalize_edge(edge: &Value) -> Result<EdgePost, SkipReason> {
    let actor = value::required(edge, "actor", ACTOR)?;
    let name = value::required_text(actor, "name", &["/name"])?;
    let page_id = value::required_id(actor, "page_id", &["/id"])?;
    let actor_url = value::required_text(actor, "actor_url", &["/url"])?;

    let creation_time = value::required_epoch(edge, "creation_time", CREATION_TIME)?;
    let message = value::text(edge, MESSAGE).unwrap_or_default();

    // The post id lives in the feedback target, not in the edge's own id.
    let feedback = value::required(edge, "feedback", FEEDBACK)?;
    let post_id = value::required_id(feedback, "post_id", &["/subscription_target_id"])?;
    let comment_count = value::count(feedback, &["/comment_count/total_count"]);
    let display_comment_count = value::count(feedback, &["/toplevel_comment_count/count"]);
    let reaction_count = value::count(feedback, REACTION_COUNT);
    let share_count = value::count(feedback, SHARE_COUNT);
    let top_reactions = feedback
        .pointer("/comet_ufi_summary_and_actions_renderer/feedback/cannot_see_top_custom_reactions/top_reactions/edges")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let (attachment_title, attachment_description) = footer_attachment(edge);
    let attachment_photos = attachment_photos(edge);

    let cursor = value::required_text(edge, "cursor", CURSOR)?;
    let post_url = value::required_text(edge, "post_url", POST_URL)?;

    Ok(EdgePost {
        name,
        page_id,
        post_id,
        creation_time,
        message,
        reaction_count,
        comment_count,
        display_comment_count,
        share_count,
        top_reactions,
        attachment_title,
        attachment_description,
        attachment_photos,
        cursor,
        actor_url,
        post_url,
    })
}

/// Link-attachment title/description pair. All-or-nothing: if either leg is
/// missing both come back empty.
fn footer_attachment(edge: &Value) -> (String, String) {
    let Some(att) = value::first(edge, FOOTER_ATTACHMENT) else {
        return (String::new(), String::new());
    };
    match (
        value::text(att, &["/title_with_entities/text"]),
        value::text(att, &["/description/text"]),
    ) {
        (Some(title), Some(description)) => (title, description),
        _ => (String::new(), String::new()),
    }
}

/// Photo URIs: multi-image gallery joined with ", ", falling back to the
/// single-image path, else empty. A gallery with any node missing its uri is
/// abandoned in favor of the fallback.
fn attachment_photos(edge: &Value) -> String {
    let Some(att) = value::first(edge, STYLES_ATTACHMENT) else {
        return String::new();
    };
    if let Some(nodes) = att
        .pointer("/all_subattachments/nodes")
        .and_then(Value::as_array)
    {
        let uris: Option<Vec<&str>> = nodes
            .iter()
            .map(|n| n.pointer("/media/viewer_image/uri").and_then(Value::as_str))
            .collect();
        if let Some(uris) = uris {
            return uris.join(", ");
        }
    }
    value::text(att, &["/media/photo_image/uri"]).unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Fully populated edge covering every extraction path.
    pub(crate) fn sample_edge(post_id: &str, cursor: &str) -> Value {
        json!({
            "cursor": cursor,
            "node": {
                "comet_sections": {
                    "context_layout": {
                        "story": {
                            "comet_sections": {
                                "actor_photo": {
                                    "story": {
                                        "actors": [{
                                            "name": "Example Page",
                                            "id": "100",
                                            "url": "https://www.facebook.com/example"
                                        }]
                                    }
                                },
                                "metadata": [{
                                    "story": { "creation_time": 1_600_000_000 }
                                }]
                            }
                        }
                    },
                    "content": {
                        "story": {
                            "wwwURL": format!("https://www.facebook.com/example/posts/{post_id}"),
                            "comet_sections": {
                                "message": {
                                    "story": { "message": { "text": "hello world" } }
                                }
                            },
                            "attachments": [{
                                "comet_footer_renderer": {
                                    "attachment": {
                                        "title_with_entities": { "text": "Link title" },
                                        "description": { "text": "Link description" }
                                    }
                                },
                                "styles": {
                                    "attachment": {
                                        "all_subattachments": {
                                            "nodes": [
                                                { "media": { "viewer_image": { "uri": "https://img/1.jpg" } } },
                                                { "media": { "viewer_image": { "uri": "https://img/2.jpg" } } }
                                            ]
                                        }
                                    }
                                }
                            }]
                        }
                    },
                    "feedback": {
                        "story": {
                            "feedback_context": {
                                "feedback_target_with_context": {
                                    "ufi_renderer": {
                                        "feedback": {
                                            "subscription_target_id": post_id,
                                            "comment_count": { "total_count": 7 },
                                            "toplevel_comment_count": { "count": 5 },
                                            "comet_ufi_summary_and_actions_renderer": {
                                                "feedback": {
                                                    "reaction_count": { "count": 42 },
                                                    "share_count": { "count": 3 },
                                                    "cannot_see_top_custom_reactions": {
                                                        "top_reactions": {
                                                            "edges": [{ "node": { "localized_name": "Like" } }]
                                                        }
                                                    }
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn shape_a_single_document() {
        let body = json!({
            "data": { "node": { "timeline_feed_units": {
                "edges": [sample_edge("200", "c1"), sample_edge("201", "c2")]
            }}}
        })
        .to_string();
        let edges = parse_edge_list(&body).unwrap();
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn line_fallback_shapes_b_and_c() {
        let b = json!({
            "data": { "node": { "timeline_list_feed_units": {
                "edges": [sample_edge("200", "c1")]
            }}}
        })
        .to_string();
        let c = json!({ "data": sample_edge("201", "c2") }).to_string();
        let body = format!("{b}\r\n{c}");
        let edges = parse_edge_list(&body).unwrap();
        assert_eq!(edges.len(), 2);
        // Order preserved: shape (b)'s edge first.
        assert_eq!(edges[0].pointer("/cursor"), Some(&json!("c1")));
        assert_eq!(edges[1].pointer("/cursor"), Some(&json!("c2")));
    }

    #[test]
    fn unparseable_body_is_hard_failure() {
        assert!(matches!(
            parse_edge_list("<html>not json</html>"),
            Err(ParseError::UnrecognizedBody)
        ));
    }

    #[test]
    fn normalize_full_edge() {
        let post = normalize_edge(&sample_edge("200", "c1")).unwrap();
        assert_eq!(post.name, "Example Page");
        assert_eq!(post.page_id, "100");
        assert_eq!(post.post_id, "200");
        assert_eq!(post.creation_time, 1_600_000_000);
        assert_eq!(post.message, "hello world");
        assert_eq!(post.reaction_count, Some(42));
        assert_eq!(post.comment_count, Some(7));
        assert_eq!(post.display_comment_count, Some(5));
        assert_eq!(post.share_count, Some(3));
        assert_eq!(post.top_reactions.len(), 1);
        assert_eq!(post.attachment_title, "Link title");
        assert_eq!(post.attachment_photos, "https://img/1.jpg, https://img/2.jpg");
        assert_eq!(post.cursor, "c1");
        assert_eq!(post.actor_url, "https://www.facebook.com/example");
        assert_eq!(post.post_url, "https://www.facebook.com/example/posts/200");
    }

    #[test]
    fn message_container_fallback() {
        let mut edge = sample_edge("200", "c1");
        let sections = edge
            .pointer_mut("/node/comet_sections/content/story/comet_sections")
            .unwrap();
        *sections = json!({
            "message_container": { "story": { "message": { "text": "from container" } } }
        });
        let post = normalize_edge(&edge).unwrap();
        assert_eq!(post.message, "from container");
    }

    #[test]
    fn missing_message_is_empty_not_fatal() {
        let mut edge = sample_edge("200", "c1");
        let sections = edge
            .pointer_mut("/node/comet_sections/content/story/comet_sections")
            .unwrap();
        *sections = json!({});
        assert_eq!(normalize_edge(&edge).unwrap().message, "");
    }

    #[test]
    fn missing_feedback_drops_record() {
        let mut edge = sample_edge("200", "c1");
        edge.pointer_mut("/node/comet_sections")
            .unwrap()
            .as_object_mut()
            .unwrap()
            .remove("feedback");
        assert_eq!(
            normalize_edge(&edge).unwrap_err(),
            SkipReason::MissingField("feedback")
        );
    }

    #[test]
    fn attachment_pair_all_or_nothing() {
        let mut edge = sample_edge("200", "c1");
        let att = edge
            .pointer_mut(
                "/node/comet_sections/content/story/attachments/0/comet_footer_renderer/attachment",
            )
            .unwrap();
        att.as_object_mut().unwrap().remove("description");
        let post = normalize_edge(&edge).unwrap();
        assert_eq!(post.attachment_title, "");
        assert_eq!(post.attachment_description, "");
    }

    #[test]
    fn single_photo_fallback() {
        let mut edge = sample_edge("200", "c1");
        let att = edge
            .pointer_mut("/node/comet_sections/content/story/attachments/0/styles/attachment")
            .unwrap();
        *att = json!({ "media": { "photo_image": { "uri": "https://img/solo.jpg" } } });
        assert_eq!(
            normalize_edge(&edge).unwrap().attachment_photos,
            "https://img/solo.jpg"
        );
    }

    #[test]
    fn no_attachment_is_empty_string() {
        let mut edge = sample_edge("200", "c1");
        edge.pointer_mut("/node/comet_sections/content/story")
            .unwrap()
            .as_object_mut()
            .unwrap()
            .remove("attachments");
        let post = normalize_edge(&edge).unwrap();
        assert_eq!(post.attachment_photos, "");
        assert_eq!(post.attachment_title, "");
    }

    #[test]
    fn numeric_ids_accepted() {
        let mut edge = sample_edge("200", "c1");
        let fb = edge
            .pointer_mut("/node/comet_sections/feedback/story/feedback_context/feedback_target_with_context/ufi_renderer/feedback")
            .unwrap();
        fb.as_object_mut()
            .unwrap()
            .insert("subscription_target_id".into(), json!(200));
        assert_eq!(normalize_edge(&edge).unwrap().post_id, "200");
    }

    #[test]
    fn string_creation_time_accepted() {
        let mut edge = sample_edge("200", "c1");
        let md = edge
            .pointer_mut("/node/comet_sections/context_layout/story/comet_sections/metadata/0/story")
            .unwrap();
        *md = json!({ "creation_time": "0" });
        assert_eq!(normalize_edge(&edge).unwrap().creation_time, 0);
    }
}
