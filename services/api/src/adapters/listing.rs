//! services/api/src/adapters/listing.rs
//!
//! Decoding of the forum's JSON "thing" trees into domain types.
//!
//! Responses are nested `{kind, data}` wrappers: a `Listing` holds `children`,
//! each of which is a submission (`t3`), a comment (`t1`) or a `more` stub.
//! Every field is optional on the wire; a child that cannot be decoded is
//! skipped, while a payload without the expected envelope is a data error.

use forum_answers_core::{
    domain::{is_removed_body, Comment, Post, DELETED_AUTHOR},
    ports::{PortError, PortResult},
};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

//=========================================================================================
// "Impure" Wire Record Structs
//=========================================================================================

#[derive(Debug, Deserialize)]
struct RawThing {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct ListingRecord {
    #[serde(default)]
    children: Vec<RawThing>,
}

#[derive(Debug, Deserialize)]
struct LinkRecord {
    id: Option<String>,
    title: Option<String>,
    selftext: Option<String>,
    author: Option<String>,
    score: Option<i64>,
    num_comments: Option<u64>,
    created_utc: Option<f64>,
    url: Option<String>,
    subreddit: Option<String>,
    permalink: Option<String>,
    upvote_ratio: Option<f64>,
    stickied: Option<bool>,
}

impl LinkRecord {
    fn to_domain(self, forum: &str) -> Option<Post> {
        let id = self.id.filter(|id| !id.is_empty())?;
        Some(Post {
            id,
            title: self.title.unwrap_or_default(),
            body_text: self.selftext.unwrap_or_default(),
            author: self.author.unwrap_or_else(|| DELETED_AUTHOR.to_string()),
            score: self.score.unwrap_or(0),
            comment_count: self.num_comments.unwrap_or(0),
            created_utc: self.created_utc.unwrap_or(0.0) as i64,
            url: self.url.unwrap_or_default(),
            forum_name: self.subreddit.unwrap_or_else(|| forum.to_string()),
            permalink: self.permalink.unwrap_or_default(),
            upvote_ratio: self.upvote_ratio.unwrap_or(0.0),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CommentRecord {
    id: Option<String>,
    body: Option<String>,
    author: Option<String>,
    score: Option<i64>,
    created_utc: Option<f64>,
    depth: Option<u32>,
    #[serde(default)]
    replies: Value,
}

impl CommentRecord {
    /// Returns `None` for nodes without a body.
    fn to_domain(self, depth: u32) -> Option<Comment> {
        let body = self.body?;
        let replies = decode_replies(self.replies, depth + 1);
        Some(Comment {
            id: self.id.unwrap_or_default(),
            body_text: body,
            author: self.author.unwrap_or_else(|| DELETED_AUTHOR.to_string()),
            score: self.score.unwrap_or(0),
            created_utc: self.created_utc.unwrap_or(0.0) as i64,
            depth: self.depth.unwrap_or(depth),
            replies,
        })
    }
}

/// The kinds of node this service understands.
enum Thing {
    Listing(ListingRecord),
    Link(LinkRecord),
    Comment(CommentRecord),
    More,
    Unknown(String),
}

impl Thing {
    fn decode(raw: RawThing) -> Option<Thing> {
        let kind = raw.kind.unwrap_or_default();
        let decoded = match kind.as_str() {
            "Listing" => serde_json::from_value(raw.data).map(Thing::Listing),
            "t3" => serde_json::from_value(raw.data).map(Thing::Link),
            "t1" => serde_json::from_value(raw.data).map(Thing::Comment),
            "more" => Ok(Thing::More),
            _ => Ok(Thing::Unknown(kind.clone())),
        };
        match decoded {
            Ok(thing) => Some(thing),
            Err(e) => {
                debug!("Skipping undecodable '{}' node: {}", kind, e);
                None
            }
        }
    }
}

fn expect_listing(value: Value, what: &str) -> PortResult<ListingRecord> {
    let raw: RawThing = serde_json::from_value(value)
        .map_err(|e| PortError::upstream(None, format!("malformed {what}: {e}")))?;
    match Thing::decode(raw) {
        Some(Thing::Listing(listing)) => Ok(listing),
        _ => Err(PortError::upstream(
            None,
            format!("malformed {what}: expected a Listing"),
        )),
    }
}

//=========================================================================================
// Public Decoders
//=========================================================================================

/// Decodes a submissions listing, discarding pinned submissions.
pub(crate) fn decode_posts(body: Value, forum: &str) -> PortResult<Vec<Post>> {
    let listing = expect_listing(body, "submission listing")?;
    Ok(listing
        .children
        .into_iter()
        .filter_map(|child| match Thing::decode(child)? {
            Thing::Link(link) if link.stickied == Some(true) => None,
            Thing::Link(link) => link.to_domain(forum),
            Thing::Unknown(kind) => {
                debug!("Ignoring '{}' node in submission listing", kind);
                None
            }
            _ => None,
        })
        .collect())
}

/// Decodes the top-level comments of a comment listing response, which is a
/// two-element array whose second element holds the comment tree.
pub(crate) fn decode_comments(body: Value) -> PortResult<Vec<Comment>> {
    let tree = match body {
        Value::Array(mut parts) if parts.len() >= 2 => parts.swap_remove(1),
        _ => {
            return Err(PortError::upstream(
                None,
                "malformed comment listing: expected a two-element array",
            ))
        }
    };
    let listing = expect_listing(tree, "comment listing")?;
    Ok(decode_comment_children(listing, 0))
}

fn decode_comment_children(listing: ListingRecord, depth: u32) -> Vec<Comment> {
    listing
        .children
        .into_iter()
        .filter_map(|child| match Thing::decode(child)? {
            Thing::Comment(record) => record.to_domain(depth),
            _ => None,
        })
        .collect()
}

/// `replies` is either an empty string or a nested Listing.
fn decode_replies(replies: Value, depth: u32) -> Vec<Comment> {
    if !replies.is_object() {
        return Vec::new();
    }
    let Ok(listing) = expect_listing(replies, "reply listing") else {
        return Vec::new();
    };
    let mut children = decode_comment_children(listing, depth);
    children.retain(|c| !is_removed_body(&c.body_text));
    children.truncate(Comment::MAX_REPLIES_PER_LEVEL);
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn link(id: &str, score: i64, stickied: bool) -> Value {
        json!({
            "kind": "t3",
            "data": {
                "id": id,
                "title": format!("Title {id}"),
                "selftext": "Body",
                "author": "poster",
                "score": score,
                "num_comments": 12,
                "created_utc": 1700000000.0,
                "url": format!("https://www.reddit.com/r/technology/comments/{id}/"),
                "subreddit": "technology",
                "permalink": format!("/r/technology/comments/{id}/"),
                "upvote_ratio": 0.97,
                "stickied": stickied
            }
        })
    }

    fn comment(id: &str, body: Option<&str>, score: i64, replies: Value) -> Value {
        let mut data = json!({
            "id": id,
            "author": "commenter",
            "score": score,
            "created_utc": 1700000100.0,
            "depth": 0,
            "replies": replies
        });
        if let Some(body) = body {
            data["body"] = json!(body);
        }
        json!({ "kind": "t1", "data": data })
    }

    fn listing(children: Vec<Value>) -> Value {
        json!({ "kind": "Listing", "data": { "children": children, "after": null } })
    }

    #[test]
    fn posts_skip_stickied_and_keep_order() {
        let body = listing(vec![link("pinned", 999, true), link("a", 5, false), link("b", 50, false)]);
        let posts = decode_posts(body, "technology").unwrap();

        let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(posts[0].comment_count, 12);
        assert_eq!(posts[0].created_utc, 1_700_000_000);
        assert_eq!(posts[0].forum_name, "technology");
    }

    #[test]
    fn missing_fields_are_defaulted() {
        let body = listing(vec![json!({ "kind": "t3", "data": { "id": "bare" } })]);
        let posts = decode_posts(body, "technology").unwrap();

        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].author, DELETED_AUTHOR);
        assert_eq!(posts[0].score, 0);
        assert_eq!(posts[0].comment_count, 0);
        assert_eq!(posts[0].forum_name, "technology");
        assert_eq!(posts[0].body_text, "");
    }

    #[test]
    fn undecodable_children_are_skipped() {
        let body = listing(vec![
            json!({ "kind": "t3", "data": { "id": "typed", "score": "lots" } }),
            json!({ "kind": "t5", "data": {} }),
            json!({ "data": {} }),
            link("ok", 1, false),
        ]);
        let posts = decode_posts(body, "technology").unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, "ok");
    }

    #[test]
    fn non_listing_payload_is_a_data_error() {
        let err = decode_posts(json!({ "message": "Not Found" }), "x").unwrap_err();
        assert!(matches!(err, PortError::Upstream { status: None, .. }));

        let err = decode_posts(json!([1, 2, 3]), "x").unwrap_err();
        assert!(matches!(err, PortError::Upstream { .. }));
    }

    #[test]
    fn comments_come_from_second_element() {
        let body = json!([
            listing(vec![link("a", 5, false)]),
            listing(vec![
                comment("c1", Some("first"), 10, json!("")),
                comment("c2", None, 99, json!("")),
                json!({ "kind": "more", "data": { "count": 40, "children": ["x", "y"] } }),
                comment("c3", Some("[deleted]"), 4, json!("")),
            ]),
        ]);

        let comments = decode_comments(body).unwrap();
        let ids: Vec<&str> = comments.iter().map(|c| c.id.as_str()).collect();
        // Sentinel bodies are left for the fetcher to filter.
        assert_eq!(ids, vec!["c1", "c3"]);
    }

    #[test]
    fn replies_are_capped_per_level() {
        let replies = listing(vec![
            comment("r1", Some("one"), 3, json!("")),
            comment("r2", Some("[removed]"), 3, json!("")),
            comment("r3", Some("three"), 3, json!("")),
            comment("r4", Some("four"), 3, json!("")),
            comment("r5", Some("five"), 3, json!("")),
        ]);
        let body = json!([listing(vec![]), listing(vec![comment("top", Some("parent"), 8, replies)])]);

        let comments = decode_comments(body).unwrap();
        let reply_ids: Vec<&str> = comments[0].replies.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(reply_ids, vec!["r1", "r3", "r4"]);
    }

    #[test]
    fn comment_payload_must_be_a_pair() {
        let err = decode_comments(json!({ "kind": "Listing" })).unwrap_err();
        assert!(matches!(err, PortError::Upstream { .. }));
        let err = decode_comments(json!([listing(vec![])])).unwrap_err();
        assert!(matches!(err, PortError::Upstream { .. }));
    }
}
