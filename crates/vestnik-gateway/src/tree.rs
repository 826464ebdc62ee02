//! Domain types of the composed responses, and the reply-tree builder.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Replies nested deeper than this are cut off so a malformed flat list can
/// never drive the builder into unbounded recursion.
const MAX_REPLY_DEPTH: usize = 64;

fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// A comment as the gateway serves it: flat on the way in from the comments
/// service, carrying nested `replies` on the way out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub posted_at: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub reply_id: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Comment>,
}

/// A news item with its comment forest attached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsDetail {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(rename = "pubTime", default, skip_serializing_if = "is_zero")]
    pub pub_date: i64,
    #[serde(rename = "content", default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
}

/// Assemble a flat comment list into a forest of reply trees.
///
/// Comments with `reply_id == 0` become roots, in input order; every other
/// comment is attached under the comment its `reply_id` names, siblings
/// again in input order. Orphans (replies to ids missing from the input)
/// are dropped. Runs in O(N) over an index arena, so there is no aliasing
/// to go wrong.
pub fn to_tree(flat: Vec<Comment>) -> Vec<Comment> {
    let mut children: HashMap<i64, Vec<usize>> = HashMap::with_capacity(flat.len());
    let mut roots = 0;

    for (idx, comment) in flat.iter().enumerate() {
        if comment.reply_id == 0 {
            roots += 1;
            children.entry(comment.id).or_default();
        } else {
            children.entry(comment.reply_id).or_default().push(idx);
        }
    }

    let mut forest = Vec::with_capacity(roots);
    for (idx, comment) in flat.iter().enumerate() {
        if comment.reply_id == 0 {
            forest.push(materialize(idx, &flat, &children, 0));
        }
    }
    forest
}

/// Depth-first copy of the subtree rooted at `flat[idx]`.
fn materialize(
    idx: usize,
    flat: &[Comment],
    children: &HashMap<i64, Vec<usize>>,
    depth: usize,
) -> Comment {
    let mut node = flat[idx].clone();
    if depth < MAX_REPLY_DEPTH {
        if let Some(kids) = children.get(&node.id) {
            node.replies = kids
                .iter()
                .map(|&kid| materialize(kid, flat, children, depth + 1))
                .collect();
        }
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(id: i64, reply_id: i64) -> Comment {
        Comment {
            id,
            reply_id,
            ..Comment::default()
        }
    }

    fn with_replies(mut comment: Comment, replies: Vec<Comment>) -> Comment {
        comment.replies = replies;
        comment
    }

    #[test]
    fn builds_the_forest_preserving_sibling_order() {
        let input = vec![
            c(4, 1),
            c(5, 2),
            c(6, 3),
            c(1, 0),
            c(2, 0),
            c(3, 0),
            c(7, 4),
            c(8, 5),
            c(9, 6),
            c(10, 0),
            c(11, 1),
            c(12, 2),
            c(13, 3),
            c(14, 7),
        ];

        let want = vec![
            with_replies(
                c(1, 0),
                vec![
                    with_replies(c(4, 1), vec![with_replies(c(7, 4), vec![c(14, 7)])]),
                    c(11, 1),
                ],
            ),
            with_replies(
                c(2, 0),
                vec![with_replies(c(5, 2), vec![c(8, 5)]), c(12, 2)],
            ),
            with_replies(
                c(3, 0),
                vec![with_replies(c(6, 3), vec![c(9, 6)]), c(13, 3)],
            ),
            c(10, 0),
        ];

        assert_eq!(to_tree(input), want);
    }

    #[test]
    fn empty_input_gives_empty_forest() {
        assert!(to_tree(vec![]).is_empty());
    }

    #[test]
    fn roots_match_zero_reply_ids_exactly() {
        let input = vec![c(2, 1), c(1, 0), c(3, 1), c(4, 0)];
        let forest = to_tree(input);
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].id, 1);
        assert_eq!(forest[1].id, 4);
    }

    #[test]
    fn sibling_order_is_stable() {
        let input = vec![c(1, 0), c(5, 1), c(3, 1), c(9, 1)];
        let forest = to_tree(input);
        let sibling_ids: Vec<i64> = forest[0].replies.iter().map(|r| r.id).collect();
        assert_eq!(sibling_ids, vec![5, 3, 9]);
    }

    #[test]
    fn orphans_are_dropped() {
        let input = vec![c(1, 0), c(2, 100_500)];
        let forest = to_tree(input);
        assert_eq!(forest.len(), 1);
        assert!(forest[0].replies.is_empty());
    }

    #[test]
    fn self_referential_comment_does_not_diverge() {
        let input = vec![c(1, 0), c(2, 2)];
        let forest = to_tree(input);
        assert_eq!(forest.len(), 1, "self-reply is unreachable and dropped");
    }

    #[test]
    fn reply_chains_are_depth_bounded() {
        // 1 root and a 200-deep reply chain below it.
        let mut input = vec![c(1, 0)];
        for id in 2..=201 {
            input.push(c(id, id - 1));
        }

        let forest = to_tree(input);
        assert_eq!(forest.len(), 1);

        let mut depth = 0;
        let mut node = &forest[0];
        while let Some(next) = node.replies.first() {
            depth += 1;
            node = next;
        }
        assert_eq!(depth, MAX_REPLY_DEPTH, "chain must be cut at the bound");
    }

    #[test]
    fn comment_json_omits_empty_fields() {
        let json = serde_json::to_value(c(3, 0)).expect("serialize");
        assert_eq!(json, serde_json::json!({ "id": 3 }));
    }
}
