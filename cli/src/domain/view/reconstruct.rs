//! Thread reconstruction
//!
//! Groups flat partition rows back into nested parent-plus-replies
//! structures. A reply whose parent is missing from the read window becomes
//! its own top-level, marked orphaned and clipped; a parent with fewer
//! attached replies than its `reply_count` is marked clipped.

use std::collections::HashMap;

use crate::data::types::MessageRow;

/// One top-level entry: a standalone message, a thread parent with its
/// replies, or an orphaned reply.
#[derive(Debug, Clone)]
pub struct ThreadNode {
    pub root: MessageRow,
    pub replies: Vec<MessageRow>,
    /// True when the root is a reply whose parent is absent from the read
    pub is_orphaned_reply: bool,
    /// True when the containing thread is known to be partially visible
    pub is_clipped_thread: bool,
    /// True when fewer replies are attached than `root.reply_count`
    pub has_clipped_replies: bool,
}

impl ThreadNode {
    fn standalone(root: MessageRow) -> Self {
        Self {
            root,
            replies: vec![],
            is_orphaned_reply: false,
            is_clipped_thread: false,
            has_clipped_replies: false,
        }
    }

    fn orphan(root: MessageRow) -> Self {
        Self {
            root,
            replies: vec![],
            is_orphaned_reply: true,
            is_clipped_thread: true,
            has_clipped_replies: false,
        }
    }
}

/// Rebuild threads from flat rows.
///
/// Every input row appears exactly once in the output (as a root or inside
/// a `replies` list). Top-level entries and reply lists are both sorted by
/// `(timestamp, message_id)`.
pub fn reconstruct(rows: Vec<MessageRow>) -> Vec<ThreadNode> {
    let mut nodes: Vec<ThreadNode> = vec![];
    let mut by_id: HashMap<String, usize> = HashMap::new();
    let mut pending_replies: Vec<MessageRow> = vec![];

    for row in rows {
        if row.is_thread_reply {
            pending_replies.push(row);
        } else {
            by_id.insert(row.message_id.clone(), nodes.len());
            nodes.push(ThreadNode::standalone(row));
        }
    }

    for reply in pending_replies {
        let parent = reply
            .thread_ts
            .as_deref()
            .and_then(|ts| by_id.get(ts).copied());
        match parent {
            Some(index) => nodes[index].replies.push(reply),
            None => nodes.push(ThreadNode::orphan(reply)),
        }
    }

    for node in &mut nodes {
        node.replies.sort_by(|a, b| {
            (a.timestamp, a.message_id.as_str()).cmp(&(b.timestamp, b.message_id.as_str()))
        });
        if (node.replies.len() as i64) < node.root.reply_count {
            node.has_clipped_replies = true;
            node.is_clipped_thread = true;
        }
    }

    nodes.sort_by(|a, b| {
        (a.root.timestamp, a.root.message_id.as_str())
            .cmp(&(b.root.timestamp, b.root.message_id.as_str()))
    });
    nodes
}

/// Flatten back to rows: each root followed by its replies
pub fn flatten(nodes: &[ThreadNode]) -> Vec<MessageRow> {
    nodes
        .iter()
        .flat_map(|n| std::iter::once(n.root.clone()).chain(n.replies.iter().cloned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::parse_rfc3339;

    fn row(id: &str, ts: &str, thread_ts: Option<&str>, reply_count: i64) -> MessageRow {
        let thread_ts = thread_ts.map(String::from);
        let is_thread_parent = thread_ts.as_deref() == Some(id) && reply_count > 0;
        let is_thread_reply = thread_ts.as_deref().is_some_and(|t| t != id);
        MessageRow {
            message_id: id.to_string(),
            user_id: Some("U1".to_string()),
            text: format!("text {id}"),
            timestamp: parse_rfc3339(ts),
            thread_ts,
            is_thread_parent,
            is_thread_reply,
            reply_count,
            ..Default::default()
        }
    }

    #[test]
    fn test_replies_attach_to_parent_sorted() {
        let nodes = reconstruct(vec![
            row("102", "2025-10-15T12:02:00Z", Some("100"), 0),
            row("100", "2025-10-15T12:00:00Z", Some("100"), 2),
            row("101", "2025-10-15T12:01:00Z", Some("100"), 0),
        ]);
        assert_eq!(nodes.len(), 1);
        let node = &nodes[0];
        assert_eq!(node.root.message_id, "100");
        let reply_ids: Vec<&str> = node.replies.iter().map(|r| r.message_id.as_str()).collect();
        assert_eq!(reply_ids, vec!["101", "102"]);
        assert!(!node.has_clipped_replies);
        assert!(!node.is_orphaned_reply);
    }

    #[test]
    fn test_clipped_thread_marked() {
        // Parent claims 5 replies; only 2 are present in the window
        let nodes = reconstruct(vec![
            row("100", "2025-10-15T12:00:00Z", Some("100"), 5),
            row("101", "2025-10-15T12:01:00Z", Some("100"), 0),
            row("102", "2025-10-15T12:02:00Z", Some("100"), 0),
        ]);
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].has_clipped_replies);
        assert!(nodes[0].is_clipped_thread);
        assert_eq!(nodes[0].replies.len(), 2);
    }

    #[test]
    fn test_parent_with_zero_attached_replies_still_clipped() {
        let nodes = reconstruct(vec![row("100", "2025-10-15T12:00:00Z", Some("100"), 3)]);
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].has_clipped_replies);
        assert!(nodes[0].replies.is_empty());
    }

    #[test]
    fn test_orphan_reply_becomes_top_level() {
        let nodes = reconstruct(vec![row("202", "2025-10-15T12:00:00Z", Some("201"), 0)]);
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].is_orphaned_reply);
        assert!(nodes[0].is_clipped_thread);
        assert!(nodes[0].replies.is_empty());
    }

    #[test]
    fn test_self_parented_reply_is_standalone() {
        // thread_ts equals message_id with no replies: treated as its own
        // top-level, not an orphan
        let nodes = reconstruct(vec![row("100", "2025-10-15T12:00:00Z", Some("100"), 0)]);
        assert_eq!(nodes.len(), 1);
        assert!(!nodes[0].is_orphaned_reply);
        assert!(!nodes[0].has_clipped_replies);
    }

    #[test]
    fn test_top_levels_sorted_by_timestamp() {
        let nodes = reconstruct(vec![
            row("300", "2025-10-15T14:00:00Z", None, 0),
            row("100", "2025-10-15T12:00:00Z", None, 0),
        ]);
        let ids: Vec<&str> = nodes.iter().map(|n| n.root.message_id.as_str()).collect();
        assert_eq!(ids, vec!["100", "300"]);
    }

    #[test]
    fn test_flatten_is_permutation_of_input() {
        let input = vec![
            row("100", "2025-10-15T12:00:00Z", Some("100"), 2),
            row("101", "2025-10-15T12:01:00Z", Some("100"), 0),
            row("300", "2025-10-15T14:00:00Z", None, 0),
            row("202", "2025-10-15T12:30:00Z", Some("201"), 0),
        ];
        let nodes = reconstruct(input.clone());
        let mut flat_ids: Vec<String> =
            flatten(&nodes).iter().map(|r| r.message_id.clone()).collect();
        let mut input_ids: Vec<String> = input.iter().map(|r| r.message_id.clone()).collect();
        flat_ids.sort();
        input_ids.sort();
        assert_eq!(flat_ids, input_ids);
    }

    #[test]
    fn test_reconstruct_is_idempotent_over_flatten() {
        let input = vec![
            row("100", "2025-10-15T12:00:00Z", Some("100"), 2),
            row("102", "2025-10-15T12:02:00Z", Some("100"), 0),
            row("101", "2025-10-15T12:01:00Z", Some("100"), 0),
            row("202", "2025-10-15T12:30:00Z", Some("201"), 0),
        ];
        let once = reconstruct(input);
        let twice = reconstruct(flatten(&once));
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.root, b.root);
            assert_eq!(a.replies, b.replies);
            assert_eq!(a.is_orphaned_reply, b.is_orphaned_reply);
            assert_eq!(a.has_clipped_replies, b.has_clipped_replies);
        }
    }
}
