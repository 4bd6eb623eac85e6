//! Thread view rendering
//!
//! Renders reconstructed threads as a plain-text block for humans and
//! downstream summarizers. Markers are fixed glyphs so repeated runs over
//! the same data diff cleanly.

use std::collections::HashMap;

use super::reconstruct::ThreadNode;
use crate::data::types::MessageRow;
use crate::domain::mentions::resolve_user_mentions;

/// Header context for one rendered view
#[derive(Debug, Clone)]
pub struct ViewContext {
    pub channel: String,
    pub window_label: String,
}

/// Render top-level entries with indented replies, reaction/file/issue
/// annotations, clipped-thread markers, and a trailing summary.
pub fn format_view(nodes: &[ThreadNode], ctx: &ViewContext) -> String {
    let users = build_user_map(nodes);
    let mut out = String::new();

    out.push_str(&format!(
        "=== #{} | {} ===\n\n",
        ctx.channel, ctx.window_label
    ));

    let mut total_messages = 0_usize;
    let mut total_replies = 0_usize;
    let mut active_threads = 0_usize;

    for (index, node) in nodes.iter().enumerate() {
        total_messages += 1 + node.replies.len();
        total_replies += node.replies.len();
        if node.root.is_thread_parent {
            active_threads += 1;
        }

        out.push_str(&format!("[{}] ", index + 1));
        out.push_str(&render_message(&node.root, &users));
        out.push('\n');
        if node.is_orphaned_reply {
            out.push_str("    (Thread clipped — parent outside time window)\n");
        }
        render_annotations(&node.root, &mut out, "    ");

        for reply in &node.replies {
            out.push_str("      ↳ ");
            out.push_str(&render_message(reply, &users));
            out.push('\n');
            render_annotations(reply, &mut out, "        ");
        }

        if node.has_clipped_replies {
            out.push_str(&format!(
                "    (showing {} of {}+ replies)\n",
                node.replies.len(),
                node.root.reply_count
            ));
        }
        out.push('\n');
    }

    out.push_str("---\n");
    out.push_str(&format!(
        "Total: {total_messages} messages, {total_replies} replies, {active_threads} active threads\n"
    ));
    out
}

/// `user_id -> display name` over every row in the view, replies included
fn build_user_map(nodes: &[ThreadNode]) -> HashMap<String, String> {
    let mut users = HashMap::new();
    for node in nodes {
        add_user(&node.root, &mut users);
        for reply in &node.replies {
            add_user(reply, &mut users);
        }
    }
    users
}

fn add_user(row: &MessageRow, users: &mut HashMap<String, String>) {
    if let Some(id) = &row.user_id {
        users
            .entry(id.clone())
            .or_insert_with(|| row.display_name().to_string());
    }
}

fn render_message(row: &MessageRow, users: &HashMap<String, String>) -> String {
    format!(
        "{} | {}: {}",
        row.timestamp.format("%Y-%m-%d %H:%M"),
        row.display_name(),
        resolve_user_mentions(&row.text, users)
    )
}

fn render_annotations(row: &MessageRow, out: &mut String, indent: &str) {
    if !row.reactions.is_empty() {
        let rendered: Vec<String> = row
            .reactions
            .iter()
            .map(|r| format!("{}({})", r.emoji, r.count))
            .collect();
        out.push_str(&format!("{indent}reactions: {}\n", rendered.join(", ")));
    }
    if !row.files.is_empty() {
        let rendered: Vec<String> = row
            .files
            .iter()
            .map(|f| format!("{} ({})", f.name, f.mimetype))
            .collect();
        out.push_str(&format!("{indent}files: {}\n", rendered.join(", ")));
    }
    if !row.issue_keys.is_empty() {
        out.push_str(&format!("{indent}issues: {}\n", row.issue_keys.join(", ")));
    }
}
