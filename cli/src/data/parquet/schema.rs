//! Fixed Arrow schemas for the three entities
//!
//! Field order and nullability are part of the on-disk contract; the writer
//! and reader both build against the exact `FieldRef`s defined here so the
//! nested list/struct types match bit-for-bit. Optional scalars are nullable
//! columns; list columns are never null, only empty.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, FieldRef, Fields, Schema, SchemaRef};

/// Element field shared by every `list<string>` column
pub fn string_list_item() -> FieldRef {
    Arc::new(Field::new("item", DataType::Utf8, false))
}

fn string_list(name: &str) -> Field {
    Field::new(name, DataType::List(string_list_item()), false)
}

// ============================================================================
// Messages
// ============================================================================

/// Struct fields of one reaction: `{emoji, count, users}`
pub fn reaction_fields() -> Fields {
    Fields::from(vec![
        Field::new("emoji", DataType::Utf8, false),
        Field::new("count", DataType::Int64, false),
        Field::new("users", DataType::List(string_list_item()), false),
    ])
}

/// Element field of the `reactions` column
pub fn reactions_item() -> FieldRef {
    Arc::new(Field::new(
        "item",
        DataType::Struct(reaction_fields()),
        false,
    ))
}

/// Struct fields of one file attachment: `{id, name, mimetype, url, size}`
pub fn file_fields() -> Fields {
    Fields::from(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("mimetype", DataType::Utf8, false),
        Field::new("url", DataType::Utf8, false),
        Field::new("size", DataType::Int64, false),
    ])
}

/// Element field of the `files` column
pub fn files_item() -> FieldRef {
    Arc::new(Field::new("item", DataType::Struct(file_fields()), false))
}

/// The 16 contract columns, then the nested `reactions`/`files` columns
/// kept for fidelity.
pub fn messages_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("message_id", DataType::Utf8, false),
        Field::new("user_id", DataType::Utf8, true),
        Field::new("text", DataType::Utf8, false),
        Field::new("timestamp", DataType::Utf8, false),
        Field::new("thread_ts", DataType::Utf8, true),
        Field::new("is_thread_parent", DataType::Boolean, false),
        Field::new("is_thread_reply", DataType::Boolean, false),
        Field::new("reply_count", DataType::Int64, false),
        Field::new("user_name", DataType::Utf8, true),
        Field::new("user_real_name", DataType::Utf8, true),
        Field::new("user_email", DataType::Utf8, true),
        Field::new("user_is_bot", DataType::Boolean, true),
        string_list("issue_keys"),
        Field::new("has_reactions", DataType::Boolean, false),
        Field::new("has_files", DataType::Boolean, false),
        Field::new("has_thread", DataType::Boolean, false),
        Field::new("reactions", DataType::List(reactions_item()), false),
        Field::new("files", DataType::List(files_item()), false),
    ]))
}

// ============================================================================
// Users
// ============================================================================

pub fn users_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("user_id", DataType::Utf8, false),
        Field::new("user_name", DataType::Utf8, true),
        Field::new("user_real_name", DataType::Utf8, true),
        Field::new("user_email", DataType::Utf8, true),
        Field::new("is_bot", DataType::Boolean, false),
        Field::new("cached_at", DataType::Utf8, false),
    ]))
}

// ============================================================================
// Issue tickets
// ============================================================================

/// Struct fields of one sprint: `{name, state}`
pub fn sprint_fields() -> Fields {
    Fields::from(vec![
        Field::new("name", DataType::Utf8, false),
        Field::new("state", DataType::Utf8, false),
    ])
}

/// Element field of the `sprints` column
pub fn sprints_item() -> FieldRef {
    Arc::new(Field::new("item", DataType::Struct(sprint_fields()), false))
}

/// Entry fields of the `comments` map: per-author comment counts
pub fn comments_entry_fields() -> Fields {
    Fields::from(vec![
        Field::new("keys", DataType::Utf8, false),
        Field::new("values", DataType::Int64, false),
    ])
}

/// Entries field of the `comments` column
pub fn comments_entries() -> FieldRef {
    Arc::new(Field::new(
        "entries",
        DataType::Struct(comments_entry_fields()),
        false,
    ))
}

/// Ticket columns in entity-field order, `cached_at` last
pub fn tickets_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("ticket_id", DataType::Utf8, false),
        Field::new("summary", DataType::Utf8, false),
        Field::new("status", DataType::Utf8, false),
        Field::new("priority", DataType::Utf8, false),
        Field::new("issue_type", DataType::Utf8, false),
        Field::new("assignee", DataType::Utf8, false),
        Field::new("created", DataType::Utf8, false),
        Field::new("updated", DataType::Utf8, false),
        Field::new("due_date", DataType::Utf8, true),
        Field::new("story_points", DataType::Int64, true),
        string_list("blocks"),
        string_list("blocked_by"),
        string_list("depends_on"),
        string_list("related"),
        string_list("components"),
        string_list("labels"),
        string_list("fix_versions"),
        Field::new("project", DataType::Utf8, true),
        Field::new("team", DataType::Utf8, true),
        Field::new("epic_link", DataType::Utf8, true),
        Field::new("resolution", DataType::Utf8, true),
        Field::new("comments", DataType::Map(comments_entries(), false), false),
        Field::new("total_comments", DataType::Int64, false),
        Field::new("sprints", DataType::List(sprints_item()), false),
        Field::new("cached_at", DataType::Utf8, false),
    ]))
}
