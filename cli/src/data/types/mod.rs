//! Shared entity types for the data layer

pub mod channel;
pub mod message;
pub mod ticket;
pub mod user;

pub use channel::ChannelRef;
pub use message::{ChatMessage, FileAttachment, MessageRow, Reaction};
pub use ticket::{IssueTicket, Sprint};
pub use user::UserRecord;
