//! Gateway: the single public entry point composing the news, comments,
//! and moderation services.

pub mod api;
pub mod tree;
