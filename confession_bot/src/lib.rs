//! Source code for an anonymous confession bot on Telegram.
//!
//! People DM the bot text or photo confessions, moderators approve or reject
//! them in a private group, and approved ones get posted to a channel.
//! Rejections add up to strikes, which lead to blocks and eventually a ban.

/// Various types used throughout.
mod types;

/// Strike, block and quota rules.
mod policy;

/// Banned words checking.
mod filter;

/// The database.
mod database;

/// Settings from the environment.
mod config;

/// Everything the bot sends to Telegram on behalf of the pipeline.
mod outlet;

/// Submission intake and moderator decisions.
mod moderation;

/// Static texts.
mod texts;

/// Miscellaneous functions.
mod misc;

/// Functions that handle events from Telegram.
mod handlers;

/// Entry function that starts the bot.
mod entry;
pub use entry::*;
