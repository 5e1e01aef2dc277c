//! Operator surface of the watcher: configuration, the alert commands, the
//! chat-line front end and the Discord delivery channel.

pub mod chat;
pub mod commands;
pub mod config;
pub mod discord;
pub mod render;
