//! Smart Mail Bot: draft and send email from a chat conversation.

pub mod assistant;
pub mod channels;
pub mod config;
pub mod draft;
pub mod error;
pub mod llm;
pub mod mailer;
pub mod session;
