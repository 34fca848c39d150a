//! The chat assistant: command parsing, the per-user state machine and the
//! message loop that feeds it.

pub mod command;
pub mod machine;
pub mod replier;
pub mod replies;
pub mod runner;

pub use command::{Command, CommandParser};
pub use machine::Assistant;
pub use replier::{ChannelReplier, Replier};
pub use runner::{Runner, RunnerConfig};
