//! Chat pane components: composer, history, slash commands, and the
//! conversation manager that ties them to the store and backend.

pub mod commands;
pub mod composer;
pub mod history;
pub mod manager;

pub use commands::{get_help_text, ParsedCommand, SlashCommand};
pub use composer::{Composer, ComposerResult};
pub use history::ChatHistory;
pub use manager::ChatManager;
