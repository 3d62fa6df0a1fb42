//! UI components for the chat and schema editor panes

pub mod chat;
pub mod schema_panel;

pub use chat::{ChatHistory, ChatManager, Composer, ComposerResult};
pub use schema_panel::{PanelAction, SchemaPanel};
