use crate::backend::{BackendError, TranslateOutcome};
use crate::schema::SchemaTable;
use uuid::Uuid;

/// Internal application events for coordinating between the UI loop and the
/// spawned backend tasks. All state mutation happens on the loop; tasks only
/// report results through these.
#[derive(Debug)]
pub enum AppEvent {
    /// Initial schema fetch finished (possibly with the offline fallback)
    SchemaFetched {
        tables: Vec<SchemaTable>,
        offline: bool,
    },

    /// A translate request finished; `id` ties it to the send that started it
    TranslationFinished {
        id: Uuid,
        outcome: Result<TranslateOutcome, BackendError>,
    },

    /// A schema save finished; `seq` is the edit sequence the save carried
    SchemaSaveFinished {
        seq: u64,
        result: Result<(), BackendError>,
    },
}

/// Severity of a notice shown in the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A status-line message. Warnings about unsynced state are sticky: they stay
/// up until the condition clears instead of timing out.
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub sticky: bool,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
            sticky: false,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
            sticky: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            sticky: false,
        }
    }

    pub fn sticky(mut self) -> Self {
        self.sticky = true;
        self
    }
}
