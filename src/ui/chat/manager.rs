use crate::backend::{BackendError, TranslateOutcome};
use crate::events::Notice;
use crate::store::{ChatTurn, ConversationStore};
use uuid::Uuid;

/// Drives the conversation flow: appends turns to the store, gates sends so
/// at most one translation is outstanding, and turns backend results into
/// assistant turns.
///
/// Network I/O lives elsewhere; this type only transitions state, which keeps
/// the send/finish contract testable without a backend.
pub struct ChatManager {
    store: ConversationStore,
    pending: Option<Uuid>,
    notice: Option<Notice>,
}

impl ChatManager {
    pub fn new(store: ConversationStore) -> Self {
        Self {
            store,
            pending: None,
            notice: None,
        }
    }

    pub fn turns(&self) -> &[ChatTurn] {
        self.store.turns()
    }

    /// Whether a translation is outstanding (the composer stays locked)
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Start a send: append the user turn (persisting it) and reserve the
    /// single in-flight slot. Returns the request id and trimmed text, or
    /// `None` when the input is empty or a translation is already pending.
    pub fn begin_send(&mut self, input: &str) -> Option<(Uuid, String)> {
        let text = input.trim();
        if text.is_empty() || self.pending.is_some() {
            return None;
        }

        if let Err(e) = self.store.append(ChatTurn::user(text)) {
            tracing::warn!("failed to persist chat turn: {e:#}");
            self.notice = Some(Notice::warning("Could not save chat history to disk"));
        }

        let id = Uuid::new_v4();
        self.pending = Some(id);
        Some((id, text.to_string()))
    }

    /// Finish a translation. Completions that do not match the pending
    /// request id are dropped. Exactly one assistant turn is appended per
    /// finished request, and the in-flight slot is released.
    pub fn finish_translation(
        &mut self,
        id: Uuid,
        outcome: Result<TranslateOutcome, BackendError>,
    ) {
        if self.pending != Some(id) {
            tracing::debug!("dropping stale translation result {id}");
            return;
        }
        self.pending = None;

        let turn = match outcome {
            Ok(TranslateOutcome::Sql(sql)) => ChatTurn::assistant(sql),
            Ok(TranslateOutcome::Rejected(message)) => ChatTurn::assistant(message),
            Err(e) => ChatTurn::assistant(format!(
                "Error: {e}. Please check if the backend server is running."
            )),
        };

        if let Err(e) = self.store.append(turn) {
            tracing::warn!("failed to persist chat turn: {e:#}");
            self.notice = Some(Notice::warning("Could not save chat history to disk"));
        }
    }

    /// Clear the history. The caller is responsible for confirming with the
    /// user first.
    pub fn clear(&mut self) -> anyhow::Result<()> {
        self.store.clear()
    }

    /// Append a local assistant turn (help text and the like)
    pub fn append_assistant(&mut self, content: impl Into<String>) {
        if let Err(e) = self.store.append(ChatTurn::assistant(content)) {
            tracing::warn!("failed to persist chat turn: {e:#}");
            self.notice = Some(Notice::warning("Could not save chat history to disk"));
        }
    }

    /// Drain the last persistence notice, if any
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }
}
