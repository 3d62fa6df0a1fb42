use crate::backend::BackendError;
use crate::events::Notice;
use crate::schema::{Schema, SchemaTable};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};
use std::path::PathBuf;

/// An editable field in the schema panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRef {
    Table(usize),
    Column(usize, usize),
}

/// Editing state of the panel. Exactly one field can be in `Editing` at a
/// time; structural edits bypass this machine entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EditorMode {
    Viewing,
    Editing {
        field: FieldRef,
        original: String,
        buffer: String,
    },
    ConfirmRemove(FieldRef),
}

/// Action requested by the panel after handling a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelAction {
    None,
    /// Persist this snapshot of the schema to the backend
    Save {
        tables: Vec<SchemaTable>,
        seq: u64,
    },
}

/// Schema editor panel.
///
/// Local edits apply immediately (optimistic); every accepted mutation asks
/// the app to enqueue a whole-schema save tagged with the edit sequence.
pub struct SchemaPanel {
    schema: Schema,
    offline: bool,
    selected: usize,
    mode: EditorMode,
    focused: bool,
    fallback_path: PathBuf,
}

impl SchemaPanel {
    pub fn new(schema: Schema, fallback_path: PathBuf) -> Self {
        Self {
            schema,
            offline: false,
            selected: 0,
            mode: EditorMode::Viewing,
            focused: false,
            fallback_path,
        }
    }

    pub fn set_focus(&mut self, focused: bool) {
        self.focused = focused;
        if !focused {
            // Losing focus cancels any edit in progress.
            self.mode = EditorMode::Viewing;
        }
    }

    #[allow(dead_code)]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn is_editing(&self) -> bool {
        !matches!(self.mode, EditorMode::Viewing)
    }

    /// Install a freshly fetched schema
    pub fn set_schema(&mut self, tables: Vec<SchemaTable>, offline: bool) {
        self.schema.replace(tables);
        self.offline = offline;
        self.selected = 0;
        self.mode = EditorMode::Viewing;
    }

    /// Reconcile a finished save with the schema's sync state.
    ///
    /// On failure the optimistic edits stay applied: the schema is left
    /// dirty, the tables are written to the local fallback file, and a sticky
    /// warning is surfaced.
    pub fn apply_save_result(
        &mut self,
        seq: u64,
        result: Result<(), BackendError>,
    ) -> Option<Notice> {
        match result {
            Ok(()) => {
                self.schema.mark_saved(seq);
                if self.schema.is_dirty() {
                    // A newer edit is still unsynced; keep the warning up.
                    None
                } else {
                    Some(Notice::info("Schema saved to backend"))
                }
            }
            Err(e) if self.schema.is_stale(seq) => {
                // A newer save already succeeded; this failure is history.
                tracing::debug!("ignoring stale failed save (seq {seq}): {e}");
                None
            }
            Err(e) => {
                tracing::warn!("schema save (seq {seq}) failed: {e}");
                if let Err(write_err) = self.schema.write_fallback(&self.fallback_path) {
                    tracing::warn!("schema fallback write failed: {write_err:#}");
                }
                Some(
                    Notice::warning(format!("Schema not saved to backend ({e}); kept locally"))
                        .sticky(),
                )
            }
        }
    }

    /// Handle key input while the panel has focus
    pub fn handle_key(&mut self, key: KeyEvent) -> PanelAction {
        if key.kind != KeyEventKind::Press {
            return PanelAction::None;
        }

        match self.mode.clone() {
            EditorMode::Editing {
                field,
                original,
                mut buffer,
            } => match key.code {
                KeyCode::Enter => self.confirm_edit(field, &original, &buffer),
                KeyCode::Esc => {
                    self.mode = EditorMode::Viewing;
                    PanelAction::None
                }
                KeyCode::Char(c) => {
                    buffer.push(c);
                    self.mode = EditorMode::Editing {
                        field,
                        original,
                        buffer,
                    };
                    PanelAction::None
                }
                KeyCode::Backspace => {
                    buffer.pop();
                    self.mode = EditorMode::Editing {
                        field,
                        original,
                        buffer,
                    };
                    PanelAction::None
                }
                _ => PanelAction::None,
            },
            EditorMode::ConfirmRemove(field) => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.mode = EditorMode::Viewing;
                    let removed = match field {
                        FieldRef::Table(t) => self.schema.remove_table(t),
                        FieldRef::Column(t, c) => self.schema.remove_column(t, c),
                    };
                    if removed {
                        self.clamp_selection();
                        self.save_action()
                    } else {
                        PanelAction::None
                    }
                }
                _ => {
                    self.mode = EditorMode::Viewing;
                    PanelAction::None
                }
            },
            EditorMode::Viewing => match key.code {
                KeyCode::Up => {
                    self.selected = self.selected.saturating_sub(1);
                    PanelAction::None
                }
                KeyCode::Down => {
                    if self.selected + 1 < self.row_count() {
                        self.selected += 1;
                    }
                    PanelAction::None
                }
                KeyCode::Enter => {
                    if let Some(field) = self.selected_field() {
                        let original = self.field_value(field);
                        self.mode = EditorMode::Editing {
                            field,
                            buffer: original.clone(),
                            original,
                        };
                    }
                    PanelAction::None
                }
                KeyCode::Char('t') => {
                    let index = self.schema.add_table();
                    self.selected = self.row_of(FieldRef::Table(index));
                    self.save_action()
                }
                KeyCode::Char('a') => {
                    if let Some(table) = self.selected_table() {
                        if let Some(col) = self.schema.add_column(table) {
                            self.selected = self.row_of(FieldRef::Column(table, col));
                            return self.save_action();
                        }
                    }
                    PanelAction::None
                }
                KeyCode::Char('d') | KeyCode::Delete => {
                    if let Some(field) = self.selected_field() {
                        self.mode = EditorMode::ConfirmRemove(field);
                    }
                    PanelAction::None
                }
                _ => PanelAction::None,
            },
        }
    }

    /// Confirm an inline edit: a non-empty value that differs from the
    /// original applies optimistically and triggers a save; anything else is
    /// a cancel.
    fn confirm_edit(&mut self, field: FieldRef, original: &str, buffer: &str) -> PanelAction {
        self.mode = EditorMode::Viewing;

        let value = buffer.trim();
        if value.is_empty() || value == original {
            return PanelAction::None;
        }

        let renamed = match field {
            FieldRef::Table(t) => self.schema.rename_table(t, value),
            FieldRef::Column(t, c) => self.schema.rename_column(t, c, value),
        };

        if renamed {
            self.save_action()
        } else {
            PanelAction::None
        }
    }

    fn save_action(&mut self) -> PanelAction {
        let (tables, seq) = self.schema.snapshot();
        PanelAction::Save { tables, seq }
    }

    // Row layout: each table contributes one header row plus one row per column.
    fn row_count(&self) -> usize {
        self.schema
            .tables()
            .iter()
            .map(|t| 1 + t.columns.len())
            .sum()
    }

    fn selected_field(&self) -> Option<FieldRef> {
        let mut row = 0;
        for (t, table) in self.schema.tables().iter().enumerate() {
            if row == self.selected {
                return Some(FieldRef::Table(t));
            }
            row += 1;
            for c in 0..table.columns.len() {
                if row == self.selected {
                    return Some(FieldRef::Column(t, c));
                }
                row += 1;
            }
        }
        None
    }

    fn row_of(&self, field: FieldRef) -> usize {
        let mut row = 0;
        for (t, table) in self.schema.tables().iter().enumerate() {
            if field == FieldRef::Table(t) {
                return row;
            }
            row += 1;
            for c in 0..table.columns.len() {
                if field == FieldRef::Column(t, c) {
                    return row;
                }
                row += 1;
            }
        }
        0
    }

    fn selected_table(&self) -> Option<usize> {
        match self.selected_field()? {
            FieldRef::Table(t) => Some(t),
            FieldRef::Column(t, _) => Some(t),
        }
    }

    fn field_value(&self, field: FieldRef) -> String {
        match field {
            FieldRef::Table(t) => self.schema.tables()[t].name.clone(),
            FieldRef::Column(t, c) => self.schema.tables()[t].columns[c].clone(),
        }
    }

    fn clamp_selection(&mut self) {
        let rows = self.row_count();
        if rows == 0 {
            self.selected = 0;
        } else if self.selected >= rows {
            self.selected = rows - 1;
        }
    }

    fn status_line(&self) -> Line<'static> {
        if let EditorMode::ConfirmRemove(field) = self.mode {
            let what = match field {
                FieldRef::Table(t) => format!("table \"{}\"", self.schema.tables()[t].name),
                FieldRef::Column(t, c) => {
                    format!("column \"{}\"", self.schema.tables()[t].columns[c])
                }
            };
            return Line::from(vec![Span::styled(
                format!("Remove {what}? y/N"),
                Style::default().fg(Color::Red),
            )]);
        }

        if self.schema.is_dirty() {
            Line::from(vec![Span::styled(
                "● unsaved changes",
                Style::default().fg(Color::Yellow),
            )])
        } else if self.offline {
            Line::from(vec![Span::styled(
                "offline: using default schema",
                Style::default().fg(Color::Yellow),
            )])
        } else {
            Line::from(vec![Span::styled(
                "✓ synced",
                Style::default().fg(Color::Green),
            )])
        }
    }
}

impl Widget for &SchemaPanel {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Database Schema")
            .style(if self.focused {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Gray)
            });

        let inner = block.inner(area);
        block.render(area, buf);

        if inner.height == 0 {
            return;
        }

        buf.set_line(inner.x, inner.y, &self.status_line(), inner.width);

        let mut lines: Vec<Line> = Vec::new();
        let mut row = 0usize;
        for (t, table) in self.schema.tables().iter().enumerate() {
            lines.push(self.field_line(FieldRef::Table(t), row, &table.name, false));
            row += 1;
            for (c, column) in table.columns.iter().enumerate() {
                lines.push(self.field_line(FieldRef::Column(t, c), row, column, true));
                row += 1;
            }
        }

        if lines.is_empty() {
            lines.push(Line::from(vec![Span::styled(
                "No tables. Press t to add one.",
                Style::default().fg(Color::DarkGray),
            )]));
        }

        // Keep the selected row visible; the last row is the key hint.
        let height = inner.height.saturating_sub(3) as usize;
        let skip = self.selected.saturating_sub(height.saturating_sub(1));
        for (i, line) in lines.iter().skip(skip).take(height).enumerate() {
            buf.set_line(inner.x, inner.y + 2 + i as u16, line, inner.width);
        }

        if inner.height > 2 {
            let hint = Line::from(vec![Span::styled(
                "↑↓ select  Enter edit  a column  t table  d remove",
                Style::default().fg(Color::DarkGray),
            )]);
            buf.set_line(inner.x, inner.y + inner.height - 1, &hint, inner.width);
        }
    }
}

impl SchemaPanel {
    fn field_line(&self, field: FieldRef, row: usize, value: &str, indent: bool) -> Line<'static> {
        let selected = self.focused && row == self.selected;
        let prefix = if indent { "   " } else { " ▸ " };

        if let EditorMode::Editing {
            field: editing,
            ref buffer,
            ..
        } = self.mode
        {
            if editing == field {
                return Line::from(vec![
                    Span::raw(prefix.to_string()),
                    Span::styled(
                        format!("{buffer}▌"),
                        Style::default().fg(Color::Black).bg(Color::Cyan),
                    ),
                ]);
            }
        }

        let style = if selected {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else if indent {
            Style::default().fg(Color::White)
        } else {
            Style::default().fg(Color::Blue)
        };

        Line::from(vec![
            Span::styled(prefix.to_string(), Style::default().fg(Color::DarkGray)),
            Span::styled(value.to_string(), style),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::default_tables;
    use crossterm::event::KeyModifiers;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn panel(dir: &tempfile::TempDir) -> SchemaPanel {
        let mut panel = SchemaPanel::new(
            Schema::new(default_tables()),
            dir.path().join("sql_schema.json"),
        );
        panel.set_focus(true);
        panel
    }

    fn type_text(panel: &mut SchemaPanel, text: &str) {
        for c in text.chars() {
            panel.handle_key(press(KeyCode::Char(c)));
        }
    }

    #[test]
    fn enter_opens_editor_prefilled_with_current_value() {
        let dir = tempfile::tempdir().unwrap();
        let mut panel = panel(&dir);
        panel.handle_key(press(KeyCode::Enter));
        assert!(panel.is_editing());
        assert!(matches!(
            panel.mode,
            EditorMode::Editing { ref buffer, .. } if buffer == "users"
        ));
    }

    #[test]
    fn rename_to_empty_is_a_cancel_with_no_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut panel = panel(&dir);
        panel.handle_key(press(KeyCode::Enter));
        for _ in 0.."users".len() {
            panel.handle_key(press(KeyCode::Backspace));
        }
        let action = panel.handle_key(press(KeyCode::Enter));
        assert_eq!(action, PanelAction::None);
        assert_eq!(panel.schema().tables()[0].name, "users");
        assert_eq!(panel.schema().edit_seq(), 0);
        assert!(!panel.is_editing());
    }

    #[test]
    fn unchanged_confirm_is_a_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let mut panel = panel(&dir);
        panel.handle_key(press(KeyCode::Enter));
        let action = panel.handle_key(press(KeyCode::Enter));
        assert_eq!(action, PanelAction::None);
        assert_eq!(panel.schema().edit_seq(), 0);
    }

    #[test]
    fn rename_applies_optimistically_and_requests_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut panel = panel(&dir);
        panel.handle_key(press(KeyCode::Enter));
        for _ in 0.."users".len() {
            panel.handle_key(press(KeyCode::Backspace));
        }
        type_text(&mut panel, "customers");
        let action = panel.handle_key(press(KeyCode::Enter));

        assert_eq!(panel.schema().tables()[0].name, "customers");
        assert!(panel.schema().is_dirty());
        match action {
            PanelAction::Save { tables, seq } => {
                assert_eq!(seq, 1);
                assert_eq!(tables[0].name, "customers");
            }
            other => panic!("expected save, got {other:?}"),
        }
    }

    #[test]
    fn escape_cancels_an_edit() {
        let dir = tempfile::tempdir().unwrap();
        let mut panel = panel(&dir);
        panel.handle_key(press(KeyCode::Enter));
        type_text(&mut panel, "garbage");
        panel.handle_key(press(KeyCode::Esc));
        assert!(!panel.is_editing());
        assert_eq!(panel.schema().tables()[0].name, "users");
        assert_eq!(panel.schema().edit_seq(), 0);
    }

    #[test]
    fn removing_a_column_needs_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let mut panel = panel(&dir);
        // Row 2 is users.name (row 0 = users, row 1 = users.id).
        panel.handle_key(press(KeyCode::Down));
        panel.handle_key(press(KeyCode::Down));
        panel.handle_key(press(KeyCode::Char('d')));
        assert!(panel.is_editing());

        // Anything but y cancels.
        let action = panel.handle_key(press(KeyCode::Char('n')));
        assert_eq!(action, PanelAction::None);
        assert_eq!(panel.schema().tables()[0].columns, vec!["id", "name", "email"]);

        panel.handle_key(press(KeyCode::Char('d')));
        let action = panel.handle_key(press(KeyCode::Char('y')));
        assert!(matches!(action, PanelAction::Save { .. }));
        assert_eq!(panel.schema().tables()[0].columns, vec!["id", "email"]);
        // Other table untouched.
        assert_eq!(
            panel.schema().tables()[1].columns,
            vec!["id", "user_id", "total", "date"]
        );
    }

    #[test]
    fn structural_edits_bypass_the_editing_machine() {
        let dir = tempfile::tempdir().unwrap();
        let mut panel = panel(&dir);
        let action = panel.handle_key(press(KeyCode::Char('t')));
        assert!(matches!(action, PanelAction::Save { seq: 1, .. }));
        assert!(!panel.is_editing());
        assert_eq!(panel.schema().tables().len(), 3);

        let action = panel.handle_key(press(KeyCode::Char('a')));
        assert!(matches!(action, PanelAction::Save { seq: 2, .. }));
    }

    #[test]
    fn failed_save_keeps_edits_and_writes_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let mut panel = panel(&dir);
        panel.handle_key(press(KeyCode::Char('t')));
        let (_, seq) = panel.schema().snapshot();

        let notice = panel
            .apply_save_result(seq, Err(BackendError::Unreachable("refused".into())))
            .unwrap();
        assert!(notice.sticky);
        assert!(panel.schema().is_dirty());
        assert_eq!(panel.schema().tables().len(), 3);
        assert!(dir.path().join("sql_schema.json").exists());
    }

    #[test]
    fn stale_failed_save_does_not_warn_after_newer_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut panel = panel(&dir);
        panel.handle_key(press(KeyCode::Char('t')));
        let (_, first) = panel.schema().snapshot();
        panel.handle_key(press(KeyCode::Char('t')));
        let (_, second) = panel.schema().snapshot();

        let notice = panel.apply_save_result(second, Ok(())).unwrap();
        assert_eq!(notice.message, "Schema saved to backend");
        assert!(!panel.schema().is_dirty());

        // The older save failing afterwards changes nothing: the schema is
        // already synced, so no warning and no fallback file.
        let notice =
            panel.apply_save_result(first, Err(BackendError::Unreachable("refused".into())));
        assert!(notice.is_none());
        assert!(!panel.schema().is_dirty());
        assert!(!dir.path().join("sql_schema.json").exists());
    }

    #[test]
    fn stale_save_completion_does_not_mark_newer_edits_clean() {
        let dir = tempfile::tempdir().unwrap();
        let mut panel = panel(&dir);
        panel.handle_key(press(KeyCode::Char('t')));
        let (_, first) = panel.schema().snapshot();
        panel.handle_key(press(KeyCode::Char('t')));

        assert!(panel.apply_save_result(first, Ok(())).is_none());
        assert!(panel.schema().is_dirty());

        let (_, latest) = panel.schema().snapshot();
        let notice = panel.apply_save_result(latest, Ok(())).unwrap();
        assert_eq!(notice.message, "Schema saved to backend");
        assert!(!panel.schema().is_dirty());
    }
}
