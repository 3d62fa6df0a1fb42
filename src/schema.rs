use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One table of the editable schema, in the backend's wire shape.
///
/// Column names are not required to be unique within a table; duplicates are
/// carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaTable {
    #[serde(rename = "table")]
    pub name: String,
    pub columns: Vec<String>,
}

impl SchemaTable {
    pub fn new(name: impl Into<String>, columns: Vec<&str>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(String::from).collect(),
        }
    }
}

/// The schema shipped when the backend cannot be reached (offline/demo mode).
pub fn default_tables() -> Vec<SchemaTable> {
    vec![
        SchemaTable::new("users", vec!["id", "name", "email"]),
        SchemaTable::new("orders", vec!["id", "user_id", "total", "date"]),
    ]
}

/// In-memory schema plus the bookkeeping needed to reconcile it with the
/// backend's copy.
///
/// Edits apply locally first (optimistic) and bump `edit_seq`; saves are
/// asynchronous and report back with the sequence they carried, so a stale
/// completion can never mark newer edits as synced.
#[derive(Debug, Clone)]
pub struct Schema {
    tables: Vec<SchemaTable>,
    edit_seq: u64,
    last_saved_seq: u64,
    dirty: bool,
}

impl Schema {
    pub fn new(tables: Vec<SchemaTable>) -> Self {
        Self {
            tables,
            edit_seq: 0,
            last_saved_seq: 0,
            dirty: false,
        }
    }

    pub fn tables(&self) -> &[SchemaTable] {
        &self.tables
    }

    #[allow(dead_code)]
    pub fn edit_seq(&self) -> u64 {
        self.edit_seq
    }

    /// True while local edits are not known to have reached the backend.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replace the whole schema with a freshly fetched copy.
    pub fn replace(&mut self, tables: Vec<SchemaTable>) {
        self.tables = tables;
        self.edit_seq = 0;
        self.last_saved_seq = 0;
        self.dirty = false;
    }

    /// Snapshot for a save request: the tables plus the sequence they represent.
    pub fn snapshot(&self) -> (Vec<SchemaTable>, u64) {
        (self.tables.clone(), self.edit_seq)
    }

    /// Whether a save completion is older than one already acknowledged.
    /// Stale completions carry no information about the current sync state.
    pub fn is_stale(&self, seq: u64) -> bool {
        seq < self.last_saved_seq
    }

    /// Record a successful save. Stale completions (an earlier sequence than
    /// one already acknowledged) are ignored; the schema only becomes clean
    /// when the acknowledged sequence matches the latest edit.
    pub fn mark_saved(&mut self, seq: u64) {
        if self.is_stale(seq) {
            return;
        }
        self.last_saved_seq = seq;
        if seq == self.edit_seq {
            self.dirty = false;
        }
    }

    /// Rename table `index`. Rejected (returns false, no sequence bump) when
    /// the new name is empty, unchanged, or the index is out of range.
    pub fn rename_table(&mut self, index: usize, name: &str) -> bool {
        let name = name.trim();
        let Some(table) = self.tables.get_mut(index) else {
            return false;
        };
        if name.is_empty() || name == table.name {
            return false;
        }
        table.name = name.to_string();
        self.touch();
        true
    }

    /// Rename column `col` of table `index`, with the same rejection rules as
    /// [`Self::rename_table`].
    pub fn rename_column(&mut self, index: usize, col: usize, name: &str) -> bool {
        let name = name.trim();
        let Some(column) = self
            .tables
            .get_mut(index)
            .and_then(|t| t.columns.get_mut(col))
        else {
            return false;
        };
        if name.is_empty() || name == *column {
            return false;
        }
        *column = name.to_string();
        self.touch();
        true
    }

    /// Append a new table with a generated name, returning its index.
    pub fn add_table(&mut self) -> usize {
        let name = format!("table_{}", self.tables.len() + 1);
        self.tables.push(SchemaTable::new(name, vec!["id", "name"]));
        self.touch();
        self.tables.len() - 1
    }

    pub fn remove_table(&mut self, index: usize) -> bool {
        if index >= self.tables.len() {
            return false;
        }
        self.tables.remove(index);
        self.touch();
        true
    }

    /// Append a generated column to table `index`, returning its position.
    pub fn add_column(&mut self, index: usize) -> Option<usize> {
        let table = self.tables.get_mut(index)?;
        table.columns.push(format!("column_{}", table.columns.len() + 1));
        self.touch();
        Some(self.tables[index].columns.len() - 1)
    }

    pub fn remove_column(&mut self, index: usize, col: usize) -> bool {
        let Some(table) = self.tables.get_mut(index) else {
            return false;
        };
        if col >= table.columns.len() {
            return false;
        }
        table.columns.remove(col);
        self.touch();
        true
    }

    /// Write the tables to a local fallback file, used when a backend save
    /// fails so the edits survive a restart.
    pub fn write_fallback(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create schema fallback directory")?;
        }
        let content = serde_json::to_string_pretty(&self.tables)
            .context("Failed to serialize schema")?;
        fs::write(path, content)
            .context("Failed to write schema fallback")?;
        Ok(())
    }

    fn touch(&mut self) {
        self.edit_seq += 1;
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schema_matches_backend_seed() {
        let tables = default_tables();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].name, "users");
        assert_eq!(tables[0].columns, vec!["id", "name", "email"]);
        assert_eq!(tables[1].name, "orders");
        assert_eq!(tables[1].columns, vec!["id", "user_id", "total", "date"]);
    }

    #[test]
    fn wire_shape_uses_table_key() {
        let json = serde_json::to_string(&default_tables()[0]).unwrap();
        assert!(json.contains("\"table\":\"users\""));
        assert!(json.contains("\"columns\":[\"id\",\"name\",\"email\"]"));
    }

    #[test]
    fn empty_rename_is_rejected_without_a_sequence_bump() {
        let mut schema = Schema::new(default_tables());
        assert!(!schema.rename_table(0, ""));
        assert!(!schema.rename_table(0, "   "));
        assert!(!schema.rename_table(0, "users"));
        assert_eq!(schema.edit_seq(), 0);
        assert!(!schema.is_dirty());
        assert_eq!(schema.tables()[0].name, "users");
    }

    #[test]
    fn rename_applies_optimistically_and_bumps_sequence() {
        let mut schema = Schema::new(default_tables());
        assert!(schema.rename_table(0, "customers"));
        assert!(schema.rename_column(1, 2, "amount"));
        assert_eq!(schema.tables()[0].name, "customers");
        assert_eq!(schema.tables()[1].columns[2], "amount");
        assert_eq!(schema.edit_seq(), 2);
        assert!(schema.is_dirty());
    }

    #[test]
    fn remove_column_only_affects_that_table() {
        let mut schema = Schema::new(vec![
            SchemaTable::new("t1", vec!["a", "b", "c"]),
            SchemaTable::new("t2", vec!["x", "y"]),
        ]);
        assert!(schema.remove_column(0, 1));
        assert_eq!(schema.tables()[0].columns, vec!["a", "c"]);
        assert_eq!(schema.tables()[1].columns, vec!["x", "y"]);
    }

    #[test]
    fn duplicate_column_names_are_tolerated() {
        let mut schema = Schema::new(vec![SchemaTable::new("t", vec!["id"])]);
        assert!(schema.rename_column(0, 0, "name"));
        schema.add_column(0);
        assert!(schema.rename_column(0, 1, "name"));
        assert_eq!(schema.tables()[0].columns, vec!["name", "name"]);
    }

    #[test]
    fn generated_names_follow_the_counter() {
        let mut schema = Schema::new(default_tables());
        let idx = schema.add_table();
        assert_eq!(schema.tables()[idx].name, "table_3");
        assert_eq!(schema.tables()[idx].columns, vec!["id", "name"]);
        let col = schema.add_column(0).unwrap();
        assert_eq!(schema.tables()[0].columns[col], "column_4");
    }

    #[test]
    fn stale_save_completion_never_marks_newer_edits_clean() {
        let mut schema = Schema::new(default_tables());
        schema.rename_table(0, "a");
        let (_, first) = schema.snapshot();
        schema.rename_table(0, "b");
        let (_, second) = schema.snapshot();

        // Completions arrive out of order: newest first.
        schema.mark_saved(second);
        assert!(!schema.is_dirty());
        schema.mark_saved(first);
        assert!(!schema.is_dirty());

        // A save acknowledging only the first edit leaves the schema dirty.
        let mut schema = Schema::new(default_tables());
        schema.rename_table(0, "a");
        let (_, first) = schema.snapshot();
        schema.rename_table(0, "b");
        schema.mark_saved(first);
        assert!(schema.is_dirty());
    }

    #[test]
    fn fallback_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sql_schema.json");
        let schema = Schema::new(default_tables());
        schema.write_fallback(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let tables: Vec<SchemaTable> = serde_json::from_str(&content).unwrap();
        assert_eq!(tables, default_tables());
    }
}
