//! Schema descriptions fed to the retrieval index.

pub mod builtin;

use serde::{Deserialize, Serialize};

pub use builtin::builtin_schema;

/// Whether a described relation is a base table or a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    Table,
    View,
}

impl TableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::View => "view",
        }
    }

    /// Capitalized label used in descriptions ("Table", "View").
    pub fn label(&self) -> &'static str {
        match self {
            Self::Table => "Table",
            Self::View => "View",
        }
    }
}

/// A table or view description before embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaEntry {
    /// Stable identifier (`table_film`, `view_film_list`)
    pub id: String,
    /// Relation name as written in SQL
    pub name: String,
    pub kind: TableKind,
    /// Natural-language description that gets embedded and retrieved
    pub text: String,
}
