use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::archive::rows::{AggregateRow, Label, LabeledRows};
use crate::error::Result;

/// One entry of a serialized report table: a label, its aggregated row, and
/// an optional nested table for the next breakdown level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub label: Label,
    #[serde(flatten)]
    pub row: AggregateRow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtable: Option<Box<DataTable>>,
}

/// Intermediate shape for building hierarchical tables: at each label either
/// an already-aggregated row sits, or another level of labeled nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Row(AggregateRow),
    Table(Vec<(Label, TreeNode)>),
}

/// The serialized form of one report: an ordered list of labeled rows, each
/// possibly carrying a subtable. Row order follows construction order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    pub rows: Vec<TableRow>,
}

impl DataTable {
    /// Build a flat table from labeled rows, preserving their order.
    pub fn from_rows(rows: LabeledRows) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|(label, row)| TableRow {
                    label,
                    row,
                    subtable: None,
                })
                .collect(),
        }
    }

    /// Build a table from a label tree, recursing into nested levels.
    ///
    /// A label whose node is itself a table gets a synthesized parent row
    /// holding the accumulated totals of its direct children, so every level
    /// of the result is a complete table on its own.
    pub fn from_tree(nodes: Vec<(Label, TreeNode)>) -> Self {
        let rows = nodes
            .into_iter()
            .map(|(label, node)| match node {
                TreeNode::Row(row) => TableRow {
                    label,
                    row,
                    subtable: None,
                },
                TreeNode::Table(children) => {
                    let subtable = Self::from_tree(children);
                    let mut summary = AggregateRow::default();
                    for child in &subtable.rows {
                        summary.accumulate(&child.row);
                    }
                    TableRow {
                        label,
                        row: summary,
                        subtable: Some(Box::new(subtable)),
                    }
                }
            })
            .collect();
        Self { rows }
    }

    /// Build a table from top-level rows plus ready-made subtables keyed by
    /// the parent label. Parents without a matching subtable stay flat; a
    /// subtable under a label absent from `rows` is dropped.
    pub fn from_rows_with_subtables(
        rows: LabeledRows,
        mut subtables: IndexMap<Label, DataTable>,
    ) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|(label, row)| {
                    let subtable = subtables.shift_remove(&label).map(Box::new);
                    TableRow {
                        label,
                        row,
                        subtable,
                    }
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up a top-level row by label.
    pub fn get(&self, label: &Label) -> Option<&TableRow> {
        self.rows.iter().find(|row| &row.label == label)
    }

    /// Serialize to the JSON archive format.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
