use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::{Error, Result};

/// The group/row identifier in a dimension breakdown: a plain string for a
/// single-column dimension, a tuple for a composite one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Single(String),
    Tuple(Vec<String>),
}

impl Label {
    /// Build a label from query output columns: one column stays a plain
    /// string, several columns become a tuple keyed as a whole.
    pub fn from_parts(mut parts: Vec<String>) -> Self {
        if parts.len() == 1 {
            Self::Single(parts.remove(0))
        } else {
            Self::Tuple(parts)
        }
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for Label {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(s) => f.write_str(s),
            Self::Tuple(parts) => f.write_str(&parts.join(" - ")),
        }
    }
}

/// Insertion-ordered mapping from label to its aggregated row.
pub type LabeledRows = IndexMap<Label, AggregateRow>;

/// The fixed-shape per-group visit metrics accumulator.
///
/// All fields are running sums except `max_actions`, which is a running
/// maximum. A fresh row is all-zero (`Default`); rows are only ever mutated
/// by accumulation, never partially reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitMetrics {
    pub uniq_visitors: u64,
    pub visits: u64,
    pub actions: u64,
    pub max_actions: f64,
    pub sum_visit_length: u64,
    pub bounce_count: u64,
    pub visits_converted: u64,
}

/// Required keys of the legacy string-keyed row shape.
const NAMED_VISIT_KEYS: [&str; 7] = [
    "nb_uniq_visitors",
    "nb_visits",
    "nb_actions",
    "max_actions",
    "sum_visit_length",
    "bounce_count",
    "nb_visits_converted",
];

impl VisitMetrics {
    /// Fold `other` into `self`.
    ///
    /// `uniq_visitors` is summed like every other count, so across dimension
    /// groups it is only an upper bound on the true distinct count (a visitor
    /// appearing in two groups is counted twice). Downstream consumers rely
    /// on exactly this behavior, so it is kept as-is.
    pub fn accumulate(&mut self, other: &Self) {
        self.uniq_visitors += other.uniq_visitors;
        self.visits += other.visits;
        self.actions += other.actions;
        self.max_actions = self.max_actions.max(other.max_actions);
        self.sum_visit_length += other.sum_visit_length;
        self.bounce_count += other.bounce_count;
        self.visits_converted += other.visits_converted;
    }

    /// Normalize a legacy string-keyed row (`nb_uniq_visitors`, `nb_visits`,
    /// ...) into the canonical struct. Conversion happens once here, at
    /// ingestion; nothing downstream ever branches on key shape. A missing
    /// key is an error — defaulting it to zero would corrupt running totals
    /// without any signal.
    pub fn from_named(columns: &HashMap<String, f64>) -> Result<Self> {
        let mut values = [0.0f64; 7];
        for (slot, key) in values.iter_mut().zip(NAMED_VISIT_KEYS) {
            *slot = *columns
                .get(key)
                .ok_or_else(|| Error::MissingMetric(key.to_string()))?;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(Self {
            uniq_visitors: values[0] as u64,
            visits: values[1] as u64,
            actions: values[2] as u64,
            max_actions: values[3],
            sum_visit_length: values[4] as u64,
            bounce_count: values[5] as u64,
            visits_converted: values[6] as u64,
        })
    }

    /// The metrics as (record name, value) pairs, in the order they are
    /// persisted as numeric records.
    #[allow(clippy::cast_precision_loss)]
    pub fn named_records(&self) -> [(&'static str, f64); 7] {
        [
            ("nb_uniq_visitors", self.uniq_visitors as f64),
            ("nb_visits", self.visits as f64),
            ("nb_actions", self.actions as f64),
            ("max_actions", self.max_actions),
            ("sum_visit_length", self.sum_visit_length as f64),
            ("bounce_count", self.bounce_count as f64),
            ("nb_visits_converted", self.visits_converted as f64),
        ]
    }
}

/// The fixed-shape per-goal conversion metrics accumulator. All simple sums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalMetrics {
    pub conversions: u64,
    pub visits_converted: u64,
    pub revenue: f64,
}

impl GoalMetrics {
    pub fn accumulate(&mut self, other: &Self) {
        self.conversions += other.conversions;
        self.visits_converted += other.visits_converted;
        self.revenue += other.revenue;
    }
}

/// One label's aggregated row: visit metrics, an optional per-goal
/// breakdown, and the two derived totals computed by the enrichment step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub metrics: VisitMetrics,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub goals: BTreeMap<u32, GoalMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<f64>,
}

impl From<VisitMetrics> for AggregateRow {
    fn from(metrics: VisitMetrics) -> Self {
        Self {
            metrics,
            ..Self::default()
        }
    }
}

impl AggregateRow {
    /// Fold `other` into `self`: visit metrics accumulate field-wise,
    /// per-goal rows merge by goal id, derived totals sum when present.
    pub fn accumulate(&mut self, other: &Self) {
        self.metrics.accumulate(&other.metrics);
        for (goal_id, goal_row) in &other.goals {
            self.goals.entry(*goal_id).or_default().accumulate(goal_row);
        }
        if let Some(conversions) = other.conversions {
            *self.conversions.get_or_insert(0) += conversions;
        }
        if let Some(revenue) = other.revenue {
            *self.revenue.get_or_insert(0.0) += revenue;
        }
    }

    /// Merge one goal's metrics into this row's per-goal breakdown.
    pub fn add_goal(&mut self, goal_id: u32, metrics: &GoalMetrics) {
        self.goals.entry(goal_id).or_default().accumulate(metrics);
    }
}

/// For every label carrying a goal breakdown, recompute the derived
/// conversion and revenue totals as the sums over its goal rows. Labels
/// without goals are left untouched. Recomputing from scratch makes the
/// operation idempotent.
pub fn enrich_with_totals(rows: &mut LabeledRows) {
    for row in rows.values_mut() {
        if row.goals.is_empty() {
            continue;
        }
        let mut conversions = 0u64;
        let mut revenue = 0.0f64;
        for goal_row in row.goals.values() {
            conversions += goal_row.conversions;
            revenue += goal_row.revenue;
        }
        row.conversions = Some(conversions);
        row.revenue = Some(revenue);
    }
}

/// Two-level variant: applies [`enrich_with_totals`] to every sublabel map
/// within each top-level label.
pub fn enrich_with_totals_nested(nested: &mut IndexMap<Label, LabeledRows>) {
    for rows in nested.values_mut() {
        enrich_with_totals(rows);
    }
}
