use crate::segment::Segment;

/// An optional extra filter applied to an aggregation query: one SQL
/// condition plus its bind values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlFilter {
    pub condition: String,
    pub binds: Vec<String>,
}

impl SqlFilter {
    pub fn new(condition: impl Into<String>, binds: Vec<String>) -> Self {
        Self {
            condition: condition.into(),
            binds,
        }
    }
}

/// Composes a `WHERE` clause from `(condition, binds)` pairs joined with
/// `AND`. Empty fragments (an empty segment, an absent extra filter) simply
/// contribute nothing, so the assembled SQL never carries stray `AND`s.
#[derive(Debug, Default)]
pub struct WhereBuilder {
    conditions: Vec<String>,
    binds: Vec<String>,
}

impl WhereBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, condition: impl Into<String>, binds: impl IntoIterator<Item = String>) {
        let condition = condition.into();
        if condition.is_empty() {
            return;
        }
        self.conditions.push(condition);
        self.binds.extend(binds);
    }

    pub fn push_filter(&mut self, filter: Option<&SqlFilter>) {
        if let Some(filter) = filter {
            self.push(filter.condition.clone(), filter.binds.iter().cloned());
        }
    }

    pub fn push_segment(&mut self, segment: &Segment) {
        if !segment.is_empty() {
            self.push(segment.sql().to_string(), segment.binds().iter().cloned());
        }
    }

    /// The assembled clause, including the leading `WHERE`, or an empty
    /// string when no condition was pushed.
    pub fn clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn binds(&self) -> &[String] {
        &self.binds
    }
}
