use sha2::{Digest, Sha256};

/// Fields a segment may reference while remaining valid for conversion-level
/// queries. The conversion log only denormalizes this subset of visit
/// attributes, so a segment touching anything else cannot be applied to it.
const CONVERSION_SEGMENT_FIELDS: &[&str] = &[
    "visitor_id",
    "referer_type",
    "referer_name",
    "referer_keyword",
    "visitor_returning",
    "visitor_days_since_first",
    "visitor_count_visits",
    "location_country",
    "location_continent",
    "revenue",
    "custom_var_k1",
    "custom_var_v1",
    "custom_var_k2",
    "custom_var_v2",
    "custom_var_k3",
    "custom_var_v3",
    "custom_var_k4",
    "custom_var_v4",
    "custom_var_k5",
    "custom_var_v5",
];

/// A compiled segment predicate over visit/conversion attributes.
///
/// Produced by an external segment compiler; this crate treats the SQL
/// fragment as opaque and only appends it (with its binds) to the queries it
/// builds. `unique_fields` lists the log columns the fragment references and
/// drives the conversion allow-list check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    sql: String,
    binds: Vec<String>,
    unique_fields: Vec<String>,
}

impl Segment {
    /// The no-op segment matching every visit.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(
        sql: impl Into<String>,
        binds: Vec<String>,
        unique_fields: Vec<String>,
    ) -> Self {
        Self {
            sql: sql.into(),
            binds,
            unique_fields,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// The SQL fragment, without any leading `AND`.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bind values for the fragment, in placeholder order.
    pub fn binds(&self) -> &[String] {
        &self.binds
    }

    pub fn unique_fields(&self) -> &[String] {
        &self.unique_fields
    }

    /// Whether this segment may filter conversion-level queries.
    ///
    /// Every referenced field must be on the allow-list; one out-of-list
    /// field disqualifies the whole segment. Callers must then report the
    /// breakdown as not computed rather than run the query unsegmented.
    pub fn is_available_for_conversions(&self) -> bool {
        self.unique_fields
            .iter()
            .all(|field| CONVERSION_SEGMENT_FIELDS.contains(&field.as_str()))
    }

    /// Stable token identifying this segment in cache keys and archive rows.
    ///
    /// The empty segment uses the fixed token `all`; any other segment hashes
    /// its SQL and bind values so that equivalent predicates share archives.
    pub fn cache_token(&self) -> String {
        if self.is_empty() {
            return "all".to_string();
        }
        let mut hasher = Sha256::new();
        hasher.update(self.sql.as_bytes());
        for bind in &self.binds {
            hasher.update([0u8]);
            hasher.update(bind.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}
