use serde::{Deserialize, Serialize};

/// Behavior switches for request compilation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoQueryConfig {
    /// Upper bound applied to every `take`; `None` disables clamping
    pub max_limit: Option<usize>,
    /// Reject live values on unmapped properties and unknown `OrderBy` columns
    pub strict: bool,
    /// Resolve raw query-string params that are not typed properties
    pub enable_untyped_queries: bool,
    /// Order by the primary key when paging without an explicit order
    pub order_by_primary_key_on_paged_query: bool,
    /// Accept `_select`, `_from`, `_where` and `_orderBy` raw fragments
    pub enable_raw_filters: bool,
    /// Properties never treated as filters
    pub ignore_properties: Vec<String>,
    /// Applied to requests whose context sets no timeout
    pub default_timeout_ms: Option<u64>,
}

impl Default for AutoQueryConfig {
    fn default() -> Self {
        Self {
            max_limit: Some(100),
            strict: false,
            enable_untyped_queries: true,
            order_by_primary_key_on_paged_query: true,
            enable_raw_filters: false,
            ignore_properties: ["Skip", "Take", "OrderBy", "OrderByDesc", "Fields", "Include"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_timeout_ms: None,
        }
    }
}

impl AutoQueryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_limit(mut self, max_limit: Option<usize>) -> Self {
        self.max_limit = max_limit;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_untyped_queries(mut self, enabled: bool) -> Self {
        self.enable_untyped_queries = enabled;
        self
    }

    pub fn with_order_by_primary_key_on_paged_query(mut self, enabled: bool) -> Self {
        self.order_by_primary_key_on_paged_query = enabled;
        self
    }

    pub fn with_raw_filters(mut self, enabled: bool) -> Self {
        self.enable_raw_filters = enabled;
        self
    }

    pub fn with_ignore_property(mut self, property: impl Into<String>) -> Self {
        self.ignore_properties.push(property.into());
        self
    }

    pub fn with_default_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = Some(timeout_ms);
        self
    }

    /// Clamp a requested `take` to `max_limit`
    pub fn clamp_take(&self, take: Option<usize>) -> Option<usize> {
        match (take, self.max_limit) {
            (Some(take), Some(max)) => Some(take.min(max)),
            (None, Some(max)) => Some(max),
            (take, None) => take,
        }
    }
}
