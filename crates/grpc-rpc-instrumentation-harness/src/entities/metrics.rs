use std::collections::BTreeMap;
use std::time::Duration;

/// Apdex bucket of a single transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApdexZone {
    Satisfying,
    Tolerating,
    Frustrating,
}

impl ApdexZone {
    /// Satisfying up to `apdex_t`, tolerating up to four times that
    pub fn classify(duration: Duration, apdex_t: Duration) -> Self {
        if duration <= apdex_t {
            ApdexZone::Satisfying
        } else if duration <= apdex_t * 4 {
            ApdexZone::Tolerating
        } else {
            ApdexZone::Frustrating
        }
    }
}

/// Aggregated values of one metric row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricStats {
    pub call_count: u64,
    pub total: Duration,
    pub min: Duration,
    pub max: Duration,
    pub satisfying: u64,
    pub tolerating: u64,
    pub frustrating: u64,
}

impl MetricStats {
    pub fn record(&mut self, duration: Duration) {
        if self.call_count == 0 || duration < self.min {
            self.min = duration;
        }
        if duration > self.max {
            self.max = duration;
        }
        self.call_count += 1;
        self.total += duration;
    }

    pub fn record_apdex(&mut self, zone: ApdexZone) {
        match zone {
            ApdexZone::Satisfying => self.satisfying += 1,
            ApdexZone::Tolerating => self.tolerating += 1,
            ApdexZone::Frustrating => self.frustrating += 1,
        }
    }
}

/// A metric row key as used in expectations: a name and an optional scope
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MetricSpec {
    pub name: String,
    pub scope: Option<String>,
}

impl MetricSpec {
    pub fn unscoped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: None,
        }
    }

    pub fn scoped(name: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: Some(scope.into()),
        }
    }
}

impl std::fmt::Display for MetricSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{} (scope: {})", self.name, scope),
            None => f.write_str(&self.name),
        }
    }
}

/// Metrics keyed by name, unscoped or scoped to a transaction name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsTable {
    unscoped: BTreeMap<String, MetricStats>,
    scoped: BTreeMap<String, BTreeMap<String, MetricStats>>,
}

impl MetricsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&mut self, name: &str, scope: Option<&str>) -> &mut MetricStats {
        match scope {
            None => self.unscoped.entry(name.to_string()).or_default(),
            Some(scope) => self
                .scoped
                .entry(scope.to_string())
                .or_default()
                .entry(name.to_string())
                .or_default(),
        }
    }

    pub fn record(&mut self, name: &str, scope: Option<&str>, duration: Duration) {
        self.entry(name, scope).record(duration);
    }

    pub fn get(&self, name: &str) -> Option<&MetricStats> {
        self.unscoped.get(name)
    }

    pub fn get_scoped(&self, scope: &str, name: &str) -> Option<&MetricStats> {
        self.scoped.get(scope)?.get(name)
    }

    pub fn lookup(&self, spec: &MetricSpec) -> Option<&MetricStats> {
        match &spec.scope {
            Some(scope) => self.get_scoped(scope, &spec.name),
            None => self.get(&spec.name),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.unscoped.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.unscoped.is_empty() && self.scoped.is_empty()
    }
}
