use lazy_static::lazy_static;
use std::collections::HashMap;

/// Canonical bucket for every "still needs fixing" lifecycle state.
pub const PENDING_FIX: &str = "待修复";

/// Raw status of a defect that was fixed and is waiting for verification.
pub const AWAITING_VERIFICATION: &str = "待验证";

/// Raw status of a defect that was verified and closed.
pub const CLOSED: &str = "已关闭";

lazy_static! {
    static ref DEFAULT_MAPPING: StatusMapping = StatusMapping::new(&[
        ("新建", PENDING_FIX),
        ("修复中", PENDING_FIX),
        (PENDING_FIX, PENDING_FIX),
        // aliases used by other trackers
        ("待解决", PENDING_FIX),
        ("处理中", PENDING_FIX),
    ]);
}

/// Fixed mapping from raw status labels to display buckets
///
/// Raw labels without an entry pass through unchanged and act as their own
/// bucket. The mapping is static configuration; it is never derived from data.
#[derive(Debug, Clone)]
pub struct StatusMapping {
    entries: HashMap<String, String>,
}

impl StatusMapping {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        let entries = pairs
            .iter()
            .map(|(raw, canonical)| (raw.to_string(), canonical.to_string()))
            .collect();
        StatusMapping { entries }
    }

    /// The mapping used by the dashboard.
    pub fn standard() -> &'static StatusMapping {
        &DEFAULT_MAPPING
    }

    /// Returns the canonical bucket for `raw`, or `raw` itself when unmapped.
    pub fn canonical<'a>(&'a self, raw: &'a str) -> &'a str {
        self.entries.get(raw).map(String::as_str).unwrap_or(raw)
    }

    /// Nullable variant of [`StatusMapping::canonical`]; `None` stays `None`.
    pub fn normalize(&self, raw: Option<&str>) -> Option<String> {
        raw.map(|raw| self.canonical(raw).to_string())
    }

    pub fn is_mapped(&self, raw: &str) -> bool {
        self.entries.contains_key(raw)
    }

    /// Every raw label that lands in `canonical`.
    ///
    /// A selected name that is not itself a mapping key (for example `已关闭`)
    /// is also returned, so that unmapped statuses remain selectable.
    pub fn raw_statuses_for(&self, canonical: &str) -> Vec<String> {
        let mut raws: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, bucket)| bucket.as_str() == canonical)
            .map(|(raw, _)| raw.clone())
            .collect();

        if !self.is_mapped(canonical) {
            raws.push(canonical.to_string());
        }

        raws.sort();
        raws
    }
}
