//! Bounded reasoning context and the structured analysis that comes back.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Document sent to the reasoning service.
///
/// `size()` never exceeds `budget`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisContext {
    pub diff_summary: String,
    pub impact_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_context: Option<String>,
    /// Byte budget the context was built against
    pub budget: usize,
}

impl AnalysisContext {
    /// Total bytes of all sections.
    pub fn size(&self) -> usize {
        self.diff_summary.len()
            + self.impact_summary.len()
            + self.prior_context.as_ref().map_or(0, String::len)
    }

    /// Concatenate the sections in priority order.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.size());
        if let Some(prior) = &self.prior_context {
            out.push_str(prior);
        }
        out.push_str(&self.impact_summary);
        out.push_str(&self.diff_summary);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level: {}", other)),
        }
    }
}

/// Verdict returned by the reasoning service for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    pub recommendations: Vec<String>,
    pub risk_level: RiskLevel,
}

/// Longest prefix of `s` that is at most `max` bytes and ends on a char
/// boundary.
pub(crate) fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
