//! Validation of reasoning output into an [`AnalysisResult`].

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::analysis::truncate_utf8;
use crate::domain::{AnalysisResult, RiskLevel};

/// Caps applied to every accepted result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputBounds {
    pub max_summary_bytes: usize,
    pub max_recommendations: usize,
}

impl Default for OutputBounds {
    fn default() -> Self {
        Self {
            max_summary_bytes: 4_000,
            max_recommendations: 10,
        }
    }
}

fn fenced_block() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*\})\s*```").ok())
        .as_ref()
}

/// Locate the JSON object in a reply that may wrap it in prose or a fence.
fn extract_object(raw: &str) -> Option<&str> {
    if let Some(caps) = fenced_block().and_then(|re| re.captures(raw)) {
        return caps.get(1).map(|m| m.as_str());
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

/// Parse and bound a raw reply. The error string says what was wrong.
pub fn parse_analysis(raw: &str, bounds: &OutputBounds) -> Result<AnalysisResult, String> {
    let text = extract_object(raw).ok_or_else(|| "no JSON object in response".to_string())?;
    let value: Value =
        serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))?;

    let summary = value
        .get("summary")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "missing or empty summary".to_string())?;

    let items = value
        .get("recommendations")
        .and_then(Value::as_array)
        .ok_or_else(|| "recommendations must be an array".to_string())?;
    let mut recommendations = Vec::with_capacity(items.len());
    for item in items {
        let text = item
            .as_str()
            .ok_or_else(|| "recommendations must contain only strings".to_string())?;
        let text = text.trim();
        if !text.is_empty() && recommendations.len() < bounds.max_recommendations {
            recommendations.push(text.to_string());
        }
    }

    let risk_level: RiskLevel = value
        .get("risk_level")
        .and_then(Value::as_str)
        .ok_or_else(|| "missing risk_level".to_string())?
        .parse()?;

    Ok(AnalysisResult {
        summary: truncate_utf8(summary, bounds.max_summary_bytes).to_string(),
        recommendations,
        risk_level,
    })
}
