//! Markdown rendering of an analysis as a PR comment.

use crate::domain::{AnalysisResult, ImpactReport, RiskLevel};

/// Hidden marker tying a comment to the delivery that produced it.
pub fn delivery_marker(delivery_id: &str) -> String {
    format!("<!-- ripple:delivery={} -->", delivery_id)
}

fn badge(risk: RiskLevel) -> &'static str {
    match risk {
        RiskLevel::Low => "🟢 **Low risk**",
        RiskLevel::Medium => "🟡 **Medium risk**",
        RiskLevel::High => "🔴 **High risk**",
    }
}

fn code_list<T: std::fmt::Display>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|i| format!("`{}`", i))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_comment(
    result: &AnalysisResult,
    impact: Option<&ImpactReport>,
    delivery_id: &str,
) -> String {
    let mut out = String::from("### Ripple cross-repository impact analysis\n\n");
    out.push_str(badge(result.risk_level));
    out.push_str("\n\n");
    out.push_str(&result.summary);
    out.push_str("\n\n");

    if !result.recommendations.is_empty() {
        out.push_str("#### Recommendations\n\n");
        for (i, rec) in result.recommendations.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, rec));
        }
        out.push('\n');
    }

    if let Some(report) = impact {
        out.push_str("#### Impact\n\n");
        if report.impacted_repos.is_empty() {
            out.push_str("- Impacted repositories: none\n");
        } else {
            out.push_str(&format!(
                "- Impacted repositories: {}\n",
                code_list(&report.impacted_repos)
            ));
        }
        if !report.impacted_tests.is_empty() {
            out.push_str(&format!("- Impacted tests: {}\n", code_list(&report.impacted_tests)));
        }
        if !report.changed_modules.is_empty() {
            out.push_str(&format!("- Changed modules: {}\n", code_list(&report.changed_modules)));
        }
        out.push('\n');
    }

    out.push_str(&delivery_marker(delivery_id));
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_state::RepoId;

    #[test]
    fn test_comment_contains_all_sections() {
        let result = AnalysisResult {
            summary: "Changes the billing contract.".into(),
            recommendations: vec!["Update org/web client".into(), "Add contract test".into()],
            risk_level: RiskLevel::High,
        };
        let mut report = ImpactReport::default();
        report.impacted_repos.insert(RepoId::from("org/web"));

        let body = render_comment(&result, Some(&report), "d-9");
        assert!(body.contains("High risk"));
        assert!(body.contains("Changes the billing contract."));
        assert!(body.contains("1. Update org/web client\n2. Add contract test\n"));
        assert!(body.contains("`org/web`"));
        assert!(body.ends_with("<!-- ripple:delivery=d-9 -->\n"));
    }

    #[test]
    fn test_comment_without_impact_or_recommendations() {
        let result = AnalysisResult {
            summary: "Docs only.".into(),
            recommendations: vec![],
            risk_level: RiskLevel::Low,
        };
        let body = render_comment(&result, None, "d-1");
        assert!(!body.contains("Recommendations"));
        assert!(!body.contains("#### Impact"));
    }
}
