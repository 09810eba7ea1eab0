//! C6: compose C2 (parse) and C3 (compatibility) across two manifest
//! revisions into a risk-bucketed report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::compat::{PackageAnalysis, RiskLevel, analyze_added, analyze_changed, analyze_removed, is_critical_dependency};
use crate::constraint::Constraint;
use crate::parser::parse_requirements;

/// Fixed search list probed in order; the first manifest found wins.
pub const MANIFEST_CANDIDATES: &[&str] =
    &["requirements.txt", "requirements/base.txt", "requirements/prod.txt", "requirements/production.txt"];

/// Three disjoint maps describing how a manifest changed between revisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequirementsDelta {
    pub added: BTreeMap<String, Constraint>,
    pub removed: BTreeMap<String, Constraint>,
    pub changed: BTreeMap<String, (Constraint, Constraint)>,
}

pub fn compute_delta(
    base: &BTreeMap<String, Constraint>,
    target: &BTreeMap<String, Constraint>,
) -> RequirementsDelta {
    let mut delta = RequirementsDelta::default();

    for (name, new_constraint) in target {
        match base.get(name) {
            None => {
                delta.added.insert(name.clone(), new_constraint.clone());
            }
            Some(old_constraint) if old_constraint != new_constraint => {
                delta.changed.insert(name.clone(), (old_constraint.clone(), new_constraint.clone()));
            }
            Some(_) => {}
        }
    }

    for (name, old_constraint) in base {
        if !target.contains_key(name) {
            delta.removed.insert(name.clone(), old_constraint.clone());
        }
    }

    delta
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestStatus {
    Success,
    NoRequirements,
    NewRequirements,
    DeletedRequirements,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unknown: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PotentialIssue {
    pub package: String,
    pub severity: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyAnalysis {
    pub high_risk: Vec<PackageAnalysis>,
    pub medium_risk: Vec<PackageAnalysis>,
    pub low_risk: Vec<PackageAnalysis>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementsChangeReport {
    pub status: ManifestStatus,
    pub added_packages: BTreeMap<String, Constraint>,
    pub removed_packages: BTreeMap<String, Constraint>,
    pub changed_packages: BTreeMap<String, (Constraint, Constraint)>,
    pub potential_issues: Vec<PotentialIssue>,
    pub recommendations: Vec<String>,
    pub issue_counts: IssueCounts,
    pub dependency_analysis: DependencyAnalysis,
    pub summary: String,
}

/// Find the first manifest candidate present, given a lookup closure that
/// returns file content for a candidate path (or `None` if missing).
pub fn resolve_manifest<F>(mut read: F) -> Option<(&'static str, String)>
where
    F: FnMut(&str) -> Option<String>,
{
    MANIFEST_CANDIDATES.iter().find_map(|&candidate| read(candidate).map(|content| (candidate, content)))
}

/// Run the full C6 algorithm given the base/target manifest text, when
/// both are present. For the `no_requirements`/`new_requirements`/
/// `deleted_requirements` statuses, construct the degenerate report with
/// `analyze_presence_mismatch` instead.
pub fn analyze(base_text: &str, target_text: &str) -> RequirementsChangeReport {
    let base = parse_requirements(base_text);
    let target = parse_requirements(target_text);
    let delta = compute_delta(&base, &target);

    let mut analyses = Vec::new();
    for (name, constraint) in &delta.added {
        analyses.push(analyze_added(name, constraint));
    }
    let added_pairs: Vec<(String, Constraint)> = delta.added.iter().map(|(n, c)| (n.clone(), c.clone())).collect();
    for (name, old_constraint) in &delta.removed {
        analyses.push(analyze_removed(name, old_constraint, &added_pairs));
    }
    for (name, (old, new)) in &delta.changed {
        analyses.push(analyze_changed(name, old, new));
    }

    let mut high_risk = Vec::new();
    let mut medium_risk = Vec::new();
    let mut low_risk = Vec::new();
    let mut unknown_risk = Vec::new();
    for a in analyses {
        match a.risk {
            RiskLevel::High => high_risk.push(a),
            RiskLevel::Medium => medium_risk.push(a),
            RiskLevel::Low => low_risk.push(a),
            RiskLevel::Unknown => unknown_risk.push(a),
        }
    }

    let issue_counts = IssueCounts {
        high: high_risk.len(),
        medium: medium_risk.len(),
        low: low_risk.len(),
        unknown: unknown_risk.len(),
    };

    let potential_issues: Vec<PotentialIssue> = high_risk
        .iter()
        .map(|a| (a, "high"))
        .chain(medium_risk.iter().map(|a| (a, "medium")))
        .chain(low_risk.iter().map(|a| (a, "low")))
        .chain(unknown_risk.iter().map(|a| (a, "unknown")))
        .map(|(a, sev)| PotentialIssue { package: a.name.clone(), severity: sev.to_string(), description: a.analysis.clone() })
        .collect();

    let mut recommendations = Vec::new();
    if !high_risk.is_empty() {
        recommendations.push(format!("high risk: {}", join_names(&high_risk)));
    }
    if !medium_risk.is_empty() {
        recommendations.push(format!("medium risk: {}", join_names(&medium_risk)));
    }
    if !low_risk.is_empty() {
        recommendations.push(format!("low risk: {}", join_names(&low_risk)));
    }

    let total_changed = delta.added.len() + delta.removed.len() + delta.changed.len();
    if total_changed > 3 {
        recommendations.push("consider staged rollout".to_string());
    }

    let touches_critical = delta.added.keys().chain(delta.removed.keys()).chain(delta.changed.keys()).any(|n| is_critical_dependency(n));
    if touches_critical {
        recommendations.push("changes to core dependencies may affect many parts of the application".to_string());
    }

    let summary = format!(
        "{} added, {} removed, {} changed dependencies",
        delta.added.len(),
        delta.removed.len(),
        delta.changed.len()
    );

    let dependency_analysis = DependencyAnalysis {
        high_risk,
        medium_risk,
        low_risk,
        recommendations: recommendations.clone(),
    };

    RequirementsChangeReport {
        status: ManifestStatus::Success,
        added_packages: delta.added,
        removed_packages: delta.removed,
        changed_packages: delta.changed,
        potential_issues,
        recommendations,
        issue_counts,
        dependency_analysis,
        summary,
    }
}

fn join_names(analyses: &[PackageAnalysis]) -> String {
    analyses.iter().map(|a| a.name.as_str()).collect::<Vec<_>>().join(", ")
}

/// Build the degenerate report for the three non-`success` manifest
/// presence states.
pub fn presence_mismatch_report(status: ManifestStatus, present_text: Option<&str>) -> RequirementsChangeReport {
    let parsed = present_text.map(parse_requirements).unwrap_or_default();
    let (added, summary) = match status {
        ManifestStatus::NewRequirements => (parsed.clone(), "requirements manifest added".to_string()),
        ManifestStatus::DeletedRequirements => (BTreeMap::new(), "requirements manifest deleted".to_string()),
        _ => (BTreeMap::new(), "no requirements changes detected".to_string()),
    };

    RequirementsChangeReport {
        status,
        added_packages: added,
        removed_packages: BTreeMap::new(),
        changed_packages: BTreeMap::new(),
        potential_issues: Vec::new(),
        recommendations: Vec::new(),
        issue_counts: IssueCounts { high: 0, medium: 0, low: 0, unknown: 0 },
        dependency_analysis: DependencyAnalysis { high_risk: vec![], medium_risk: vec![], low_risk: vec![], recommendations: vec![] },
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_maps_are_pairwise_disjoint() {
        let base = parse_requirements("a==1.0.0\nb==1.0.0\nc==1.0.0\n");
        let target = parse_requirements("a==2.0.0\nb==1.0.0\nd==1.0.0\n");
        let delta = compute_delta(&base, &target);
        for name in delta.changed.keys() {
            assert!(!delta.added.contains_key(name) && !delta.removed.contains_key(name));
        }
    }

    #[test]
    fn exact_patch_bump_end_to_end() {
        let report = analyze("requests==2.26.0\n", "requests==2.26.1\n");
        assert_eq!(report.issue_counts.low, 1);
        assert_eq!(report.issue_counts.high, 0);
    }

    #[test]
    fn major_bump_end_to_end() {
        let report = analyze("django==3.2.0\n", "django==4.0.0\n");
        assert_eq!(report.issue_counts.high, 1);
        assert!(report.recommendations.iter().any(|r| r.contains("high risk")));
    }

    #[test]
    fn issue_counts_sum_matches_potential_issues_len() {
        let report = analyze("a==1.0.0\nb==1.0.0\n", "a==2.0.0\nc==1.0.0\n");
        let sum = report.issue_counts.high + report.issue_counts.medium + report.issue_counts.low + report.issue_counts.unknown;
        assert_eq!(sum, report.potential_issues.len());
    }

    #[test]
    fn staged_rollout_recommended_past_threshold() {
        let report = analyze("a==1.0.0\nb==1.0.0\nc==1.0.0\nd==1.0.0\n", "e==1.0.0\nf==1.0.0\ng==1.0.0\nh==1.0.0\n");
        assert!(report.recommendations.iter().any(|r| r.contains("staged rollout")));
    }
}
