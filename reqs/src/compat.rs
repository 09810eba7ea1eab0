//! C3: classify a single package's constraint delta into a risk-assessed
//! analysis. Pure and deterministic given the fixed lists baked in here.

use serde::{Deserialize, Serialize};

use crate::constraint::{Constraint, VersionTriple, normalize_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageAnalysis {
    pub name: String,
    pub old_constraint: Option<Constraint>,
    pub new_constraint: Option<Constraint>,
    pub analysis: String,
    pub risk: RiskLevel,
    pub recommendations: Vec<String>,
}

/// Dev/test tooling: newly-added entries from this list default to Low
/// risk rather than the general Medium default for additions.
pub const DEV_TEST_TOOLS: &[&str] = &["pytest", "coverage", "flake8", "mypy", "black", "isort"];

/// Security-sensitive packages: added entries get a security-review note
/// even though their version constraint hasn't changed.
pub const SECURITY_SENSITIVE: &[&str] = &["cryptography", "pyjwt", "bcrypt", "passlib"];

/// Frameworks/libraries wide enough in an app's dependency graph that a
/// change to them warrants an extra "many areas may be affected" note.
pub const CRITICAL_DEPENDENCIES: &[&str] =
    &["django", "flask", "fastapi", "tensorflow", "pytorch", "numpy", "pandas"];

fn is_security_sensitive(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("security") || SECURITY_SENSITIVE.contains(&lower.as_str())
}

pub fn is_critical_dependency(name: &str) -> bool {
    CRITICAL_DEPENDENCIES.contains(&name.to_lowercase().as_str())
}

/// Analyze a package present on both sides with possibly different
/// constraints (the "changed" path of a `RequirementsDelta`).
pub fn analyze_changed(name: &str, old: &Constraint, new: &Constraint) -> PackageAnalysis {
    let base = PackageAnalysis {
        name: name.to_string(),
        old_constraint: Some(old.clone()),
        new_constraint: Some(new.clone()),
        analysis: String::new(),
        risk: RiskLevel::Unknown,
        recommendations: Vec::new(),
    };

    match (old, new) {
        (Constraint::Exact(ov), Constraint::Exact(nv)) => {
            match (VersionTriple::parse(ov), VersionTriple::parse(nv)) {
                (Some(ot), Some(nt)) => classify_exact_bump(base, &ot, &nt),
                _ => PackageAnalysis {
                    analysis: "could not parse version numbers".into(),
                    risk: RiskLevel::Unknown,
                    recommendations: vec!["review changelog manually".into()],
                    ..base
                },
            }
        }
        (Constraint::AtLeast(_), Constraint::Exact(_)) => PackageAnalysis {
            analysis: "constraint tightened; improves reproducibility".into(),
            risk: RiskLevel::Low,
            ..base
        },
        (Constraint::Exact(_), Constraint::AtLeast(_)) | (Constraint::Exact(_), Constraint::Any) => {
            PackageAnalysis {
                analysis: "constraint relaxed; future installs may pick different versions".into(),
                risk: RiskLevel::Medium,
                recommendations: vec!["consider pinning".into()],
                ..base
            }
        }
        _ => PackageAnalysis {
            analysis: "constraint changed".into(),
            risk: RiskLevel::Unknown,
            recommendations: vec!["review changelog manually".into()],
            ..base
        },
    }
}

fn classify_exact_bump(base: PackageAnalysis, old: &VersionTriple, new: &VersionTriple) -> PackageAnalysis {
    if old.is_downgrade(new) {
        let risk = if old.is_major_downgrade(new) { RiskLevel::High } else { RiskLevel::Medium };
        return PackageAnalysis {
            analysis: "downgrade may cause regressions".into(),
            risk,
            recommendations: vec!["verify rationale".into(), "run regression tests".into()],
            ..base
        };
    }
    if old.major_bump(new) {
        return PackageAnalysis {
            analysis: "major version upgrade may introduce breaking changes".into(),
            risk: RiskLevel::High,
            recommendations: vec![
                "review changelog for breaking changes".into(),
                "run full test suite".into(),
            ],
            ..base
        };
    }
    if old.minor_bump(new) {
        return PackageAnalysis {
            analysis: "minor version upgrade may add features".into(),
            risk: RiskLevel::Medium,
            recommendations: vec!["review changelog for new features".into()],
            ..base
        };
    }
    if old.patch_bump(new) {
        return PackageAnalysis {
            analysis: "patch upgrade; likely bug fixes only".into(),
            risk: RiskLevel::Low,
            ..base
        };
    }
    PackageAnalysis { analysis: "version unchanged or equivalent".into(), risk: RiskLevel::Low, ..base }
}

pub fn analyze_added(name: &str, constraint: &Constraint) -> PackageAnalysis {
    let lower = name.to_lowercase();
    let mut recommendations = Vec::new();
    let mut risk = RiskLevel::Medium;
    let mut analysis = format!("new dependency added ({name}{constraint})");

    if DEV_TEST_TOOLS.contains(&lower.as_str()) {
        risk = RiskLevel::Low;
        analysis = format!("development/test tooling dependency ({name}{constraint})");
    } else if is_security_sensitive(name) {
        risk = RiskLevel::Medium;
        analysis = format!("security-sensitive dependency added ({name}{constraint})");
        recommendations.push("security review recommended".into());
    }

    if !matches!(constraint, Constraint::Exact(_)) {
        recommendations.push("consider pinning to an exact version".into());
    }

    PackageAnalysis {
        name: name.to_string(),
        old_constraint: None,
        new_constraint: Some(constraint.clone()),
        analysis,
        risk,
        recommendations,
    }
}

pub fn analyze_removed(name: &str, constraint: &Constraint, added: &[(String, Constraint)]) -> PackageAnalysis {
    let norm = normalize_name(name);
    let replacement = added.iter().find(|(added_name, _)| normalize_name(added_name).contains(&norm) || norm.contains(&normalize_name(added_name)));

    let (analysis, recommendations) = match replacement {
        Some((candidate, _)) => (
            format!("{name}{constraint} removed; possibly replaced by {candidate}"),
            vec![format!("confirm {candidate} covers the removed functionality")],
        ),
        None => (
            format!("{name}{constraint} removed"),
            vec!["verify functionality has been replaced or is no longer needed".to_string()],
        ),
    };

    PackageAnalysis {
        name: name.to_string(),
        old_constraint: Some(constraint.clone()),
        new_constraint: None,
        analysis,
        risk: RiskLevel::Medium,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_bump_is_low_risk() {
        let a = analyze_changed("requests", &Constraint::Exact("2.26.0".into()), &Constraint::Exact("2.26.1".into()));
        assert_eq!(a.risk, RiskLevel::Low);
    }

    #[test]
    fn major_bump_is_high_risk() {
        let a = analyze_changed("django", &Constraint::Exact("3.2.0".into()), &Constraint::Exact("4.0.0".into()));
        assert_eq!(a.risk, RiskLevel::High);
        assert!(a.recommendations.iter().any(|r| r.contains("changelog")));
    }

    #[test]
    fn relaxation_is_medium_risk_with_pin_recommendation() {
        let a = analyze_changed("flask", &Constraint::Exact("2.0.0".into()), &Constraint::AtLeast("2.0.0".into()));
        assert_eq!(a.risk, RiskLevel::Medium);
        assert!(a.recommendations.iter().any(|r| r.contains("pinning")));
    }

    #[test]
    fn dev_tool_addition_is_low_risk() {
        let a = analyze_added("pytest", &Constraint::AtLeast("7.0".into()));
        assert_eq!(a.risk, RiskLevel::Low);
    }

    #[test]
    fn security_sensitive_addition_gets_review_note() {
        let a = analyze_added("pyjwt", &Constraint::Exact("2.0.0".into()));
        assert!(a.recommendations.iter().any(|r| r.contains("security review")));
    }

    #[test]
    fn removed_package_detects_replacement_by_normalized_substring() {
        let added = vec![("py-jwt-next".to_string(), Constraint::Any)];
        let a = analyze_removed("pyjwt", &Constraint::Exact("1.0.0".into()), &added);
        assert!(a.analysis.contains("possibly replaced by py-jwt-next"));
    }
}
