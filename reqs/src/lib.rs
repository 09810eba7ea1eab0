pub mod changes;
pub mod compat;
pub mod constraint;
pub mod parser;

pub use changes::{
    DependencyAnalysis, IssueCounts, ManifestStatus, PotentialIssue, RequirementsChangeReport, RequirementsDelta,
    analyze, compute_delta, presence_mismatch_report, resolve_manifest, MANIFEST_CANDIDATES,
};
pub use compat::{PackageAnalysis, RiskLevel, analyze_added, analyze_changed, analyze_removed};
pub use constraint::{Constraint, VersionTriple};
pub use parser::parse_requirements;
