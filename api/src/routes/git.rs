use std::sync::Arc;

use axum::extract::{Json, State};
use diff_extractor::DiffReport;
use registry::Capability;
use repo_workspace::Workspace;
use reqs::{ManifestStatus, RequirementsChangeReport, presence_mismatch_report};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DiffRequest {
    pub repo_url: String,
}

#[derive(Debug, Deserialize)]
pub struct RevisionRequest {
    pub repo_url: String,
    pub commit_sha: String,
    #[serde(default)]
    pub target_commit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ComprehensiveRequest {
    pub repo_url: String,
    pub base: String,
    pub target: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeDiffResponse {
    #[serde(flatten)]
    pub report: DiffReport,
    pub summary: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeRequirementsResponse {
    pub status: ManifestStatus,
    pub added_packages: std::collections::BTreeMap<String, reqs::Constraint>,
    pub removed_packages: std::collections::BTreeMap<String, reqs::Constraint>,
    pub changed_packages: std::collections::BTreeMap<String, (reqs::Constraint, reqs::Constraint)>,
    pub potential_issues: Vec<reqs::PotentialIssue>,
    pub recommendations: Vec<String>,
    pub issue_counts: reqs::IssueCounts,
    pub ai_analysis: reqs::DependencyAnalysis,
}

impl From<RequirementsChangeReport> for AnalyzeRequirementsResponse {
    fn from(r: RequirementsChangeReport) -> Self {
        AnalyzeRequirementsResponse {
            status: r.status,
            added_packages: r.added_packages,
            removed_packages: r.removed_packages,
            changed_packages: r.changed_packages,
            potential_issues: r.potential_issues,
            recommendations: r.recommendations,
            issue_counts: r.issue_counts,
            ai_analysis: r.dependency_analysis,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ComprehensiveReport {
    pub repository: String,
    pub base_commit: String,
    pub target_commit: String,
    pub diff: Option<DiffReport>,
    pub diff_error: Option<String>,
    pub requirements: Option<RequirementsChangeReport>,
    pub summary: String,
    pub recommendations: Vec<String>,
    pub next_steps: Vec<String>,
}

async fn open_workspace(state: &AppState, repo_url: &str) -> AppResult<Workspace> {
    let ws = tokio::time::timeout(state.git_clone_timeout, Workspace::open(repo_url)).await??;
    Ok(ws)
}

fn require_git_capability(state: &AppState, id: &str) -> AppResult<()> {
    let model = state.registry.get(id)?;
    if !model.has_capability(Capability::Git) {
        return Err(AppError::NotFound(format!("model '{id}' does not support the git capability")));
    }
    Ok(())
}

/// Reads the requirements manifest at `rev`, probing the fixed candidate
/// list in order (spec §4.6 step 1). Content is decoded lossily since the
/// spec only defines strict UTF-8 handling for C7, not C6. Fetches stop at
/// the first candidate present; `resolve_manifest` then picks that content
/// out by candidate name, so the "first found wins" rule lives in one
/// place (`reqs::resolve_manifest`) instead of being duplicated here.
async fn read_manifest_at(workspace: &Workspace, rev: &str) -> AppResult<Option<String>> {
    let mut found = None;
    for candidate in reqs::changes::MANIFEST_CANDIDATES {
        if let Some(bytes) = workspace.file_content_at(rev, candidate).await? {
            found = Some((*candidate, String::from_utf8_lossy(&bytes).into_owned()));
            break;
        }
    }
    let resolved = reqs::resolve_manifest(|candidate| found.as_ref().filter(|(c, _)| *c == candidate).map(|(_, content)| content.clone()));
    Ok(resolved.map(|(_, content)| content))
}

async fn analyze_requirements_between(workspace: &Workspace, base_rev: &str, target_rev: &str) -> AppResult<RequirementsChangeReport> {
    let base_manifest = read_manifest_at(workspace, base_rev).await?;
    let target_manifest = read_manifest_at(workspace, target_rev).await?;

    Ok(match (base_manifest, target_manifest) {
        (None, None) => presence_mismatch_report(ManifestStatus::NoRequirements, None),
        (None, Some(target)) => presence_mismatch_report(ManifestStatus::NewRequirements, Some(&target)),
        (Some(_), None) => presence_mismatch_report(ManifestStatus::DeletedRequirements, None),
        (Some(base), Some(target)) => reqs::changes::analyze(&base, &target),
    })
}

/// `GET /v1/models/git-analyzer/diff` equivalent: C4 + C5 on the last
/// commit of the default branch vs. its parent.
#[instrument(skip(state))]
pub async fn diff_last_commit(State(state): State<Arc<AppState>>, Json(req): Json<DiffRequest>) -> AppResult<Json<DiffReport>> {
    require_git_capability(&state, "git-analyzer")?;
    let workspace = open_workspace(&state, &req.repo_url).await?;
    let report = diff_extractor::extract(&workspace, "HEAD^", "HEAD").await?;
    Ok(Json(report))
}

/// `/v1/models/git-diff-analyzer/analyze`: C4 + C5 between two revisions.
#[instrument(skip(state))]
pub async fn analyze_diff(State(state): State<Arc<AppState>>, Json(req): Json<RevisionRequest>) -> AppResult<Json<AnalyzeDiffResponse>> {
    require_git_capability(&state, "git-diff-analyzer")?;
    let workspace = open_workspace(&state, &req.repo_url).await?;
    let target_rev = req.target_commit.as_deref().unwrap_or("HEAD");
    let report = diff_extractor::extract(&workspace, &req.commit_sha, target_rev).await?;

    let mut recommendations = Vec::new();
    if report.total_files > 0 {
        recommendations.push(format!("review all {} changed files", report.total_files));
    }
    if report.total_additions + report.total_deletions > 20 {
        recommendations.push("run comprehensive tests".to_string());
    }

    let summary = format!(
        "{} files changed, {} additions, {} deletions between {} and {}",
        report.total_files, report.total_additions, report.total_deletions, report.base_commit.id, report.target_commit.id
    );

    Ok(Json(AnalyzeDiffResponse { report, summary, recommendations }))
}

/// `/v1/models/git-diff-analyzer/analyze-requirements`: C4 + C6.
#[instrument(skip(state))]
pub async fn analyze_requirements(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RevisionRequest>,
) -> AppResult<Json<AnalyzeRequirementsResponse>> {
    require_git_capability(&state, "git-diff-analyzer")?;
    let workspace = open_workspace(&state, &req.repo_url).await?;
    let target_rev = req.target_commit.as_deref().unwrap_or("HEAD");
    let report = analyze_requirements_between(&workspace, &req.commit_sha, target_rev).await?;
    Ok(Json(report.into()))
}

/// `/v1/git/analyze_comprehensive` (C10): composes C5 and C6, each failing
/// independently. Diff failure degrades to a `None` diff with `diff_error`
/// set rather than aborting; requirements analysis still runs.
#[instrument(skip(state))]
pub async fn analyze_comprehensive(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ComprehensiveRequest>,
) -> AppResult<Json<ComprehensiveReport>> {
    let workspace = open_workspace(&state, &req.repo_url).await?;

    let diff_result = diff_extractor::extract(&workspace, &req.base, &req.target).await;
    let (diff, diff_error) = match diff_result {
        Ok(report) => (Some(report), None),
        Err(e) => (None, Some(e.to_string())),
    };

    let requirements = analyze_requirements_between(&workspace, &req.base, &req.target).await.ok();

    let (base_commit, target_commit) = diff
        .as_ref()
        .map(|d| (d.base_commit.id.clone(), d.target_commit.id.clone()))
        .unwrap_or_else(|| (req.base.clone(), req.target.clone()));

    let mut summary = match &diff {
        Some(d) => format!(
            "Comparing {} to {}: {} files changed, {} additions, {} deletions.",
            short_id(&base_commit),
            short_id(&target_commit),
            d.total_files,
            d.total_additions,
            d.total_deletions
        ),
        None => format!("Comparing {} to {}: Could not analyze code changes.", short_id(&base_commit), short_id(&target_commit)),
    };
    if let Some(r) = &requirements {
        if r.status == ManifestStatus::Success {
            summary.push_str(&format!(
                " {} added, {} removed, {} changed dependencies.",
                r.added_packages.len(),
                r.removed_packages.len(),
                r.changed_packages.len()
            ));
        }
    }

    let mut recommendations = Vec::new();
    if let Some(d) = &diff {
        if d.total_files > 0 {
            recommendations.push(format!("review all {} changed files", d.total_files));
        }
    }
    if let Some(r) = &requirements {
        recommendations.extend(r.recommendations.iter().cloned());
        let high = r.potential_issues.iter().filter(|i| i.severity == "high").count();
        let medium = r.potential_issues.iter().filter(|i| i.severity == "medium").count();
        if high > 0 {
            recommendations.push(format!("{high} high-severity dependency issue(s) require review before merge"));
        }
        if medium > 0 {
            recommendations.push(format!("{medium} medium-severity dependency issue(s) should be reviewed"));
        }
    }
    recommendations.push("have a second reviewer confirm this merge".to_string());

    let mut next_steps = Vec::new();
    let total_delta = diff.as_ref().map(|d| d.total_additions + d.total_deletions).unwrap_or(0);
    if total_delta > 20 {
        next_steps.push("run comprehensive tests".to_string());
    }
    if let Some(r) = &requirements {
        let high_risk_names: Vec<&str> = r.dependency_analysis.high_risk.iter().map(|a| a.name.as_str()).collect();
        if !high_risk_names.is_empty() {
            next_steps.push(format!("prioritize testing of features that depend on: {}", high_risk_names.join(", ")));
        }
        if !r.added_packages.is_empty() {
            next_steps.push("ensure new dependencies are documented".to_string());
        }
        if !r.removed_packages.is_empty() {
            next_steps.push("confirm removed dependencies have no remaining call sites".to_string());
        }
    }

    Ok(Json(ComprehensiveReport {
        repository: req.repo_url,
        base_commit,
        target_commit,
        diff,
        diff_error,
        requirements,
        summary,
        recommendations,
        next_steps,
    }))
}

fn short_id(id: &str) -> &str {
    if id.len() > 7 { &id[..7] } else { id }
}
