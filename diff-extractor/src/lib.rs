//! C5: per-file change records between two revisions of a `Workspace`.

use git2::{Delta, Patch, Repository};
use repo_workspace::{CommitRef, Workspace};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

pub const DIFF_TEXT_TRUNCATE_BYTES: usize = 5000;
pub const TRUNCATION_MARKER: &str = "... [truncated]";

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("git error: {0}")]
    Git(#[from] git2::Error),
    #[error("workspace error: {0}")]
    Workspace(#[from] repo_workspace::errors::WorkspaceError),
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, DiffError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
}

impl From<Delta> for ChangeType {
    fn from(d: Delta) -> Self {
        match d {
            Delta::Added | Delta::Untracked => ChangeType::Added,
            Delta::Deleted => ChangeType::Deleted,
            Delta::Renamed => ChangeType::Renamed,
            Delta::Copied => ChangeType::Copied,
            _ => ChangeType::Modified,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub change_type: ChangeType,
    pub additions: u64,
    pub deletions: u64,
    pub diff_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffReportCommit {
    pub id: String,
    pub short_message: String,
    pub author_name: String,
    pub iso8601_date: String,
}

impl From<CommitRef> for DiffReportCommit {
    fn from(c: CommitRef) -> Self {
        DiffReportCommit { id: c.id, short_message: c.short_message, author_name: c.author_name, iso8601_date: c.iso8601_date }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffReport {
    pub base_commit: DiffReportCommit,
    pub target_commit: DiffReportCommit,
    pub files: Vec<FileChange>,
    pub total_files: u64,
    pub total_additions: u64,
    pub total_deletions: u64,
}

/// Produce a `DiffReport` between `base_rev` and `target_rev` inside
/// `workspace`. Ensures both revisions are reachable (fetching on demand
/// via `Workspace::resolve_commit`) before diffing.
#[instrument(skip(workspace), fields(path = %workspace.path().display(), base_rev, target_rev))]
pub async fn extract(workspace: &Workspace, base_rev: &str, target_rev: &str) -> Result<DiffReport> {
    let base_commit_ref = workspace.resolve_commit(base_rev).await?;
    let target_commit_ref = workspace.resolve_commit(target_rev).await?;

    let repo_path = workspace.path().to_path_buf();
    let base_sha = base_commit_ref.id.clone();
    let target_sha = target_commit_ref.id.clone();

    let files = tokio::task::spawn_blocking(move || -> Result<Vec<FileChange>> {
        let repo = Repository::open(&repo_path)?;
        let base_commit = repo.find_commit(git2::Oid::from_str(&base_sha)?)?;
        let target_commit = repo.find_commit(git2::Oid::from_str(&target_sha)?)?;
        let base_tree = base_commit.tree()?;
        let target_tree = target_commit.tree()?;
        let diff = repo.diff_tree_to_tree(Some(&base_tree), Some(&target_tree), None)?;

        let mut changes = Vec::with_capacity(diff.deltas().len());
        for idx in 0..diff.deltas().len() {
            let delta = diff.get_delta(idx).expect("index within deltas().len()");
            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();

            if delta.flags().is_binary() {
                changes.push(FileChange {
                    path,
                    change_type: delta.status().into(),
                    additions: 0,
                    deletions: 0,
                    diff_text: "<binary diff>".to_string(),
                });
                continue;
            }

            let (additions, deletions, diff_text) = match Patch::from_diff(&diff, idx)? {
                Some(mut patch) => patch_text_and_counts(&mut patch)?,
                None => (0, 0, String::new()),
            };

            changes.push(FileChange { path, change_type: delta.status().into(), additions, deletions, diff_text });
        }
        Ok(changes)
    })
    .await??;

    let total_additions = files.iter().map(|f| f.additions).sum();
    let total_deletions = files.iter().map(|f| f.deletions).sum();

    Ok(DiffReport {
        base_commit: base_commit_ref.into(),
        target_commit: target_commit_ref.into(),
        total_files: files.len() as u64,
        total_additions,
        total_deletions,
        files,
    })
}

/// Render a single-file patch and count `+`/`-` content lines, excluding
/// the `+++`/`---` header lines, then apply the 5000-byte truncation rule.
fn patch_text_and_counts(patch: &mut Patch) -> Result<(u64, u64, String)> {
    let mut text = String::new();
    let mut additions = 0u64;
    let mut deletions = 0u64;

    patch.print(&mut |_delta, _hunk, line: git2::DiffLine| {
        let content = String::from_utf8_lossy(line.content());
        match line.origin_value() {
            git2::DiffLineType::Addition => {
                additions += 1;
                text.push('+');
            }
            git2::DiffLineType::Deletion => {
                deletions += 1;
                text.push('-');
            }
            git2::DiffLineType::Context => text.push(' '),
            git2::DiffLineType::AddEOFNL | git2::DiffLineType::DeleteEOFNL | git2::DiffLineType::ContextEOFNL => {}
            _ => {}
        }
        text.push_str(&content);
        true
    })?;

    Ok((additions, deletions, truncate_diff_text(text)))
}

fn truncate_diff_text(text: String) -> String {
    if text.len() <= DIFF_TEXT_TRUNCATE_BYTES {
        return text;
    }
    let mut end = DIFF_TEXT_TRUNCATE_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = text[..end].to_string();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// Count additions/deletions in already-rendered diff text directly, for
/// the invariant check in §8 ("additions equals the count of lines in
/// diff_text starting with + and not +++ when not truncated").
pub fn count_additions(diff_text: &str) -> u64 {
    diff_text.lines().filter(|l| l.starts_with('+') && !l.starts_with("+++")).count() as u64
}

pub fn count_deletions(diff_text: &str) -> u64 {
    diff_text.lines().filter(|l| l.starts_with('-') && !l.starts_with("---")).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_adds_marker_past_limit() {
        let long = "a".repeat(DIFF_TEXT_TRUNCATE_BYTES + 50);
        let truncated = truncate_diff_text(long);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert!(truncated.len() <= DIFF_TEXT_TRUNCATE_BYTES + TRUNCATION_MARKER.len());
    }

    #[test]
    fn short_text_untouched() {
        let short = "+added line\n-removed line\n".to_string();
        assert_eq!(truncate_diff_text(short.clone()), short);
    }

    #[test]
    fn count_additions_excludes_header() {
        let diff = "+++ b/file.rs\n+new line\n context\n";
        assert_eq!(count_additions(diff), 1);
    }

    #[test]
    fn count_deletions_excludes_header() {
        let diff = "--- a/file.rs\n-old line\n context\n";
        assert_eq!(count_deletions(diff), 1);
    }
}
