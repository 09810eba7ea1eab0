//! C4: scoped clone of a remote repository, owned by a single in-flight
//! request. `Workspace::open` performs a shallow (depth-1) clone into a
//! unique temporary directory; the directory is removed when the
//! `Workspace` (and its inner `tempfile::TempDir`) drops, which happens on
//! every exit path — success, error, or panic unwind — without a
//! `finally`-style block.
//!
//! Credential resolution (SSH key path, ssh-agent, HTTPS token, libgit2
//! default) carries over the teacher's `project_code_store` callback chain.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use git2::{Cred, CredentialType, FetchOptions, Oid, RemoteCallbacks, Repository, build::RepoBuilder};
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

pub mod errors;
use errors::{Result, WorkspaceError};

#[derive(Debug, Clone)]
pub struct CommitRef {
    pub id: String,
    pub short_message: String,
    pub author_name: String,
    pub iso8601_date: String,
}

/// A freshly cloned repository, exclusively owned by the caller. Dropping
/// this value deletes the underlying directory.
pub struct Workspace {
    _dir: TempDir,
    path: PathBuf,
}

impl Workspace {
    /// Clone `repo_url` (shallow, depth 1) into a unique temp directory.
    #[instrument(skip(repo_url), fields(repo = %repo_url))]
    pub async fn open(repo_url: &str) -> Result<Workspace> {
        let repo_url = repo_url.to_string();
        let (dir, path) = tokio::task::spawn_blocking(move || -> Result<(TempDir, PathBuf)> {
            let dir = TempDir::new()?;
            let path = dir.path().to_path_buf();
            clone_shallow(&repo_url, &path)?;
            Ok((dir, path))
        })
        .await??;

        info!(path = %path.display(), "workspace ready");
        Ok(Workspace { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a file's content as it existed at `revision`. `None` if the
    /// path does not exist in that tree.
    #[instrument(skip(self), fields(path = %self.path.display(), revision, file = %file_path))]
    pub async fn file_content_at(&self, revision: &str, file_path: &str) -> Result<Option<Vec<u8>>> {
        let repo_path = self.path.clone();
        let revision = revision.to_string();
        let file_path = file_path.to_string();
        tokio::task::spawn_blocking(move || {
            let repo = open_or_fetch(&repo_path, &revision)?;
            let commit = match repo.revparse_single(&revision) {
                Ok(obj) => obj.peel_to_commit()?,
                Err(_) => return Err(WorkspaceError::RevisionNotFound(revision.clone())),
            };
            let tree = commit.tree()?;
            match tree.get_path(Path::new(&file_path)) {
                Ok(entry) => {
                    let object = entry.to_object(&repo)?;
                    match object.as_blob() {
                        Some(blob) => Ok(Some(blob.content().to_vec())),
                        None => Ok(None),
                    }
                }
                Err(_) => Ok(None),
            }
        })
        .await?
    }

    /// Raw unified-diff text between two revisions, fetching either one
    /// on demand (depth 1) if the shallow clone doesn't already have it.
    #[instrument(skip(self), fields(path = %self.path.display(), base_rev, target_rev))]
    pub async fn diff(&self, base_rev: &str, target_rev: &str) -> Result<String> {
        let repo_path = self.path.clone();
        let base_rev = base_rev.to_string();
        let target_rev = target_rev.to_string();
        tokio::task::spawn_blocking(move || {
            let repo = open_or_fetch(&repo_path, &base_rev)?;
            let repo = ensure_revision(repo, &repo_path, &target_rev)?;

            let base_commit = repo
                .revparse_single(&base_rev)
                .map_err(|_| WorkspaceError::RevisionNotFound(base_rev.clone()))?
                .peel_to_commit()?;
            let target_commit = repo
                .revparse_single(&target_rev)
                .map_err(|_| WorkspaceError::RevisionNotFound(target_rev.clone()))?
                .peel_to_commit()?;

            let base_tree = base_commit.tree()?;
            let target_tree = target_commit.tree()?;
            let diff = repo.diff_tree_to_tree(Some(&base_tree), Some(&target_tree), None)?;

            let mut out = String::new();
            diff.print(git2::DiffFormat::Patch, |_delta, _hunk, line| {
                match line.origin() {
                    '+' | '-' | ' ' => out.push(line.origin()),
                    _ => {}
                }
                out.push_str(&String::from_utf8_lossy(line.content()));
                true
            })?;
            Ok(out)
        })
        .await?
    }

    /// Resolve a SHA or `HEAD` into a full commit record.
    #[instrument(skip(self), fields(path = %self.path.display(), rev))]
    pub async fn resolve_commit(&self, rev: &str) -> Result<CommitRef> {
        let repo_path = self.path.clone();
        let rev = rev.to_string();
        tokio::task::spawn_blocking(move || {
            let repo = open_or_fetch(&repo_path, &rev)?;
            let commit = repo
                .revparse_single(&rev)
                .map_err(|_| WorkspaceError::RevisionNotFound(rev.clone()))?
                .peel_to_commit()?;
            Ok(to_commit_ref(&commit))
        })
        .await?
    }
}

fn to_commit_ref(commit: &git2::Commit) -> CommitRef {
    let when = commit.time();
    let dt = DateTime::<Utc>::from_timestamp(when.seconds(), 0).unwrap_or_else(Utc::now);
    CommitRef {
        id: commit.id().to_string(),
        short_message: commit.summary().unwrap_or_default().to_string(),
        author_name: commit.author().name().unwrap_or_default().to_string(),
        iso8601_date: dt.to_rfc3339(),
    }
}

#[instrument(skip(target))]
fn clone_shallow(url: &str, target: &Path) -> Result<()> {
    let mut fetch_opts = FetchOptions::new();
    fetch_opts.remote_callbacks(credential_callbacks());
    fetch_opts.depth(1);

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch_opts);

    debug!(url, path = %target.display(), "cloning shallow");
    builder.clone(url, target)?;
    Ok(())
}

/// Open the repo at `path`; if `revision` can't be resolved (shallow clone
/// didn't reach it), fetch it with depth 1 from `origin` and retry once.
fn open_or_fetch(path: &Path, revision: &str) -> Result<Repository> {
    let repo = Repository::open(path)?;
    if repo.revparse_single(revision).is_ok() {
        return Ok(repo);
    }
    fetch_revision(&repo, revision)?;
    Ok(repo)
}

fn ensure_revision(repo: Repository, path: &Path, revision: &str) -> Result<Repository> {
    if repo.revparse_single(revision).is_ok() {
        return Ok(repo);
    }
    fetch_revision(&repo, revision)?;
    // re-open so the updated refs/objects are visible through a stable handle.
    Repository::open(path).map_err(Into::into)
}

#[instrument(skip(repo))]
fn fetch_revision(repo: &Repository, revision: &str) -> Result<()> {
    warn!(revision, "revision missing from shallow clone, fetching");
    let mut remote = repo.find_remote("origin")?;
    let mut fetch_opts = FetchOptions::new();
    fetch_opts.remote_callbacks(credential_callbacks());
    fetch_opts.depth(1);
    if Oid::from_str(revision).is_ok() {
        remote.fetch(&[revision], Some(&mut fetch_opts), None)?;
    } else {
        remote.fetch::<&str>(&[], Some(&mut fetch_opts), None)?;
    }
    Ok(())
}

fn credential_callbacks<'a>() -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url_str, username_from_url, allowed| {
        let user = username_from_url.unwrap_or("git");

        if url_str.starts_with("http") {
            if let Ok(token) = std::env::var("GIT_HTTP_TOKEN") {
                let http_user = std::env::var("GIT_HTTP_USER").unwrap_or_else(|_| "oauth2".into());
                return Cred::userpass_plaintext(&http_user, &token);
            }
        }

        if allowed.contains(CredentialType::SSH_KEY) {
            if let Ok(key) = std::env::var("SSH_KEY_PATH") {
                let key_path = Path::new(&key);
                if key_path.exists() {
                    let pass = std::env::var("SSH_KEY_PASSPHRASE").ok();
                    return Cred::ssh_key(user, None, key_path, pass.as_deref());
                }
            }
            if let Ok(cred) = Cred::ssh_key_from_agent(user) {
                return Ok(cred);
            }
        }

        if allowed.contains(CredentialType::DEFAULT) {
            if let Ok(cred) = Cred::default() {
                return Ok(cred);
            }
        }

        if allowed.contains(CredentialType::USERNAME) {
            return Cred::username(user);
        }

        Err(git2::Error::from_str("no usable credentials"))
    });
    callbacks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_path_matches_tempdir() {
        // Exercises the struct without a real clone: constructs the
        // TempDir directly to keep the test offline.
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();
        let ws = Workspace { _dir: dir, path: path.clone() };
        assert_eq!(ws.path(), path.as_path());
    }
}
