//! C7: path-confined filesystem operations. All paths are checked against
//! a fixed, read-only-after-construction list of sandbox roots; a path is
//! accepted only if its canonicalized form equals or descends from one of
//! them (`Path::starts_with` is component-wise, so this check is
//! boundary-aligned by construction — no `..`-via-string-prefix pitfall).

pub mod errors;
pub mod types;

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use glob::Pattern;
use tracing::instrument;

use errors::{FsError, Result};
use types::{EditOperation, EditResult, EntryKind, FailedEdit, FileInfo, FsEntry, ReadManyEntry, WriteResult};

#[derive(Debug, Clone)]
pub struct Gateway {
    roots: Vec<PathBuf>,
}

impl Gateway {
    /// Canonicalize and store the allowed roots. Roots must exist at
    /// startup; this is the one place the sandbox's shared state is
    /// mutated, and it happens before the dispatch surface opens.
    pub fn new(allowed_roots: Vec<PathBuf>) -> Result<Gateway> {
        let roots = allowed_roots.into_iter().map(fs::canonicalize).collect::<std::io::Result<Vec<_>>>()?;
        Ok(Gateway { roots })
    }

    pub fn allowed_roots(&self) -> Vec<String> {
        self.roots.iter().map(|p| p.display().to_string()).collect()
    }

    fn check_within_roots(&self, candidate: &Path) -> Result<()> {
        if self.roots.iter().any(|root| candidate.starts_with(root)) {
            Ok(())
        } else {
            Err(FsError::PermissionDenied(candidate.display().to_string()))
        }
    }

    /// Canonicalize an existing path and verify sandbox membership. Fully
    /// resolves symlinks, so a link whose target escapes the sandbox is
    /// rejected here even though the link itself lives inside a root.
    fn resolve_existing(&self, raw: &Path) -> Result<PathBuf> {
        let canon = fs::canonicalize(raw).map_err(|_| FsError::NotFound(raw.display().to_string()))?;
        self.check_within_roots(&canon)?;
        Ok(canon)
    }

    /// Resolve a path that may not exist yet (write/mkdir/move destination):
    /// canonicalize the longest existing ancestor, then append the
    /// remaining literal components, rejecting `.`/`..` in that tail.
    fn resolve_for_write(&self, raw: &Path) -> Result<PathBuf> {
        let mut existing = raw;
        let mut tail: Vec<&OsStr> = Vec::new();
        while !existing.exists() {
            let name = existing.file_name().ok_or_else(|| FsError::PermissionDenied(raw.display().to_string()))?;
            tail.push(name);
            match existing.parent() {
                Some(p) if !p.as_os_str().is_empty() => existing = p,
                _ => break,
            }
        }

        let mut canon = fs::canonicalize(existing).map_err(|_| FsError::PermissionDenied(raw.display().to_string()))?;
        for comp in tail.into_iter().rev() {
            if comp == "." || comp == ".." {
                return Err(FsError::PermissionDenied(raw.display().to_string()));
            }
            canon.push(comp);
        }
        self.check_within_roots(&canon)?;
        Ok(canon)
    }

    #[instrument(skip(self))]
    pub fn list(&self, path: &str) -> Result<Vec<FsEntry>> {
        let resolved = self.resolve_existing(Path::new(path))?;
        if !resolved.is_dir() {
            return Err(FsError::NotADirectory(path.to_string()));
        }
        let mut out = Vec::new();
        for entry in fs::read_dir(&resolved)? {
            let entry = entry?;
            let kind = entry_kind(&entry.path());
            out.push(FsEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
                absolute_path: entry.path().display().to_string(),
            });
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    pub fn read(&self, path: &str) -> Result<String> {
        let resolved = self.resolve_existing(Path::new(path))?;
        if resolved.is_dir() {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        let bytes = fs::read(&resolved)?;
        String::from_utf8(bytes).map_err(|_| FsError::Decode(path.to_string()))
    }

    /// Never fails as a whole; each path's outcome is isolated.
    pub fn read_many(&self, paths: &[String]) -> BTreeMap<String, ReadManyEntry> {
        paths
            .iter()
            .map(|p| {
                let entry = match self.read(p) {
                    Ok(content) => ReadManyEntry { content: Some(content), error: None },
                    Err(e) => ReadManyEntry { content: None, error: Some(e.to_string()) },
                };
                (p.clone(), entry)
            })
            .collect()
    }

    #[instrument(skip(self, content))]
    pub fn write(&self, path: &str, content: &str) -> Result<WriteResult> {
        let resolved = self.resolve_for_write(Path::new(path))?;
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&resolved, content)?;
        Ok(WriteResult { path: path.to_string(), size: content.len() as u64, ok: true })
    }

    /// Apply edits in order against the current working text; the diff is
    /// a minimal line-by-line pairing of original vs. final text.
    #[instrument(skip(self, edits))]
    pub fn edit(&self, path: &str, edits: &[EditOperation], dry_run: bool) -> Result<EditResult> {
        let resolved = self.resolve_existing(Path::new(path))?;
        let original = fs::read_to_string(&resolved).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound { FsError::NotFound(path.to_string()) } else { FsError::Io(e) }
        })?;

        let mut current = original.clone();
        let mut applied = Vec::new();
        let mut failed = Vec::new();

        for op in edits {
            if current.contains(op.old_text.as_str()) {
                current = current.replacen(&op.old_text, &op.new_text, 1);
                applied.push(op.clone());
            } else {
                failed.push(FailedEdit { operation: op.clone(), reason: "text not found in file".to_string() });
            }
        }

        let diff = line_diff(&original, &current);

        if !dry_run && !applied.is_empty() {
            fs::write(&resolved, &current)?;
        }

        Ok(EditResult {
            path: path.to_string(),
            original_size: original.len() as u64,
            new_size: current.len() as u64,
            dry_run,
            applied,
            failed,
            diff,
        })
    }

    #[instrument(skip(self))]
    pub fn mkdir(&self, path: &str) -> Result<()> {
        let resolved = self.resolve_for_write(Path::new(path))?;
        fs::create_dir_all(&resolved)?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn move_path(&self, src: &str, dst: &str) -> Result<()> {
        let resolved_src = self.resolve_existing(Path::new(src))?;
        let resolved_dst = self.resolve_for_write(Path::new(dst))?;
        if resolved_dst.exists() {
            return Err(FsError::AlreadyExists(dst.to_string()));
        }
        if let Some(parent) = resolved_dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&resolved_src, &resolved_dst)?;
        Ok(())
    }

    /// Recursive glob search rooted at `root`; `pattern` matches basenames,
    /// `excludes` filters matches by basename glob as well.
    #[instrument(skip(self))]
    pub fn search(&self, root: &str, pattern: &str, excludes: &[String]) -> Result<Vec<String>> {
        let resolved = self.resolve_existing(Path::new(root))?;
        if !resolved.is_dir() {
            return Err(FsError::NotADirectory(root.to_string()));
        }
        let matcher = Pattern::new(pattern)?;
        let exclude_matchers = excludes.iter().map(|e| Pattern::new(e)).collect::<std::result::Result<Vec<_>, _>>()?;

        let mut out = Vec::new();
        walk(&resolved, &mut |p| {
            let name = p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            if matcher.matches(&name) && !exclude_matchers.iter().any(|m| m.matches(&name)) {
                out.push(p.display().to_string());
            }
        })?;
        Ok(out)
    }

    #[instrument(skip(self))]
    pub fn info(&self, path: &str) -> Result<FileInfo> {
        let resolved = self.resolve_existing(Path::new(path))?;
        let meta = fs::symlink_metadata(&resolved)?;
        let kind = if meta.file_type().is_symlink() {
            EntryKind::Link
        } else if meta.is_dir() {
            EntryKind::Dir
        } else if meta.is_file() {
            EntryKind::File
        } else {
            EntryKind::Unknown
        };

        Ok(FileInfo {
            path: resolved.display().to_string(),
            name: resolved.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            size: meta.len(),
            kind,
            permissions: permissions_string(&meta),
            created: system_time_to_iso(meta.created().ok()),
            modified: system_time_to_iso(meta.modified().ok()),
            accessed: system_time_to_iso(meta.accessed().ok()),
        })
    }
}

fn entry_kind(path: &Path) -> EntryKind {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => EntryKind::Link,
        Ok(meta) if meta.is_dir() => EntryKind::Dir,
        Ok(meta) if meta.is_file() => EntryKind::File,
        _ => EntryKind::Unknown,
    }
}

fn walk(dir: &Path, visit: &mut impl FnMut(&Path)) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        visit(&path);
        if path.is_dir() {
            walk(&path, visit)?;
        }
    }
    Ok(())
}

/// Minimal line-by-line diff: unchanged lines are omitted, each changed
/// pair is prefixed by its 1-based line number.
fn line_diff(original: &str, current: &str) -> String {
    let mut out = Vec::new();
    for (i, (old_line, new_line)) in original.lines().zip(current.lines()).enumerate() {
        if old_line != new_line {
            out.push(format!("Line {}:", i + 1));
            out.push(format!("- {old_line}"));
            out.push(format!("+ {new_line}"));
            out.push(String::new());
        }
    }
    if out.is_empty() { "No changes".to_string() } else { out.join("\n") }
}

#[cfg(unix)]
fn permissions_string(meta: &fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    let mode = meta.permissions().mode();
    let file_type_char = if meta.is_dir() { 'd' } else if meta.file_type().is_symlink() { 'l' } else { '-' };
    let bits = [
        (mode & 0o400 != 0, 'r'), (mode & 0o200 != 0, 'w'), (mode & 0o100 != 0, 'x'),
        (mode & 0o040 != 0, 'r'), (mode & 0o020 != 0, 'w'), (mode & 0o010 != 0, 'x'),
        (mode & 0o004 != 0, 'r'), (mode & 0o002 != 0, 'w'), (mode & 0o001 != 0, 'x'),
    ];
    let rest: String = bits.iter().map(|(set, c)| if *set { *c } else { '-' }).collect();
    format!("{file_type_char}{rest}")
}

#[cfg(not(unix))]
fn permissions_string(meta: &fs::Metadata) -> String {
    let file_type_char = if meta.is_dir() { 'd' } else { '-' };
    format!("{file_type_char}{}", if meta.permissions().readonly() { "r--r--r--" } else { "rw-rw-rw-" })
}

fn system_time_to_iso(time: Option<std::time::SystemTime>) -> String {
    match time {
        Some(t) => DateTime::<Utc>::from(t).to_rfc3339(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn read_after_write_roundtrips() {
        let dir = tempdir().unwrap();
        let gw = Gateway::new(vec![dir.path().to_path_buf()]).unwrap();
        let file = dir.path().join("a.txt");
        gw.write(file.to_str().unwrap(), "hello").unwrap();
        assert_eq!(gw.read(file.to_str().unwrap()).unwrap(), "hello");
    }

    #[test]
    fn sandbox_escape_is_rejected() {
        let dir = tempdir().unwrap();
        let gw = Gateway::new(vec![dir.path().to_path_buf()]).unwrap();
        let escaping = dir.path().join("../../etc/passwd");
        let err = gw.read(escaping.to_str().unwrap());
        assert!(matches!(err, Err(FsError::PermissionDenied(_)) | Err(FsError::NotFound(_))));
    }

    #[test]
    fn dry_run_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let gw = Gateway::new(vec![dir.path().to_path_buf()]).unwrap();
        let file = dir.path().join("a.txt");
        gw.write(file.to_str().unwrap(), "alpha\nbeta\ngamma\n").unwrap();
        let ops = vec![EditOperation { old_text: "alpha".into(), new_text: "ALPHA".into() }];
        gw.edit(file.to_str().unwrap(), &ops, true).unwrap();
        assert_eq!(gw.read(file.to_str().unwrap()).unwrap(), "alpha\nbeta\ngamma\n");
    }

    #[test]
    fn edit_with_one_failed_operation() {
        let dir = tempdir().unwrap();
        let gw = Gateway::new(vec![dir.path().to_path_buf()]).unwrap();
        let file = dir.path().join("a.txt");
        gw.write(file.to_str().unwrap(), "alpha\nbeta\ngamma\n").unwrap();
        let ops = vec![
            EditOperation { old_text: "alpha".into(), new_text: "ALPHA".into() },
            EditOperation { old_text: "delta".into(), new_text: "DELTA".into() },
            EditOperation { old_text: "gamma".into(), new_text: "GAMMA".into() },
        ];
        let result = gw.edit(file.to_str().unwrap(), &ops, false).unwrap();
        assert_eq!(result.applied.len(), 2);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(gw.read(file.to_str().unwrap()).unwrap(), "ALPHA\nbeta\nGAMMA\n");
    }

    #[test]
    fn move_fails_when_destination_exists() {
        let dir = tempdir().unwrap();
        let gw = Gateway::new(vec![dir.path().to_path_buf()]).unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        gw.write(src.to_str().unwrap(), "s").unwrap();
        gw.write(dst.to_str().unwrap(), "d").unwrap();
        let err = gw.move_path(src.to_str().unwrap(), dst.to_str().unwrap());
        assert!(matches!(err, Err(FsError::AlreadyExists(_))));
    }

    #[test]
    fn mkdir_is_idempotent() {
        let dir = tempdir().unwrap();
        let gw = Gateway::new(vec![dir.path().to_path_buf()]).unwrap();
        let sub = dir.path().join("a/b/c");
        gw.mkdir(sub.to_str().unwrap()).unwrap();
        gw.mkdir(sub.to_str().unwrap()).unwrap();
        assert!(sub.is_dir());
    }
}
