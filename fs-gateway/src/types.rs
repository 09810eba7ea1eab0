use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryKind {
    File,
    Dir,
    Link,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsEntry {
    pub name: String,
    pub kind: EntryKind,
    pub absolute_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub name: String,
    pub size: u64,
    pub kind: EntryKind,
    pub permissions: String,
    pub created: String,
    pub modified: String,
    pub accessed: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditOperation {
    pub old_text: String,
    pub new_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedEdit {
    pub operation: EditOperation,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditResult {
    pub path: String,
    pub applied: Vec<EditOperation>,
    pub failed: Vec<FailedEdit>,
    pub diff: String,
    pub original_size: u64,
    pub new_size: u64,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResult {
    pub path: String,
    pub size: u64,
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadManyEntry {
    pub content: Option<String>,
    pub error: Option<String>,
}
