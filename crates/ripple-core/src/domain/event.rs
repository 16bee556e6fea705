//! Inbound pull-request events and their change sets.

use std::collections::BTreeMap;

use ripple_state::RepoId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::error::{PipelineError, PipelineResult};

/// How a file was touched by a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl ChangeKind {
    /// Map a GitHub file `status` onto a change kind.
    ///
    /// `copied` counts as an addition; `renamed` and `changed` as
    /// modifications.
    pub fn from_github_status(status: &str) -> Self {
        match status {
            "added" | "copied" => ChangeKind::Added,
            "removed" => ChangeKind::Removed,
            _ => ChangeKind::Modified,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a [`ChangeSet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    pub kind: ChangeKind,
    #[serde(default)]
    pub additions: u32,
    #[serde(default)]
    pub deletions: u32,
    /// Unified diff hunk(s) for this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

impl ChangedFile {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            additions: 0,
            deletions: 0,
            patch: None,
        }
    }

    pub fn with_stats(mut self, additions: u32, deletions: u32) -> Self {
        self.additions = additions;
        self.deletions = deletions;
        self
    }

    /// Attach a patch and derive line counts from it.
    pub fn with_patch(mut self, patch: impl Into<String>) -> Self {
        let patch = patch.into();
        self.additions = count_lines(&patch, '+', "+++");
        self.deletions = count_lines(&patch, '-', "---");
        self.patch = Some(patch);
        self
    }

    /// Parse one element of GitHub's "list pull request files" response.
    pub fn from_github_file(value: &Value) -> PipelineResult<Self> {
        let path = value
            .get("filename")
            .and_then(Value::as_str)
            .ok_or_else(|| PipelineError::InvalidEvent("file entry without filename".into()))?;
        let status = value
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("modified");
        let count = |field: &str| {
            value
                .get(field)
                .and_then(Value::as_u64)
                .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
                .unwrap_or(0)
        };
        Ok(Self {
            path: path.to_string(),
            kind: ChangeKind::from_github_status(status),
            additions: count("additions"),
            deletions: count("deletions"),
            patch: value.get("patch").and_then(Value::as_str).map(str::to_string),
        })
    }
}

fn count_lines(patch: &str, marker: char, header: &str) -> u32 {
    let n = patch
        .lines()
        .filter(|l| l.starts_with(marker) && !l.starts_with(header))
        .count();
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// The files touched by a pull request, ordered by path.
///
/// Duplicate paths are collapsed on construction; the last entry wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ChangedFile>", into = "Vec<ChangedFile>")]
pub struct ChangeSet {
    files: Vec<ChangedFile>,
}

impl ChangeSet {
    pub fn new(files: impl IntoIterator<Item = ChangedFile>) -> Self {
        let mut by_path = BTreeMap::new();
        for file in files {
            by_path.insert(file.path.clone(), file);
        }
        Self {
            files: by_path.into_values().collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[ChangedFile] {
        &self.files
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl From<Vec<ChangedFile>> for ChangeSet {
    fn from(files: Vec<ChangedFile>) -> Self {
        ChangeSet::new(files)
    }
}

impl From<ChangeSet> for Vec<ChangedFile> {
    fn from(set: ChangeSet) -> Self {
        set.files
    }
}

/// Descriptive pull-request fields used for the context header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,
}

impl PrMetadata {
    /// Render as the low-priority context header.
    pub fn render(&self) -> String {
        let mut out = format!("Pull request: {}\n", self.title);
        if let Some(author) = &self.author {
            out.push_str(&format!("Author: {}\n", author));
        }
        match (&self.head_ref, &self.base_ref) {
            (Some(head), Some(base)) => out.push_str(&format!("Branch: {} -> {}\n", head, base)),
            (Some(head), None) => out.push_str(&format!("Branch: {}\n", head)),
            _ => {}
        }
        if let Some(url) = &self.html_url {
            out.push_str(&format!("URL: {}\n", url));
        }
        out
    }
}

/// A pull-request event handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrEvent {
    pub repo: RepoId,
    pub pr_id: u64,
    pub commit_sha: String,
    #[serde(default)]
    pub change_set: ChangeSet,
    /// Deduplication key for this delivery
    pub delivery_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PrMetadata>,
}

impl PrEvent {
    pub fn new(
        repo: impl Into<RepoId>,
        pr_id: u64,
        commit_sha: impl Into<String>,
        change_set: ChangeSet,
        delivery_id: impl Into<String>,
    ) -> Self {
        Self {
            repo: repo.into(),
            pr_id,
            commit_sha: commit_sha.into(),
            change_set,
            delivery_id: delivery_id.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: PrMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Key shared by every event of the same pull request.
    pub fn pr_key(&self) -> String {
        format!("{}#{}", self.repo, self.pr_id)
    }

    /// Reject events missing any identifying field.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.repo.as_str().trim().is_empty() {
            return Err(PipelineError::InvalidEvent("repo must not be empty".into()));
        }
        if self.pr_id == 0 {
            return Err(PipelineError::InvalidEvent("pr_id must be positive".into()));
        }
        if self.commit_sha.trim().is_empty() {
            return Err(PipelineError::InvalidEvent("commit_sha must not be empty".into()));
        }
        if self.delivery_id.trim().is_empty() {
            return Err(PipelineError::InvalidEvent("delivery_id must not be empty".into()));
        }
        Ok(())
    }

    /// Build an event from a GitHub `pull_request` webhook body.
    ///
    /// The delivery id normally comes from the `X-GitHub-Delivery` header;
    /// when absent, a stable id is derived from repo, PR number and head sha
    /// so redelivering the same payload stays idempotent.
    pub fn from_pull_request_payload(
        payload: &Value,
        delivery_id: Option<&str>,
        files: Vec<ChangedFile>,
    ) -> PipelineResult<Self> {
        let pr = payload
            .get("pull_request")
            .ok_or_else(|| PipelineError::InvalidEvent("payload has no pull_request".into()))?;
        let repo = payload
            .pointer("/repository/full_name")
            .and_then(Value::as_str)
            .ok_or_else(|| PipelineError::InvalidEvent("missing repository.full_name".into()))?;
        let pr_id = pr
            .get("number")
            .or_else(|| payload.get("number"))
            .and_then(Value::as_u64)
            .ok_or_else(|| PipelineError::InvalidEvent("missing pull_request.number".into()))?;
        let commit_sha = pr
            .pointer("/head/sha")
            .and_then(Value::as_str)
            .ok_or_else(|| PipelineError::InvalidEvent("missing pull_request.head.sha".into()))?;

        let text = |ptr: &str| pr.pointer(ptr).and_then(Value::as_str).map(str::to_string);
        let metadata = PrMetadata {
            title: text("/title").unwrap_or_default(),
            author: text("/user/login"),
            base_ref: text("/base/ref"),
            head_ref: text("/head/ref"),
            html_url: text("/html_url"),
        };

        let delivery_id = match delivery_id {
            Some(id) => id.to_string(),
            None => derived_delivery_id(repo, pr_id, commit_sha),
        };

        let event = PrEvent::new(repo, pr_id, commit_sha, ChangeSet::new(files), delivery_id)
            .with_metadata(metadata);
        event.validate()?;
        Ok(event)
    }
}

fn derived_delivery_id(repo: &str, pr_id: u64, sha: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}#{}@{}", repo, pr_id, sha).as_bytes());
    format!("derived-{}", &hex::encode(hasher.finalize())[..32])
}
