use chrono::{DateTime, FixedOffset, Local, SubsecRound};
use serde::{Deserialize, Serialize};

use crate::error::{ObjectError, ObjectResult};

const UNKNOWN_IDENTITY: &str = "unknown";

/// Who made a commit and when.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMetaData {
    author: String,
    author_timestamp: DateTime<FixedOffset>,
    committer: String,
    committer_timestamp: DateTime<FixedOffset>,
}

impl CommitMetaData {
    /// Identity of the author.
    pub fn author(&self) -> &str {
        &self.author
    }

    /// When the change was authored, to the second.
    pub fn author_timestamp(&self) -> DateTime<FixedOffset> {
        self.author_timestamp
    }

    /// Identity of the committer.
    pub fn committer(&self) -> &str {
        &self.committer
    }

    /// When the commit was made, to the second.
    pub fn committer_timestamp(&self) -> DateTime<FixedOffset> {
        self.committer_timestamp
    }
}

/// A point-in-time state: a root tree plus its parent commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    tree: String,
    parent: String,
    meta_data: CommitMetaData,
    message: String,
}

fn identity_or_unknown(value: String) -> String {
    match value.trim() {
        "" => UNKNOWN_IDENTITY.to_string(),
        trimmed => trimmed.to_string(),
    }
}

impl Commit {
    /// Blank identities become `"unknown"`; missing timestamps become now.
    ///
    /// Ids and identities are trimmed and timestamps truncated to whole
    /// seconds, matching what the encoded form can carry.
    pub fn new(
        tree: impl Into<String>,
        parent: impl Into<String>,
        author: impl Into<String>,
        author_timestamp: Option<DateTime<FixedOffset>>,
        committer: impl Into<String>,
        committer_timestamp: Option<DateTime<FixedOffset>>,
        message: impl Into<String>,
    ) -> ObjectResult<Self> {
        let tree = tree.into().trim().to_string();
        let parent = parent.into().trim().to_string();
        if tree.is_empty() {
            return Err(ObjectError::EmptyField("tree"));
        }
        if parent.is_empty() {
            return Err(ObjectError::EmptyField("parent commit id"));
        }
        let author = identity_or_unknown(author.into());
        let committer = identity_or_unknown(committer.into());
        if author.contains('\n') {
            return Err(ObjectError::InvalidField("author"));
        }
        if committer.contains('\n') {
            return Err(ObjectError::InvalidField("committer"));
        }
        let now = Local::now().fixed_offset();
        Ok(Self {
            tree,
            parent,
            meta_data: CommitMetaData {
                author,
                author_timestamp: author_timestamp.unwrap_or(now).trunc_subsecs(0),
                committer,
                committer_timestamp: committer_timestamp.unwrap_or(now).trunc_subsecs(0),
            },
            message: message.into(),
        })
    }

    pub(crate) fn from_parts(
        tree: String,
        parent: String,
        meta_data: CommitMetaData,
        message: String,
    ) -> Self {
        Self {
            tree,
            parent,
            meta_data,
            message,
        }
    }

    /// OID of the root tree.
    pub fn tree(&self) -> &str {
        &self.tree
    }

    /// OID of the parent commit; the zero OID for a root commit.
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Author and committer metadata.
    pub fn meta_data(&self) -> &CommitMetaData {
        &self.meta_data
    }

    /// Free-form commit message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl CommitMetaData {
    pub(crate) fn from_parts(
        author: String,
        author_timestamp: DateTime<FixedOffset>,
        committer: String,
        committer_timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            author,
            author_timestamp,
            committer,
            committer_timestamp,
        }
    }
}
