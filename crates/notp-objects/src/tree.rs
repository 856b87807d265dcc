use serde::{Deserialize, Serialize};

use crate::error::{ObjectError, ObjectResult};

/// One named member of a [`Tree`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeEntry {
    partition: String,
    otype: String,
    oid: String,
    name: String,
    code_id: String,
    code_type: String,
    language: String,
    language_version: String,
    language_type: String,
}

fn required(value: impl Into<String>, what: &'static str) -> ObjectResult<String> {
    let value = value.into();
    if value.trim().is_empty() {
        return Err(ObjectError::EmptyField(what));
    }
    // Tree lines are space separated.
    if value.chars().any(char::is_whitespace) {
        return Err(ObjectError::InvalidField(what));
    }
    Ok(value)
}

impl TreeEntry {
    /// Every field is required and must be free of whitespace.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        partition: impl Into<String>,
        otype: impl Into<String>,
        oid: impl Into<String>,
        name: impl Into<String>,
        code_id: impl Into<String>,
        code_type: impl Into<String>,
        language: impl Into<String>,
        language_version: impl Into<String>,
        language_type: impl Into<String>,
    ) -> ObjectResult<Self> {
        Ok(Self {
            partition: required(partition, "partition")?,
            otype: required(otype, "object type")?,
            oid: required(oid, "object id")?,
            name: required(name, "object name")?,
            code_id: required(code_id, "code id")?,
            code_type: required(code_type, "code type")?,
            language: required(language, "language")?,
            language_version: required(language_version, "language version")?,
            language_type: required(language_type, "language type")?,
        })
    }

    /// Partition of the referenced object.
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Type of the referenced object.
    pub fn otype(&self) -> &str {
        &self.otype
    }

    /// OID of the referenced object.
    pub fn oid(&self) -> &str {
        &self.oid
    }

    /// Entry name, unique within the tree.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code_id(&self) -> &str {
        &self.code_id
    }

    pub fn code_type(&self) -> &str {
        &self.code_type
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn language_version(&self) -> &str {
        &self.language_version
    }

    pub fn language_type(&self) -> &str {
        &self.language_type
    }
}

/// Snapshot of named entries, unique by name and by `(code_id, code_type)`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `entry`; on a duplicate the tree is left unchanged.
    pub fn add_entry(&mut self, entry: TreeEntry) -> ObjectResult<()> {
        let duplicate = self.entries.iter().any(|e| {
            e.name == entry.name || (e.code_id == entry.code_id && e.code_type == entry.code_type)
        });
        if duplicate {
            return Err(ObjectError::DuplicateEntry(entry.name));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// Entry named `name`.
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
