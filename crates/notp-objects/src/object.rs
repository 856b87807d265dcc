use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::commit::Commit;
use crate::error::{ObjectError, ObjectResult};
use crate::tree::Tree;

/// The reserved "no object" OID.
pub const ZERO_OID: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Separator between an object's text header and its body.
pub const OBJECT_NULL_BYTE: u8 = 0xFF;

/// The three object kinds carried by the protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Commit,
    Tree,
    Blob,
}

impl ObjectType {
    /// Type tag used in the object header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Tree => "tree",
            Self::Blob => "blob",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = ObjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commit" => Ok(Self::Commit),
            "tree" => Ok(Self::Tree),
            "blob" => Ok(Self::Blob),
            other => Err(ObjectError::UnsupportedType(other.to_string())),
        }
    }
}

/// Hex-encoded SHA-256 of `content`.
pub fn compute_oid(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// An immutable content-addressed blob of bytes.
///
/// The OID is always computed from the content and can never be supplied
/// from outside, so `oid == sha256(content)` holds for every instance.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Object {
    oid: String,
    content: Vec<u8>,
}

impl Object {
    /// Build an object from non-empty content; the OID is its SHA-256.
    pub fn new(content: impl Into<Vec<u8>>) -> ObjectResult<Self> {
        let content = content.into();
        if content.is_empty() {
            return Err(ObjectError::MissingContent);
        }
        Ok(Self {
            oid: compute_oid(&content),
            content,
        })
    }

    /// Hex SHA-256 of the content.
    pub fn oid(&self) -> &str {
        &self.oid
    }

    /// Raw content, header included.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Consume the object and return its content.
    pub fn into_content(self) -> Vec<u8> {
        self.content
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("oid", &self.oid)
            .field("len", &self.content.len())
            .finish()
    }
}

/// Language and code metadata stored in front of a blob body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectHeader {
    partition: String,
    is_native_language: bool,
    language_id: u32,
    language_version_id: u32,
    language_type_id: u32,
    code_id: String,
    code_type_id: u32,
}

impl ObjectHeader {
    /// Create a blob header.
    pub fn new(
        partition: impl Into<String>,
        is_native_language: bool,
        language_id: u32,
        language_version_id: u32,
        language_type_id: u32,
        code_id: impl Into<String>,
        code_type_id: u32,
    ) -> Self {
        Self {
            partition: partition.into(),
            is_native_language,
            language_id,
            language_version_id,
            language_type_id,
            code_id: code_id.into(),
            code_type_id,
        }
    }

    /// Partition the blob belongs to.
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// `true` when the body is written in the native language.
    pub fn is_native_language(&self) -> bool {
        self.is_native_language
    }

    /// Language identifier.
    pub fn language_id(&self) -> u32 {
        self.language_id
    }

    /// Language version identifier.
    pub fn language_version_id(&self) -> u32 {
        self.language_version_id
    }

    /// Language type identifier.
    pub fn language_type_id(&self) -> u32 {
        self.language_type_id
    }

    /// Identifier of the code the blob holds.
    pub fn code_id(&self) -> &str {
        &self.code_id
    }

    /// Code type identifier.
    pub fn code_type_id(&self) -> u32 {
        self.code_type_id
    }
}

/// Decoded body of an object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObjectInstance {
    Commit(Commit),
    Tree(Tree),
    Blob(Vec<u8>),
}

impl ObjectInstance {
    /// Type of the decoded body.
    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Commit(_) => ObjectType::Commit,
            Self::Tree(_) => ObjectType::Tree,
            Self::Blob(_) => ObjectType::Blob,
        }
    }
}

/// Decoded view of an [`Object`]. Only blobs carry a header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    header: Option<ObjectHeader>,
    object: Object,
    instance_bytes: Vec<u8>,
    instance: ObjectInstance,
}

impl ObjectInfo {
    pub(crate) fn new(
        header: Option<ObjectHeader>,
        object: Object,
        instance_bytes: Vec<u8>,
        instance: ObjectInstance,
    ) -> Self {
        Self {
            header,
            object,
            instance_bytes,
            instance,
        }
    }

    /// OID of the underlying object.
    pub fn oid(&self) -> &str {
        self.object.oid()
    }

    /// Blob header, `None` for commits and trees.
    pub fn header(&self) -> Option<&ObjectHeader> {
        self.header.as_ref()
    }

    /// The object this view was decoded from.
    pub fn object(&self) -> &Object {
        &self.object
    }

    /// Type of the decoded object.
    pub fn object_type(&self) -> ObjectType {
        self.instance.object_type()
    }

    /// The body that follows the `"<type> <len>"` header.
    pub fn instance_bytes(&self) -> &[u8] {
        &self.instance_bytes
    }

    /// Typed body.
    pub fn instance(&self) -> &ObjectInstance {
        &self.instance
    }

    /// Consume the view and return the typed body.
    pub fn into_instance(self) -> ObjectInstance {
        self.instance
    }
}
