use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use tracing::debug;

use crate::commit::{Commit, CommitMetaData};
use crate::error::{ObjectError, ObjectResult};
use crate::object::{
    Object, ObjectHeader, ObjectInfo, ObjectInstance, ObjectType, OBJECT_NULL_BYTE, ZERO_OID,
};
use crate::store::ObjectResolver;
use crate::tree::{Tree, TreeEntry};

/// Creates, encodes and decodes commit, tree and blob objects.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjectManager;

fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse `"<rfc3339> <name>"`.
fn parse_identity(line: &str) -> ObjectResult<(String, DateTime<FixedOffset>)> {
    let (date, name) = line
        .trim()
        .split_once(' ')
        .ok_or_else(|| ObjectError::InvalidFormat(format!("invalid identity line: {line}")))?;
    let ts = DateTime::parse_from_rfc3339(date)
        .map_err(|e| ObjectError::InvalidFormat(format!("invalid timestamp {date}: {e}")))?;
    Ok((name.trim().to_string(), ts))
}

/// Sequential reader over a blob header.
struct BlobCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BlobCursor<'a> {
    fn take(&mut self, n: usize, what: &str) -> ObjectResult<&'a [u8]> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(ObjectError::InvalidFormat(format!("failed to read {what}")));
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_u16(&mut self, what: &str) -> ObjectResult<u16> {
        let raw = self.take(2, what)?;
        Ok(u16::from_be_bytes([raw[0], raw[1]]))
    }

    fn read_u32(&mut self, what: &str) -> ObjectResult<u32> {
        let raw = self.take(4, what)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn read_string(&mut self, what: &str) -> ObjectResult<&'a [u8]> {
        let len = self.read_u16(what)?;
        self.take(usize::from(len), what)
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

fn utf8(bytes: Vec<u8>, what: &str) -> ObjectResult<String> {
    String::from_utf8(bytes)
        .map_err(|_| ObjectError::InvalidFormat(format!("{what} is not valid utf-8")))
}

fn length_prefix(len: usize, what: &'static str) -> ObjectResult<[u8; 2]> {
    u16::try_from(len)
        .map(u16::to_be_bytes)
        .map_err(|_| ObjectError::FieldTooLong { what, len })
}

impl ObjectManager {
    /// Create a manager.
    pub fn new() -> Self {
        Self
    }

    /// Prefix `content` with `"<type> <len>"` and the null byte, then hash.
    fn create_object(&self, otype: ObjectType, content: &[u8]) -> ObjectResult<Object> {
        let header = format!("{} {}", otype, content.len());
        let mut buf = Vec::with_capacity(header.len() + 1 + content.len());
        buf.extend_from_slice(header.as_bytes());
        buf.push(OBJECT_NULL_BYTE);
        buf.extend_from_slice(content);
        Object::new(buf)
    }

    /// Wrap the serialized commit in a `"commit <len>"` object.
    pub fn create_commit_object(&self, commit: &Commit) -> ObjectResult<Object> {
        self.create_object(ObjectType::Commit, &self.serialize_commit(commit))
    }

    /// Wrap the serialized tree in a `"tree <len>"` object.
    pub fn create_tree_object(&self, tree: &Tree) -> ObjectResult<Object> {
        let data = self.serialize_tree(tree);
        if data.is_empty() {
            return Err(ObjectError::MissingContent);
        }
        self.create_object(ObjectType::Tree, &data)
    }

    /// Wrap the header and body in a `"blob <len>"` object.
    pub fn create_blob_object(&self, header: &ObjectHeader, data: &[u8]) -> ObjectResult<Object> {
        if data.is_empty() {
            return Err(ObjectError::MissingContent);
        }
        let body = self.serialize_blob(header, data)?;
        self.create_object(ObjectType::Blob, &body)
    }

    /// Rebuild an object from its raw content; the OID is recomputed.
    pub fn deserialize_object_from_bytes(&self, data: &[u8]) -> ObjectResult<Object> {
        Object::new(data.to_vec())
    }

    /// Text form: `tree`, `parent`, `author`, `committer` lines, then the message.
    pub fn serialize_commit(&self, commit: &Commit) -> Vec<u8> {
        let meta = commit.meta_data();
        format!(
            "tree {}\nparent {}\nauthor {} {}\ncommitter {} {}\n{}",
            commit.tree(),
            commit.parent(),
            format_timestamp(&meta.author_timestamp()),
            meta.author(),
            format_timestamp(&meta.committer_timestamp()),
            meta.committer(),
            commit.message(),
        )
        .into_bytes()
    }

    /// Line-prefix driven. `tree` and `parent` must come before the identity
    /// lines; everything after the `committer` line is the message.
    pub fn deserialize_commit(&self, data: &[u8]) -> ObjectResult<Commit> {
        let text = std::str::from_utf8(data)
            .map_err(|_| ObjectError::InvalidFormat("commit is not valid utf-8".into()))?;
        let mut tree = None;
        let mut parent = None;
        let mut author = None;
        let mut committer = None;
        let mut lines = text.split('\n');
        for line in lines.by_ref() {
            if let Some(value) = line.strip_prefix("tree ") {
                tree = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("parent ") {
                parent = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("author ") {
                if tree.is_none() || parent.is_none() {
                    return Err(ObjectError::InvalidFormat(
                        "author line before tree and parent".into(),
                    ));
                }
                author = Some(parse_identity(value)?);
            } else if let Some(value) = line.strip_prefix("committer ") {
                if tree.is_none() || parent.is_none() {
                    return Err(ObjectError::InvalidFormat(
                        "committer line before tree and parent".into(),
                    ));
                }
                committer = Some(parse_identity(value)?);
                break;
            }
        }
        let message = lines.collect::<Vec<_>>().join("\n");

        let missing = |what: &str| ObjectError::InvalidFormat(format!("commit has no {what} line"));
        let tree = tree.ok_or_else(|| missing("tree"))?;
        let parent = parent.ok_or_else(|| missing("parent"))?;
        let (author, author_timestamp) = author.ok_or_else(|| missing("author"))?;
        let (committer, committer_timestamp) = committer.ok_or_else(|| missing("committer"))?;
        Ok(Commit::from_parts(
            tree,
            parent,
            CommitMetaData::from_parts(author, author_timestamp, committer, committer_timestamp),
            message,
        ))
    }

    /// One line per entry, sorted by OID, no trailing newline.
    pub fn serialize_tree(&self, tree: &Tree) -> Vec<u8> {
        let mut entries: Vec<&TreeEntry> = tree.entries().iter().collect();
        entries.sort_by(|a, b| a.oid().cmp(b.oid()));
        entries
            .iter()
            .map(|e| {
                format!(
                    "{} {} {} {} {} {} {} {} {}",
                    e.otype(),
                    e.partition(),
                    e.oid(),
                    e.name(),
                    e.code_id(),
                    e.code_type(),
                    e.language(),
                    e.language_version(),
                    e.language_type(),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
            .into_bytes()
    }

    /// Parse one space-separated entry per line. Entries are validated as on construction.
    pub fn deserialize_tree(&self, data: &[u8]) -> ObjectResult<Tree> {
        let text = std::str::from_utf8(data)
            .map_err(|_| ObjectError::InvalidFormat("tree is not valid utf-8".into()))?;
        let mut tree = Tree::new();
        for line in text.trim().split('\n') {
            let parts: Vec<&str> = line.splitn(9, ' ').collect();
            let Ok([otype, partition, oid, name, code_id, code_type, language, version, ltype]) =
                <[&str; 9]>::try_from(parts)
            else {
                return Err(ObjectError::InvalidFormat(format!(
                    "invalid tree entry: {line}"
                )));
            };
            tree.add_entry(TreeEntry::new(
                partition, otype, oid, name, code_id, code_type, language, version, ltype,
            )?)?;
        }
        Ok(tree)
    }

    /// Binary blob layout:
    ///
    /// ```text
    /// u16 len | partition | bool native | u32 language | u32 version
    /// | u32 language type | u32 code type | u16 len | base64(code id) | 0xFF | data
    /// ```
    pub fn serialize_blob(&self, header: &ObjectHeader, data: &[u8]) -> ObjectResult<Vec<u8>> {
        let partition = header.partition().as_bytes();
        let code_id = STANDARD.encode(header.code_id());
        let mut buf = Vec::with_capacity(2 + partition.len() + 19 + code_id.len() + 1 + data.len());
        buf.extend_from_slice(&length_prefix(partition.len(), "partition")?);
        buf.extend_from_slice(partition);
        buf.push(u8::from(header.is_native_language()));
        buf.extend_from_slice(&header.language_id().to_be_bytes());
        buf.extend_from_slice(&header.language_version_id().to_be_bytes());
        buf.extend_from_slice(&header.language_type_id().to_be_bytes());
        buf.extend_from_slice(&header.code_type_id().to_be_bytes());
        buf.extend_from_slice(&length_prefix(code_id.len(), "code id")?);
        buf.extend_from_slice(code_id.as_bytes());
        buf.push(OBJECT_NULL_BYTE);
        buf.extend_from_slice(data);
        Ok(buf)
    }

    /// Split a blob into its header and body.
    pub fn deserialize_blob(&self, data: &[u8]) -> ObjectResult<(ObjectHeader, Vec<u8>)> {
        if data.is_empty() {
            return Err(ObjectError::InvalidFormat(
                "data is too short to contain an object header".into(),
            ));
        }
        let mut cursor = BlobCursor { data, pos: 0 };
        let partition = utf8(cursor.read_string("partition")?.to_vec(), "partition")?;
        let is_native_language = cursor.take(1, "native language flag")?[0] != 0;
        let language_id = cursor.read_u32("language id")?;
        let language_version_id = cursor.read_u32("language version id")?;
        let language_type_id = cursor.read_u32("language type id")?;
        let code_type_id = cursor.read_u32("code type id")?;
        let code_id = utf8(STANDARD.decode(cursor.read_string("code id")?)?, "code id")?;
        if cursor.take(1, "header delimiter")?[0] != OBJECT_NULL_BYTE {
            return Err(ObjectError::InvalidFormat(
                "null packet delimiter not found".into(),
            ));
        }
        let header = ObjectHeader::new(
            partition,
            is_native_language,
            language_id,
            language_version_id,
            language_type_id,
            code_id,
            code_type_id,
        );
        Ok((header, cursor.rest().to_vec()))
    }

    /// Split an object into its type and body.
    pub fn get_instance_bytes<'a>(
        &self,
        object: &'a Object,
    ) -> ObjectResult<(ObjectType, &'a [u8])> {
        let content = object.content();
        let index = content
            .iter()
            .position(|b| *b == OBJECT_NULL_BYTE)
            .ok_or_else(|| ObjectError::InvalidFormat("no null separator found".into()))?;
        let header = std::str::from_utf8(&content[..index])
            .map_err(|_| ObjectError::InvalidFormat("object header is not valid utf-8".into()))?;
        let (otype, length) = header
            .split_once(' ')
            .ok_or_else(|| ObjectError::InvalidFormat(format!("invalid object header: {header}")))?;
        let otype: ObjectType = otype.parse()?;
        let expected: usize = length
            .parse()
            .map_err(|_| ObjectError::InvalidFormat(format!("invalid length: {length}")))?;
        let body = &content[index + 1..];
        if body.len() != expected {
            return Err(ObjectError::LengthMismatch {
                expected,
                actual: body.len(),
            });
        }
        Ok((otype, body))
    }

    /// Decode `object` into its type, header and typed instance.
    pub fn get_object_info(&self, object: &Object) -> ObjectResult<ObjectInfo> {
        let (otype, body) = self.get_instance_bytes(object)?;
        let (header, instance) = match otype {
            ObjectType::Commit => (None, ObjectInstance::Commit(self.deserialize_commit(body)?)),
            ObjectType::Tree => (None, ObjectInstance::Tree(self.deserialize_tree(body)?)),
            ObjectType::Blob => {
                let (header, data) = self.deserialize_blob(body)?;
                (Some(header), ObjectInstance::Blob(data))
            }
        };
        Ok(ObjectInfo::new(header, object.clone(), body.to_vec(), instance))
    }

    /// Walk parent links from `from` back to `to` (or the zero OID).
    ///
    /// Returns whether `to` was reached and the visited commits, newest
    /// first unless `reverse` is set. A `None` from the resolver ends the
    /// walk without a match.
    pub fn build_commit_history(
        &self,
        from: &str,
        to: &str,
        reverse: bool,
        resolver: &dyn ObjectResolver,
    ) -> ObjectResult<(bool, Vec<Commit>)> {
        if from == ZERO_OID && to != ZERO_OID {
            return Err(ObjectError::InvalidRange(format!(
                "cannot walk from the zero commit to {to}"
            )));
        }
        let mut history = Vec::new();
        let mut matched = false;
        let mut current = from.to_string();
        loop {
            if current == ZERO_OID {
                matched = to == ZERO_OID;
                break;
            }
            let Some(object) = resolver.resolve(&current)? else {
                break;
            };
            let commit = match self.get_object_info(&object)?.into_instance() {
                ObjectInstance::Commit(commit) => commit,
                other => {
                    return Err(ObjectError::UnexpectedType {
                        expected: ObjectType::Commit,
                        actual: other.object_type(),
                    })
                }
            };
            debug!(oid = %current, parent = %commit.parent(), "commit history step");
            let parent = commit.parent().to_string();
            history.push(commit);
            if object.oid() == to {
                matched = true;
                break;
            }
            current = parent;
        }
        if reverse {
            history.reverse();
        }
        Ok((matched, history))
    }
}
