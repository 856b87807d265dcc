//! Content-addressed object model exchanged by NOTP peers.
//!
//! Every [`Object`] is identified by the SHA-256 of its content. Three kinds
//! are layered on top:
//!
//! - [`Commit`] -- a point-in-time state: root tree, parent commit, identities
//! - [`Tree`] -- a snapshot of named entries pointing at other objects
//! - blob -- raw bytes behind a binary [`ObjectHeader`]
//!
//! [`ObjectManager`] builds objects as `"<type> <len>" 0xFF <body>`, decodes
//! them back into an [`ObjectInfo`], and walks commit history through an
//! [`ObjectResolver`].

pub mod commit;
pub mod error;
pub mod funcs;
pub mod manager;
pub mod object;
pub mod sections;
pub mod store;
pub mod tree;

pub use commit::{Commit, CommitMetaData};
pub use error::{ObjectError, ObjectResult};
pub use funcs::{
    convert_object_to_commit, convert_object_to_tree, create_commit_object, create_tree_object,
    read_object_content_bytes,
};
pub use manager::ObjectManager;
pub use object::{
    compute_oid, Object, ObjectHeader, ObjectInfo, ObjectInstance, ObjectType, OBJECT_NULL_BYTE,
    ZERO_OID,
};
pub use sections::{MultiSectionsObject, Section, SectionMetadata, SectionObject};
pub use store::{InMemoryObjectStore, ObjectResolver};
pub use tree::{Tree, TreeEntry};
