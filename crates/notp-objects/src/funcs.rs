use crate::commit::Commit;
use crate::error::{ObjectError, ObjectResult};
use crate::manager::ObjectManager;
use crate::object::{Object, ObjectInstance, ObjectType};
use crate::tree::Tree;

/// Returns the code type id and the body of a native-language blob.
pub fn read_object_content_bytes(object: &Object) -> ObjectResult<(u32, Vec<u8>)> {
    let info = ObjectManager::new().get_object_info(object)?;
    let code_type_id = match info.header() {
        Some(header) if header.is_native_language() => header.code_type_id(),
        Some(_) => return Err(ObjectError::NotNativeLanguage),
        None => {
            return Err(ObjectError::UnexpectedType {
                expected: ObjectType::Blob,
                actual: info.object_type(),
            })
        }
    };
    match info.into_instance() {
        ObjectInstance::Blob(data) => Ok((code_type_id, data)),
        other => Err(ObjectError::UnexpectedType {
            expected: ObjectType::Blob,
            actual: other.object_type(),
        }),
    }
}

/// Encode `commit` as a commit object.
pub fn create_commit_object(commit: &Commit) -> ObjectResult<Object> {
    ObjectManager::new().create_commit_object(commit)
}

/// Decode a commit object, failing on any other type.
pub fn convert_object_to_commit(object: &Object) -> ObjectResult<Commit> {
    match ObjectManager::new().get_object_info(object)?.into_instance() {
        ObjectInstance::Commit(commit) => Ok(commit),
        other => Err(ObjectError::UnexpectedType {
            expected: ObjectType::Commit,
            actual: other.object_type(),
        }),
    }
}

/// Encode `tree` as a tree object.
pub fn create_tree_object(tree: &Tree) -> ObjectResult<Object> {
    ObjectManager::new().create_tree_object(tree)
}

/// Decode a tree object, failing on any other type.
pub fn convert_object_to_tree(object: &Object) -> ObjectResult<Tree> {
    match ObjectManager::new().get_object_info(object)?.into_instance() {
        ObjectInstance::Tree(tree) => Ok(tree),
        other => Err(ObjectError::UnexpectedType {
            expected: ObjectType::Tree,
            actual: other.object_type(),
        }),
    }
}
