use crate::error::{ObjectError, ObjectResult};
use crate::object::{Object, ObjectType};
use crate::tree::TreeEntry;

/// Metadata describing where a section object came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionMetadata {
    pub partition: String,
    pub otype: ObjectType,
    pub name: String,
    pub code_id: String,
    pub code_type: String,
    pub language: String,
    pub language_version: String,
    pub language_type: String,
}

/// One successfully built section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionObject {
    object: Object,
    section: usize,
    metadata: SectionMetadata,
}

impl SectionObject {
    /// Create a section from its object and metadata.
    pub fn new(object: Object, section: usize, metadata: SectionMetadata) -> Self {
        Self {
            object,
            section,
            metadata,
        }
    }

    /// The built object.
    pub fn object(&self) -> &Object {
        &self.object
    }

    /// Index of the section within its source.
    pub fn section(&self) -> usize {
        self.section
    }

    /// Where the section came from.
    pub fn metadata(&self) -> &SectionMetadata {
        &self.metadata
    }

    /// Tree entry pointing at this section's object.
    pub fn to_tree_entry(&self) -> ObjectResult<TreeEntry> {
        let m = &self.metadata;
        TreeEntry::new(
            m.partition.as_str(),
            m.otype.as_str(),
            self.object.oid(),
            m.name.as_str(),
            m.code_id.as_str(),
            m.code_type.as_str(),
            m.language.as_str(),
            m.language_version.as_str(),
            m.language_type.as_str(),
        )
    }
}

/// A section is either a built object or the error that prevented it.
#[derive(Debug)]
pub enum Section {
    Object(SectionObject),
    Failed { section: usize, error: ObjectError },
}

impl Section {
    /// Index of the section in its source.
    pub fn section(&self) -> usize {
        match self {
            Self::Object(obj) => obj.section(),
            Self::Failed { section, .. } => *section,
        }
    }
}

/// All sections discovered in one source path.
///
/// A failing section does not fail the whole source; the aggregate error is
/// reserved for failures that affect the source as a whole.
#[derive(Debug)]
pub struct MultiSectionsObject {
    path: String,
    sections: Vec<Section>,
    number_of_sections: usize,
    error: Option<ObjectError>,
}

impl MultiSectionsObject {
    /// Start an empty collection for `path`. `error` records a source-level failure.
    pub fn new(path: impl Into<String>, number_of_sections: usize, error: Option<ObjectError>) -> Self {
        Self {
            path: path.into(),
            sections: Vec::new(),
            number_of_sections,
            error,
        }
    }

    /// Source path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of sections the source declared.
    pub fn number_of_sections(&self) -> usize {
        self.number_of_sections
    }

    /// Source-level failure, if any.
    pub fn error(&self) -> Option<&ObjectError> {
        self.error.as_ref()
    }

    /// All sections in insertion order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Record a built section.
    pub fn add_section_object(&mut self, object: SectionObject) {
        self.sections.push(Section::Object(object));
    }

    /// Record a built section from its parts.
    pub fn add_section_object_with_params(
        &mut self,
        object: Object,
        section: usize,
        metadata: SectionMetadata,
    ) {
        self.add_section_object(SectionObject::new(object, section, metadata));
    }

    /// Record a section that failed to build.
    pub fn add_section_error(&mut self, section: usize, error: ObjectError) {
        self.sections.push(Section::Failed { section, error });
    }

    /// Sections that produced an object.
    pub fn objects(&self) -> impl Iterator<Item = &SectionObject> {
        self.sections.iter().filter_map(|s| match s {
            Section::Object(obj) => Some(obj),
            Section::Failed { .. } => None,
        })
    }

    /// Sections that failed, with their index.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &ObjectError)> {
        self.sections.iter().filter_map(|s| match s {
            Section::Failed { section, error } => Some((*section, error)),
            Section::Object(_) => None,
        })
    }

    /// `true` when neither the source nor any section failed.
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.failures().next().is_none()
    }
}
