use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Scalar text fields of the registration form, named as they appear on the wire.
///
/// `sameAsResidential` and `files` have dedicated transitions and are not reachable through
/// [`FormState::set_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormField {
    FirstName,
    LastName,
    Email,
    Dob,
    ResidentialAddress1,
    ResidentialAddress2,
    PermanentAddress1,
    PermanentAddress2,
}

impl FormField {
    pub const ALL: [Self; 8] = [
        Self::FirstName,
        Self::LastName,
        Self::Email,
        Self::Dob,
        Self::ResidentialAddress1,
        Self::ResidentialAddress2,
        Self::PermanentAddress1,
        Self::PermanentAddress2,
    ];

    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::Email => "email",
            Self::Dob => "dob",
            Self::ResidentialAddress1 => "residentialAddress1",
            Self::ResidentialAddress2 => "residentialAddress2",
            Self::PermanentAddress1 => "permanentAddress1",
            Self::PermanentAddress2 => "permanentAddress2",
        }
    }

    /// Human label used in validation messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FirstName => "First name",
            Self::LastName => "Last name",
            Self::Email => "E-mail",
            Self::Dob => "Date of birth",
            Self::ResidentialAddress1 => "Residential street 1",
            Self::ResidentialAddress2 => "Residential street 2",
            Self::PermanentAddress1 => "Permanent street 1",
            Self::PermanentAddress2 => "Permanent street 2",
        }
    }

    #[must_use]
    pub const fn is_residential_address(self) -> bool {
        matches!(self, Self::ResidentialAddress1 | Self::ResidentialAddress2)
    }

    #[must_use]
    pub const fn is_permanent_address(self) -> bool {
        matches!(self, Self::PermanentAddress1 | Self::PermanentAddress2)
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FileKind {
    #[default]
    #[serde(rename = "")]
    Unset,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "pdf")]
    Pdf,
}

impl FileKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Image => "image",
            Self::Pdf => "pdf",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "" => Some(Self::Unset),
            "image" => Some(Self::Image),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Best-effort classification from a declared media type. Anything that is not
    /// `image/*` lands in `Pdf`, including types that are neither.
    #[must_use]
    pub fn from_mime(mime_type: &str) -> Self {
        let is_image = mime_type
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"));
        if is_image {
            Self::Image
        } else {
            Self::Pdf
        }
    }
}

/// A file picked by the user. The payload is reference counted, so cloning a
/// [`FormState`] never copies document bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl SelectedFile {
    #[must_use]
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileEntry {
    pub name: String,
    pub kind: FileKind,
    pub file: Option<SelectedFile>,
}

impl FileEntry {
    #[must_use]
    pub fn blank() -> Self {
        Self::default()
    }

    fn from_selection(file: Option<SelectedFile>) -> Self {
        match file {
            Some(file) => Self {
                name: file.name.clone(),
                kind: FileKind::from_mime(&file.mime_type),
                file: Some(file),
            },
            None => Self::blank(),
        }
    }

    #[must_use]
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("file index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("the first file entry cannot be removed")]
    ProtectedEntry,
}

/// The whole registration form.
///
/// Fields are private: every change goes through a transition that returns a new value, and
/// each transition re-establishes the invariants before handing the value back:
///
/// * `files` is never empty and entry 0 is never removed.
/// * While `same_as_residential` is set, the permanent address mirrors the residential one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    first_name: String,
    last_name: String,
    email: String,
    dob: String,
    residential_address1: String,
    residential_address2: String,
    same_as_residential: bool,
    permanent_address1: String,
    permanent_address2: String,
    files: Vec<FileEntry>,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            dob: String::new(),
            residential_address1: String::new(),
            residential_address2: String::new(),
            same_as_residential: false,
            permanent_address1: String::new(),
            permanent_address2: String::new(),
            files: vec![FileEntry::blank()],
        }
    }
}

impl FormState {
    #[must_use]
    pub fn field(&self, field: FormField) -> &str {
        match field {
            FormField::FirstName => &self.first_name,
            FormField::LastName => &self.last_name,
            FormField::Email => &self.email,
            FormField::Dob => &self.dob,
            FormField::ResidentialAddress1 => &self.residential_address1,
            FormField::ResidentialAddress2 => &self.residential_address2,
            FormField::PermanentAddress1 => &self.permanent_address1,
            FormField::PermanentAddress2 => &self.permanent_address2,
        }
    }

    fn field_mut(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::FirstName => &mut self.first_name,
            FormField::LastName => &mut self.last_name,
            FormField::Email => &mut self.email,
            FormField::Dob => &mut self.dob,
            FormField::ResidentialAddress1 => &mut self.residential_address1,
            FormField::ResidentialAddress2 => &mut self.residential_address2,
            FormField::PermanentAddress1 => &mut self.permanent_address1,
            FormField::PermanentAddress2 => &mut self.permanent_address2,
        }
    }

    #[must_use]
    pub const fn same_as_residential(&self) -> bool {
        self.same_as_residential
    }

    #[must_use]
    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    /// Whether a user edit to `field` would be discarded because the field is linked.
    #[must_use]
    pub const fn is_locked(&self, field: FormField) -> bool {
        self.same_as_residential && field.is_permanent_address()
    }

    #[must_use]
    pub fn is_removable(&self, index: usize) -> bool {
        index != 0 && index < self.files.len()
    }

    /// Replaces one scalar field. Residential edits are mirrored into the permanent address
    /// while the link is active; edits to a linked permanent field are discarded.
    #[must_use]
    pub fn set_field(&self, field: FormField, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        if next.is_locked(field) {
            return next;
        }
        *next.field_mut(field) = value.into();
        if next.same_as_residential && field.is_residential_address() {
            next.mirror_residential_address();
        }
        next
    }

    /// Links or unlinks the permanent address. Linking copies the residential address,
    /// unlinking blanks the permanent one. Setting the flag to its current value is a no-op.
    #[must_use]
    pub fn set_same_as_residential(&self, checked: bool) -> Self {
        let mut next = self.clone();
        if next.same_as_residential == checked {
            return next;
        }
        next.same_as_residential = checked;
        if checked {
            next.mirror_residential_address();
        } else {
            next.permanent_address1.clear();
            next.permanent_address2.clear();
        }
        next
    }

    pub fn select_file(&self, index: usize, file: Option<SelectedFile>) -> Result<Self, FormError> {
        let mut next = self.clone();
        let entry = next.entry_mut(index)?;
        *entry = FileEntry::from_selection(file);
        Ok(next)
    }

    pub fn set_file_kind(&self, index: usize, kind: FileKind) -> Result<Self, FormError> {
        let mut next = self.clone();
        next.entry_mut(index)?.kind = kind;
        Ok(next)
    }

    #[must_use]
    pub fn add_file_entry(&self) -> Self {
        let mut next = self.clone();
        next.files.push(FileEntry::blank());
        next
    }

    pub fn remove_file_entry(&self, index: usize) -> Result<Self, FormError> {
        if index == 0 {
            return Err(FormError::ProtectedEntry);
        }
        if index >= self.files.len() {
            return Err(self.out_of_range(index));
        }
        let mut next = self.clone();
        next.files.remove(index);
        Ok(next)
    }

    fn entry_mut(&mut self, index: usize) -> Result<&mut FileEntry, FormError> {
        let len = self.files.len();
        self.files
            .get_mut(index)
            .ok_or(FormError::IndexOutOfRange { index, len })
    }

    fn out_of_range(&self, index: usize) -> FormError {
        FormError::IndexOutOfRange {
            index,
            len: self.files.len(),
        }
    }

    fn mirror_residential_address(&mut self) {
        self.permanent_address1.clone_from(&self.residential_address1);
        self.permanent_address2.clone_from(&self.residential_address2);
    }
}
