//! issue-preview core library: form model, parser, fingerprints, errors.
//!
//! - [`types`]: [`FormTemplate`] and the closed [`FormField`] variant
//! - [`parse`]: YAML bytes → validated template
//! - [`fingerprint`]: change detection digest
//! - [`error`]: [`ParseError`]

pub mod error;
pub mod fingerprint;
pub mod parse;
pub mod types;

pub use error::ParseError;
pub use fingerprint::Fingerprint;
pub use parse::parse;
pub use types::{
    CheckboxGroup, CheckboxOption, DropdownField, FieldCommon, FieldId, FormField, FormTemplate,
    InputField, MarkdownBlock, TextareaField,
};
