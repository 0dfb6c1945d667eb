//! Domain types for a parsed GitHub issue form.
//!
//! A [`FormTemplate`] is immutable once built by [`crate::parse`]; callers
//! replace it wholesale on every re-parse.

use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A validated field identifier (`[A-Za-z0-9_-]+`, unique within a form).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FieldId(pub String);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for FieldId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for FieldId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// A parsed issue form template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormTemplate {
    pub name: String,
    pub description: String,
    /// Prefilled issue title (`title:` key), empty when absent.
    pub title_prefix: String,
    /// Labels applied to issues created from this form, in source order.
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub projects: Vec<String>,
    pub milestone: Option<String>,
    /// Body elements, in declaration order.
    pub fields: Vec<FormField>,
}

impl FormTemplate {
    /// Fields that collect input (everything except markdown blocks).
    pub fn input_fields(&self) -> impl Iterator<Item = &FormField> {
        self.fields.iter().filter(|f| f.common().is_some())
    }

    /// Number of fields flagged as required.
    pub fn required_count(&self) -> usize {
        self.fields.iter().filter(|f| f.is_required()).count()
    }
}

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// Attributes shared by every input-collecting field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldCommon {
    pub id: Option<FieldId>,
    pub label: String,
    pub description: Option<String>,
    pub required: bool,
}

/// One element of a form body.
///
/// Closed set: the renderer matches on it exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormField {
    Markdown(MarkdownBlock),
    Input(InputField),
    Textarea(TextareaField),
    Dropdown(DropdownField),
    Checkboxes(CheckboxGroup),
}

/// Static Markdown shown between inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkdownBlock {
    pub id: Option<FieldId>,
    pub value: String,
}

/// Single-line text input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputField {
    #[serde(flatten)]
    pub common: FieldCommon,
    pub placeholder: Option<String>,
    pub value: Option<String>,
}

/// Multi-line text area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextareaField {
    #[serde(flatten)]
    pub common: FieldCommon,
    pub placeholder: Option<String>,
    pub value: Option<String>,
    /// Language hint: when set, GitHub renders the answer as a code block.
    pub render: Option<String>,
}

/// Selection from a fixed list of options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropdownField {
    #[serde(flatten)]
    pub common: FieldCommon,
    pub options: Vec<String>,
    pub multiple: bool,
    /// Index into `options`, validated at parse time.
    pub default: Option<usize>,
}

/// A group of checkboxes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckboxGroup {
    #[serde(flatten)]
    pub common: FieldCommon,
    pub options: Vec<CheckboxOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckboxOption {
    pub label: String,
    pub required: bool,
}

impl FormField {
    /// The `type:` keyword this field was declared with.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FormField::Markdown(_) => "markdown",
            FormField::Input(_) => "input",
            FormField::Textarea(_) => "textarea",
            FormField::Dropdown(_) => "dropdown",
            FormField::Checkboxes(_) => "checkboxes",
        }
    }

    pub fn id(&self) -> Option<&FieldId> {
        match self {
            FormField::Markdown(block) => block.id.as_ref(),
            other => other.common().and_then(|c| c.id.as_ref()),
        }
    }

    /// Shared attributes; `None` for markdown blocks.
    pub fn common(&self) -> Option<&FieldCommon> {
        match self {
            FormField::Markdown(_) => None,
            FormField::Input(f) => Some(&f.common),
            FormField::Textarea(f) => Some(&f.common),
            FormField::Dropdown(f) => Some(&f.common),
            FormField::Checkboxes(f) => Some(&f.common),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.common().map(|c| c.label.as_str())
    }

    pub fn is_required(&self) -> bool {
        self.common().map(|c| c.required).unwrap_or(false)
    }
}
