//! Template contexts: serializable rendering payloads built from a
//! [`FormTemplate`].
//!
//! Each [`FormField`] variant maps to exactly one [`FieldCtx`] variant and one
//! partial template; both mappings are exhaustive `match`es.

use pulldown_cmark::{html, Event, Options, Parser};
use serde::Serialize;

use issue_preview_core::{FieldCommon, FormField, FormTemplate};

use crate::error::RenderError;

/// Page-level payload for `page.html`.
///
/// `fields` holds already-rendered field fragments, in declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct PageCtx {
    pub name: String,
    pub description_html: String,
    pub title_prefix: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub projects: Vec<String>,
    pub milestone: Option<String>,
    pub fields: Vec<String>,
}

/// Header shared by every input-collecting partial (`fields/_header.html`).
#[derive(Debug, Clone, Serialize)]
pub struct HeaderCtx {
    pub html_id: String,
    pub label: String,
    pub description_html: Option<String>,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkdownCtx {
    pub html_id: String,
    pub html: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputCtx {
    #[serde(flatten)]
    pub header: HeaderCtx,
    pub placeholder: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextareaCtx {
    #[serde(flatten)]
    pub header: HeaderCtx,
    pub placeholder: Option<String>,
    pub value: Option<String>,
    pub render: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DropdownCtx {
    #[serde(flatten)]
    pub header: HeaderCtx,
    pub options: Vec<DropdownOptionCtx>,
    pub multiple: bool,
    /// Single-select without a default shows a "Selections: None" entry.
    pub show_placeholder: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DropdownOptionCtx {
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckboxesCtx {
    #[serde(flatten)]
    pub header: HeaderCtx,
    pub options: Vec<CheckboxOptionCtx>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckboxOptionCtx {
    pub label: String,
    pub required: bool,
}

/// Rendering payload of one body element.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FieldCtx {
    Markdown(MarkdownCtx),
    Input(InputCtx),
    Textarea(TextareaCtx),
    Dropdown(DropdownCtx),
    Checkboxes(CheckboxesCtx),
}

impl FieldCtx {
    /// Build the payload for the field at `index` (0-based body position).
    ///
    /// Declared ids and positions live under separate prefixes so an id-less
    /// field can never share an HTML id with a declared one.
    pub fn from_field(index: usize, field: &FormField) -> Self {
        let html_id = field
            .id()
            .map(|id| format!("field-id-{id}"))
            .unwrap_or_else(|| format!("field-pos-{index}"));

        match field {
            FormField::Markdown(block) => FieldCtx::Markdown(MarkdownCtx {
                html_id,
                html: markdown_to_html(&block.value),
            }),
            FormField::Input(input) => FieldCtx::Input(InputCtx {
                header: header(html_id, &input.common),
                placeholder: input.placeholder.clone(),
                value: input.value.clone(),
            }),
            FormField::Textarea(textarea) => FieldCtx::Textarea(TextareaCtx {
                header: header(html_id, &textarea.common),
                placeholder: textarea.placeholder.clone(),
                value: textarea.value.clone(),
                render: textarea.render.clone(),
            }),
            FormField::Dropdown(dropdown) => FieldCtx::Dropdown(DropdownCtx {
                header: header(html_id, &dropdown.common),
                options: dropdown
                    .options
                    .iter()
                    .enumerate()
                    .map(|(i, label)| DropdownOptionCtx {
                        label: label.clone(),
                        selected: dropdown.default == Some(i),
                    })
                    .collect(),
                multiple: dropdown.multiple,
                show_placeholder: !dropdown.multiple && dropdown.default.is_none(),
            }),
            FormField::Checkboxes(group) => FieldCtx::Checkboxes(CheckboxesCtx {
                header: header(html_id, &group.common),
                options: group
                    .options
                    .iter()
                    .map(|o| CheckboxOptionCtx {
                        label: o.label.clone(),
                        required: o.required,
                    })
                    .collect(),
            }),
        }
    }

    /// Name of the partial that renders this payload.
    pub fn template_name(&self) -> &'static str {
        match self {
            FieldCtx::Markdown(_) => "fields/markdown.html",
            FieldCtx::Input(_) => "fields/input.html",
            FieldCtx::Textarea(_) => "fields/textarea.html",
            FieldCtx::Dropdown(_) => "fields/dropdown.html",
            FieldCtx::Checkboxes(_) => "fields/checkboxes.html",
        }
    }

    /// Wrap as `{ "field": … }` for the partial.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        #[derive(Serialize)]
        struct Partial<'a> {
            field: &'a FieldCtx,
        }
        tera::Context::from_serialize(Partial { field: self }).map_err(RenderError::from)
    }
}

impl PageCtx {
    /// Build the page payload; `fields` are the rendered fragments.
    pub fn new(template: &FormTemplate, fields: Vec<String>) -> Self {
        PageCtx {
            name: template.name.clone(),
            description_html: markdown_to_html(&template.description),
            title_prefix: template.title_prefix.clone(),
            labels: template.labels.clone(),
            assignees: template.assignees.clone(),
            projects: template.projects.clone(),
            milestone: template.milestone.clone(),
            fields,
        }
    }

    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}

fn header(html_id: String, common: &FieldCommon) -> HeaderCtx {
    HeaderCtx {
        html_id,
        label: common.label.clone(),
        description_html: common.description.as_deref().map(markdown_to_html),
        required: common.required,
    }
}

/// GitHub-flavoured subset: tables, strikethrough, task lists.
///
/// Raw HTML is shown as escaped text, never passed through.
pub fn markdown_to_html(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(source, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out.trim_end().to_string()
}
