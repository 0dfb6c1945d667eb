//! Issue form parser: YAML bytes → validated [`FormTemplate`].
//!
//! Parsing runs in two stages:
//!
//! 1. `serde_yaml` deserializes into permissive `Raw*` structs. Unknown keys
//!    are ignored; only malformed YAML fails here ([`ParseError::Syntax`]).
//! 2. [`validate`] walks the raw document and builds the typed model, failing
//!    fast on schema violations ([`ParseError::Schema`]) with a path-style
//!    location such as `body[2].attributes.label`.
//!
//! Every ambiguity the renderer could run into is resolved here, so rendering
//! a successfully parsed template never has to guess.

use std::collections::HashSet;

use serde::Deserialize;

use crate::error::ParseError;
use crate::types::{
    CheckboxGroup, CheckboxOption, DropdownField, FieldCommon, FieldId, FormField, FormTemplate,
    InputField, MarkdownBlock, TextareaField,
};

// ---------------------------------------------------------------------------
// 1. Raw document
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawTemplate {
    name: Option<String>,
    description: Option<String>,
    title: Option<String>,
    labels: Option<StringList>,
    assignees: Option<StringList>,
    projects: Option<StringList>,
    milestone: Option<Scalar>,
    body: Option<Vec<RawField>>,
}

/// GitHub accepts both `labels: [a, b]` and `labels: "a, b"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringList {
    List(Vec<String>),
    Csv(String),
}

/// `milestone: 3` is as valid as `milestone: v1.0`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_yaml::Number),
    Bool(bool),
}

impl Scalar {
    fn into_text(self) -> Option<String> {
        let text = match self {
            Scalar::Text(text) => text.trim().to_string(),
            Scalar::Number(number) => number.to_string(),
            Scalar::Bool(flag) => flag.to_string(),
        };
        (!text.is_empty()).then_some(text)
    }
}

impl StringList {
    fn into_vec(self) -> Vec<String> {
        let items = match self {
            StringList::List(items) => items,
            StringList::Csv(joined) => joined.split(',').map(str::to_owned).collect(),
        };
        items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct RawField {
    #[serde(rename = "type")]
    kind: Option<String>,
    id: Option<String>,
    #[serde(default)]
    attributes: RawAttributes,
    #[serde(default)]
    validations: RawValidations,
}

/// Superset of the attributes of every field type.
#[derive(Debug, Default, Deserialize)]
struct RawAttributes {
    label: Option<String>,
    description: Option<String>,
    placeholder: Option<String>,
    value: Option<String>,
    render: Option<String>,
    multiple: Option<bool>,
    default: Option<usize>,
    options: Option<Vec<RawOption>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawValidations {
    required: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawOption {
    Plain(String),
    Checkbox {
        label: String,
        #[serde(default)]
        required: bool,
    },
}

impl RawOption {
    fn label(&self) -> &str {
        match self {
            RawOption::Plain(label) => label,
            RawOption::Checkbox { label, .. } => label,
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Entry point
// ---------------------------------------------------------------------------

/// Parse an issue form template from raw source bytes.
pub fn parse(source: &[u8]) -> Result<FormTemplate, ParseError> {
    let text = std::str::from_utf8(source).map_err(|err| ParseError::Syntax {
        message: format!("source is not valid UTF-8: {err}"),
        line: None,
        column: None,
    })?;

    if text.trim().is_empty() {
        return Err(ParseError::schema("document", "template is empty"));
    }

    let raw: RawTemplate = serde_yaml::from_str(text)?;
    validate(raw)
}

// ---------------------------------------------------------------------------
// 3. Validation
// ---------------------------------------------------------------------------

fn validate(raw: RawTemplate) -> Result<FormTemplate, ParseError> {
    let name = required_text(raw.name, "name")?;
    let description = required_text(raw.description, "description")?;

    let Some(body) = raw.body else {
        return Err(ParseError::schema("body", "missing required key"));
    };
    if body.is_empty() {
        return Err(ParseError::schema("body", "must contain at least one field"));
    }

    let mut seen_ids = HashSet::new();
    let mut fields = Vec::with_capacity(body.len());
    for (index, raw_field) in body.into_iter().enumerate() {
        let field = validate_field(index, raw_field, &mut seen_ids)?;
        fields.push(field);
    }

    if fields.iter().all(|f| matches!(f, FormField::Markdown(_))) {
        return Err(ParseError::schema(
            "body",
            "must contain at least one non-markdown field",
        ));
    }

    Ok(FormTemplate {
        name,
        description,
        title_prefix: raw.title.unwrap_or_default(),
        labels: raw.labels.map(StringList::into_vec).unwrap_or_default(),
        assignees: raw.assignees.map(StringList::into_vec).unwrap_or_default(),
        projects: raw.projects.map(StringList::into_vec).unwrap_or_default(),
        milestone: raw.milestone.and_then(Scalar::into_text),
        fields,
    })
}

fn required_text(value: Option<String>, key: &str) -> Result<String, ParseError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        Some(_) => Err(ParseError::schema(key, "must not be empty")),
        None => Err(ParseError::schema(key, "missing required key")),
    }
}

fn validate_field(
    index: usize,
    raw: RawField,
    seen_ids: &mut HashSet<String>,
) -> Result<FormField, ParseError> {
    let at = |suffix: &str| {
        if suffix.is_empty() {
            format!("body[{index}]")
        } else {
            format!("body[{index}].{suffix}")
        }
    };

    let Some(kind) = raw.kind else {
        return Err(ParseError::schema(at("type"), "missing required key"));
    };

    let id = match raw.id {
        Some(id) => Some(validate_id(&id, seen_ids, &at("id"))?),
        None => None,
    };

    let attrs = raw.attributes;
    let required = raw.validations.required.unwrap_or(false);

    let field = match kind.as_str() {
        "markdown" => {
            let Some(value) = attrs.value else {
                return Err(ParseError::schema(
                    at("attributes.value"),
                    "markdown blocks require a value",
                ));
            };
            FormField::Markdown(MarkdownBlock { id, value })
        }
        "input" => FormField::Input(InputField {
            common: common(id, &attrs, required, &at)?,
            placeholder: attrs.placeholder,
            value: attrs.value,
        }),
        "textarea" => FormField::Textarea(TextareaField {
            common: common(id, &attrs, required, &at)?,
            placeholder: attrs.placeholder,
            value: attrs.value,
            render: attrs.render.filter(|r| !r.trim().is_empty()),
        }),
        "dropdown" => {
            let common = common(id, &attrs, required, &at)?;
            let options = dropdown_options(attrs.options, &at("attributes.options"))?;
            if let Some(default) = attrs.default {
                if default >= options.len() {
                    return Err(ParseError::schema(
                        at("attributes.default"),
                        format!(
                            "default index {default} is out of range for {} options",
                            options.len()
                        ),
                    ));
                }
            }
            FormField::Dropdown(DropdownField {
                common,
                options,
                multiple: attrs.multiple.unwrap_or(false),
                default: attrs.default,
            })
        }
        "checkboxes" => {
            let common = common(id, &attrs, required, &at)?;
            let options = checkbox_options(attrs.options, &at("attributes.options"))?;
            FormField::Checkboxes(CheckboxGroup { common, options })
        }
        other => {
            return Err(ParseError::schema(
                at("type"),
                format!(
                    "unknown field type '{other}'; expected: markdown, input, textarea, dropdown, checkboxes"
                ),
            ))
        }
    };

    Ok(field)
}

fn validate_id(
    id: &str,
    seen_ids: &mut HashSet<String>,
    location: &str,
) -> Result<FieldId, ParseError> {
    if id.is_empty() {
        return Err(ParseError::schema(location, "id must not be empty"));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ParseError::schema(
            location,
            format!("id '{id}' may only contain letters, digits, '-' and '_'"),
        ));
    }
    if !seen_ids.insert(id.to_string()) {
        return Err(ParseError::schema(location, format!("duplicate id '{id}'")));
    }
    Ok(FieldId::from(id))
}

fn common(
    id: Option<FieldId>,
    attrs: &RawAttributes,
    required: bool,
    at: &dyn Fn(&str) -> String,
) -> Result<FieldCommon, ParseError> {
    let label = match &attrs.label {
        Some(label) if !label.trim().is_empty() => label.clone(),
        Some(_) => {
            return Err(ParseError::schema(
                at("attributes.label"),
                "label must not be empty",
            ))
        }
        None => {
            return Err(ParseError::schema(
                at("attributes.label"),
                "missing required attribute",
            ))
        }
    };

    Ok(FieldCommon {
        id,
        label,
        description: attrs.description.clone().filter(|d| !d.trim().is_empty()),
        required,
    })
}

fn dropdown_options(
    options: Option<Vec<RawOption>>,
    location: &str,
) -> Result<Vec<String>, ParseError> {
    let options = options.unwrap_or_default();
    if options.is_empty() {
        return Err(ParseError::schema(
            location,
            "dropdown requires at least one option",
        ));
    }

    let mut seen = HashSet::new();
    let mut labels = Vec::with_capacity(options.len());
    for (i, option) in options.iter().enumerate() {
        let label = option.label().trim();
        if label.is_empty() {
            return Err(ParseError::schema(
                format!("{location}[{i}]"),
                "option must not be empty",
            ));
        }
        if !seen.insert(label.to_string()) {
            return Err(ParseError::schema(
                format!("{location}[{i}]"),
                format!("duplicate option '{label}'"),
            ));
        }
        labels.push(label.to_string());
    }
    Ok(labels)
}

fn checkbox_options(
    options: Option<Vec<RawOption>>,
    location: &str,
) -> Result<Vec<CheckboxOption>, ParseError> {
    let options = options.unwrap_or_default();
    if options.is_empty() {
        return Err(ParseError::schema(
            location,
            "checkboxes require at least one option",
        ));
    }

    options
        .into_iter()
        .enumerate()
        .map(|(i, option)| {
            let (label, required) = match option {
                RawOption::Plain(label) => (label, false),
                RawOption::Checkbox { label, required } => (label, required),
            };
            if label.trim().is_empty() {
                return Err(ParseError::schema(
                    format!("{location}[{i}].label"),
                    "option label must not be empty",
                ));
            }
            Ok(CheckboxOption { label, required })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name: Feature
description: Ask for a feature
body:
  - type: input
    id: a
    attributes:
      label: Goal
    validations:
      required: true
"#;

    #[test]
    fn parses_minimal_template() {
        let template = parse(MINIMAL.as_bytes()).expect("parse");
        assert_eq!(template.name, "Feature");
        assert_eq!(template.fields.len(), 1);
        assert_eq!(template.fields[0].label(), Some("Goal"));
        assert!(template.fields[0].is_required());
        assert_eq!(template.fields[0].id(), Some(&FieldId::from("a")));
    }

    #[test]
    fn labels_accept_comma_separated_string() {
        let src = MINIMAL.replace(
            "description: Ask for a feature",
            "description: Ask for a feature\nlabels: \"enhancement, triage ,\"",
        );
        let template = parse(src.as_bytes()).expect("parse");
        assert_eq!(template.labels, vec!["enhancement", "triage"]);
    }

    #[test]
    fn empty_source_is_schema_error() {
        let err = parse(b"   \n").unwrap_err();
        assert!(matches!(err, ParseError::Schema { .. }), "got: {err}");
    }

    #[test]
    fn non_utf8_is_syntax_error() {
        let err = parse(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }), "got: {err}");
    }

    #[test]
    fn malformed_yaml_reports_line() {
        let err = parse(b"name: x\ndescription: [unclosed\nbody: []\n").unwrap_err();
        match err {
            ParseError::Syntax { line, .. } => assert!(line.is_some(), "line hint expected"),
            other => panic!("expected syntax error, got {other}"),
        }
    }

    #[test]
    fn unknown_attributes_are_ignored() {
        let src = MINIMAL.replace("label: Goal", "label: Goal\n      sparkle: true");
        parse(src.as_bytes()).expect("unknown attributes must not fail parsing");
    }
}
