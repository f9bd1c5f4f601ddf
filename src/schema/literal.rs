//! Literal, enum and template-literal nodes.

use regex::Regex;

use crate::error::{Issue, IssueKind, SchemaBuildError};
use crate::payload::ParsePayload;
use crate::value::Value;

use super::Schema;

/// One part of a [`Schema::template_literal`].
#[derive(Debug, Clone)]
pub enum TemplatePart {
    /// Matched verbatim.
    Text(String),
    /// Matched by the schema's pattern.
    Schema(Schema),
}

impl From<&str> for TemplatePart {
    fn from(text: &str) -> Self {
        TemplatePart::Text(text.to_string())
    }
}

impl From<String> for TemplatePart {
    fn from(text: String) -> Self {
        TemplatePart::Text(text)
    }
}

impl From<Schema> for TemplatePart {
    fn from(schema: Schema) -> Self {
        TemplatePart::Schema(schema)
    }
}

#[derive(Clone)]
pub(crate) struct TemplateDef {
    source: String,
    regex: Regex,
}

impl TemplateDef {
    pub(super) fn new(parts: Vec<TemplatePart>) -> Result<Self, SchemaBuildError> {
        let mut source = String::new();
        for (index, part) in parts.iter().enumerate() {
            match part {
                TemplatePart::Text(text) => source.push_str(&regex::escape(text)),
                TemplatePart::Schema(schema) => {
                    let pattern = schema
                        .pattern()
                        .ok_or(SchemaBuildError::UnpatternedTemplatePart { index })?;
                    source.push_str(&format!("(?:{})", pattern));
                }
            }
        }
        let regex = Regex::new(&format!("^{}$", source))?;
        Ok(Self { source, regex })
    }

    /// The unanchored source, for nesting in other templates.
    pub(super) fn source(&self) -> &str {
        &self.source
    }
}

/// Escaped alternation of the string forms of `values`.
pub(super) fn alternation(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| regex::escape(&v.to_js_string()))
        .collect::<Vec<_>>()
        .join("|")
}

pub(super) fn parse_literal(
    schema: &Schema,
    values: &[Value],
    mut payload: ParsePayload,
) -> ParsePayload {
    if !values.contains(&payload.value) {
        let issue = Issue::new(IssueKind::InvalidValue {
            values: values.to_vec(),
        })
        .with_input(payload.value.clone())
        .with_error_map(schema.node_error());
        payload.push(issue);
    }
    payload
}

pub(super) fn parse_template(
    schema: &Schema,
    def: &TemplateDef,
    mut payload: ParsePayload,
) -> ParsePayload {
    let issue = match &payload.value {
        Value::String(s) if def.regex.is_match(s) => None,
        Value::String(_) => Some(
            Issue::new(IssueKind::InvalidFormat {
                format: "template_literal".to_string(),
                pattern: Some(def.regex.as_str().to_string()),
            })
            .with_input(payload.value.clone()),
        ),
        other => Some(Issue::invalid_type("template_literal", other)),
    };
    if let Some(issue) = issue {
        payload.push(issue.with_error_map(schema.node_error()));
    }
    payload
}
