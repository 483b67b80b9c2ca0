//! Declarative descriptions of the fields a renderer accepts.
//!
//! One descriptor list drives three independent consumers: [`validate`]
//! turns loose input into typed [`Values`], [`render_form`] produces an HTML
//! form and [`json_schema`] a JSON Schema document.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{json, Map, Value as Json};

use crate::errors::{FieldError, ValidationErrors};
use crate::model::issue::parse_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    LongText,
    Boolean,
    Number,
    DateTime,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pub one_of: Option<&'static [&'static str]>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub max_len: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Bool(bool),
    Number(f64),
    DateTime(DateTime<Utc>),
}

impl Value {
    fn to_json(&self) -> Json {
        match self {
            Value::Text(s) => json!(s),
            Value::Bool(b) => json!(b),
            Value::Number(n) => json!(n),
            Value::DateTime(dt) => json!(dt.to_rfc3339()),
        }
    }

    fn to_form_value(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub constraints: Constraints,
    pub default: Option<Value>,
}

impl FieldDescriptor {
    pub fn new(name: &'static str, title: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            title,
            description: "",
            kind,
            required: false,
            constraints: Constraints::default(),
            default: None,
        }
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn one_of(mut self, choices: &'static [&'static str]) -> Self {
        self.constraints.one_of = Some(choices);
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.constraints.min = Some(min);
        self.constraints.max = Some(max);
        self
    }

    pub fn max_len(mut self, max_len: usize) -> Self {
        self.constraints.max_len = Some(max_len);
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    fn check(&self, raw: &Json) -> Result<Value, String> {
        let value = match self.kind {
            FieldKind::Text | FieldKind::LongText => match raw {
                Json::String(s) => Value::Text(s.clone()),
                Json::Number(n) => Value::Text(n.to_string()),
                Json::Bool(b) => Value::Text(b.to_string()),
                _ => return Err("expected text".into()),
            },
            FieldKind::Boolean => match raw {
                Json::Bool(b) => Value::Bool(*b),
                Json::String(s) => Value::Bool(parse_bool(s).ok_or("expected true or false")?),
                _ => return Err("expected true or false".into()),
            },
            FieldKind::Number => {
                let n = match raw {
                    Json::Number(n) => n.as_f64(),
                    Json::String(s) => s.trim().parse().ok(),
                    _ => None,
                };
                Value::Number(n.ok_or("expected a number")?)
            }
            FieldKind::DateTime => match raw {
                Json::String(s) => Value::DateTime(parse_datetime(s).ok_or("expected a date and time")?),
                _ => return Err("expected a date and time".into()),
            },
        };

        let c = &self.constraints;
        match &value {
            Value::Text(s) => {
                if let Some(choices) = c.one_of {
                    if !choices.contains(&s.as_str()) {
                        return Err(format!("must be one of: {}", choices.join(", ")));
                    }
                }
                if let Some(max_len) = c.max_len {
                    if s.chars().count() > max_len {
                        return Err(format!("must be at most {max_len} characters"));
                    }
                }
            }
            Value::Number(n) => {
                if let Some(min) = c.min.filter(|min| n < min) {
                    return Err(format!("must be at least {min}"));
                }
                if let Some(max) = c.max.filter(|max| n > max) {
                    return Err(format!("must be at most {max}"));
                }
            }
            Value::Bool(_) | Value::DateTime(_) => {}
        }
        Ok(value)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Accepts everything an issue timestamp can be, plus the minute-precision
/// format HTML datetime inputs submit.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    parse_timestamp(s).or_else(|| {
        ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s.trim(), fmt).ok())
            .map(|naive| naive.and_utc())
    })
}

/// Validated input, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values(BTreeMap<String, Value>);

impl Values {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name)? {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.0.get(name)? {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.0.get(name)? {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn datetime(&self, name: &str) -> Option<DateTime<Utc>> {
        match self.0.get(name)? {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Check `input` against `fields`. Unknown keys are ignored; missing optional
/// fields take their default when they have one. Every failing field is
/// reported, not just the first.
pub fn validate(fields: &[FieldDescriptor], input: &Map<String, Json>) -> Result<Values, ValidationErrors> {
    let mut values = BTreeMap::new();
    let mut errors = Vec::new();

    for field in fields {
        let raw = input
            .get(field.name)
            .filter(|v| !v.is_null() && v.as_str().map_or(true, |s| !s.trim().is_empty()));

        match raw {
            Some(raw) => match field.check(raw) {
                Ok(value) => {
                    values.insert(field.name.to_string(), value);
                }
                Err(message) => errors.push(FieldError {
                    field: field.name.to_string(),
                    message,
                }),
            },
            None => {
                if let Some(default) = &field.default {
                    values.insert(field.name.to_string(), default.clone());
                } else if field.required {
                    errors.push(FieldError {
                        field: field.name.to_string(),
                        message: "is required".into(),
                    });
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(Values(values))
    } else {
        Err(ValidationErrors(errors))
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// An HTML form with one control per field, posting to `action`.
pub fn render_form(fields: &[FieldDescriptor], action: &str) -> String {
    let mut html = String::new();
    let _ = writeln!(html, r#"<form method="post" action="{}">"#, escape_html(action));

    for field in fields {
        let name = escape_html(field.name);
        let default = field.default.as_ref().map(Value::to_form_value).unwrap_or_default();
        let required = if field.required { " required" } else { "" };

        let _ = writeln!(html, "  <div class=\"field\">");
        let _ = writeln!(
            html,
            r#"    <label for="{name}">{}</label>"#,
            escape_html(field.title)
        );

        if let Some(choices) = field.constraints.one_of {
            let _ = writeln!(html, r#"    <select id="{name}" name="{name}"{required}>"#);
            for choice in choices {
                let selected = if *choice == default { " selected" } else { "" };
                let choice = escape_html(choice);
                let _ = writeln!(html, r#"      <option value="{choice}"{selected}>{choice}</option>"#);
            }
            let _ = writeln!(html, "    </select>");
        } else {
            match field.kind {
                FieldKind::LongText => {
                    let _ = writeln!(
                        html,
                        r#"    <textarea id="{name}" name="{name}"{required}>{}</textarea>"#,
                        escape_html(&default)
                    );
                }
                FieldKind::Boolean => {
                    let checked = if default == "true" { " checked" } else { "" };
                    let _ = writeln!(
                        html,
                        r#"    <input type="checkbox" id="{name}" name="{name}" value="true"{checked}>"#
                    );
                }
                kind => {
                    let input_type = match kind {
                        FieldKind::Number => "number",
                        FieldKind::DateTime => "datetime-local",
                        _ => "text",
                    };
                    let mut extra = String::new();
                    if let Some(min) = field.constraints.min {
                        let _ = write!(extra, r#" min="{min}""#);
                    }
                    if let Some(max) = field.constraints.max {
                        let _ = write!(extra, r#" max="{max}""#);
                    }
                    if let Some(max_len) = field.constraints.max_len {
                        let _ = write!(extra, r#" maxlength="{max_len}""#);
                    }
                    let _ = writeln!(
                        html,
                        r#"    <input type="{input_type}" id="{name}" name="{name}" value="{}"{extra}{required}>"#,
                        escape_html(&default)
                    );
                }
            }
        }

        if !field.description.is_empty() {
            let _ = writeln!(
                html,
                r#"    <small>{}</small>"#,
                escape_html(field.description)
            );
        }
        let _ = writeln!(html, "  </div>");
    }

    let _ = writeln!(html, r#"  <button type="submit">Render</button>"#);
    html.push_str("</form>\n");
    html
}

/// A JSON Schema (draft 2020-12) object describing `fields`.
pub fn json_schema(fields: &[FieldDescriptor], description: &str) -> Json {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for field in fields {
        let mut prop = Map::new();
        let (ty, format) = match field.kind {
            FieldKind::Text | FieldKind::LongText => ("string", None),
            FieldKind::Boolean => ("boolean", None),
            FieldKind::Number => ("number", None),
            FieldKind::DateTime => ("string", Some("date-time")),
        };
        prop.insert("type".into(), json!(ty));
        if let Some(format) = format {
            prop.insert("format".into(), json!(format));
        }
        prop.insert("title".into(), json!(field.title));
        if !field.description.is_empty() {
            prop.insert("description".into(), json!(field.description));
        }
        if let Some(choices) = field.constraints.one_of {
            prop.insert("enum".into(), json!(choices));
        }
        if let Some(min) = field.constraints.min {
            prop.insert("minimum".into(), json!(min));
        }
        if let Some(max) = field.constraints.max {
            prop.insert("maximum".into(), json!(max));
        }
        if let Some(max_len) = field.constraints.max_len {
            prop.insert("maxLength".into(), json!(max_len));
        }
        if let Some(default) = &field.default {
            prop.insert("default".into(), default.to_json());
        }
        if field.required {
            required.push(field.name);
        }
        properties.insert(field.name.to_string(), Json::Object(prop));
    }

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "description": description,
        "properties": properties,
        "required": required,
    })
}
