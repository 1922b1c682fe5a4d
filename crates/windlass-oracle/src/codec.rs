//! Typed tool-invocation wire codec.
//!
//! Oracle payloads are one root `<invoke tool="...">` element containing
//! named `<param>` children. Every value carries an explicit `type` marker
//! (string/number/boolean/null/array/object); arrays hold `<item>` children
//! and objects hold nested `<param>` children, recursing the same typed
//! convention, so the decoder never infers a type from untyped text.
//!
//! The decoder tolerates incidental code-fence wrapping and ignores sibling
//! content outside the single recognized root tag.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Tag of the root element.
const ROOT_TAG: &str = "invoke";

/// Matches a whole line that is only a code fence.
static FENCE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used, reason = "pattern is a compile-time constant")]
    Regex::new(r"(?m)^\s*```[A-Za-z0-9_-]*\s*$").unwrap()
});

/// Errors produced while decoding a wire payload.
#[derive(Debug, Error)]
pub enum CodecError {
    /// No `<invoke>` root tag was found anywhere in the text.
    #[error("no <invoke> root tag found in response")]
    MissingRoot,

    /// The payload was structurally malformed.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// A value carried an unknown type marker.
    #[error("unknown type marker '{0}'")]
    UnknownType(String),

    /// A scalar body did not inhabit its declared type.
    #[error("invalid {kind} value: {body:?}")]
    InvalidScalar {
        /// Declared type marker.
        kind: String,
        /// Offending body text.
        body: String,
    },
}

/// A decoded oracle payload: one tool invocation with named parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Name of the invoked tool.
    pub tool: String,
    /// Named parameters, fully typed.
    pub params: Map<String, Value>,
}

impl Invocation {
    /// Creates an invocation from a tool name and parameter map.
    pub fn new(tool: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            tool: tool.into(),
            params,
        }
    }

    /// Looks up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }
}

/// Decodes one invocation from raw oracle text.
///
/// # Errors
/// Returns a [`CodecError`] if no root tag exists or the payload inside it
/// is malformed.
pub fn decode_invocation(text: &str) -> Result<Invocation, CodecError> {
    let cleaned = FENCE_LINE.replace_all(text, "");
    let start = cleaned.find("<invoke").ok_or(CodecError::MissingRoot)?;

    let mut parser = Parser {
        text: &cleaned[start..],
        pos: 0,
    };
    parser.parse_root()
}

/// Encodes an invocation into its wire form; the inverse of
/// [`decode_invocation`].
pub fn encode_invocation(invocation: &Invocation) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<{ROOT_TAG} tool=\"{}\">", escape_text(&invocation.tool));
    for (name, value) in &invocation.params {
        encode_value(&mut out, "param", Some(name), value, 1);
    }
    let _ = write!(out, "</{ROOT_TAG}>");
    out
}

fn encode_value(out: &mut String, tag: &str, name: Option<&str>, value: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    let name_attr = name.map_or_else(String::new, |param_name| {
        format!(" name=\"{}\"", escape_text(param_name))
    });
    match value {
        Value::Null => {
            let _ = writeln!(out, "{indent}<{tag}{name_attr} type=\"null\"></{tag}>");
        }
        Value::Bool(flag) => {
            let _ = writeln!(out, "{indent}<{tag}{name_attr} type=\"boolean\">{flag}</{tag}>");
        }
        Value::Number(number) => {
            let _ = writeln!(out, "{indent}<{tag}{name_attr} type=\"number\">{number}</{tag}>");
        }
        Value::String(text) => {
            let _ = writeln!(
                out,
                "{indent}<{tag}{name_attr} type=\"string\">{}</{tag}>",
                escape_text(text)
            );
        }
        Value::Array(items) => {
            let _ = writeln!(out, "{indent}<{tag}{name_attr} type=\"array\">");
            for item in items {
                encode_value(out, "item", None, item, depth + 1);
            }
            let _ = writeln!(out, "{indent}</{tag}>");
        }
        Value::Object(fields) => {
            let _ = writeln!(out, "{indent}<{tag}{name_attr} type=\"object\">");
            for (field_name, field_value) in fields {
                encode_value(out, "param", Some(field_name), field_value, depth + 1);
            }
            let _ = writeln!(out, "{indent}</{tag}>");
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn unescape_text(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

/// Attributes of one opening tag.
struct TagHeader {
    tag: String,
    attrs: Vec<(String, String)>,
    self_closing: bool,
}

impl TagHeader {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(attr_name, _)| attr_name == name)
            .map(|(_, attr_value)| attr_value.as_str())
    }
}

/// Hand-rolled cursor parser over the cleaned payload text.
struct Parser<'input> {
    text: &'input str,
    pos: usize,
}

impl Parser<'_> {
    fn parse_root(&mut self) -> Result<Invocation, CodecError> {
        let header = self.parse_open_tag()?;
        if header.tag != ROOT_TAG {
            return Err(CodecError::Malformed(format!(
                "expected <{ROOT_TAG}>, found <{}>",
                header.tag
            )));
        }
        let tool = header
            .attr("tool")
            .ok_or_else(|| CodecError::Malformed("root tag missing 'tool' attribute".to_owned()))?
            .to_owned();

        let mut params = Map::new();
        if !header.self_closing {
            self.collect_named_params(ROOT_TAG, &mut params)?;
        }

        Ok(Invocation::new(unescape_text(&tool), params))
    }

    /// Parses `<param name=.. type=..>` children until the given closing
    /// tag, inserting each into `params`.
    fn collect_named_params(
        &mut self,
        closing: &str,
        params: &mut Map<String, Value>,
    ) -> Result<(), CodecError> {
        loop {
            self.skip_whitespace();
            if self.try_consume_close(closing) {
                return Ok(());
            }
            let header = self.parse_open_tag()?;
            if header.tag != "param" {
                return Err(CodecError::Malformed(format!(
                    "expected <param> inside <{closing}>, found <{}>",
                    header.tag
                )));
            }
            let name = header
                .attr("name")
                .ok_or_else(|| CodecError::Malformed("<param> missing 'name' attribute".to_owned()))?
                .to_owned();
            let value = self.parse_typed_body(&header)?;
            params.insert(unescape_text(&name), value);
        }
    }

    /// Parses `<item type=..>` children until the given closing tag.
    fn collect_items(&mut self, closing: &str) -> Result<Vec<Value>, CodecError> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.try_consume_close(closing) {
                return Ok(items);
            }
            let header = self.parse_open_tag()?;
            if header.tag != "item" {
                return Err(CodecError::Malformed(format!(
                    "expected <item> inside <{closing}>, found <{}>",
                    header.tag
                )));
            }
            items.push(self.parse_typed_body(&header)?);
        }
    }

    /// Parses the body of an element according to its `type` marker.
    fn parse_typed_body(&mut self, header: &TagHeader) -> Result<Value, CodecError> {
        let kind = header
            .attr("type")
            .ok_or_else(|| {
                CodecError::Malformed(format!("<{}> missing 'type' attribute", header.tag))
            })?
            .to_owned();

        if header.self_closing {
            return match kind.as_str() {
                "null" => Ok(Value::Null),
                "string" => Ok(Value::String(String::new())),
                "array" => Ok(Value::Array(Vec::new())),
                "object" => Ok(Value::Object(Map::new())),
                "number" | "boolean" => Err(CodecError::InvalidScalar {
                    kind,
                    body: String::new(),
                }),
                other => Err(CodecError::UnknownType(other.to_owned())),
            };
        }

        match kind.as_str() {
            "array" => Ok(Value::Array(self.collect_items(&header.tag)?)),
            "object" => {
                let mut fields = Map::new();
                self.collect_named_params(&header.tag, &mut fields)?;
                Ok(Value::Object(fields))
            }
            "string" | "number" | "boolean" | "null" => {
                let body = self.read_text_until_close(&header.tag)?;
                scalar_from_text(&kind, &body)
            }
            other => Err(CodecError::UnknownType(other.to_owned())),
        }
    }

    fn parse_open_tag(&mut self) -> Result<TagHeader, CodecError> {
        self.skip_whitespace();
        if !self.remaining().starts_with('<') {
            return Err(CodecError::Malformed(format!(
                "expected a tag at: {:.32}",
                self.remaining()
            )));
        }
        self.pos += 1;

        let tag = self.read_while(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if tag.is_empty() {
            return Err(CodecError::Malformed("empty tag name".to_owned()));
        }

        let mut attrs = Vec::new();
        loop {
            self.skip_whitespace();
            if self.remaining().starts_with("/>") {
                self.pos += 2;
                return Ok(TagHeader {
                    tag,
                    attrs,
                    self_closing: true,
                });
            }
            if self.remaining().starts_with('>') {
                self.pos += 1;
                return Ok(TagHeader {
                    tag,
                    attrs,
                    self_closing: false,
                });
            }

            let attr_name = self.read_while(|ch| ch.is_ascii_alphanumeric() || ch == '_');
            if attr_name.is_empty() {
                return Err(CodecError::Malformed(format!(
                    "bad attribute in <{tag}>"
                )));
            }
            if !self.remaining().starts_with("=\"") {
                return Err(CodecError::Malformed(format!(
                    "attribute '{attr_name}' missing quoted value"
                )));
            }
            self.pos += 2;
            let value_end = self.remaining().find('"').ok_or_else(|| {
                CodecError::Malformed(format!("unterminated attribute '{attr_name}'"))
            })?;
            let attr_value = self.remaining()[..value_end].to_owned();
            self.pos += value_end + 1;
            attrs.push((attr_name, attr_value));
        }
    }

    /// Consumes `</tag>` if it is next, returning whether it was.
    fn try_consume_close(&mut self, tag: &str) -> bool {
        let closing = format!("</{tag}>");
        if self.remaining().starts_with(&closing) {
            self.pos += closing.len();
            true
        } else {
            false
        }
    }

    /// Reads raw text up to (and through) `</tag>`, unescaping entities.
    fn read_text_until_close(&mut self, tag: &str) -> Result<String, CodecError> {
        let closing = format!("</{tag}>");
        let end = self
            .remaining()
            .find(&closing)
            .ok_or_else(|| CodecError::Malformed(format!("missing {closing}")))?;
        let body = self.remaining()[..end].to_owned();
        self.pos += end + closing.len();
        Ok(unescape_text(&body))
    }

    fn remaining(&self) -> &str {
        &self.text[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.remaining().trim_start();
        self.pos = self.text.len() - trimmed.len();
    }

    fn read_while(&mut self, predicate: impl Fn(char) -> bool) -> String {
        let taken: String = self.remaining().chars().take_while(|ch| predicate(*ch)).collect();
        self.pos += taken.len();
        taken
    }
}

fn scalar_from_text(kind: &str, body: &str) -> Result<Value, CodecError> {
    let trimmed = body.trim();
    match kind {
        "string" => Ok(Value::String(body.to_owned())),
        "number" => {
            if let Ok(integer) = trimmed.parse::<i64>() {
                return Ok(Value::Number(Number::from(integer)));
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| CodecError::InvalidScalar {
                    kind: kind.to_owned(),
                    body: trimmed.to_owned(),
                })
        }
        "boolean" => match trimmed {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(CodecError::InvalidScalar {
                kind: kind.to_owned(),
                body: trimmed.to_owned(),
            }),
        },
        "null" => {
            if trimmed.is_empty() || trimmed == "null" {
                Ok(Value::Null)
            } else {
                Err(CodecError::InvalidScalar {
                    kind: kind.to_owned(),
                    body: trimmed.to_owned(),
                })
            }
        }
        other => Err(CodecError::UnknownType(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_flat_invocation() {
        let payload = r#"<invoke tool="submit_arguments">
            <param name="step_index" type="number">2</param>
            <param name="url" type="string">https://example.com</param>
            <param name="dry_run" type="boolean">false</param>
            <param name="note" type="null"></param>
        </invoke>"#;

        let invocation = decode_invocation(payload).unwrap();
        assert_eq!(invocation.tool, "submit_arguments");
        assert_eq!(invocation.param("step_index"), Some(&json!(2)));
        assert_eq!(invocation.param("url"), Some(&json!("https://example.com")));
        assert_eq!(invocation.param("dry_run"), Some(&json!(false)));
        assert_eq!(invocation.param("note"), Some(&Value::Null));
    }

    #[test]
    fn test_decode_nested_array_and_object() {
        let payload = r#"<invoke tool="submit_plan">
            <param name="steps" type="array">
                <item type="object">
                    <param name="index" type="number">0</param>
                    <param name="deps" type="array">
                        <item type="number">1</item>
                        <item type="number">2</item>
                    </param>
                </item>
            </param>
        </invoke>"#;

        let invocation = decode_invocation(payload).unwrap();
        let steps = invocation.param("steps").unwrap().as_array().unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0]["index"], json!(0));
        assert_eq!(steps[0]["deps"], json!([1, 2]));
    }

    #[test]
    fn test_decode_tolerates_fences_and_siblings() {
        let payload = "Here is my answer:\n```xml\n<invoke tool=\"submit_evaluation\">\n<param name=\"success\" type=\"boolean\">true</param>\n</invoke>\n```\nHope that helps!";
        let invocation = decode_invocation(payload).unwrap();
        assert_eq!(invocation.tool, "submit_evaluation");
        assert_eq!(invocation.param("success"), Some(&json!(true)));
    }

    #[test]
    fn test_decode_rejects_untyped_param() {
        let payload = r#"<invoke tool="x"><param name="a">text</param></invoke>"#;
        let error = decode_invocation(payload).unwrap_err();
        assert!(matches!(error, CodecError::Malformed(_)));
    }

    #[test]
    fn test_decode_rejects_bad_scalar_and_unknown_type() {
        let bad_number = r#"<invoke tool="x"><param name="a" type="number">seven</param></invoke>"#;
        assert!(matches!(
            decode_invocation(bad_number).unwrap_err(),
            CodecError::InvalidScalar { .. }
        ));

        let unknown = r#"<invoke tool="x"><param name="a" type="datetime">now</param></invoke>"#;
        assert!(matches!(
            decode_invocation(unknown).unwrap_err(),
            CodecError::UnknownType(_)
        ));
    }

    #[test]
    fn test_decode_missing_root() {
        assert!(matches!(
            decode_invocation("no tags here").unwrap_err(),
            CodecError::MissingRoot
        ));
    }

    #[test]
    fn test_encode_decode_roundtrip_with_escaping() {
        let params = as_map(json!({
            "query": "a < b && c > \"d\"",
            "limit": 5,
            "filters": {"tags": ["x", "y"], "strict": true},
            "cursor": null
        }));
        let original = Invocation::new("search", params);

        let encoded = encode_invocation(&original);
        let decoded = decode_invocation(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_float_number() {
        let payload = r#"<invoke tool="x"><param name="ratio" type="number">0.75</param></invoke>"#;
        let invocation = decode_invocation(payload).unwrap();
        assert!((invocation.param("ratio").unwrap().as_f64().unwrap() - 0.75).abs() < 1e-9);
    }
}
