//! Strict scenario text validation.
//!
//! The generation service is asked for a JSON object but sometimes answers
//! with single-quoted strings, surrounding prose, or a fenced code block.
//! Normalization is deterministic: take the outermost object, rewrite
//! single-quoted literals into JSON literals, then validate field by field.

use serde_json::{Map, Value};
use tracing::debug;

use super::model::{Scenario, ScenarioFields, SCENARIO_FIELDS};
use crate::error::ScenarioError;

/// Extract a validated scenario from a generation-service response
pub fn parse_scenario_text(raw_text: &str) -> Result<Scenario, ScenarioError> {
    let object_text = outermost_object(raw_text)
        .ok_or_else(|| ScenarioError::Parse("no object found in response".to_string()))?;

    let normalized = normalize_quotes(object_text);

    let value: Value =
        serde_json::from_str(&normalized).map_err(|e| ScenarioError::Parse(e.to_string()))?;

    let Value::Object(map) = value else {
        return Err(ScenarioError::Parse("response is not an object".to_string()));
    };

    let extra: Vec<&String> = map
        .keys()
        .filter(|k| !SCENARIO_FIELDS.contains(&k.as_str()))
        .collect();
    if !extra.is_empty() {
        debug!("Ignoring extra scenario keys: {:?}", extra);
    }

    let fields = ScenarioFields {
        language: string_field(&map, "language")?,
        level: string_field(&map, "level")?,
        name: string_field(&map, "name")?,
        place: string_field(&map, "place")?,
        background: string_field(&map, "background")?,
        person_to_talk_to: string_field(&map, "person_to_talk_to")?,
        goal: string_field(&map, "goal")?,
    };

    Scenario::new(fields)
}

fn string_field(map: &Map<String, Value>, field: &'static str) -> Result<String, ScenarioError> {
    match map.get(field) {
        None | Some(Value::Null) => Err(ScenarioError::MissingField(field)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(ScenarioError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ScenarioError::InvalidField {
            field,
            found: value_kind(other).to_string(),
        }),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Slice from the first `{` to the last `}`
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Rewrite single-quoted string literals as double-quoted JSON literals.
///
/// Inside a single-quoted literal a `'` only closes the literal when the next
/// non-whitespace character is structural (`:`, `,`, `}`, `]`) or the input
/// ends; otherwise it is an apostrophe and kept. Double quotes inside a
/// single-quoted literal are escaped. Double-quoted literals pass through.
pub(crate) fn normalize_quotes(text: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Outside,
        Double,
        Single,
    }

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut state = State::Outside;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match state {
            State::Outside => {
                match c {
                    '"' => state = State::Double,
                    '\'' => {
                        state = State::Single;
                        out.push('"');
                        i += 1;
                        continue;
                    }
                    _ => {}
                }
                out.push(c);
            }
            State::Double => {
                out.push(c);
                if c == '\\' {
                    if let Some(&next) = chars.get(i + 1) {
                        out.push(next);
                        i += 1;
                    }
                } else if c == '"' {
                    state = State::Outside;
                }
            }
            State::Single => match c {
                '\\' => match chars.get(i + 1) {
                    Some('\'') => {
                        out.push('\'');
                        i += 1;
                    }
                    Some(&next) => {
                        out.push('\\');
                        out.push(next);
                        i += 1;
                    }
                    None => out.push('\\'),
                },
                '"' => out.push_str("\\\""),
                '\'' if closes_literal(&chars[i + 1..]) => {
                    out.push('"');
                    state = State::Outside;
                }
                _ => out.push(c),
            },
        }
        i += 1;
    }

    out
}

fn closes_literal(rest: &[char]) -> bool {
    match rest.iter().find(|c| !c.is_whitespace()) {
        None => true,
        Some(c) => matches!(c, ':' | ',' | '}' | ']'),
    }
}
