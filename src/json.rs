use std::io::Write;

use serde_json::{Map, Number, Value as JsonValue};

use crate::eval::Value;

// record keys keep declaration order through serde_json's `preserve_order`
impl From<&Value<'_>> for JsonValue {
    fn from(value: &Value<'_>) -> Self {
        match value {
            Value::Integer(n) => JsonValue::Number(Number::from(*n)),
            // reals are kept finite by the evaluator
            Value::Real(n) => Number::from_f64(*n).map_or(JsonValue::Null, JsonValue::Number),
            Value::Text(s) => JsonValue::String(s.to_string()),
            Value::Sequence(items) => JsonValue::Array(items.iter().map(JsonValue::from).collect()),
            Value::Record(pairs) => JsonValue::Object(
                pairs
                    .iter()
                    .map(|(key, value)| (key.to_string(), JsonValue::from(value)))
                    .collect::<Map<_, _>>(),
            ),
        }
    }
}

/// Pretty output is indented by two spaces.
pub fn to_string(value: &Value<'_>, pretty: bool) -> serde_json::Result<String> {
    let json = JsonValue::from(value);
    if pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    }
}

/// Writes the JSON text followed by a newline, then flushes the writer.
pub fn write<W: Write>(mut writer: W, value: &Value<'_>, pretty: bool) -> serde_json::Result<()> {
    let json = JsonValue::from(value);
    if pretty {
        serde_json::to_writer_pretty(&mut writer, &json)?;
    } else {
        serde_json::to_writer(&mut writer, &json)?;
    }
    writeln!(writer)
        .and_then(|()| writer.flush())
        .map_err(serde_json::Error::io)
}
