//! Parsing of the server-sent event stream that carries a call's result.

use serde_json::Value;

/// One `event:`/`data:` block from the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// How a result stream ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// The call finished; carries the outputs array
    Complete(Vec<Value>),
    /// The remote function raised; carries its message when one was sent
    Failed(Option<String>),
}

/// Split a complete event-stream body into events.
///
/// Blocks are separated by blank lines. Multiple `data:` lines in one block
/// are joined with newlines. Comment lines (leading `:`) are skipped, and a
/// block without an `event:` field is reported as `message`.
pub fn parse_events(body: &str) -> Vec<SseEvent> {
    let mut events = Vec::new();
    let mut event: Option<String> = None;
    let mut data: Vec<&str> = Vec::new();

    for line in body.lines().chain(std::iter::once("")) {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            if event.is_some() || !data.is_empty() {
                events.push(SseEvent {
                    event: event.take().unwrap_or_else(|| "message".to_string()),
                    data: data.join("\n"),
                });
                data.clear();
            }
            continue;
        }
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    events
}

/// Find the terminal event of a result stream.
///
/// `heartbeat` and `generating` events are skipped. Returns an error
/// description when the stream is malformed or ends without a verdict.
pub fn outcome(events: &[SseEvent]) -> Result<StreamOutcome, String> {
    for ev in events {
        match ev.event.as_str() {
            "complete" => {
                let value: Value = serde_json::from_str(&ev.data)
                    .map_err(|e| format!("complete event is not JSON: {}", e))?;
                return match value {
                    Value::Array(outputs) => Ok(StreamOutcome::Complete(outputs)),
                    other => Err(format!(
                        "complete event carried {} instead of an outputs list",
                        super::types::describe_shape(&other)
                    )),
                };
            }
            "error" => {
                let message = match serde_json::from_str::<Value>(&ev.data) {
                    Ok(Value::Null) => None,
                    Ok(Value::String(s)) => Some(s),
                    Ok(other) => Some(other.to_string()),
                    Err(_) if ev.data.trim().is_empty() => None,
                    Err(_) => Some(ev.data.clone()),
                };
                return Ok(StreamOutcome::Failed(message));
            }
            _ => {}
        }
    }
    Err("stream ended without a complete or error event".to_string())
}
