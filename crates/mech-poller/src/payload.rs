//! History provider payloads

use crate::error::{PollError, PollResult};
use mech_core::StreamKind;
use mech_transport::Response;
use serde::Deserialize;
use serde_json::{Map, Value};

/// `{host, saga: {latest, events|sensor: [...]}}`
#[derive(Debug, Deserialize)]
struct Payload {
    host: String,
    saga: Saga,
}

#[derive(Debug, Deserialize)]
struct Saga {
    latest: i64,
    #[serde(flatten)]
    streams: Map<String, Value>,
}

/// A decoded history response
#[derive(Debug)]
pub(crate) struct Snapshot {
    pub host: String,
    pub latest: i64,
    pub records: Vec<Value>,
}

impl Snapshot {
    /// Decode a response, requiring a 200 status, a host and a latest id
    ///
    /// A missing record array is an empty batch.
    pub fn decode(kind: StreamKind, response: &Response) -> PollResult<Self> {
        if !response.is_success() {
            return Err(PollError::Status(response.status));
        }
        let mut payload: Payload = serde_json::from_str(&response.body)?;

        let records = match payload.saga.streams.remove(kind.records_field()) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(records)) => records,
            Some(_) => return Err(PollError::NotAnArray(kind.records_field())),
        };

        Ok(Self {
            host: payload.host,
            latest: payload.saga.latest,
            records,
        })
    }
}

/// One history record: `[timestamp, group, name, value, ..., id]`
///
/// For events `group` is the category and `value` the action; for sensor
/// readings they are the location and the measured value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub stream: StreamKind,
    pub id: i64,
    pub timestamp: i64,
    pub group: String,
    pub name: String,
    pub value: String,
}

impl Record {
    /// Decode one record, `None` if it does not have the expected shape
    pub fn parse(stream: StreamKind, raw: &Value) -> Option<Self> {
        let fields = raw.as_array()?;
        if fields.len() < 5 {
            return None;
        }

        Some(Self {
            stream,
            id: fields.last()?.as_i64()?,
            timestamp: fields[0].as_i64()?,
            group: text(&fields[1])?,
            name: text(&fields[2])?,
            value: text(&fields[3])?,
        })
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
