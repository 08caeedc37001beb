//! Event envelope
//!
//! The unit handed to the dispatch registry: event name, sequence, the raw
//! JSON payload and, once decoded, the typed payload.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A typed gateway event
///
/// `NAME` is the dispatch name (the `t` field) the type decodes from.
pub trait GatewayEvent: DeserializeOwned + Send + Sync + 'static {
    const NAME: &'static str;
}

pub(crate) type Payload = Arc<dyn Any + Send + Sync>;

/// Decoded dispatch event
#[derive(Clone)]
pub struct Envelope {
    name: Arc<str>,
    sequence: Option<u64>,
    raw: Arc<Value>,
    payload: Option<Payload>,
}

impl Envelope {
    /// Wrap a raw dispatch payload
    pub fn new(name: impl Into<Arc<str>>, sequence: Option<u64>, raw: Value) -> Self {
        Self {
            name: name.into(),
            sequence,
            raw: Arc::new(raw),
            payload: None,
        }
    }

    /// Wrap an event produced in-process
    pub fn from_event<E>(event: E) -> Self
    where
        E: GatewayEvent + serde::Serialize,
    {
        let raw = serde_json::to_value(&event).unwrap_or(Value::Null);
        Self {
            name: Arc::from(E::NAME),
            sequence: None,
            raw: Arc::new(raw),
            payload: Some(Arc::new(event)),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sequence number; `None` for lifecycle events
    #[inline]
    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    #[inline]
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Typed payload, if it was decoded as `E`
    pub fn downcast<E: GatewayEvent>(&self) -> Option<Arc<E>> {
        if &*self.name != E::NAME {
            return None;
        }
        self.payload.clone()?.downcast::<E>().ok()
    }

    /// Decode the raw payload as any type
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        decode_raw(&self.raw)
    }

    pub(crate) fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    pub(crate) fn set_payload(&mut self, payload: Payload) {
        self.payload = Some(payload);
    }
}

/// A null payload decodes as an empty object so payload-less events still
/// map onto field-less structs.
pub(crate) fn decode_raw<T: DeserializeOwned>(raw: &Value) -> Result<T, serde_json::Error> {
    if raw.is_null() {
        T::deserialize(&Value::Object(Map::new()))
    } else {
        T::deserialize(raw)
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("name", &self.name)
            .field("sequence", &self.sequence)
            .field("decoded", &self.payload.is_some())
            .finish()
    }
}
