//! Structured-info export.
//!
//! Parsed boxes and timelines describe themselves through an [`InfoSink`]
//! instead of printing directly, so the same export path can feed the JSON
//! CLI output, tests, and custom handlers.

use crate::boxes::FourCC;
use serde_json::{Map, Value, json};

/// A single exported value.
#[derive(Debug, Clone)]
pub enum InfoValue {
    Str(String),
    UInt(u64),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Raw bytes, rendered as lowercase hex.
    Hex(Vec<u8>),
}

impl From<&str> for InfoValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}
impl From<String> for InfoValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}
impl From<FourCC> for InfoValue {
    fn from(v: FourCC) -> Self {
        Self::Str(v.as_str_lossy())
    }
}
impl From<bool> for InfoValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}
impl From<f64> for InfoValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

macro_rules! info_from_uint {
    ($($t:ty),*) => {$(
        impl From<$t> for InfoValue {
            fn from(v: $t) -> Self {
                Self::UInt(v as u64)
            }
        }
    )*};
}
macro_rules! info_from_int {
    ($($t:ty),*) => {$(
        impl From<$t> for InfoValue {
            fn from(v: $t) -> Self {
                Self::Int(v as i64)
            }
        }
    )*};
}
info_from_uint!(u8, u16, u32, u64, usize);
info_from_int!(i8, i16, i32, i64);

/// Receiver for structured box/timeline descriptions.
///
/// `begin_child`/`end_child` bracket a named object; `begin_array`/`end_array`
/// bracket a named list whose elements are anonymous children or values.
/// Sinks that only want summaries can return `false` from [`InfoSink::wants_tables`]
/// and exporters will skip per-entry table bodies.
pub trait InfoSink {
    fn pair(&mut self, name: &str, value: InfoValue);
    fn begin_child(&mut self, name: &str);
    fn end_child(&mut self);
    fn begin_array(&mut self, name: &str);
    fn end_array(&mut self);

    /// Whether large per-entry tables (sample sizes, chunk offsets, ...)
    /// should be emitted in full.
    fn wants_tables(&self) -> bool {
        true
    }
}

enum Frame {
    Object(Map<String, Value>),
    Array(Vec<Value>),
}

/// [`InfoSink`] that accumulates a `serde_json::Value` tree.
pub struct JsonSink {
    stack: Vec<(String, Frame)>,
    root: Map<String, Value>,
    tables: bool,
}

impl JsonSink {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            root: Map::new(),
            tables: true,
        }
    }

    /// Skip large per-entry tables.
    pub fn summary_only() -> Self {
        Self {
            tables: false,
            ..Self::new()
        }
    }

    pub fn into_value(mut self) -> Value {
        // Unbalanced begin/end pairs fold into the root rather than vanish.
        while !self.stack.is_empty() {
            self.end_child();
        }
        Value::Object(self.root)
    }

    fn insert(&mut self, name: &str, value: Value) {
        match self.stack.last_mut() {
            Some((_, Frame::Object(m))) => {
                m.insert(name.to_string(), value);
            }
            Some((_, Frame::Array(v))) => v.push(value),
            None => {
                self.root.insert(name.to_string(), value);
            }
        }
    }
}

impl Default for JsonSink {
    fn default() -> Self {
        Self::new()
    }
}

impl InfoSink for JsonSink {
    fn pair(&mut self, name: &str, value: InfoValue) {
        let v = match value {
            InfoValue::Str(s) => json!(s),
            InfoValue::UInt(n) => json!(n),
            InfoValue::Int(n) => json!(n),
            InfoValue::Float(n) => json!(n),
            InfoValue::Bool(b) => json!(b),
            InfoValue::Hex(b) => json!(hex::encode(b)),
        };
        self.insert(name, v);
    }

    fn begin_child(&mut self, name: &str) {
        self.stack.push((name.to_string(), Frame::Object(Map::new())));
    }

    fn end_child(&mut self) {
        if let Some((name, frame)) = self.stack.pop() {
            let v = match frame {
                Frame::Object(m) => Value::Object(m),
                Frame::Array(a) => Value::Array(a),
            };
            self.insert(&name, v);
        }
    }

    fn begin_array(&mut self, name: &str) {
        self.stack.push((name.to_string(), Frame::Array(Vec::new())));
    }

    fn end_array(&mut self) {
        self.end_child();
    }

    fn wants_tables(&self) -> bool {
        self.tables
    }
}
