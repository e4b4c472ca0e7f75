use crate::boxes::{BoxHeader, BoxKey};
use crate::info::InfoSink;
use std::collections::HashMap;
use std::fmt::Debug;
use std::io::Read;

/// Structured value produced by a custom box handler.
///
/// Handler output hangs off the parsed tree as a [`crate::boxes::BoxData::Custom`]
/// node and is exported through the same [`InfoSink`] channel as built-in boxes.
pub trait CustomData: Debug + Send + Sync {
    /// Short human-readable name, used when exporting and logging.
    fn name(&self) -> &str;

    /// Write the decoded fields into a structured-info sink.
    fn export(&self, sink: &mut dyn InfoSink);
}

/// Handler invoked for a box type the built-in parser does not model.
///
/// The reader is positioned at the start of the box body (after version and
/// flags when the handler was registered as a full box) and is bounded to the
/// body; handlers may read less than the whole body.
pub trait BoxHandler: Send + Sync {
    fn parse(
        &self,
        r: &mut dyn Read,
        hdr: &BoxHeader,
        version: Option<u8>,
        flags: Option<u32>,
    ) -> anyhow::Result<Box<dyn CustomData>>;
}

impl<F> BoxHandler for F
where
    F: Fn(&mut dyn Read, &BoxHeader, Option<u8>, Option<u32>) -> anyhow::Result<Box<dyn CustomData>>
        + Send
        + Sync,
{
    fn parse(
        &self,
        r: &mut dyn Read,
        hdr: &BoxHeader,
        version: Option<u8>,
        flags: Option<u32>,
    ) -> anyhow::Result<Box<dyn CustomData>> {
        self(r, hdr, version, flags)
    }
}

struct HandlerEntry {
    inner: Box<dyn BoxHandler>,
    /// Handler expects version/flags to be consumed before it runs.
    full_box: bool,
}

/// Per-parser registry of custom box handlers keyed by [`BoxKey`]
/// (plain fourcc or `uuid` extended type).
///
/// Registrations are scoped to the parser instance that owns the registry;
/// two parsers never observe each other's handlers.
#[derive(Default)]
pub struct Registry {
    map: HashMap<BoxKey, HandlerEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a box key. A later registration for the same
    /// key replaces the earlier one.
    pub fn register(&mut self, key: BoxKey, full_box: bool, handler: Box<dyn BoxHandler>) {
        self.map.insert(
            key,
            HandlerEntry {
                inner: handler,
                full_box,
            },
        );
    }

    /// Builder-style variant of [`Registry::register`].
    pub fn with_handler(mut self, key: BoxKey, full_box: bool, handler: Box<dyn BoxHandler>) -> Self {
        self.register(key, full_box, handler);
        self
    }

    pub fn contains(&self, key: &BoxKey) -> bool {
        self.map.contains_key(key)
    }

    /// Whether the handler for `key` wants version/flags pre-parsed.
    pub fn is_full_box(&self, key: &BoxKey) -> Option<bool> {
        self.map.get(key).map(|e| e.full_box)
    }

    /// Run the handler for `key`, if one is registered.
    pub fn dispatch(
        &self,
        key: &BoxKey,
        r: &mut dyn Read,
        hdr: &BoxHeader,
        version: Option<u8>,
        flags: Option<u32>,
    ) -> Option<anyhow::Result<Box<dyn CustomData>>> {
        self.map
            .get(key)
            .map(|e| e.inner.parse(r, hdr, version, flags))
    }
}
