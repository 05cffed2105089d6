//! Schema name to converter lookup.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use simbridge_types::{
    Clock, Header, SetBoolRequest, SetBoolResponse, StringMessage, TfMessage, TransformStamped,
    TriggerRequest, TriggerResponse,
};

use crate::convert::{Converter, MessageConverter, RosMessage};
use crate::error::RegistryError;

/// Maps schema names to the converter responsible for them.
///
/// Lookups are exact, case-sensitive string matches. Registering a name
/// twice replaces the earlier converter, which is how tests install
/// doubles over the built-in ones.
///
/// # Example
///
/// ```rust
/// use simbridge_sdk::MessageRegistry;
///
/// let registry = MessageRegistry::with_builtin();
/// assert!(registry.lookup("tf2_msgs/TFMessage").is_ok());
/// assert!(registry.lookup("tf2_msgs/tfmessage").is_err());
/// ```
#[derive(Default)]
pub struct MessageRegistry {
    converters: RwLock<BTreeMap<String, Arc<dyn MessageConverter>>>,
}

impl MessageRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding converters for every schema in `simbridge-types`.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register_type::<TfMessage>();
        registry.register_type::<TransformStamped>();
        registry.register_type::<Clock>();
        registry.register_type::<StringMessage>();
        registry.register_type::<Header>();
        registry.register_type::<SetBoolRequest>();
        registry.register_type::<SetBoolResponse>();
        registry.register_type::<TriggerRequest>();
        registry.register_type::<TriggerResponse>();
        registry
    }

    /// Bind `schema` to `converter`, replacing any earlier binding.
    pub fn register(&self, schema: impl Into<String>, converter: Arc<dyn MessageConverter>) {
        self.converters.write().insert(schema.into(), converter);
    }

    /// Register the [`Converter`] of a [`RosMessage`] type under its schema.
    pub fn register_type<M: RosMessage>(&self) {
        self.register(M::SCHEMA, Arc::new(Converter::<M>::new()));
    }

    /// The converter for `schema`.
    pub fn lookup(&self, schema: &str) -> Result<Arc<dyn MessageConverter>, RegistryError> {
        self.converters
            .read()
            .get(schema)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(schema.to_string()))
    }

    pub fn contains(&self, schema: &str) -> bool {
        self.converters.read().contains_key(schema)
    }

    /// Registered schema names, sorted.
    pub fn schemas(&self) -> Vec<String> {
        self.converters.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.converters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.read().is_empty()
    }
}

impl fmt::Debug for MessageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRegistry")
            .field("schemas", &self.schemas())
            .finish()
    }
}
