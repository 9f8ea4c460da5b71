//! Handler registry: `event_name → handler`, a static map built once at
//! boot rather than runtime dynamic dispatch. Unknown event names are the
//! caller's responsibility, not this module's — an absent entry is a
//! normal `None` from `get`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::context::{HandlerContext, HandlerError};

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: HandlerContext) -> Result<(), HandlerError>;
}

#[derive(Default)]
pub struct Registry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, event_name: impl Into<String>, handler: Arc<dyn Handler>) {
        self.handlers.insert(event_name.into(), handler);
    }

    pub fn get(&self, event_name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(event_name).cloned()
    }

    /// The registry wired at boot: every stage handler plus the Stage B →
    /// Stage C forwarder.
    pub fn with_default_handlers() -> Self {
        let mut registry = Self::new();
        registry.register(event_bus::EVENT_BRIEF_FINALIZED, Arc::new(super::node_a::NodeAHandler));
        registry.register(event_bus::EVENT_NODE_B_INPUT, Arc::new(super::node_b::NodeBHandler));
        registry.register(
            event_bus::EVENT_DIRECTIVE_EMITTED,
            Arc::new(super::forward::DirectiveForwardHandler),
        );
        registry.register(event_bus::EVENT_NODE_C_INPUT, Arc::new(super::node_c::NodeCHandler));
        registry.register(event_bus::EVENT_NODE_D_INPUT, Arc::new(super::node_d::NodeDHandler));
        registry.register(event_bus::EVENT_NODE_E_INPUT, Arc::new(super::node_e::NodeEHandler));
        registry.register(event_bus::EVENT_NODE_F_INPUT, Arc::new(super::node_f::NodeFHandler));
        registry.register(event_bus::EVENT_NODE_G_INPUT, Arc::new(super::node_g::NodeGHandler));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_covers_every_stage_event() {
        let registry = Registry::with_default_handlers();
        for name in [
            event_bus::EVENT_BRIEF_FINALIZED,
            event_bus::EVENT_NODE_B_INPUT,
            event_bus::EVENT_DIRECTIVE_EMITTED,
            event_bus::EVENT_NODE_C_INPUT,
            event_bus::EVENT_NODE_D_INPUT,
            event_bus::EVENT_NODE_E_INPUT,
            event_bus::EVENT_NODE_F_INPUT,
            event_bus::EVENT_NODE_G_INPUT,
        ] {
            assert!(registry.get(name).is_some(), "missing handler for {name}");
        }
    }

    #[test]
    fn unknown_event_name_is_none() {
        let registry = Registry::with_default_handlers();
        assert!(registry.get("node_z.nonsense").is_none());
    }
}
