//! Event name → handler dispatch.

use super::intent::MutationIntent;
use super::resolver::MetadataResolver;
use crate::core::decoder::DecodedInstruction;
use crate::schema::SchemaCatalog;
use crate::utils::error::{Result, SinkError};
use async_trait::async_trait;
use solana_idl_parser::comparison_key;
use std::collections::HashMap;
use std::sync::Arc;

/// What a handler may consult besides the decoded instruction.
#[derive(Clone, Copy)]
pub struct MapContext<'a> {
    pub catalog: &'a SchemaCatalog,
    pub resolver: &'a dyn MetadataResolver,
    /// Slot of the transaction that carried the instruction.
    pub slot: Option<u64>,
}

/// Maps one decoded instruction to at most one mutation intent.
#[async_trait]
pub trait EventMapper: Send + Sync {
    /// # Errors
    ///
    /// Returns `SinkError::MappingError` when the instruction lacks what the
    /// handler needs, e.g. a required account role.
    async fn map(
        &self,
        instruction: &DecodedInstruction,
        ctx: &MapContext<'_>,
    ) -> Result<Option<MutationIntent>>;
}

/// Handlers keyed by event name.
///
/// Lookups ignore case and separators, so `createPost` and `create_post`
/// reach the same handler.
#[derive(Default, Clone)]
pub struct MapperRegistry {
    handlers: HashMap<String, (String, Arc<dyn EventMapper>)>,
}

impl MapperRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `event`, replacing any previous one.
    pub fn register(&mut self, event: impl Into<String>, handler: impl EventMapper + 'static) {
        let event = event.into();
        self.handlers
            .insert(comparison_key(&event), (event, Arc::new(handler)));
    }

    #[must_use]
    pub fn contains(&self, event: &str) -> bool {
        self.handlers.contains_key(&comparison_key(event))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered event names, sorted.
    #[must_use]
    pub fn events(&self) -> Vec<&str> {
        let mut events: Vec<&str> = self.handlers.values().map(|(n, _)| n.as_str()).collect();
        events.sort_unstable();
        events
    }

    /// Dispatches `instruction` to its handler.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::MappingError` for an unhandled event name, and
    /// whatever the handler returns otherwise.
    pub async fn map(
        &self,
        instruction: &DecodedInstruction,
        ctx: &MapContext<'_>,
    ) -> Result<Option<MutationIntent>> {
        let (_, handler) = self
            .handlers
            .get(&comparison_key(&instruction.name))
            .ok_or_else(|| {
                SinkError::MappingError(format!("No handler for event '{}'", instruction.name))
            })?;
        handler.map(instruction, ctx).await
    }
}

impl std::fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapperRegistry")
            .field("events", &self.events())
            .finish()
    }
}
