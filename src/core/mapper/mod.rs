//! Mutation Mapper: decoded events and records → mutation intents.
//!
//! Instruction events dispatch through [`MapperRegistry`] by name; account
//! snapshots from backfill go through [`map_account`]. The only side effect
//! is the optional metadata fetch performed through a [`MetadataResolver`].

pub mod account;
pub mod gum;
pub mod handlers;
pub mod intent;
pub mod registry;
pub mod resolver;

pub use account::map_account;
pub use handlers::RowMapper;
pub use intent::{Binding, ColumnValue, MutationIntent, MutationOp, SlotSpan};
pub use registry::{EventMapper, MapContext, MapperRegistry};
pub use resolver::{HttpMetadataResolver, MetadataResolver, NoopResolver};
