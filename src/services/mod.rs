//! Business logic services layer

pub mod actor_resolver;
pub mod ancestor_resolver;
pub mod change_service;
pub mod display_translator;
pub mod scope_resolver;

pub use actor_resolver::ActorNameResolver;
pub use ancestor_resolver::AncestorResolver;
pub use change_service::{ChangeLogService, EntityMutation, RecordChangeParams};
pub use display_translator::DisplayTranslator;
pub use scope_resolver::ScopeResolver;
