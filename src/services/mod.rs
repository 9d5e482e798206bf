pub mod bootstrap;
pub mod entity_service;
pub mod profile_service;

pub use bootstrap::{bootstrap_admin, AdminBootstrap, BootstrapOutcome};
pub use entity_service::{EntityService, OptionItem, ServiceError};
pub use profile_service::{load_actor, load_session, load_settings, system_actor};
