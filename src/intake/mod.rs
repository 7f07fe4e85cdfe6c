//! Application intake — the conversational form applicants fill in.

pub mod flow;
pub mod locale;
pub mod model;
pub mod sessions;
pub mod state;
pub mod validate;

pub use flow::{IntakeConfig, IntakeDeps, IntakeFlow};
pub use locale::{Catalog, MessageKey};
pub use model::{ApplicationRecord, Language, NewApplication};
pub use sessions::SessionStore;
pub use state::{Effect, Input, IntakePhase, SessionState, dispatch};
pub use validate::ValidationError;
