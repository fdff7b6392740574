//! Domain model (ids, stages, records, signals, errors).

pub mod errors;
pub mod events;
pub mod ids;
pub mod record;
pub mod stage;

pub use errors::{ErrorKind, RepositoryError, TrackerError};
pub use events::{Signal, SignalKind};
pub use ids::{RecordId, ScheduleId, TxId, UserId};
pub use record::{ApplicationPatch, ApplicationRecord};
pub use stage::Stage;
