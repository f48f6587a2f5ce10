//! Telemetry side of the glass box: the read-only record store, the seeded
//! water-plant generator, CSV import/export and anomaly window selection.

pub mod csv;
pub mod generator;
pub mod store;
pub mod window;

pub use generator::{generate, Preset};
pub use store::{AnomalyEvent, StoreError, TelemetryStore};
pub use window::{AnomalyWindow, Selection, WindowError, WindowRow};
