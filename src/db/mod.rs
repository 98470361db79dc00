/// IR code store
///
/// Keeps IR code records in memory and persists them to a JSON file.
/// All mutations are serialized through one lock per store.

pub mod models;
pub mod queries;
pub mod store;

pub use models::*;
pub use store::IrRecordStore;
