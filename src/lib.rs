/// ir-manager library
///
/// Converts learned infrared captures to interchange hex codes and keeps
/// them in a small file-backed store.

pub mod codec;
pub mod config;
pub mod core;
pub mod db;
pub mod error;

// Re-exports for convenience
pub use codec::IrCodec;
pub use config::Config;
pub use db::IrRecordStore;
pub use error::{IrError, Result};
