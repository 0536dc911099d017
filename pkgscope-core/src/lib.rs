pub mod analyze;
pub mod bundle;
pub mod config;
pub mod error;
pub mod exports;
pub mod linker;
pub mod operations;
pub mod progress;
pub mod protocols;
pub mod registry;
pub mod resolve;
pub mod session;
pub mod specifier;
pub mod store;
pub mod version;
pub mod vfs;
pub mod worker;

#[cfg(test)]
mod testing;

pub use config::PkgscopeConfig;
pub use error::PkgscopeError;
pub use session::Session;
pub use specifier::{PackageSpecifier, parse_specifier};
pub use vfs::VirtualFs;
pub use worker::WorkerHandle;

pub type Result<T> = std::result::Result<T, PkgscopeError>;
