pub mod bundle;
pub mod install;

pub use bundle::{BundleRequest, bundle};
pub use install::{InitResult, InstallOptions, Installation, install};
