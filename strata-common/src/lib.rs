// strata-common/src/lib.rs
pub mod config;
pub mod constraint;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod recipe;
pub mod resolve;

// Re-export key types
pub use config::Config;
pub use constraint::ConstraintSet;
pub use error::{Result, StrataError};
pub use model::{Artifact, BuildVariant};
pub use recipe::Recipe;
