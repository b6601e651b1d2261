//! CLI command implementations

pub mod config;
pub mod exec;
pub mod recipe;
pub mod reference;
pub mod workspace;

pub use config::execute as config;
pub use exec::execute as exec;
pub use workspace::execute as workspace;
