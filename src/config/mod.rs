// src/config/mod.rs

//! Configuration: CLI flags merged over an optional `pulse.toml`, resolved
//! into one immutable [`Config`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_optional};
pub use model::{Config, RawConfigFile};
pub use validate::validate;
