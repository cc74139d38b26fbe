pub mod config;
pub mod error;
pub mod model;

pub use self::config::{DatabaseSchema, NeutronRelease, Settings};
pub use error::*;
pub use model::*;
