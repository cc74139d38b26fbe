//! Entanglement engine.
//!
//! Splits a project's security groups into connected partitions, scores each
//! partition from its shared ports and cross-group rule references, and
//! summarizes the factors that contribute most.

pub mod evaluate;
pub mod partition;
pub mod report;
pub mod score;

pub use evaluate::*;
pub use partition::*;
pub use report::*;
pub use score::*;
