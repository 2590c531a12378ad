//! Namespace tree over accumulated key names.

pub mod builder;
pub mod session;
pub mod worker;
