pub mod backend;
pub mod memory;
pub mod pattern;
pub mod record;
