//! OS integration: the trash.

pub mod trash;
