//! The classify-measure-decide-act chain.
//!
//! Leaves first: [`shebang`] gates on the first line, [`length`] measures,
//! [`policy`] decides, [`script`] and [`actions`] act, [`pipeline`] ties
//! them together per event.

pub mod actions;
pub mod length;
pub mod pipeline;
pub mod policy;
pub mod rewrite;
pub mod script;
pub mod shebang;
