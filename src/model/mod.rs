pub mod attribute;
pub mod common;
pub mod node;

pub use attribute::*;
pub use common::*;
pub use node::*;
