pub mod attributes;
pub mod guard;
pub mod hierarchy;
pub mod resolve;
pub mod validate;

pub use attributes::*;
pub use guard::*;
pub use hierarchy::*;
pub use resolve::*;
pub use validate::*;
