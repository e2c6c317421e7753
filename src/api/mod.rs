pub mod attribute_handlers;
pub mod handlers;
pub mod routes;

pub use attribute_handlers::*;
pub use handlers::*;
pub use routes::*;
