pub mod backends;
pub mod common;

pub use backends::{app_router, backend_routes};
pub use common::common_routes;
