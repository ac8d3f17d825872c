//! HTTP adapter over the allocation engine.

pub mod routes;
pub mod server;

pub use routes::routes;
pub use server::serve;
