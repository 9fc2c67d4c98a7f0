mod routes;
mod server;

pub use routes::{routes, HttpContext};
pub use server::{serve_http, TlsFiles};
