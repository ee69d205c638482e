// Reelgate API library
//
// HTTP/JSON surface over the reelgate-core services

pub mod http;

pub use http::{create_router, AppState};
