//! HTTP surface: `POST /query` answers a question with the conversational
//! pipeline, `GET /health` reports readiness.

pub mod context;
pub mod error;
pub mod server;

pub use context::AppContext;
pub use error::QueryError;
pub use server::{build_router, serve};
