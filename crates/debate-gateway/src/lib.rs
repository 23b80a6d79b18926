//! Loopback HTTP gateway for the debate app.
//!
//! Serves the homepage, answers `/health` with a live backend probe, and
//! forwards `/api/*` to the generation backend. One request per connection.

pub mod config;
pub mod error;
pub mod framer;
pub mod proxy;
pub mod response;
pub mod router;
pub mod server;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use framer::{FrameStatus, ParsedRequest, RequestFramer};
pub use proxy::BackendProxy;
pub use response::HttpResponse;
pub use router::{Route, Router};
pub use server::Gateway;
