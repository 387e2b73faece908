// homeboard-api: Async Rust clients for the homeboard backend and vendor device APIs

pub mod auth;
pub mod error;
pub mod realtime;
pub mod store;
pub mod transport;
pub mod vendor;

pub use auth::Session;
pub use error::Error;
pub use realtime::{
    ChangeEvent, ChangeFilter, ChangeKind, RealtimeHandle, ReconnectConfig, TokenSource,
    token_source,
};
pub use store::{Order, Query, StoreClient};
pub use transport::{TlsMode, TransportConfig};
pub use vendor::konnected::KonnectedClient;
pub use vendor::reolink::ReolinkClient;
pub use vendor::smartthings::SmartThingsClient;
