pub mod hashing;
pub mod net;

// Re-exports for convenience
pub use hashing::{attachment_digest, content_digest, DraftDigest, HashError};
pub use net::{default_http_client, NetError, Query, RestClient};
