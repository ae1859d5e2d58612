//! Safety-gated HTTP probe.
//!
//! # Data Flow
//! ```text
//! ProbeRequest + CallerContext
//!     → proxy.rs (disablement gate)
//!     → policy.rs (URL parse, allowlist or denylist)
//!     → auth.rs (session / CSRF / basic / bearer / token)
//!     → reqwest (single call, redirects re-checked by policy.rs)
//!     → response.rs (NormalizedResponse)
//! ```
//!
//! # Design Decisions
//! - No retries, so non-idempotent probes run at most once
//! - Every failure is a typed `ProbeError` with a fixed HTTP status
//! - curl.rs renders the same request for copy-paste use

pub mod auth;
pub mod curl;
pub mod error;
pub mod policy;
pub mod proxy;
pub mod request;
pub mod response;

pub use auth::{AuthMode, CallerContext, CredentialNames, CsrfSource};
pub use curl::to_curl;
pub use error::ProbeError;
pub use policy::ProxyPolicy;
pub use proxy::SafeRequestProxy;
pub use request::ProbeRequest;
pub use response::NormalizedResponse;
