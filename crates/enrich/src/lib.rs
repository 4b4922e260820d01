//! ProPublica Nonprofit Explorer enrichment
//!
//! `lookup(ein)` fetches an organization profile and filing summary with a
//! TTL cache, a process-global rate limit (minimum inter-request delay plus
//! an hourly ceiling), and exponential back-off with jitter on 429s and
//! network faults. Terminal failures come back as an
//! [`EnrichmentRecord`] with `status = Failed` and a typed reason rather
//! than an error, so batch callers can keep going.

mod client;
mod pacer;
mod record;

pub use client::{ProPublicaClient, ProPublicaConfig};
pub use pacer::RequestPacer;
pub use record::{EnrichmentRecord, EnrichmentStatus, OrganizationSummary};
