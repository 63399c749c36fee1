//! KDKFetch - Kernel Debug Kit resolution and caching
//!
//! This library resolves, downloads and caches the macOS Kernel Debug Kit
//! matching a host's OS version and build. The external catalog ecosystem is
//! unreliable and partially incomplete, so resolution is a cascading
//! decision procedure: the primary catalog, a legacy OS-build database when
//! the catalog is down, a portal probe before committing to any transfer,
//! and a community mirror as last resort. The local cache is reconciled
//! after every successful resolution so stale kits are pruned while required
//! ones are kept.
//!
//! # Example
//!
//! ```no_run
//! use kdkfetch::{DownloadOrchestrator, KdkConfig};
//! use kdkfetch::cache::DirectRemover;
//!
//! let config = KdkConfig::default().with_prune_enabled(true);
//! let orchestrator = DownloadOrchestrator::new(&config, DirectRemover);
//!
//! let outcome = orchestrator.resolve_and_install("14.4", "23E214");
//! if outcome.success {
//!     println!("resolved build {}", outcome.resolved_build);
//! } else {
//!     eprintln!("{}", outcome.message);
//! }
//! ```
//!
//! Resolution is fully synchronous and single-writer: concurrent calls
//! against the same cache root must be serialized by the caller.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod mirror;
pub mod orchestrator;
pub mod portal;
pub mod transfer;
pub mod version;

pub use cache::{LocalCacheManager, PrivilegedRemover};
pub use catalog::legacy::ResolutionCandidate;
pub use catalog::KitDescriptor;
pub use config::KdkConfig;
pub use error::{ResolveError, ResolveResult};
pub use orchestrator::{DownloadOrchestrator, Resolution};
pub use portal::ProbeResult;
