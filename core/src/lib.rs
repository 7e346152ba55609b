//! `mailverify-core` checks whether an email address is deliverable without
//! sending any mail.
//!
//! Under the hood, it resolves the domain's MX records, connects to its mail
//! exchanger, and walks it through the start of an SMTP dialogue
//! (`EHLO`/`MAIL FROM`/`RCPT TO`), reading the server's response to the
//! recipient command without ever sending a `DATA` payload. Around that core
//! check sit disposable-domain detection, typo suggestion, catch-all and
//! spam-trap heuristics, a rate governor that keeps outbound probing within
//! each domain's tolerance, a TTL cache, and a durable batch executor for
//! verifying large lists.
//!
//! ```no_run
//! use mailverify_core::cache::InMemoryCacheStore;
//! use mailverify_core::clock::SystemClock;
//! use mailverify_core::config::EngineConfig;
//! use mailverify_core::dns::TrustDnsMxResolver;
//! use mailverify_core::governor::CacheBackedGovernor;
//! use mailverify_core::pipeline::{VerifierPipeline, VerifyOptions};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! async fn check() {
//!     let config = EngineConfig::default();
//!     let clock = Arc::new(SystemClock);
//!     let cache = Arc::new(InMemoryCacheStore::new(clock.clone()));
//!     let dns = Arc::new(
//!         TrustDnsMxResolver::new(
//!             &config.dns_servers,
//!             Duration::from_millis(config.dns_timeout_ms),
//!             cache.clone(),
//!             Duration::from_secs(config.cache_ttl_mx_secs),
//!         )
//!         .expect("failed to build dns resolver"),
//!     );
//!     let governor = Arc::new(CacheBackedGovernor::new(
//!         cache.clone(),
//!         config.rate_limits.clone(),
//!         config.ip_pool.clone(),
//!     ));
//!
//!     let pipeline = VerifierPipeline::new(cache, dns, governor, config, clock);
//!     let result = pipeline.verify("someone@gmail.com", &VerifyOptions::default()).await;
//!     println!("{:?}", result);
//! }
//! ```

pub mod batch;
pub mod cache;
pub mod clock;
pub mod config;
pub mod dns;
pub mod enrich;
pub mod error;
pub mod governor;
pub mod notify;
pub mod pipeline;
pub mod policy;
pub mod smtp;
pub mod syntax;
mod util;

pub use config::EngineConfig;
pub use error::EngineError;
pub use pipeline::{Reachable, VerificationResult, VerifierPipeline, VerifyOptions};

/// The target used for every `log` call this crate makes, so a host process
/// can filter the engine's logs independently of its own.
pub const LOG_TARGET: &str = "mailverify";
