//! Cert Bootstrap - Local Development TLS Certificate Library
//!
//! Idempotently bootstraps a throwaway PKI for local TLS testing: a
//! self-signed certificate authority plus server and client key pairs, all
//! chained to that CA.
//!
//! # Overview
//!
//! ```text
//! Development CA (self-signed, CN = invoking user, 356 days)
//!   ├── Server Certificate (CN = configurable, SAN DNS + 127.0.0.1, 365 days)
//!   └── Client Certificate (independently keyed, same policy, 365 days)
//! ```
//!
//! Intermediate artifacts live in a disposable scratch directory that is
//! deleted and recreated on every run; the three files a TLS test setup
//! actually needs (`server.key`, `server.crt`, `ca.crt`) are copied into the
//! output directory at the end. If `server.key` is already present there,
//! the whole operation is a no-op: this is a first-run bootstrap, not a
//! rotation mechanism.
//!
//! # Quick Start
//!
//! ```no_run
//! use cert_bootstrap::configs::BootstrapConfig;
//! use cert_bootstrap::{ensure_local_dev_certificates, BootstrapOutcome};
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let config = BootstrapConfig::resolve()?;
//!     match ensure_local_dev_certificates(&config)? {
//!         BootstrapOutcome::Generated => println!("certificates written"),
//!         BootstrapOutcome::AlreadyBootstrapped => println!("nothing to do"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`bootstrap`]: the guarded pipeline (scratch reset, CA, server, client,
//!   copy-out)
//! - [`configs`]: defaults, optional TOML overlay, environment overrides
//!   (`COMMON_NAME`, `CA_KEY`, `SERVER_KEY`, ...)
//! - [`generate_root_ca`]: self-signed CA generation
//! - [`generate_leaf_request`]: end-entity key pair and signing request
//!   generation
//! - [`sign_leaf_request`]: CA-signed end-entity certificates with the
//!   subjectAltName policy
//! - [`serial_file`]: the CA's hex serial-number file
//!
//! # Error Handling
//!
//! All public APIs return `anyhow::Result<T>`; failures surface the failing
//! step's diagnostic through the error chain with no translation layer. The
//! pre-existing-output short-circuit is a success, not an error.
//!
//! Concurrent invocations against the same scratch directory are unsafe
//! (the directory reset races) and must be serialized by the caller.

pub mod bootstrap;
pub mod configs;
pub mod generate_leaf_request;
pub mod generate_root_ca;
pub mod serial_file;
pub mod sign_leaf_request;
mod validity;

pub use bootstrap::{ensure_local_dev_certificates, BootstrapOutcome};
pub use configs::BootstrapConfig;
