//! Cert Bootstrap - Local Development TLS Certificate Generator
//!
//! One-shot command that produces a self-signed development CA plus server
//! and client key pairs for local TLS testing. Safe to run on every project
//! start: when the certificates already exist it does nothing.
//!
//! Configuration comes from `cert-bootstrap.toml` (optional), environment
//! variables (`COMMON_NAME`, `CA_KEY`, `SERVER_KEY`, ...), and the flags
//! below, in increasing order of precedence.

use anyhow::{Context, Result};
use cert_bootstrap::configs::{BootstrapConfig, ConfigOverlay};
use cert_bootstrap::{ensure_local_dev_certificates, BootstrapOutcome};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "cert-bootstrap")]
#[command(about = "Generate a local development CA and TLS key pairs", long_about = None)]
struct CliArgs {
    /// Common name for the server and client certificates
    #[arg(short, long)]
    common_name: Option<String>,

    /// Directory receiving server.key, server.crt and ca.crt
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Scratch directory holding intermediate artifacts
    #[arg(long)]
    scratch_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    // initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();
    let config = BootstrapConfig::resolve_with(ConfigOverlay {
        common_name: args.common_name,
        output_dir: args.out_dir,
        scratch_dir: args.scratch_dir,
        ..Default::default()
    })
    .context("Failed to resolve configuration")?;

    match ensure_local_dev_certificates(&config).context("Certificate bootstrap failed")? {
        BootstrapOutcome::Generated => {
            println!(
                "✓ server.key, server.crt and ca.crt written to {}",
                config.output_dir.display()
            );
        }
        BootstrapOutcome::AlreadyBootstrapped => {
            println!("✓ server.key already present, nothing to generate");
        }
    }

    Ok(())
}
