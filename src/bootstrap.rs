//! Certificate Bootstrapper
//!
//! The linear pipeline that produces a complete local development PKI:
//!
//! 1. Short-circuit if the copied-out server key already exists.
//! 2. Delete and recreate the scratch directory.
//! 3. Generate the self-signed CA (key + certificate).
//! 4. Generate the server key and signing request, sign with the CA.
//! 5. Generate the client key and signing request, sign with the CA.
//! 6. Copy `server.key`, `server.crt` and `ca.crt` to the output directory.
//!
//! Every artifact is written as PEM with no passphrase. Any step failure
//! aborts the run before the copy-out; leftover scratch state is harmless
//! because the next run recreates the directory.

use anyhow::{anyhow, Context, Result};
use openssl::pkey::{PKey, Private};
use openssl::x509::{X509Req, X509};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::configs::BootstrapConfig;
use crate::generate_leaf_request::RsaLeafRequestBuilder;
use crate::generate_root_ca::RsaRootCaBuilder;
use crate::serial_file;
use crate::sign_leaf_request::RsaLeafSigner;

/// File names copied into the output directory.
pub const SERVER_KEY_FILE: &str = "server.key";
pub const SERVER_CRT_FILE: &str = "server.crt";
pub const CA_CRT_FILE: &str = "ca.crt";

/// What a bootstrap invocation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// A fresh PKI was generated and copied out.
    Generated,
    /// The server key already existed at the output location; nothing was
    /// written.
    AlreadyBootstrapped,
}

/// Idempotently produce the local development certificates.
///
/// First-run bootstrap, not a rotation mechanism: when
/// `<output-dir>/server.key` already exists the call returns
/// [`BootstrapOutcome::AlreadyBootstrapped`] without touching the
/// filesystem. Otherwise the full pipeline runs and the terminal artifacts
/// land in the output directory.
///
/// Concurrent invocations against the same scratch directory race on the
/// directory reset and must be serialized by the caller.
///
/// # Examples
/// ```rust,no_run
/// use cert_bootstrap::configs::BootstrapConfig;
/// use cert_bootstrap::ensure_local_dev_certificates;
/// # use anyhow::Result;
/// # fn example() -> Result<()> {
/// let config = BootstrapConfig::resolve()?;
/// ensure_local_dev_certificates(&config)?;
/// # Ok(())
/// # }
/// ```
pub fn ensure_local_dev_certificates(config: &BootstrapConfig) -> Result<BootstrapOutcome> {
    let server_key_out = config.output_dir.join(SERVER_KEY_FILE);
    if server_key_out.exists() {
        debug!(path = %server_key_out.display(), "server key already present, nothing to do");
        return Ok(BootstrapOutcome::AlreadyBootstrapped);
    }

    reset_scratch_dir(&config.scratch_dir)?;

    info!(common_name = %config.ca_common_name, "generating development CA");
    let (ca_key, ca_cert) = RsaRootCaBuilder::new(config.ca_common_name.clone())
        .build()
        .context("Failed to generate CA")?;
    write_private_key(&config.ca_key, &ca_key)?;
    write_certificate(&config.ca_crt, &ca_cert)?;

    let serial_path = serial_file::path_for(&config.ca_crt);
    let signer = RsaLeafSigner::new(ca_key, ca_cert, serial_path);

    info!(common_name = %config.common_name, "issuing server certificate");
    issue_leaf(
        &signer,
        &config.common_name,
        &config.server_key,
        &config.server_csr,
        &config.server_crt,
    )
    .context("Failed to issue server certificate")?;

    info!(common_name = %config.common_name, "issuing client certificate");
    issue_leaf(
        &signer,
        &config.common_name,
        &config.client_key,
        &config.client_csr,
        &config.client_crt,
    )
    .context("Failed to issue client certificate")?;

    copy_out(config)?;

    info!(output_dir = %config.output_dir.display(), "local development certificates ready");
    Ok(BootstrapOutcome::Generated)
}

/// Delete and recreate the scratch directory.
fn reset_scratch_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .with_context(|| format!("Failed to remove scratch directory {}", dir.display()))?;
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create scratch directory {}", dir.display()))?;
    debug!(dir = %dir.display(), "scratch directory reset");
    Ok(())
}

/// Generate one end-entity key pair, write its artifacts, and sign it.
fn issue_leaf(
    signer: &RsaLeafSigner,
    common_name: &str,
    key_path: &Path,
    csr_path: &Path,
    crt_path: &Path,
) -> Result<()> {
    let (key, req) = RsaLeafRequestBuilder::new(common_name.to_string()).build()?;
    write_private_key(key_path, &key)?;
    write_signing_request(csr_path, &req)?;

    let cert = signer.sign(&req)?;
    write_certificate(crt_path, &cert)?;
    Ok(())
}

/// Copy the terminal artifacts into the output directory, overwriting.
fn copy_out(config: &BootstrapConfig) -> Result<()> {
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })?;

    for (source, name) in [
        (&config.server_key, SERVER_KEY_FILE),
        (&config.server_crt, SERVER_CRT_FILE),
        (&config.ca_crt, CA_CRT_FILE),
    ] {
        let target = config.output_dir.join(name);
        fs::copy(source, &target).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                source.display(),
                target.display()
            )
        })?;
        debug!(target = %target.display(), "copied out");
    }
    Ok(())
}

fn write_private_key(path: &Path, key: &PKey<Private>) -> Result<()> {
    let pem = key
        .private_key_to_pem_pkcs8()
        .map_err(|e| anyhow!("Failed to serialize private key: {}", e))?;
    fs::write(path, pem)
        .with_context(|| format!("Failed to write private key {}", path.display()))
}

fn write_certificate(path: &Path, cert: &X509) -> Result<()> {
    let pem = cert
        .to_pem()
        .map_err(|e| anyhow!("Failed to serialize certificate: {}", e))?;
    fs::write(path, pem)
        .with_context(|| format!("Failed to write certificate {}", path.display()))
}

fn write_signing_request(path: &Path, req: &X509Req) -> Result<()> {
    let pem = req
        .to_pem()
        .map_err(|e| anyhow!("Failed to serialize signing request: {}", e))?;
    fs::write(path, pem)
        .with_context(|| format!("Failed to write signing request {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::ConfigOverlay;
    use openssl::stack::Stack;
    use openssl::x509::store::X509StoreBuilder;
    use openssl::x509::X509StoreContext;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> BootstrapConfig {
        test_config_with_cn(dir, "localhost")
    }

    fn test_config_with_cn(dir: &TempDir, common_name: &str) -> BootstrapConfig {
        ConfigOverlay {
            common_name: Some(common_name.to_string()),
            ca_common_name: Some("test-user".to_string()),
            scratch_dir: Some(dir.path().join("scratch")),
            output_dir: Some(dir.path().join("out")),
            ..Default::default()
        }
        .into_config()
    }

    fn load_cert(path: &PathBuf) -> X509 {
        X509::from_pem(&fs::read(path).unwrap()).unwrap()
    }

    fn verifies_against(ca: &X509, cert: &X509) -> bool {
        let mut store_builder = X509StoreBuilder::new().unwrap();
        store_builder.add_cert(ca.clone()).unwrap();
        let store = store_builder.build();

        let chain = Stack::<X509>::new().unwrap();
        let mut ctx = X509StoreContext::new().unwrap();
        ctx.init(&store, cert, &chain, |c| c.verify_cert()).unwrap()
    }

    #[test]
    fn test_fresh_run_produces_all_artifacts() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let outcome = ensure_local_dev_certificates(&config).unwrap();
        assert_eq!(outcome, BootstrapOutcome::Generated);

        // Terminal artifacts in the output directory
        for name in [SERVER_KEY_FILE, SERVER_CRT_FILE, CA_CRT_FILE] {
            assert!(config.output_dir.join(name).exists(), "missing {}", name);
        }

        // Intermediates (plus the serial file) in the scratch directory
        for name in [
            "ca.key",
            "ca.crt",
            "ca.srl",
            "server.key",
            "server.csr",
            "server.crt",
            "client.key",
            "client.csr",
            "client.crt",
        ] {
            assert!(config.scratch_dir.join(name).exists(), "missing {}", name);
        }
    }

    #[test]
    fn test_server_and_client_chain_to_ca() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        ensure_local_dev_certificates(&config).unwrap();

        let ca = load_cert(&config.ca_crt);
        let server = load_cert(&config.server_crt);
        let client = load_cert(&config.client_crt);

        assert!(verifies_against(&ca, &server));
        assert!(verifies_against(&ca, &client));
    }

    #[test]
    fn test_copy_out_matches_scratch_artifacts() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        ensure_local_dev_certificates(&config).unwrap();

        assert_eq!(
            fs::read(&config.server_crt).unwrap(),
            fs::read(config.output_dir.join(SERVER_CRT_FILE)).unwrap()
        );
        assert_eq!(
            fs::read(&config.ca_crt).unwrap(),
            fs::read(config.output_dir.join(CA_CRT_FILE)).unwrap()
        );
    }

    #[test]
    fn test_server_and_client_keys_differ() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        ensure_local_dev_certificates(&config).unwrap();

        assert_ne!(
            fs::read(&config.server_key).unwrap(),
            fs::read(&config.client_key).unwrap()
        );
    }

    #[test]
    fn test_configured_common_name_lands_in_san() {
        let dir = TempDir::new().unwrap();
        let config = test_config_with_cn(&dir, "example.test");
        ensure_local_dev_certificates(&config).unwrap();

        let server = load_cert(&config.server_crt);
        let sans = server.subject_alt_names().unwrap();
        assert_eq!(sans.len(), 2);

        let dns: Vec<_> = sans.iter().filter_map(|n| n.dnsname()).collect();
        assert_eq!(dns, vec!["example.test"]);
        let ips: Vec<_> = sans.iter().filter_map(|n| n.ipaddress()).collect();
        assert_eq!(ips, vec![&[127, 0, 0, 1][..]]);
    }

    #[test]
    fn test_validity_windows() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        ensure_local_dev_certificates(&config).unwrap();

        let ca = load_cert(&config.ca_crt);
        let ca_diff = ca.not_before().diff(ca.not_after()).unwrap();
        assert_eq!(ca_diff.days, 356);
        assert_eq!(ca_diff.secs, 0);

        for path in [&config.server_crt, &config.client_crt] {
            let cert = load_cert(path);
            let diff = cert.not_before().diff(cert.not_after()).unwrap();
            assert_eq!(diff.days, 365);
            assert_eq!(diff.secs, 0);
        }
    }

    #[test]
    fn test_existing_server_key_short_circuits() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        fs::create_dir_all(&config.output_dir).unwrap();
        let server_key_out = config.output_dir.join(SERVER_KEY_FILE);
        fs::write(&server_key_out, b"sentinel").unwrap();

        let outcome = ensure_local_dev_certificates(&config).unwrap();
        assert_eq!(outcome, BootstrapOutcome::AlreadyBootstrapped);

        // Nothing was written: the sentinel survives, the scratch directory
        // was never created
        assert_eq!(fs::read(&server_key_out).unwrap(), b"sentinel");
        assert!(!config.scratch_dir.exists());
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        assert_eq!(
            ensure_local_dev_certificates(&config).unwrap(),
            BootstrapOutcome::Generated
        );
        let first_crt = fs::read(config.output_dir.join(SERVER_CRT_FILE)).unwrap();

        assert_eq!(
            ensure_local_dev_certificates(&config).unwrap(),
            BootstrapOutcome::AlreadyBootstrapped
        );
        let second_crt = fs::read(config.output_dir.join(SERVER_CRT_FILE)).unwrap();
        assert_eq!(first_crt, second_crt);
    }

    #[test]
    fn test_failure_skips_copy_out() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        // Point the client key at an unwritable location so issuance fails
        // after the server artifacts are produced
        config.client_key = dir.path().join("missing-dir").join("client.key");

        assert!(ensure_local_dev_certificates(&config).is_err());
        assert!(!config.output_dir.join(SERVER_CRT_FILE).exists());
        assert!(!config.output_dir.join(CA_CRT_FILE).exists());
    }
}
