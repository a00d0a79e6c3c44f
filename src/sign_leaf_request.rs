//! End-Entity Certificate Signing Module
//!
//! This module turns a certificate signing request into an end-entity TLS
//! certificate signed by the development CA, completing the chain:
//!
//! **Development CA → Server/Client Certificate**
//!
//! # X.509 Extensions
//! Issued certificates include:
//! - **Basic Constraints**: CA=false (end-entity certificate)
//! - **Key Usage**: `digitalSignature`, `keyEncipherment` (for TLS handshakes
//!   and RSA key exchange)
//! - **Extended Key Usage**: `serverAuth`, `clientAuth` (the same certificate
//!   shape serves both ends of a locally tested connection)
//! - **Subject Alternative Name**: `DNS:<common-name>, IP:127.0.0.1`
//!
//! Serial numbers come from the CA's serial-number file, created on first
//! signing; see [`crate::serial_file`].

use anyhow::{anyhow, bail, Result};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::{X509Req, X509};
use std::path::PathBuf;

// Add X.509v3 extensions
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
};

use crate::serial_file;
use crate::validity::validity_window;

const X509_VERSION_3: i32 = 2; // X509 version 3 is represented by 2
const LEAF_VALIDITY_DAYS: u32 = 365;

/// Signs end-entity requests with the development CA key and certificate.
///
/// One signer instance issues every leaf certificate of a bootstrap run, so
/// server and client certificates always chain to the same CA. The signer
/// owns the CA material and the path of the serial-number file.
///
/// # Examples
/// ```rust,no_run
/// use cert_bootstrap::generate_leaf_request::RsaLeafRequestBuilder;
/// use cert_bootstrap::generate_root_ca::RsaRootCaBuilder;
/// use cert_bootstrap::sign_leaf_request::RsaLeafSigner;
/// # use anyhow::Result;
/// # fn example() -> Result<()> {
/// let (ca_key, ca_cert) = RsaRootCaBuilder::new("alice".to_string()).build()?;
/// let signer = RsaLeafSigner::new(ca_key, ca_cert, "certs/ca.srl".into());
///
/// let (key, csr) = RsaLeafRequestBuilder::new("localhost".to_string()).build()?;
/// let cert = signer.sign(&csr)?;
/// # Ok(())
/// # }
/// ```
pub struct RsaLeafSigner {
    ca_key: PKey<Private>,
    ca_cert: X509,
    serial_path: PathBuf,
    validity_days: u32,
}

impl RsaLeafSigner {
    /// Create a new signer
    ///
    /// # Arguments
    /// * `ca_key` - CA private key used to sign issued certificates
    /// * `ca_cert` - CA certificate (issuer name and extension context)
    /// * `serial_path` - Path of the CA serial-number file
    pub fn new(ca_key: PKey<Private>, ca_cert: X509, serial_path: PathBuf) -> Self {
        Self {
            ca_key,
            ca_cert,
            serial_path,
            validity_days: LEAF_VALIDITY_DAYS,
        }
    }

    /// Set validity period in days for issued certificates
    pub fn validity_days(mut self, days: u32) -> Self {
        self.validity_days = days;
        self
    }

    /// Sign a request, producing an end-entity certificate
    ///
    /// The request's proof-of-possession signature is verified before
    /// signing. The subject is taken from the request unchanged; the
    /// subjectAltName DNS entry mirrors the request's common name.
    ///
    /// # Returns
    /// * `Ok(X509)` - The signed certificate
    /// * `Err(anyhow::Error)` - If the request is invalid or signing fails
    pub fn sign(&self, req: &X509Req) -> Result<X509> {
        let req_pubkey = req
            .public_key()
            .map_err(|e| anyhow!("Failed to read request public key: {}", e))?;

        if !req
            .verify(&req_pubkey)
            .map_err(|e| anyhow!("Failed to verify request signature: {}", e))?
        {
            bail!("Request signature does not match its public key");
        }

        let common_name = request_common_name(req)?;

        // Build X509 certificate from the request
        let mut builder =
            X509::builder().map_err(|e| anyhow!("Failed to create X509 builder: {}", e))?;

        builder
            .set_version(X509_VERSION_3)
            .map_err(|e| anyhow!("Failed to set version: {}", e))?;

        let serial = serial_file::next_serial(&self.serial_path)?;
        builder
            .set_serial_number(&serial)
            .map_err(|e| anyhow!("Failed to set serial number: {}", e))?;

        builder
            .set_subject_name(req.subject_name())
            .map_err(|e| anyhow!("Failed to set subject: {}", e))?;

        builder
            .set_issuer_name(self.ca_cert.subject_name())
            .map_err(|e| anyhow!("Failed to set issuer: {}", e))?;

        let (not_before, not_after) = validity_window(self.validity_days)?;
        builder
            .set_not_before(&not_before)
            .map_err(|e| anyhow!("Failed to set not_before: {}", e))?;
        builder
            .set_not_after(&not_after)
            .map_err(|e| anyhow!("Failed to set not_after: {}", e))?;

        builder
            .set_pubkey(&req_pubkey)
            .map_err(|e| anyhow!("Failed to set public key: {}", e))?;

        // CA=false (end-entity certificate)
        let bc = BasicConstraints::new()
            .critical()
            .build()
            .map_err(|e| anyhow!("Failed to build BasicConstraints: {}", e))?;
        builder
            .append_extension(bc)
            .map_err(|e| anyhow!("Failed to add BasicConstraints: {}", e))?;

        let ku = KeyUsage::new()
            .critical()
            .digital_signature()
            .key_encipherment()
            .build()
            .map_err(|e| anyhow!("Failed to build KeyUsage: {}", e))?;
        builder
            .append_extension(ku)
            .map_err(|e| anyhow!("Failed to add KeyUsage: {}", e))?;

        let eku = ExtendedKeyUsage::new()
            .server_auth()
            .client_auth()
            .build()
            .map_err(|e| anyhow!("Failed to build ExtendedKeyUsage: {}", e))?;
        builder
            .append_extension(eku)
            .map_err(|e| anyhow!("Failed to add ExtendedKeyUsage: {}", e))?;

        // subjectAltName: the request's common name plus the IPv4 loopback
        let san = SubjectAlternativeName::new()
            .dns(&common_name)
            .ip("127.0.0.1")
            .build(&builder.x509v3_context(Some(&self.ca_cert), None))
            .map_err(|e| anyhow!("Failed to build SubjectAlternativeName: {}", e))?;
        builder
            .append_extension(san)
            .map_err(|e| anyhow!("Failed to add SubjectAlternativeName: {}", e))?;

        builder
            .sign(&self.ca_key, MessageDigest::sha256())
            .map_err(|e| anyhow!("Failed to sign certificate: {}", e))?;

        Ok(builder.build())
    }
}

fn request_common_name(req: &X509Req) -> Result<String> {
    let entry = req
        .subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .ok_or_else(|| anyhow!("Request subject has no common name"))?;

    Ok(entry
        .data()
        .as_utf8()
        .map_err(|e| anyhow!("Request common name is not valid UTF-8: {}", e))?
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate_leaf_request::RsaLeafRequestBuilder;
    use crate::generate_root_ca::RsaRootCaBuilder;
    use openssl::x509::X509VerifyResult;
    use tempfile::TempDir;

    fn test_signer(dir: &TempDir) -> RsaLeafSigner {
        let (ca_key, ca_cert) = RsaRootCaBuilder::new("test-ca".to_string()).build().unwrap();
        RsaLeafSigner::new(ca_key, ca_cert, dir.path().join("ca.srl"))
    }

    #[test]
    fn test_signed_cert_chains_to_ca() {
        let dir = TempDir::new().unwrap();
        let (ca_key, ca_cert) = RsaRootCaBuilder::new("test-ca".to_string()).build().unwrap();
        let signer = RsaLeafSigner::new(ca_key.clone(), ca_cert.clone(), dir.path().join("ca.srl"));

        let (_, req) = RsaLeafRequestBuilder::new("localhost".to_string())
            .build()
            .unwrap();
        let cert = signer.sign(&req).unwrap();

        assert!(cert.verify(&ca_key).unwrap());
        assert_eq!(ca_cert.issued(&cert), X509VerifyResult::OK);
    }

    #[test]
    fn test_subject_alt_name_entries() {
        let dir = TempDir::new().unwrap();
        let signer = test_signer(&dir);

        let (_, req) = RsaLeafRequestBuilder::new("example.test".to_string())
            .build()
            .unwrap();
        let cert = signer.sign(&req).unwrap();

        let sans = cert.subject_alt_names().unwrap();
        assert_eq!(sans.len(), 2);

        let dns: Vec<_> = sans.iter().filter_map(|n| n.dnsname()).collect();
        assert_eq!(dns, vec!["example.test"]);

        let ips: Vec<_> = sans.iter().filter_map(|n| n.ipaddress()).collect();
        assert_eq!(ips, vec![&[127, 0, 0, 1][..]]);
    }

    #[test]
    fn test_validity_is_365_days() {
        let dir = TempDir::new().unwrap();
        let signer = test_signer(&dir);

        let (_, req) = RsaLeafRequestBuilder::new("localhost".to_string())
            .build()
            .unwrap();
        let cert = signer.sign(&req).unwrap();

        let diff = cert.not_before().diff(cert.not_after()).unwrap();
        assert_eq!(diff.days, 365);
        assert_eq!(diff.secs, 0);
    }

    #[test]
    fn test_extended_key_usage_covers_both_ends() {
        let dir = TempDir::new().unwrap();
        let signer = test_signer(&dir);

        let (_, req) = RsaLeafRequestBuilder::new("localhost".to_string())
            .build()
            .unwrap();
        let cert = signer.sign(&req).unwrap();

        let text = String::from_utf8(cert.to_text().unwrap()).unwrap();
        assert!(text.contains("TLS Web Server Authentication"));
        assert!(text.contains("TLS Web Client Authentication"));
    }

    #[test]
    fn test_serial_file_created_and_advancing() {
        let dir = TempDir::new().unwrap();
        let signer = test_signer(&dir);
        let serial_path = dir.path().join("ca.srl");
        assert!(!serial_path.exists());

        let (_, req_a) = RsaLeafRequestBuilder::new("localhost".to_string())
            .build()
            .unwrap();
        let (_, req_b) = RsaLeafRequestBuilder::new("localhost".to_string())
            .build()
            .unwrap();
        let cert_a = signer.sign(&req_a).unwrap();
        let cert_b = signer.sign(&req_b).unwrap();

        assert!(serial_path.exists());
        let serial_a = cert_a.serial_number().to_bn().unwrap();
        let serial_b = cert_b.serial_number().to_bn().unwrap();
        assert_ne!(serial_a, serial_b);
    }

    #[test]
    fn test_request_without_common_name_is_rejected() {
        let dir = TempDir::new().unwrap();
        let signer = test_signer(&dir);

        // Hand-build a request whose subject carries no CN
        let rsa = openssl::rsa::Rsa::generate(2048).unwrap();
        let key = PKey::from_rsa(rsa).unwrap();
        let name = openssl::x509::X509Name::builder().unwrap().build();
        let mut req_builder = openssl::x509::X509ReqBuilder::new().unwrap();
        req_builder.set_subject_name(&name).unwrap();
        req_builder.set_pubkey(&key).unwrap();
        req_builder.sign(&key, MessageDigest::sha256()).unwrap();
        let req = req_builder.build();

        let err = signer.sign(&req).unwrap_err();
        assert!(err.to_string().contains("no common name"));
    }
}
