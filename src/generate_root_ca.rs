//! Root CA Certificate Generation Module
//!
//! This module provides functionality for generating the self-signed CA
//! certificate that anchors the local development trust chain.
//!
//! # PKI Hierarchy Position
//! ```text
//! Development CA (self-signed) ← This module
//!   ├── Server Certificate (signed by the CA)
//!   └── Client Certificate (signed by the CA)
//! ```
//!
//! # Certificate Properties
//! - **Self-signed**: Issuer and subject are the same
//! - **Key Usage**: keyCertSign, cRLSign
//! - **Basic Constraints**: CA=true, pathlen=0 (signs end-entity certificates only)
//! - **Key Size**: RSA 2048-bit
//! - **Default Validity**: 356 days
//! - **Version**: X.509v3 with extensions
//!
//! # Example
//! ```rust,no_run
//! use cert_bootstrap::generate_root_ca::RsaRootCaBuilder;
//! # use anyhow::Result;
//! # fn example() -> Result<()> {
//! let (ca_key, ca_cert) = RsaRootCaBuilder::new("alice".to_string()).build()?;
//! # Ok(())
//! # }
//! ```

use anyhow::{anyhow, Result};
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;

// Add X.509v3 extensions
use openssl::x509::extension::{BasicConstraints, KeyUsage};

use crate::validity::validity_window;

const X509_VERSION_3: i32 = 2; // X509 version 3 is represented by 2
const RSA_KEY_SIZE: u32 = 2048;
const CA_VALIDITY_DAYS: u32 = 356;

// ================= RSA Root CA Builder =================

/// Builder for generating an RSA key pair and self-signed development CA certificate
///
/// The CA produced here is the trust anchor for locally issued TLS certificates.
/// Its common name defaults to the invoking user's name so that certificates
/// showing up in browser or keychain dialogs are attributable to the developer
/// machine that issued them.
///
/// # Examples
/// ```rust,no_run
/// use cert_bootstrap::generate_root_ca::RsaRootCaBuilder;
/// # use anyhow::Result;
/// # fn example() -> Result<()> {
/// let (private_key, certificate) = RsaRootCaBuilder::new("alice".to_string())
///     .organization("Local Development".to_string())
///     .validity_days(356)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RsaRootCaBuilder {
    common_name: String,
    organization: String,
    organizational_unit: String,
    validity_days: u32,
}

impl RsaRootCaBuilder {
    /// Create a new CA builder with the given common name
    ///
    /// # Arguments
    /// * `common_name` - CA name, conventionally the invoking user's name
    pub fn new(common_name: String) -> Self {
        Self {
            common_name,
            organization: "Local Development".to_string(),
            organizational_unit: "Development CA".to_string(),
            validity_days: CA_VALIDITY_DAYS,
        }
    }

    /// Set the organization (O) for the certificate
    pub fn organization(mut self, org: String) -> Self {
        self.organization = org;
        self
    }

    /// Set the organizational unit (OU) for the certificate
    pub fn organizational_unit(mut self, ou: String) -> Self {
        self.organizational_unit = ou;
        self
    }

    /// Set validity period in days
    pub fn validity_days(mut self, days: u32) -> Self {
        self.validity_days = days;
        self
    }

    /// Build the RSA key pair and self-signed CA certificate
    ///
    /// Generates a new RSA-2048 key pair and creates a self-signed X.509v3
    /// certificate with CA capabilities. The private key is not protected by
    /// a passphrase; these are throwaway development credentials.
    ///
    /// # Certificate Properties
    /// - **Version**: X.509v3
    /// - **Key Size**: RSA 2048-bit
    /// - **Signature Algorithm**: SHA-256 with RSA
    /// - **Basic Constraints**: CA=true, pathlen=0, critical
    /// - **Key Usage**: keyCertSign, cRLSign
    /// - **Serial Number**: Random 128-bit number
    /// - **Issuer**: Same as subject (self-signed)
    ///
    /// # Returns
    /// * `Ok((PKey<Private>, X509))` - Tuple of (private key, self-signed certificate)
    /// * `Err(anyhow::Error)` - If key generation or certificate construction fails
    pub fn build(self) -> Result<(PKey<Private>, X509)> {
        // Generate RSA key pair
        let rsa = openssl::rsa::Rsa::generate(RSA_KEY_SIZE)
            .map_err(|e| anyhow!("Failed to generate RSA keypair: {}", e))?;

        let private_key =
            PKey::from_rsa(rsa).map_err(|e| anyhow!("Failed to create private key: {}", e))?;

        // Build X509 certificate
        let mut builder =
            X509::builder().map_err(|e| anyhow!("Failed to create X509 builder: {}", e))?;

        builder
            .set_version(X509_VERSION_3)
            .map_err(|e| anyhow!("Failed to set version: {}", e))?;

        // Generate random 128-bit (16-byte) serial number
        let mut serial = BigNum::new()?;
        serial.rand(128, MsbOption::MAYBE_ZERO, false)?;
        let asn1_serial = serial.to_asn1_integer()?;
        builder.set_serial_number(&asn1_serial)?;

        // Build subject/issuer name
        let mut name_builder = openssl::x509::X509Name::builder()
            .map_err(|e| anyhow!("Failed to create name builder: {}", e))?;
        name_builder
            .append_entry_by_nid(openssl::nid::Nid::COMMONNAME, &self.common_name)
            .map_err(|e| anyhow!("Failed to set CN: {}", e))?;

        name_builder
            .append_entry_by_nid(openssl::nid::Nid::ORGANIZATIONNAME, &self.organization)
            .map_err(|e| anyhow!("Failed to set organization: {}", e))?;

        name_builder
            .append_entry_by_nid(
                openssl::nid::Nid::ORGANIZATIONALUNITNAME,
                &self.organizational_unit,
            )
            .map_err(|e| anyhow!("Failed to set organizational unit: {}", e))?;

        let name = name_builder.build();

        builder
            .set_subject_name(&name)
            .map_err(|e| anyhow!("Failed to set subject: {}", e))?;

        builder
            .set_issuer_name(&name)
            .map_err(|e| anyhow!("Failed to set issuer: {}", e))?;

        let (not_before, not_after) = validity_window(self.validity_days)?;
        builder
            .set_not_before(&not_before)
            .map_err(|e| anyhow!("Failed to set not_before: {}", e))?;
        builder
            .set_not_after(&not_after)
            .map_err(|e| anyhow!("Failed to set not_after: {}", e))?;

        // Set public key (extracted from private_key automatically)
        builder
            .set_pubkey(&private_key)
            .map_err(|e| anyhow!("Failed to set public key: {}", e))?;

        // CA=true, pathlen=0: the CA signs end-entity certificates directly
        let mut bc = BasicConstraints::new();
        bc.critical().ca().pathlen(0);
        let extension = bc
            .build()
            .map_err(|e| anyhow!("Failed to build BasicConstraints: {}", e))?;
        builder
            .append_extension(extension)
            .map_err(|e| anyhow!("Failed to add BasicConstraints: {}", e))?;

        let mut ku = KeyUsage::new();
        ku.critical();
        ku.key_cert_sign();
        ku.crl_sign();
        let ku_extension = ku
            .build()
            .map_err(|e| anyhow!("Failed to build KeyUsage: {}", e))?;
        builder
            .append_extension(ku_extension)
            .map_err(|e| anyhow!("Failed to add KeyUsage: {}", e))?;

        builder
            .sign(&private_key, MessageDigest::sha256())
            .map_err(|e| anyhow!("Failed to sign certificate: {}", e))?;

        Ok((private_key, builder.build()))
    }
}
