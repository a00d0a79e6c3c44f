//! End-Entity Key Pair and Signing Request Generation Module
//!
//! This module generates the RSA key pair and certificate signing request for
//! an end-entity (server or client) certificate. The request is subsequently
//! submitted to the development CA for signing; see
//! [`crate::sign_leaf_request`].
//!
//! # PKI Hierarchy Position
//! ```text
//! Development CA (self-signed)
//!   ├── Server Certificate ← request generated here, signed by the CA
//!   └── Client Certificate ← request generated here, signed by the CA
//! ```
//!
//! Subject fields other than the common name are fixed development defaults.
//! Server and client requests are structurally identical and independently
//! generated; only the fresh key material differs.

use anyhow::{anyhow, Result};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::x509::{X509Name, X509Req, X509ReqBuilder};

const RSA_KEY_SIZE: u32 = 2048;

const LEAF_ORGANIZATION: &str = "Local Development";
const LEAF_ORGANIZATIONAL_UNIT: &str = "Dev Certificates";

// ================= RSA Leaf Request Builder =================

/// Builder for generating an RSA key pair and a certificate signing request
///
/// Produces an unsigned request carrying the subject distinguished name and
/// the public half of a freshly generated RSA-2048 key. The request is
/// self-signed with SHA-256 as proof of possession, never with a passphrase.
///
/// # Examples
/// ```rust,no_run
/// use cert_bootstrap::generate_leaf_request::RsaLeafRequestBuilder;
/// # use anyhow::Result;
/// # fn example() -> Result<()> {
/// let (server_key, server_csr) =
///     RsaLeafRequestBuilder::new("localhost".to_string()).build()?;
/// # Ok(())
/// # }
/// ```
pub struct RsaLeafRequestBuilder {
    common_name: String,
    organization: String,
    organizational_unit: String,
}

impl RsaLeafRequestBuilder {
    /// Create a new request builder with the given common name
    ///
    /// # Arguments
    /// * `common_name` - Hostname the certificate will be issued for (e.g. "localhost")
    pub fn new(common_name: String) -> Self {
        Self {
            common_name,
            organization: LEAF_ORGANIZATION.to_string(),
            organizational_unit: LEAF_ORGANIZATIONAL_UNIT.to_string(),
        }
    }

    /// Set the organization (O) for the request subject
    pub fn organization(mut self, org: String) -> Self {
        self.organization = org;
        self
    }

    /// Set the organizational unit (OU) for the request subject
    pub fn organizational_unit(mut self, ou: String) -> Self {
        self.organizational_unit = ou;
        self
    }

    /// Build the RSA key pair and signing request
    ///
    /// # Returns
    /// * `Ok((PKey<Private>, X509Req))` - Tuple of (private key, signing request)
    /// * `Err(anyhow::Error)` - If key generation or request construction fails
    pub fn build(self) -> Result<(PKey<Private>, X509Req)> {
        // Generate RSA key pair
        let rsa = openssl::rsa::Rsa::generate(RSA_KEY_SIZE)
            .map_err(|e| anyhow!("Failed to generate RSA keypair: {}", e))?;

        let private_key =
            PKey::from_rsa(rsa).map_err(|e| anyhow!("Failed to create private key: {}", e))?;

        // Build subject name
        let mut name_builder =
            X509Name::builder().map_err(|e| anyhow!("Failed to create name builder: {}", e))?;
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

        // Build the signing request
        let mut req_builder = X509ReqBuilder::new()
            .map_err(|e| anyhow!("Failed to create request builder: {}", e))?;

        req_builder
            .set_subject_name(&name)
            .map_err(|e| anyhow!("Failed to set request subject: {}", e))?;

        req_builder
            .set_pubkey(&private_key)
            .map_err(|e| anyhow!("Failed to set request public key: {}", e))?;

        req_builder
            .sign(&private_key, MessageDigest::sha256())
            .map_err(|e| anyhow!("Failed to sign request: {}", e))?;

        Ok((private_key, req_builder.build()))
    }
}
