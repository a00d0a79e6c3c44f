//! CA serial-number file handling.
//!
//! The CA keeps its issuance counter in a hex-encoded text file next to the
//! CA certificate (`ca.crt` → `ca.srl`). The file is seeded with a random
//! 128-bit value on first use and incremented on every signing.

use anyhow::{anyhow, Context, Result};
use openssl::asn1::Asn1Integer;
use openssl::bn::{BigNum, MsbOption};
use std::fs;
use std::path::{Path, PathBuf};

/// Serial-file path for a given CA certificate path (`ca.crt` → `ca.srl`).
pub fn path_for(ca_cert_path: &Path) -> PathBuf {
    ca_cert_path.with_extension("srl")
}

/// Read, increment, and persist the CA serial number.
///
/// Creates the file with a random seed when it does not exist. The returned
/// serial is the incremented value, which is also what the file holds
/// afterwards. A file that exists but does not parse as hex is a fatal error.
pub fn next_serial(path: &Path) -> Result<Asn1Integer> {
    let mut serial = if path.exists() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read serial file {}", path.display()))?;
        BigNum::from_hex_str(text.trim())
            .map_err(|e| anyhow!("Malformed serial file {}: {}", path.display(), e))?
    } else {
        let mut seed = BigNum::new()?;
        seed.rand(128, MsbOption::MAYBE_ZERO, false)?;
        seed
    };

    serial
        .add_word(1)
        .map_err(|e| anyhow!("Failed to increment serial: {}", e))?;

    fs::write(path, format!("{}\n", serial.to_hex_str()?))
        .with_context(|| format!("Failed to write serial file {}", path.display()))?;

    serial
        .to_asn1_integer()
        .map_err(|e| anyhow!("Failed to convert serial to ASN.1: {}", e))
}
