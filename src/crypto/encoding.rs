//! Segment encodings for the envelope wire format.
//!
//! Each half of an envelope is a base64 string, but the deployed format
//! does not base64 the raw bytes.  It first renders them as comma-joined
//! decimal numbers and base64-encodes that text:
//!
//! ```text
//! [126, 160, 19]  ->  "126,160,19"  ->  "MTI2LDE2MCwxOQ=="
//! ```
//!
//! That is `SegmentEncoding::DecimalList`, the default.  `Raw` is plain
//! `base64(bytes)` for hosts that never need to talk to old data.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::errors::{PmVaultError, Result};

/// How the bytes of one envelope segment are turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentEncoding {
    /// `base64("b0,b1,b2,...")`, the deployed format.
    #[default]
    DecimalList,
    /// `base64(bytes)`.
    Raw,
}

impl SegmentEncoding {
    /// Encode one segment.
    pub fn encode(self, bytes: &[u8]) -> String {
        match self {
            SegmentEncoding::Raw => BASE64.encode(bytes),
            SegmentEncoding::DecimalList => {
                let text = bytes
                    .iter()
                    .map(u8::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                BASE64.encode(text)
            }
        }
    }

    /// Decode one segment.
    pub fn decode(self, segment: &str) -> Result<Vec<u8>> {
        let decoded = BASE64
            .decode(segment.trim())
            .map_err(|e| PmVaultError::MalformedCiphertext(format!("invalid base64: {e}")))?;

        match self {
            SegmentEncoding::Raw => Ok(decoded),
            SegmentEncoding::DecimalList => parse_decimal_list(&decoded),
        }
    }
}

/// Parse `"1,2,3"` (as bytes) into `[1, 2, 3]`.
fn parse_decimal_list(text: &[u8]) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(text).map_err(|_| {
        PmVaultError::MalformedCiphertext("decimal list is not valid UTF-8".into())
    })?;

    if text.is_empty() {
        return Ok(Vec::new());
    }

    text.split(',')
        .map(|item| {
            item.trim().parse::<u8>().map_err(|_| {
                PmVaultError::MalformedCiphertext(format!("'{item}' is not a byte value"))
            })
        })
        .collect()
}

impl fmt::Display for SegmentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentEncoding::DecimalList => f.write_str("decimal-list"),
            SegmentEncoding::Raw => f.write_str("raw"),
        }
    }
}

impl FromStr for SegmentEncoding {
    type Err = PmVaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "decimal-list" => Ok(SegmentEncoding::DecimalList),
            "raw" => Ok(SegmentEncoding::Raw),
            other => Err(PmVaultError::ConfigError(format!(
                "unknown segment encoding '{other}' (expected 'decimal-list' or 'raw')"
            ))),
        }
    }
}
