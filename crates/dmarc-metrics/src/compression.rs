// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Payload compression for remote-write pushes.
//!
//! The codec is negotiated once when the configuration is resolved. Snappy
//! block compression is preferred and is available whenever the crate is
//! built with the `snappy` feature; otherwise payloads are gzipped.

use crate::error::SinkError;
use std::io::Write;
use std::str::FromStr;
use tracing::warn;

/// Whether the snappy codec was compiled in.
pub const SNAPPY_AVAILABLE: bool = cfg!(feature = "snappy");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Snappy,
    Gzip,
}

/// Codec requested by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionPreference {
    #[default]
    Auto,
    Snappy,
    Gzip,
}

impl FromStr for CompressionPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "snappy" => Ok(Self::Snappy),
            "gzip" => Ok(Self::Gzip),
            other => Err(format!(
                "Invalid compression '{other}'. Must be one of: auto, snappy, gzip"
            )),
        }
    }
}

impl Compression {
    /// Resolves the codec for the process lifetime.
    #[must_use]
    pub fn negotiate(preference: CompressionPreference) -> Self {
        Self::negotiate_with(preference, SNAPPY_AVAILABLE)
    }

    fn negotiate_with(preference: CompressionPreference, snappy_available: bool) -> Self {
        match preference {
            CompressionPreference::Gzip => Compression::Gzip,
            CompressionPreference::Auto | CompressionPreference::Snappy if snappy_available => {
                Compression::Snappy
            }
            CompressionPreference::Auto | CompressionPreference::Snappy => {
                warn!("Snappy compression not available, falling back to gzip");
                Compression::Gzip
            }
        }
    }

    /// Value of the `Content-Encoding` header.
    #[must_use]
    pub fn content_encoding(self) -> &'static str {
        match self {
            Compression::Snappy => "snappy",
            Compression::Gzip => "gzip",
        }
    }

    /// Compresses `data`, returning the bytes together with the codec that
    /// actually produced them. A snappy failure degrades to gzip.
    pub fn compress(self, data: &[u8]) -> Result<(Vec<u8>, Compression), SinkError> {
        match self {
            Compression::Snappy => match snappy(data) {
                Ok(compressed) => Ok((compressed, Compression::Snappy)),
                Err(e) => {
                    warn!("Snappy compression failed, falling back to gzip: {e}");
                    Ok((gzip(data)?, Compression::Gzip))
                }
            },
            Compression::Gzip => Ok((gzip(data)?, Compression::Gzip)),
        }
    }
}

#[cfg(feature = "snappy")]
fn snappy(data: &[u8]) -> Result<Vec<u8>, String> {
    snap::raw::Encoder::new()
        .compress_vec(data)
        .map_err(|e| e.to_string())
}

#[cfg(not(feature = "snappy"))]
fn snappy(_data: &[u8]) -> Result<Vec<u8>, String> {
    Err("snappy support not compiled in".to_string())
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, SinkError> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SinkError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| SinkError::Compression(e.to_string()))
}
