// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::num::ParseIntError;
use std::str::Utf8Error;

/// The bytes are not a well-formed report document.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Document is not valid UTF-8: {0}")]
    Encoding(#[from] Utf8Error),

    #[error("Malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Invalid record count '{value}': {source}")]
    InvalidCount {
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// No interpretation of the object yielded a report document.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("no valid document found")]
    NoValidDocument,

    #[error(transparent)]
    Document(#[from] ParseError),
}

/// The batch could not be delivered to the metrics backend.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Failed to resolve push token: {0}")]
    Token(String),

    #[error("Failed to send request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{status}: Failed to push to backend: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to compress payload: {0}")]
    Compression(String),
}

#[derive(Debug, thiserror::Error)]
#[error("Failed to read s3://{bucket}/{key}: {message}")]
pub struct ObjectReadError {
    pub bucket: String,
    pub key: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Failure of a single object, carried back to the batch loop.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Read(#[from] ObjectReadError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}
