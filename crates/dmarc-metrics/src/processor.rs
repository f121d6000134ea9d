// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-object pipeline: read, extract, parse, flush.
//!
//! Objects of a batch are processed one after the other. The first failing
//! object aborts the batch and its error is returned to the caller.

use crate::error::{ObjectReadError, ProcessError};
use crate::extractor;
use crate::flusher::Flusher;
use crate::report;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

pub const SUCCESS_MESSAGE: &str = "DMARC reports processed successfully";

/// Read access to the object store holding delivered reports.
#[async_trait]
pub trait ObjectReader: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectReadError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

/// Response returned once a whole batch succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub status_code: u16,
    pub body: String,
}

impl BatchOutcome {
    #[must_use]
    pub fn success() -> Self {
        Self {
            status_code: 200,
            body: SUCCESS_MESSAGE.to_string(),
        }
    }
}

pub struct Processor {
    reader: Arc<dyn ObjectReader>,
    flusher: Flusher,
}

impl Processor {
    pub fn new(reader: Arc<dyn ObjectReader>, flusher: Flusher) -> Self {
        Self { reader, flusher }
    }

    pub async fn process_object(&self, bucket: &str, key: &str) -> Result<(), ProcessError> {
        info!("Processing DMARC report: {key}");

        let raw = self.reader.get(bucket, key).await?;
        let document = extractor::extract(&raw)?;
        debug!(
            "Extracted {} bytes from {key} ({:?})",
            document.bytes.len(),
            document.provenance
        );

        let report = report::parse(&document.bytes)?;
        info!(
            "Processing report from {}, ID: {}",
            report.organization, report.report_id
        );

        self.flusher.flush(&report).await?;
        Ok(())
    }

    /// Processes `objects` in order, stopping at the first failure.
    pub async fn process_batch(&self, objects: &[ObjectRef]) -> Result<BatchOutcome, ProcessError> {
        for object in objects {
            if let Err(e) = self.process_object(&object.bucket, &object.key).await {
                error!("Error processing {}: {e}", object.key);
                return Err(e);
            }
        }
        debug!("Processed {} objects", objects.len());
        Ok(BatchOutcome::success())
    }
}
