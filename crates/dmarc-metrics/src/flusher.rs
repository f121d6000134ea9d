// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pushes report samples to a remote-write endpoint.
//!
//! Every report becomes exactly one request: all of its samples share one
//! timestamp and travel in a single `WriteRequest`. Nothing is retried here;
//! a failed push fails the report.

use crate::compression::Compression;
use crate::error::SinkError;
use crate::metric::{report_samples, MetricSample};
use crate::report::AggregateReport;
use crate::token::TokenFactory;
use crate::wire;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info};

const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";
const REMOTE_WRITE_VERSION_HEADER: &str = "X-Prometheus-Remote-Write-Version";
const REMOTE_WRITE_VERSION: &str = "0.1.0";

pub struct FlusherConfig {
    pub token_factory: Arc<TokenFactory>,
    pub push_url: String,
    pub user_id: String,
    pub timeout: Duration,
    pub compression: Compression,
}

#[derive(Debug, Clone)]
pub struct Flusher {
    client: reqwest::Client,
    // Resolution is deferred until the first flush
    token_factory: Arc<TokenFactory>,
    push_url: String,
    user_id: String,
    timeout: Duration,
    compression: Compression,
}

impl Flusher {
    pub fn new(config: FlusherConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Flusher {
            client,
            token_factory: config.token_factory,
            push_url: config.push_url,
            user_id: config.user_id,
            timeout: config.timeout,
            compression: config.compression,
        })
    }

    /// Flush every record of `report` as one batch. A report without
    /// records sends nothing.
    pub async fn flush(&self, report: &AggregateReport) -> Result<(), SinkError> {
        if report.records.is_empty() {
            debug!(
                "Report {} from {} has no records, nothing to flush",
                report.report_id, report.organization
            );
            return Ok(());
        }

        let samples = report_samples(report, now_ms());
        self.flush_samples(&samples).await?;

        for record in &report.records {
            info!(
                "Sent metrics for {} emails from {} (DMARC: {})",
                record.count, record.source_ip, record.dmarc_result
            );
        }
        Ok(())
    }

    /// Flush given batch of samples
    pub async fn flush_samples(&self, samples: &[MetricSample]) -> Result<(), SinkError> {
        if samples.is_empty() {
            return Ok(());
        }

        let payload = wire::encode_samples(samples);
        let (body, compression) = self.compression.compress(&payload)?;
        debug!(
            "Flushing {} samples ({} bytes, {} encoded as {} bytes)",
            samples.len(),
            payload.len(),
            compression.content_encoding(),
            body.len()
        );

        let token = self.token_factory.get_token().await.map_err(|e| {
            error!("Failed to resolve push token: {e}");
            SinkError::Token(e)
        })?;

        let response = self
            .client
            .post(&self.push_url)
            .timeout(self.timeout)
            .headers(headers(compression))
            .basic_auth(&self.user_id, Some(token))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("{status}: Failed to push to backend: {body:?}");
            return Err(SinkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Successfully flushed {} samples", samples.len());
        Ok(())
    }
}

fn headers(compression: Compression) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_PROTOBUF));
    headers.insert(
        CONTENT_ENCODING,
        HeaderValue::from_static(compression.content_encoding()),
    );
    headers.insert(
        REMOTE_WRITE_VERSION_HEADER,
        HeaderValue::from_static(REMOTE_WRITE_VERSION),
    );
    headers
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}
