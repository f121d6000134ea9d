// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! AWS collaborators: S3 notifications and reads, SSM token lookup.

use async_trait::async_trait;
use aws_lambda_events::event::s3::S3Event;
use aws_sdk_s3::error::DisplayErrorContext;
use dmarc_metrics::error::ObjectReadError;
use dmarc_metrics::processor::{ObjectReader, ObjectRef};
use dmarc_metrics::token::TokenResolverFn;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::warn;

pub struct S3ObjectReader {
    client: aws_sdk_s3::Client,
}

impl S3ObjectReader {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectReader for S3ObjectReader {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectReadError> {
        let read_error = |message: String| ObjectReadError {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| read_error(DisplayErrorContext(&e).to_string()))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| read_error(e.to_string()))?;

        Ok(data.into_bytes().to_vec())
    }
}

/// Resolves the push token from an SSM SecureString parameter.
pub fn ssm_token_resolver(client: aws_sdk_ssm::Client, parameter: String) -> TokenResolverFn {
    Arc::new(move || -> Pin<Box<dyn Future<Output = Result<String, String>> + Send>> {
        let client = client.clone();
        let parameter = parameter.clone();
        Box::pin(async move {
            let response = client
                .get_parameter()
                .name(&parameter)
                .with_decryption(true)
                .send()
                .await
                .map_err(|e| {
                    format!(
                        "Failed to get parameter {parameter}: {}",
                        aws_sdk_ssm::error::DisplayErrorContext(&e)
                    )
                })?;

            response
                .parameter()
                .and_then(|p| p.value())
                .map(str::to_string)
                .ok_or_else(|| format!("Parameter {parameter} has no value"))
        })
    })
}

/// Objects named by an S3 notification, in delivery order.
pub fn object_refs(event: &S3Event) -> Vec<ObjectRef> {
    event
        .records
        .iter()
        .filter_map(|record| {
            object_ref(
                record.s3.bucket.name.as_deref(),
                record.s3.object.key.as_deref(),
            )
        })
        .collect()
}

fn object_ref(bucket: Option<&str>, key: Option<&str>) -> Option<ObjectRef> {
    match (bucket, key) {
        (Some(bucket), Some(key)) => Some(ObjectRef::new(bucket, decode_key(key))),
        _ => {
            warn!("Skipping notification without bucket or key: {bucket:?} {key:?}");
            None
        }
    }
}

/// Notification keys are form-encoded: `+` for space, `%XX` for the rest.
fn decode_key(key: &str) -> String {
    let spaced = key.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            warn!("Using raw object key {key}: {e}");
            key.to_string()
        }
    }
}
