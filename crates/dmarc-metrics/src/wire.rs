// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Encoder for the subset of the remote-write `WriteRequest` message that a
//! pure producer needs:
//!
//! ```text
//! WriteRequest { repeated TimeSeries timeseries = 1; }
//! TimeSeries   { repeated Label labels = 1; repeated Sample samples = 2; }
//! Label        { string name = 1; string value = 2; }
//! Sample       { double value = 1; int64 timestamp = 2; }
//! ```
//!
//! Every builder is a pure function returning freshly encoded bytes.

use crate::metric::{Labels, MetricSample, METRIC_NAME_LABEL};
use crate::varint::{encode_length_delimited, encode_tag, encode_varint, WireType};

const LABEL_NAME_FIELD: u32 = 1;
const LABEL_VALUE_FIELD: u32 = 2;
const SAMPLE_VALUE_FIELD: u32 = 1;
const SAMPLE_TIMESTAMP_FIELD: u32 = 2;
const SERIES_LABEL_FIELD: u32 = 1;
const SERIES_SAMPLE_FIELD: u32 = 2;
const REQUEST_SERIES_FIELD: u32 = 1;

#[must_use]
pub fn label(name: &str, value: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(name.len() + value.len() + 4);
    encode_length_delimited(LABEL_NAME_FIELD, name.as_bytes(), &mut buf);
    encode_length_delimited(LABEL_VALUE_FIELD, value.as_bytes(), &mut buf);
    buf
}

#[must_use]
pub fn sample(value: f64, timestamp_ms: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(20);
    encode_tag(SAMPLE_VALUE_FIELD, WireType::Fixed64, &mut buf);
    buf.extend_from_slice(&value.to_le_bytes());
    encode_tag(SAMPLE_TIMESTAMP_FIELD, WireType::Varint, &mut buf);
    // int64 keeps two's complement, so negatives take the full ten bytes
    encode_varint(timestamp_ms as u64, &mut buf);
    buf
}

/// Encodes one time series. The `__name__` label always comes first,
/// followed by `labels` in insertion order.
#[must_use]
pub fn time_series(metric_name: &str, value: f64, labels: &Labels, timestamp_ms: i64) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_length_delimited(
        SERIES_LABEL_FIELD,
        &label(METRIC_NAME_LABEL, metric_name),
        &mut buf,
    );
    for (name, value) in labels.iter() {
        if name == METRIC_NAME_LABEL {
            continue;
        }
        encode_length_delimited(SERIES_LABEL_FIELD, &label(name, value), &mut buf);
    }
    encode_length_delimited(SERIES_SAMPLE_FIELD, &sample(value, timestamp_ms), &mut buf);
    buf
}

/// Wraps already encoded time series into a `WriteRequest`.
#[must_use]
pub fn write_batch<S: AsRef<[u8]>>(series: &[S]) -> Vec<u8> {
    let mut buf = Vec::new();
    for encoded in series {
        encode_length_delimited(REQUEST_SERIES_FIELD, encoded.as_ref(), &mut buf);
    }
    buf
}

/// Encodes a whole batch of samples into one `WriteRequest` payload.
#[must_use]
pub fn encode_samples(samples: &[MetricSample]) -> Vec<u8> {
    let series: Vec<Vec<u8>> = samples
        .iter()
        .map(|s| time_series(&s.name, s.value, &s.labels, s.timestamp_ms))
        .collect();
    write_batch(&series)
}
