// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::report::{AggregateReport, Record};

pub const METRIC_NAME_LABEL: &str = "__name__";

pub const EMAIL_COUNT_METRIC: &str = "dmarc_email_count";
pub const SPF_RESULT_METRIC: &str = "dmarc_spf_result";
pub const DKIM_RESULT_METRIC: &str = "dmarc_dkim_result";

/// Samples derived from every record.
pub const SAMPLES_PER_RECORD: usize = 3;

/// Label set that keeps insertion order. Re-inserting an existing name
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels(Vec<(String, String)>);

impl Labels {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A single named, labelled value. `labels` holds `__name__` first.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
    pub labels: Labels,
    pub timestamp_ms: i64,
}

impl MetricSample {
    fn new(name: &str, value: f64, extra: Labels, timestamp_ms: i64) -> Self {
        let mut labels = Labels::new();
        labels.insert(METRIC_NAME_LABEL, name);
        for (n, v) in extra.iter() {
            labels.insert(n, v);
        }
        Self {
            name: name.to_string(),
            value,
            labels,
            timestamp_ms,
        }
    }
}

fn record_samples(organization: &str, record: &Record, timestamp_ms: i64) -> [MetricSample; 3] {
    let base = |extra_name: &str, extra_value: &str| {
        let mut labels = Labels::new();
        labels.insert("organization", organization);
        labels.insert("source_ip", record.source_ip.as_str());
        labels.insert(extra_name, extra_value);
        labels
    };
    let value = record.count as f64;

    [
        MetricSample::new(
            EMAIL_COUNT_METRIC,
            value,
            base("dmarc_result", &record.dmarc_result),
            timestamp_ms,
        ),
        MetricSample::new(
            SPF_RESULT_METRIC,
            value,
            base("result", &record.spf_result),
            timestamp_ms,
        ),
        MetricSample::new(
            DKIM_RESULT_METRIC,
            value,
            base("result", &record.dkim_result),
            timestamp_ms,
        ),
    ]
}

/// Derives the samples for a whole report, all sharing `timestamp_ms`.
#[must_use]
pub fn report_samples(report: &AggregateReport, timestamp_ms: i64) -> Vec<MetricSample> {
    let mut samples = Vec::with_capacity(report.records.len() * SAMPLES_PER_RECORD);
    for record in &report.records {
        samples.extend(record_samples(&report.organization, record, timestamp_ms));
    }
    samples
}
