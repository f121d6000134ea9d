// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # DMARC Metrics
//!
//! Turns DMARC aggregate reports dropped into an object store into
//! remote-write time series.
//!
//! ```text
//! raw object ─> extractor ─> report ─> metric ─> wire ─> compression ─> flusher
//! ```
//!
//! - [`extractor`]: recovers the report XML from raw, gzipped or emailed objects
//! - [`report`]: parses records and report metadata with defaults for absent values
//! - [`metric`] / [`wire`]: derives samples and hand-encodes the `WriteRequest`
//! - [`compression`]: snappy with a gzip fallback, negotiated once
//! - [`flusher`]: one authenticated push per report
//! - [`processor`]: sequential batch processing with abort-on-first-failure

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod compression;
pub mod config;
pub mod error;
pub mod extractor;
pub mod flusher;
pub mod metric;
pub mod processor;
pub mod report;
pub mod token;
pub mod varint;
pub mod wire;
