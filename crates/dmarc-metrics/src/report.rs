// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! DMARC aggregate report parsing.
//!
//! Lookups are depth-unconstrained: the first `org_name` anywhere below the
//! root is the organization, and every `record` element anywhere below the
//! root is a record. Absent values fall back to [`UNKNOWN`]; only malformed
//! input is an error.

use crate::error::ParseError;
use roxmltree::{Document, Node, ParsingOptions};

pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub source_ip: String,
    pub count: u64,
    pub dmarc_result: String,
    pub spf_result: String,
    pub dkim_result: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateReport {
    pub organization: String,
    pub report_id: String,
    pub records: Vec<Record>,
}

impl Default for AggregateReport {
    fn default() -> Self {
        Self {
            organization: UNKNOWN.to_string(),
            report_id: UNKNOWN.to_string(),
            records: Vec::new(),
        }
    }
}

/// Checks that `bytes` hold a well-formed XML document.
pub fn validate(bytes: &[u8]) -> Result<(), ParseError> {
    let text = std::str::from_utf8(bytes)?;
    load(text)?;
    Ok(())
}

/// Parses with `<!DOCTYPE>` declarations allowed.
fn load(text: &str) -> Result<Document<'_>, roxmltree::Error> {
    Document::parse_with_options(
        text,
        ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        },
    )
}

pub fn parse(bytes: &[u8]) -> Result<AggregateReport, ParseError> {
    let text = std::str::from_utf8(bytes)?;
    let document = load(text)?;
    let root = document.root_element();

    let organization = text_or_unknown(find(root, "org_name"));
    let report_id = text_or_unknown(find(root, "report_id"));

    let records = root
        .descendants()
        .skip(1)
        .filter(|node| node.has_tag_name("record"))
        .map(parse_record)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AggregateReport {
        organization,
        report_id,
        records,
    })
}

fn parse_record(record: Node<'_, '_>) -> Result<Record, ParseError> {
    let source_ip = text_or_unknown(find(record, "source_ip"));
    let count = match find(record, "count").and_then(text) {
        Some(raw) => raw.parse::<u64>().map_err(|source| ParseError::InvalidCount {
            value: raw.to_string(),
            source,
        })?,
        None => 0,
    };

    let policy = find(record, "policy_evaluated");
    let verdict = |name: &str| text_or_unknown(policy.and_then(|p| find(p, name)));

    Ok(Record {
        source_ip,
        count,
        dmarc_result: verdict("dmarc"),
        spf_result: verdict("spf"),
        dkim_result: verdict("dkim"),
    })
}

/// First element named `name` strictly below `node`, in document order.
fn find<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.descendants()
        .skip(1)
        .find(|n| n.is_element() && n.has_tag_name(name))
}

fn text<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.text().map(str::trim).filter(|t| !t.is_empty())
}

fn text_or_unknown(node: Option<Node<'_, '_>>) -> String {
    node.and_then(text).unwrap_or(UNKNOWN).to_string()
}
