// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Recovers the report XML from an object of unknown encoding.
//!
//! Reports arrive in one of several shapes: the raw XML, gzipped XML, or an
//! email (as delivered by an inbound mail relay) carrying the report as a
//! zip, gzip or plain attachment, or inline in the body. Candidates are tried
//! in a fixed order and the first that yields well-formed XML wins:
//!
//! 1. the object as an email message
//!    - attachments, in order: zip archives by their first `.xml` entry,
//!      everything else after an optional gunzip
//!    - plain-text body parts
//!    - the payload of a single-part message
//! 2. the object itself, after an optional gunzip
//!
//! Decompression and archive failures are expected along the way and only
//! move extraction on to the next candidate.

use crate::error::ExtractionError;
use crate::report;
use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};
use std::io::{Cursor, Read};
use tracing::{debug, info};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const DOCUMENT_SUFFIX: &str = ".xml";
const ARCHIVE_SUFFIX: &str = ".zip";
const ARCHIVE_SUBTYPES: [&str; 3] = ["zip", "x-zip", "x-zip-compressed"];
const HEADER_SNIFF_LIMIT: usize = 1024;
const MBOX_ENVELOPE: &[u8] = b"From ";

/// How the document was found inside the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    RawXml,
    Gzip,
    EmailAttachmentZip,
    EmailAttachmentGzip,
    EmailAttachmentPlain,
    EmailBodyPlain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub bytes: Vec<u8>,
    pub provenance: Provenance,
}

impl ExtractedDocument {
    fn new(bytes: Vec<u8>, provenance: Provenance) -> Self {
        Self { bytes, provenance }
    }
}

pub fn extract(raw: &[u8]) -> Result<ExtractedDocument, ExtractionError> {
    match parse_message(raw) {
        Some(message) => {
            debug!("Object parsed as an email message");
            from_message(&message)
        }
        None => from_raw(raw),
    }
}

/// Parses `raw` as an email only when it opens with a header field.
fn parse_message(raw: &[u8]) -> Option<Message<'_>> {
    let start = header_start(raw)?;
    MessageParser::default().parse(&raw[start..])
}

/// Offset of the first header field, past leading blank lines and an mbox
/// `From ` envelope line.
fn header_start(raw: &[u8]) -> Option<usize> {
    let mut offset = 0;
    let mut envelope_seen = false;
    while offset < raw.len().min(HEADER_SNIFF_LIMIT) {
        let rest = &raw[offset..];
        let line_len = rest
            .iter()
            .position(|b| *b == b'\n')
            .map_or(rest.len(), |newline| newline + 1);
        let line = &rest[..line_len];

        if line.iter().all(u8::is_ascii_whitespace) {
            offset += line_len;
        } else if !envelope_seen && line.starts_with(MBOX_ENVELOPE) {
            envelope_seen = true;
            offset += line_len;
        } else {
            return is_header_field(line).then_some(offset);
        }
    }
    None
}

fn is_header_field(line: &[u8]) -> bool {
    match line.iter().position(|b| *b == b':') {
        Some(colon) if colon > 0 => line[..colon]
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || *b == b'-'),
        _ => false,
    }
}

fn from_message(message: &Message<'_>) -> Result<ExtractedDocument, ExtractionError> {
    for attachment in message.attachments() {
        if let Some(document) = from_attachment(attachment) {
            return Ok(document);
        }
    }

    for body in message.text_bodies() {
        if matches!(body.body, PartType::Text(_)) && is_document(body.contents()) {
            return Ok(ExtractedDocument::new(
                body.contents().to_vec(),
                Provenance::EmailBodyPlain,
            ));
        }
    }

    if let [single] = message.parts.as_slice() {
        if is_document(single.contents()) {
            return Ok(ExtractedDocument::new(
                single.contents().to_vec(),
                Provenance::EmailBodyPlain,
            ));
        }
    }

    Err(ExtractionError::NoValidDocument)
}

fn from_attachment(attachment: &MessagePart<'_>) -> Option<ExtractedDocument> {
    let name = attachment.attachment_name().unwrap_or_default();

    if is_archive(attachment) {
        return match first_document_entry(attachment.contents()) {
            Ok(Some(bytes)) => Some(ExtractedDocument::new(
                bytes,
                Provenance::EmailAttachmentZip,
            )),
            Ok(None) => {
                debug!("Archive attachment '{name}' has no {DOCUMENT_SUFFIX} entry");
                None
            }
            Err(e) => {
                info!("Skipping invalid archive attachment '{name}': {e}");
                None
            }
        };
    }

    let (payload, provenance) = match gunzip(attachment.contents()) {
        Some(decompressed) => (decompressed, Provenance::EmailAttachmentGzip),
        None => (
            attachment.contents().to_vec(),
            Provenance::EmailAttachmentPlain,
        ),
    };

    if is_document(&payload) {
        Some(ExtractedDocument::new(payload, provenance))
    } else {
        debug!("Attachment '{name}' is not a report document");
        None
    }
}

fn is_archive(part: &MessagePart<'_>) -> bool {
    let by_type = part
        .content_type()
        .and_then(|ct| ct.subtype())
        .is_some_and(|subtype| {
            ARCHIVE_SUBTYPES
                .iter()
                .any(|archive| subtype.eq_ignore_ascii_case(archive))
        });
    let by_name = part
        .attachment_name()
        .is_some_and(|name| name.to_ascii_lowercase().ends_with(ARCHIVE_SUFFIX));
    by_type || by_name
}

/// Bytes of the first archive entry whose name ends in `.xml`.
fn first_document_entry(bytes: &[u8]) -> zip::result::ZipResult<Option<Vec<u8>>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.name().to_ascii_lowercase().ends_with(DOCUMENT_SUFFIX) {
            // declared sizes are untrusted, so no capacity hint
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents)?;
            return Ok(Some(contents));
        }
    }
    Ok(None)
}

fn from_raw(raw: &[u8]) -> Result<ExtractedDocument, ExtractionError> {
    let (bytes, provenance) = match gunzip(raw) {
        Some(decompressed) => (decompressed, Provenance::Gzip),
        None => (raw.to_vec(), Provenance::RawXml),
    };
    report::validate(&bytes)?;
    Ok(ExtractedDocument::new(bytes, provenance))
}

/// Single-layer gunzip. `None` means the input is not gzip data.
fn gunzip(bytes: &[u8]) -> Option<Vec<u8>> {
    if !bytes.starts_with(&GZIP_MAGIC) {
        info!("Content not gzipped");
        return None;
    }
    let mut decoder = flate2::read::GzDecoder::new(bytes);
    let mut decompressed = Vec::new();
    match decoder.read_to_end(&mut decompressed) {
        Ok(_) => {
            info!("Decompressed gzipped content");
            Some(decompressed)
        }
        Err(e) => {
            info!("Content not gzipped: {e}");
            None
        }
    }
}

fn is_document(bytes: &[u8]) -> bool {
    report::validate(bytes).is_ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ParseError;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use std::io::Write;

    pub(crate) const REPORT: &str = "<feedback><report_metadata><org_name>test</org_name>\
        </report_metadata><record><row><source_ip>1.2.3.4</source_ip><count>1</count>\
        <policy_evaluated><dmarc>pass</dmarc><spf>pass</spf><dkim>pass</dkim>\
        </policy_evaluated></row></record></feedback>";

    pub(crate) fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    pub(crate) fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    /// `(content_type, filename, body)`; a filename marks an attachment.
    pub(crate) fn email(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut out = String::from(
            "From: noreply-dmarc-support@google.com\r\n\
             To: dmarc@example.com\r\n\
             Subject: Report domain: example.com Submitter: google.com\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: multipart/mixed; boundary=\"REPORT-BOUNDARY\"\r\n\r\n",
        );
        for (content_type, filename, body) in parts {
            out.push_str("--REPORT-BOUNDARY\r\n");
            out.push_str(&format!("Content-Type: {content_type}\r\n"));
            match filename {
                Some(filename) => {
                    out.push_str(&format!(
                        "Content-Disposition: attachment; filename=\"{filename}\"\r\n\
                         Content-Transfer-Encoding: base64\r\n\r\n"
                    ));
                    out.push_str(&STANDARD.encode(body));
                }
                None => {
                    out.push_str("\r\n");
                    out.push_str(std::str::from_utf8(body).unwrap());
                }
            }
            out.push_str("\r\n");
        }
        out.push_str("--REPORT-BOUNDARY--\r\n");
        out.into_bytes()
    }

    #[test]
    fn test_raw_xml() {
        let document = extract(REPORT.as_bytes()).unwrap();
        assert_eq!(document.provenance, Provenance::RawXml);
        assert_eq!(document.bytes, REPORT.as_bytes());
    }

    #[test]
    fn test_gzipped_xml() {
        let document = extract(gzip(REPORT.as_bytes()).as_slice()).unwrap();
        assert_eq!(document.provenance, Provenance::Gzip);
        assert_eq!(document.bytes, REPORT.as_bytes());
    }

    #[test]
    fn test_xml_with_declaration_is_not_an_email() {
        let raw = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{REPORT}");
        assert_eq!(header_start(raw.as_bytes()), None);
        assert_eq!(extract(raw.as_bytes()).unwrap().provenance, Provenance::RawXml);
    }

    #[test]
    fn test_header_sniffing() {
        assert_eq!(header_start(b"From: a@b.c\r\n\r\nbody"), Some(0));
        assert_eq!(header_start(b"Return-Path: <a@b.c>\n"), Some(0));
        assert_eq!(header_start(b"\r\n\nFrom: a@b.c\r\n"), Some(3));
        assert_eq!(
            header_start(b"From MAILER-DAEMON Mon Jan  1 00:00:00 2024\nFrom: a@b.c\n"),
            Some(44)
        );
        assert_eq!(header_start(b"From a\nFrom b\nFrom: a@b.c\n"), None);
        assert_eq!(header_start(b"\n\n<feedback/>"), None);
        assert_eq!(header_start(b"<ns:feedback>"), None);
        assert_eq!(header_start(b": no name"), None);
        assert_eq!(header_start(&GZIP_MAGIC), None);
        assert_eq!(header_start(b""), None);
        assert_eq!(header_start(b"\n\n\n"), None);
    }

    #[test]
    fn test_mbox_envelope_line() {
        let raw = format!(
            "From MAILER-DAEMON Mon Jan  1 00:00:00 2024\r\n\
             From: a@b.c\r\nSubject: r\r\n\r\n{REPORT}"
        );
        let document = extract(raw.as_bytes()).unwrap();
        assert_eq!(document.provenance, Provenance::EmailBodyPlain);
        assert!(report::validate(&document.bytes).is_ok());
    }

    #[test]
    fn test_leading_blank_lines() {
        let archive = zip_of(&[("report.xml", REPORT.as_bytes())]);
        let mut raw = b"\r\n\r\n".to_vec();
        raw.extend(email(&[("application/zip", Some("report.zip"), archive.as_slice())]));

        let document = extract(&raw).unwrap();
        assert_eq!(document.provenance, Provenance::EmailAttachmentZip);
        assert_eq!(document.bytes, REPORT.as_bytes());
    }

    #[test]
    fn test_zip_attachment() {
        let archive = zip_of(&[
            ("README.txt", b"not the report".as_slice()),
            ("google.com!example.com!1700000000!1700086399.xml", REPORT.as_bytes()),
        ]);
        let raw = email(&[
            ("text/plain", None, b"This is an aggregate report from google.com.".as_slice()),
            ("application/zip", Some("google.com!example.com.zip"), archive.as_slice()),
        ]);

        let document = extract(&raw).unwrap();
        assert_eq!(document.provenance, Provenance::EmailAttachmentZip);
        assert_eq!(document.bytes, REPORT.as_bytes());
    }

    #[test]
    fn test_zip_detected_by_filename() {
        let archive = zip_of(&[("report.XML", REPORT.as_bytes())]);
        let raw = email(&[("application/octet-stream", Some("report.zip"), archive.as_slice())]);
        assert_eq!(
            extract(&raw).unwrap().provenance,
            Provenance::EmailAttachmentZip
        );
    }

    #[test]
    fn test_gzip_attachment() {
        let raw = email(&[(
            "application/gzip",
            Some("report.xml.gz"),
            gzip(REPORT.as_bytes()).as_slice(),
        )]);
        let document = extract(&raw).unwrap();
        assert_eq!(document.provenance, Provenance::EmailAttachmentGzip);
        assert_eq!(document.bytes, REPORT.as_bytes());
    }

    #[test]
    fn test_plain_attachment() {
        let raw = email(&[("text/xml", Some("report.xml"), REPORT.as_bytes())]);
        let document = extract(&raw).unwrap();
        assert_eq!(document.provenance, Provenance::EmailAttachmentPlain);
        assert_eq!(document.bytes, REPORT.as_bytes());
    }

    #[test]
    fn test_corrupt_archive_is_skipped() {
        let raw = email(&[
            ("application/zip", Some("broken.zip"), b"PK\x03\x04 definitely not a zip".as_slice()),
            ("application/gzip", Some("report.xml.gz"), gzip(REPORT.as_bytes()).as_slice()),
        ]);
        let document = extract(&raw).unwrap();
        assert_eq!(document.provenance, Provenance::EmailAttachmentGzip);
    }

    /// A stored single-entry archive whose central directory declares
    /// `declared_size` as the uncompressed size through a zip64 extra field.
    fn zip64_with_declared_size(name: &str, data: &[u8], crc: u32, declared_size: u64) -> Vec<u8> {
        let name_len = u16::try_from(name.len()).unwrap();
        let data_len = u32::try_from(data.len()).unwrap();

        let mut out = Vec::new();
        out.extend_from_slice(&0x0403_4b50_u32.to_le_bytes());
        out.extend_from_slice(&45_u16.to_le_bytes()); // version needed
        out.extend_from_slice(&[0; 6]); // flags, method (stored), time
        out.extend_from_slice(&0x21_u16.to_le_bytes()); // date
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&data_len.to_le_bytes());
        out.extend_from_slice(&data_len.to_le_bytes());
        out.extend_from_slice(&name_len.to_le_bytes());
        out.extend_from_slice(&0_u16.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(data);

        let directory_offset = u32::try_from(out.len()).unwrap();
        out.extend_from_slice(&0x0201_4b50_u32.to_le_bytes());
        out.extend_from_slice(&45_u16.to_le_bytes()); // version made by
        out.extend_from_slice(&45_u16.to_le_bytes()); // version needed
        out.extend_from_slice(&[0; 6]);
        out.extend_from_slice(&0x21_u16.to_le_bytes());
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&data_len.to_le_bytes());
        out.extend_from_slice(&u32::MAX.to_le_bytes()); // size lives in the zip64 field
        out.extend_from_slice(&name_len.to_le_bytes());
        out.extend_from_slice(&12_u16.to_le_bytes()); // extra length
        out.extend_from_slice(&[0; 10]); // comment, disk, attributes
        out.extend_from_slice(&0_u32.to_le_bytes()); // local header offset
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&0x0001_u16.to_le_bytes());
        out.extend_from_slice(&8_u16.to_le_bytes());
        out.extend_from_slice(&declared_size.to_le_bytes());
        let directory_size = u32::try_from(out.len()).unwrap() - directory_offset;

        out.extend_from_slice(&0x0605_4b50_u32.to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&1_u16.to_le_bytes());
        out.extend_from_slice(&1_u16.to_le_bytes());
        out.extend_from_slice(&directory_size.to_le_bytes());
        out.extend_from_slice(&directory_offset.to_le_bytes());
        out.extend_from_slice(&0_u16.to_le_bytes());
        out
    }

    #[test]
    fn test_archive_with_oversized_entry_is_skipped() {
        let archive = zip64_with_declared_size(
            "report.xml",
            b"<feedback>truncated",
            0xDEAD_BEEF,
            0xFFFF_FFFF_FFFF_FF00,
        );
        let raw = email(&[
            ("application/zip", Some("report.zip"), archive.as_slice()),
            ("application/gzip", Some("report.xml.gz"), gzip(REPORT.as_bytes()).as_slice()),
        ]);

        let document = extract(&raw).unwrap();
        assert_eq!(document.provenance, Provenance::EmailAttachmentGzip);
        assert_eq!(document.bytes, REPORT.as_bytes());
    }

    #[test]
    fn test_archive_without_document_is_skipped() {
        let archive = zip_of(&[("notes.txt", b"nothing here".as_slice())]);
        let raw = email(&[
            ("application/zip", Some("empty.zip"), archive.as_slice()),
            ("text/plain", None, REPORT.as_bytes()),
        ]);
        assert_eq!(extract(&raw).unwrap().provenance, Provenance::EmailBodyPlain);
    }

    #[test]
    fn test_body_part_fallback() {
        let raw = email(&[
            ("text/plain", None, b"Please find the report below.".as_slice()),
            ("text/plain", None, REPORT.as_bytes()),
        ]);
        let document = extract(&raw).unwrap();
        assert_eq!(document.provenance, Provenance::EmailBodyPlain);
        assert_eq!(document.bytes, REPORT.as_bytes());
    }

    #[test]
    fn test_single_part_message() {
        let raw = format!(
            "From: reports@example.org\r\nContent-Type: text/plain\r\n\r\n{REPORT}"
        );
        let document = extract(raw.as_bytes()).unwrap();
        assert_eq!(document.provenance, Provenance::EmailBodyPlain);
        assert!(report::validate(&document.bytes).is_ok());
    }

    #[test]
    fn test_message_interpretation_wins() {
        // valid as an email and carrying XML; the raw path must not be used
        let raw = format!("Subject: report\r\n\r\n{REPORT}");
        assert_eq!(
            extract(raw.as_bytes()).unwrap().provenance,
            Provenance::EmailBodyPlain
        );
    }

    #[test]
    fn test_message_without_document() {
        let raw = email(&[
            ("text/plain", None, b"No report attached, sorry.".as_slice()),
            ("application/pdf", Some("invoice.pdf"), b"%PDF-1.4 binary".as_slice()),
        ]);
        assert!(matches!(
            extract(&raw),
            Err(ExtractionError::NoValidDocument)
        ));
    }

    #[test]
    fn test_unrecognised_raw_is_parse_error() {
        assert!(matches!(
            extract(b"\x00\x01\x02 garbage"),
            Err(ExtractionError::Document(_))
        ));
        assert!(matches!(
            extract(b"<feedback><record>"),
            Err(ExtractionError::Document(ParseError::Xml(_)))
        ));
    }

    #[test]
    fn test_truncated_gzip_is_kept_as_is() {
        let mut compressed = gzip(REPORT.as_bytes());
        compressed.truncate(compressed.len() / 2);
        assert!(extract(&compressed).is_err());
    }
}
