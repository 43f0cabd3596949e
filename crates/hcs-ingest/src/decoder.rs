//! Line decoder
//!
//! Upstream files mix one-object-per-line and array-per-line encodings with no
//! tag telling them apart, so every line gets two attempts: as an array of
//! records, then as a single record.

use crate::models::InsuranceService;

/// Outcome of decoding one non-blank line
#[derive(Debug)]
pub enum DecodedLine {
    Single(InsuranceService),
    Many(Vec<InsuranceService>),
    Malformed(serde_json::Error),
}

impl DecodedLine {
    /// Records carried by the line; empty for a malformed line
    pub fn into_records(self) -> Vec<InsuranceService> {
        match self {
            DecodedLine::Single(service) => vec![service],
            DecodedLine::Many(services) => services,
            DecodedLine::Malformed(_) => Vec::new(),
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, DecodedLine::Malformed(_))
    }
}

/// Decode a trimmed, non-empty line
///
/// When both attempts fail, the reported error comes from the attempt that
/// matches the line's leading character.
pub fn decode_line(line: &str) -> DecodedLine {
    let array_err = match serde_json::from_str::<Vec<InsuranceService>>(line) {
        Ok(services) => return DecodedLine::Many(services),
        Err(e) => e,
    };

    match serde_json::from_str::<InsuranceService>(line) {
        Ok(service) => DecodedLine::Single(service),
        Err(_) if line.starts_with('[') => DecodedLine::Malformed(array_err),
        Err(object_err) => DecodedLine::Malformed(object_err),
    }
}
