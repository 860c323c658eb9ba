//! Certificate bundle parsing and chain ordering for CA uploads.
//!
//! Identity metadata comes from the human-readable `Subject:` / `Issuer:`
//! lines that `openssl x509 -text` style dumps place around a PEM block. The
//! ordering step links every certificate to its issuer and produces a single
//! leaf-to-root sequence, or reports why it cannot.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

const SUBJECT_PREFIX: &str = "Subject:";
const ISSUER_PREFIX: &str = "Issuer:";
const PEM_BEGIN_MARKER: &str = "-----BEGIN ";
const PEM_END_MARKER: &str = "-----END ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    raw_block: String,
    subject: Option<String>,
    issuer: Option<String>,
    is_root: bool,
}

impl CertificateRecord {
    #[must_use]
    pub fn new(raw_block: impl Into<String>, subject: Option<String>, issuer: Option<String>) -> Self {
        let is_root = matches!((&subject, &issuer), (Some(subject), Some(issuer)) if subject == issuer);
        Self {
            raw_block: raw_block.into(),
            subject,
            issuer,
            is_root,
        }
    }

    #[must_use]
    pub fn raw_block(&self) -> &str {
        &self.raw_block
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    /// Self-signed: subject and issuer both present and equal.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    fn label(&self) -> String {
        self.subject
            .clone()
            .unwrap_or_else(|| "<unknown subject>".to_string())
    }
}

/// Extracts the first `Subject:` and `Issuer:` lines anywhere in `text`.
///
/// Leading indentation is ignored and the prefix match is case-sensitive.
/// Only the first line with each prefix counts; a blank value there leaves
/// the field absent.
#[must_use]
pub fn parse_certificate_info(text: &str) -> CertificateRecord {
    let mut subject: Option<Option<String>> = None;
    let mut issuer: Option<Option<String>> = None;
    for line in text.lines() {
        let line = line.trim_start();
        if subject.is_none() {
            if let Some(value) = line.strip_prefix(SUBJECT_PREFIX) {
                subject = Some(non_empty(value));
                continue;
            }
        }
        if issuer.is_none() {
            if let Some(value) = line.strip_prefix(ISSUER_PREFIX) {
                issuer = Some(non_empty(value));
            }
        }
        if subject.is_some() && issuer.is_some() {
            break;
        }
    }

    let raw_block = pem_block(text).unwrap_or(text);
    CertificateRecord::new(raw_block, subject.flatten(), issuer.flatten())
}

/// Splits a bundle into one segment per certificate.
///
/// A segment ends after each `-----END ...-----` line, so any text dump in
/// front of a `BEGIN` line stays with the block it describes. Text without an
/// END marker is returned as a single segment. Trailing text after the last
/// END marker is dropped when blank and folded into the last segment when it
/// describes no certificate.
#[must_use]
pub fn split_certificate_bundle(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        current.push_str(line);
        current.push('\n');
        if line.trim_start().starts_with(PEM_END_MARKER) {
            segments.push(std::mem::take(&mut current));
        }
    }
    if current.trim().is_empty() {
        return segments;
    }
    match segments.last_mut() {
        Some(last) if !describes_certificate(&current) => last.push_str(&current),
        _ => segments.push(current),
    }
    segments
}

fn describes_certificate(text: &str) -> bool {
    text.lines().map(str::trim_start).any(|line| {
        line.starts_with(PEM_BEGIN_MARKER)
            || line.starts_with(SUBJECT_PREFIX)
            || line.starts_with(ISSUER_PREFIX)
    })
}

fn pem_block(text: &str) -> Option<&str> {
    let begin = text.find(PEM_BEGIN_MARKER)?;
    let end_marker = begin + text[begin..].find(PEM_END_MARKER)?;
    let line_end = text[end_marker..]
        .find('\n')
        .map_or(text.len(), |offset| end_marker + offset);
    Some(text[begin..line_end].trim_end_matches('\r'))
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateRole {
    Leaf,
    Intermediate,
    Root,
}

impl CertificateRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Leaf => "leaf",
            Self::Intermediate => "intermediate",
            Self::Root => "root",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainOrderingError {
    #[error("no certificates were found")]
    Empty,
    #[error("no self-signed root certificate was found")]
    NoRoot,
    #[error("found {} self-signed root certificates: {}", .subjects.len(), .subjects.join(", "))]
    MultipleRoots { subjects: Vec<String> },
    #[error("certificate #{} is missing its Subject or Issuer line", .index + 1)]
    MissingMetadata { index: usize },
    #[error("more than one certificate has subject {subject}")]
    DuplicateSubject { subject: String },
    #[error("issuer {issuer} of certificate {subject} is not in the bundle")]
    UnknownIssuer { subject: String, issuer: String },
    #[error("the bundle branches into several leaf certificates: {}", .leaves.join(", "))]
    Branching { leaves: Vec<String> },
    #[error("certificate issuers form a cycle")]
    Cycle,
    #[error("certificates are not linked to the root: {}", .subjects.join(", "))]
    Unreachable { subjects: Vec<String> },
}

/// A validated chain ordered from leaf to root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateChain {
    certificates: Vec<CertificateRecord>,
}

impl CertificateChain {
    #[must_use]
    pub fn certificates(&self) -> &[CertificateRecord] {
        &self.certificates
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    #[must_use]
    pub fn root(&self) -> Option<&CertificateRecord> {
        self.certificates.last()
    }

    pub fn with_roles(&self) -> impl Iterator<Item = (CertificateRole, &CertificateRecord)> {
        let last = self.certificates.len().saturating_sub(1);
        self.certificates
            .iter()
            .enumerate()
            .map(move |(index, record)| {
                let role = if index == last {
                    CertificateRole::Root
                } else if index == 0 {
                    CertificateRole::Leaf
                } else {
                    CertificateRole::Intermediate
                };
                (role, record)
            })
    }

    /// Concatenated PEM blocks in chain order, as submitted to the backend.
    #[must_use]
    pub fn to_pem_bundle(&self) -> String {
        let mut bundle = String::new();
        for record in &self.certificates {
            bundle.push_str(record.raw_block().trim_end());
            bundle.push('\n');
        }
        bundle
    }
}

/// Orders `records` so each certificate's issuer is the subject of the next
/// one, ending in the single self-signed root.
pub fn order_certificate_chain(
    records: Vec<CertificateRecord>,
) -> Result<CertificateChain, ChainOrderingError> {
    if records.is_empty() {
        return Err(ChainOrderingError::Empty);
    }

    for (index, record) in records.iter().enumerate() {
        if record.subject.is_none() || record.issuer.is_none() {
            return Err(ChainOrderingError::MissingMetadata { index });
        }
    }

    let roots = records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.is_root())
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    let root_index = match roots.as_slice() {
        [] => return Err(ChainOrderingError::NoRoot),
        [single] => *single,
        many => {
            return Err(ChainOrderingError::MultipleRoots {
                subjects: many.iter().map(|index| records[*index].label()).collect(),
            });
        }
    };

    let mut by_subject: HashMap<&str, usize> = HashMap::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let subject = record.subject().unwrap_or_default();
        if by_subject.insert(subject, index).is_some() {
            return Err(ChainOrderingError::DuplicateSubject {
                subject: subject.to_string(),
            });
        }
    }

    let mut parent_of = vec![None; records.len()];
    let mut issuer_targets = HashSet::new();
    for (index, record) in records.iter().enumerate() {
        if index == root_index {
            continue;
        }
        let issuer = record.issuer().unwrap_or_default();
        let Some(&parent) = by_subject.get(issuer) else {
            return Err(ChainOrderingError::UnknownIssuer {
                subject: record.label(),
                issuer: issuer.to_string(),
            });
        };
        parent_of[index] = Some(parent);
        issuer_targets.insert(parent);
    }
    drop(by_subject);

    let leaves = (0..records.len())
        .filter(|index| *index != root_index && !issuer_targets.contains(index))
        .collect::<Vec<_>>();

    let order = match leaves.as_slice() {
        [] if records.len() == 1 => vec![root_index],
        [] => return Err(ChainOrderingError::Cycle),
        [leaf] => walk_to_root(*leaf, root_index, &parent_of)?,
        many => {
            return Err(ChainOrderingError::Branching {
                leaves: many.iter().map(|index| records[*index].label()).collect(),
            });
        }
    };

    if order.len() != records.len() {
        let reached = order.iter().copied().collect::<HashSet<_>>();
        return Err(ChainOrderingError::Unreachable {
            subjects: (0..records.len())
                .filter(|index| !reached.contains(index))
                .map(|index| records[index].label())
                .collect(),
        });
    }

    let mut slots = records.into_iter().map(Some).collect::<Vec<_>>();
    let certificates = order
        .into_iter()
        .filter_map(|index| slots.get_mut(index).and_then(Option::take))
        .collect();
    Ok(CertificateChain { certificates })
}

fn walk_to_root(
    leaf: usize,
    root: usize,
    parent_of: &[Option<usize>],
) -> Result<Vec<usize>, ChainOrderingError> {
    let mut order = vec![leaf];
    let mut visited = HashSet::from([leaf]);
    let mut current = leaf;
    while current != root {
        let Some(next) = parent_of.get(current).copied().flatten() else {
            return Err(ChainOrderingError::Cycle);
        };
        if !visited.insert(next) {
            return Err(ChainOrderingError::Cycle);
        }
        order.push(next);
        current = next;
    }
    Ok(order)
}
