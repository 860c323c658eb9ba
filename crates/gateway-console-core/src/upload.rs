//! Pre-submission checks for CA certificate uploads.

use crate::certificate::{
    CertificateChain, ChainOrderingError, order_certificate_chain, parse_certificate_info,
    split_certificate_bundle,
};

/// 10 MiB.
pub const MAX_CA_CERT_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const ACCEPTED_CA_CERT_EXTENSIONS: [&str; 5] = [".pem", ".crt", ".cer", ".der", ".crl"];

/// Name and byte size of a selected file, read before its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    pub name: String,
    pub size: u64,
}

impl UploadCandidate {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_file_size: u64,
    /// Lowercase, each with a leading dot.
    pub accepted_extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_size: MAX_CA_CERT_FILE_SIZE,
            accepted_extensions: ACCEPTED_CA_CERT_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl UploadPolicy {
    #[must_use]
    pub fn accepts_name(&self, file_name: &str) -> bool {
        let lowered = file_name.trim().to_ascii_lowercase();
        self.accepted_extensions
            .iter()
            .any(|extension| lowered.len() > extension.len() && lowered.ends_with(extension.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadRejection {
    #[error("No files selected")]
    NoFiles,
    #[error("File {name} is too large ({}). Maximum size is {}.", size_label(.size), size_label(.limit))]
    FileTooLarge { name: String, size: u64, limit: u64 },
    #[error("Invalid file type: {name}. Accepted extensions: {}", .accepted.join(", "))]
    InvalidFileType { name: String, accepted: Vec<String> },
    #[error("Failed to read {name}: {message}")]
    Unreadable { name: String, message: String },
    #[error("Certificate chain is ambiguous: {0}")]
    Chain(#[from] ChainOrderingError),
}

/// Checks the selection before any file is read.
pub fn validate_upload_selection(
    files: &[UploadCandidate],
    policy: &UploadPolicy,
) -> Result<(), UploadRejection> {
    if files.is_empty() {
        return Err(UploadRejection::NoFiles);
    }
    for file in files {
        if file.size > policy.max_file_size {
            return Err(UploadRejection::FileTooLarge {
                name: file.name.clone(),
                size: file.size,
                limit: policy.max_file_size,
            });
        }
        if !policy.accepts_name(&file.name) {
            return Err(UploadRejection::InvalidFileType {
                name: file.name.clone(),
                accepted: policy.accepted_extensions.clone(),
            });
        }
    }
    Ok(())
}

/// Parses every certificate in the uploaded file texts and orders the result.
pub fn parse_uploaded_texts<'a>(
    texts: impl IntoIterator<Item = &'a str>,
) -> Result<CertificateChain, UploadRejection> {
    let records = texts
        .into_iter()
        .flat_map(split_certificate_bundle)
        .map(|segment| parse_certificate_info(&segment))
        .collect::<Vec<_>>();
    order_certificate_chain(records).map_err(UploadRejection::from)
}

#[must_use]
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = UNITS[0];
    for next in UNITS.iter().skip(1).copied() {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.2} {unit}")
}

fn size_label(bytes: &u64) -> String {
    format_file_size(*bytes)
}
