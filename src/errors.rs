//! Typed errors for the card pipeline.
//!
//! - `IssueShapeError`: a fetched record that cannot become a snapshot
//! - `StoreError`: reading or flushing the issue store
//! - `RenderError`: a single card or page that could not be drawn
//! - `PipelineError`: a cycle that had to stop early
//! - `SpoolError`: handing a finished document to the print spooler
//! - `ValidationErrors`: manual renderer input that fails its field descriptors

use std::path::PathBuf;

use thiserror::Error;

use crate::model::issue::Field;

#[derive(Debug, Error)]
pub enum IssueShapeError {
    #[error("issue {} is missing required field `{field}`", .key.as_deref().unwrap_or("<no key>"))]
    MissingField { key: Option<String>, field: Field },

    #[error("issue {key} has an unreadable created timestamp {value:?}")]
    BadTimestamp { key: String, value: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read issue store at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Issue store at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode issue store: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to write issue store at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Image asset {path} does not exist")]
    MissingAsset { path: PathBuf },

    #[error("Failed to decode image asset {path}: {source}")]
    DecodeAsset {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Field `{0}` is missing or has the wrong type")]
    BadValue(&'static str),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Authentication with the issue source failed: {0:#}")]
    Authenticate(#[source] anyhow::Error),

    #[error("Loading issue type and priority tables failed: {0:#}")]
    LoadLookups(#[source] anyhow::Error),

    #[error("Fetching issues for filter {filter} failed: {source:#}")]
    FetchIssues {
        filter: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Resolving user {user} failed: {source:#}")]
    ResolveUser {
        user: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Persisting {} changed issue(s) ({}) failed: {source}", .keys.len(), .keys.join(", "))]
    Persist {
        keys: Vec<String>,
        #[source]
        source: StoreError,
    },

    #[error("Writing card document {path} for {} failed: {source}", .keys.join(", "))]
    Emit {
        path: PathBuf,
        keys: Vec<String>,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} rejected the job: {stderr}")]
    Rejected { program: String, stderr: String },

    #[error("Could not find a job id in spooler output {0:?}")]
    NoJobId(String),
}

/// One complaint about one input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", format_field_errors(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}
