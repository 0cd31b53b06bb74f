// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document schemas
//!
//! Two shapes exist for the current version:
//! - [`DocumentFile`] is exactly what lives on disk: entries as a list,
//!   unknown top-level keys rejected.
//! - [`Document`] is the in-memory shape: entries keyed by name.
//!
//! [`validate`] turns a raw JSON value into a [`Document`], naming the
//! offending field path when it does not fit.

use chrono::{DateTime, Utc};
use dfd_core::{ContentEntry, UserInfo};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_path_to_error::Segment;
use std::collections::HashMap;
use thiserror::Error;

/// Document version written by this build
pub const CURRENT_VERSION: &str = "2.0.0";

const TOP_LEVEL_FIELDS: &[&str] = &[
    "version",
    "contentInfo",
    "user",
    "firstRunComplete",
    "lastUpdated",
    "refetchRequired",
];

/// Raw data does not conform to the document schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid document at `{path}`: {message}")]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// On-disk document for the current version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DocumentFile {
    pub version: String,
    pub content_info: Vec<ContentEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    pub first_run_complete: bool,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub refetch_required: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// In-memory document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub version: String,
    pub content_info: HashMap<String, ContentEntry>,
    pub user: Option<UserInfo>,
    pub first_run_complete: bool,
    pub last_updated: DateTime<Utc>,
    /// Set by migrations whose shape change invalidates cached catalog data
    pub refetch_required: bool,
}

impl Document {
    /// A brand-new document for a first run
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            content_info: HashMap::new(),
            user: None,
            first_run_complete: false,
            last_updated: now,
            refetch_required: false,
        }
    }

    /// Convert from the on-disk shape
    ///
    /// Duplicate names keep the last entry in list order.
    pub fn from_file(file: DocumentFile) -> Self {
        let mut content_info = HashMap::with_capacity(file.content_info.len());
        for entry in file.content_info {
            if let Some(previous) = content_info.insert(entry.name.clone(), entry) {
                tracing::warn!(name = %previous.name, "duplicate content entry on disk, keeping the last one");
            }
        }
        Self {
            version: file.version,
            content_info,
            user: file.user,
            first_run_complete: file.first_run_complete,
            last_updated: file.last_updated,
            refetch_required: file.refetch_required,
        }
    }

    /// Convert to the on-disk shape, entries sorted by name
    pub fn to_file(&self) -> DocumentFile {
        let mut content_info: Vec<ContentEntry> = self.content_info.values().cloned().collect();
        content_info.sort_by(|a, b| a.name.cmp(&b.name));
        DocumentFile {
            version: self.version.clone(),
            content_info,
            user: self.user.clone(),
            first_run_complete: self.first_run_complete,
            last_updated: self.last_updated,
            refetch_required: self.refetch_required,
        }
    }
}

/// Validate a raw value against the file schema for `expected_version`
pub fn validate_file(raw: &Value, expected_version: &str) -> Result<DocumentFile, ValidationError> {
    let Value::Object(fields) = raw else {
        return Err(ValidationError::new("$", "expected an object"));
    };

    if let Some(unknown) = fields.keys().find(|k| !TOP_LEVEL_FIELDS.contains(&k.as_str())) {
        return Err(ValidationError::new(unknown.as_str(), "unknown field"));
    }

    match fields.get("version") {
        Some(Value::String(v)) if v == expected_version => {}
        Some(Value::String(v)) => {
            return Err(ValidationError::new(
                "version",
                format!("expected {expected_version}, found {v}"),
            ))
        }
        Some(_) => return Err(ValidationError::new("version", "expected a string")),
        None => return Err(ValidationError::new("version", "missing field")),
    }

    let Some(entries) = fields.get("contentInfo") else {
        return Err(ValidationError::new("contentInfo", "missing field"));
    };
    let Value::Array(entries) = entries else {
        return Err(ValidationError::new("contentInfo", "expected a list"));
    };
    let mut content_info = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let entry: ContentEntry = decode(entry, &format!("contentInfo[{i}]"))?;
        content_info.push(entry);
    }

    let user = match fields.get("user") {
        None | Some(Value::Null) => None,
        Some(user) => Some(decode::<UserInfo>(user, "user")?),
    };

    let first_run_complete = match fields.get("firstRunComplete") {
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(ValidationError::new("firstRunComplete", "expected a boolean")),
        None => return Err(ValidationError::new("firstRunComplete", "missing field")),
    };

    let last_updated = match fields.get("lastUpdated") {
        Some(value) => decode(value, "lastUpdated")?,
        None => return Err(ValidationError::new("lastUpdated", "missing field")),
    };

    let refetch_required = match fields.get("refetchRequired") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(ValidationError::new("refetchRequired", "expected a boolean")),
    };

    Ok(DocumentFile {
        version: expected_version.to_string(),
        content_info,
        user,
        first_run_complete,
        last_updated,
        refetch_required,
    })
}

/// Deserialize `value`, reporting failures at `base` plus the nested field path
fn decode<T: DeserializeOwned>(value: &Value, base: &str) -> Result<T, ValidationError> {
    serde_path_to_error::deserialize(value).map_err(|e| {
        let mut path = base.to_string();
        for segment in e.path().iter() {
            match segment {
                Segment::Seq { index } => path.push_str(&format!("[{index}]")),
                Segment::Map { key } => path.push_str(&format!(".{key}")),
                Segment::Enum { variant } => path.push_str(&format!(".{variant}")),
                Segment::Unknown => {}
            }
        }
        let message = e.into_inner().to_string();
        // Tagged and flattened values are buffered, so a missing field is
        // only named in the message
        if let Some(field) = message
            .strip_prefix("missing field `")
            .and_then(|rest| rest.strip_suffix('`'))
        {
            path.push('.');
            path.push_str(field);
        }
        ValidationError::new(path, message)
    })
}

/// Validate a raw value into the runtime shape
pub fn validate(raw: &Value, expected_version: &str) -> Result<Document, ValidationError> {
    validate_file(raw, expected_version).map(Document::from_file)
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
