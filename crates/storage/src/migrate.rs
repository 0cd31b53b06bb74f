// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document migrations
//!
//! Migrations rewrite an untyped JSON document one version at a time until it
//! reaches the current version. Each step is a plain function over the
//! top-level object; typing is restored afterwards by [`crate::schema`].
//!
//! A document without a `version` field is the pre-1.0.0 legacy layout.

use crate::schema::CURRENT_VERSION;
use chrono::{DateTime, Utc};
use dfd_core::StatusInfo;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Placeholder used in logs and backup names for an unversioned document
pub const NO_VERSION: &str = "NO_VERSION";

/// Content metadata key holding a status the 2.0.0 schema cannot read
pub const LEGACY_STATUS_KEY: &str = "legacyStatus";

/// Errors that can occur while migrating
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    #[error("unsupported document version: {version}")]
    UnsupportedVersion { version: String },
    #[error("malformed {version} document at `{path}`: {message}")]
    Malformed {
        version: String,
        path: String,
        message: String,
    },
}

/// Inputs a migration step may read besides the document itself
#[derive(Debug, Clone, Copy)]
pub struct MigrationContext {
    pub now: DateTime<Utc>,
}

/// A single step's transform
pub type MigrationFn = fn(&mut Map<String, Value>, &MigrationContext) -> Result<(), MigrationError>;

/// One registered step: `from` → `to`
#[derive(Clone)]
pub struct Migration {
    /// `None` matches a document with no `version` field
    pub from: Option<String>,
    pub to: String,
    apply: MigrationFn,
}

impl Migration {
    pub fn new(from: Option<&str>, to: &str, apply: MigrationFn) -> Self {
        Self {
            from: from.map(str::to_string),
            to: to.to_string(),
            apply,
        }
    }
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// What a completed migration did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Version found on disk (`None` for legacy)
    pub from: Option<String>,
    pub to: String,
    /// Target version of every applied step, in order
    pub steps: Vec<String>,
    /// The migrated document asks for a full catalog re-scan
    pub refetch_required: bool,
}

/// Versioned dispatch table of migrations
#[derive(Debug, Clone)]
pub struct Migrator {
    current: String,
    migrations: Vec<Migration>,
}

impl Migrator {
    /// An empty chain targeting `current`
    pub fn new(current: impl Into<String>) -> Self {
        Self {
            current: current.into(),
            migrations: Vec::new(),
        }
    }

    /// The chain shipped with this build
    pub fn standard() -> Self {
        Self::new(CURRENT_VERSION)
            .register(Migration::new(None, "1.0.0", legacy_to_v1))
            .register(Migration::new(Some("1.0.0"), "2.0.0", v1_to_v2))
    }

    pub fn register(mut self, migration: Migration) -> Self {
        self.migrations.push(migration);
        self
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Steps needed to bring `raw` to the current version
    ///
    /// Empty when `raw` is already current. Fails without touching anything
    /// when some version along the way has no registered step.
    pub fn plan(&self, raw: &Value) -> Result<Vec<&Migration>, MigrationError> {
        let mut version = declared_version(raw)?;
        let mut steps = Vec::new();

        while version.as_deref() != Some(self.current.as_str()) {
            let unsupported = || MigrationError::UnsupportedVersion {
                version: version.clone().unwrap_or_else(|| NO_VERSION.to_string()),
            };
            // A chain longer than the table means it loops
            if steps.len() >= self.migrations.len() {
                return Err(unsupported());
            }
            let step = self
                .migrations
                .iter()
                .find(|m| m.from == version)
                .ok_or_else(unsupported)?;
            steps.push(step);
            version = Some(step.to.clone());
        }

        Ok(steps)
    }

    /// Apply a plan produced by [`Migrator::plan`] for the same document
    pub fn apply(
        &self,
        raw: &mut Value,
        plan: &[&Migration],
        ctx: &MigrationContext,
    ) -> Result<MigrationReport, MigrationError> {
        let from = declared_version(raw)?;
        let Value::Object(doc) = raw else {
            return Err(malformed(from.as_deref(), "$", "expected an object"));
        };

        let mut steps = Vec::with_capacity(plan.len());
        for step in plan {
            tracing::info!(
                from = step.from.as_deref().unwrap_or(NO_VERSION),
                to = %step.to,
                "applying document migration"
            );
            (step.apply)(doc, ctx)?;
            doc.insert("version".to_string(), Value::String(step.to.clone()));
            steps.push(step.to.clone());
        }

        let refetch_required = matches!(doc.get("refetchRequired"), Some(Value::Bool(true)));
        Ok(MigrationReport {
            from,
            to: self.current.clone(),
            steps,
            refetch_required,
        })
    }

    /// Plan and apply in one go
    ///
    /// Returns `None` (and leaves `raw` untouched) when already current.
    pub fn migrate(
        &self,
        raw: &mut Value,
        ctx: &MigrationContext,
    ) -> Result<Option<MigrationReport>, MigrationError> {
        let plan = self.plan(raw)?;
        if plan.is_empty() {
            return Ok(None);
        }
        self.apply(raw, &plan, ctx).map(Some)
    }
}

impl Default for Migrator {
    fn default() -> Self {
        Self::standard()
    }
}

/// The `version` field of a raw document
pub fn declared_version(raw: &Value) -> Result<Option<String>, MigrationError> {
    match raw.get("version") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(v)) => Ok(Some(v.clone())),
        Some(_) => Err(malformed(None, "version", "expected a string")),
    }
}

fn malformed(version: Option<&str>, path: impl Into<String>, message: &str) -> MigrationError {
    MigrationError::Malformed {
        version: version.unwrap_or(NO_VERSION).to_string(),
        path: path.into(),
        message: message.to_string(),
    }
}

/// Values of a list or map, paired with their map key when there is one
fn collection_items(
    value: Option<Value>,
    version: Option<&str>,
    path: &str,
) -> Result<Vec<(Option<String>, Value)>, MigrationError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(map)) => Ok(map.into_iter().map(|(k, v)| (Some(k), v)).collect()),
        Some(Value::Array(items)) => Ok(items.into_iter().map(|v| (None, v)).collect()),
        Some(_) => Err(malformed(version, path, "expected a list or map")),
    }
}

/// Legacy → 1.0.0
///
/// The keyed-by-name `ignored` map becomes the `contentInfo` list, its
/// `reason` becomes `status`, and `MANUAL` is remapped to `AVAILABLE`.
fn legacy_to_v1(doc: &mut Map<String, Value>, ctx: &MigrationContext) -> Result<(), MigrationError> {
    let mut entries = Vec::new();
    let existing = collection_items(doc.remove("contentInfo"), None, "contentInfo")?;
    let ignored = collection_items(doc.remove("ignored"), None, "ignored")?;

    let sources = [("contentInfo", existing), ("ignored", ignored)];
    for (source, (i, (key, value))) in sources
        .into_iter()
        .flat_map(|(source, items)| items.into_iter().enumerate().map(move |item| (source, item)))
    {
        let Value::Object(mut entry) = value else {
            let path = match key {
                Some(key) => format!("{source}.{key}"),
                None => format!("{source}[{i}]"),
            };
            return Err(malformed(None, path, "expected an object"));
        };
        if let Some(reason) = entry.remove("reason") {
            entry.insert("status".to_string(), reason);
        }
        if entry.get("status").and_then(Value::as_str) == Some("MANUAL") {
            entry.insert("status".to_string(), json!("AVAILABLE"));
        }
        if let (false, Some(key)) = (entry.contains_key("name"), key) {
            entry.insert("name".to_string(), Value::String(key));
        }
        entries.push(Value::Object(entry));
    }

    doc.insert("contentInfo".to_string(), Value::Array(entries));
    doc.insert("firstRunComplete".to_string(), Value::Bool(true));
    doc.insert("lastUpdated".to_string(), json!(ctx.now));
    Ok(())
}

/// 1.0.0 → 2.0.0
///
/// Each entry's `meta` and `name` are hoisted to `contentInfo` and `name`;
/// whatever remains is the status. The new shape invalidates cached catalog
/// data, so the document is flagged for a re-scan.
fn v1_to_v2(doc: &mut Map<String, Value>, _ctx: &MigrationContext) -> Result<(), MigrationError> {
    const FROM: Option<&str> = Some("1.0.0");
    let items = collection_items(doc.remove("contentInfo"), FROM, "contentInfo")?;

    let mut entries = Vec::with_capacity(items.len());
    for (i, (key, value)) in items.into_iter().enumerate() {
        let path = format!("contentInfo[{i}]");
        let Value::Object(mut fields) = value else {
            return Err(malformed(FROM, path, "expected an object"));
        };
        let mut content_info = match fields.remove("meta") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(meta) => meta,
        };
        let name = match (fields.remove("name"), key) {
            (Some(Value::String(name)), _) => name,
            (None, Some(key)) => key,
            _ => return Err(malformed(FROM, format!("{path}.name"), "entry has no name")),
        };
        let status_info = if fields.is_empty() {
            json!({ "status": "AVAILABLE" })
        } else if is_readable_status(&fields) {
            Value::Object(fields)
        } else if let Value::Object(meta) = &mut content_info {
            tracing::warn!(
                entry = %name,
                status = fields.get("status").and_then(serde_json::Value::as_str).unwrap_or(""),
                "unreadable status moved into content metadata, entry reset to AVAILABLE"
            );
            meta.insert(LEGACY_STATUS_KEY.to_string(), Value::Object(fields));
            json!({ "status": "AVAILABLE" })
        } else {
            Value::Object(fields)
        };
        entries.push(json!({
            "name": name,
            "contentInfo": content_info,
            "statusInfo": status_info,
            "dataVersion": "1.0.0",
        }));
    }

    doc.insert("contentInfo".to_string(), Value::Array(entries));
    doc.insert("refetchRequired".to_string(), Value::Bool(true));
    Ok(())
}

/// Whether the status object carries a tag the current schema reads
fn is_readable_status(fields: &Map<String, Value>) -> bool {
    fields
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|tag| StatusInfo::TAGS.contains(&tag))
}

#[cfg(test)]
#[path = "migrate_tests.rs"]
mod tests;
