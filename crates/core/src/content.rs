// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content entries: the unit of catalog data
//!
//! An entry pairs descriptive metadata ([`ContentInfo`]) with a lifecycle
//! state ([`StatusInfo`]). Entries are keyed by their unique `name`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One tracked media item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEntry {
    /// Unique key within the catalog
    pub name: String,
    pub content_info: ContentInfo,
    pub status_info: StatusInfo,
    /// Schema version this entry's shape conformed to when last written
    pub data_version: String,
}

impl ContentEntry {
    /// Entry shape version written by this build
    pub const DATA_VERSION: &'static str = "2.0.0";

    /// New entry with empty metadata in the `AVAILABLE` state
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_info: ContentInfo::default(),
            status_info: StatusInfo::Available,
            data_version: Self::DATA_VERSION.to_string(),
        }
    }

    pub fn with_content_info(mut self, content_info: ContentInfo) -> Self {
        self.content_info = content_info;
        self
    }

    pub fn with_status(mut self, status_info: StatusInfo) -> Self {
        self.status_info = status_info;
        self
    }

    pub fn with_data_version(mut self, data_version: impl Into<String>) -> Self {
        self.data_version = data_version.into();
        self
    }
}

/// Descriptive metadata, opaque to the store beyond shape validation
///
/// Every field is optional on disk. Keys this build does not know about are
/// kept in `extra` so they survive a load/save cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentInfo {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub media_info: Vec<MediaInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContentInfo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_published_date(mut self, date: DateTime<Utc>) -> Self {
        self.published_date = Some(date);
        self
    }

    pub fn with_media(mut self, media: MediaInfo) -> Self {
        self.media_info.push(media);
        self
    }
}

/// One downloadable variant of a content item (e.g. "HEVC", "MP3")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl MediaInfo {
    pub fn new(media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            size: None,
            url: None,
        }
    }
}

/// Lifecycle state of a content entry, tagged by `status` on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusInfo {
    /// Can be downloaded with the current account
    Available,
    /// Requires a higher account tier
    #[serde(rename = "CONTENT_PAYWALLED", alias = "PAYWALLED")]
    Paywalled,
    /// Waiting in the download queue
    #[serde(rename_all = "camelCase")]
    Queued {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
    /// Present on local disk
    #[serde(rename_all = "camelCase")]
    Downloaded {
        format: String,
        download_location: String,
        download_date: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<u64>,
    },
}

impl StatusInfo {
    /// Every `status` tag this build can read, aliases included
    pub const TAGS: &'static [&'static str] = &[
        "AVAILABLE",
        "CONTENT_PAYWALLED",
        "PAYWALLED",
        "QUEUED",
        "DOWNLOADED",
    ];

    /// The on-disk `status` tag
    pub fn name(&self) -> &'static str {
        match self {
            StatusInfo::Available => "AVAILABLE",
            StatusInfo::Paywalled => "CONTENT_PAYWALLED",
            StatusInfo::Queued { .. } => "QUEUED",
            StatusInfo::Downloaded { .. } => "DOWNLOADED",
        }
    }

    pub fn is_downloaded(&self) -> bool {
        matches!(self, StatusInfo::Downloaded { .. })
    }
}

impl fmt::Display for StatusInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
#[path = "content_tests.rs"]
mod tests;
