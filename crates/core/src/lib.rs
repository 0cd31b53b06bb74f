// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dfd-core: data model for the DF downloader catalog
//!
//! This crate provides:
//! - Content entries with their metadata and lifecycle status
//! - The singleton user record
//! - A wall-clock abstraction for deterministic tests

pub mod clock;
pub mod content;
pub mod user;

pub use clock::{Clock, FakeClock, SystemClock};
pub use content::{ContentEntry, ContentInfo, MediaInfo, StatusInfo};
pub use user::UserInfo;
