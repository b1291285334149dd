// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod dashboard;
pub mod fetcher;
pub mod normalize;
pub mod setmore;
pub mod token;

pub use dashboard::{DashboardService, LoadOutcome};
pub use fetcher::{DataFetcher, RawDataset};
pub use setmore::{ResourceKind, SetmoreClient};
pub use token::{TokenGrant, TokenManager};
