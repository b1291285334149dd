// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Setmore Dashboard: booking analytics for a barbershop
//!
//! This crate provides the backend that pulls customers, appointments,
//! services and staff from the Setmore booking API, keeps the OAuth
//! credential fresh, and serves aggregated statistics to the dashboard.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{DashboardService, SetmoreClient};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub client: SetmoreClient,
    pub dashboard: DashboardService,
}
