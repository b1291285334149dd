// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod credential;
pub mod dashboard;
pub mod insights;
pub mod records;
pub mod stats;

pub use credential::Credential;
pub use dashboard::{DashboardSnapshot, DashboardSummary};
pub use insights::{RosteringInsights, StaffWorkload, WorkloadLevel};
pub use records::{Appointment, Collection, Customer, Record, Service, Staff};
pub use stats::AppointmentStatistics;
