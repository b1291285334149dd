//! Snapshot handed to the dashboard UI after each successful load.

use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{
    Appointment, AppointmentStatistics, Collection, Customer, RosteringInsights, Service, Staff,
};

/// One complete, immutable data load.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DashboardSnapshot {
    #[cfg_attr(feature = "binding-generation", ts(as = "Vec<Customer>"))]
    pub customers: Collection<Customer>,
    #[cfg_attr(feature = "binding-generation", ts(as = "Vec<Appointment>"))]
    pub appointments: Collection<Appointment>,
    #[cfg_attr(feature = "binding-generation", ts(as = "Vec<Service>"))]
    pub services: Collection<Service>,
    #[cfg_attr(feature = "binding-generation", ts(as = "Vec<Staff>"))]
    pub staff: Collection<Staff>,
    pub stats: AppointmentStatistics,
    pub insights: RosteringInsights,
    /// Summary figures for the headline cards
    pub summary: DashboardSummary,
    /// When this snapshot was built (RFC 3339)
    pub loaded_at: String,
}

/// Headline numbers shown above the charts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DashboardSummary {
    pub total_customers: usize,
    pub total_appointments: u32,
    pub total_revenue: f64,
    pub average_lead_time_days: Option<i64>,
    pub last_minute_rate_percent: f64,
}

impl DashboardSummary {
    pub fn new(customers: &Collection<Customer>, stats: &AppointmentStatistics) -> Self {
        Self {
            total_customers: customers.len(),
            total_appointments: stats.total,
            total_revenue: stats.revenue,
            average_lead_time_days: stats.average_lead_time(),
            last_minute_rate_percent: stats.last_minute_rate(),
        }
    }
}
