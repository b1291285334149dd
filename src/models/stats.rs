//! Appointment statistics for dashboard charts.
//!
//! Computed in a single pass over a freshly normalized appointment set and
//! never updated incrementally: every data load produces a new value.

use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{Appointment, Collection, Service};
use crate::time_utils::{lead_time_days, parse_timestamp, week_start};

/// Status assumed when the upstream record carries none.
pub const DEFAULT_STATUS: &str = "completed";

/// Bucket key for appointments missing a customer/service/staff reference.
pub const UNKNOWN_KEY: &str = "unknown";

/// Bookings made at most this many days ahead are "last minute".
pub const LAST_MINUTE_MAX_DAYS: i64 = 1;

/// Bookings made at least this many days ahead are "advanced".
pub const ADVANCED_MIN_DAYS: i64 = 7;

/// Aggregate statistics over one appointment snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AppointmentStatistics {
    /// Number of appointments considered
    pub total: u32,

    // ─── Identity Breakdown ──────────────────────────────────────
    pub by_customer: HashMap<String, u32>,
    pub by_service: HashMap<String, u32>,
    pub by_staff: HashMap<String, u32>,
    pub by_status: HashMap<String, u32>,

    // ─── Time Series ─────────────────────────────────────────────
    /// Hour of day (0-23) of the appointment start
    pub by_hour: BTreeMap<u32, u32>,
    /// Day of week, 0 = Sunday
    pub by_day: BTreeMap<u32, u32>,
    /// Monday of the appointment's week ("YYYY-MM-DD")
    pub by_week: BTreeMap<String, u32>,
    /// "YYYY-MM"
    pub by_month: BTreeMap<String, u32>,

    // ─── Revenue ─────────────────────────────────────────────────
    pub revenue: f64,

    // ─── Booking Behaviour ───────────────────────────────────────
    /// Days between booking and appointment, one entry per dated appointment
    pub lead_times: Vec<i64>,
    pub last_minute_bookings: u32,
    pub advanced_bookings: u32,
    /// Bookings per booking month (1-12)
    pub seasonal: BTreeMap<u32, u32>,
}

impl AppointmentStatistics {
    /// Compute statistics for `appointments`, imputing missing prices from
    /// `services`.
    pub fn compute(appointments: &Collection<Appointment>, services: &Collection<Service>) -> Self {
        let mut stats = Self::default();
        for appointment in appointments {
            stats.record(appointment, services);
        }
        stats
    }

    fn record(&mut self, appointment: &Appointment, services: &Collection<Service>) {
        self.total += 1;

        bump(&mut self.by_customer, key_or_unknown(&appointment.customer_id));
        bump(&mut self.by_service, key_or_unknown(&appointment.service_id));
        bump(&mut self.by_staff, key_or_unknown(&appointment.staff_id));
        bump(
            &mut self.by_status,
            appointment.status.as_deref().unwrap_or(DEFAULT_STATUS),
        );

        self.revenue += revenue_for(appointment, services);

        let Some(start) = appointment.start_time.as_deref().and_then(parse_timestamp) else {
            tracing::debug!(
                appointment = ?appointment.id,
                start_time = ?appointment.start_time,
                "Appointment has no parseable start time, skipping time buckets"
            );
            return;
        };

        *self.by_hour.entry(start.hour()).or_insert(0) += 1;
        *self
            .by_day
            .entry(start.weekday().num_days_from_sunday())
            .or_insert(0) += 1;
        *self
            .by_week
            .entry(week_start(start.date_naive()).format("%Y-%m-%d").to_string())
            .or_insert(0) += 1;
        *self
            .by_month
            .entry(start.format("%Y-%m").to_string())
            .or_insert(0) += 1;

        // Without a distinct booking time the appointment counts as booked on the day
        let booked = appointment
            .booking_time
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(start);

        let lead = lead_time_days(booked, start);
        self.lead_times.push(lead);
        if lead <= LAST_MINUTE_MAX_DAYS {
            self.last_minute_bookings += 1;
        } else if lead >= ADVANCED_MIN_DAYS {
            self.advanced_bookings += 1;
        }
        *self.seasonal.entry(booked.month()).or_insert(0) += 1;
    }

    /// Mean lead time in whole days, `None` without dated appointments.
    pub fn average_lead_time(&self) -> Option<i64> {
        if self.lead_times.is_empty() {
            return None;
        }
        let sum: i64 = self.lead_times.iter().sum();
        Some((sum as f64 / self.lead_times.len() as f64).round() as i64)
    }

    /// Share of dated appointments booked last minute, in percent.
    pub fn last_minute_rate(&self) -> f64 {
        if self.lead_times.is_empty() {
            return 0.0;
        }
        f64::from(self.last_minute_bookings) * 100.0 / self.lead_times.len() as f64
    }
}

/// Revenue contribution of one appointment.
///
/// Uses the appointment's own cost/price, else the matching service's price,
/// else nothing.
pub fn revenue_for(appointment: &Appointment, services: &Collection<Service>) -> f64 {
    appointment
        .cost
        .or_else(|| {
            appointment
                .service_id
                .as_deref()
                .and_then(|id| services.get(id))
                .and_then(|service| service.price)
        })
        .unwrap_or(0.0)
}

fn key_or_unknown(id: &Option<String>) -> &str {
    id.as_deref().unwrap_or(UNKNOWN_KEY)
}

fn bump(map: &mut HashMap<String, u32>, key: &str) {
    *map.entry(key.to_string()).or_insert(0) += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn appointments(values: serde_json::Value) -> Collection<Appointment> {
        serde_json::from_value::<Vec<Appointment>>(values)
            .unwrap()
            .into_iter()
            .collect()
    }

    fn services(values: serde_json::Value) -> Collection<Service> {
        serde_json::from_value::<Vec<Service>>(values)
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_revenue_imputed_from_service() {
        let appts = appointments(json!([
            {"key": "a1", "service_key": "s1", "start_time": "2024-06-10T10:00Z"}
        ]));
        let svcs = services(json!([{"key": "s1", "service_name": "Cut", "price": 35}]));

        let stats = AppointmentStatistics::compute(&appts, &svcs);
        assert_eq!(stats.revenue, 35.0);
    }

    #[test]
    fn test_revenue_prefers_own_cost_and_ignores_unknown_service() {
        let appts = appointments(json!([
            {"key": "a1", "service_key": "s1", "cost": "20"},
            {"key": "a2", "service_key": "missing"}
        ]));
        let svcs = services(json!([{"key": "s1", "price": 35}]));

        let stats = AppointmentStatistics::compute(&appts, &svcs);
        assert_eq!(stats.revenue, 20.0);
        assert_eq!(stats.total, 2);
    }

    #[test]
    fn test_lead_time_and_classification() {
        let appts = appointments(json!([
            {"key": "a1", "start_time": "2024-06-10T10:00:00Z", "booking_time": "2024-06-07T10:00:00Z"},
            {"key": "a2", "start_time": "2024-06-10T10:00:00Z"},
            {"key": "a3", "start_time": "2024-06-20T10:00:00Z", "booking_time": "2024-06-01T09:00:00Z"}
        ]));

        let stats = AppointmentStatistics::compute(&appts, &Collection::default());
        assert_eq!(stats.lead_times, vec![3, 0, 20]);
        assert_eq!(stats.last_minute_bookings, 1);
        assert_eq!(stats.advanced_bookings, 1);
        assert_eq!(stats.average_lead_time(), Some(8));
        assert!((stats.last_minute_rate() - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.seasonal.get(&6), Some(&3));
    }

    #[test]
    fn test_time_buckets() {
        // 2024-06-09 is a Sunday
        let appts = appointments(json!([
            {"key": "a1", "start_time": "2024-06-09T14:30Z", "status": "cancelled"},
            {"key": "a2", "start_time": "2024-06-03T09:00Z"}
        ]));

        let stats = AppointmentStatistics::compute(&appts, &Collection::default());
        assert_eq!(stats.by_week.get("2024-06-03"), Some(&2));
        assert_eq!(stats.by_day.get(&0), Some(&1));
        assert_eq!(stats.by_day.get(&1), Some(&1));
        assert_eq!(stats.by_hour.get(&14), Some(&1));
        assert_eq!(stats.by_month.get("2024-06"), Some(&2));
        assert_eq!(stats.by_status.get("cancelled"), Some(&1));
        assert_eq!(stats.by_status.get(DEFAULT_STATUS), Some(&1));
    }

    #[test]
    fn test_undated_appointment_counts_identity_only() {
        let appts = appointments(json!([
            {"key": "a1", "customer_id": "c1", "start_time": "whenever"}
        ]));

        let stats = AppointmentStatistics::compute(&appts, &Collection::default());
        assert_eq!(stats.total, 1);
        assert_eq!(stats.by_customer.get("c1"), Some(&1));
        assert_eq!(stats.by_staff.get(UNKNOWN_KEY), Some(&1));
        assert!(stats.by_hour.is_empty());
        assert!(stats.lead_times.is_empty());
        assert_eq!(stats.average_lead_time(), None);
    }
}
