//! Rostering insights derived from appointment statistics.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{AppointmentStatistics, Collection, Staff};

/// Number of busiest hours reported.
const PEAK_HOUR_COUNT: usize = 3;

/// Days the appointment window spans (the proxy requests ±30 days).
pub const WORKLOAD_WINDOW_DAYS: u32 = 30;

/// Average appointments per day above which a barber is overloaded.
const HIGH_WORKLOAD_PER_DAY: u32 = 8;

/// Average appointments per day below which a barber has spare capacity.
const LOW_WORKLOAD_PER_DAY: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum WorkloadLevel {
    High,
    Optimal,
    Spare,
}

impl WorkloadLevel {
    fn from_daily_average(avg_per_day: u32) -> Self {
        if avg_per_day > HIGH_WORKLOAD_PER_DAY {
            WorkloadLevel::High
        } else if avg_per_day < LOW_WORKLOAD_PER_DAY {
            WorkloadLevel::Spare
        } else {
            WorkloadLevel::Optimal
        }
    }

    pub fn recommendation(self) -> &'static str {
        match self {
            WorkloadLevel::High => "Consider reducing workload",
            WorkloadLevel::Optimal => "Optimal workload",
            WorkloadLevel::Spare => "Can handle more appointments",
        }
    }
}

/// Workload summary for one staff member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StaffWorkload {
    pub staff_id: String,
    pub name: String,
    pub appointments: u32,
    pub avg_per_day: u32,
    pub level: WorkloadLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RosteringInsights {
    /// Busiest hours of the day, busiest first
    pub peak_hours: Vec<u32>,
    /// Staff ordered by appointment count, highest first
    pub staff: Vec<StaffWorkload>,
}

impl RosteringInsights {
    pub fn from_stats(stats: &AppointmentStatistics, staff: &Collection<Staff>) -> Self {
        let mut hours: Vec<(u32, u32)> = stats.by_hour.iter().map(|(h, c)| (*h, *c)).collect();
        // Ties go to the earlier hour
        hours.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let peak_hours = hours
            .into_iter()
            .take(PEAK_HOUR_COUNT)
            .map(|(hour, _)| hour)
            .collect();

        let mut workloads: Vec<StaffWorkload> = stats
            .by_staff
            .iter()
            .map(|(staff_id, &count)| {
                let avg_per_day =
                    (f64::from(count) / f64::from(WORKLOAD_WINDOW_DAYS)).round() as u32;
                StaffWorkload {
                    staff_id: staff_id.clone(),
                    name: staff
                        .get(staff_id)
                        .and_then(Staff::display_name)
                        .unwrap_or_else(|| "Unknown Staff".to_string()),
                    appointments: count,
                    avg_per_day,
                    level: WorkloadLevel::from_daily_average(avg_per_day),
                }
            })
            .collect();
        workloads.sort_by(|a, b| {
            b.appointments
                .cmp(&a.appointments)
                .then_with(|| a.staff_id.cmp(&b.staff_id))
        });

        Self {
            peak_hours,
            staff: workloads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_peak_hours_and_workload() {
        let mut stats = AppointmentStatistics::default();
        stats.by_hour.extend([(9, 4), (10, 7), (11, 7), (15, 2), (16, 5)]);
        stats.by_staff.insert("s1".to_string(), 300);
        stats.by_staff.insert("s2".to_string(), 120);
        stats.by_staff.insert("s3".to_string(), 20);

        let staff: Collection<Staff> = serde_json::from_value::<Vec<Staff>>(json!([
            {"key": "s1", "first_name": "Ana", "last_name": "Lee"},
            {"key": "s2", "name": "Bo"}
        ]))
        .unwrap()
        .into_iter()
        .collect();

        let insights = RosteringInsights::from_stats(&stats, &staff);

        assert_eq!(insights.peak_hours, vec![10, 11, 16]);
        assert_eq!(insights.staff.len(), 3);

        assert_eq!(insights.staff[0].name, "Ana Lee");
        assert_eq!(insights.staff[0].avg_per_day, 10);
        assert_eq!(insights.staff[0].level, WorkloadLevel::High);

        assert_eq!(insights.staff[1].name, "Bo");
        assert_eq!(insights.staff[1].level, WorkloadLevel::Optimal);

        assert_eq!(insights.staff[2].name, "Unknown Staff");
        assert_eq!(insights.staff[2].avg_per_day, 1);
        assert_eq!(insights.staff[2].level, WorkloadLevel::Spare);
        assert_eq!(
            insights.staff[2].level.recommendation(),
            "Can handle more appointments"
        );
    }
}
