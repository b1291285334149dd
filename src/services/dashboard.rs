// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard loading.
//!
//! A load runs token → fetch → normalize → statistics and publishes an
//! immutable snapshot. Readers always see either the previous snapshot or
//! the new one, never a partial load.

use crate::error::AppError;
use crate::models::{
    Appointment, AppointmentStatistics, Collection, Customer, DashboardSnapshot, DashboardSummary,
    Record, RosteringInsights,
};
use crate::services::fetcher::RawDataset;
use crate::services::normalize::normalize;
use crate::services::setmore::ResourceKind;
use crate::services::{DataFetcher, TokenManager};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// How often the auto-refresh loop checks snapshot age.
pub const AUTO_REFRESH_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Result of a load request.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded(Arc<DashboardSnapshot>),
    /// Another load was already running
    Skipped,
}

struct Published {
    snapshot: Arc<DashboardSnapshot>,
    at: DateTime<Utc>,
}

/// Owns the latest snapshot and the load lifecycle.
#[derive(Clone)]
pub struct DashboardService {
    inner: Arc<DashboardInner>,
}

struct DashboardInner {
    tokens: TokenManager,
    fetcher: DataFetcher,
    published: RwLock<Option<Published>>,
    last_error: RwLock<Option<String>>,
    loading: AtomicBool,
}

/// Clears the loading flag when a load ends, however it ends.
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl DashboardService {
    pub fn new(tokens: TokenManager, fetcher: DataFetcher) -> Self {
        Self {
            inner: Arc::new(DashboardInner {
                tokens,
                fetcher,
                published: RwLock::new(None),
                last_error: RwLock::new(None),
                loading: AtomicBool::new(false),
            }),
        }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.inner.tokens
    }

    /// Latest successfully loaded snapshot, if any.
    pub async fn latest(&self) -> Option<Arc<DashboardSnapshot>> {
        self.inner
            .published
            .read()
            .await
            .as_ref()
            .map(|p| p.snapshot.clone())
    }

    pub async fn last_loaded_at(&self) -> Option<DateTime<Utc>> {
        self.inner.published.read().await.as_ref().map(|p| p.at)
    }

    /// Message from the most recent failed load, cleared by a successful one.
    pub async fn last_error(&self) -> Option<String> {
        self.inner.last_error.read().await.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.loading.load(Ordering::SeqCst)
    }

    /// True if nothing has loaded yet or the snapshot is older than `max_age`.
    pub async fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        match self.last_loaded_at().await {
            None => true,
            Some(at) => chrono::Duration::from_std(max_age)
                .map(|max_age| now - at > max_age)
                .unwrap_or(false),
        }
    }

    /// Run one load and publish its snapshot.
    ///
    /// A load requested while another is running is skipped. On failure the
    /// previous snapshot stays published.
    pub async fn load(&self) -> Result<LoadOutcome, AppError> {
        if self
            .inner
            .loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Dashboard load already running, skipping");
            return Ok(LoadOutcome::Skipped);
        }
        let _guard = LoadingGuard(&self.inner.loading);

        match self.run_load().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                *self.inner.published.write().await = Some(Published {
                    snapshot: snapshot.clone(),
                    at: Utc::now(),
                });
                self.inner.last_error.write().await.take();
                tracing::info!(
                    customers = snapshot.customers.len(),
                    appointments = snapshot.appointments.len(),
                    services = snapshot.services.len(),
                    staff = snapshot.staff.len(),
                    "Dashboard data loaded"
                );
                Ok(LoadOutcome::Loaded(snapshot))
            }
            Err(e) => {
                tracing::error!(error = %e, "Dashboard load failed, keeping previous data");
                *self.inner.last_error.write().await = Some(load_failure_message(&e));
                Err(e)
            }
        }
    }

    async fn run_load(&self) -> Result<DashboardSnapshot, AppError> {
        let token = self.inner.tokens.get_valid_token().await?;
        let raw = self.inner.fetcher.fetch_all(&token).await?;
        Ok(build_snapshot(&raw, Utc::now()))
    }

    /// Store a new refresh token, mint an access token, then load.
    pub async fn setup_refresh_token(&self, refresh_token: &str) -> Result<LoadOutcome, AppError> {
        self.inner.tokens.setup_refresh_token(refresh_token).await?;
        self.load().await
    }

    /// Reload whenever the snapshot is older than `max_age`.
    ///
    /// Runs until the task is dropped. Failures are logged and retried on
    /// the next check.
    pub async fn run_auto_refresh(self, max_age: Duration, check_every: Duration) {
        let mut ticker = tokio::time::interval(check_every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if !self.inner.tokens.has_access_token().await {
                continue;
            }
            if !self.is_stale(max_age, Utc::now()).await {
                continue;
            }
            tracing::info!("Auto-refreshing dashboard data");
            if let Err(e) = self.load().await {
                tracing::warn!(error = %e, "Auto-refresh failed");
            }
        }
    }
}

/// Normalize a raw dataset and derive everything the dashboard shows.
pub fn build_snapshot(raw: &RawDataset, now: DateTime<Utc>) -> DashboardSnapshot {
    let appointments = normalize(ResourceKind::Appointments, &raw.appointments);
    let services = normalize(ResourceKind::Services, &raw.services);
    let staff = normalize(ResourceKind::Staff, &raw.staff);
    let customers = merge_embedded_customers(
        normalize(ResourceKind::Customers, &raw.customers),
        &appointments,
    );

    let stats = AppointmentStatistics::compute(&appointments, &services);
    let insights = RosteringInsights::from_stats(&stats, &staff);
    let summary = DashboardSummary::new(&customers, &stats);

    DashboardSnapshot {
        customers,
        appointments,
        services,
        staff,
        stats,
        insights,
        summary,
        loaded_at: format_utc_rfc3339(now),
    }
}

/// Add customers embedded in appointments that the customer list lacks.
pub fn merge_embedded_customers(
    customers: Collection<Customer>,
    appointments: &Collection<Appointment>,
) -> Collection<Customer> {
    let mut seen: HashSet<String> = customers
        .iter()
        .filter_map(|c| c.record_id().map(str::to_string))
        .collect();

    let embedded: Vec<Customer> = appointments
        .iter()
        .filter_map(|a| a.customer.as_ref())
        .filter(|c| c.record_id().is_some_and(|id| seen.insert(id.to_string())))
        .cloned()
        .collect();

    if embedded.is_empty() {
        return customers;
    }

    tracing::debug!(count = embedded.len(), "Adding customers embedded in appointments");
    let mut records = customers.into_records();
    records.extend(embedded);
    Collection::new(records)
}

/// Human-readable description of a failed load.
fn load_failure_message(err: &AppError) -> String {
    if err.requires_reauthentication() {
        return "Session expired. Please provide a new refresh token.".to_string();
    }
    match err.fetch_status() {
        Some(status) => format!("Failed to load data (HTTP {}). Please try again.", status),
        None => format!("Failed to load data: {}", err),
    }
}
