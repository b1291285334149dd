// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Canonical Setmore resource records.
//!
//! Upstream payloads have drifted across API generations: identifiers are
//! `key` or `id`, foreign keys are `*_key` or `*_id`, money is `cost` or
//! `price` and may arrive as a number or a numeric string. Each record
//! deserializes through a raw shape that accepts every variant and then
//! coalesces the pairs, first present wins.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A record addressable by its upstream identifier.
pub trait Record {
    fn record_id(&self) -> Option<&str>;
}

/// Accept a string or a number; empty strings count as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accept a number or a numeric string; zero counts as absent.
fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let amount = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(amount.filter(|a| a.is_finite() && *a != 0.0))
}

// ─── Customer ────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawCustomer {
    #[serde(default, deserialize_with = "lenient_string")]
    key: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    first_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    email_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    cell_phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    phone: Option<String>,
}

/// Shop customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCustomer")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Customer {
    pub id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl From<RawCustomer> for Customer {
    fn from(raw: RawCustomer) -> Self {
        Self {
            id: raw.key.or(raw.id),
            first_name: raw.first_name,
            last_name: raw.last_name,
            name: raw.name,
            email: raw.email_id.or(raw.email),
            phone: raw.cell_phone.or(raw.phone),
        }
    }
}

impl Record for Customer {
    fn record_id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

// ─── Service ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawService {
    #[serde(default, deserialize_with = "lenient_string")]
    key: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    service_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    cost: Option<f64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    duration: Option<f64>,
}

/// Bookable service with its list price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawService")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Service {
    pub id: Option<String>,
    pub name: Option<String>,
    /// `cost`, falling back to `price`
    pub price: Option<f64>,
    /// Minutes
    pub duration: Option<f64>,
}

impl From<RawService> for Service {
    fn from(raw: RawService) -> Self {
        Self {
            id: raw.key.or(raw.id),
            name: raw.service_name.or(raw.name),
            price: raw.cost.or(raw.price),
            duration: raw.duration,
        }
    }
}

impl Record for Service {
    fn record_id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

// ─── Staff ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawStaff {
    #[serde(default, deserialize_with = "lenient_string")]
    key: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    first_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    email_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    email: Option<String>,
}

/// Staff member (barber).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawStaff")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Staff {
    pub id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Staff {
    /// Human-readable name: "first last", first name alone, or `name`.
    pub fn display_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            (Some(first), None) => Some(first.clone()),
            _ => self.name.clone(),
        }
    }
}

impl From<RawStaff> for Staff {
    fn from(raw: RawStaff) -> Self {
        Self {
            id: raw.key.or(raw.id),
            first_name: raw.first_name,
            last_name: raw.last_name,
            name: raw.name,
            email: raw.email_id.or(raw.email),
        }
    }
}

impl Record for Staff {
    fn record_id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

// ─── Appointment ─────────────────────────────────────────────

#[derive(Deserialize)]
struct RawAppointment {
    #[serde(default, deserialize_with = "lenient_string")]
    key: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    customer_key: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    customer_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    service_key: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    service_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    staff_key: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    staff_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    start_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    end_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    booking_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    status: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    cost: Option<f64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    price: Option<f64>,
    /// Present when the list was requested with customer details
    #[serde(default)]
    customer: Option<Value>,
}

/// Booked appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawAppointment")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Appointment {
    pub id: Option<String>,
    pub customer_id: Option<String>,
    pub service_id: Option<String>,
    pub staff_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub booking_time: Option<String>,
    pub status: Option<String>,
    /// `cost`, falling back to `price`
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
}

impl From<RawAppointment> for Appointment {
    fn from(raw: RawAppointment) -> Self {
        // A malformed embedded customer is dropped rather than failing the record
        let customer = raw
            .customer
            .and_then(|v| serde_json::from_value::<Customer>(v).ok());

        Self {
            id: raw.key.or(raw.id),
            customer_id: raw.customer_key.or(raw.customer_id),
            service_id: raw.service_key.or(raw.service_id),
            staff_id: raw.staff_key.or(raw.staff_id),
            start_time: raw.start_time,
            end_time: raw.end_time,
            booking_time: raw.booking_time,
            status: raw.status,
            cost: raw.cost.or(raw.price),
            customer,
        }
    }
}

impl Record for Appointment {
    fn record_id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

// ─── Collection ──────────────────────────────────────────────

/// Immutable, identifier-indexed set of records in upstream order.
///
/// Records without an identifier are kept (they still count toward
/// statistics) but cannot be looked up. On duplicate identifiers the first
/// record wins the index slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T> {
    records: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Record> Collection<T> {
    pub fn new(records: Vec<T>) -> Self {
        let mut index = HashMap::with_capacity(records.len());
        for (pos, record) in records.iter().enumerate() {
            if let Some(id) = record.record_id() {
                index.entry(id.to_string()).or_insert(pos);
            }
        }
        Self { records, index }
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&pos| &self.records[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }
}

impl<T> Collection<T> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.records.iter()
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn into_records(self) -> Vec<T> {
        self.records
    }
}

impl<T: Record> FromIterator<T> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl<T: Serialize> Serialize for Collection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.records.serialize(serializer)
    }
}
