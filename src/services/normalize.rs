// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payload normalization.
//!
//! Setmore has returned each resource list in several envelopes over time.
//! Normalization walks an ordered list of shape matchers and takes the
//! first match. It never fails: an unrecognized payload becomes an empty
//! collection and a warning.

use crate::models::{Collection, Record};
use crate::services::setmore::ResourceKind;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Where a resource list was found in its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// The payload is the list itself
    Array,
    /// `{<resource key>: [...]}`
    ResourceKey,
    /// `{data: [...]}`
    DataKey,
    /// `{}`
    EmptyObject,
}

type ShapeMatcher = fn(&Value, ResourceKind) -> Option<&[Value]>;

const LIST_SHAPES: [(PayloadShape, ShapeMatcher); 4] = [
    (PayloadShape::Array, array_shape),
    (PayloadShape::ResourceKey, resource_key_shape),
    (PayloadShape::DataKey, data_key_shape),
    (PayloadShape::EmptyObject, empty_object_shape),
];

fn array_shape(raw: &Value, _kind: ResourceKind) -> Option<&[Value]> {
    raw.as_array().map(Vec::as_slice)
}

fn resource_key_shape(raw: &Value, kind: ResourceKind) -> Option<&[Value]> {
    raw.get(kind.wrapper_key())?.as_array().map(Vec::as_slice)
}

fn data_key_shape(raw: &Value, _kind: ResourceKind) -> Option<&[Value]> {
    raw.get("data")?.as_array().map(Vec::as_slice)
}

fn empty_object_shape(raw: &Value, _kind: ResourceKind) -> Option<&[Value]> {
    raw.as_object().filter(|o| o.is_empty()).map(|_| &[][..])
}

/// Find the record list inside `raw`, if its shape is recognized.
pub fn locate_records(kind: ResourceKind, raw: &Value) -> Option<(PayloadShape, &[Value])> {
    LIST_SHAPES
        .iter()
        .find_map(|(shape, matcher)| matcher(raw, kind).map(|list| (*shape, list)))
}

/// Normalize one resource payload into a collection.
///
/// Records that do not decode are skipped individually.
pub fn normalize<T>(kind: ResourceKind, raw: &Value) -> Collection<T>
where
    T: DeserializeOwned + Record,
{
    let Some((shape, list)) = locate_records(kind, raw) else {
        tracing::warn!(
            resource = %kind,
            payload_type = json_type(raw),
            "Unrecognized payload shape, using empty collection"
        );
        return Collection::default();
    };

    if shape == PayloadShape::EmptyObject {
        tracing::info!(resource = %kind, "Empty object returned, treating as no records");
    }

    let records: Vec<T> = list
        .iter()
        .enumerate()
        .filter_map(|(pos, item)| match T::deserialize(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(resource = %kind, index = pos, error = %e, "Skipping malformed record");
                None
            }
        })
        .collect();

    tracing::debug!(resource = %kind, ?shape, count = records.len(), "Normalized payload");
    Collection::new(records)
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
