// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Closed value type for custom event payloads.
//!
//! Event data supplied by application code is an arbitrary mapping from string
//! keys to JSON-compatible values. It is modelled as a closed variant so that
//! serialization is always well defined: every [`EventValue`] maps to exactly
//! one JSON value and back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::{Result, TelemetryCoreError};

/// A JSON-compatible value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum EventValue {
	Null,
	Bool(bool),
	Number(Number),
	String(String),
	List(Vec<EventValue>),
	Map(BTreeMap<String, EventValue>),
}

impl From<Value> for EventValue {
	fn from(value: Value) -> Self {
		match value {
			Value::Null => EventValue::Null,
			Value::Bool(b) => EventValue::Bool(b),
			Value::Number(n) => EventValue::Number(n),
			Value::String(s) => EventValue::String(s),
			Value::Array(items) => EventValue::List(items.into_iter().map(Into::into).collect()),
			Value::Object(map) => {
				EventValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
			}
		}
	}
}

impl From<EventValue> for Value {
	fn from(value: EventValue) -> Self {
		match value {
			EventValue::Null => Value::Null,
			EventValue::Bool(b) => Value::Bool(b),
			EventValue::Number(n) => Value::Number(n),
			EventValue::String(s) => Value::String(s),
			EventValue::List(items) => Value::Array(items.into_iter().map(Into::into).collect()),
			EventValue::Map(map) => {
				Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
			}
		}
	}
}

impl From<bool> for EventValue {
	fn from(b: bool) -> Self {
		EventValue::Bool(b)
	}
}

impl From<i64> for EventValue {
	fn from(n: i64) -> Self {
		EventValue::Number(n.into())
	}
}

impl From<u64> for EventValue {
	fn from(n: u64) -> Self {
		EventValue::Number(n.into())
	}
}

impl From<i32> for EventValue {
	fn from(n: i32) -> Self {
		EventValue::Number(n.into())
	}
}

/// Non-finite floats have no JSON representation and become `Null`.
impl From<f64> for EventValue {
	fn from(n: f64) -> Self {
		Number::from_f64(n).map_or(EventValue::Null, EventValue::Number)
	}
}

impl From<&str> for EventValue {
	fn from(s: &str) -> Self {
		EventValue::String(s.to_string())
	}
}

impl From<String> for EventValue {
	fn from(s: String) -> Self {
		EventValue::String(s)
	}
}

impl<T: Into<EventValue>> From<Option<T>> for EventValue {
	fn from(value: Option<T>) -> Self {
		value.map_or(EventValue::Null, Into::into)
	}
}

impl<T: Into<EventValue>> From<Vec<T>> for EventValue {
	fn from(items: Vec<T>) -> Self {
		EventValue::List(items.into_iter().map(Into::into).collect())
	}
}

/// String-keyed event payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventData(BTreeMap<String, EventValue>);

impl EventData {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder-style insert.
	#[must_use]
	pub fn with(mut self, key: impl Into<String>, value: impl Into<EventValue>) -> Self {
		self.insert(key, value);
		self
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<EventValue>) {
		self.0.insert(key.into(), value.into());
	}

	#[must_use]
	pub fn get(&self, key: &str) -> Option<&EventValue> {
		self.0.get(key)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &EventValue)> {
		self.0.iter()
	}

	/// Converts an arbitrary JSON value, which must be an object.
	pub fn from_json(value: Value) -> Result<Self> {
		match value {
			Value::Object(map) => Ok(Self(map.into_iter().map(|(k, v)| (k, v.into())).collect())),
			_ => Err(TelemetryCoreError::InvalidEventData),
		}
	}
}

impl<K: Into<String>, V: Into<EventValue>> FromIterator<(K, V)> for EventData {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self(
			iter
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		)
	}
}

impl From<BTreeMap<String, EventValue>> for EventData {
	fn from(map: BTreeMap<String, EventValue>) -> Self {
		Self(map)
	}
}

impl From<EventData> for Value {
	fn from(data: EventData) -> Self {
		EventValue::Map(data.0).into()
	}
}
