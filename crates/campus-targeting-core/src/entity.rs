// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::rule::RuleSet;

/// Activity window with inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePeriod {
	pub starts_at: DateTime<Utc>,
	pub ends_at: DateTime<Utc>,
}

impl TimePeriod {
	pub fn new(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<Self, ValidationError> {
		if ends_at < starts_at {
			return Err(ValidationError::InvalidTimePeriod);
		}
		Ok(Self { starts_at, ends_at })
	}

	pub fn contains(&self, now: DateTime<Utc>) -> bool {
		self.starts_at <= now && now <= self.ends_at
	}
}

/// The targeting surface shared by feature flags, advertisements, and
/// sponsor placements: an on/off switch, an optional activity window, and
/// the attached rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Targeting {
	pub active: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub time_period: Option<TimePeriod>,
	#[serde(default)]
	pub rules: RuleSet,
}

impl Targeting {
	pub fn new(active: bool) -> Self {
		Self {
			active,
			time_period: None,
			rules: RuleSet::default(),
		}
	}

	pub fn with_time_period(mut self, time_period: TimePeriod) -> Self {
		self.time_period = Some(time_period);
		self
	}

	pub fn with_rules(mut self, rules: RuleSet) -> Self {
		self.rules = rules;
		self
	}
}

/// Implemented by every record the engine can gate: flags, ads, sponsors.
///
/// `targeting_key` must be stable for the record's lifetime: it namespaces
/// the percentage-rollout buckets, so a changed key reshuffles cohorts.
pub trait Targetable {
	fn targeting_key(&self) -> &str;
	fn targeting(&self) -> &Targeting;
}
