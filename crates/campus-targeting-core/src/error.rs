// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Rejection raised when a rule or activity window fails construction-time
/// validation. Surfaced to the admin-facing CRUD layer; the evaluation
/// engine re-runs the same checks defensively and downgrades failures to
/// non-matches.
#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("unknown rule type `{0}`")]
	UnknownKind(String),

	#[error("rule `{kind}` requires a value")]
	MissingValue { kind: String },

	#[error("rule `{kind}` does not take a value")]
	UnexpectedValue { kind: String },

	#[error("rule `{kind}` has a malformed value: {reason}")]
	InvalidValue { kind: String, reason: String },

	#[error("rule `cidr` has an invalid network prefix `{value}`")]
	InvalidNetwork { value: String },

	#[error("rollout must be within 0-100, got {0}")]
	RolloutOutOfRange(u32),

	#[error("rule `percentage` requires a rollout")]
	MissingRollout,

	#[error("rule {index}: {source}")]
	Rule {
		index: usize,
		#[source]
		source: Box<ValidationError>,
	},

	#[error("time period ends before it starts")]
	InvalidTimePeriod,
}

impl ValidationError {
	/// Wraps an error with the position of the offending rule in its set.
	pub fn at_rule(self, index: usize) -> Self {
		Self::Rule {
			index,
			source: Box::new(self),
		}
	}
}
