// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use campus_targeting_core::ValidationError;
use thiserror::Error;

/// A stored rule that failed the defensive re-parse at evaluation time.
///
/// Non-fatal: the rule is treated as a non-match and evaluation of the rest
/// of the entity's rule set (and the rest of the collection) continues.
#[derive(Debug, Error)]
#[error("entity `{entity_key}` rule {rule_index}: {cause}")]
pub struct EvaluationAnomaly {
	pub entity_key: String,
	pub rule_index: usize,
	#[source]
	pub cause: ValidationError,
}

/// Where the evaluator reports anomalies. Injected so callers can count or
/// persist them; the engine itself never fails on one.
pub trait AnomalyObserver {
	fn record(&self, anomaly: &EvaluationAnomaly);
}

/// Default observer: emits each anomaly as a `tracing` warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl AnomalyObserver for LogObserver {
	fn record(&self, anomaly: &EvaluationAnomaly) {
		tracing::warn!(
			entity = %anomaly.entity_key,
			rule = anomaly.rule_index,
			error = %anomaly.cause,
			"skipping malformed targeting rule"
		);
	}
}
