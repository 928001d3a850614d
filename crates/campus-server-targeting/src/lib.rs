// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server-side targeting rule evaluation engine for Campus.
//!
//! Given a viewer's attributes and the rule sets attached to candidate
//! records (feature flags, advertisements, sponsor placements), this crate
//! decides which records are eligible for that viewer. Evaluation is pure
//! and deterministic (the clock is an explicit argument and there is no
//! shared state), so it runs synchronously on request-handling threads and
//! parallelizes per entity with no coordination.
//!
//! # Architecture
//!
//! - `bucketing` - stable per-viewer bucketing for percentage rollouts
//! - `network` - address-in-prefix matching for `cidr` rules
//! - `evaluation` - per-rule dispatch and per-entity eligibility
//! - `resolve` - slot-level resolution and single-winner selection
//! - `observer` - reporting seam for malformed stored rules
//!
//! # Example
//!
//! ```
//! use campus_server_targeting::{evaluate, resolve, select_one, FirstEligible};
//! use campus_targeting_core::{Role, RuleSet, RuleSpec, Targetable, Targeting, ViewerContext};
//! use chrono::Utc;
//!
//! struct Ad {
//! 	key: String,
//! 	targeting: Targeting,
//! }
//!
//! impl Targetable for Ad {
//! 	fn targeting_key(&self) -> &str {
//! 		&self.key
//! 	}
//!
//! 	fn targeting(&self) -> &Targeting {
//! 		&self.targeting
//! 	}
//! }
//!
//! let ads = vec![
//! 	Ad {
//! 		key: "ad.teachers".to_string(),
//! 		targeting: Targeting::new(true)
//! 			.with_rules(RuleSet::new(vec![RuleSpec::teacher()])),
//! 	},
//! 	Ad {
//! 		key: "ad.everyone".to_string(),
//! 		targeting: Targeting::new(true),
//! 	},
//! ];
//!
//! let viewer = ViewerContext::new("viewer-42").with_role(Role::teacher());
//! let now = Utc::now();
//!
//! assert!(evaluate(&ads[0], &viewer, now));
//! assert_eq!(resolve(&ads, &viewer, now).len(), 2);
//!
//! let winner = select_one(&ads, &viewer, now, &mut FirstEligible).unwrap();
//! assert_eq!(winner.key, "ad.teachers");
//! ```

pub mod bucketing;
pub mod evaluation;
pub mod network;
pub mod observer;
pub mod resolve;

pub use bucketing::{bucket, in_rollout};
pub use evaluation::{evaluate, evaluate_entity, evaluate_rule_set, rule_matches, EvaluationReason};
pub use network::address_in_network;
pub use observer::{AnomalyObserver, EvaluationAnomaly, LogObserver};
pub use resolve::{
	resolve, resolve_with_observer, select_one, FirstEligible, RoundRobin, SelectionPolicy,
	StickyChoice, UniformRandom,
};

// Re-export core types for convenience
pub use campus_targeting_core::*;
