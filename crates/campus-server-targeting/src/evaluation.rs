// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use campus_targeting_core::{Rule, RuleSet, RuleTarget, Targetable, ViewerContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bucketing;
use crate::network;
use crate::observer::{AnomalyObserver, EvaluationAnomaly, LogObserver};

/// Why an entity was or was not eligible for a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum EvaluationReason {
	/// The entity's `active` switch is off.
	Inactive,
	/// The activity window does not contain the evaluation time.
	OutsideWindow,
	/// No rules are attached; the entity targets every viewer.
	EmptyRuleSet,
	/// The rule at `index` matched the viewer.
	RuleMatched { index: usize },
	/// Every rule was a non-match for this viewer.
	NoRuleMatched,
}

impl EvaluationReason {
	pub fn is_eligible(&self) -> bool {
		matches!(self, Self::EmptyRuleSet | Self::RuleMatched { .. })
	}
}

/// Evaluates one entity for one viewer.
///
/// The evaluation order is:
/// 1. Check the entity's `active` switch
/// 2. Check the activity window, if one is set (inclusive bounds)
/// 3. Evaluate the rule set (OR across rules; empty set matches everyone)
///
/// Pure: the verdict depends only on the arguments. The clock is always the
/// caller's `now`, never the system time.
pub fn evaluate_entity<T: Targetable>(
	entity: &T,
	viewer: &ViewerContext,
	now: DateTime<Utc>,
	observer: &dyn AnomalyObserver,
) -> EvaluationReason {
	let targeting = entity.targeting();

	if !targeting.active {
		return EvaluationReason::Inactive;
	}

	if let Some(period) = &targeting.time_period {
		if !period.contains(now) {
			return EvaluationReason::OutsideWindow;
		}
	}

	evaluate_rule_set(&targeting.rules, entity.targeting_key(), viewer, observer)
}

/// Single-entity eligibility check with the default log observer.
pub fn evaluate<T: Targetable>(entity: &T, viewer: &ViewerContext, now: DateTime<Utc>) -> bool {
	evaluate_entity(entity, viewer, now, &LogObserver).is_eligible()
}

/// Evaluates a rule set against a viewer: the set matches if at least one
/// rule matches. Rules are re-parsed defensively; one that fails to parse
/// is reported to `observer` and treated as a non-match, so a single
/// malformed rule never takes down the rest of the set.
pub fn evaluate_rule_set(
	rules: &RuleSet,
	entity_key: &str,
	viewer: &ViewerContext,
	observer: &dyn AnomalyObserver,
) -> EvaluationReason {
	if rules.is_empty() {
		return EvaluationReason::EmptyRuleSet;
	}

	for (index, spec) in rules.iter().enumerate() {
		match Rule::parse(spec) {
			Ok(rule) => {
				if rule_matches(&rule, entity_key, viewer) {
					return EvaluationReason::RuleMatched { index };
				}
			}
			Err(cause) => observer.record(&EvaluationAnomaly {
				entity_key: entity_key.to_string(),
				rule_index: index,
				cause,
			}),
		}
	}

	EvaluationReason::NoRuleMatched
}

/// Evaluates a single rule against a viewer.
///
/// The target condition and the rollout gate must both hold. A viewer
/// missing an attribute the target needs is a non-match, never an error.
pub fn rule_matches(rule: &Rule, entity_key: &str, viewer: &ViewerContext) -> bool {
	let target_matches = match rule.target() {
		RuleTarget::AlwaysOn => true,
		RuleTarget::AlwaysOff => false,
		RuleTarget::Country(code) => viewer
			.country
			.as_deref()
			.map_or(false, |country| country.eq_ignore_ascii_case(code)),
		RuleTarget::School(id) => viewer.school_id.as_ref() == Some(id),
		RuleTarget::Grade(label) => viewer.grade.as_deref() == Some(label.as_str()),
		RuleTarget::Student => matches_role(viewer, "student"),
		RuleTarget::Teacher => matches_role(viewer, "teacher"),
		RuleTarget::Role(accepted) => viewer
			.role
			.as_ref()
			.map_or(false, |role| accepted.contains(role)),
		RuleTarget::Network(net) => viewer
			.address
			.map_or(false, |address| network::address_in_network(net, address)),
		RuleTarget::Percentage => true,
	};

	if !target_matches {
		return false;
	}

	match rule.rollout() {
		Some(rollout) => bucketing::in_rollout(entity_key, &viewer.viewer_id, rollout),
		None => true,
	}
}

fn matches_role(viewer: &ViewerContext, name: &str) -> bool {
	viewer
		.role
		.as_ref()
		.map_or(false, |role| role.as_str() == name)
}

#[cfg(test)]
mod tests {
	use super::*;
	use campus_targeting_core::{Role, RuleSpec, SchoolId, Targeting, TimePeriod};
	use chrono::TimeZone;
	use std::cell::RefCell;

	struct Banner {
		key: String,
		targeting: Targeting,
	}

	impl Banner {
		fn new(key: &str, targeting: Targeting) -> Self {
			Self {
				key: key.to_string(),
				targeting,
			}
		}
	}

	impl Targetable for Banner {
		fn targeting_key(&self) -> &str {
			&self.key
		}

		fn targeting(&self) -> &Targeting {
			&self.targeting
		}
	}

	#[derive(Default)]
	struct CollectingObserver(RefCell<Vec<String>>);

	impl AnomalyObserver for CollectingObserver {
		fn record(&self, anomaly: &EvaluationAnomaly) {
			self.0.borrow_mut().push(anomaly.to_string());
		}
	}

	fn now() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
	}

	fn rules(specs: Vec<RuleSpec>) -> Targeting {
		Targeting::new(true).with_rules(RuleSet::new(specs))
	}

	#[test]
	fn test_inactive_excluded_despite_matching_rules() {
		let banner = Banner::new(
			"banner.fall_drive",
			Targeting::new(false).with_rules(RuleSet::new(vec![RuleSpec::always_on()])),
		);
		let viewer = ViewerContext::new("viewer-1");

		let reason = evaluate_entity(&banner, &viewer, now(), &LogObserver);
		assert_eq!(reason, EvaluationReason::Inactive);
		assert!(!evaluate(&banner, &viewer, now()));
	}

	#[test]
	fn test_out_of_window_excluded_despite_matching_rules() {
		let starts_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
		let ends_at = Utc.with_ymd_and_hms(2025, 1, 31, 23, 59, 59).unwrap();
		let banner = Banner::new(
			"banner.january",
			rules(vec![RuleSpec::always_on()])
				.with_time_period(TimePeriod::new(starts_at, ends_at).unwrap()),
		);
		let viewer = ViewerContext::new("viewer-1");

		let reason = evaluate_entity(&banner, &viewer, now(), &LogObserver);
		assert_eq!(reason, EvaluationReason::OutsideWindow);

		// Inside the window the same entity is eligible.
		let inside = Utc.with_ymd_and_hms(2025, 1, 15, 8, 30, 0).unwrap();
		assert!(evaluate(&banner, &viewer, inside));
	}

	#[test]
	fn test_no_window_is_always_temporally_eligible() {
		let banner = Banner::new("banner.evergreen", rules(vec![]));
		let viewer = ViewerContext::new("viewer-1");
		assert_eq!(
			evaluate_entity(&banner, &viewer, now(), &LogObserver),
			EvaluationReason::EmptyRuleSet
		);
	}

	#[test]
	fn test_empty_rule_set_matches_everyone() {
		let banner = Banner::new("banner.everyone", rules(vec![]));
		for viewer_id in ["viewer-1", "viewer-2", "viewer-3"] {
			assert!(evaluate(&banner, &ViewerContext::new(viewer_id), now()));
		}
	}

	#[test]
	fn test_or_across_rules() {
		// Non-matching country rule plus a matching role rule: eligible.
		let banner = Banner::new(
			"banner.teachers_or_us",
			rules(vec![RuleSpec::country("US"), RuleSpec::teacher()]),
		);
		let viewer = ViewerContext::new("viewer-1")
			.with_role(Role::teacher())
			.with_country("NZ");

		let reason = evaluate_entity(&banner, &viewer, now(), &LogObserver);
		assert_eq!(reason, EvaluationReason::RuleMatched { index: 1 });
	}

	#[test]
	fn test_no_rule_matched() {
		let banner = Banner::new(
			"banner.us_teachers",
			rules(vec![RuleSpec::country("US"), RuleSpec::teacher()]),
		);
		let viewer = ViewerContext::new("viewer-1")
			.with_role(Role::student())
			.with_country("NZ");

		assert_eq!(
			evaluate_entity(&banner, &viewer, now(), &LogObserver),
			EvaluationReason::NoRuleMatched
		);
	}

	#[test]
	fn test_always_off_never_matches() {
		let banner = Banner::new("banner.dark", rules(vec![RuleSpec::always_off()]));
		assert!(!evaluate(&banner, &ViewerContext::new("viewer-1"), now()));
	}

	#[test]
	fn test_country_match_is_case_insensitive() {
		let rule = Rule::parse(&RuleSpec::country("US")).unwrap();
		let viewer = ViewerContext::new("viewer-1").with_country("us");
		assert!(rule_matches(&rule, "banner.us", &viewer));
	}

	#[test]
	fn test_school_and_grade_match() {
		let banner = Banner::new(
			"banner.school",
			rules(vec![RuleSpec::school("sch_042"), RuleSpec::grade("7")]),
		);

		let in_school = ViewerContext::new("viewer-1").with_school(SchoolId::new("sch_042"));
		assert!(evaluate(&banner, &in_school, now()));

		let in_grade = ViewerContext::new("viewer-2").with_grade("7");
		assert!(evaluate(&banner, &in_grade, now()));

		let neither = ViewerContext::new("viewer-3")
			.with_school(SchoolId::new("sch_999"))
			.with_grade("8");
		assert!(!evaluate(&banner, &neither, now()));
	}

	#[test]
	fn test_role_set_membership() {
		let banner = Banner::new(
			"banner.staff",
			rules(vec![RuleSpec::role(["teacher", "admin"])]),
		);

		assert!(evaluate(
			&banner,
			&ViewerContext::new("viewer-1").with_role(Role::new("admin")),
			now()
		));
		assert!(!evaluate(
			&banner,
			&ViewerContext::new("viewer-2").with_role(Role::student()),
			now()
		));
	}

	#[test]
	fn test_cidr_containment() {
		let banner = Banner::new("banner.lab", rules(vec![RuleSpec::cidr("10.0.0.0/8")]));

		let inside = ViewerContext::new("viewer-1").with_address("10.1.2.3".parse().unwrap());
		assert!(evaluate(&banner, &inside, now()));

		let outside = ViewerContext::new("viewer-2").with_address("11.1.2.3".parse().unwrap());
		assert!(!evaluate(&banner, &outside, now()));
	}

	#[test]
	fn test_missing_attribute_fails_closed() {
		// A grade rule against a viewer with no grade: non-match, no error.
		let banner = Banner::new("banner.seventh", rules(vec![RuleSpec::grade("7")]));
		let viewer = ViewerContext::new("viewer-1").with_role(Role::student());

		assert_eq!(
			evaluate_entity(&banner, &viewer, now(), &LogObserver),
			EvaluationReason::NoRuleMatched
		);
	}

	#[test]
	fn test_rollout_narrows_target() {
		// With rollout 0 even a matching target must not match; with 100 it
		// behaves exactly like the bare target.
		let gated = Rule::parse(&RuleSpec::teacher().with_rollout(0)).unwrap();
		let open = Rule::parse(&RuleSpec::teacher().with_rollout(100)).unwrap();
		let viewer = ViewerContext::new("viewer-1").with_role(Role::teacher());

		assert!(!rule_matches(&gated, "banner.pilot", &viewer));
		assert!(rule_matches(&open, "banner.pilot", &viewer));

		// And the target still gates: a student never matches, rollout or not.
		let student = ViewerContext::new("viewer-2").with_role(Role::student());
		assert!(!rule_matches(&open, "banner.pilot", &student));
	}

	#[test]
	fn test_percentage_rule_verdict_is_sticky() {
		let banner = Banner::new("banner.pilot", rules(vec![RuleSpec::percentage(50)]));
		let viewer = ViewerContext::new("viewer-1");

		let first = evaluate(&banner, &viewer, now());
		for _ in 0..10 {
			assert_eq!(evaluate(&banner, &viewer, now()), first);
		}
	}

	#[test]
	fn test_malformed_rule_is_reported_and_skipped() {
		let banner = Banner::new(
			"banner.fall_drive",
			rules(vec![RuleSpec::cidr("bad/prefix"), RuleSpec::teacher()]),
		);
		let viewer = ViewerContext::new("viewer-1").with_role(Role::teacher());
		let observer = CollectingObserver::default();

		// The malformed first rule is skipped; the second still matches.
		let reason = evaluate_entity(&banner, &viewer, now(), &observer);
		assert_eq!(reason, EvaluationReason::RuleMatched { index: 1 });

		let recorded = observer.0.borrow();
		assert_eq!(recorded.len(), 1);
		assert!(recorded[0].contains("banner.fall_drive"));
		assert!(recorded[0].contains("rule 0"));
	}

	#[test]
	fn test_evaluation_is_deterministic() {
		let banner = Banner::new(
			"banner.pilot",
			rules(vec![RuleSpec::teacher().with_rollout(37)]),
		);
		let viewer = ViewerContext::new("viewer-9").with_role(Role::teacher());

		let first = evaluate(&banner, &viewer, now());
		for _ in 0..20 {
			assert_eq!(evaluate(&banner, &viewer, now()), first);
		}
	}

	#[test]
	fn test_reason_serializes_with_tag() {
		let json = serde_json::to_string(&EvaluationReason::RuleMatched { index: 3 }).unwrap();
		assert_eq!(json, r#"{"reason":"rule_matched","index":3}"#);
	}
}
