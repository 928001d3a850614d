// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::net::IpAddr;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::{Role, SchoolId};
use crate::error::ValidationError;

/// A targeting rule as the admin CRUD layer stores it: a kind string, an
/// optional loosely-typed payload, and an optional rollout percentage.
///
/// This shape is deliberately permissive so records fetched from storage can
/// carry payloads that no longer validate; converting to [`Rule`] is where
/// the shape is enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rollout: Option<u32>,
}

impl RuleSpec {
	pub fn new(kind: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			value: None,
			rollout: None,
		}
	}

	pub fn with_value(mut self, value: Value) -> Self {
		self.value = Some(value);
		self
	}

	/// Gates the rule by a stable per-viewer percentage in [0, 100].
	pub fn with_rollout(mut self, rollout: u32) -> Self {
		self.rollout = Some(rollout);
		self
	}

	pub fn always_on() -> Self {
		Self::new("always_on")
	}

	pub fn always_off() -> Self {
		Self::new("always_off")
	}

	pub fn country(code: impl AsRef<str>) -> Self {
		Self::new("country").with_value(Value::from(code.as_ref()))
	}

	pub fn school(id: impl AsRef<str>) -> Self {
		Self::new("school").with_value(Value::from(id.as_ref()))
	}

	pub fn grade(label: impl AsRef<str>) -> Self {
		Self::new("grade").with_value(Value::from(label.as_ref()))
	}

	pub fn student() -> Self {
		Self::new("student")
	}

	pub fn teacher() -> Self {
		Self::new("teacher")
	}

	pub fn role<I, S>(accepted: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let roles: Vec<Value> = accepted
			.into_iter()
			.map(|role| Value::from(role.as_ref()))
			.collect();
		Self::new("role").with_value(Value::from(roles))
	}

	pub fn cidr(prefix: impl AsRef<str>) -> Self {
		Self::new("cidr").with_value(Value::from(prefix.as_ref()))
	}

	pub fn percentage(rollout: u32) -> Self {
		Self::new("percentage").with_rollout(rollout)
	}
}

/// What a rule targets. Closed set: adding a kind means adding a variant
/// here and an arm to every match below, all compiler-checked.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleTarget {
	AlwaysOn,
	AlwaysOff,
	/// ISO 3166-1 alpha-2, uppercase.
	Country(String),
	School(SchoolId),
	Grade(String),
	/// Shorthand for role ∈ {student}.
	Student,
	/// Shorthand for role ∈ {teacher}.
	Teacher,
	/// Accepted role set; wire kinds `role` and `user_type` both land here.
	Role(Vec<Role>),
	/// Wire kind `cidr`.
	Network(IpNet),
	/// Pure rollout gate; the rollout itself carries the percentage.
	Percentage,
}

impl RuleTarget {
	/// Wire name of the kind this target serializes back to.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::AlwaysOn => "always_on",
			Self::AlwaysOff => "always_off",
			Self::Country(_) => "country",
			Self::School(_) => "school",
			Self::Grade(_) => "grade",
			Self::Student => "student",
			Self::Teacher => "teacher",
			Self::Role(_) => "role",
			Self::Network(_) => "cidr",
			Self::Percentage => "percentage",
		}
	}
}

/// A validated targeting rule: a typed target plus an optional rollout gate.
///
/// When both are present the rule matches only if the target condition holds
/// *and* the viewer falls inside the rollout cohort. A rollout narrows a
/// target, it never widens one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RuleSpec", into = "RuleSpec")]
pub struct Rule {
	target: RuleTarget,
	rollout: Option<u32>,
}

impl Rule {
	/// Builds a rule from already-typed parts, enforcing the rollout range
	/// and the `percentage`-requires-rollout constraint.
	pub fn new(target: RuleTarget, rollout: Option<u32>) -> Result<Self, ValidationError> {
		if let Some(rollout) = rollout {
			if rollout > 100 {
				return Err(ValidationError::RolloutOutOfRange(rollout));
			}
		}
		if matches!(target, RuleTarget::Percentage) && rollout.is_none() {
			return Err(ValidationError::MissingRollout);
		}
		Ok(Self { target, rollout })
	}

	/// Validates a wire-shaped rule into its typed form.
	///
	/// The CRUD layer calls this on create/update; the evaluation engine
	/// re-runs it per rule as a defensive check against stale stored data.
	pub fn parse(spec: &RuleSpec) -> Result<Self, ValidationError> {
		let target = match spec.kind.as_str() {
			"always_on" => {
				require_no_value(spec)?;
				RuleTarget::AlwaysOn
			}
			"always_off" => {
				require_no_value(spec)?;
				RuleTarget::AlwaysOff
			}
			"country" => RuleTarget::Country(parse_country(spec)?),
			"school" => RuleTarget::School(SchoolId::new(require_string(spec)?)),
			"grade" => RuleTarget::Grade(parse_grade(spec)?),
			"student" => {
				require_no_value(spec)?;
				RuleTarget::Student
			}
			"teacher" => {
				require_no_value(spec)?;
				RuleTarget::Teacher
			}
			"role" | "user_type" => RuleTarget::Role(parse_roles(spec)?),
			"cidr" => RuleTarget::Network(parse_network(spec)?),
			"percentage" => {
				require_no_value(spec)?;
				RuleTarget::Percentage
			}
			other => return Err(ValidationError::UnknownKind(other.to_string())),
		};

		Self::new(target, spec.rollout)
	}

	pub fn target(&self) -> &RuleTarget {
		&self.target
	}

	pub fn rollout(&self) -> Option<u32> {
		self.rollout
	}
}

impl TryFrom<RuleSpec> for Rule {
	type Error = ValidationError;

	fn try_from(spec: RuleSpec) -> Result<Self, Self::Error> {
		Self::parse(&spec)
	}
}

impl From<Rule> for RuleSpec {
	fn from(rule: Rule) -> Self {
		let value = match &rule.target {
			RuleTarget::AlwaysOn
			| RuleTarget::AlwaysOff
			| RuleTarget::Student
			| RuleTarget::Teacher
			| RuleTarget::Percentage => None,
			RuleTarget::Country(code) => Some(Value::from(code.as_str())),
			RuleTarget::School(id) => Some(Value::from(id.as_str())),
			RuleTarget::Grade(label) => Some(Value::from(label.as_str())),
			RuleTarget::Role(roles) => Some(Value::from(
				roles
					.iter()
					.map(|role| Value::from(role.as_str()))
					.collect::<Vec<_>>(),
			)),
			RuleTarget::Network(net) => Some(Value::from(net.to_string())),
		};

		Self {
			kind: rule.target.kind().to_string(),
			value,
			rollout: rule.rollout,
		}
	}
}

fn require_no_value(spec: &RuleSpec) -> Result<(), ValidationError> {
	match &spec.value {
		None | Some(Value::Null) => Ok(()),
		Some(_) => Err(ValidationError::UnexpectedValue {
			kind: spec.kind.clone(),
		}),
	}
}

fn require_string(spec: &RuleSpec) -> Result<&str, ValidationError> {
	match &spec.value {
		None | Some(Value::Null) => Err(ValidationError::MissingValue {
			kind: spec.kind.clone(),
		}),
		Some(Value::String(s)) => {
			let trimmed = s.trim();
			if trimmed.is_empty() {
				Err(ValidationError::InvalidValue {
					kind: spec.kind.clone(),
					reason: "value is empty".to_string(),
				})
			} else {
				Ok(trimmed)
			}
		}
		Some(other) => Err(ValidationError::InvalidValue {
			kind: spec.kind.clone(),
			reason: format!("expected a string, got {other}"),
		}),
	}
}

fn parse_country(spec: &RuleSpec) -> Result<String, ValidationError> {
	let code = require_string(spec)?;
	if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
		return Err(ValidationError::InvalidValue {
			kind: spec.kind.clone(),
			reason: format!("`{code}` is not an ISO 3166-1 alpha-2 code"),
		});
	}
	Ok(code.to_ascii_uppercase())
}

fn parse_grade(spec: &RuleSpec) -> Result<String, ValidationError> {
	// Admin clients have historically sent grades as both strings and
	// numbers; normalize numbers to their decimal label.
	if let Some(Value::Number(n)) = &spec.value {
		return match n.as_i64() {
			Some(n) => Ok(n.to_string()),
			None => Err(ValidationError::InvalidValue {
				kind: spec.kind.clone(),
				reason: format!("`{n}` is not a whole-number grade"),
			}),
		};
	}
	Ok(require_string(spec)?.to_string())
}

fn parse_roles(spec: &RuleSpec) -> Result<Vec<Role>, ValidationError> {
	let roles = match &spec.value {
		None | Some(Value::Null) => {
			return Err(ValidationError::MissingValue {
				kind: spec.kind.clone(),
			})
		}
		Some(Value::String(s)) if !s.trim().is_empty() => vec![Role::new(s)],
		Some(Value::Array(entries)) => {
			let mut roles = Vec::with_capacity(entries.len());
			for entry in entries {
				match entry {
					Value::String(s) if !s.trim().is_empty() => roles.push(Role::new(s)),
					other => {
						return Err(ValidationError::InvalidValue {
							kind: spec.kind.clone(),
							reason: format!("expected a role name, got {other}"),
						})
					}
				}
			}
			roles
		}
		Some(other) => {
			return Err(ValidationError::InvalidValue {
				kind: spec.kind.clone(),
				reason: format!("expected a role name or list, got {other}"),
			})
		}
	};

	if roles.is_empty() {
		return Err(ValidationError::InvalidValue {
			kind: spec.kind.clone(),
			reason: "accepted role list is empty".to_string(),
		});
	}
	Ok(roles)
}

fn parse_network(spec: &RuleSpec) -> Result<IpNet, ValidationError> {
	let value = require_string(spec)?;
	if let Ok(net) = value.parse::<IpNet>() {
		return Ok(net);
	}
	// The admin UI also accepts bare addresses; treat them as host prefixes.
	let invalid = || ValidationError::InvalidNetwork {
		value: value.to_string(),
	};
	match value.parse::<IpAddr>() {
		Ok(IpAddr::V4(addr)) => Ipv4Net::new(addr, 32)
			.map(IpNet::V4)
			.map_err(|_| invalid()),
		Ok(IpAddr::V6(addr)) => Ipv6Net::new(addr, 128)
			.map(IpNet::V6)
			.map_err(|_| invalid()),
		Err(_) => Err(invalid()),
	}
}

/// The ordered rules attached to one entity.
///
/// Kept in wire shape so records fetched from storage always load; an empty
/// set targets every viewer. [`RuleSet::validate`] is the CRUD-facing gate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet(Vec<RuleSpec>);

impl RuleSet {
	pub fn new(rules: Vec<RuleSpec>) -> Self {
		Self(rules)
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn iter(&self) -> std::slice::Iter<'_, RuleSpec> {
		self.0.iter()
	}

	/// Validates every member, returning the typed rules in order. The
	/// first failure is reported with the offending rule's position.
	pub fn validate(&self) -> Result<Vec<Rule>, ValidationError> {
		self.0
			.iter()
			.enumerate()
			.map(|(index, spec)| Rule::parse(spec).map_err(|err| err.at_rule(index)))
			.collect()
	}
}

impl From<Vec<RuleSpec>> for RuleSet {
	fn from(rules: Vec<RuleSpec>) -> Self {
		Self(rules)
	}
}

impl FromIterator<RuleSpec> for RuleSet {
	fn from_iter<I: IntoIterator<Item = RuleSpec>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}

impl<'a> IntoIterator for &'a RuleSet {
	type Item = &'a RuleSpec;
	type IntoIter = std::slice::Iter<'a, RuleSpec>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.iter()
	}
}
