// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// A viewer's role, normalized to lowercase (e.g., "student", "teacher").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Role(String);

impl Role {
	pub fn new(name: impl AsRef<str>) -> Self {
		Self(name.as_ref().trim().to_ascii_lowercase())
	}

	pub fn student() -> Self {
		Self("student".to_string())
	}

	pub fn teacher() -> Self {
		Self("teacher".to_string())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<String> for Role {
	fn from(name: String) -> Self {
		Self::new(name)
	}
}

impl From<Role> for String {
	fn from(role: Role) -> Self {
		role.0
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Opaque school identifier minted by the admin platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchoolId(String);

impl SchoolId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for SchoolId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Immutable snapshot of the viewer attributes targeting rules can match on.
///
/// Built once per request by the session layer from the authenticated user
/// record and request headers. Every field except `viewer_id` is optional;
/// a rule that needs an absent attribute simply does not match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerContext {
	/// Stable per-viewer token; the bucketing key for percentage rollouts.
	pub viewer_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub role: Option<Role>,
	/// ISO 3166-1 alpha-2, uppercase.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub country: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub school_id: Option<SchoolId>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub grade: Option<String>,
	/// Source address of the request, already parsed by the session layer.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub address: Option<IpAddr>,
}

impl ViewerContext {
	pub fn new(viewer_id: impl Into<String>) -> Self {
		Self {
			viewer_id: viewer_id.into(),
			role: None,
			country: None,
			school_id: None,
			grade: None,
			address: None,
		}
	}

	pub fn with_role(mut self, role: Role) -> Self {
		self.role = Some(role);
		self
	}

	pub fn with_country(mut self, country: impl AsRef<str>) -> Self {
		self.country = Some(country.as_ref().trim().to_ascii_uppercase());
		self
	}

	pub fn with_school(mut self, school_id: SchoolId) -> Self {
		self.school_id = Some(school_id);
		self
	}

	pub fn with_grade(mut self, grade: impl Into<String>) -> Self {
		self.grade = Some(grade.into());
		self
	}

	pub fn with_address(mut self, address: IpAddr) -> Self {
		self.address = Some(address);
		self
	}
}
