// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Campus targeting system.
//!
//! This crate provides the data shapes shared by every surface that targets
//! content at viewers: feature flags, advertisements, and sponsor
//! placements all attach the same rule schema to their records. It is used
//! by the server-side evaluation engine (`campus-server-targeting`) and by
//! the admin CRUD layer for construction-time validation.
//!
//! # Overview
//!
//! The targeting system supports:
//! - Geographic, role, school, grade, and network targeting rules
//! - Percentage rollouts with sticky per-viewer bucketing
//! - Activity windows and an entity-level active switch
//! - Construction-time validation of the loosely-typed wire schema
//!
//! # Example
//!
//! ```
//! use campus_targeting_core::{Role, RuleSet, RuleSpec, Targeting, ViewerContext};
//!
//! // Rules as the admin CRUD layer submits them.
//! let rules = RuleSet::new(vec![
//! 	RuleSpec::country("US"),
//! 	RuleSpec::role(["teacher"]).with_rollout(50),
//! ]);
//! assert!(rules.validate().is_ok());
//!
//! let targeting = Targeting::new(true).with_rules(rules);
//!
//! // Snapshot of one viewer, built by the session layer.
//! let viewer = ViewerContext::new("viewer-42")
//! 	.with_role(Role::teacher())
//! 	.with_country("nz");
//! assert_eq!(viewer.country.as_deref(), Some("NZ"));
//! # let _ = targeting;
//! ```

pub mod context;
pub mod entity;
pub mod error;
pub mod rule;

pub use context::{Role, SchoolId, ViewerContext};
pub use entity::{Targetable, Targeting, TimePeriod};
pub use error::ValidationError;
pub use rule::{Rule, RuleSet, RuleSpec, RuleTarget};
