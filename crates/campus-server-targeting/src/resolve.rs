// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use campus_targeting_core::{Targetable, ViewerContext};
use chrono::{DateTime, Utc};
use rand::rngs::ThreadRng;
use rand::Rng;

use crate::bucketing;
use crate::evaluation::evaluate_entity;
use crate::observer::{AnomalyObserver, LogObserver};

/// Filters a slot's candidates down to the ordered subset eligible for the
/// viewer at `now`. Input order is preserved; no hidden randomness. Callers
/// that want every match (sponsor lists) use the result directly; callers
/// that want a single winner per render hand it to a [`SelectionPolicy`]
/// via [`select_one`].
pub fn resolve<'a, T: Targetable>(
	entities: &'a [T],
	viewer: &ViewerContext,
	now: DateTime<Utc>,
) -> Vec<&'a T> {
	resolve_with_observer(entities, viewer, now, &LogObserver)
}

/// [`resolve`] with an explicit anomaly observer.
pub fn resolve_with_observer<'a, T: Targetable>(
	entities: &'a [T],
	viewer: &ViewerContext,
	now: DateTime<Utc>,
	observer: &dyn AnomalyObserver,
) -> Vec<&'a T> {
	entities
		.iter()
		.filter(|entity| evaluate_entity(*entity, viewer, now, observer).is_eligible())
		.collect()
}

/// Resolves the slot and picks a single winner via `policy`. Returns `None`
/// when nothing is eligible or the policy declines to pick.
pub fn select_one<'a, T: Targetable>(
	entities: &'a [T],
	viewer: &ViewerContext,
	now: DateTime<Utc>,
	policy: &mut dyn SelectionPolicy,
) -> Option<&'a T> {
	let eligible = resolve(entities, viewer, now);
	if eligible.is_empty() {
		return None;
	}

	let candidates: Vec<&str> = eligible.iter().map(|e| e.targeting_key()).collect();
	let index = policy.pick(viewer, &candidates)?;
	eligible.get(index).copied()
}

/// How a single winner is chosen among eligible candidates. The three
/// targeting domains differ here: flag lookups need a deterministic verdict,
/// ad and sponsor slots may want varied exposure across impressions.
pub trait SelectionPolicy {
	/// Picks an index into `candidates` (targeting keys, input order).
	fn pick(&mut self, viewer: &ViewerContext, candidates: &[&str]) -> Option<usize>;
}

/// The first eligible candidate wins. Deterministic for a fixed candidate
/// list; the policy for feature-flag lookups.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstEligible;

impl SelectionPolicy for FirstEligible {
	fn pick(&mut self, _viewer: &ViewerContext, candidates: &[&str]) -> Option<usize> {
		if candidates.is_empty() {
			None
		} else {
			Some(0)
		}
	}
}

/// Deterministic per viewer: each candidate is scored by hashing its key
/// with the viewer id, highest score wins (rendezvous hashing). A viewer
/// keeps seeing the same winner as unrelated candidates come and go.
#[derive(Debug, Clone, Copy, Default)]
pub struct StickyChoice;

impl SelectionPolicy for StickyChoice {
	fn pick(&mut self, viewer: &ViewerContext, candidates: &[&str]) -> Option<usize> {
		candidates
			.iter()
			.enumerate()
			.max_by_key(|(_, key)| bucketing::keyed_hash(key, &viewer.viewer_id))
			.map(|(index, _)| index)
	}
}

/// Uniform random pick per call: varied exposure across impressions for
/// rotating ad slots.
#[derive(Debug)]
pub struct UniformRandom<R: Rng = ThreadRng> {
	rng: R,
}

impl UniformRandom {
	pub fn new() -> Self {
		Self {
			rng: rand::thread_rng(),
		}
	}
}

impl Default for UniformRandom {
	fn default() -> Self {
		Self::new()
	}
}

impl<R: Rng> UniformRandom<R> {
	/// Uses a caller-supplied RNG (seedable in tests).
	pub fn with_rng(rng: R) -> Self {
		Self { rng }
	}
}

impl<R: Rng> SelectionPolicy for UniformRandom<R> {
	fn pick(&mut self, _viewer: &ViewerContext, candidates: &[&str]) -> Option<usize> {
		if candidates.is_empty() {
			None
		} else {
			Some(self.rng.gen_range(0..candidates.len()))
		}
	}
}

/// Cycles through candidates across successive picks.
#[derive(Debug, Clone, Default)]
pub struct RoundRobin {
	next: usize,
}

impl SelectionPolicy for RoundRobin {
	fn pick(&mut self, _viewer: &ViewerContext, candidates: &[&str]) -> Option<usize> {
		if candidates.is_empty() {
			return None;
		}
		let index = self.next % candidates.len();
		self.next = self.next.wrapping_add(1);
		Some(index)
	}
}
