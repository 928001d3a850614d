// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::io::Cursor;

use murmur3::murmur3_32;

/// Hashes an (entity, viewer) pair into the keyed rollout space.
pub(crate) fn keyed_hash(entity_key: &str, viewer_id: &str) -> u32 {
	let input = format!("{}.{}", entity_key, viewer_id);
	murmur3_32(&mut Cursor::new(input.as_bytes()), 0).unwrap_or(0)
}

/// Maps an (entity, viewer) pair to a bucket in [0, 100).
///
/// Same inputs always yield the same bucket (no clock, no randomness), so a
/// viewer's rollout cohort is sticky across evaluations and unaffected by
/// other viewers. Buckets are namespaced per entity: the same viewer lands
/// in different buckets for different entities.
pub fn bucket(entity_key: &str, viewer_id: &str) -> u32 {
	keyed_hash(entity_key, viewer_id) % 100
}

/// Whether the viewer falls inside a rollout of the given percentage.
/// A rollout of 0 includes nobody; 100 includes everybody.
pub fn in_rollout(entity_key: &str, viewer_id: &str, rollout: u32) -> bool {
	bucket(entity_key, viewer_id) < rollout
}
