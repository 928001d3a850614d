// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::net::IpAddr;

use ipnet::IpNet;

/// Whether a viewer's address falls inside a target network.
///
/// Both address families are supported. Dual-stack listeners hand us IPv4
/// clients as IPv4-mapped IPv6 addresses, so mapped forms are normalized
/// before comparison in both directions. Any other cross-family pairing is
/// a non-match.
pub fn address_in_network(network: &IpNet, address: IpAddr) -> bool {
	match (network, address) {
		(IpNet::V4(net), IpAddr::V4(addr)) => net.contains(&addr),
		(IpNet::V6(net), IpAddr::V6(addr)) => net.contains(&addr),
		(IpNet::V4(net), IpAddr::V6(addr)) => addr
			.to_ipv4_mapped()
			.map_or(false, |addr| net.contains(&addr)),
		(IpNet::V6(net), IpAddr::V4(addr)) => net.contains(&addr.to_ipv6_mapped()),
	}
}
