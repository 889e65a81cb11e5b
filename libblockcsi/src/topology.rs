//! Zone selection from a `CreateVolume` topology requirement.

use crate::types::{Topology, TopologyRequirement};

/// Topology segment key carrying the availability zone.
pub const TOPOLOGY_KEY: &str = "topology.block.csi.rk8s.io/zone";

fn first_zone(topologies: &[Topology]) -> Option<&str> {
    topologies
        .iter()
        .find_map(|t| t.segments.get(TOPOLOGY_KEY))
        .map(String::as_str)
}

/// Pick one zone: the first match in `preferred`, then in `requisite`.
/// An empty string lets the backend choose.
pub fn pick_availability_zone(requirement: Option<&TopologyRequirement>) -> String {
    let Some(requirement) = requirement else {
        return String::new();
    };
    first_zone(&requirement.preferred)
        .or_else(|| first_zone(&requirement.requisite))
        .unwrap_or_default()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(z: &str) -> Topology {
        Topology::single(TOPOLOGY_KEY, z)
    }

    #[test]
    fn preferred_wins_over_requisite() {
        let req = TopologyRequirement {
            preferred: vec![zone("a")],
            requisite: vec![zone("b")],
        };
        assert_eq!(pick_availability_zone(Some(&req)), "a");
    }

    #[test]
    fn falls_back_to_requisite() {
        let req = TopologyRequirement {
            requisite: vec![zone("b")],
            ..Default::default()
        };
        assert_eq!(pick_availability_zone(Some(&req)), "b");
    }

    #[test]
    fn empty_when_nothing_matches() {
        assert_eq!(pick_availability_zone(None), "");
        assert_eq!(pick_availability_zone(Some(&TopologyRequirement::default())), "");

        let other_keys = TopologyRequirement {
            preferred: vec![Topology::single("kubernetes.io/hostname", "node-1")],
            ..Default::default()
        };
        assert_eq!(pick_availability_zone(Some(&other_keys)), "");
    }

    #[test]
    fn first_match_in_order() {
        let req = TopologyRequirement {
            preferred: vec![
                Topology::single("rack", "r1"),
                zone("c"),
                zone("d"),
            ],
            requisite: vec![zone("e")],
        };
        assert_eq!(pick_availability_zone(Some(&req)), "c");
    }
}
