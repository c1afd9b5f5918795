use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Ordered peer list used for fan-out.
///
/// The gateway is always first. The other peers follow by descending
/// weight, ties kept in discovery order. Readers get an `Arc` snapshot of
/// the last computed order, so they never see a list mid-sort.
pub struct PeerRanking {
    gateway: String,
    state: RwLock<RankState>,
}

#[derive(Default)]
struct RankState {
    /// Every known peer except the gateway, in discovery order.
    discovered: Vec<String>,
    weights: HashMap<String, u64>,
    ordered: Arc<Vec<String>>,
}

impl PeerRanking {
    pub fn new(gateway: impl Into<String>) -> Self {
        let gateway = gateway.into();
        let state = RankState {
            ordered: Arc::new(vec![gateway.clone()]),
            ..RankState::default()
        };
        Self {
            gateway,
            state: RwLock::new(state),
        }
    }

    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    /// Current order, gateway first.
    pub fn peers(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.state.read().expect("peer ranking lock poisoned").ordered)
    }

    /// Append newly discovered peers and recompute the order. Known peers
    /// keep their original discovery position.
    pub fn add_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.write().expect("peer ranking lock poisoned");
        for peer in peers {
            let peer = peer.into();
            if peer.is_empty() || peer == self.gateway || state.discovered.contains(&peer) {
                continue;
            }
            state.discovered.push(peer);
        }
        state.ordered = Arc::new(rank(&self.gateway, &state.discovered, &state.weights));
    }

    pub fn set_weight(&self, peer: &str, weight: u64) {
        self.state
            .write()
            .expect("peer ranking lock poisoned")
            .weights
            .insert(peer.to_string(), weight);
    }

    /// Adjust a peer's weight, floored at zero.
    pub fn adjust_weight(&self, peer: &str, delta: i64) -> u64 {
        let mut state = self.state.write().expect("peer ranking lock poisoned");
        let weight = state.weights.entry(peer.to_string()).or_insert(0);
        *weight = weight.saturating_add_signed(delta);
        *weight
    }

    pub fn weight(&self, peer: &str) -> u64 {
        self.state
            .read()
            .expect("peer ranking lock poisoned")
            .weights
            .get(peer)
            .copied()
            .unwrap_or(0)
    }

    /// All recorded weights, sorted by peer.
    pub fn weights(&self) -> Vec<(String, u64)> {
        let state = self.state.read().expect("peer ranking lock poisoned");
        let mut weights: Vec<(String, u64)> =
            state.weights.iter().map(|(p, w)| (p.clone(), *w)).collect();
        weights.sort();
        weights
    }

    /// Re-sort by the current weights and publish the new order.
    pub fn recompute(&self) -> Arc<Vec<String>> {
        let mut state = self.state.write().expect("peer ranking lock poisoned");
        let ordered = Arc::new(rank(&self.gateway, &state.discovered, &state.weights));
        state.ordered = Arc::clone(&ordered);
        ordered
    }
}

fn rank(gateway: &str, discovered: &[String], weights: &HashMap<String, u64>) -> Vec<String> {
    let mut others: Vec<&String> = discovered.iter().collect();
    // Stable: equal weights keep discovery order.
    others.sort_by(|a, b| {
        let wa = weights.get(*a).copied().unwrap_or(0);
        let wb = weights.get(*b).copied().unwrap_or(0);
        wb.cmp(&wa)
    });
    let mut ordered = Vec::with_capacity(others.len() + 1);
    ordered.push(gateway.to_string());
    ordered.extend(others.into_iter().cloned());
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heavier_peer_moves_ahead_gateway_stays_first() {
        let ranking = PeerRanking::new("gateway");
        ranking.add_peers(["gateway", "p2", "p1"]);
        assert_eq!(*ranking.peers(), vec!["gateway", "p2", "p1"]);

        ranking.set_weight("p1", 5);
        ranking.set_weight("p2", 1);
        ranking.recompute();
        assert_eq!(*ranking.peers(), vec!["gateway", "p1", "p2"]);
    }

    #[test]
    fn gateway_weight_never_moves_it() {
        let ranking = PeerRanking::new("gateway");
        ranking.add_peers(["a", "b"]);
        ranking.set_weight("a", 100);
        ranking.set_weight("gateway", 0);
        assert_eq!(ranking.recompute()[0], "gateway");
        assert_eq!(ranking.peers().iter().filter(|p| *p == "gateway").count(), 1);
    }

    #[test]
    fn ties_keep_discovery_order() {
        let ranking = PeerRanking::new("g");
        ranking.add_peers(["c", "a", "b"]);
        ranking.add_peers(["a", "d"]);
        ranking.set_weight("b", 2);
        ranking.recompute();
        assert_eq!(*ranking.peers(), vec!["g", "b", "c", "a", "d"]);
    }

    #[test]
    fn weights_floor_at_zero() {
        let ranking = PeerRanking::new("g");
        assert_eq!(ranking.adjust_weight("p", -1), 0);
        assert_eq!(ranking.adjust_weight("p", 1), 1);
        assert_eq!(ranking.adjust_weight("p", 1), 2);
        assert_eq!(ranking.adjust_weight("p", -5), 0);
        assert_eq!(ranking.weights(), vec![("p".to_string(), 0)]);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_recompute() {
        let ranking = PeerRanking::new("g");
        ranking.add_peers(["x", "y"]);
        let before = ranking.peers();
        ranking.set_weight("y", 9);
        ranking.recompute();
        assert_eq!(*before, vec!["g", "x", "y"]);
        assert_eq!(*ranking.peers(), vec!["g", "y", "x"]);
    }
}
