use seeder_peer::PeerRanking;

/// Which peers a fan-out reached.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    /// The task was closed before the peer list was exhausted.
    pub cancelled: bool,
}

impl BroadcastReport {
    pub fn contacted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Reward peers that succeeded and penalise those that failed.
    pub fn apply_to(&self, ranking: &PeerRanking) {
        for peer in &self.succeeded {
            ranking.adjust_weight(peer, 1);
        }
        for peer in &self.failed {
            ranking.adjust_weight(peer, -1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_adjusts_weights() {
        let ranking = PeerRanking::new("g");
        ranking.set_weight("bad", 1);
        let report = BroadcastReport {
            succeeded: vec!["good".into(), "good".into()],
            failed: vec!["bad".into(), "bad".into()],
            cancelled: false,
        };
        report.apply_to(&ranking);
        assert_eq!(ranking.weight("good"), 2);
        assert_eq!(ranking.weight("bad"), 0);
        assert_eq!(report.contacted(), 4);
    }
}
