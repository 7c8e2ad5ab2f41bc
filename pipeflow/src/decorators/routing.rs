//! Member selection for load-balanced pools.

use crate::errors::PipeflowError;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a pool picks the member for the next message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// Fewest queued-or-in-flight messages; ties go to the lowest index.
    #[default]
    SmallestMailbox,
    /// Cycle through members in order.
    RoundRobin,
    /// Uniformly random member.
    Random,
}

impl fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SmallestMailbox => "smallest_mailbox",
            Self::RoundRobin => "round_robin",
            Self::Random => "random",
        };
        f.write_str(name)
    }
}

impl FromStr for RoutingStrategy {
    type Err = PipeflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smallest_mailbox" => Ok(Self::SmallestMailbox),
            "round_robin" => Ok(Self::RoundRobin),
            "random" => Ok(Self::Random),
            other => Err(PipeflowError::Config(format!("unknown routing strategy '{other}'"))),
        }
    }
}

/// Stateful selector over pool members.
#[derive(Debug, Clone)]
pub(crate) struct Router {
    strategy: RoutingStrategy,
    next: usize,
}

impl Router {
    pub(crate) fn new(strategy: RoutingStrategy) -> Self {
        Self { strategy, next: 0 }
    }

    pub(crate) fn strategy(&self) -> RoutingStrategy {
        self.strategy
    }

    /// Picks a member index. `None` entries are terminated members.
    pub(crate) fn select(&mut self, loads: &[Option<usize>]) -> Option<usize> {
        match self.strategy {
            RoutingStrategy::SmallestMailbox => loads
                .iter()
                .enumerate()
                .filter_map(|(index, load)| load.map(|load| (index, load)))
                .min_by_key(|&(_, load)| load)
                .map(|(index, _)| index),
            RoutingStrategy::RoundRobin => {
                let len = loads.len();
                let picked = (0..len)
                    .map(|offset| (self.next + offset) % len)
                    .find(|&index| loads[index].is_some())?;
                self.next = (picked + 1) % len;
                Some(picked)
            }
            RoutingStrategy::Random => {
                let open: Vec<usize> = (0..loads.len()).filter(|&i| loads[i].is_some()).collect();
                open.choose(&mut rand::thread_rng()).copied()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smallest_mailbox_prefers_lowest_index_on_ties() {
        let mut router = Router::new(RoutingStrategy::SmallestMailbox);
        assert_eq!(router.select(&[Some(0), Some(0), Some(0)]), Some(0));
        assert_eq!(router.select(&[Some(1), Some(0), Some(0)]), Some(1));
        assert_eq!(router.select(&[Some(2), Some(3), Some(1)]), Some(2));
    }

    #[test]
    fn test_terminated_members_are_skipped() {
        let mut router = Router::new(RoutingStrategy::SmallestMailbox);
        assert_eq!(router.select(&[None, Some(5)]), Some(1));
        assert_eq!(router.select(&[None, None]), None);
        assert_eq!(router.select(&[]), None);

        let mut router = Router::new(RoutingStrategy::Random);
        assert_eq!(router.select(&[None, Some(9), None]), Some(1));
        assert_eq!(router.select(&[None]), None);
    }

    #[test]
    fn test_round_robin_cycles_over_open_members() {
        let mut router = Router::new(RoutingStrategy::RoundRobin);
        let loads = [Some(4), None, Some(0)];
        let picks: Vec<_> = (0..4).map(|_| router.select(&loads)).collect();
        assert_eq!(picks, vec![Some(0), Some(2), Some(0), Some(2)]);
        assert_eq!(router.select(&[]), None);
    }

    #[test]
    fn test_parse_and_display() {
        for strategy in [
            RoutingStrategy::SmallestMailbox,
            RoutingStrategy::RoundRobin,
            RoutingStrategy::Random,
        ] {
            assert_eq!(strategy.to_string().parse::<RoutingStrategy>().unwrap(), strategy);
        }
        assert!(matches!(
            "fastest".parse::<RoutingStrategy>(),
            Err(PipeflowError::Config(_))
        ));
    }
}
