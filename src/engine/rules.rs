//! Pure game rules: win conditions, vote tallies, waterfall gating.

use std::collections::BTreeMap;

use chrono::Duration;

use super::types::Verdict;
use crate::config::RoomConfig;
use crate::ledger::types::PlayerId;
use crate::shuffle::deck::Role;

/// Recompute the verdict from the alive-player role multiset. Never stored;
/// callers re-derive it whenever the multiset is fully known.
///
/// MAFIA wins iff alive mafia > 0 and alive mafia >= alive town. TOWN wins
/// iff no mafia remains alive. No players alive at all is a draw.
pub fn evaluate_verdict<I>(alive_roles: I) -> Option<Verdict>
where
    I: IntoIterator<Item = Role>,
{
    let mut mafia = 0usize;
    let mut town = 0usize;
    for role in alive_roles {
        match role {
            Role::Mafia => mafia += 1,
            Role::Doctor | Role::Detective | Role::Civilian => town += 1,
            // Only reachable from optimistic client-side checks; the
            // ledger path evaluates disclosed roles exclusively.
            Role::Unknown => town += 1,
        }
    }
    if mafia + town == 0 {
        Some(Verdict::Draw)
    } else if mafia == 0 {
        Some(Verdict::TownWins)
    } else if mafia >= town {
        Some(Verdict::MafiaWins)
    } else {
        None
    }
}

/// Plurality with a strict-majority quorum; ties eliminate nobody.
pub fn tally_votes(votes: &BTreeMap<PlayerId, PlayerId>, alive_count: usize) -> Option<PlayerId> {
    let mut counts: BTreeMap<PlayerId, usize> = BTreeMap::new();
    for target in votes.values() {
        *counts.entry(*target).or_default() += 1;
    }
    let top = counts.values().copied().max()?;
    let mut leaders = counts.iter().filter(|(_, c)| **c == top);
    let (leader, _) = leaders.next()?;
    if leaders.next().is_some() {
        return None; // tied plurality
    }
    (top * 2 > alive_count).then_some(*leader)
}

/// Grace delay before the caller at `rank` (position among alive players,
/// host first) may open voting. Staggering the entitled callers avoids
/// redundant concurrent triggers; the lowest rank normally wins the race.
pub fn waterfall_delay(rank: usize, config: &RoomConfig) -> Duration {
    config.vote_trigger_base() + config.vote_trigger_step() * rank as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_mafia_needs_parity() {
        // 1 mafia vs 2 town: game continues.
        assert_eq!(
            evaluate_verdict([Role::Mafia, Role::Doctor, Role::Civilian]),
            None
        );
        // 1 mafia vs 1 town: mafia reaches parity and wins.
        assert_eq!(
            evaluate_verdict([Role::Mafia, Role::Doctor]),
            Some(Verdict::MafiaWins)
        );
    }

    #[test]
    fn verdict_town_wins_without_mafia() {
        assert_eq!(
            evaluate_verdict([Role::Civilian, Role::Detective]),
            Some(Verdict::TownWins)
        );
    }

    #[test]
    fn verdict_empty_room_is_a_draw() {
        assert_eq!(evaluate_verdict(Vec::<Role>::new()), Some(Verdict::Draw));
    }

    fn votes(pairs: &[(PlayerId, PlayerId)]) -> BTreeMap<PlayerId, PlayerId> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn tally_eliminates_majority_plurality() {
        let v = votes(&[(0, 2), (1, 2), (3, 2), (4, 0), (2, 0)]);
        assert_eq!(tally_votes(&v, 5), Some(2));
    }

    #[test]
    fn tally_resolves_ties_as_no_elimination() {
        let v = votes(&[(0, 1), (1, 0), (2, 1), (3, 0)]);
        assert_eq!(tally_votes(&v, 4), None);
    }

    #[test]
    fn tally_requires_quorum() {
        // 2 of 5 votes on the leader is a plurality but not a majority.
        let v = votes(&[(0, 2), (1, 2), (3, 4)]);
        assert_eq!(tally_votes(&v, 5), None);
    }

    #[test]
    fn tally_with_no_votes_eliminates_nobody() {
        assert_eq!(tally_votes(&BTreeMap::new(), 5), None);
    }

    #[test]
    fn waterfall_delay_grows_with_rank() {
        let cfg = RoomConfig::default();
        let d0 = waterfall_delay(0, &cfg);
        let d3 = waterfall_delay(3, &cfg);
        assert_eq!(d0, cfg.vote_trigger_base());
        assert_eq!(d3 - d0, cfg.vote_trigger_step() * 3);
    }
}
