//! Team assignment
//!
//! Keeps team sizes within one of each other for the life of a battle:
//! every join goes to the team with the fewest current members, ties broken
//! by lowest index.

use crate::error::BattleError;

/// Pick a team for a newly joined player.
///
/// `team_sizes` is the current member count per team, indexed by team
/// ordinal. Returns the chosen team index.
///
/// # Errors
///
/// Returns `BattleError::BattleFull` when a per-team cap is configured and
/// every team is at it.
pub fn assign(team_sizes: &[u32], max_per_team: Option<u32>) -> Result<u32, BattleError> {
    let (index, smallest) = team_sizes
        .iter()
        .copied()
        .enumerate()
        .min_by_key(|&(index, size)| (size, index))
        .ok_or_else(|| BattleError::validation("battle has no teams"))?;

    if let Some(max) = max_per_team {
        if smallest >= max {
            return Err(BattleError::BattleFull { current: smallest, max });
        }
    }
    Ok(index as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picks_smallest_team() {
        assert_eq!(assign(&[2, 1, 2], None), Ok(1));
    }

    #[test]
    fn test_ties_break_to_lowest_index() {
        assert_eq!(assign(&[1, 1, 1], None), Ok(0));
        assert_eq!(assign(&[2, 1, 1], None), Ok(1));
    }

    #[test]
    fn test_spread_stays_within_one() {
        let mut sizes = vec![0u32; 3];
        for _ in 0..20 {
            let team = assign(&sizes, None).expect("unbounded assignment") as usize;
            sizes[team] += 1;
            let max = sizes.iter().max().copied().unwrap_or(0);
            let min = sizes.iter().min().copied().unwrap_or(0);
            assert!(max - min <= 1, "spread exceeded 1: {:?}", sizes);
        }
    }

    #[test]
    fn test_full_battle_rejected() {
        assert_eq!(
            assign(&[2, 2], Some(2)),
            Err(BattleError::BattleFull { current: 2, max: 2 })
        );
    }

    #[test]
    fn test_cap_applies_per_team() {
        assert_eq!(assign(&[2, 1], Some(2)), Ok(1));
    }
}
