//! XP application and the deterministic level cascade (spec §4.10.1).

use std::collections::BTreeMap;

/// `LEVEL_TITLES` from spec §4.10.1 — levels that grant a title on arrival.
pub fn level_titles() -> BTreeMap<i32, &'static str> {
    BTreeMap::from([(2, "title_fate_awakened"), (5, "title_fate_burning"), (10, "title_fate_ascendant")])
}

/// `T(n) = floor(base * mult^(n-1))` — XP required to go from level `n` to `n+1`.
pub fn level_threshold(base: f64, mult: f64, level: i32) -> i64 {
    (base * mult.powi(level - 1)).floor() as i64
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeResult {
    pub new_xp: i64,
    pub new_level: i32,
    pub levels_gained: i32,
    /// Titles newly granted by landing on a milestone level, in the order
    /// the cascade crossed them.
    pub titles_to_grant: Vec<&'static str>,
}

impl CascadeResult {
    pub fn leveled_up(&self) -> bool {
        self.levels_gained > 0
    }
}

/// Applies `delta` to `(current_xp, current_level)` and cascades through
/// as many level-ups as the new total supports in one call (spec §4.10.1
/// "MUST handle multi-level cascades in one ingest").
pub fn apply_xp(current_xp: i64, current_level: i32, delta: i64, base: f64, mult: f64) -> CascadeResult {
    let titles = level_titles();
    let mut new_xp = current_xp + delta;
    if new_xp < 0 {
        new_xp = 0;
    }
    let mut new_level = current_level;
    let mut titles_to_grant = Vec::new();

    loop {
        if new_xp < level_threshold(base, mult, new_level) {
            break;
        }
        new_level += 1;
        if let Some(title) = titles.get(&new_level) {
            titles_to_grant.push(*title);
        }
        // mult <= 1.0 means the threshold never grows across levels (spec
        // §8 allows mult in [1.0, 2.0]), so a single crossing can only
        // ever justify one level-up — continuing to cascade would loop
        // forever against a flat threshold.
        if mult <= 1.0 {
            break;
        }
    }

    CascadeResult {
        new_xp,
        new_level,
        levels_gained: new_level - current_level,
        titles_to_grant,
    }
}

/// Highest-tier boss title whose threshold `<= boss_damage_pct`, tiers
/// checked 100 then 75 then 50 per spec §4.10 ("earlier-matched wins").
pub fn boss_title_for(boss_damage_pct: f64) -> Option<&'static str> {
    const TIERS: [(f64, &str); 3] =
        [(100.0, "title_boss_tier_100"), (75.0, "title_boss_tier_75"), (50.0, "title_boss_tier_50")];

    TIERS.iter().find(|(threshold, _)| boss_damage_pct >= *threshold).map(|(_, title)| *title)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: f64 = 100.0;
    const MULT: f64 = 1.5;

    #[test]
    fn threshold_matches_formula() {
        assert_eq!(level_threshold(BASE, MULT, 1), 100);
        assert_eq!(level_threshold(BASE, MULT, 2), 150);
        assert_eq!(level_threshold(BASE, MULT, 3), 225);
    }

    #[test]
    fn single_level_up() {
        let result = apply_xp(0, 1, 120, BASE, MULT);
        assert_eq!(result.new_level, 2);
        assert_eq!(result.new_xp, 120);
        assert_eq!(result.titles_to_grant, vec!["title_fate_awakened"]);
    }

    #[test]
    fn multi_level_cascade_in_one_call() {
        // Enough XP to blow past levels 2, 3, 4, 5 in one ingest.
        let result = apply_xp(0, 1, 1000, BASE, MULT);
        assert!(result.levels_gained >= 4);
        assert!(result.titles_to_grant.contains(&"title_fate_awakened"));
        assert!(result.titles_to_grant.contains(&"title_fate_burning"));
    }

    #[test]
    fn no_level_up_when_below_threshold() {
        let result = apply_xp(0, 1, 50, BASE, MULT);
        assert_eq!(result.new_level, 1);
        assert!(!result.leveled_up());
        assert!(result.titles_to_grant.is_empty());
    }

    #[test]
    fn flat_multiplier_grants_one_level_and_terminates() {
        // mult = 1.0 is the low end of spec's valid [1.0, 2.0] range: the
        // threshold is flat across levels, so a single crossing can only
        // grant one level. Regression for an infinite-loop bug.
        let result = apply_xp(0, 1, 350, BASE, 1.0);
        assert_eq!(result.new_level, 2);
        assert_eq!(result.levels_gained, 1);
        assert_eq!(result.new_xp, 350);
    }

    #[test]
    fn sub_one_multiplier_also_terminates() {
        // mult < 1.0 shrinks the threshold with each level; still must
        // not loop forever, and still grants exactly one level per call.
        let result = apply_xp(0, 1, 500, BASE, 0.5);
        assert_eq!(result.levels_gained, 1);
    }

    #[test]
    fn boss_title_picks_highest_matching_tier() {
        assert_eq!(boss_title_for(100.0), Some("title_boss_tier_100"));
        assert_eq!(boss_title_for(80.0), Some("title_boss_tier_75"));
        assert_eq!(boss_title_for(60.0), Some("title_boss_tier_50"));
        assert_eq!(boss_title_for(49.9), None);
    }
}
