//! The rarity-pick policy used when a cache is granted, and the weighted
//! draw used when one is opened (spec §4.11).

/// `r` is a uniform roll in `[0, 100)`. `boss_damage_pct` is `None` for
/// non-boss triggers (e.g. `level_up`), which makes every boss-gated
/// branch fall through without special-casing the trigger string.
pub fn pick_rarity(level: i32, trigger: &str, boss_damage_pct: Option<f64>, roll: f64) -> &'static str {
    let boss = boss_damage_pct.unwrap_or(0.0);
    if level >= 10 && trigger == "boss_kill" && boss >= 100.0 && roll < 5.0 {
        "legendary"
    } else if level >= 7 && boss >= 75.0 && roll < 12.0 {
        "epic"
    } else if level >= 4 && roll < 20.0 {
        "rare"
    } else if level >= 2 && roll < 45.0 {
        "uncommon"
    } else {
        "common"
    }
}

/// Walks `weights` accumulating a running sum until it crosses `roll`,
/// returning the index of the entry that "wins" the draw. `roll` must be
/// in `[0, sum(weights))`; the last entry is returned if rounding leaves
/// the running sum just short of `roll` at the final step.
pub fn weighted_pick(weights: &[i32], roll: f64) -> usize {
    let mut running = 0.0;
    for (i, weight) in weights.iter().enumerate() {
        running += *weight as f64;
        if roll < running {
            return i;
        }
    }
    weights.len().saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legendary_requires_full_boss_clear_at_high_level() {
        assert_eq!(pick_rarity(10, "boss_kill", Some(100.0), 4.9), "legendary");
        assert_eq!(pick_rarity(10, "boss_kill", Some(100.0), 5.0), "epic");
        assert_eq!(pick_rarity(9, "boss_kill", Some(100.0), 4.9), "epic");
    }

    #[test]
    fn level_up_trigger_never_hits_boss_gated_tiers() {
        // No boss_damage_pct at all — level_up grants can only land rare/uncommon/common.
        assert_eq!(pick_rarity(12, "level_up", None, 3.0), "rare");
        assert_eq!(pick_rarity(3, "level_up", None, 30.0), "uncommon");
        assert_eq!(pick_rarity(1, "level_up", None, 10.0), "common");
    }

    #[test]
    fn weighted_pick_lands_in_the_correct_bucket() {
        let weights = [10, 20, 70];
        assert_eq!(weighted_pick(&weights, 0.0), 0);
        assert_eq!(weighted_pick(&weights, 9.9), 0);
        assert_eq!(weighted_pick(&weights, 10.0), 1);
        assert_eq!(weighted_pick(&weights, 29.9), 1);
        assert_eq!(weighted_pick(&weights, 30.0), 2);
        assert_eq!(weighted_pick(&weights, 99.9), 2);
    }

    #[test]
    fn weighted_pick_frequencies_match_weights_over_a_million_draws() {
        use rand::Rng;

        let weights = [10, 20, 70];
        let sum: i32 = weights.iter().sum();
        let draws = 1_000_000;
        let mut counts = [0u64; 3];

        let mut rng = rand::thread_rng();
        for _ in 0..draws {
            let roll = rng.gen_range(0.0..sum as f64);
            counts[weighted_pick(&weights, roll)] += 1;
        }

        for (i, &weight) in weights.iter().enumerate() {
            let expected = draws as f64 * weight as f64 / sum as f64;
            let observed = counts[i] as f64;
            let tolerance = expected * 0.01;
            assert!(
                (observed - expected).abs() <= tolerance,
                "bucket {i}: expected ~{expected}, got {observed} (tolerance {tolerance})"
            );
        }
    }
}
