use bevy_ecs::prelude::*;

/// Seeded generator state shared by every system that rolls dice.
/// Keeping it in one resource keeps a run reproducible from its seed.
#[derive(Resource, Debug, Clone, Copy)]
pub struct WorldRng(pub u64);

/// Advances the generator state and returns the next raw value.
pub fn next_u64(state: &mut u64) -> u64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    *state
}

/// Uniform float in [0, 1).
pub fn roll_unit(rng: &mut u64) -> f64 {
    (next_u64(rng) >> 11) as f64 / (1u64 << 53) as f64
}

/// Uniform integer in [min, max] inclusive.
pub fn roll_range(rng: &mut u64, min: u32, max: u32) -> u32 {
    if max <= min {
        return min;
    }
    let span = (max - min + 1) as u64;
    min + (next_u64(rng) % span) as u32
}

/// Uniform float in [min, max).
pub fn roll_between(rng: &mut u64, min: f64, max: f64) -> f64 {
    min + roll_unit(rng) * (max - min)
}

/// True with probability `chance`, where 1.0 always succeeds.
pub fn roll_chance(rng: &mut u64, chance: f64) -> bool {
    roll_unit(rng) < chance
}

/// FNV-1a hash for deriving stable sub-seeds from string ids.
pub fn hash_seed(value: &str) -> u64 {
    let mut hash = 1469598103934665603u64;
    for byte in value.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(1099511628211);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_rolls_stay_in_range() {
        let mut rng = 9001u64;
        for _ in 0..1000 {
            let roll = roll_unit(&mut rng);
            assert!((0.0..1.0).contains(&roll));
        }
    }

    #[test]
    fn range_rolls_are_inclusive_and_bounded() {
        let mut rng = 7u64;
        let mut seen_min = false;
        let mut seen_max = false;
        for _ in 0..2000 {
            let roll = roll_range(&mut rng, 3, 6);
            assert!((3..=6).contains(&roll));
            seen_min |= roll == 3;
            seen_max |= roll == 6;
        }
        assert!(seen_min && seen_max);
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = 42u64;
        let mut b = 42u64;
        for _ in 0..10 {
            assert_eq!(next_u64(&mut a), next_u64(&mut b));
        }
    }
}
