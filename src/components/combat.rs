use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Health pool shared by the player and enemies.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

impl Health {
    pub fn new(max: i32) -> Self {
        Self { current: max, max }
    }

    /// Restores up to `amount` points, clamped to the pool maximum.
    /// Non-positive amounts are ignored. Returns the amount actually restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        if amount <= 0 {
            return 0;
        }
        let before = self.current;
        self.current = (self.current + amount).min(self.max);
        self.current - before
    }

    /// Applies up to `amount` points of damage, clamped at zero.
    /// Non-positive amounts are ignored. Returns the amount actually applied.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        if amount <= 0 {
            return 0;
        }
        let before = self.current;
        self.current = (self.current - amount).max(0);
        before - self.current
    }

    /// Replaces the maximum and clamps the current value down to it.
    /// Never raises the current value.
    pub fn set_max(&mut self, max: i32) {
        self.max = max;
        if self.current > max {
            self.current = max;
        }
    }

    pub fn is_depleted(&self) -> bool {
        self.current <= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heal_clamps_to_max_and_ignores_non_positive() {
        let mut hp = Health { current: 90, max: 100 };
        assert_eq!(hp.heal(25), 10);
        assert_eq!(hp.current, 100);
        assert_eq!(hp.heal(-5), 0);
        assert_eq!(hp.current, 100);
    }

    #[test]
    fn damage_clamps_at_zero() {
        let mut hp = Health::new(30);
        assert_eq!(hp.take_damage(50), 30);
        assert_eq!(hp.current, 0);
        assert!(hp.is_depleted());
    }

    #[test]
    fn lowering_max_never_raises_current() {
        let mut hp = Health { current: 40, max: 200 };
        hp.set_max(100);
        assert_eq!(hp.current, 40);
        hp.set_max(25);
        assert_eq!(hp.current, 25);
    }
}
