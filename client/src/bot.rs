//! Headless stand-in for a keyboard and mouse.

use crate::game::{ControlSource, Controls};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::InputKeys;

/// Wanders with random key combinations and fires at random screen points.
pub struct RandomBot {
    rng: StdRng,
    keys: InputKeys,
    next_change_ms: u64,
    shoot_chance: f64,
    screen_width: f32,
    screen_height: f32,
}

impl RandomBot {
    pub fn new(seed: Option<u64>, shoot_chance: f64, screen_width: f32, screen_height: f32) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            rng,
            keys: InputKeys::default(),
            next_change_ms: 0,
            shoot_chance: shoot_chance.clamp(0.0, 1.0),
            screen_width,
            screen_height,
        }
    }
}

impl ControlSource for RandomBot {
    fn sample(&mut self, now_ms: u64) -> Controls {
        if now_ms >= self.next_change_ms {
            self.keys = InputKeys {
                w: self.rng.gen_bool(0.3),
                a: self.rng.gen_bool(0.3),
                s: self.rng.gen_bool(0.3),
                d: self.rng.gen_bool(0.3),
            };
            self.next_change_ms = now_ms + self.rng.gen_range(500..1500);
        }

        let shoot_at = self.rng.gen_bool(self.shoot_chance).then(|| {
            (
                self.rng.gen_range(0.0..self.screen_width),
                self.rng.gen_range(0.0..self.screen_height),
            )
        });

        Controls {
            keys: self.keys,
            shoot_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_hold_until_change_time() {
        let mut bot = RandomBot::new(Some(7), 0.0, 800.0, 600.0);
        let first = bot.sample(0);
        let change_at = bot.next_change_ms;
        assert!((500..1500).contains(&change_at));
        assert_eq!(bot.sample(change_at - 1).keys, first.keys);
    }

    #[test]
    fn test_shoot_targets_stay_on_screen() {
        let mut bot = RandomBot::new(Some(7), 1.0, 800.0, 600.0);
        for now in 0..50 {
            let (x, y) = bot.sample(now).shoot_at.unwrap();
            assert!((0.0..800.0).contains(&x));
            assert!((0.0..600.0).contains(&y));
        }
    }

    #[test]
    fn test_zero_chance_never_shoots() {
        let mut bot = RandomBot::new(Some(1), 0.0, 800.0, 600.0);
        assert!((0..100).all(|now| bot.sample(now).shoot_at.is_none()));
    }
}
