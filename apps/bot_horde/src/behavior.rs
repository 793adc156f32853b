//! Simulated player behavior.
//!
//! Two wall-clock timers drive the state: a movement timer that re-rolls
//! the bot between idling and wandering, and a zone timer that hops the bot
//! between zones. Both only produce intents; the session turns intents into
//! frames. All mutation happens from the owning session's loop, so there is
//! exactly one writer.

use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;
use towerpkt::Vec2;

pub const ZONE_FLOOR: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Moving,
}

const MODES: [Mode; 2] = [Mode::Idle, Mode::Moving];

#[derive(Debug)]
struct ZoneState {
    floor: u32,
    zone_id: u32,
    next_at: Instant,
}

#[derive(Debug)]
pub struct Behavior {
    movement_enabled: bool,
    mode: Mode,
    target_direction: Vec2,
    next_move_at: Instant,
    zone: Option<ZoneState>,
}

impl Behavior {
    /// Both timers are armed to fire immediately; the first expiry draws the
    /// first real delay.
    pub fn new(movement_enabled: bool, zone_enabled: bool, now: Instant) -> Self {
        Self {
            movement_enabled,
            mode: Mode::Idle,
            target_direction: Vec2::ZERO,
            next_move_at: now,
            zone: zone_enabled.then(|| ZoneState {
                floor: ZONE_FLOOR,
                zone_id: 1,
                next_at: now,
            }),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn target_direction(&self) -> Vec2 {
        self.target_direction
    }

    pub fn movement_deadline(&self) -> Instant {
        self.next_move_at
    }

    pub fn zone_deadline(&self) -> Option<Instant> {
        self.zone.as_ref().map(|z| z.next_at)
    }

    pub fn zone(&self) -> Option<(u32, u32)> {
        self.zone.as_ref().map(|z| (z.floor, z.zone_id))
    }

    /// Seed the zone from the server's join response.
    pub fn set_zone(&mut self, floor: u32, zone_id: u32) {
        if let Some(z) = self.zone.as_mut() {
            z.floor = floor;
            z.zone_id = zone_id;
        }
    }

    fn eligible(&self, mode: Mode) -> bool {
        match mode {
            Mode::Idle => true,
            Mode::Moving => self.movement_enabled,
        }
    }

    /// Movement timer expiry: re-arm with a fresh uniform [3s, 10s) delay,
    /// pick the next mode among the currently eligible ones, and roll a new
    /// target direction.
    pub fn tick_movement(&mut self, rng: &mut impl Rng, now: Instant) {
        self.next_move_at = now + Duration::from_secs(rng.random_range(3..10));

        let eligible: Vec<Mode> = MODES.into_iter().filter(|m| self.eligible(*m)).collect();
        self.mode = eligible[rng.random_range(0..eligible.len())];

        self.target_direction = match self.mode {
            Mode::Idle => Vec2::ZERO,
            Mode::Moving => {
                let dir = Vec2 {
                    x: rng.random_range(-1.0..1.0),
                    y: rng.random_range(-1.0..1.0),
                };
                // An exactly-zero draw stays zero rather than dividing by it.
                dir.normalized()
            }
        };
    }

    /// Zone timer expiry: re-arm with a uniform [5s, 15s) delay and pick a
    /// new zone on the fixed floor. Returns the zone to request, or `None`
    /// when zone movement is disabled.
    pub fn tick_zone(&mut self, rng: &mut impl Rng, now: Instant) -> Option<(u32, u32)> {
        let z = self.zone.as_mut()?;
        z.next_at = now + Duration::from_secs(rng.random_range(5..15));
        z.zone_id = rng.random_range(1..10);
        Some((z.floor, z.zone_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_means_zero_vector_and_moving_means_unit() {
        let mut b = Behavior::new(true, false, Instant::now());
        let mut rng = rand::rng();
        let mut saw_moving = false;
        for _ in 0..200 {
            b.tick_movement(&mut rng, Instant::now());
            let dir = b.target_direction();
            match b.mode() {
                Mode::Idle => assert_eq!(dir, Vec2::ZERO),
                Mode::Moving => {
                    saw_moving = true;
                    if dir != Vec2::ZERO {
                        assert!((dir.length() - 1.0).abs() < 1e-4);
                    }
                }
            }
        }
        assert!(saw_moving);
    }

    #[test]
    fn movement_disabled_locks_mode_to_idle() {
        let mut b = Behavior::new(false, false, Instant::now());
        let mut rng = rand::rng();
        for _ in 0..100 {
            b.tick_movement(&mut rng, Instant::now());
            assert_eq!(b.mode(), Mode::Idle);
            assert_eq!(b.target_direction(), Vec2::ZERO);
        }
    }

    #[test]
    fn movement_delay_stays_in_range() {
        let mut b = Behavior::new(true, false, Instant::now());
        let mut rng = rand::rng();
        for _ in 0..100 {
            let now = Instant::now();
            b.tick_movement(&mut rng, now);
            let wait = b.movement_deadline() - now;
            assert!(wait >= Duration::from_secs(3) && wait < Duration::from_secs(10));
        }
    }

    #[test]
    fn zone_draws_stay_on_floor_zero_in_range() {
        let mut b = Behavior::new(true, true, Instant::now());
        let mut rng = rand::rng();
        for _ in 0..100 {
            let now = Instant::now();
            let (floor, zone_id) = b.tick_zone(&mut rng, now).unwrap();
            assert_eq!(floor, ZONE_FLOOR);
            assert!((1..10).contains(&zone_id));
            let wait = b.zone_deadline().unwrap() - now;
            assert!(wait >= Duration::from_secs(5) && wait < Duration::from_secs(15));
        }
    }

    #[test]
    fn zone_disabled_has_no_timer() {
        let mut b = Behavior::new(true, false, Instant::now());
        let mut rng = rand::rng();
        assert!(b.zone_deadline().is_none());
        assert!(b.tick_zone(&mut rng, Instant::now()).is_none());
    }
}
