// This file is part of q800.
// Copyright (c) 2019 Sebastian Jastrzebski. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::util::{Timer, NANOS_PER_SEC};

// Spec: R6522 Versatile Interface Adapter Datasheet, Interval Timers

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mode {
    Timer1,
    Timer2,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RunMode {
    OneShot,
    Continuous,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntervalTimerState {
    pub latch: u16,
    pub counter_value: u16,
    pub load_time: u64,
    pub next_irq_time: u64,
    pub running: bool,
    pub deadline: Option<u64>,
}

/// 16-bit down counter clocked at `frequency` Hz. The counter is not
/// stepped; its value is derived from the virtual time elapsed since the
/// last load.
pub struct IntervalTimer {
    // Configuration
    mode: Mode,
    frequency: u64,
    // Runtime State
    latch: u16,
    counter_value: u16,
    load_time: u64,
    next_irq_time: u64,
    running: bool,
    timer: Timer,
}

impl IntervalTimer {
    pub fn new(mode: Mode, frequency: u64) -> Self {
        Self {
            mode,
            frequency,
            latch: 0xffff,
            counter_value: 0xffff,
            load_time: 0,
            next_irq_time: 0,
            running: false,
            timer: Timer::new(),
        }
    }

    fn elapsed_ticks(&self, now: u64) -> u64 {
        let delta = now.saturating_sub(self.load_time) as u128;
        (delta * self.frequency as u128 / NANOS_PER_SEC as u128) as u64
    }

    /// Rounds up so that the deadline never lands before the tick it names.
    fn ticks_to_ns(&self, ticks: u64) -> u64 {
        let frequency = self.frequency as u128;
        ((ticks as u128 * NANOS_PER_SEC as u128 + frequency - 1) / frequency) as u64
    }

    /// Timer 1 reloads from the latch, so after the first pass it
    /// cycles with a period of latch + 2 ticks.
    fn reloading_counter(&self, ticks: u64) -> u64 {
        let counter_value = u64::from(self.counter_value);
        let latch = u64::from(self.latch);
        if ticks <= counter_value + 1 {
            counter_value.wrapping_sub(ticks) & 0xffff
        } else {
            let phase = (ticks - (counter_value + 1)) % (latch + 2);
            latch.wrapping_sub(phase) & 0xffff
        }
    }

    pub fn get_counter(&self, now: u64) -> u16 {
        let ticks = self.elapsed_ticks(now);
        let counter = match self.mode {
            Mode::Timer1 => self.reloading_counter(ticks),
            Mode::Timer2 => u64::from(self.counter_value).wrapping_sub(ticks) & 0xffff,
        };
        counter as u16
    }

    pub fn get_deadline(&self) -> Option<u64> {
        self.timer.get_deadline()
    }

    pub fn get_latch(&self) -> u16 {
        self.latch
    }

    pub fn get_mode(&self) -> Mode {
        self.mode
    }

    /// Virtual time of the next counter underflow strictly after `now`.
    pub fn get_next_irq_time(&self, now: u64) -> Option<u64> {
        if self.frequency == 0 {
            return None;
        }
        let ticks = self.elapsed_ticks(now);
        let latch = u64::from(self.latch);
        let next_ticks = match self.reloading_counter(ticks) {
            0xffff => ticks + latch + 1,
            0 => ticks + latch + 2,
            counter => ticks + counter,
        };
        let next_time = self.ticks_to_ns(next_ticks) + self.load_time;
        if next_time <= now {
            Some(now + 1)
        } else {
            Some(next_time)
        }
    }

    pub fn is_due(&self, now: u64) -> bool {
        self.timer.is_due(now)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn load(&mut self, now: u64, value: u16) {
        self.counter_value = value;
        self.load_time = now;
        self.running = true;
    }

    pub fn reset(&mut self, now: u64) {
        self.latch = 0xffff;
        if self.mode == Mode::Timer1 {
            self.counter_value = 0xffff;
            self.load_time = now;
        }
        self.next_irq_time = 0;
        self.running = false;
        self.timer.cancel();
    }

    pub fn set_frequency(&mut self, frequency: u64) {
        self.frequency = frequency;
    }

    pub fn set_latch_hi(&mut self, value: u8) {
        self.latch = (self.latch & 0x00ff) | (u16::from(value) << 8);
    }

    pub fn set_latch_lo(&mut self, value: u8) {
        self.latch = (self.latch & 0xff00) | u16::from(value);
    }

    /// Handles an underflow. A one-shot timer stops after its first interrupt.
    pub fn expire(&mut self, run_mode: RunMode) {
        if run_mode == RunMode::OneShot {
            self.running = false;
        }
        self.timer.cancel();
    }

    /// Recomputes the next underflow and arms the deadline when `armed`.
    pub fn update(&mut self, now: u64, armed: bool) {
        match self.get_next_irq_time(now) {
            Some(next_irq_time) => {
                self.next_irq_time = next_irq_time;
                if armed {
                    self.timer.arm(next_irq_time);
                } else {
                    self.timer.cancel();
                }
            }
            None => self.timer.cancel(),
        }
    }

    // -- State

    pub fn get_state(&self) -> IntervalTimerState {
        IntervalTimerState {
            latch: self.latch,
            counter_value: self.counter_value,
            load_time: self.load_time,
            next_irq_time: self.next_irq_time,
            running: self.running,
            deadline: self.timer.get_deadline(),
        }
    }

    pub fn set_state(&mut self, state: &IntervalTimerState) {
        self.latch = state.latch;
        self.counter_value = state.counter_value;
        self.load_time = state.load_time;
        self.next_irq_time = state.next_irq_time;
        self.running = state.running;
        self.timer.set_deadline(state.deadline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1 MHz keeps one tick at exactly 1000ns.
    const FREQ: u64 = 1_000_000;

    #[test]
    fn counter_counts_down_from_load() {
        let mut timer = IntervalTimer::new(Mode::Timer2, FREQ);
        timer.load(0, 100);
        assert_eq!(100, timer.get_counter(0));
        assert_eq!(90, timer.get_counter(10_000));
        assert_eq!(0xffff, timer.get_counter(101_000));
    }

    #[test]
    fn timer1_reloads_from_latch() {
        let mut timer = IntervalTimer::new(Mode::Timer1, FREQ);
        timer.set_latch_lo(10);
        timer.set_latch_hi(0);
        timer.load(0, 10);
        // 10 -> 0 -> 0xffff takes 11 ticks, then it cycles over latch + 2.
        assert_eq!(0xffff, timer.get_counter(11_000));
        assert_eq!(4, timer.get_counter(17_000));
        assert_eq!(10, timer.get_counter(23_000));
        assert_eq!(0, timer.get_counter(33_000));
    }

    #[test]
    fn next_irq_time_is_strictly_in_future() {
        let mut timer = IntervalTimer::new(Mode::Timer1, FREQ);
        timer.set_latch_lo(10);
        timer.set_latch_hi(0);
        timer.load(0, 10);
        assert_eq!(Some(10_000), timer.get_next_irq_time(0));
        assert_eq!(Some(22_000), timer.get_next_irq_time(10_000));
    }

    #[test]
    fn zero_frequency_never_fires() {
        let mut timer = IntervalTimer::new(Mode::Timer1, 0);
        timer.load(0, 10);
        timer.update(0, true);
        assert_eq!(None, timer.get_deadline());
    }

    #[test]
    fn one_shot_stops_after_expiry() {
        let mut timer = IntervalTimer::new(Mode::Timer2, FREQ);
        timer.load(0, 5);
        timer.update(0, true);
        assert_eq!(Some(5_000), timer.get_deadline());
        timer.expire(RunMode::OneShot);
        assert_eq!(false, timer.is_running());
        assert_eq!(None, timer.get_deadline());
    }
}
