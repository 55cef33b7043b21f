//! Chaos link between two peers
//!
//! Delays frames by a base latency plus jitter, and optionally loses,
//! reorders or duplicates them. Delivery is head-of-line: a frame is never
//! handed out before the frames queued ahead of it, so jitter alone does
//! not reorder.

use std::collections::VecDeque;
use std::time::Duration;

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Jitter distribution
#[derive(Clone, Debug, PartialEq)]
pub enum JitterDistribution {
    /// No jitter
    None,
    Uniform { min_ms: u32, max_ms: u32 },
    /// Normal distribution (mean, stddev), clamped at zero
    Normal { mean_ms: f64, stddev_ms: f64 },
    /// Heavy tail, capped at one second
    Pareto { scale_ms: f64, shape: f64 },
}

impl JitterDistribution {
    pub fn sample(&self, rng: &mut StdRng) -> Duration {
        match self {
            JitterDistribution::None => Duration::ZERO,
            JitterDistribution::Uniform { min_ms, max_ms } => {
                if max_ms <= min_ms {
                    return Duration::from_millis(*min_ms as u64);
                }
                let dist = Uniform::new(*min_ms, *max_ms);
                Duration::from_millis(dist.sample(rng) as u64)
            }
            JitterDistribution::Normal { mean_ms, stddev_ms } => {
                // Box-Muller
                let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
                let u2: f64 = rng.gen();
                let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
                let value = mean_ms + stddev_ms * z;
                Duration::from_millis(value.max(0.0) as u64)
            }
            JitterDistribution::Pareto { scale_ms, shape } => {
                let u: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
                let value = scale_ms / u.powf(1.0 / shape);
                Duration::from_millis(value.min(1000.0) as u64)
            }
        }
    }
}

/// Link conditions
#[derive(Clone, Debug, PartialEq)]
pub struct ChaosConfig {
    pub base_latency: Duration,
    pub jitter: JitterDistribution,
    /// Independent loss probability (0.0 - 1.0)
    pub loss_rate: f64,
    /// Probability that a send starts a loss burst
    pub burst_loss_prob: f64,
    pub burst_length: (u32, u32),
    pub reorder_prob: f64,
    /// How many queued frames a reordered frame may jump
    pub reorder_depth: u32,
    pub duplicate_prob: f64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        ChaosConfig::reliable()
    }
}

impl ChaosConfig {
    /// Zero latency, nothing lost, reordered or duplicated
    pub fn perfect() -> Self {
        ChaosConfig {
            base_latency: Duration::ZERO,
            jitter: JitterDistribution::None,
            loss_rate: 0.0,
            burst_loss_prob: 0.0,
            burst_length: (0, 0),
            reorder_prob: 0.0,
            reorder_depth: 0,
            duplicate_prob: 0.0,
        }
    }

    /// Delayed and jittery, but reliable and ordered. This is the delivery
    /// contract the pickup protocol is written against.
    pub fn reliable() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(40),
            jitter: JitterDistribution::Uniform {
                min_ms: 0,
                max_ms: 30,
            },
            ..ChaosConfig::perfect()
        }
    }

    /// Reliable, but frames may overtake each other or arrive twice
    pub fn scrambled() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(60),
            jitter: JitterDistribution::Normal {
                mean_ms: 20.0,
                stddev_ms: 10.0,
            },
            reorder_prob: 0.2,
            reorder_depth: 4,
            duplicate_prob: 0.1,
            ..ChaosConfig::perfect()
        }
    }

    /// Everything goes wrong, including loss
    pub fn hostile() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(150),
            jitter: JitterDistribution::Pareto {
                scale_ms: 40.0,
                shape: 1.5,
            },
            loss_rate: 0.05,
            burst_loss_prob: 0.05,
            burst_length: (2, 6),
            reorder_prob: 0.15,
            reorder_depth: 6,
            duplicate_prob: 0.05,
        }
    }

    pub fn is_lossless(&self) -> bool {
        self.loss_rate == 0.0 && self.burst_loss_prob == 0.0
    }
}

#[derive(Clone, Debug)]
struct InFlight {
    data: Vec<u8>,
    deliver_at: Duration,
    sent_at: Duration,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChaosStats {
    pub frames_sent: u64,
    pub frames_delivered: u64,
    pub frames_lost: u64,
    pub frames_reordered: u64,
    pub frames_duplicated: u64,
    pub total_latency_ms: u64,
    pub max_latency_ms: u64,
}

impl ChaosStats {
    pub fn loss_rate(&self) -> f64 {
        if self.frames_sent == 0 {
            0.0
        } else {
            self.frames_lost as f64 / self.frames_sent as f64
        }
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.frames_delivered == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.frames_delivered as f64
        }
    }

    pub fn merge(&mut self, other: &ChaosStats) {
        self.frames_sent += other.frames_sent;
        self.frames_delivered += other.frames_delivered;
        self.frames_lost += other.frames_lost;
        self.frames_reordered += other.frames_reordered;
        self.frames_duplicated += other.frames_duplicated;
        self.total_latency_ms += other.total_latency_ms;
        self.max_latency_ms = self.max_latency_ms.max(other.max_latency_ms);
    }
}

/// One direction of a peer-to-peer link
pub struct ChaosNetwork {
    config: ChaosConfig,
    rng: StdRng,
    in_flight: VecDeque<InFlight>,
    now: Duration,
    burst_remaining: u32,
    stats: ChaosStats,
}

impl ChaosNetwork {
    /// Same seed, same sends, same deliveries
    pub fn new(config: ChaosConfig, seed: u64) -> Self {
        ChaosNetwork {
            config,
            rng: StdRng::seed_from_u64(seed),
            in_flight: VecDeque::new(),
            now: Duration::ZERO,
            burst_remaining: 0,
            stats: ChaosStats::default(),
        }
    }

    pub fn config(&self) -> &ChaosConfig {
        &self.config
    }

    pub fn send(&mut self, data: Vec<u8>) {
        self.stats.frames_sent += 1;
        if self.should_drop() {
            self.stats.frames_lost += 1;
            return;
        }

        let deliver_at = self.now + self.config.base_latency + self.config.jitter.sample(&mut self.rng);
        let duplicate = self.rng.gen::<f64>() < self.config.duplicate_prob;
        let frame = InFlight {
            data,
            deliver_at,
            sent_at: self.now,
        };

        if duplicate {
            let extra = self.config.jitter.sample(&mut self.rng);
            self.in_flight.push_back(InFlight {
                deliver_at: deliver_at + extra,
                ..frame.clone()
            });
            self.stats.frames_duplicated += 1;
        }

        if !self.in_flight.is_empty() && self.rng.gen::<f64>() < self.config.reorder_prob {
            let depth = self.config.reorder_depth.min(self.in_flight.len() as u32);
            let jump = self.rng.gen_range(0..=depth) as usize;
            let at = self.in_flight.len().saturating_sub(jump);
            self.in_flight.insert(at, frame);
            self.stats.frames_reordered += 1;
        } else {
            self.in_flight.push_back(frame);
        }
    }

    fn should_drop(&mut self) -> bool {
        if self.burst_remaining > 0 {
            self.burst_remaining -= 1;
            return true;
        }
        if self.config.burst_loss_prob > 0.0 && self.rng.gen::<f64>() < self.config.burst_loss_prob {
            let (min, max) = self.config.burst_length;
            self.burst_remaining = self.rng.gen_range(min..=max.max(min)).saturating_sub(1);
            return true;
        }
        self.config.loss_rate > 0.0 && self.rng.gen::<f64>() < self.config.loss_rate
    }

    /// Advance link time and return frames now deliverable, in order
    pub fn tick(&mut self, dt: Duration) -> Vec<Vec<u8>> {
        self.now += dt;

        let mut delivered = Vec::new();
        while self
            .in_flight
            .front()
            .map_or(false, |f| f.deliver_at <= self.now)
        {
            let Some(frame) = self.in_flight.pop_front() else {
                break;
            };
            let latency = frame.deliver_at.saturating_sub(frame.sent_at).as_millis() as u64;
            self.stats.frames_delivered += 1;
            self.stats.total_latency_ms += latency;
            self.stats.max_latency_ms = self.stats.max_latency_ms.max(latency);
            delivered.push(frame.data);
        }
        delivered
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn stats(&self) -> &ChaosStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ChaosStats::default();
    }

    pub fn now(&self) -> Duration {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: Duration = Duration::from_millis(10);

    fn drain(net: &mut ChaosNetwork, steps: usize) -> Vec<Vec<u8>> {
        (0..steps).flat_map(|_| net.tick(STEP)).collect()
    }

    #[test]
    fn test_perfect_link_delivers_next_tick() {
        let mut net = ChaosNetwork::new(ChaosConfig::perfect(), 1);
        net.send(vec![1]);
        net.send(vec![2]);
        assert_eq!(net.tick(Duration::ZERO), vec![vec![1], vec![2]]);
        assert_eq!(net.in_flight(), 0);
    }

    #[test]
    fn test_reliable_link_delivers_fifo() {
        let mut net = ChaosNetwork::new(ChaosConfig::reliable(), 99);
        let mut got = Vec::new();
        for i in 0..50u8 {
            net.send(vec![i]);
            got.extend(net.tick(STEP));
        }
        got.extend(drain(&mut net, 20));
        let expected: Vec<Vec<u8>> = (0..50u8).map(|i| vec![i]).collect();
        assert_eq!(got, expected);
        assert_eq!(net.stats().frames_lost, 0);
        assert!(net.stats().avg_latency_ms() >= 40.0);
    }

    #[test]
    fn test_scrambled_link_reorders_and_duplicates() {
        let mut net = ChaosNetwork::new(ChaosConfig::scrambled(), 3);
        for i in 0..500u16 {
            net.send(i.to_be_bytes().to_vec());
        }
        let got = drain(&mut net, 200);
        let stats = net.stats();
        assert_eq!(stats.frames_lost, 0);
        assert!(stats.frames_reordered > 0);
        assert!(stats.frames_duplicated > 0);
        assert_eq!(got.len() as u64, 500 + stats.frames_duplicated);
    }

    #[test]
    fn test_hostile_link_loses() {
        let mut net = ChaosNetwork::new(ChaosConfig::hostile(), 12345);
        for i in 0..1000u16 {
            net.send(i.to_be_bytes().to_vec());
        }
        drain(&mut net, 500);
        assert!(net.stats().loss_rate() > 0.03);
        assert!(!ChaosConfig::hostile().is_lossless());
    }

    #[test]
    fn test_same_seed_same_schedule() {
        let run = |seed| {
            let mut net = ChaosNetwork::new(ChaosConfig::hostile(), seed);
            let mut log = Vec::new();
            for i in 0..100u8 {
                net.send(vec![i]);
                log.push(net.tick(STEP));
            }
            log
        };
        assert_eq!(run(5), run(5));
    }

    #[test]
    fn test_pareto_has_heavy_tail() {
        let mut rng = StdRng::seed_from_u64(42);
        let pareto = JitterDistribution::Pareto {
            scale_ms: 50.0,
            shape: 1.5,
        };
        let samples: Vec<u128> = (0..1000).map(|_| pareto.sample(&mut rng).as_millis()).collect();
        let avg = samples.iter().sum::<u128>() / 1000;
        let max = samples.iter().copied().max().unwrap_or(0);
        assert!(max > avg * 2);
        assert!(max <= 1000);
    }
}
