//! Workload Key Distributions
//!
//! Key generators that drive skip-list workloads. Both draw from
//! `1..=max`; `Zipf` skews towards small keys. `run_mix` drives a list
//! with one distribution and reports the aggregate throughput.

use crate::skip_list::SkipList;
use mvrlu::{MvrluError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

/// Source of workload keys
pub trait KeyDistribution: Send + Sync {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64;

    /// Label used in report tables
    fn label(&self) -> String;
}

/// Uniform keys in `1..=max`
#[derive(Debug, Clone, Copy)]
pub struct Uniform {
    max: u64,
}

impl Uniform {
    pub fn new(max: u64) -> Result<Self> {
        if max == 0 {
            return Err(MvrluError::InvalidArgument("max must be > 0".to_string()));
        }
        Ok(Self { max })
    }
}

impl KeyDistribution for Uniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        rng.gen_range(1..=self.max) as i64
    }

    fn label(&self) -> String {
        "Uniform".to_string()
    }
}

/// Zipfian keys in `1..=max` with exponent `alpha`
///
/// `P(k) = C / k^alpha` with `C` normalising the sum to one. The cumulative
/// distribution is computed once, so sampling is a binary search.
#[derive(Debug, Clone)]
pub struct Zipf {
    alpha: f64,
    cdf: Vec<f64>,
}

impl Zipf {
    pub fn new(alpha: f64, max: u64) -> Result<Self> {
        if max == 0 {
            return Err(MvrluError::InvalidArgument("max must be > 0".to_string()));
        }
        if !alpha.is_finite() || alpha < 0.0 {
            return Err(MvrluError::InvalidArgument(format!(
                "alpha must be finite and >= 0, got {}",
                alpha
            )));
        }

        let weights: Vec<f64> = (1..=max).map(|k| (k as f64).powf(-alpha)).collect();
        let total: f64 = weights.iter().sum();
        let mut acc = 0.0;
        let mut cdf: Vec<f64> = weights
            .into_iter()
            .map(|w| {
                acc += w / total;
                acc
            })
            .collect();
        // Rounding may leave the last entry a hair below one.
        if let Some(last) = cdf.last_mut() {
            *last = 1.0;
        }

        Ok(Self { alpha, cdf })
    }

    #[inline]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    #[inline]
    pub fn max(&self) -> u64 {
        self.cdf.len() as u64
    }

    /// Probability of drawing `key`
    pub fn probability(&self, key: u64) -> f64 {
        match key {
            0 => 0.0,
            k if k > self.max() => 0.0,
            1 => self.cdf[0],
            k => self.cdf[k as usize - 1] - self.cdf[k as usize - 2],
        }
    }
}

impl KeyDistribution for Zipf {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        let z: f64 = rng.gen();
        let index = self.cdf.partition_point(|&p| p < z);
        (index.min(self.cdf.len() - 1) + 1) as i64
    }

    fn label(&self) -> String {
        format!("Zipf (s={})", self.alpha)
    }
}

/// Shape of a timed run
#[derive(Debug, Clone, Copy)]
pub struct Mix {
    pub threads: usize,
    pub ops_per_thread: usize,
    /// Share of operations that write, in percent; split evenly between
    /// inserts and removals
    pub update_percent: u32,
}

/// Run `mix` against `list`, returning operations per second
///
/// Each worker registers its own handle and draws keys from `keys` with a
/// per-worker seed. Timing starts once every worker is registered.
pub fn run_mix<D>(list: &Arc<SkipList>, keys: &Arc<D>, mix: Mix) -> Result<f64>
where
    D: KeyDistribution + 'static,
{
    if mix.threads == 0 || mix.update_percent > 100 {
        return Err(MvrluError::InvalidArgument(format!("invalid mix {:?}", mix)));
    }

    let ready = Arc::new(Barrier::new(mix.threads + 1));
    let workers: Vec<_> = (0..mix.threads)
        .map(|id| {
            let list = Arc::clone(list);
            let keys = Arc::clone(keys);
            let ready = Arc::clone(&ready);
            thread::spawn(move || -> Result<()> {
                let registered = list.register();
                ready.wait();
                let mut handle = registered?;
                let mut rng = StdRng::seed_from_u64(id as u64);

                for _ in 0..mix.ops_per_thread {
                    let key = keys.sample(&mut rng);
                    let roll = rng.gen_range(0..200);
                    if roll < mix.update_percent {
                        list.insert(&mut handle, key)?;
                    } else if roll < 2 * mix.update_percent {
                        list.remove(&mut handle, key)?;
                    } else {
                        list.contains(&handle, key);
                    }
                }
                Ok(())
            })
        })
        .collect();

    ready.wait();
    let start = Instant::now();
    for worker in workers {
        worker
            .join()
            .map_err(|_| MvrluError::Internal("workload thread panicked".to_string()))??;
    }
    let elapsed = start.elapsed().as_secs_f64().max(f64::EPSILON);

    let total = (mix.threads * mix.ops_per_thread) as f64;
    log::debug!(
        "{} x {} ops ({}% updates, {}): {:.0} ops/s",
        mix.threads,
        mix.ops_per_thread,
        mix.update_percent,
        keys.label(),
        total / elapsed
    );
    Ok(total / elapsed)
}
