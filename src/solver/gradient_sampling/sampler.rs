//! Fixed and adaptive samplers over a Euclidean ball (§4.14). Grounded on
//! `original_source/src/solver/gsample/sampler.h`'s fixed/adaptive split.

use std::collections::VecDeque;

use faer::Col;
use rand::Rng;
use rand::rngs::StdRng;

fn sample_in_ball(center: &Col<f64>, radius: f64, rng: &mut StdRng) -> Col<f64> {
    let n = center.nrows();
    loop {
        let mut d = Col::<f64>::zeros(n);
        for i in 0..n {
            d[i] = rng.gen_range(-1.0..1.0) * radius;
        }
        let norm: f64 = (0..n).map(|i| d[i] * d[i]).sum::<f64>().sqrt();
        if norm <= radius {
            let mut x = Col::<f64>::zeros(n);
            for i in 0..n {
                x[i] = center[i] + d[i];
            }
            return x;
        }
    }
}

pub trait Sampler {
    /// Returns the sample points for this outer iteration, not including
    /// the center itself (the caller always evaluates the center).
    fn sample(&mut self, center: &Col<f64>, radius: f64, rng: &mut StdRng) -> Vec<Col<f64>>;
}

/// `p = 2n + 1` fresh points every iteration.
#[derive(Debug, Clone, Default)]
pub struct FixedSampler;

impl Sampler for FixedSampler {
    fn sample(&mut self, center: &Col<f64>, radius: f64, rng: &mut StdRng) -> Vec<Col<f64>> {
        let n = center.nrows();
        let p = 2 * n;
        (0..p).map(|_| sample_in_ball(center, radius, rng)).collect()
    }
}

/// Retains points still inside the current ball, evicts the oldest excess
/// ones, then tops up with `phat = max(n/10, 1)` fresh points, targeting a
/// total of `2n` non-center samples (the eviction order among equally-stale
/// points is implementation-defined per the source algorithm).
#[derive(Debug, Clone, Default)]
pub struct AdaptiveSampler {
    points: VecDeque<Col<f64>>,
}

impl Sampler for AdaptiveSampler {
    fn sample(&mut self, center: &Col<f64>, radius: f64, rng: &mut StdRng) -> Vec<Col<f64>> {
        let n = center.nrows();
        let target = 2 * n;
        let phat = ((n as f64 / 10.0).max(1.0)) as usize;

        self.points.retain(|p| {
            let mut dist2 = 0.0;
            for i in 0..n {
                let d = p[i] - center[i];
                dist2 += d * d;
            }
            dist2.sqrt() <= radius
        });

        let keep = target.saturating_sub(phat + 1);
        while self.points.len() > keep {
            self.points.pop_front();
        }

        for _ in 0..phat {
            self.points.push_back(sample_in_ball(center, radius, rng));
        }

        self.points.iter().cloned().collect()
    }
}
