//! Loss sampling
//!
//! [`sample_loss`] draws one simulated period from a scenario set by
//! inverse-transform sampling. [`SampleStream`] feeds it from a chunked random
//! stream: iteration `i` always draws from the generator of chunk
//! `i / STREAM_CHUNK_LEN`, so the sample sequence for a seed is the same no
//! matter how iterations are batched or spread over threads.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::model::RiskScenario;

/// Iterations drawn from one generator before reseeding for the next chunk
pub const STREAM_CHUNK_LEN: u64 = 4096;

const CHUNK_SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Total loss for one simulated period.
///
/// Each scenario draws `u` independently; on `u < annual_probability` it
/// occurs and a second draw is mapped through its triangular inverse CDF.
#[inline]
pub fn sample_loss<R: Rng + ?Sized>(scenarios: &[RiskScenario], rng: &mut R) -> f64 {
    let mut total = 0.0;
    for scenario in scenarios {
        let u: f64 = rng.random();
        if u < scenario.annual_probability {
            let r: f64 = rng.random();
            total += scenario.impact.inverse_cdf(r);
        }
    }
    total
}

/// Pick a seed for a run that did not specify one
pub fn draw_seed() -> u64 {
    rand::random()
}

fn chunk_rng(seed: u64, chunk: u64) -> SmallRng {
    SmallRng::seed_from_u64(seed ^ chunk.wrapping_mul(CHUNK_SEED_MIX))
}

/// Deterministic per-iteration loss stream for one seed
#[derive(Debug, Clone)]
pub struct SampleStream {
    seed: u64,
    position: u64,
    next_reseed: u64,
    rng: SmallRng,
}

impl SampleStream {
    pub fn new(seed: u64) -> Self {
        Self::at_chunk(seed, 0)
    }

    /// Stream positioned at the first iteration of `chunk`
    pub fn at_chunk(seed: u64, chunk: u64) -> Self {
        let position = chunk * STREAM_CHUNK_LEN;
        Self {
            seed,
            position,
            next_reseed: position + STREAM_CHUNK_LEN,
            rng: chunk_rng(seed, chunk),
        }
    }

    /// Index of the next iteration this stream will produce
    pub fn position(&self) -> u64 {
        self.position
    }

    #[inline]
    pub fn next_loss(&mut self, scenarios: &[RiskScenario]) -> f64 {
        if self.position == self.next_reseed {
            self.rng = chunk_rng(self.seed, self.position / STREAM_CHUNK_LEN);
            self.next_reseed += STREAM_CHUNK_LEN;
        }
        self.position += 1;
        sample_loss(scenarios, &mut self.rng)
    }
}

/// Losses for iterations `[chunk * STREAM_CHUNK_LEN, +len)`
pub fn sample_chunk(scenarios: &[RiskScenario], seed: u64, chunk: u64, len: usize) -> Vec<f64> {
    let mut stream = SampleStream::at_chunk(seed, chunk);
    (0..len).map(|_| stream.next_loss(scenarios)).collect()
}
