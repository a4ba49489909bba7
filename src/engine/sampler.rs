//! Top-k / top-p token sampling.
//!
//! The sampler selects one token per batch row from raw model logits:
//!
//! ```text
//! Logits [batch, vocab]
//!     │
//!     ▼ Top-k restriction (stable descending-logit order)
//! k candidates per row
//!     │
//!     ▼ Temperature scaling + softmax (0 = argmax short-circuit)
//! Probabilities
//!     │
//!     ▼ Nucleus truncation (smallest prefix with mass >= p)
//! Renormalize + seeded draw
//!     │
//!     ▼
//! Token id (+ ln probability score)
//! ```

use std::cmp::Ordering;

use candle_core::Tensor;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::SamplerConfig;
use crate::error::{Error, Result};

/// Token sampler with top-k, nucleus, and temperature controls.
///
/// Owns its random generator (seeded at creation) and a reusable scratch
/// buffer, so a `TopPSampler` is not safe for concurrent use; distinct
/// conversations should use distinct instances.
#[derive(Debug, Clone)]
pub struct TopPSampler {
    k: usize,
    p: f32,
    temperature: f32,
    batch_size: usize,
    rng: StdRng,
    /// Per-row (token id, logit/probability) candidates, reused across calls.
    scratch: Vec<(u32, f32)>,
}

impl TopPSampler {
    /// Create a sampler, validating every parameter bound.
    pub fn new(config: SamplerConfig) -> Result<Self> {
        if config.k == 0 {
            return Err(Error::InvalidArgument("k must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&config.p) {
            return Err(Error::InvalidArgument(format!(
                "p must be in [0, 1], but got {}",
                config.p
            )));
        }
        if config.batch_size == 0 {
            return Err(Error::InvalidArgument(
                "batch_size must be positive".to_string(),
            ));
        }
        if config.temperature < 0.0 || config.temperature.is_nan() {
            return Err(Error::InvalidArgument(format!(
                "temperature must be >= 0, but got {}",
                config.temperature
            )));
        }
        Ok(Self {
            k: config.k,
            p: config.p,
            temperature: config.temperature,
            batch_size: config.batch_size,
            rng: StdRng::seed_from_u64(config.seed),
            scratch: Vec::new(),
        })
    }

    /// Configured batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Sample one token id per batch row into `ids_out`.
    ///
    /// `logits` must have at most two significant dimensions with the first
    /// dimension equal to the configured batch size. If `scores_out` is
    /// supplied it receives the natural log of each chosen candidate's final
    /// (truncated, renormalized) probability.
    pub fn sample_to_id_and_score(
        &mut self,
        logits: &Tensor,
        ids_out: &mut [u32],
        mut scores_out: Option<&mut [f32]>,
    ) -> Result<()> {
        let dims = logits.dims();
        let significant = dims.iter().filter(|&&d| d > 1).count();
        if significant > 2 {
            return Err(Error::InvalidArgument(format!(
                "input logits must have at most 2 significant dimensions, but got {significant}"
            )));
        }
        let batch_dim = dims.first().copied().unwrap_or(0);
        if batch_dim != self.batch_size {
            return Err(Error::InvalidArgument(format!(
                "input logits batch dimension must equal the sampler batch size, \
                 but got {batch_dim} vs {}",
                self.batch_size
            )));
        }
        if ids_out.len() != self.batch_size {
            return Err(Error::InvalidArgument(format!(
                "output ids buffer must hold one id per batch row, but got {} vs {}",
                ids_out.len(),
                self.batch_size
            )));
        }
        if let Some(scores) = scores_out.as_deref() {
            if scores.len() != self.batch_size {
                return Err(Error::InvalidArgument(format!(
                    "output scores buffer must hold one score per batch row, but got {} vs {}",
                    scores.len(),
                    self.batch_size
                )));
            }
        }

        let data = logits.flatten_all()?.to_vec1::<f32>()?;
        let vocab_size = data.len() / self.batch_size;
        for row in 0..self.batch_size {
            let row_logits = &data[row * vocab_size..(row + 1) * vocab_size];
            let (id, score) = self.sample_row(row_logits)?;
            ids_out[row] = id;
            if let Some(scores) = scores_out.as_deref_mut() {
                scores[row] = score;
            }
        }
        Ok(())
    }

    /// Sample one row, returning the chosen id and the ln of its final
    /// probability.
    fn sample_row(&mut self, logits: &[f32]) -> Result<(u32, f32)> {
        let k = self.k.min(logits.len());

        // Stable sort keeps original order for equal logits.
        self.scratch.clear();
        self.scratch
            .extend(logits.iter().enumerate().map(|(i, &v)| (i as u32, v)));
        self.scratch
            .sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        self.scratch.truncate(k);

        // Degenerate distributions skip the probabilistic path entirely, so
        // the generator state is untouched and the chosen probability is 1.
        if self.temperature == 0.0 || k == 1 {
            return Ok((self.scratch[0].0, 0.0));
        }

        // Temperature scaling + max-subtracted softmax over the candidates.
        let inv_temperature = 1.0 / self.temperature;
        let max_scaled = self.scratch[0].1 * inv_temperature;
        let mut sum = 0.0f32;
        for candidate in self.scratch.iter_mut() {
            candidate.1 = (candidate.1 * inv_temperature - max_scaled).exp();
            sum += candidate.1;
        }
        for candidate in self.scratch.iter_mut() {
            candidate.1 /= sum;
        }

        // Nucleus truncation: smallest descending-probability prefix with
        // cumulative mass >= p.
        let mut cumulative = 0.0f32;
        let mut cutoff = self.scratch.len();
        for (i, candidate) in self.scratch.iter().enumerate() {
            cumulative += candidate.1;
            if cumulative >= self.p {
                cutoff = i + 1;
                break;
            }
        }
        self.scratch.truncate(cutoff);

        if self.scratch.len() == 1 {
            return Ok((self.scratch[0].0, 0.0));
        }

        let total: f32 = self.scratch.iter().map(|c| c.1).sum();
        let distribution = WeightedIndex::new(self.scratch.iter().map(|c| c.1 as f64))
            .map_err(|e| Error::Internal(format!("failed to build sampling distribution: {e}")))?;
        let chosen = distribution.sample(&mut self.rng);
        let probability = self.scratch[chosen].1 / total;
        Ok((self.scratch[chosen].0, probability.ln()))
    }
}
