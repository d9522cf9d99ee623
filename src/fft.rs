//! Radix-2 evaluation domain over the BN254 scalar field.
//!
//! A [`Domain`] precomputes per-stage twiddle tables for the forward and
//! inverse transforms, one level per power of two up to the domain size, plus
//! one extra level of (2·n)-th roots used to shift a coefficient vector onto
//! the coset `ω₂ₙ·H` before re-evaluating it. Butterfly loops are split over
//! the worker pool once a stage is wide enough to pay for the fan-out.
use crate::{bn254::Scalar, errors::ProverError};
use ff::{Field, PrimeField};
use rayon::prelude::*;

/// Butterfly and scaling loops below this width run on the calling thread.
const PAR_FFT_MIN: usize = 1 << 10;

/// A power-of-two evaluation domain with precomputed root-of-unity tables.
///
/// `roots[p][i]` holds `ω_{2^p}^i`; level `log_n + 1` holds the coset shift
/// factors. The inverse tables stop at level `log_n` since the inverse
/// transform never touches the coset level.
#[derive(Clone, Debug)]
pub struct Domain {
  n: usize,
  log_n: u32,
  roots: Vec<Vec<Scalar>>,
  inv_roots: Vec<Vec<Scalar>>,
  n_inv: Scalar,
}

fn powers(base: &Scalar, len: usize) -> Vec<Scalar> {
  let mut out = Vec::with_capacity(len);
  let mut acc = Scalar::ONE;
  for _ in 0..len {
    out.push(acc);
    acc *= base;
  }
  out
}

fn bit_reverse(values: &mut [Scalar]) {
  let n = values.len();
  let mut j = 0usize;
  for i in 1..n {
    let mut bit = n >> 1;
    while j & bit != 0 {
      j ^= bit;
      bit >>= 1;
    }
    j ^= bit;
    if i < j {
      values.swap(i, j);
    }
  }
}

impl Domain {
  /// Builds the twiddle tables for a domain of `domain_size` points.
  ///
  /// # Errors
  /// Returns `ProverError::InvalidKey` if `domain_size` is not a nonzero
  /// power of two, or if the scalar field has no primitive root of order
  /// `2 · domain_size` (the coset shift needs one).
  pub fn new(domain_size: u32) -> Result<Self, ProverError> {
    if domain_size == 0 || !domain_size.is_power_of_two() {
      return Err(ProverError::InvalidKey {
        reason: format!("domain size {domain_size} is not a power of two"),
      });
    }
    let log_n = domain_size.trailing_zeros();
    if log_n + 1 > Scalar::S {
      return Err(ProverError::InvalidKey {
        reason: format!(
          "domain size {domain_size} exceeds the two-adicity of the scalar field"
        ),
      });
    }

    // ROOT_OF_UNITY generates the full 2^S subgroup; squaring it down gives
    // the primitive root of each level's order.
    let mut coset_root = Scalar::ROOT_OF_UNITY;
    for _ in 0..(Scalar::S - (log_n + 1)) {
      coset_root = coset_root.square();
    }

    let mut roots = Vec::with_capacity(log_n as usize + 2);
    let mut inv_roots = Vec::with_capacity(log_n as usize + 1);
    for level in 0..=log_n + 1 {
      let root = (0..(log_n + 1 - level)).fold(coset_root, |r, _| r.square());
      let len = if level == 0 { 1 } else { 1usize << (level - 1) };
      roots.push(powers(&root, len));
      if level <= log_n {
        let order = 1u64 << level;
        let inv_root = root.pow_vartime([order - 1]);
        inv_roots.push(powers(&inv_root, len));
      }
    }

    let n_inv = Option::from(Scalar::from(u64::from(domain_size)).invert()).ok_or_else(|| {
      ProverError::InvalidKey {
        reason: format!("domain size {domain_size} is not invertible in the scalar field"),
      }
    })?;

    Ok(Self {
      n: domain_size as usize,
      log_n,
      roots,
      inv_roots,
      n_inv,
    })
  }

  /// Number of points in the domain.
  pub fn size(&self) -> usize {
    self.n
  }

  /// In-place forward FFT: coefficients to evaluations over the domain.
  pub fn fft(&self, values: &mut [Scalar]) {
    self.transform(values, &self.roots);
  }

  /// In-place inverse FFT: evaluations over the domain to coefficients.
  pub fn ifft(&self, values: &mut [Scalar]) {
    self.transform(values, &self.inv_roots);
    let n_inv = self.n_inv;
    if values.len() < PAR_FFT_MIN {
      for v in values.iter_mut() {
        *v *= n_inv;
      }
    } else {
      values.par_iter_mut().for_each(|v| *v *= n_inv);
    }
  }

  /// Multiplies element `i` by the `i`-th (2·n)-th root of unity, moving a
  /// coefficient vector onto the coset `ω₂ₙ·H` ahead of a forward FFT.
  pub fn coset_shift(&self, values: &mut [Scalar]) {
    assert_eq!(values.len(), self.n, "coset shift length must match the domain size");
    let shift = &self.roots[self.log_n as usize + 1];
    if values.len() < PAR_FFT_MIN {
      for (v, w) in values.iter_mut().zip(shift.iter()) {
        *v *= w;
      }
    } else {
      values
        .par_iter_mut()
        .zip(shift.par_iter())
        .for_each(|(v, w)| *v *= w);
    }
  }

  fn transform(&self, values: &mut [Scalar], twiddles: &[Vec<Scalar>]) {
    assert_eq!(values.len(), self.n, "transform length must match the domain size");
    bit_reverse(values);
    for stage in 1..=self.log_n {
      let half = 1usize << (stage - 1);
      let level = &twiddles[stage as usize][..half];
      values.par_chunks_mut(half * 2).for_each(|block| {
        let (lo, hi) = block.split_at_mut(half);
        if half < PAR_FFT_MIN {
          for i in 0..half {
            let t = hi[i] * level[i];
            hi[i] = lo[i] - t;
            lo[i] += t;
          }
        } else {
          lo.par_iter_mut()
            .zip(hi.par_iter_mut())
            .zip(level.par_iter())
            .for_each(|((u, v), w)| {
              let t = *v * w;
              *v = *u - t;
              *u += t;
            });
        }
      });
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::{rngs::StdRng, SeedableRng};

  fn horner(coeffs: &[Scalar], x: &Scalar) -> Scalar {
    coeffs
      .iter()
      .rev()
      .fold(Scalar::ZERO, |acc, c| acc * x + c)
  }

  fn random_vec(n: usize, seed: u64) -> Vec<Scalar> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| Scalar::random(&mut rng)).collect()
  }

  #[test]
  fn fft_matches_naive_evaluation() {
    let domain = Domain::new(8).unwrap();
    let coeffs = random_vec(8, 23);

    let mut evals = coeffs.clone();
    domain.fft(&mut evals);

    // evals[i] must equal p(ω^i) for ω the primitive 8th root of unity
    let omega = domain.roots[3][1];
    let mut point = Scalar::ONE;
    for eval in &evals {
      assert_eq!(*eval, horner(&coeffs, &point));
      point *= omega;
    }
  }

  #[test]
  fn ifft_inverts_fft() {
    for log_n in [1u32, 2, 5] {
      let n = 1usize << log_n;
      let domain = Domain::new(n as u32).unwrap();
      let original = random_vec(n, 29 + u64::from(log_n));
      let mut values = original.clone();
      domain.fft(&mut values);
      domain.ifft(&mut values);
      assert_eq!(values, original);
    }
  }

  #[test]
  fn coset_chain_evaluates_on_the_coset() {
    let domain = Domain::new(4).unwrap();
    let coeffs = random_vec(4, 31);

    let mut values = coeffs.clone();
    domain.coset_shift(&mut values);
    domain.fft(&mut values);

    // shifting by ω₈^k then evaluating over H yields p(ω₈ · ω₄^i)
    let g = domain.roots[3][1];
    let omega = domain.roots[2][1];
    let mut point = g;
    for value in &values {
      assert_eq!(*value, horner(&coeffs, &point));
      point *= omega;
    }
  }

  #[test]
  fn coset_level_has_order_twice_the_domain() {
    let domain = Domain::new(16).unwrap();
    let g = domain.roots[5][1];
    assert_ne!(g.pow_vartime([16u64]), Scalar::ONE);
    assert_eq!(g.pow_vartime([32u64]), Scalar::ONE);
  }

  #[test]
  fn rejects_non_power_of_two_sizes() {
    for bad in [0u32, 3, 12, 1000] {
      assert!(matches!(
        Domain::new(bad),
        Err(ProverError::InvalidKey { .. })
      ));
    }
  }

  #[test]
  fn rejects_sizes_beyond_two_adicity() {
    assert!(matches!(
      Domain::new(1 << 28),
      Err(ProverError::InvalidKey { .. })
    ));
  }
}
