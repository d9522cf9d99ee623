//! This module provides parallel multi-scalar multiplication.
//! The bucket-method core is generic over the affine group so the same routine
//! serves the G1 multiexponentiations (`pi_a`, `pib1`, the `C` tail, the
//! quotient commitment) and the G2 one (`pi_b`). Scalars equal to zero or one
//! are peeled off before bucketing, which pays off on witness vectors where
//! the constant wire and boolean signals are common.
use crate::{errors::ProverError, start_span};
use ff::{Field, PrimeField};
use halo2curves::{group::Group, CurveAffine};
use rayon::{current_num_threads, prelude::*};
use tracing::info;

/// Inputs below this length are not worth fanning out over the pool.
const PAR_MSM_MIN: usize = 1 << 10;

#[derive(Clone, Copy)]
enum Bucket<C: CurveAffine> {
  None,
  Affine(C),
  Projective(C::Curve),
}

impl<C: CurveAffine> Bucket<C> {
  fn add_assign(&mut self, other: &C) {
    *self = match *self {
      Bucket::None => Bucket::Affine(*other),
      Bucket::Affine(a) => Bucket::Projective(a + *other),
      Bucket::Projective(a) => Bucket::Projective(a + other),
    }
  }

  fn add(self, other: C::Curve) -> C::Curve {
    match self {
      Bucket::None => other,
      Bucket::Affine(a) => other + a,
      Bucket::Projective(a) => other + a,
    }
  }
}

/// Reads the `c`-bit window starting at bit `segment * c` out of a
/// little-endian scalar encoding.
fn window_at<F: PrimeField>(segment: usize, c: usize, bytes: &F::Repr) -> usize {
  let skip_bits = segment * c;
  let skip_bytes = skip_bits / 8;

  if skip_bytes >= bytes.as_ref().len() {
    return 0;
  }

  let mut v = [0u8; 8];
  for (v, o) in v.iter_mut().zip(bytes.as_ref()[skip_bytes..].iter()) {
    *v = *o;
  }

  let mut window = u64::from_le_bytes(v);
  window >>= skip_bits - (skip_bytes * 8);
  window %= 1 << c;

  window as usize
}

fn msm_serial<C: CurveAffine>(scalars: &[C::Scalar], bases: &[C]) -> C::Curve {
  let c = if bases.len() < 4 {
    1
  } else if bases.len() < 32 {
    3
  } else {
    (f64::from(bases.len() as u32)).ln().ceil() as usize
  };

  // Scalars equal to one are summed directly; zeros contribute nothing.
  let mut boolean_sum = C::Curve::identity();
  let mut non_boolean = Vec::new();

  for (s, b) in scalars.iter().zip(bases) {
    if *s == C::Scalar::ONE {
      boolean_sum += b;
    } else if *s != C::Scalar::ZERO {
      non_boolean.push((*s, *b));
    }
  }

  if non_boolean.is_empty() {
    return boolean_sum;
  }

  let non_boolean_sum = {
    let segments = (256 / c) + 1;
    (0..segments)
      .rev()
      .fold(C::Curve::identity(), |mut acc, segment| {
        (0..c).for_each(|_| acc = acc.double());

        let mut buckets = vec![Bucket::None; (1 << c) - 1];

        for (scalar, base) in non_boolean.iter() {
          let window = window_at::<C::Scalar>(segment, c, &scalar.to_repr());
          if window != 0 {
            buckets[window - 1].add_assign(base);
          }
        }

        // Summation by parts:
        // 3a + 2b + 1c = a + (a + b) + ((a + b) + c)
        let mut running_sum = C::Curve::identity();
        for bucket in buckets.into_iter().rev() {
          running_sum = bucket.add(running_sum);
          acc += &running_sum;
        }
        acc
      })
  };

  boolean_sum + non_boolean_sum
}

/// Computes `∑ scalars[i] · bases[i]` with the bucket method, splitting the
/// input across the worker pool when it is long enough to amortise the
/// per-chunk bucket reductions.
///
/// # Errors
/// Returns `ProverError::InvalidInputLength` if the slices differ in length.
pub fn msm<C: CurveAffine>(scalars: &[C::Scalar], bases: &[C]) -> Result<C::Curve, ProverError> {
  let (_msm_span, msm_t) = start_span!("msm", size = scalars.len());

  if scalars.len() != bases.len() {
    return Err(ProverError::InvalidInputLength);
  }

  let result = if scalars.len() < PAR_MSM_MIN {
    msm_serial(scalars, bases)
  } else {
    let chunk = scalars.len().div_ceil(current_num_threads()).max(1);
    scalars
      .par_chunks(chunk)
      .zip(bases.par_chunks(chunk))
      .map(|(scalars, bases)| msm_serial(scalars, bases))
      .reduce(C::Curve::identity, |sum, part| sum + part)
  };

  info!(elapsed_ms = %msm_t.elapsed().as_millis(), size = scalars.len(), "msm");
  Ok(result)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bn254::{g1, g2};
  use ff::Field;
  use halo2curves::group::Group;
  use rand::{rngs::StdRng, SeedableRng};

  fn msm_matches_naive_with<A: CurveAffine>(seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = 64;
    let scalars = (0..n)
      .map(|_| A::Scalar::random(&mut rng))
      .collect::<Vec<_>>();
    let bases = (0..n)
      .map(|_| A::from(A::generator() * A::Scalar::random(&mut rng)))
      .collect::<Vec<_>>();

    let naive = scalars
      .iter()
      .zip(bases.iter())
      .fold(A::Curve::identity(), |acc, (scalar, base)| {
        acc + *base * scalar
      });

    assert_eq!(naive, msm(&scalars, &bases).unwrap());
  }

  #[test]
  fn msm_matches_naive() {
    msm_matches_naive_with::<g1::Affine>(17);
    msm_matches_naive_with::<g2::Affine>(18);
  }

  #[test]
  fn msm_peels_boolean_scalars() {
    let mut rng = StdRng::seed_from_u64(19);
    let n = 32;
    let scalars = (0..n)
      .map(|i| match i % 3 {
        0 => g1::Scalar::ZERO,
        1 => g1::Scalar::ONE,
        _ => g1::Scalar::random(&mut rng),
      })
      .collect::<Vec<_>>();
    let bases = (0..n)
      .map(|_| g1::Affine::from(g1::Affine::generator() * g1::Scalar::random(&mut rng)))
      .collect::<Vec<_>>();

    let naive = scalars
      .iter()
      .zip(bases.iter())
      .fold(g1::Point::identity(), |acc, (scalar, base)| {
        acc + *base * scalar
      });

    assert_eq!(naive, msm(&scalars, &bases).unwrap());
  }

  #[test]
  fn msm_of_empty_input_is_identity() {
    let scalars: Vec<g1::Scalar> = vec![];
    let bases: Vec<g1::Affine> = vec![];
    assert_eq!(g1::Point::identity(), msm(&scalars, &bases).unwrap());
  }

  #[test]
  fn msm_rejects_length_mismatch() {
    let scalars = vec![g1::Scalar::ONE];
    let bases: Vec<g1::Affine> = vec![];
    assert_eq!(
      msm(&scalars, &bases),
      Err(ProverError::InvalidInputLength)
    );
  }
}
