//! The Groth16 proving pipeline.
//!
//! [`Prover::prove`] runs in six phases: the four witness MSMs; the
//! accumulation of witness-weighted A/B coefficients into evaluation-domain
//! vectors; the three coset-FFT chains; the pointwise quotient evaluations
//! and their MSM against the H table; blinding-scalar sampling; and the final
//! group algebra folding everything into `(A, B, C)`. The witness MSMs and
//! the quotient pipeline are independent until assembly and run overlapped on
//! the worker pool.
use crate::{
  bn254::{g1, g2, Scalar},
  errors::ProverError,
  fft::Domain,
  key::{CoeffMatrix, ProvingKey},
  msm::msm,
  proof::Proof,
  start_span,
};
use ff::{Field, PrimeField};
use halo2curves::group::Curve;
use rand_core::{CryptoRng, OsRng, RngCore};
use rayon::{current_num_threads, prelude::*};
use tracing::info;

/// The BN254 scalar-field modulus `q` as four little-endian limbs.
const FR_MODULUS: [u64; 4] = [
  0x43E1_F593_F000_0001,
  0x2833_E848_79B9_7091,
  0xB850_45B6_8181_585D,
  0x3064_4E72_E131_A029,
];

/// Truncates a candidate to 254 bits, the width of `q`, so that rejection
/// against the modulus is rare.
const TOP_LIMB_MASK: u64 = 0x3FFF_FFFF_FFFF_FFFF;

/// Little-endian limb comparison against `q`, most significant limb first.
fn below_modulus(limbs: &[u64; 4]) -> bool {
  for (limb, modulus) in limbs.iter().zip(FR_MODULUS.iter()).rev() {
    if limb != modulus {
      return limb < modulus;
    }
  }
  false
}

/// Samples a blinding scalar uniformly from the scalar field by rejection:
/// draw 32 bytes, mask the top two bits, accept when the little-endian
/// integer lies strictly below the modulus.
///
/// # Errors
/// Returns `ProverError::RngFailure` if the byte source fails; the error is
/// propagated unchanged.
pub fn sample_blinding_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Scalar, ProverError> {
  loop {
    let mut bytes = [0u8; 32];
    rng
      .try_fill_bytes(&mut bytes)
      .map_err(|e| ProverError::RngFailure {
        reason: e.to_string(),
      })?;

    let mut limbs = [0u64; 4];
    for (limb, chunk) in limbs.iter_mut().zip(bytes.chunks_exact(8)) {
      let mut le = [0u8; 8];
      le.copy_from_slice(chunk);
      *limb = u64::from_le_bytes(le);
    }
    limbs[3] &= TOP_LIMB_MASK;
    if !below_modulus(&limbs) {
      continue;
    }

    for (chunk, limb) in bytes.chunks_exact_mut(8).zip(limbs.iter()) {
      chunk.copy_from_slice(&limb.to_le_bytes());
    }
    if let Some(scalar) = Option::<Scalar>::from(Scalar::from_repr(bytes.into())) {
      return Ok(scalar);
    }
  }
}

/// A reusable Groth16 prover.
///
/// Holds the immutable proving key and the precomputed FFT twiddle tables.
/// `prove` allocates its evaluation vectors per call and keeps no state
/// between proofs, so one instance may serve many proofs concurrently.
#[derive(Clone, Debug)]
pub struct Prover {
  key: ProvingKey,
  domain: Domain,
}

impl Prover {
  /// Builds a prover from a validated proving key, precomputing the domain's
  /// twiddle tables.
  ///
  /// # Errors
  /// Returns `ProverError::InvalidKey` if the key's domain size cannot be
  /// realised in the scalar field.
  pub fn new(key: ProvingKey) -> Result<Self, ProverError> {
    let domain = Domain::new(key.domain_size())?;
    Ok(Self { key, domain })
  }

  /// The proving key backing this prover.
  pub fn key(&self) -> &ProvingKey {
    &self.key
  }

  /// Produces a proof for `wtns`, drawing blinding randomness from the
  /// operating system.
  ///
  /// # Errors
  /// Returns `ProverError::InvalidWitnessLength` if `wtns` does not hold
  /// exactly `n_vars` signals.
  pub fn prove(&self, wtns: &[Scalar]) -> Result<Proof, ProverError> {
    self.prove_with_rng(wtns, &mut OsRng)
  }

  /// Produces a proof with an injected randomness source. Two calls over the
  /// same witness with byte-identical randomness produce bit-identical
  /// proofs.
  ///
  /// # Errors
  /// Returns `ProverError::InvalidWitnessLength` on a witness-length
  /// mismatch, or `ProverError::RngFailure` if the source fails.
  pub fn prove_with_rng<R: RngCore + CryptoRng>(
    &self,
    wtns: &[Scalar],
    rng: &mut R,
  ) -> Result<Proof, ProverError> {
    let (_prove_span, prove_t) = start_span!("groth16_prove", n_vars = self.key.n_vars);
    if wtns.len() != self.key.n_vars as usize {
      return Err(ProverError::InvalidWitnessLength);
    }

    // The witness multiexps and the quotient pipeline are independent until
    // assembly; overlapping them keeps the pool busy through the tail of
    // each bucket reduction.
    let (witness_msms, pih) = rayon::join(
      || self.witness_msms(wtns),
      || self.quotient_commitment(wtns),
    );
    let (pi_a, pib1, pi_b, pi_c) = witness_msms?;
    let pih = pih?;

    let r = sample_blinding_scalar(rng)?;
    let s = sample_blinding_scalar(rng)?;

    let proof = self.assemble(pi_a, pib1, pi_b, pi_c, pih, r, s);
    info!(elapsed_ms = %prove_t.elapsed().as_millis(), "groth16_prove");
    Ok(proof)
  }

  /// Phase 1: the four independent witness MSMs. The `C` multiexp skips the
  /// public prefix, which the verifier commits on its own.
  fn witness_msms(
    &self,
    wtns: &[Scalar],
  ) -> Result<(g1::Point, g1::Point, g2::Point, g1::Point), ProverError> {
    let (_span, msms_t) = start_span!("witness_msms");
    let tail = &wtns[self.key.n_public as usize + 1..];
    let ((pi_a, pib1), (pi_b, pi_c)) = rayon::join(
      || {
        rayon::join(
          || msm(wtns, &self.key.points_a),
          || msm(wtns, &self.key.points_b1),
        )
      },
      || {
        rayon::join(
          || msm(wtns, &self.key.points_b2),
          || msm(tail, &self.key.points_c),
        )
      },
    );
    let out = (pi_a?, pib1?, pi_b?, pi_c?);
    info!(elapsed_ms = %msms_t.elapsed().as_millis(), "witness_msms");
    Ok(out)
  }

  /// Phases 2–4: accumulate the witness-weighted A/B coefficients, evaluate
  /// a, b, and the pointwise product c over the coset, reduce to the quotient
  /// evaluations, and commit them against the H table.
  fn quotient_commitment(&self, wtns: &[Scalar]) -> Result<g1::Point, ProverError> {
    let n = self.domain.size();

    let (_acc_span, acc_t) = start_span!("accumulate_coefficients", coeffs = self.key.coeffs.len());
    // Per-worker accumulation with a tree reduction; field addition is
    // associative and commutative, so the result matches the serial scatter
    // bit for bit regardless of record order.
    let chunk = (self.key.coeffs.len() / current_num_threads()).max(1);
    let (mut a, mut b) = self
      .key
      .coeffs
      .par_chunks(chunk)
      .map(|records| {
        let mut a = vec![Scalar::ZERO; n];
        let mut b = vec![Scalar::ZERO; n];
        for record in records {
          let aux = wtns[record.signal as usize] * record.value;
          let target = match record.matrix {
            CoeffMatrix::A => &mut a,
            CoeffMatrix::B => &mut b,
          };
          target[record.constraint as usize] += aux;
        }
        (a, b)
      })
      .reduce_with(|(mut a_acc, mut b_acc), (a, b)| {
        a_acc
          .par_iter_mut()
          .zip(a.par_iter())
          .for_each(|(x, y)| *x += y);
        b_acc
          .par_iter_mut()
          .zip(b.par_iter())
          .for_each(|(x, y)| *x += y);
        (a_acc, b_acc)
      })
      .unwrap_or_else(|| (vec![Scalar::ZERO; n], vec![Scalar::ZERO; n]));
    info!(elapsed_ms = %acc_t.elapsed().as_millis(), "accumulate_coefficients");

    let (_c_span, c_t) = start_span!("pointwise_product");
    let mut c: Vec<Scalar> = a
      .par_iter()
      .zip(b.par_iter())
      .map(|(x, y)| x * y)
      .collect();
    info!(elapsed_ms = %c_t.elapsed().as_millis(), "pointwise_product");

    // The three chains commute; run them as concurrent tasks and join before
    // the quotient reduction.
    let (_coset_span, coset_t) = start_span!("coset_evaluations");
    rayon::join(
      || self.coset_evaluate(&mut a),
      || {
        rayon::join(
          || self.coset_evaluate(&mut b),
          || self.coset_evaluate(&mut c),
        )
      },
    );
    info!(elapsed_ms = %coset_t.elapsed().as_millis(), "coset_evaluations");

    // On the coset the vanishing polynomial is a nonzero constant absorbed
    // into the H table, so a·b − c there is the quotient up to that factor.
    let (_h_span, h_t) = start_span!("quotient_evaluations");
    a.par_iter_mut()
      .zip(b.par_iter())
      .zip(c.par_iter())
      .for_each(|((x, y), z)| *x = *x * y - z);
    info!(elapsed_ms = %h_t.elapsed().as_millis(), "quotient_evaluations");

    msm(&a, &self.key.points_h)
  }

  /// One coset chain: interpolate to coefficients, shift onto `ω₂ₙ·H`,
  /// evaluate back over the domain.
  fn coset_evaluate(&self, values: &mut [Scalar]) {
    self.domain.ifft(values);
    self.domain.coset_shift(values);
    self.domain.fft(values);
  }

  /// Phase 6: fold the blinding scalars and the verifying-key commitments
  /// into the final group elements, normalised to affine.
  fn assemble(
    &self,
    pi_a: g1::Point,
    pib1: g1::Point,
    pi_b: g2::Point,
    pi_c: g1::Point,
    pih: g1::Point,
    r: Scalar,
    s: Scalar,
  ) -> Proof {
    let key = &self.key;

    let pi_a = pi_a + key.vk_alpha1 + key.vk_delta1 * r;
    let pi_b = pi_b + key.vk_beta2 + key.vk_delta2 * s;
    let pib1 = pib1 + key.vk_beta1 + key.vk_delta1 * s;

    let rs = r * s;
    let pi_c = pi_c + pih + pi_a * s + pib1 * r - key.vk_delta1 * rs;

    Proof {
      a: pi_a.to_affine(),
      b: pi_b.to_affine(),
      c: pi_c.to_affine(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ff::Field;

  /// Hands out a fixed sequence of 32-byte blocks; the CryptoRng marker is a
  /// promise the production sources keep, not this one.
  struct FixedBytesRng {
    blocks: Vec<[u8; 32]>,
    next: usize,
  }

  impl FixedBytesRng {
    fn new(blocks: Vec<[u8; 32]>) -> Self {
      Self { blocks, next: 0 }
    }
  }

  impl RngCore for FixedBytesRng {
    fn next_u32(&mut self) -> u32 {
      unimplemented!("the sampler only draws whole 32-byte blocks")
    }

    fn next_u64(&mut self) -> u64 {
      unimplemented!("the sampler only draws whole 32-byte blocks")
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
      dest.copy_from_slice(&self.blocks[self.next][..dest.len()]);
      self.next += 1;
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
      self.fill_bytes(dest);
      Ok(())
    }
  }

  impl CryptoRng for FixedBytesRng {}

  fn block_of(value: u64) -> [u8; 32] {
    let mut block = [0u8; 32];
    block[..8].copy_from_slice(&value.to_le_bytes());
    block
  }

  fn modulus_block() -> [u8; 32] {
    let mut block = [0u8; 32];
    for (chunk, limb) in block.chunks_exact_mut(8).zip(FR_MODULUS.iter()) {
      chunk.copy_from_slice(&limb.to_le_bytes());
    }
    block
  }

  #[test]
  fn sampler_accepts_small_candidates() {
    let mut rng = FixedBytesRng::new(vec![block_of(1)]);
    assert_eq!(sample_blinding_scalar(&mut rng).unwrap(), Scalar::ONE);
  }

  #[test]
  fn sampler_rejects_the_modulus_itself() {
    // q survives the 254-bit mask, so it must be rejected by the comparison
    let mut rng = FixedBytesRng::new(vec![modulus_block(), block_of(2)]);
    assert_eq!(
      sample_blinding_scalar(&mut rng).unwrap(),
      Scalar::from(2u64)
    );
    assert_eq!(rng.next, 2);
  }

  #[test]
  fn sampler_masks_the_top_two_bits() {
    // all-ones masks down to 2^254 − 1, which still exceeds q and is rejected
    let mut rng = FixedBytesRng::new(vec![[0xFF; 32], block_of(3)]);
    assert_eq!(
      sample_blinding_scalar(&mut rng).unwrap(),
      Scalar::from(3u64)
    );
    assert_eq!(rng.next, 2);
  }

  #[test]
  fn sampler_accepts_just_below_the_modulus() {
    let mut limbs = FR_MODULUS;
    limbs[0] -= 1;
    let mut block = [0u8; 32];
    for (chunk, limb) in block.chunks_exact_mut(8).zip(limbs.iter()) {
      chunk.copy_from_slice(&limb.to_le_bytes());
    }
    let mut rng = FixedBytesRng::new(vec![block]);
    let expected = -Scalar::ONE; // q − 1
    assert_eq!(sample_blinding_scalar(&mut rng).unwrap(), expected);
  }

  #[test]
  fn sampler_is_uniform_across_residue_buckets() {
    use rand::{rngs::StdRng, SeedableRng};
    let mut rng = StdRng::seed_from_u64(67);
    let samples = 4096;
    let mut buckets = [0u32; 16];
    for _ in 0..samples {
      let scalar = sample_blinding_scalar(&mut rng).unwrap();
      buckets[(scalar.to_repr()[0] & 0x0F) as usize] += 1;
    }

    // χ² against the uniform distribution, 15 degrees of freedom; 60 sits
    // far beyond the 0.999 quantile
    let expected = samples as f64 / 16.0;
    let chi2: f64 = buckets
      .iter()
      .map(|&count| {
        let d = count as f64 - expected;
        d * d / expected
      })
      .sum();
    assert!(chi2 < 60.0, "χ² = {chi2}");
  }
}
