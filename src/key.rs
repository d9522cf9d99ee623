//! Proving-key types: the verifying-key commitments, the R1CS coefficient
//! stream, and the five MSM base tables.
//!
//! All structural validation happens at construction; a [`ProvingKey`] that
//! constructs is safe to prove with and is shared immutably across proofs.
use crate::{
  bn254::{g1, g2, Scalar},
  errors::ProverError,
};
use ff::Field;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// On-disk size of one coefficient record: three little-endian `u32`s
/// followed by a 32-byte scalar.
pub const COEFF_RECORD_BYTES: usize = 44;

/// `R⁻¹ mod q` for `R = 2²⁵⁶`: multiplying an element whose value is the raw
/// Montgomery limbs by this constant recovers the represented value.
static MONT_R_INV: Lazy<Scalar> = Lazy::new(|| {
  let two_pow_128 = Scalar::from_raw([0, 0, 1, 0]);
  Option::from(two_pow_128.square().invert()).expect("R is invertible")
});

/// Selects which evaluation-domain polynomial a coefficient contributes to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CoeffMatrix {
  /// The A-polynomial (left inputs of the constraint system).
  A,
  /// The B-polynomial (right inputs of the constraint system).
  B,
}

/// One record of the R1CS coefficient stream, read as
/// `target[constraint] += wtns[signal] · value`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
  /// Which of the two accumulation targets receives this record.
  pub matrix: CoeffMatrix,
  /// Evaluation-domain index; must lie below the domain size.
  pub constraint: u32,
  /// Witness index; must lie below the total signal count.
  pub signal: u32,
  /// The R1CS coefficient.
  pub value: Scalar,
}

fn read_u32(bytes: &[u8]) -> u32 {
  let mut buf = [0u8; 4];
  buf.copy_from_slice(bytes);
  u32::from_le_bytes(buf)
}

fn scalar_from_montgomery_bytes(bytes: &[u8]) -> Scalar {
  let mut limbs = [0u64; 4];
  for (limb, chunk) in limbs.iter_mut().zip(bytes.chunks_exact(8)) {
    let mut le = [0u8; 8];
    le.copy_from_slice(chunk);
    *limb = u64::from_le_bytes(le);
  }
  Scalar::from_raw(limbs) * *MONT_R_INV
}

impl Coefficient {
  /// Decodes the legacy pre-parsed coefficient table.
  ///
  /// The buffer starts with a 4-byte record-count header, which is skipped
  /// (the caller supplies the count), followed by `n_coeffs` records of
  /// `m: u32 | c: u32 | s: u32 | coef: [u8; 32]`, all little-endian, with the
  /// scalar stored in Montgomery form. Range checks against the key
  /// dimensions happen later, in [`ProvingKey::new`].
  ///
  /// # Errors
  /// Returns `ProverError::InvalidKey` if the buffer is too short or a
  /// record's matrix selector is neither 0 nor 1.
  pub fn parse_legacy_table(buf: &[u8], n_coeffs: u64) -> Result<Vec<Coefficient>, ProverError> {
    let n = usize::try_from(n_coeffs).map_err(|_| ProverError::InvalidKey {
      reason: format!("coefficient count {n_coeffs} does not fit in memory"),
    })?;
    let body = n.checked_mul(COEFF_RECORD_BYTES).and_then(|b| b.checked_add(4));
    let expected = body.ok_or_else(|| ProverError::InvalidKey {
      reason: format!("coefficient count {n_coeffs} overflows the table size"),
    })?;
    if buf.len() < expected {
      return Err(ProverError::InvalidKey {
        reason: format!(
          "coefficient buffer holds {} bytes, need {expected} for {n_coeffs} records",
          buf.len()
        ),
      });
    }

    let mut out = Vec::with_capacity(n);
    for (i, record) in buf[4..expected].chunks_exact(COEFF_RECORD_BYTES).enumerate() {
      let matrix = match read_u32(&record[0..4]) {
        0 => CoeffMatrix::A,
        1 => CoeffMatrix::B,
        other => {
          return Err(ProverError::InvalidKey {
            reason: format!("coefficient {i} selects matrix {other}, expected 0 or 1"),
          })
        }
      };
      out.push(Coefficient {
        matrix,
        constraint: read_u32(&record[4..8]),
        signal: read_u32(&record[8..12]),
        value: scalar_from_montgomery_bytes(&record[12..44]),
      });
    }
    Ok(out)
  }
}

/// The compiled circuit's proving key.
///
/// `points_c` covers only the non-public witness tail (the public prefix is
/// committed by the verifier); `points_h` is sized to the FFT domain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProvingKey {
  pub(crate) n_vars: u32,
  pub(crate) n_public: u32,
  pub(crate) domain_size: u32,
  pub(crate) vk_alpha1: g1::Affine,
  pub(crate) vk_beta1: g1::Affine,
  pub(crate) vk_beta2: g2::Affine,
  pub(crate) vk_delta1: g1::Affine,
  pub(crate) vk_delta2: g2::Affine,
  pub(crate) coeffs: Vec<Coefficient>,
  pub(crate) points_a: Vec<g1::Affine>,
  pub(crate) points_b1: Vec<g1::Affine>,
  pub(crate) points_b2: Vec<g2::Affine>,
  pub(crate) points_c: Vec<g1::Affine>,
  pub(crate) points_h: Vec<g1::Affine>,
}

fn invalid(reason: String) -> ProverError {
  ProverError::InvalidKey { reason }
}

impl ProvingKey {
  /// Builds a proving key from its parts, checking every structural
  /// invariant: the witness layout, the base-table lengths, and the range of
  /// every coefficient record.
  ///
  /// # Errors
  /// Returns `ProverError::InvalidKey` naming the first violated invariant.
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    n_vars: u32,
    n_public: u32,
    domain_size: u32,
    vk_alpha1: g1::Affine,
    vk_beta1: g1::Affine,
    vk_beta2: g2::Affine,
    vk_delta1: g1::Affine,
    vk_delta2: g2::Affine,
    coeffs: Vec<Coefficient>,
    points_a: Vec<g1::Affine>,
    points_b1: Vec<g1::Affine>,
    points_b2: Vec<g2::Affine>,
    points_c: Vec<g1::Affine>,
    points_h: Vec<g1::Affine>,
  ) -> Result<Self, ProverError> {
    if n_vars <= n_public {
      return Err(invalid(format!(
        "witness holds {n_vars} signals, which cannot cover {n_public} public inputs"
      )));
    }
    if domain_size == 0 || !domain_size.is_power_of_two() {
      return Err(invalid(format!(
        "domain size {domain_size} is not a power of two"
      )));
    }

    let tail = (n_vars - n_public - 1) as usize;
    let tables = [
      ("pointsA", points_a.len(), n_vars as usize),
      ("pointsB1", points_b1.len(), n_vars as usize),
      ("pointsB2", points_b2.len(), n_vars as usize),
      ("pointsC", points_c.len(), tail),
      ("pointsH", points_h.len(), domain_size as usize),
    ];
    for (name, actual, expected) in tables {
      if actual != expected {
        return Err(invalid(format!(
          "{name} holds {actual} bases, expected {expected}"
        )));
      }
    }

    for (i, coeff) in coeffs.iter().enumerate() {
      if coeff.constraint >= domain_size {
        return Err(invalid(format!(
          "coefficient {i} targets constraint {} beyond the domain size {domain_size}",
          coeff.constraint
        )));
      }
      if coeff.signal >= n_vars {
        return Err(invalid(format!(
          "coefficient {i} reads signal {} beyond the witness length {n_vars}",
          coeff.signal
        )));
      }
    }

    Ok(Self {
      n_vars,
      n_public,
      domain_size,
      vk_alpha1,
      vk_beta1,
      vk_beta2,
      vk_delta1,
      vk_delta2,
      coeffs,
      points_a,
      points_b1,
      points_b2,
      points_c,
      points_h,
    })
  }

  /// Total witness signals, including the constant one and the public prefix.
  pub fn n_vars(&self) -> u32 {
    self.n_vars
  }

  /// Count of public inputs (witness indices `1..=n_public`).
  pub fn n_public(&self) -> u32 {
    self.n_public
  }

  /// FFT domain size, a power of two at least the constraint count.
  pub fn domain_size(&self) -> u32 {
    self.domain_size
  }

  /// Length of the R1CS coefficient stream.
  pub fn n_coeffs(&self) -> u64 {
    self.coeffs.len() as u64
  }
}
