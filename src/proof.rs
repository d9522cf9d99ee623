//! The Groth16 proof value and its snarkjs-compatible JSON projection.
use crate::bn254::{g1, g2};
use ff::PrimeField;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A Groth16 proof: two G1 commitments and one G2 commitment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Proof {
  /// The `A` commitment.
  pub a: g1::Affine,
  /// The `B` commitment.
  pub b: g2::Affine,
  /// The `C` commitment.
  pub c: g1::Affine,
}

/// Decimal string of a base-field element's natural-form integer.
fn fq_str(value: &g1::Base) -> String {
  BigUint::from_bytes_le(value.to_repr().as_ref()).to_str_radix(10)
}

impl Proof {
  /// Projects the proof to the snarkjs JSON object.
  ///
  /// Coordinates are decimal strings of the affine natural-form integers;
  /// the projective Z coordinate is emitted literally as `"1"` (`("1","0")`
  /// for G2), keeping the wire format affine.
  pub fn to_json(&self) -> Value {
    json!({
      "pi_a": [fq_str(&self.a.x), fq_str(&self.a.y), "1"],
      "pi_b": [
        [fq_str(&self.b.x.c0()), fq_str(&self.b.x.c1())],
        [fq_str(&self.b.y.c0()), fq_str(&self.b.y.c1())],
        ["1", "0"],
      ],
      "pi_c": [fq_str(&self.c.x), fq_str(&self.c.y), "1"],
      "protocol": "groth16",
    })
  }

  /// The JSON projection rendered to a string, fields in the fixed
  /// `pi_a, pi_b, pi_c, protocol` order.
  pub fn to_json_str(&self) -> String {
    self.to_json().to_string()
  }
}
