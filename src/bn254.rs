//! Standard aliases for the BN254 curve backend (also known as BN256 or
//! alt_bn128). G1 points live over the base field Fq, G2 points over the
//! quadratic extension Fq2; both groups share the scalar field Fr.

/// Aliases for the G1 group, where the `A`, `C`, and quotient commitments live
pub mod g1 {
  pub use halo2curves::bn256::{Fq as Base, Fr as Scalar, G1 as Point, G1Affine as Affine};
}

/// Aliases for the G2 group, where the `B` commitment lives
pub mod g2 {
  pub use halo2curves::bn256::{Fq2 as Base, Fr as Scalar, G2 as Point, G2Affine as Affine};
}

pub use halo2curves::bn256::Fr as Scalar;
