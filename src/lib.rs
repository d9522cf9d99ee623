//! This library implements a high-speed Groth16 prover over the BN254 curve
//! (also known as BN256 or alt_bn128).
//!
//! Given a compiled proving key (verifying-key commitments, the R1CS
//! coefficient stream, and the MSM base tables) and a satisfying witness,
//! [`Prover::prove`] emits a succinct proof `(A ∈ G1, B ∈ G2, C ∈ G1)` that a
//! verifier holding the matching verifying key accepts. The heavy lifting is
//! split across three subsystems: parallel multi-scalar multiplication over
//! both groups ([`msm`]), the coset-FFT pipeline that produces the quotient
//! polynomial's evaluations ([`fft`]), and the blinding and group algebra of
//! final proof assembly ([`prover`]).
#![deny(
  warnings,
  future_incompatible,
  nonstandard_style,
  rust_2018_idioms,
  missing_docs
)]
#![allow(clippy::type_complexity)]
#![forbid(unsafe_code)]

pub mod bn254;
pub mod errors;
pub mod fft;
pub mod key;
pub mod msm;
pub mod proof;
pub mod prover;

pub use errors::ProverError;
pub use key::{CoeffMatrix, Coefficient, ProvingKey};
pub use proof::Proof;
pub use prover::{Prover, sample_blinding_scalar};

/// Opens a tracing span and starts a wall-clock timer in one step.
///
/// Returns `(entered_span, instant)`; callers report the elapsed time with an
/// `info!` event once the guarded section completes.
#[macro_export]
macro_rules! start_span {
  ($name:expr) => {{
    let span = tracing::info_span!($name);
    (span.entered(), std::time::Instant::now())
  }};
  ($name:expr, $($fields:tt)*) => {{
    let span = tracing::info_span!($name, $($fields)*);
    (span.entered(), std::time::Instant::now())
  }};
}
