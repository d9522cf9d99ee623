//! This module defines errors returned by the library.
use thiserror::Error;

/// Errors returned by the Groth16 prover
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ProverError {
  /// returned if the supplied witness is not of the right length
  #[error("InvalidWitnessLength")]
  InvalidWitnessLength,
  /// returned if a structural check on the proving key fails at construction
  #[error("InvalidKey: {reason}")]
  InvalidKey {
    /// The reason the key was rejected
    reason: String,
  },
  /// returned if the randomness source refuses or returns short
  #[error("RngFailure: {reason}")]
  RngFailure {
    /// The error reported by the underlying byte source
    reason: String,
  },
  /// returned if the supplied input is not of the right length
  #[error("InvalidInputLength")]
  InvalidInputLength,
}
