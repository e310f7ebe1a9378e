//! Batched Conjugate Gradient for sparse linear systems.
//!
//! Solves many independent systems `A x_b = y_b` that share one sparse matrix
//! `A` in a single run. Every batch entry has its own tolerance, iteration
//! budget and convergence/divergence flags; finished entries are frozen while
//! the rest keep iterating.
//!
//! # Modules
//!
//! | Module | Role |
//! |--------|------|
//! | [`session`] | caller-owned [`SolverSession`] and the [`solve`] entry point |
//! | [`cg`] | the iteration loop |
//! | [`convergence`] | tolerances and per-entry status flags |
//! | [`traits`] / [`operator`] | the [`SparseOperator`] seam and its CSR implementation |
//! | [`products`] | sparse × dense products `A B` and `A^T B` |
//! | [`workspace`] | grow-only scratch space |
//!
//! # Example
//!
//! ```rust
//! use ruvector_batched_cg::{solve, Batch, CsrMatrix};
//!
//! // Symmetric positive-definite 3x3 (f32)
//! let matrix = CsrMatrix::<f32>::from_coo(3, 3, vec![
//!     (0, 0, 2.0_f32), (0, 1, -0.5_f32),
//!     (1, 0, -0.5_f32), (1, 1, 2.0_f32), (1, 2, -0.5_f32),
//!     (2, 1, -0.5_f32), (2, 2, 2.0_f32),
//! ]);
//! let y = Batch::from_rows(&[[1.0_f32, 0.0, 1.0], [0.0, 1.0, 0.0]]).unwrap();
//! let x0 = Batch::zeros(2, 3);
//!
//! let snapshots = solve(&matrix, &y, &x0, 1e-5, 1e-6, &[100], false).unwrap();
//! let last = snapshots.last().unwrap();
//! assert!(last.all_converged());
//! assert!(last.diverged.iter().all(|&d| !d));
//! ```
//!
//! # Features
//!
//! * `parallel` (default): apply the CSR operator to batch entries on the
//!   rayon thread pool.

pub mod cg;
pub mod config;
pub mod convergence;
pub mod division;
pub mod element;
pub mod error;
pub mod events;
pub mod operator;
pub mod products;
pub mod session;
pub mod state;
pub mod traits;
pub mod types;
pub mod validation;
pub mod workspace;

pub use config::CgConfig;
pub use element::{DType, Element, RawValues};
pub use error::{SolverError, ValidationError};
pub use events::SolverEvent;
pub use operator::CsrOperator;
pub use products::{spmm, spmm_transpose};
pub use session::{solve, SolverSession};
pub use traits::SparseOperator;
pub use types::{Batch, CsrMatrix, DenseMatrix, Snapshot};
