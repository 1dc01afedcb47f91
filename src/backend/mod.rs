//! Concrete implementations of the [`crate::ir::Backend`] façade.
//!
//! `ptx` is the reference implementation: it emits PTX-shaped text
//! directly, without wrapping an external codegen library. `record` is
//! an in-memory recorder used by tests to assert on emitted IR shape
//! without round-tripping through text.

pub mod ptx;
pub mod record;
