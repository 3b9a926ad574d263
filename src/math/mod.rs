//! Fixed-point math at the 10^27 ray scale.

pub mod common;
pub mod convert;
pub mod ray;

pub use common::{TryAdd, TryDiv, TryMul, TrySub};
pub use ray::{Ray, SignedRay};
