//! Pure pipeline logic: roles, verdict parsing, artifact naming.

pub mod artifacts;
pub mod role;
pub mod verdict;
