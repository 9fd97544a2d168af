//! Issuance engines. The real ACME engine lives outside this crate; the
//! rcgen-backed engine here makes everything testable without one.

mod test;

pub use test::*;
