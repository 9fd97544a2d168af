//! Cache backends: process-local, etcd-backed, and an encrypting decorator
//! that stacks on either.

mod encrypted;
mod etcd;
mod memory;

pub use encrypted::*;
pub use etcd::*;
pub use memory::*;
