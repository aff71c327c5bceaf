//! The credential filesystem: a path resolver that splits credential files
//! per account, and the FUSE session that exposes it over a mount point.

pub mod fuse;
pub mod resolver;

pub use fuse::CredentialFuse;
pub use resolver::CredentialFs;
