//! Metadata streams and heaps.
//!
//! The metadata root carries a directory of named streams; identity
//! resolution consumes three of them:
//!
//! - [`Strings`] - the `#Strings` heap, for the assembly name and culture
//! - [`Blob`] - the `#Blob` heap, for the public key or key token
//! - [`TablesHeader`] - the `#~` table stream, for the Assembly row
//!
//! [`StreamHeader`] is the directory entry type shared by all of them.
//! `#US` and `#GUID` streams are accepted by the directory parser but carry
//! nothing identity resolution needs, so no accessor exists for them.

mod blob;
mod streamheader;
mod strings;
mod tablesheader;

pub use blob::Blob;
pub use streamheader::StreamHeader;
pub use strings::Strings;
pub use tablesheader::TablesHeader;
