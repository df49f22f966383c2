//! # dotident Prelude
//!
//! A convenient prelude for the types nearly every user of the crate touches.
//!
//! ```rust,no_run
//! use dotident::prelude::*;
//!
//! let identity = AssemblyIdentity::from_file("tests/samples/lib.dll".as_ref())?;
//! println!("{}", identity);
//! # Ok::<(), dotident::Error>(())
//! ```

/// The main error type for all dotident operations
pub use crate::Error;

/// The result type used throughout dotident
pub use crate::Result;

/// The identity descriptor and its component types
pub use crate::{AssemblyContentType, AssemblyIdentity, AssemblyVersion, ProcessorArchitecture};

/// Low-level file abstraction for callers that drive the pipeline themselves
pub use crate::File;

/// Raw flag and hash-algorithm constants of the Assembly table
pub use crate::metadata::tables::{AssemblyFlags, AssemblyHashAlgorithm};

/// Descriptor flag constants
pub use crate::metadata::identity::AssemblyNameFlags;
