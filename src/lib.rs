// Copyright 2025 The dotident authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # dotident
//!
//! A small, cross-platform library for resolving the identity of .NET
//! assemblies - name, version, culture, public key or token, hash algorithm,
//! flags, content type, and target processor architecture - directly from the
//! raw bytes of a PE file, without loading a runtime and without executing
//! the image.
//!
//! ## Features
//!
//! - **📦 Efficient access** - Memory-mapped files, reference-based parsing, a
//!   single owned descriptor as output
//! - **🔍 Exact semantics** - Flag remapping and architecture classification
//!   follow the runtime's own identity rules bit for bit
//! - **🔧 Cross-platform** - Works on Windows, Linux, macOS, and any
//!   Rust-supported platform
//! - **🛡️ Strict validation** - Every offset, magic value, and heap handle is
//!   checked; three well-defined error kinds cover every failure
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dotident::AssemblyIdentity;
//! use std::path::Path;
//!
//! let identity = AssemblyIdentity::from_file(Path::new("MyLibrary.dll"))?;
//! println!("{}", identity.display_name());
//! println!("architecture: {}", identity.processor_architecture);
//! # Ok::<(), dotident::Error>(())
//! ```
//!
//! Buffers work the same way:
//!
//! ```rust,no_run
//! use dotident::AssemblyIdentity;
//!
//! let data = std::fs::read("MyLibrary.dll")?;
//! let identity = AssemblyIdentity::from_mem(data)?;
//! println!("{} v{}", identity.name, identity.version);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## How it works
//!
//! Resolution is a fixed pipeline over the physical image structure:
//!
//! 1. The file is opened and memory-mapped; goblin parses the PE structural
//!    chain and the CLR runtime data directory is located.
//! 2. The CLR (Cor20) header yields the metadata root position and the
//!    runtime flag word.
//! 3. The metadata root's stream directory locates the `#Strings` and `#Blob`
//!    heaps and the `#~` table stream, where the single Assembly row is read.
//! 4. The raw row and header facts are synthesized into an owned
//!    [`AssemblyIdentity`]; all OS resources are released before the call
//!    returns, in reverse acquisition order, on success and failure alike.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result) with exactly three
//! failure kinds:
//!
//! ```rust,no_run
//! use dotident::{AssemblyIdentity, Error};
//!
//! match AssemblyIdentity::from_file(std::path::Path::new("some.dll")) {
//!     Ok(identity) => println!("loaded {}", identity.name),
//!     Err(Error::NotFound(e)) => println!("cannot read file: {}", e),
//!     Err(Error::Empty) => println!("file is empty"),
//!     Err(Error::Malformed { message, .. }) => println!("malformed image: {}", message),
//! }
//! ```
//!
//! ## Standards Compliance
//!
//! Parsing follows the **ECMA-335 specification** (6th edition) for the
//! Common Language Infrastructure and the Microsoft PE/COFF specification.
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)
//! - [.NET Runtime](https://github.com/dotnet/runtime) - reference behavior
//!   for identity reflection

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Convenient re-exports of the most commonly used types.
pub mod prelude;

/// Definitions and parsing of the CLI metadata needed for identity resolution
pub mod metadata;

/// `dotident` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is
/// always [`Error`], used consistently throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// `dotident` Error type
///
/// The main error type for all operations in this crate. See [`error`] for
/// the taxonomy.
pub use error::Error;

/// Low-level PE file abstraction used by the resolution pipeline.
///
/// Most callers never touch this directly; [`AssemblyIdentity::from_file`] is
/// the intended entry point.
pub use file::File;

/// Low-level sequential parser for metadata structures.
pub use file::parser::Parser;

/// The identity descriptor and its component types.
pub use metadata::identity::{
    AssemblyContentType, AssemblyIdentity, AssemblyVersion, ProcessorArchitecture,
};
