//! Assembly identity resolution.
//!
//! This module defines [`AssemblyIdentity`], the normalized identity
//! descriptor of a .NET image, and the pipeline that produces it from raw
//! bytes: open the image, locate the CLR header and metadata root, read the
//! single Assembly table row, and reconcile the independently-encoded flag
//! fields into one descriptor.
//!
//! The flag remap and the processor-architecture decision table are
//! compatibility contracts inherited from the runtime's own identity
//! reflection; they are encoded as explicit per-bit translations and match
//! arms, not derived arithmetic.
//!
//! # ECMA-335 References
//!
//! - **Section II.22.2**: Assembly table
//! - **Section II.23.1.1**: AssemblyHashAlgorithm
//! - **Section II.23.1.2**: AssemblyFlags
//!
//! See: <https://ecma-international.org/publications-and-standards/standards/ecma-335/>
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotident::AssemblyIdentity;
//! use std::path::Path;
//!
//! let identity = AssemblyIdentity::from_file(Path::new("MyLibrary.dll"))?;
//! println!("{}", identity.display_name());
//! # Ok::<(), dotident::Error>(())
//! ```

use std::{fmt, fmt::Write as _, path::Path};

use crate::{
    file::File,
    metadata::{
        cor20header::{Cor20Flags, Cor20Header},
        root::Root,
        streams::{Blob, Strings, TablesHeader},
        tables::{AssemblyFlags, AssemblyRaw},
    },
    Result,
};

#[allow(non_snake_case)]
/// Flag bits of the normalized identity descriptor.
///
/// The raw `AssemblyFlags` word of the Assembly table and this descriptor
/// encoding are not identical; values move between them only through
/// [`AssemblyIdentity`]'s explicit per-bit remap. Note the intentional naming
/// inversion on the JIT-optimizer bit: the raw flag records that the
/// optimizer is *disabled*, the descriptor bit that recording is *enabled*.
pub mod AssemblyNameFlags {
    /// No flags set
    pub const NONE: u32 = 0x0000;
    /// The descriptor carries the full public key rather than a token
    pub const PUBLIC_KEY: u32 = 0x0001;
    /// The assembly is retargetable to a different publisher at runtime
    pub const RETARGETABLE: u32 = 0x0100;
    /// JIT compiler optimization recording is enabled (raw bit: optimizer disabled)
    pub const ENABLE_JIT_COMPILE_OPTIMIZER: u32 = 0x4000;
    /// JIT compile tracking is enabled
    pub const ENABLE_JIT_COMPILE_TRACKING: u32 = 0x8000;
}

const IMAGE_FILE_MACHINE_I386: u16 = 0x014C;
const IMAGE_FILE_MACHINE_ARM: u16 = 0x01C0;
const IMAGE_FILE_MACHINE_IA64: u16 = 0x0200;
const IMAGE_FILE_MACHINE_AMD64: u16 = 0x8664;

/// Four-part version numbering for .NET assemblies.
///
/// Components are compared in order: major, minor, build, revision. The
/// metadata stores them as 2-byte values widened to `u32` for alignment;
/// construction from the raw row saturates back into `u16`.
///
/// # Examples
///
/// ```rust
/// use dotident::AssemblyVersion;
///
/// let version = AssemblyVersion::new(4, 0, 0, 0);
/// assert_eq!(version.to_string(), "4.0.0.0");
/// assert!(version < AssemblyVersion::new(4, 5, 0, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssemblyVersion {
    /// Major version component
    pub major: u16,
    /// Minor version component
    pub minor: u16,
    /// Build version component
    pub build: u16,
    /// Revision version component
    pub revision: u16,
}

impl AssemblyVersion {
    /// Create a new assembly version with the specified components.
    ///
    /// # Arguments
    ///
    /// * `major` - Major version component
    /// * `minor` - Minor version component
    /// * `build` - Build version component
    /// * `revision` - Revision version component
    #[must_use]
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Create an `AssemblyVersion` from the row's widened `u32` components.
    ///
    /// Per ECMA-335 the components fit in `u16`; malformed metadata that
    /// overflows is saturated instead of panicking.
    #[inline]
    fn from_row(major: u32, minor: u32, build: u32, revision: u32) -> AssemblyVersion {
        AssemblyVersion::new(
            u16::try_from(major).unwrap_or(u16::MAX),
            u16::try_from(minor).unwrap_or(u16::MAX),
            u16::try_from(build).unwrap_or(u16::MAX),
            u16::try_from(revision).unwrap_or(u16::MAX),
        )
    }
}

impl fmt::Display for AssemblyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

/// Target processor architecture of an assembly.
///
/// Not stored as a direct field anywhere in the image; classified from the
/// optional-header bitness, the COFF machine type, the CLR header flags, and
/// the legacy architecture bits of the assembly flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorArchitecture {
    /// Architecture unknown or intentionally unspecified
    None,
    /// Microsoft Intermediate Language - architecture neutral
    MSIL,
    /// 32-bit Intel x86
    X86,
    /// Intel Itanium 64-bit
    IA64,
    /// 64-bit x86-64 (Intel/AMD)
    AMD64,
    /// 32-bit ARM
    ARM,
}

impl ProcessorArchitecture {
    /// Classify the target architecture from the raw header facts.
    ///
    /// The legacy no-platform marker in the assembly flags wins over
    /// everything else: such assemblies are reference/retargetable
    /// placeholders whose architecture is intentionally unspecified.
    pub(crate) fn from_headers(assembly_flags: u32, facts: &HeaderFacts) -> ProcessorArchitecture {
        if assembly_flags & AssemblyFlags::PA_MASK == AssemblyFlags::PA_NO_PLATFORM {
            return ProcessorArchitecture::None;
        }

        if facts.is_pe32_plus {
            match facts.machine {
                IMAGE_FILE_MACHINE_IA64 => ProcessorArchitecture::IA64,
                IMAGE_FILE_MACHINE_AMD64 => ProcessorArchitecture::AMD64,
                IMAGE_FILE_MACHINE_I386 if facts.il_only() => ProcessorArchitecture::MSIL,
                _ => ProcessorArchitecture::None,
            }
        } else {
            match facts.machine {
                IMAGE_FILE_MACHINE_I386 => {
                    if facts.requires_32bit() {
                        ProcessorArchitecture::X86
                    } else if facts.il_only() {
                        ProcessorArchitecture::MSIL
                    } else {
                        ProcessorArchitecture::X86
                    }
                }
                IMAGE_FILE_MACHINE_ARM => ProcessorArchitecture::ARM,
                _ => ProcessorArchitecture::None,
            }
        }
    }
}

impl fmt::Display for ProcessorArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arch_str = match self {
            Self::None => "None",
            Self::MSIL => "MSIL",
            Self::X86 => "x86",
            Self::IA64 => "IA64",
            Self::AMD64 => "AMD64",
            Self::ARM => "ARM",
        };
        write!(f, "{}", arch_str)
    }
}

/// Coarse classification of a managed image, stored in bits 9-11 of the
/// assembly flag word.
///
/// Codes outside the defined set pass through as [`Reserved`] instead of
/// failing resolution; newer runtimes may define values this crate predates.
///
/// [`Reserved`]: AssemblyContentType::Reserved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssemblyContentType {
    /// An ordinary managed assembly
    Default,
    /// A Windows Runtime (platform-bridging) assembly
    WindowsRuntime,
    /// An undefined content-type code, carried through unchanged
    Reserved(u8),
}

impl AssemblyContentType {
    /// Extract the content type from the raw assembly flag word.
    #[must_use]
    pub fn from_flags(flags: u32) -> AssemblyContentType {
        #[allow(clippy::cast_possible_truncation)]
        match (flags & AssemblyFlags::CONTENT_TYPE_MASK) >> 9 {
            0 => AssemblyContentType::Default,
            1 => AssemblyContentType::WindowsRuntime,
            other => AssemblyContentType::Reserved(other as u8),
        }
    }
}

/// Architecture-relevant facts gathered from the PE and CLR headers.
///
/// Derived once per call, consumed by the synthesizer, then discarded; no
/// header state survives into the descriptor beyond what classification
/// produced.
pub(crate) struct HeaderFacts {
    /// Optional-header magic was PE32+ (64-bit image)
    pub is_pe32_plus: bool,
    /// COFF machine type
    pub machine: u16,
    /// Raw CLR header flag word
    pub corflags: u32,
}

impl HeaderFacts {
    fn il_only(&self) -> bool {
        self.corflags & Cor20Flags::IL_ONLY != 0
    }

    fn requires_32bit(&self) -> bool {
        self.corflags & Cor20Flags::REQUIRES_32BIT != 0
    }

    fn prefers_32bit(&self) -> bool {
        self.corflags & Cor20Flags::PREFERS_32BIT != 0
    }
}

/// The normalized identity descriptor of a .NET assembly.
///
/// Produced once per resolution call and fully owned: no handles, mappings,
/// or borrows of the source image survive in it.
///
/// # Invariants
///
/// - [`public_key`](Self::public_key) and
///   [`public_key_token`](Self::public_key_token) are mutually exclusive;
///   the PublicKey flag selects which one carries the row's key material.
/// - [`culture`](Self::culture) is never an absent value; the empty string is
///   the canonical culture-neutral marker, including for a nil culture handle.
///
/// # Examples
///
/// ```rust,no_run
/// use dotident::AssemblyIdentity;
/// use std::path::Path;
///
/// let identity = AssemblyIdentity::from_file(Path::new("System.Core.dll"))?;
/// assert!(identity.public_key.is_empty() || identity.public_key_token.is_empty());
/// println!("{} ({})", identity.name, identity.processor_architecture);
/// # Ok::<(), dotident::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyIdentity {
    /// Simple assembly name (e.g. "mscorlib", "System.Core")
    pub name: String,
    /// Four-part version number
    pub version: AssemblyVersion,
    /// Localization culture; empty for culture-neutral assemblies
    pub culture: String,
    /// Full public key bytes; populated only when the PublicKey flag is set
    pub public_key: Vec<u8>,
    /// Public key token bytes; populated only when the PublicKey flag is clear
    pub public_key_token: Vec<u8>,
    /// Raw `AssemblyHashAlgorithm` code, see
    /// [`crate::metadata::tables::AssemblyHashAlgorithm`]
    pub hash_algorithm: u32,
    /// Descriptor flag bits, see [`AssemblyNameFlags`]
    pub flags: u32,
    /// Coarse image classification from the flag word
    pub content_type: AssemblyContentType,
    /// Classified target architecture
    pub processor_architecture: ProcessorArchitecture,
}

impl AssemblyIdentity {
    /// Resolve the identity of the assembly at the given path.
    ///
    /// Acquires the file handle, the memory mapping, and the parsed view in
    /// order; all three are released in reverse order when this returns,
    /// whether it succeeds or fails at any stage.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the PE file on disk
    ///
    /// # Errors
    ///
    /// - [`crate::Error::NotFound`] if the path is missing or unreadable
    /// - [`crate::Error::Empty`] if the file has zero length
    /// - [`crate::Error::Malformed`] for any structural violation, including
    ///   an image without an Assembly row
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use dotident::AssemblyIdentity;
    /// use std::path::Path;
    ///
    /// let identity = AssemblyIdentity::from_file(Path::new("MyLibrary.dll"))?;
    /// println!("{} v{}", identity.name, identity.version);
    /// # Ok::<(), dotident::Error>(())
    /// ```
    pub fn from_file(path: &Path) -> Result<AssemblyIdentity> {
        let file = File::from_file(path)?;

        Self::from_image(&file)
    }

    /// Resolve the identity of an assembly already loaded into memory.
    ///
    /// # Arguments
    ///
    /// * `data` - The bytes of the PE file
    ///
    /// # Errors
    ///
    /// Same as [`AssemblyIdentity::from_file`], minus the I/O failures.
    pub fn from_mem(data: Vec<u8>) -> Result<AssemblyIdentity> {
        let file = File::from_mem(data)?;

        Self::from_image(&file)
    }

    /// Resolve the identity from an already-loaded [`File`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for any structural violation in
    /// the CLR header, the metadata root, the heaps, or the Assembly table.
    pub fn from_image(file: &File) -> Result<AssemblyIdentity> {
        let (clr_rva, clr_size) = file.clr();
        let clr_offset = file.rva_to_offset(clr_rva)?;
        let cor20 = Cor20Header::read(file.data_slice(clr_offset, clr_size)?)?;

        let root_offset = file.rva_to_offset(cor20.meta_data_rva as usize)?;
        let root_data = file.data_slice(root_offset, cor20.meta_data_size as usize)?;
        let root = Root::read(root_data)?;

        let mut strings = None;
        let mut blob = None;
        let mut tables = None;
        for header in &root.stream_headers {
            let stream_data =
                &root_data[header.offset as usize..(header.offset + header.size) as usize];
            match header.name.as_str() {
                "#Strings" => strings = Some(Strings::from(stream_data)?),
                "#Blob" => blob = Some(Blob::from(stream_data)?),
                "#~" => tables = Some(TablesHeader::from(stream_data)?),
                _ => {}
            }
        }

        let Some(tables) = tables else {
            return Err(malformed_error!("Image has no #~ stream"));
        };
        let Some(strings) = strings else {
            return Err(malformed_error!("Image has no #Strings heap"));
        };
        let Some(row) = tables.assembly()? else {
            return Err(malformed_error!("Image has no Assembly row"));
        };

        let facts = HeaderFacts {
            is_pe32_plus: file.is_pe32_plus(),
            machine: file.machine(),
            corflags: cor20.flags,
        };

        Self::from_row(&row, &strings, blob.as_ref(), &facts)
    }

    /// Synthesize the descriptor from the raw row, the heaps, and the header
    /// facts.
    ///
    /// Pure apart from handle resolution; every classification below is
    /// deterministic, and errors can only originate from the heap lookups.
    fn from_row(
        row: &AssemblyRaw,
        strings: &Strings<'_>,
        blob: Option<&Blob<'_>>,
        facts: &HeaderFacts,
    ) -> Result<AssemblyIdentity> {
        let name = strings.get(row.name as usize)?.to_string();

        // A nil culture handle must yield empty text, never an absent value
        let culture = if row.culture == 0 {
            String::new()
        } else {
            strings.get(row.culture as usize)?.to_string()
        };

        // A nil key handle must yield an explicit empty sequence
        let key_bytes = if row.public_key == 0 {
            Vec::new()
        } else {
            let Some(blob) = blob else {
                return Err(malformed_error!(
                    "Assembly declares key material but the image has no #Blob heap"
                ));
            };
            blob.get(row.public_key as usize)?.to_vec()
        };

        let (public_key, public_key_token) = if row.flags & AssemblyFlags::PUBLIC_KEY != 0 {
            (key_bytes, Vec::new())
        } else {
            (Vec::new(), key_bytes)
        };

        Ok(AssemblyIdentity {
            name,
            version: AssemblyVersion::from_row(
                row.major_version,
                row.minor_version,
                row.build_number,
                row.revision_number,
            ),
            culture,
            public_key,
            public_key_token,
            hash_algorithm: row.hash_alg_id,
            flags: Self::remap_flags(row.flags),
            content_type: AssemblyContentType::from_flags(row.flags),
            processor_architecture: ProcessorArchitecture::from_headers(row.flags, facts),
        })
    }

    /// Translate the raw Assembly flag word into the descriptor encoding.
    ///
    /// The two layouts are not identical and every bit goes through this
    /// fixed table; in particular the raw DisableJITCompileOptimizer bit maps
    /// onto the descriptor's EnableJITcompileOptimizer bit unchanged in value.
    fn remap_flags(raw: u32) -> u32 {
        let mut flags = AssemblyNameFlags::NONE;

        if raw & AssemblyFlags::PUBLIC_KEY != 0 {
            flags |= AssemblyNameFlags::PUBLIC_KEY;
        }
        if raw & AssemblyFlags::RETARGETABLE != 0 {
            flags |= AssemblyNameFlags::RETARGETABLE;
        }
        if raw & AssemblyFlags::ENABLE_JIT_COMPILE_TRACKING != 0 {
            flags |= AssemblyNameFlags::ENABLE_JIT_COMPILE_TRACKING;
        }
        if raw & AssemblyFlags::DISABLE_JIT_COMPILE_OPTIMIZER != 0 {
            flags |= AssemblyNameFlags::ENABLE_JIT_COMPILE_OPTIMIZER;
        }

        flags
    }

    /// Check if this assembly carries the full public key.
    #[must_use]
    pub fn has_public_key(&self) -> bool {
        self.flags & AssemblyNameFlags::PUBLIC_KEY != 0
    }

    /// Check if this assembly is culture-neutral.
    #[must_use]
    pub fn is_culture_neutral(&self) -> bool {
        self.culture.is_empty()
    }

    /// Generate the standard display name for this assembly identity.
    ///
    /// Produces the `Name, Version=..., Culture=..., PublicKeyToken=...` form
    /// used by runtime binding and tooling. The token field shows the stored
    /// token bytes; assemblies carrying a full key (or no key at all) show
    /// `null`, as no token is computed here.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dotident::{AssemblyIdentity, AssemblyVersion, AssemblyContentType, ProcessorArchitecture};
    ///
    /// let identity = AssemblyIdentity {
    ///     name: "MyLibrary".to_string(),
    ///     version: AssemblyVersion::new(1, 2, 3, 4),
    ///     culture: String::new(),
    ///     public_key: Vec::new(),
    ///     public_key_token: Vec::new(),
    ///     hash_algorithm: 0x8004,
    ///     flags: 0,
    ///     content_type: AssemblyContentType::Default,
    ///     processor_architecture: ProcessorArchitecture::MSIL,
    /// };
    ///
    /// assert_eq!(
    ///     identity.display_name(),
    ///     "MyLibrary, Version=1.2.3.4, Culture=neutral, PublicKeyToken=null"
    /// );
    /// ```
    #[must_use]
    pub fn display_name(&self) -> String {
        let mut result = String::with_capacity(self.name.len() + 80);

        result.push_str(&self.name);

        let _ = write!(result, ", Version={}", self.version);

        let culture_str = if self.culture.is_empty() {
            "neutral"
        } else {
            &self.culture
        };
        let _ = write!(result, ", Culture={}", culture_str);

        result.push_str(", PublicKeyToken=");
        if self.public_key_token.is_empty() {
            result.push_str("null");
        } else {
            for byte in &self.public_key_token {
                let _ = write!(result, "{:02x}", byte);
            }
        }

        result
    }
}

impl fmt::Display for AssemblyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
