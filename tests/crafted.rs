//! End-to-end identity resolution over crafted minimal images.
//!
//! The builder below assembles complete PE32 / PE32+ files byte by byte: DOS
//! stub, COFF header, optional header with a CLR data directory, one section,
//! the Cor20 header, and a metadata region with `#~`, `#Strings` and `#Blob`
//! streams holding a single Assembly row.

use dotident::{
    metadata::tables::{AssemblyFlags, AssemblyHashAlgorithm},
    prelude::AssemblyNameFlags,
    AssemblyContentType, AssemblyIdentity, Error, ProcessorArchitecture,
};

const MACHINE_I386: u16 = 0x014C;
const MACHINE_ARM: u16 = 0x01C0;
const MACHINE_AMD64: u16 = 0x8664;

const COR_FLAG_IL_ONLY: u32 = 0x0000_0001;
const COR_FLAG_REQUIRES_32BIT: u32 = 0x0000_0002;

const TOKEN: [u8; 8] = [0xB7, 0x7A, 0x5C, 0x56, 0x19, 0x34, 0xE0, 0x89];

struct ImageSpec {
    pe32_plus: bool,
    machine: u16,
    corflags: u32,
    assembly_flags: u32,
    with_culture: bool,
    key: Option<Vec<u8>>,
    with_assembly_row: bool,
}

impl Default for ImageSpec {
    fn default() -> Self {
        ImageSpec {
            pe32_plus: false,
            machine: MACHINE_I386,
            corflags: COR_FLAG_IL_ONLY,
            assembly_flags: 0,
            with_culture: false,
            key: Some(TOKEN.to_vec()),
            with_assembly_row: true,
        }
    }
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn pad_to(out: &mut Vec<u8>, len: usize) {
    assert!(out.len() <= len);
    out.resize(len, 0);
}

fn align4(len: usize) -> usize {
    (len + 3) & !3
}

/// Builds the `#~` stream: Module (1 row) and, unless disabled, Assembly (1 row).
fn build_tables_stream(spec: &ImageSpec) -> Vec<u8> {
    let mut out = Vec::new();

    let valid: u64 = if spec.with_assembly_row {
        (1 << 0x00) | (1 << 0x20)
    } else {
        1 << 0x00
    };

    push_u32(&mut out, 0); // reserved
    out.push(2); // major_version
    out.push(0); // minor_version
    out.push(0); // heap size flags, all heaps small
    out.push(1); // reserved
    push_u64(&mut out, valid);
    push_u64(&mut out, 0); // sorted
    push_u32(&mut out, 1); // Module row count
    if spec.with_assembly_row {
        push_u32(&mut out, 1); // Assembly row count
    }

    // Module row: generation, name, mvid, encid, encbaseid
    push_u16(&mut out, 0);
    push_u16(&mut out, 1);
    push_u16(&mut out, 0);
    push_u16(&mut out, 0);
    push_u16(&mut out, 0);

    if spec.with_assembly_row {
        push_u32(&mut out, AssemblyHashAlgorithm::SHA1);
        push_u16(&mut out, 1); // major
        push_u16(&mut out, 2); // minor
        push_u16(&mut out, 3); // build
        push_u16(&mut out, 4); // revision
        push_u32(&mut out, spec.assembly_flags);
        push_u16(&mut out, if spec.key.is_some() { 1 } else { 0 }); // public_key
        push_u16(&mut out, 1); // name -> "TestLib"
        push_u16(&mut out, if spec.with_culture { 9 } else { 0 }); // culture -> "en-US"
    }

    let target = align4(out.len());
    pad_to(&mut out, target);
    out
}

fn build_strings_heap() -> Vec<u8> {
    let mut out = vec![0_u8];
    out.extend_from_slice(b"TestLib\0"); // index 1
    out.extend_from_slice(b"en-US\0"); // index 9
    let target = align4(out.len());
    pad_to(&mut out, target);
    out
}

fn build_blob_heap(spec: &ImageSpec) -> Vec<u8> {
    let mut out = vec![0_u8];
    if let Some(key) = &spec.key {
        assert!(key.len() < 0x80);
        out.push(key.len() as u8); // compressed length prefix, index 1
        out.extend_from_slice(key);
    }
    let target = align4(out.len());
    pad_to(&mut out, target);
    out
}

/// Builds the metadata region: BSJB root, stream directory, and the streams.
fn build_metadata(spec: &ImageSpec) -> Vec<u8> {
    let tables = build_tables_stream(spec);
    let strings = build_strings_heap();
    let blob = build_blob_heap(spec);

    let mut out = Vec::new();
    push_u32(&mut out, 0x424A_5342); // "BSJB"
    push_u16(&mut out, 1);
    push_u16(&mut out, 1);
    push_u32(&mut out, 0); // reserved
    push_u32(&mut out, 12); // version string length, padded
    out.extend_from_slice(b"v4.0.30319\0\0");
    push_u16(&mut out, 0); // flags
    push_u16(&mut out, 3); // stream count

    let streams_base = 80_u32;
    push_u32(&mut out, streams_base);
    push_u32(&mut out, tables.len() as u32);
    out.extend_from_slice(b"#~\0\0");

    push_u32(&mut out, streams_base + tables.len() as u32);
    push_u32(&mut out, strings.len() as u32);
    out.extend_from_slice(b"#Strings\0\0\0\0");

    push_u32(&mut out, streams_base + (tables.len() + strings.len()) as u32);
    push_u32(&mut out, blob.len() as u32);
    out.extend_from_slice(b"#Blob\0\0\0");

    assert_eq!(out.len(), streams_base as usize);

    out.extend_from_slice(&tables);
    out.extend_from_slice(&strings);
    out.extend_from_slice(&blob);
    out
}

/// Assembles the full PE image around the metadata region.
///
/// Layout: headers in the first 0x200 bytes, one `.text` section at RVA
/// 0x2000 / file offset 0x200 holding the Cor20 header followed by the
/// metadata root at RVA 0x2048.
fn build_image(spec: &ImageSpec) -> Vec<u8> {
    let metadata = build_metadata(spec);
    let section_payload = 0x48 + metadata.len();
    let raw_size = (section_payload + 0x1FF) & !0x1FF;

    let mut out = Vec::new();

    // DOS header with the PE offset at 0x3C
    out.extend_from_slice(b"MZ");
    pad_to(&mut out, 0x3C);
    push_u32(&mut out, 0x80);
    pad_to(&mut out, 0x80);

    // PE signature + COFF header
    out.extend_from_slice(b"PE\0\0");
    push_u16(&mut out, spec.machine);
    push_u16(&mut out, 1); // number of sections
    push_u32(&mut out, 0); // timestamp
    push_u32(&mut out, 0); // symbol table
    push_u32(&mut out, 0); // symbol count
    push_u16(&mut out, if spec.pe32_plus { 240 } else { 224 });
    push_u16(&mut out, 0x2002); // DLL | EXECUTABLE_IMAGE

    if spec.pe32_plus {
        push_u16(&mut out, 0x20B); // PE32+ magic
        out.push(14);
        out.push(0);
        push_u32(&mut out, 0x200); // size of code
        push_u32(&mut out, 0);
        push_u32(&mut out, 0);
        push_u32(&mut out, 0); // entry point
        push_u32(&mut out, 0x2000); // base of code
        push_u64(&mut out, 0x1_4000_0000); // image base
        push_u32(&mut out, 0x1000); // section alignment
        push_u32(&mut out, 0x200); // file alignment
        push_u16(&mut out, 6);
        push_u16(&mut out, 0);
        push_u16(&mut out, 0);
        push_u16(&mut out, 0);
        push_u16(&mut out, 6);
        push_u16(&mut out, 0);
        push_u32(&mut out, 0); // win32 version
        push_u32(&mut out, 0x3000); // size of image
        push_u32(&mut out, 0x200); // size of headers
        push_u32(&mut out, 0); // checksum
        push_u16(&mut out, 3); // subsystem
        push_u16(&mut out, 0);
        push_u64(&mut out, 0x10_0000);
        push_u64(&mut out, 0x1000);
        push_u64(&mut out, 0x10_0000);
        push_u64(&mut out, 0x1000);
        push_u32(&mut out, 0); // loader flags
        push_u32(&mut out, 16); // directory count
    } else {
        push_u16(&mut out, 0x10B); // PE32 magic
        out.push(14);
        out.push(0);
        push_u32(&mut out, 0x200);
        push_u32(&mut out, 0);
        push_u32(&mut out, 0);
        push_u32(&mut out, 0);
        push_u32(&mut out, 0x2000); // base of code
        push_u32(&mut out, 0x2000); // base of data
        push_u32(&mut out, 0x40_0000); // image base
        push_u32(&mut out, 0x1000);
        push_u32(&mut out, 0x200);
        push_u16(&mut out, 6);
        push_u16(&mut out, 0);
        push_u16(&mut out, 0);
        push_u16(&mut out, 0);
        push_u16(&mut out, 6);
        push_u16(&mut out, 0);
        push_u32(&mut out, 0);
        push_u32(&mut out, 0x3000);
        push_u32(&mut out, 0x200);
        push_u32(&mut out, 0);
        push_u16(&mut out, 3);
        push_u16(&mut out, 0);
        push_u32(&mut out, 0x10_0000);
        push_u32(&mut out, 0x1000);
        push_u32(&mut out, 0x10_0000);
        push_u32(&mut out, 0x1000);
        push_u32(&mut out, 0);
        push_u32(&mut out, 16);
    }

    // Data directories; index 14 is the CLR runtime header
    for index in 0..16 {
        if index == 14 {
            push_u32(&mut out, 0x2000);
            push_u32(&mut out, 72);
        } else {
            push_u32(&mut out, 0);
            push_u32(&mut out, 0);
        }
    }

    // Section table: one .text section carrying the runtime header + metadata
    out.extend_from_slice(b".text\0\0\0");
    push_u32(&mut out, 0x1000); // virtual size
    push_u32(&mut out, 0x2000); // virtual address
    push_u32(&mut out, raw_size as u32);
    push_u32(&mut out, 0x200); // pointer to raw data
    push_u32(&mut out, 0);
    push_u32(&mut out, 0);
    push_u16(&mut out, 0);
    push_u16(&mut out, 0);
    push_u32(&mut out, 0x6000_0020); // CODE | EXECUTE | READ

    pad_to(&mut out, 0x200);

    // Cor20 header at RVA 0x2000
    push_u32(&mut out, 72);
    push_u16(&mut out, 2);
    push_u16(&mut out, 5);
    push_u32(&mut out, 0x2048); // metadata rva
    push_u32(&mut out, metadata.len() as u32);
    push_u32(&mut out, spec.corflags);
    push_u32(&mut out, 0); // entry point token
    pad_to(&mut out, 0x248);

    out.extend_from_slice(&metadata);
    pad_to(&mut out, 0x200 + raw_size);
    out
}

#[test]
fn resolves_identity_from_pe32() {
    let image = build_image(&ImageSpec {
        corflags: COR_FLAG_IL_ONLY | COR_FLAG_REQUIRES_32BIT,
        ..ImageSpec::default()
    });

    let identity = AssemblyIdentity::from_mem(image).unwrap();

    assert_eq!(identity.name, "TestLib");
    assert_eq!(identity.version.to_string(), "1.2.3.4");
    assert_eq!(identity.culture, "");
    assert!(identity.is_culture_neutral());
    assert_eq!(identity.hash_algorithm, AssemblyHashAlgorithm::SHA1);
    assert_eq!(identity.flags, 0);
    assert_eq!(identity.content_type, AssemblyContentType::Default);
    assert_eq!(identity.processor_architecture, ProcessorArchitecture::X86);

    // flags do not carry the PublicKey bit, so the blob routes to the token
    assert!(identity.public_key.is_empty());
    assert_eq!(identity.public_key_token, TOKEN.to_vec());
    assert_eq!(
        identity.display_name(),
        "TestLib, Version=1.2.3.4, Culture=neutral, PublicKeyToken=b77a5c561934e089"
    );
}

#[test]
fn resolves_identity_from_pe32_plus() {
    let full_key = vec![0x30; 16];
    let image = build_image(&ImageSpec {
        pe32_plus: true,
        machine: MACHINE_AMD64,
        assembly_flags: AssemblyFlags::PUBLIC_KEY,
        key: Some(full_key.clone()),
        ..ImageSpec::default()
    });

    let identity = AssemblyIdentity::from_mem(image).unwrap();

    assert_eq!(identity.processor_architecture, ProcessorArchitecture::AMD64);
    assert!(identity.has_public_key());
    assert_eq!(identity.public_key, full_key);
    assert!(identity.public_key_token.is_empty());
    assert_eq!(identity.flags, AssemblyNameFlags::PUBLIC_KEY);
}

#[test]
fn anycpu_image_classifies_as_msil() {
    let image = build_image(&ImageSpec::default());
    let identity = AssemblyIdentity::from_mem(image).unwrap();

    assert_eq!(identity.processor_architecture, ProcessorArchitecture::MSIL);
}

#[test]
fn arm_image_classifies_as_arm() {
    let image = build_image(&ImageSpec {
        machine: MACHINE_ARM,
        ..ImageSpec::default()
    });
    let identity = AssemblyIdentity::from_mem(image).unwrap();

    assert_eq!(identity.processor_architecture, ProcessorArchitecture::ARM);
}

#[test]
fn no_platform_marker_overrides_machine() {
    let image = build_image(&ImageSpec {
        pe32_plus: true,
        machine: MACHINE_AMD64,
        assembly_flags: AssemblyFlags::PA_NO_PLATFORM,
        ..ImageSpec::default()
    });
    let identity = AssemblyIdentity::from_mem(image).unwrap();

    assert_eq!(identity.processor_architecture, ProcessorArchitecture::None);
}

#[test]
fn windows_runtime_content_type() {
    let image = build_image(&ImageSpec {
        assembly_flags: 0x0200,
        ..ImageSpec::default()
    });
    let identity = AssemblyIdentity::from_mem(image).unwrap();

    assert_eq!(identity.content_type, AssemblyContentType::WindowsRuntime);
}

#[test]
fn culture_is_resolved_from_the_string_heap() {
    let image = build_image(&ImageSpec {
        with_culture: true,
        ..ImageSpec::default()
    });
    let identity = AssemblyIdentity::from_mem(image).unwrap();

    assert_eq!(identity.culture, "en-US");
    assert!(!identity.is_culture_neutral());
}

#[test]
fn raw_flag_bits_are_remapped() {
    let image = build_image(&ImageSpec {
        assembly_flags: AssemblyFlags::RETARGETABLE
            | AssemblyFlags::DISABLE_JIT_COMPILE_OPTIMIZER
            | AssemblyFlags::ENABLE_JIT_COMPILE_TRACKING,
        ..ImageSpec::default()
    });
    let identity = AssemblyIdentity::from_mem(image).unwrap();

    assert_eq!(
        identity.flags,
        AssemblyNameFlags::RETARGETABLE
            | AssemblyNameFlags::ENABLE_JIT_COMPILE_OPTIMIZER
            | AssemblyNameFlags::ENABLE_JIT_COMPILE_TRACKING
    );
}

#[test]
fn resolution_is_idempotent_across_calls() {
    let image = build_image(&ImageSpec {
        with_culture: true,
        ..ImageSpec::default()
    });
    let temp_path = std::env::temp_dir().join("dotident_idempotent.dll");
    std::fs::write(&temp_path, &image).unwrap();

    let first = AssemblyIdentity::from_file(&temp_path).unwrap();
    let second = AssemblyIdentity::from_file(&temp_path).unwrap();

    assert_eq!(first, second);

    std::fs::remove_file(&temp_path).unwrap();
}

#[test]
fn empty_file_reports_empty_not_malformed() {
    let temp_path = std::env::temp_dir().join("dotident_empty.dll");
    std::fs::write(&temp_path, b"").unwrap();

    match AssemblyIdentity::from_file(&temp_path) {
        Err(Error::Empty) => {}
        other => panic!("expected Error::Empty, got {:?}", other.map(|i| i.name)),
    }

    std::fs::remove_file(&temp_path).unwrap();
}

#[test]
fn missing_file_reports_not_found() {
    let result = AssemblyIdentity::from_file(std::path::Path::new(
        "/nonexistent/dotident/missing.dll",
    ));

    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[test]
fn garbage_bytes_report_malformed() {
    let result = AssemblyIdentity::from_mem(vec![0x4D; 256]);

    assert!(matches!(result, Err(Error::Malformed { .. })));
}

#[test]
fn truncated_metadata_reports_malformed() {
    let mut image = build_image(&ImageSpec::default());
    image.truncate(0x250);

    let result = AssemblyIdentity::from_mem(image);
    assert!(matches!(result, Err(Error::Malformed { .. })));
}

#[test]
fn pe_without_clr_directory_reports_malformed() {
    let mut image = build_image(&ImageSpec::default());
    // shrink the declared directory count below the CLR entry (index 14) and
    // zero the entry itself; the 96 fixed PE32 optional-header bytes start at
    // 0x98, the count is their last u32
    image[0xF4..0xF8].copy_from_slice(&14_u32.to_le_bytes());
    let clr_dir_offset = 0x98 + 96 + 14 * 8;
    image[clr_dir_offset..clr_dir_offset + 8].fill(0);

    let result = AssemblyIdentity::from_mem(image);
    assert!(matches!(result, Err(Error::Malformed { .. })));
}

#[test]
fn image_without_assembly_row_reports_malformed() {
    let image = build_image(&ImageSpec {
        with_assembly_row: false,
        ..ImageSpec::default()
    });

    let result = AssemblyIdentity::from_mem(image);
    assert!(matches!(result, Err(Error::Malformed { .. })));
}
