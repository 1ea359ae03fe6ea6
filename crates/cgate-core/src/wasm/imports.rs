//! Import-section reader.
//!
//! Only as much of the binary container is decoded as is needed to list a
//! module's host imports: the 8-byte header, the section framing up to the
//! import section, and the import payload itself. Everything after the
//! import section is left untouched.

use tracing::{debug, trace};
use wasmparser::{ImportSectionReader, Parser, Payload};

use crate::error::ModuleError;
use crate::wasm::sections::{ImportEntry, ImportKind};

/// `\0asm`
pub const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];

/// Core module binary format version 1.
pub const WASM_VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

const HEADER_LEN: usize = 8;

/// Decode the import section of a core WebAssembly module.
///
/// Returns the entries in declaration order, duplicates included. A module
/// without an import section yields an empty list.
///
/// Fails with [`ModuleError::Malformed`] when the header is not a core
/// module header, a section or name length runs past the end of the buffer,
/// or an entry cannot be decoded. The error carries the absolute byte offset.
pub fn locate_imports(bytes: &[u8]) -> Result<Vec<ImportEntry>, ModuleError> {
    check_header(bytes)?;

    // Sections are framed lazily, so breaking out after the import section
    // means later sections are never read.
    for payload in Parser::new(0).parse_all(bytes) {
        match payload? {
            Payload::ImportSection(reader) => {
                let range = reader.range();
                debug!(offset = range.start, size = range.len(), "import section located");
                return decode_import_section(reader);
            }
            Payload::End(_) => break,
            _ => {}
        }
    }

    debug!("module has no import section");
    Ok(Vec::new())
}

fn check_header(bytes: &[u8]) -> Result<(), ModuleError> {
    if bytes.len() < HEADER_LEN {
        return Err(ModuleError::malformed(
            bytes.len(),
            format!(
                "truncated header: expected {HEADER_LEN} bytes, found {}",
                bytes.len()
            ),
        ));
    }
    if bytes[..4] != WASM_MAGIC {
        return Err(ModuleError::malformed(0, "magic header not detected"));
    }
    if bytes[4..HEADER_LEN] != WASM_VERSION {
        return Err(ModuleError::malformed(
            4,
            format!(
                "unsupported binary version {:02x?}; only core modules are accepted",
                &bytes[4..HEADER_LEN]
            ),
        ));
    }
    Ok(())
}

/// Collect every entry of an import section, compact groups flattened.
///
/// The reader rejects trailing bytes after the declared count, so a count
/// inconsistent with the section size surfaces as an error here.
fn decode_import_section(reader: ImportSectionReader<'_>) -> Result<Vec<ImportEntry>, ModuleError> {
    let mut entries = Vec::with_capacity(reader.count() as usize);

    for import in reader.into_imports() {
        let import = import?;
        let entry = ImportEntry::new(
            import.module,
            import.name,
            ImportKind::from_type_ref(&import.ty),
        );
        trace!(module = %entry.module, field = %entry.field, kind = %entry.kind, "import");
        entries.push(entry);
    }

    Ok(entries)
}
