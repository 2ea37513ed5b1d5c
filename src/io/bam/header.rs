//! BAM header and reference table parsing.
//!
//! The uncompressed stream opens with the magic `BAM\x01`, the SAM header
//! text, and the reference sequence dictionary. The header regularly spans
//! more than one BGZF block, so parsing is incremental: the loader feeds a
//! growing buffer and retries until the whole dictionary is available.

use crate::error::{BamScopeError, Result};

/// BAM magic bytes.
const BAM_MAGIC: &[u8; 4] = b"BAM\x01";

/// Reference sequence name and length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Name of the reference sequence.
    pub name: String,
    /// Length of the reference sequence in bases.
    pub length: u32,
}

/// Decoded BAM header: SAM header text plus the reference dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// SAM header text (`@HD`, `@SQ`, `@RG`, ... lines).
    pub text: String,
    /// Reference sequences, in file order.
    pub references: Vec<Reference>,
}

fn read_u32(data: &[u8], offs: usize) -> u32 {
    u32::from_le_bytes([data[offs], data[offs + 1], data[offs + 2], data[offs + 3]])
}

/// Try to parse the header from the front of the uncompressed stream.
///
/// Returns `Ok(None)` when `data` does not yet hold the complete header;
/// the caller appends the next block and retries. Restarting from scratch is
/// fine: the header only spans the first few blocks of a file. On success,
/// returns the header and the number of bytes it occupied.
pub(crate) fn parse_header(data: &[u8]) -> Result<Option<(Header, usize)>> {
    if data.len() < 12 {
        return Ok(None);
    }
    if &data[..4] != BAM_MAGIC {
        return Err(BamScopeError::InvalidHeader(format!(
            "magic {:?} is not BAM\\x01",
            &data[..4]
        )));
    }

    let head_length = read_u32(data, 4) as usize;
    if data.len() < 12 + head_length {
        return Ok(None);
    }
    let text = std::str::from_utf8(&data[8..8 + head_length])
        .map_err(|e| BamScopeError::InvalidHeader(format!("SAM header text is not UTF-8: {e}")))?
        .to_string();
    let num_refs = read_u32(data, 8 + head_length) as usize;

    let mut references = Vec::with_capacity(num_refs);
    let mut offs = 12 + head_length;
    for _ in 0..num_refs {
        if data.len() - offs < 4 {
            return Ok(None);
        }
        let name_length = read_u32(data, offs) as usize;
        if name_length == 0 {
            return Err(BamScopeError::InvalidHeader(
                "reference name length is zero".into(),
            ));
        }
        if data.len() - offs - 4 < name_length + 4 {
            return Ok(None);
        }
        // name_length includes the trailing null
        let name = std::str::from_utf8(&data[offs + 4..offs + 4 + name_length - 1])
            .map_err(|e| BamScopeError::InvalidHeader(format!("reference name is not UTF-8: {e}")))?
            .to_string();
        let length = read_u32(data, offs + 4 + name_length);
        references.push(Reference { name, length });
        offs += 8 + name_length;
    }

    Ok(Some((Header { text, references }, offs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(text: &str, refs: &[(&str, u32)]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"BAM\x01");
        data.extend_from_slice(&(text.len() as u32).to_le_bytes());
        data.extend_from_slice(text.as_bytes());
        data.extend_from_slice(&(refs.len() as u32).to_le_bytes());
        for (name, length) in refs {
            data.extend_from_slice(&((name.len() + 1) as u32).to_le_bytes());
            data.extend_from_slice(name.as_bytes());
            data.push(0);
            data.extend_from_slice(&length.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_parse_complete_header() {
        let data = header_bytes(
            "@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:248956422\n",
            &[("chr1", 248_956_422), ("chrM", 16_569)],
        );
        let (header, consumed) = parse_header(&data).unwrap().unwrap();
        assert_eq!(consumed, data.len());
        assert!(header.text.starts_with("@HD"));
        assert_eq!(header.references.len(), 2);
        assert_eq!(header.references[0].name, "chr1");
        assert_eq!(header.references[0].length, 248_956_422);
        assert_eq!(header.references[1].name, "chrM");
    }

    #[test]
    fn test_parse_incomplete_header_needs_more_data() {
        let data = header_bytes("@HD\tVN:1.6\n", &[("chr1", 1000), ("chr2", 2000)]);
        for cut in [0, 4, 11, data.len() - 1] {
            assert!(parse_header(&data[..cut]).unwrap().is_none());
        }
        assert!(parse_header(&data).unwrap().is_some());
    }

    #[test]
    fn test_parse_leaves_trailing_bytes() {
        let mut data = header_bytes("", &[("ref", 100)]);
        let header_len = data.len();
        data.extend_from_slice(b"record bytes follow");
        let (_, consumed) = parse_header(&data).unwrap().unwrap();
        assert_eq!(consumed, header_len);
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        let mut data = header_bytes("", &[]);
        data[3] = b'2';
        assert!(parse_header(&data).is_err());
    }

    #[test]
    fn test_parse_header_without_references() {
        let data = header_bytes("@HD\tVN:1.6\n", &[]);
        let (header, consumed) = parse_header(&data).unwrap().unwrap();
        assert!(header.references.is_empty());
        assert_eq!(consumed, data.len());
    }
}
