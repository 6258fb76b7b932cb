//! The `.riscv.attributes` section body.
//!
//! The section is fixed for every object this assembler produces: format
//! version `'A'`, one "riscv" vendor subsection, one Tag_file
//! sub-sub-section carrying five attributes describing the rv32i target.
//! The body is NUL-padded up to the recorded section size so later
//! section offsets stay true.

/// Size recorded in the `.riscv.attributes` section header; the encoded
/// body is padded up to it.
pub const ATTRIBUTES_SIZE: u32 = 0x5f;

const FORMAT_VERSION: u8 = b'A';
const VENDOR_NAME: &str = "riscv";
const TAG_FILE: u64 = 1;

/// An attribute value is either a ULEB128 number or a NUL-terminated
/// string.
#[derive(Debug, Clone, Copy)]
enum AttrValue {
    Uleb(u64),
    Ntbs(&'static str),
}

// Tag 4 stack alignment, tag 5 architecture, tag 6 unaligned access,
// tag 14 atomic ABI, tag 16 x3/gp usage.
const FILE_ATTRIBUTES: &[(u64, AttrValue)] = &[
    (4, AttrValue::Uleb(16)),
    (5, AttrValue::Ntbs("rv32i2p1")),
    (6, AttrValue::Uleb(0)),
    (14, AttrValue::Uleb(0)),
    (16, AttrValue::Uleb(0)),
];

/// Append `value` in unsigned LEB128: 7 bits per byte, continuation bit
/// in the MSB.
pub fn push_uleb128(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn uleb128_len(mut value: u64) -> u32 {
    let mut len = 1;
    while value >= 0x80 {
        len += 1;
        value >>= 7;
    }
    len
}

fn attr_len(tag: u64, value: AttrValue) -> u32 {
    uleb128_len(tag)
        + match value {
            AttrValue::Uleb(v) => uleb128_len(v),
            AttrValue::Ntbs(s) => s.len() as u32 + 1,
        }
}

/// Encode the attributes body, padded to [`ATTRIBUTES_SIZE`].
pub fn riscv_attributes() -> Vec<u8> {
    let attrs_len: u32 = FILE_ATTRIBUTES
        .iter()
        .map(|&(tag, value)| attr_len(tag, value))
        .sum();
    // Sub-sub-section length covers its tag, the length field itself and
    // the attribute payload; the vendor length covers its own length
    // field, the vendor string and the sub-sub-section.
    let sub_len = uleb128_len(TAG_FILE) + 4 + attrs_len;
    let vendor_len = 4 + VENDOR_NAME.len() as u32 + 1 + sub_len;

    let mut out = Vec::with_capacity(ATTRIBUTES_SIZE as usize);
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&vendor_len.to_le_bytes());
    out.extend_from_slice(VENDOR_NAME.as_bytes());
    out.push(0);
    push_uleb128(&mut out, TAG_FILE);
    out.extend_from_slice(&sub_len.to_le_bytes());
    for &(tag, value) in FILE_ATTRIBUTES {
        push_uleb128(&mut out, tag);
        match value {
            AttrValue::Uleb(v) => push_uleb128(&mut out, v),
            AttrValue::Ntbs(s) => {
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
        }
    }

    out.resize(ATTRIBUTES_SIZE as usize, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uleb(value: u64) -> Vec<u8> {
        let mut out = Vec::new();
        push_uleb128(&mut out, value);
        out
    }

    #[test]
    fn uleb128_encoding() {
        assert_eq!(uleb(0), vec![0x00]);
        assert_eq!(uleb(16), vec![0x10]);
        assert_eq!(uleb(127), vec![0x7f]);
        assert_eq!(uleb(128), vec![0x80, 0x01]);
        assert_eq!(uleb(624485), vec![0xe5, 0x8e, 0x26]);
    }

    #[test]
    fn body_layout() {
        let body = riscv_attributes();
        assert_eq!(body.len(), ATTRIBUTES_SIZE as usize);
        assert_eq!(body[0], b'A');
        // Vendor subsection: length 33, "riscv\0".
        assert_eq!(&body[1..5], &33u32.to_le_bytes());
        assert_eq!(&body[5..11], b"riscv\0");
        // Tag_file sub-sub-section: tag 1, length 23.
        assert_eq!(body[11], 1);
        assert_eq!(&body[12..16], &23u32.to_le_bytes());
        // Attributes: stack align 16, arch string, three zero flags.
        assert_eq!(&body[16..18], &[4, 16]);
        assert_eq!(body[18], 5);
        assert_eq!(&body[19..28], b"rv32i2p1\0");
        assert_eq!(&body[28..34], &[6, 0, 14, 0, 16, 0]);
        // NUL padding up to the recorded size.
        assert!(body[34..].iter().all(|&b| b == 0));
    }
}
