pub mod ca;
pub mod card;
pub mod crypt;
pub mod der_util;
pub mod iso7816;
pub mod oid;
pub mod oids;
pub mod protocol;
pub mod sec_status;
pub mod secure_messaging;
pub mod tlv;


use std::fmt::Write;


/// Formats bytes as contiguous uppercase hexadecimal digits.
pub fn hex(bytes: &[u8]) -> String {
    let mut ret = String::with_capacity(2 * bytes.len());
    for b in bytes {
        let _ = write!(ret, "{:02X}", b);
    }
    ret
}


/// Formats bytes as a classic hex dump with offsets and printable characters, one line per 16
/// bytes.
pub fn hexdump(buf: &[u8]) -> String {
    let mut ret = String::new();
    let mut offset = 0;
    while offset < buf.len() {
        let _ = write!(ret, "{:08X}  ", offset);

        for i in 0..16 {
            if offset + i < buf.len() {
                let _ = write!(ret, " {:02X}", buf[offset + i]);
            } else {
                ret.push_str("   ");
            }
        }

        ret.push_str(" |");
        for i in 0..16 {
            if offset + i >= buf.len() {
                break;
            }

            let b = buf[offset + i];
            if b.is_ascii_graphic() || b == b' ' {
                ret.push(char::from(b));
            } else {
                ret.push('.');
            }
        }
        ret.push_str("|\n");

        offset += 16;
    }
    ret
}
