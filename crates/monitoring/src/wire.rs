//! Binary helpers shared by the game server protocols.
//!
//! [`ByteCursor`] owns a read offset into a borrowed buffer so that packet
//! parsing stays free of socket I/O and can be tested on plain byte slices.

use crate::error::CheckError;

/// Longest VarInt the Minecraft protocol allows (32-bit value)
const VARINT_MAX_BYTES: usize = 5;

/// Encode `value` as a VarInt: 7 bits per byte, low group first, high bit
/// set on every byte but the last
pub fn encode_varint(value: i32, out: &mut Vec<u8>) {
    let mut value = value as u32;
    loop {
        if value & !0x7F == 0 {
            out.push(value as u8);
            return;
        }
        out.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
}

/// Encoded form of `value` as a fresh buffer
pub fn varint_bytes(value: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(VARINT_MAX_BYTES);
    encode_varint(value, &mut out);
    out
}

/// Incremental VarInt decoder for byte-at-a-time socket reads
#[derive(Debug, Default)]
pub struct VarIntDecoder {
    value: u32,
    read: usize,
}

impl VarIntDecoder {
    /// Feed one byte; returns the value once its last byte arrived
    pub fn push(&mut self, byte: u8) -> Result<Option<i32>, CheckError> {
        if self.read >= VARINT_MAX_BYTES {
            return Err(CheckError::protocol("VarInt is too big"));
        }
        self.value |= u32::from(byte & 0x7F) << (7 * self.read);
        self.read += 1;

        if byte & 0x80 == 0 { Ok(Some(self.value as i32)) } else { Ok(None) }
    }
}

/// Sequential reader over a received packet
#[derive(Debug)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn skip(&mut self, count: usize) -> Result<(), CheckError> {
        self.take(count).map(|_| ())
    }

    pub fn take(&mut self, count: usize) -> Result<&'a [u8], CheckError> {
        if self.remaining() < count {
            return Err(CheckError::protocol(format!(
                "Packet too short: needed {} bytes at offset {}, {} left",
                count,
                self.pos,
                self.remaining()
            )));
        }
        let bytes = &self.buf[self.pos..self.pos + count];
        self.pos += count;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, CheckError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, CheckError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, CheckError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    /// NUL terminated string, decoded lossily
    pub fn read_cstring(&mut self) -> Result<String, CheckError> {
        let rest = &self.buf[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| CheckError::protocol("Unterminated string in packet"))?;
        let value = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.pos += end + 1;
        Ok(value)
    }

    pub fn read_varint(&mut self) -> Result<i32, CheckError> {
        let mut decoder = VarIntDecoder::default();
        loop {
            if let Some(value) = decoder.push(self.read_u8()?)? {
                return Ok(value);
            }
        }
    }

    /// VarInt length prefix followed by that many UTF-8 bytes
    pub fn read_prefixed_string(&mut self) -> Result<String, CheckError> {
        let len = self.read_varint()?;
        let len = usize::try_from(len)
            .map_err(|_| CheckError::protocol(format!("Negative string length: {len}")))?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CheckError::protocol(format!("Invalid UTF-8 in packet: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_roundtrip_300() {
        let bytes = varint_bytes(300);
        assert_eq!(bytes, vec![0xAC, 0x02]);
        assert_eq!(ByteCursor::new(&bytes).read_varint().unwrap(), 300);
    }

    #[test]
    fn test_varint_zero_is_single_byte() {
        assert_eq!(varint_bytes(0), vec![0x00]);
    }

    #[test]
    fn test_varint_negative_uses_five_bytes() {
        let bytes = varint_bytes(-1);
        assert_eq!(bytes, vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
        assert_eq!(ByteCursor::new(&bytes).read_varint().unwrap(), -1);
    }

    #[test]
    fn test_varint_overflow_rejected() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let error = ByteCursor::new(&bytes).read_varint().unwrap_err();
        assert!(error.to_string().contains("VarInt is too big"));
    }

    #[test]
    fn test_cursor_sequential_reads() {
        let buf = [0x2A, 0x87, 0x69, b'h', b'i', 0x00, 0x05];
        let mut cursor = ByteCursor::new(&buf);

        assert_eq!(cursor.read_u8().unwrap(), 42);
        assert_eq!(cursor.read_u16_le().unwrap(), 0x6987);
        assert_eq!(cursor.read_cstring().unwrap(), "hi");
        assert_eq!(cursor.read_u8().unwrap(), 5);
        assert!(cursor.is_empty());
        assert!(cursor.read_u8().is_err());
    }

    #[test]
    fn test_unterminated_string() {
        let mut cursor = ByteCursor::new(b"abc");
        assert!(cursor.read_cstring().is_err());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_prefixed_string() {
        let mut buf = varint_bytes(5);
        buf.extend_from_slice(b"hello");
        assert_eq!(ByteCursor::new(&buf).read_prefixed_string().unwrap(), "hello");

        let mut short = varint_bytes(10);
        short.extend_from_slice(b"hello");
        assert!(ByteCursor::new(&short).read_prefixed_string().is_err());
    }
}
