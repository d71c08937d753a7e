//! Minimal CBOR encoder: the inverse of [`crate::carrier::cbor`].
//!
//! Pure byte transform. Always emits the shortest argument encoding and
//! definite lengths, so every stream it produces is accepted by
//! [`CborReader`](crate::carrier::cbor::CborReader).

/// Append-only CBOR byte builder.
#[derive(Debug, Clone, Default)]
pub struct CborEncoder {
    buf: Vec<u8>,
}

impl CborEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the encoder and return the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn unsigned(&mut self, value: u64) -> &mut Self {
        self.header(0, value);
        self
    }

    /// Signed integer: major type 0 for non-negative, 1 otherwise.
    pub fn int(&mut self, value: i64) -> &mut Self {
        match u64::try_from(value) {
            Ok(v) => self.header(0, v),
            // -1 - n encoding: for value < 0, n = !value as u64.
            Err(_) => self.header(1, value.unsigned_abs() - 1),
        }
        self
    }

    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.header(2, value.len() as u64);
        self.buf.extend_from_slice(value);
        self
    }

    pub fn text(&mut self, value: &str) -> &mut Self {
        self.header(3, value.len() as u64);
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    /// Array header; the caller appends exactly `len` items.
    pub fn array(&mut self, len: usize) -> &mut Self {
        self.header(4, len as u64);
        self
    }

    /// Map header; the caller appends exactly `len` key/value pairs.
    pub fn map(&mut self, len: usize) -> &mut Self {
        self.header(5, len as u64);
        self
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.buf.push(if value { 0xf5 } else { 0xf4 });
        self
    }

    pub fn null(&mut self) -> &mut Self {
        self.buf.push(0xf6);
        self
    }

    /// Append pre-encoded item bytes verbatim.
    pub fn raw(&mut self, item: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(item);
        self
    }

    fn header(&mut self, major: u8, arg: u64) {
        let major = major << 5;
        match arg {
            0..=23 => self.buf.push(major | arg as u8),
            24..=0xff => {
                self.buf.push(major | 24);
                self.buf.push(arg as u8);
            }
            0x100..=0xffff => {
                self.buf.push(major | 25);
                self.buf.extend_from_slice(&(arg as u16).to_be_bytes());
            }
            0x1_0000..=0xffff_ffff => {
                self.buf.push(major | 26);
                self.buf.extend_from_slice(&(arg as u32).to_be_bytes());
            }
            _ => {
                self.buf.push(major | 27);
                self.buf.extend_from_slice(&arg.to_be_bytes());
            }
        }
    }
}
