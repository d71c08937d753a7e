//! Borrowing CBOR reader: walks RFC 8949 items in place over `&[u8]`.
//!
//! Fail-closed: rejects truncated input, reserved additional-info values,
//! indefinite-length items, and invalid UTF-8 in text strings. No panics on
//! malformed input: every failure path returns a typed [`CborError`].
//!
//! The reader never copies: byte and text strings are returned as slices of
//! the input, and container headers report only their element count so that
//! callers can record byte offsets of nested items for later re-entry.
//!
//! # Item header layout
//!
//! ```text
//! [major:3 bits][info:5 bits]  info < 24  -> argument is `info`
//!                              info = 24  -> [u8]
//!                              info = 25  -> [u16be]
//!                              info = 26  -> [u32be]
//!                              info = 27  -> [u64be]
//!                              info 28-31 -> rejected
//! ```

use std::fmt;

/// One decoded CBOR item header (plus payload for strings and scalars).
///
/// `Array` and `Map` carry their element counts; their children follow
/// immediately in the stream. `Tag` is followed by exactly one tagged item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Item<'a> {
    /// Major type 0.
    Unsigned(u64),
    /// Major type 1. The encoded value is `-1 - n`.
    Negative(u64),
    /// Major type 2.
    Bytes(&'a [u8]),
    /// Major type 3.
    Text(&'a str),
    /// Major type 4: element count.
    Array(usize),
    /// Major type 5: pair count.
    Map(usize),
    /// Major type 6: tag number.
    Tag(u64),
    Bool(bool),
    Null,
    Undefined,
    /// Unassigned simple value.
    Simple(u8),
    /// Half, single, or double precision float, widened.
    Float(f64),
}

impl Item<'_> {
    /// Short diagnostic name of the item's kind.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Unsigned(_) => "unsigned integer",
            Self::Negative(_) => "negative integer",
            Self::Bytes(_) => "byte string",
            Self::Text(_) => "text string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Tag(_) => "tag",
            Self::Bool(_) => "bool",
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::Simple(_) => "simple value",
            Self::Float(_) => "float",
        }
    }
}

/// Typed failure for CBOR decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CborError {
    /// The input ended inside an item.
    Truncated { offset: usize, detail: String },
    /// The item uses an encoding this reader does not accept.
    Unsupported { offset: usize, detail: String },
    /// A text string is not valid UTF-8.
    InvalidUtf8 { offset: usize },
    /// Bytes remain after the last expected item.
    TrailingBytes { offset: usize, remaining: usize },
}

impl fmt::Display for CborError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { offset, detail } => {
                write!(f, "truncated CBOR at offset {offset}: {detail}")
            }
            Self::Unsupported { offset, detail } => {
                write!(f, "unsupported CBOR at offset {offset}: {detail}")
            }
            Self::InvalidUtf8 { offset } => {
                write!(f, "invalid UTF-8 in CBOR text string at offset {offset}")
            }
            Self::TrailingBytes { offset, remaining } => {
                write!(f, "{remaining} trailing bytes after CBOR item at offset {offset}")
            }
        }
    }
}

impl std::error::Error for CborError {}

/// Cursor over a CBOR byte stream.
///
/// Cheap to clone; cloning is how callers peek or remember a position.
#[derive(Debug, Clone)]
pub struct CborReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> CborReader<'a> {
    /// Start reading at offset 0.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Start reading at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`CborError::Truncated`] if `offset` lies past the input.
    pub fn at(data: &'a [u8], offset: usize) -> Result<Self, CborError> {
        if offset > data.len() {
            return Err(CborError::Truncated {
                offset,
                detail: format!("offset past end of {}-byte input", data.len()),
            });
        }
        Ok(Self { data, pos: offset })
    }

    /// Byte offset of the next item.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the cursor.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[must_use]
    pub const fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Fail if any bytes remain.
    ///
    /// # Errors
    ///
    /// Returns [`CborError::TrailingBytes`] when the cursor is not at the end.
    pub fn finish(&self) -> Result<(), CborError> {
        if self.is_at_end() {
            Ok(())
        } else {
            Err(CborError::TrailingBytes {
                offset: self.pos,
                remaining: self.remaining(),
            })
        }
    }

    /// Decode the next item header and advance past it.
    ///
    /// For strings the payload is consumed too; for containers and tags only
    /// the header is consumed.
    ///
    /// # Errors
    ///
    /// Returns [`CborError`] on truncation, reserved or indefinite encodings,
    /// and invalid UTF-8.
    pub fn read(&mut self) -> Result<Item<'a>, CborError> {
        let start = self.pos;
        let initial = self.take_byte(start)?;
        let major = initial >> 5;
        let info = initial & 0x1f;

        if major == 7 {
            return self.read_simple(start, info);
        }

        let arg = self.read_argument(start, info)?;
        match major {
            0 => Ok(Item::Unsigned(arg)),
            1 => Ok(Item::Negative(arg)),
            2 => {
                let len = Self::length(start, arg)?;
                Ok(Item::Bytes(self.take_slice(start, len)?))
            }
            3 => {
                let len = Self::length(start, arg)?;
                let bytes = self.take_slice(start, len)?;
                let text =
                    std::str::from_utf8(bytes).map_err(|_| CborError::InvalidUtf8 { offset: start })?;
                Ok(Item::Text(text))
            }
            4 => Ok(Item::Array(Self::length(start, arg)?)),
            5 => Ok(Item::Map(Self::length(start, arg)?)),
            _ => Ok(Item::Tag(arg)),
        }
    }

    /// Skip one complete item, including all nested children.
    ///
    /// Iterative: nesting depth does not consume stack. Container counts
    /// larger than the remaining input are rejected up front, so a forged
    /// header cannot make the walk run long.
    ///
    /// # Errors
    ///
    /// Returns [`CborError`] if any nested item is malformed.
    pub fn skip(&mut self) -> Result<(), CborError> {
        let mut pending: usize = 1;
        while pending > 0 {
            let start = self.pos;
            pending -= 1;
            let children = match self.read()? {
                Item::Array(n) => n,
                Item::Map(n) => n.checked_mul(2).ok_or_else(|| CborError::Unsupported {
                    offset: start,
                    detail: "map pair count overflows".into(),
                })?,
                Item::Tag(_) => 1,
                _ => 0,
            };
            if children > self.remaining() {
                return Err(CborError::Truncated {
                    offset: start,
                    detail: format!(
                        "container declares {children} items but only {} bytes remain",
                        self.remaining()
                    ),
                });
            }
            pending += children;
        }
        Ok(())
    }

    /// Return the raw bytes of the next complete item and advance past it.
    ///
    /// # Errors
    ///
    /// Same as [`skip`](Self::skip).
    pub fn item_bytes(&mut self) -> Result<&'a [u8], CborError> {
        let start = self.pos;
        self.skip()?;
        Ok(&self.data[start..self.pos])
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn read_simple(&mut self, start: usize, info: u8) -> Result<Item<'a>, CborError> {
        match info {
            20 => Ok(Item::Bool(false)),
            21 => Ok(Item::Bool(true)),
            22 => Ok(Item::Null),
            23 => Ok(Item::Undefined),
            24 => Ok(Item::Simple(self.take_byte(start)?)),
            25 => {
                let b = self.take_array::<2>(start)?;
                Ok(Item::Float(half_to_f64(u16::from_be_bytes(b))))
            }
            26 => {
                let b = self.take_array::<4>(start)?;
                Ok(Item::Float(f64::from(f32::from_be_bytes(b))))
            }
            27 => {
                let b = self.take_array::<8>(start)?;
                Ok(Item::Float(f64::from_be_bytes(b)))
            }
            31 => Err(CborError::Unsupported {
                offset: start,
                detail: "break marker outside indefinite-length item".into(),
            }),
            0..=19 => Ok(Item::Simple(info)),
            _ => Err(CborError::Unsupported {
                offset: start,
                detail: format!("reserved simple additional info {info}"),
            }),
        }
    }

    fn read_argument(&mut self, start: usize, info: u8) -> Result<u64, CborError> {
        match info {
            0..=23 => Ok(u64::from(info)),
            24 => Ok(u64::from(self.take_byte(start)?)),
            25 => Ok(u64::from(u16::from_be_bytes(self.take_array::<2>(start)?))),
            26 => Ok(u64::from(u32::from_be_bytes(self.take_array::<4>(start)?))),
            27 => Ok(u64::from_be_bytes(self.take_array::<8>(start)?)),
            31 => Err(CborError::Unsupported {
                offset: start,
                detail: "indefinite-length items are not accepted".into(),
            }),
            _ => Err(CborError::Unsupported {
                offset: start,
                detail: format!("reserved additional info {info}"),
            }),
        }
    }

    fn length(start: usize, arg: u64) -> Result<usize, CborError> {
        usize::try_from(arg).map_err(|_| CborError::Unsupported {
            offset: start,
            detail: format!("length {arg} does not fit in usize"),
        })
    }

    fn take_byte(&mut self, start: usize) -> Result<u8, CborError> {
        let b = *self.data.get(self.pos).ok_or_else(|| CborError::Truncated {
            offset: start,
            detail: format!("need 1 byte at offset {}", self.pos),
        })?;
        self.pos += 1;
        Ok(b)
    }

    fn take_array<const N: usize>(&mut self, start: usize) -> Result<[u8; N], CborError> {
        let slice = self.take_slice(start, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn take_slice(&mut self, start: usize, len: usize) -> Result<&'a [u8], CborError> {
        if len > self.remaining() {
            return Err(CborError::Truncated {
                offset: start,
                detail: format!(
                    "need {len} bytes at offset {} but only {} remain",
                    self.pos,
                    self.remaining()
                ),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}

/// IEEE 754 binary16 to f64 (RFC 8949 Appendix D).
fn half_to_f64(half: u16) -> f64 {
    let exp = i32::from((half >> 10) & 0x1f);
    let bits = half & 0x3ff;
    let mant = f64::from(bits);
    let magnitude = match exp {
        0 => mant * 2f64.powi(-24),
        31 if bits == 0 => f64::INFINITY,
        31 => f64::NAN,
        _ => (mant + 1024.0) * 2f64.powi(exp - 25),
    };
    if half & 0x8000 == 0 {
        magnitude
    } else {
        -magnitude
    }
}
