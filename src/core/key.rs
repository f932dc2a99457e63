//! Embedded key convention for allocation-free symbol probing
//!
//! Decoders read symbol characters straight into a reusable UTF-16 buffer and
//! reserve a fixed header in front of them. The header carries two magic
//! units that can never start valid UTF-16 text (both are low surrogates),
//! the content length and the content hash:
//!
//! ```text
//! [0] KEY_MAGIC0  [1] KEY_MAGIC1  [2] len >> 16  [3] len  [4] hash >> 16  [5] hash  [6..] content
//! ```
//!
//! The layout is shared with every buffer pool that hands buffers to both the
//! cache and other decoder code, so it must not change.

/// Value of the first unit in an embedded key buffer (UTF-16 low surrogate)
pub const KEY_MAGIC0: u16 = 0xDFFE;
/// Value of the second unit in an embedded key buffer (another low surrogate)
pub const KEY_MAGIC1: u16 = 0xDFFF;
/// Length of the header in an embedded key buffer
pub const KEY_HEADER_SIZE: usize = 6;

/// Embedded key content that can't become a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("Unpaired surrogate at unit {position} of key content")]
    InvalidUtf16 { position: usize },
    #[error("Key header hash {header:#010x} does not match content hash {content:#010x}")]
    HashMismatch { header: i32, content: i32 },
}

/// 31-polynomial hash over UTF-16 units (`h = 31 * h + unit`)
#[inline]
pub fn symbol_hash_units(units: &[u16]) -> i32 {
    let mut hash: i32 = 0;
    for &unit in units {
        hash = hash.wrapping_mul(31).wrapping_add(unit as i32);
    }
    hash
}

/// Same hash as [`symbol_hash_units`] computed over a string's UTF-16 form
#[inline]
pub fn symbol_hash(symbol: &str) -> i32 {
    let mut hash: i32 = 0;
    for unit in symbol.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(unit as i32);
    }
    hash
}

/// True when `chars` carries an embedded header and content starts at `offset`
#[inline]
pub fn is_key(chars: &[u16], offset: usize) -> bool {
    offset == KEY_HEADER_SIZE
        && chars.len() >= KEY_HEADER_SIZE
        && chars[0] == KEY_MAGIC0
        && chars[1] == KEY_MAGIC1
}

/// Write the header for `length` content units already stored at
/// `chars[KEY_HEADER_SIZE..]`.
///
/// # Panics
/// When the buffer is shorter than the header plus `length`.
pub fn embed_key(chars: &mut [u16], length: usize) -> &mut [u16] {
    assert!(
        chars.len() >= KEY_HEADER_SIZE + length,
        "key buffer too small: {} < {}",
        chars.len(),
        KEY_HEADER_SIZE + length
    );
    let length = length as u32;
    let hash = symbol_hash_units(&chars[KEY_HEADER_SIZE..KEY_HEADER_SIZE + length as usize]) as u32;
    chars[0] = KEY_MAGIC0;
    chars[1] = KEY_MAGIC1;
    chars[2] = (length >> 16) as u16;
    chars[3] = length as u16;
    chars[4] = (hash >> 16) as u16;
    chars[5] = hash as u16;
    chars
}

#[inline(always)]
pub fn length_from_key(chars: &[u16]) -> usize {
    ((chars[2] as usize) << 16) | chars[3] as usize
}

#[inline(always)]
pub fn hash_from_key(chars: &[u16]) -> i32 {
    (((chars[4] as u32) << 16) | chars[5] as u32) as i32
}

/// Content units of an embedded key
#[inline]
pub fn content_from_key(chars: &[u16]) -> &[u16] {
    &chars[KEY_HEADER_SIZE..KEY_HEADER_SIZE + length_from_key(chars)]
}

/// Materialize the key content (allocates; used only on cache misses)
///
/// Fails when the content is not valid UTF-16 or when the header hash was
/// not computed over the content.
pub fn string_from_key(chars: &[u16]) -> Result<String, KeyError> {
    let content = content_from_key(chars);
    let (header, hash) = (hash_from_key(chars), symbol_hash_units(content));
    if header != hash {
        return Err(KeyError::HashMismatch {
            header,
            content: hash,
        });
    }
    let mut symbol = String::with_capacity(content.len());
    let mut position = 0;
    for decoded in char::decode_utf16(content.iter().copied()) {
        let c = decoded.map_err(|_| KeyError::InvalidUtf16 { position })?;
        position += c.len_utf16();
        symbol.push(c);
    }
    Ok(symbol)
}

/// Compare a string with embedded key content without allocating
#[inline]
pub fn equals_with_key(s: &str, chars: &[u16]) -> bool {
    let content = content_from_key(chars);
    let mut units = s.encode_utf16();
    for &unit in content {
        if units.next() != Some(unit) {
            return false;
        }
    }
    units.next().is_none()
}

/// Reusable, caller-owned key buffer
///
/// After the first few symbols the backing vector stops growing, so embedding
/// and probing runs without allocation.
#[derive(Debug, Clone)]
pub struct KeyBuffer {
    chars: Vec<u16>,
}

impl KeyBuffer {
    pub fn new() -> Self {
        Self::with_capacity(32)
    }

    /// Buffer able to hold `content_capacity` units without growing
    pub fn with_capacity(content_capacity: usize) -> Self {
        let mut chars = Vec::with_capacity(KEY_HEADER_SIZE + content_capacity);
        chars.resize(KEY_HEADER_SIZE, 0);
        Self { chars }
    }

    /// Embed a string and return the key view
    pub fn embed_str(&mut self, symbol: &str) -> &[u16] {
        self.chars.truncate(KEY_HEADER_SIZE);
        self.chars.extend(symbol.encode_utf16());
        self.seal()
    }

    /// Embed raw UTF-16 units (as read off the wire) and return the key view
    pub fn embed_units(&mut self, units: &[u16]) -> &[u16] {
        self.chars.truncate(KEY_HEADER_SIZE);
        self.chars.extend_from_slice(units);
        self.seal()
    }

    fn seal(&mut self) -> &[u16] {
        let length = self.chars.len() - KEY_HEADER_SIZE;
        embed_key(&mut self.chars, length);
        &self.chars
    }

    /// Current key view (header included)
    #[inline]
    pub fn as_key(&self) -> &[u16] {
        &self.chars
    }

    #[inline]
    pub fn content_len(&self) -> usize {
        self.chars.len() - KEY_HEADER_SIZE
    }

    /// Units the buffer can hold before it has to grow
    #[inline]
    pub fn content_capacity(&self) -> usize {
        self.chars.capacity() - KEY_HEADER_SIZE
    }
}

impl Default for KeyBuffer {
    fn default() -> Self {
        Self::new()
    }
}
