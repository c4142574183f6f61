//! Value heap
//!
//! Values are read through an arena of 64-bit words plus side tables for
//! strings, byte blobs, slice headers, maps and converter callbacks. A
//! value's base is an opaque address into the word arena; every opcode
//! carries a compile-time word offset from some base. Word 0 is reserved so
//! address 0 can serve as the null pointer.
//!
//! The heap also provides the map iteration protocol: length plus an
//! iterator handle delivering key/value addresses in entry order (never
//! sorted). Iterator state packs into a single register-file word and must
//! not outlive the loop that acquired it.

use std::fmt;

/// Address of a word in the heap arena. Address 0 is null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Addr(pub u32);

impl Addr {
    /// The null address
    pub const NULL: Addr = Addr(0);

    /// Whether this is the null address
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Address `words` words past this one
    #[inline]
    pub const fn offset(self, words: u32) -> Self {
        Self(self.0 + words)
    }
}

/// Slice header: first element address and length. Element stride is a
/// compile-time property of the plan, not of the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceRep {
    /// Address of element 0
    pub base: Addr,
    /// Number of elements
    pub len: u32,
}

/// Error type a converter callback may return
pub type ConverterError = Box<dyn std::error::Error + Send + Sync>;

/// Caller-supplied value-to-JSON or value-to-text callback
pub type Converter = Box<dyn Fn() -> Result<Vec<u8>, ConverterError> + Send + Sync>;

/// Arena of words plus side tables, owned by the caller of an encode
pub struct ValueHeap {
    words: Vec<u64>,
    strings: Vec<Box<str>>,
    blobs: Vec<Vec<u8>>,
    slices: Vec<SliceRep>,
    maps: Vec<Vec<(Addr, Addr)>>,
    converters: Vec<Converter>,
}

impl Default for ValueHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueHeap {
    /// Create a heap with the reserved null entries in place.
    ///
    /// String handle 0 is the empty string (the zero value); blob, slice,
    /// map and converter handle 0 all mean nil.
    pub fn new() -> Self {
        Self {
            words: vec![0],
            strings: vec!["".into()],
            blobs: vec![Vec::new()],
            slices: vec![SliceRep { base: Addr::NULL, len: 0 }],
            maps: vec![Vec::new()],
            converters: vec![Box::new(|| Ok(Vec::new()))],
        }
    }

    // ==================== Building ====================
    //
    // Builder methods index directly: handing them a bad address is a bug
    // in the caller, not a data condition.

    /// Allocate `n` zeroed words, returning the address of the first
    pub fn alloc(&mut self, n: u32) -> Addr {
        let addr = Addr(self.words.len() as u32);
        self.words.resize(self.words.len() + n as usize, 0);
        addr
    }

    /// Write a raw word
    pub fn set_word(&mut self, addr: Addr, value: u64) {
        self.words[addr.0 as usize] = value;
    }

    /// Write a signed integer
    pub fn put_int(&mut self, addr: Addr, v: i64) {
        self.set_word(addr, v as u64);
    }

    /// Write an unsigned integer
    pub fn put_uint(&mut self, addr: Addr, v: u64) {
        self.set_word(addr, v);
    }

    /// Write a 64-bit float
    pub fn put_f64(&mut self, addr: Addr, v: f64) {
        self.set_word(addr, v.to_bits());
    }

    /// Write a 32-bit float
    pub fn put_f32(&mut self, addr: Addr, v: f32) {
        self.set_word(addr, v.to_bits() as u64);
    }

    /// Write a boolean
    pub fn put_bool(&mut self, addr: Addr, v: bool) {
        self.set_word(addr, v as u64);
    }

    /// Write a pointer (use [`Addr::NULL`] for nil)
    pub fn put_ptr(&mut self, addr: Addr, target: Addr) {
        self.set_word(addr, target.0 as u64);
    }

    /// Intern a string and write its handle
    pub fn put_str(&mut self, addr: Addr, s: impl Into<Box<str>>) {
        let h = self.add_string(s);
        self.set_word(addr, h);
    }

    /// Add a byte blob and write its handle
    pub fn put_bytes(&mut self, addr: Addr, b: Vec<u8>) {
        let h = self.add_blob(b);
        self.set_word(addr, h);
    }

    /// Add a slice header and write its handle
    pub fn put_slice(&mut self, addr: Addr, base: Addr, len: u32) {
        let h = self.add_slice(SliceRep { base, len });
        self.set_word(addr, h);
    }

    /// Add a map and write its handle
    pub fn put_map(&mut self, addr: Addr, entries: Vec<(Addr, Addr)>) {
        let h = self.add_map(entries);
        self.set_word(addr, h);
    }

    /// Add a converter callback and write its handle
    pub fn put_converter(&mut self, addr: Addr, f: Converter) {
        let h = self.add_converter(f);
        self.set_word(addr, h);
    }

    /// Add a string, returning its handle
    pub fn add_string(&mut self, s: impl Into<Box<str>>) -> u64 {
        self.strings.push(s.into());
        (self.strings.len() - 1) as u64
    }

    /// Add a byte blob, returning its handle
    pub fn add_blob(&mut self, b: Vec<u8>) -> u64 {
        self.blobs.push(b);
        (self.blobs.len() - 1) as u64
    }

    /// Add a slice header, returning its handle
    pub fn add_slice(&mut self, rep: SliceRep) -> u64 {
        self.slices.push(rep);
        (self.slices.len() - 1) as u64
    }

    /// Add a map, returning its handle
    pub fn add_map(&mut self, entries: Vec<(Addr, Addr)>) -> u64 {
        self.maps.push(entries);
        (self.maps.len() - 1) as u64
    }

    /// Add a converter callback, returning its handle
    pub fn add_converter(&mut self, f: Converter) -> u64 {
        self.converters.push(f);
        (self.converters.len() - 1) as u64
    }

    // ==================== Reading ====================
    //
    // Readers return `None` on null or out-of-range access; the interpreter
    // maps that to an internal invariant fault.

    /// Read the word at `addr` (`None` for null or out-of-range)
    #[inline]
    pub fn word(&self, addr: Addr) -> Option<u64> {
        if addr.is_null() {
            return None;
        }
        self.words.get(addr.0 as usize).copied()
    }

    /// Resolve a string handle
    #[inline]
    pub fn string(&self, handle: u64) -> Option<&str> {
        self.strings.get(handle as usize).map(|s| s.as_ref())
    }

    /// Resolve a blob handle (`None` for nil)
    #[inline]
    pub fn blob(&self, handle: u64) -> Option<&[u8]> {
        if handle == 0 {
            return None;
        }
        self.blobs.get(handle as usize).map(|b| b.as_slice())
    }

    /// Resolve a slice handle (`None` for nil)
    #[inline]
    pub fn slice(&self, handle: u64) -> Option<SliceRep> {
        if handle == 0 {
            return None;
        }
        self.slices.get(handle as usize).copied()
    }

    /// Length of a map (`None` for an unknown handle)
    #[inline]
    pub fn map_len(&self, handle: u64) -> Option<u32> {
        self.maps.get(handle as usize).map(|m| m.len() as u32)
    }

    /// Entry of a map at `pos`, in delivery order
    #[inline]
    pub fn map_entry(&self, handle: u64, pos: u32) -> Option<(Addr, Addr)> {
        self.maps.get(handle as usize)?.get(pos as usize).copied()
    }

    /// Resolve a converter handle (`None` for nil)
    #[inline]
    pub fn converter(&self, handle: u64) -> Option<&Converter> {
        if handle == 0 {
            return None;
        }
        self.converters.get(handle as usize)
    }
}

impl fmt::Debug for ValueHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueHeap")
            .field("words", &self.words.len())
            .field("strings", &(self.strings.len() - 1))
            .field("blobs", &(self.blobs.len() - 1))
            .field("slices", &(self.slices.len() - 1))
            .field("maps", &(self.maps.len() - 1))
            .field("converters", &(self.converters.len() - 1))
            .finish()
    }
}

/// Iteration handle over one map, packed into a single register-file word.
///
/// Borrowed from the heap for the duration of one loop; the register file
/// holds only the packed form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapIter {
    handle: u32,
    pos: u32,
}

impl MapIter {
    /// Start iterating the map behind `handle`
    pub fn init(handle: u32) -> Self {
        Self { handle, pos: 0 }
    }

    /// Map handle this iterator walks
    pub fn handle(self) -> u32 {
        self.handle
    }

    /// Current entry position
    pub fn pos(self) -> u32 {
        self.pos
    }

    /// Remaining length check: entries total in the underlying map
    pub fn len(self, heap: &ValueHeap) -> u32 {
        heap.map_len(self.handle as u64).unwrap_or(0)
    }

    /// Address of the current key
    pub fn key(self, heap: &ValueHeap) -> Option<Addr> {
        heap.map_entry(self.handle as u64, self.pos).map(|(k, _)| k)
    }

    /// Address of the current value
    pub fn value(self, heap: &ValueHeap) -> Option<Addr> {
        heap.map_entry(self.handle as u64, self.pos).map(|(_, v)| v)
    }

    /// Advance to the next entry
    pub fn advance(&mut self) {
        self.pos += 1;
    }

    /// Pack into one register-file word
    #[inline]
    pub fn pack(self) -> u64 {
        ((self.handle as u64) << 32) | self.pos as u64
    }

    /// Unpack from a register-file word
    #[inline]
    pub fn unpack(word: u64) -> Self {
        Self {
            handle: (word >> 32) as u32,
            pos: word as u32,
        }
    }
}
