//! Opcode stream storage
//!
//! Bodies are emitted into fixed-size segments so that appending never
//! moves bytes already written. A finalized body with a single segment is
//! contiguous and can be exposed to native code without copying.

/// Default segment size for [`IlStream`]
pub const DEFAULT_SEGMENT_SIZE: usize = 256;

/// Finalized opcode bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IlCode {
    /// One contiguous buffer
    Contiguous(Box<[u8]>),
    /// Several buffers in order; concatenated they form the body
    Segmented(Vec<Box<[u8]>>),
}

impl IlCode {
    /// Total length in bytes
    pub fn len(&self) -> usize {
        match self {
            IlCode::Contiguous(bytes) => bytes.len(),
            IlCode::Segmented(segments) => segments.iter().map(|s| s.len()).sum(),
        }
    }

    /// Check for an empty body
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The bytes, when they already live in one buffer
    pub fn as_contiguous(&self) -> Option<&[u8]> {
        match self {
            IlCode::Contiguous(bytes) => Some(bytes),
            IlCode::Segmented(_) => None,
        }
    }

    /// Copy the bytes into one buffer
    pub fn to_contiguous(&self) -> Box<[u8]> {
        match self {
            IlCode::Contiguous(bytes) => bytes.clone(),
            IlCode::Segmented(segments) => segments.concat().into_boxed_slice(),
        }
    }

    /// Iterate over the underlying buffers in order
    pub fn segments(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let (single, many): (Option<&[u8]>, &[Box<[u8]>]) = match self {
            IlCode::Contiguous(bytes) => (Some(&bytes[..]), &[]),
            IlCode::Segmented(segments) => (None, segments),
        };
        single.into_iter().chain(many.iter().map(|s| &s[..]))
    }
}

/// Append-only opcode writer
#[derive(Debug)]
pub struct IlStream {
    segments: Vec<Vec<u8>>,
    segment_size: usize,
    len: usize,
}

impl IlStream {
    /// Writer with [`DEFAULT_SEGMENT_SIZE`] segments
    pub fn new() -> Self {
        Self::with_segment_size(DEFAULT_SEGMENT_SIZE)
    }

    /// Writer that starts a new segment every `segment_size` bytes
    pub fn with_segment_size(segment_size: usize) -> Self {
        IlStream {
            segments: Vec::new(),
            segment_size: segment_size.max(1),
            len: 0,
        }
    }

    /// Writer that never splits the body
    pub fn contiguous() -> Self {
        Self::with_segment_size(usize::MAX)
    }

    /// Append raw bytes
    pub fn emit(&mut self, mut bytes: &[u8]) {
        self.len += bytes.len();
        while !bytes.is_empty() {
            let full = self
                .segments
                .last()
                .map_or(true, |segment| segment.len() >= self.segment_size);
            if full {
                let capacity = self.segment_size.min(bytes.len().max(64));
                self.segments.push(Vec::with_capacity(capacity));
            }
            let last = self.segments.len() - 1;
            let segment = &mut self.segments[last];
            let room = self.segment_size - segment.len();
            let (head, tail) = bytes.split_at(room.min(bytes.len()));
            segment.extend_from_slice(head);
            bytes = tail;
        }
    }

    /// Append one byte
    pub fn emit_u8(&mut self, value: u8) {
        self.emit(&[value]);
    }

    /// Append a little-endian u16
    pub fn emit_u16(&mut self, value: u16) {
        self.emit(&value.to_le_bytes());
    }

    /// Append a little-endian u32
    pub fn emit_u32(&mut self, value: u32) {
        self.emit(&value.to_le_bytes());
    }

    /// Append a little-endian i32
    pub fn emit_i32(&mut self, value: i32) {
        self.emit(&value.to_le_bytes());
    }

    /// Current length, i.e. the offset of the next emitted byte
    pub fn offset(&self) -> usize {
        self.len
    }

    /// Number of segments written so far
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Freeze the stream
    pub fn into_code(self) -> IlCode {
        let mut segments: Vec<Box<[u8]>> = self
            .segments
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(Vec::into_boxed_slice)
            .collect();
        match segments.len() {
            0 => IlCode::Contiguous(Box::default()),
            1 => IlCode::Contiguous(segments.remove(0)),
            _ => IlCode::Segmented(segments),
        }
    }
}

impl Default for IlStream {
    fn default() -> Self {
        Self::new()
    }
}
