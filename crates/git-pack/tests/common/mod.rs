//! Shared helpers for building minimal, well-formed packfile byte streams.

use std::io::Write;
use std::ops::ControlFlow;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use git_hash::{hasher::Hasher as DigestHasher, HashAlgorithm, ObjectId};
use git_pack::ObjectKind;

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// Encode an entry's type+size varint header (the first bytes of every
/// entry, delta or not).
pub fn encode_type_and_size(kind_bits: u8, size: u64) -> Vec<u8> {
    let mut out = vec![(kind_bits << 4) | ((size & 0x0f) as u8)];
    let mut rest = size >> 4;
    if rest > 0 {
        *out.last_mut().unwrap() |= 0x80;
    }
    while rest > 0 {
        let mut b = (rest & 0x7f) as u8;
        rest >>= 7;
        if rest > 0 {
            b |= 0x80;
        }
        out.push(b);
    }
    out
}

/// Encode an `OffsetDelta` base specifier: the "no redundant encoding"
/// backward byte distance, as used by `git`'s own pack writer.
pub fn encode_offset_distance(distance: u64) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut ofs = distance;
    bytes.push((ofs & 0x7f) as u8);
    ofs >>= 7;
    while ofs != 0 {
        ofs -= 1;
        bytes.push((0x80 | (ofs & 0x7f)) as u8);
        ofs >>= 7;
    }
    bytes.reverse();
    bytes
}

pub enum Entry {
    Object { kind_bits: u8, data: Vec<u8> },
    OffsetDelta { distance: u64, payload: Vec<u8> },
    IdentityDelta { base: ObjectId, payload: Vec<u8> },
}

/// Build a complete, checksummed packfile containing `entries`, encoded
/// back to back after the 12-byte container header.
pub fn build_pack(algo: HashAlgorithm, entries: &[Entry]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"PACK");
    buf.extend_from_slice(&2u32.to_be_bytes());
    buf.extend_from_slice(&(entries.len() as u32).to_be_bytes());

    for entry in entries {
        match entry {
            Entry::Object { kind_bits, data } => {
                buf.extend_from_slice(&encode_type_and_size(*kind_bits, data.len() as u64));
                buf.extend_from_slice(&deflate(data));
            }
            Entry::OffsetDelta { distance, payload } => {
                buf.extend_from_slice(&encode_type_and_size(6, payload.len() as u64));
                buf.extend_from_slice(&encode_offset_distance(*distance));
                buf.extend_from_slice(&deflate(payload));
            }
            Entry::IdentityDelta { base, payload } => {
                buf.extend_from_slice(&encode_type_and_size(7, payload.len() as u64));
                buf.extend_from_slice(base.as_bytes());
                buf.extend_from_slice(&deflate(payload));
            }
        }
    }

    let mut hasher = DigestHasher::new(algo);
    hasher.update(&buf);
    let digest = hasher.finalize().unwrap();
    buf.extend_from_slice(digest.as_bytes());
    buf
}

#[derive(Debug, Clone)]
pub enum Event {
    Header(u32, u32),
    ObjectStart {
        offset: u64,
        header_len: u64,
        kind: ObjectKind,
        size: u64,
    },
    ObjectData(Vec<u8>),
    ObjectComplete {
        compressed_size: u64,
        crc: u32,
        identity: ObjectId,
    },
    DeltaStart {
        offset: u64,
        kind: ObjectKind,
        header_len: u64,
        size: u64,
        base_identity: Option<ObjectId>,
        base_offset: u64,
    },
    DeltaData(Vec<u8>),
    DeltaComplete {
        compressed_size: u64,
        crc: u32,
    },
    Complete(ObjectId),
}

#[derive(Debug, Default)]
pub struct RecordingVisitor {
    pub events: Vec<Event>,
}

impl git_pack::PackVisitor for RecordingVisitor {
    type Stop = ();

    fn packfile_header(&mut self, version: u32, entry_count: u32) -> ControlFlow<()> {
        self.events.push(Event::Header(version, entry_count));
        ControlFlow::Continue(())
    }

    fn object_start(
        &mut self,
        offset: u64,
        header_len: u64,
        kind: ObjectKind,
        size: u64,
    ) -> ControlFlow<()> {
        self.events.push(Event::ObjectStart {
            offset,
            header_len,
            kind,
            size,
        });
        ControlFlow::Continue(())
    }

    fn object_data(&mut self, chunk: &[u8]) -> ControlFlow<()> {
        self.events.push(Event::ObjectData(chunk.to_vec()));
        ControlFlow::Continue(())
    }

    fn object_complete(&mut self, compressed_size: u64, crc: u32, identity: ObjectId) -> ControlFlow<()> {
        self.events.push(Event::ObjectComplete {
            compressed_size,
            crc,
            identity,
        });
        ControlFlow::Continue(())
    }

    fn delta_start(
        &mut self,
        offset: u64,
        kind: ObjectKind,
        header_len: u64,
        size: u64,
        base_identity: Option<ObjectId>,
        base_offset: u64,
    ) -> ControlFlow<()> {
        self.events.push(Event::DeltaStart {
            offset,
            kind,
            header_len,
            size,
            base_identity,
            base_offset,
        });
        ControlFlow::Continue(())
    }

    fn delta_data(&mut self, chunk: &[u8]) -> ControlFlow<()> {
        self.events.push(Event::DeltaData(chunk.to_vec()));
        ControlFlow::Continue(())
    }

    fn delta_complete(&mut self, compressed_size: u64, crc: u32) -> ControlFlow<()> {
        self.events.push(Event::DeltaComplete {
            compressed_size,
            crc,
        });
        ControlFlow::Continue(())
    }

    fn packfile_complete(&mut self, digest: &ObjectId) -> ControlFlow<()> {
        self.events.push(Event::Complete(*digest));
        ControlFlow::Continue(())
    }
}

/// Concatenate every `ObjectData`/`DeltaData` chunk following the most
/// recent `*_start`, for assertions that don't care how payload bytes were
/// split across callback invocations.
pub fn concat_data(events: &[Event], after: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for event in &events[after..] {
        match event {
            Event::ObjectData(chunk) | Event::DeltaData(chunk) => out.extend_from_slice(chunk),
            _ => break,
        }
    }
    out
}
