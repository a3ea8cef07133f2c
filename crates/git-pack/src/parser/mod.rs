//! The streaming driver: state machine, byte accounting, and the two
//! concurrent hashes (whole-stream checksum and per-object identity).

mod delta_header;
mod header;
mod object_header;
mod payload;
mod trailer;

use std::ops::ControlFlow;

use crc32fast::Hasher as Crc32;
use flate2::Decompress;
use git_hash::{hasher::Hasher as DigestHasher, HashAlgorithm, ObjectId};

use crate::{ObjectKind, PackVisitor, ParseError};

/// Output chunk size used while draining the per-object decompression
/// stream. Not part of the wire contract — purely a latency/call-overhead
/// tradeoff.
const PAYLOAD_CHUNK_SIZE: usize = 256 * 1024;

/// Fields accumulated while decoding one entry's variable-length
/// type+size prefix (and, for deltas, continuing to accumulate through the
/// base specifier that follows it).
struct InFlightHeader {
    start_offset: u64,
    kind: ObjectKind,
    size: u64,
    shift: u32,
    compressed_size: u64,
    crc: Crc32,
}

/// The base reference of a delta object, as it's still being decoded.
enum DeltaBaseProgress {
    /// `OffsetDelta`: a self-delimiting big-endian varint, one 7-bit group
    /// per byte, MSB-set meaning "more bytes follow".
    Offset { value: u64, shift: u32 },
    /// `IdentityDelta`: a fixed-width digest, `identity_width` bytes
    /// copied in verbatim.
    Identity { buf: Vec<u8>, width: usize },
}

/// A completed entry header, ready to start (or resume) streaming its
/// compressed payload.
struct Record {
    start_offset: u64,
    kind: ObjectKind,
    uncompressed_size: u64,
    compressed_size: u64,
    crc: Crc32,
}

/// The resolved base reference of a delta entry, known once its header has
/// been fully decoded.
enum DeltaBase {
    Offset(u64),
    Identity(ObjectId),
}

/// State while streaming one entry's compressed payload through deflate.
struct PayloadState {
    record: Record,
    /// `Some` for a delta entry, `None` for a plain object.
    base: Option<DeltaBase>,
    /// `None` until the first byte of this payload arrives — mirrors the
    /// `_START` sub-states of the spec's state machine, whose only job is
    /// triggering one-time setup.
    inflate: Option<Decompress>,
    /// The per-object identity hash. Only present for non-delta payloads;
    /// deltas never get an identity of their own here.
    identity_hash: Option<DigestHasher>,
    /// Set once decompression has reached end-of-stream. A consumer callback
    /// may ask to stop on the very pass that reaches end-of-stream, in which
    /// case the `*_complete` callback must wait for the next call into this
    /// state rather than fire immediately alongside the broken-out-of data
    /// callback.
    finished: bool,
}

struct TrailerState {
    buf: Vec<u8>,
    width: usize,
}

enum State {
    Header { buf: Vec<u8> },
    ObjectHeaderStart,
    ObjectHeader(InFlightHeader),
    DeltaHeader {
        header: InFlightHeader,
        base: DeltaBaseProgress,
    },
    Payload(PayloadState),
    Trailer(TrailerState),
    Complete,
    /// Sticky terminal state entered on any error.
    Failed,
}

/// Outcome of draining a single feed() call to completion.
pub type FeedOutcome<S> = ControlFlow<S>;

/// A streaming packfile parser.
///
/// Construct with [`Parser::new`], push bytes with [`Parser::feed`] as they
/// arrive (a file read, a socket read, a whole buffer at once — any
/// partitioning yields identical events), and call [`Parser::finish`] once
/// the input is exhausted to confirm the packfile was fully consumed.
///
/// A `Parser` owns its [`PackVisitor`] consumer and the two hash contexts
/// (whole-stream checksum, per-object identity) and decompression stream
/// needed while a payload is in flight; all three are released when the
/// parser is dropped.
pub struct Parser<V: PackVisitor> {
    state: State,
    visitor: V,
    algo: HashAlgorithm,
    position: u64,
    entries_total: u32,
    entries_done: u32,
    whole_stream_hash: Option<DigestHasher>,
}

impl<V: PackVisitor> Parser<V> {
    /// Create a parser for the given digest algorithm, bound to `visitor`
    /// for the rest of its lifetime.
    pub fn new(algo: HashAlgorithm, visitor: V) -> Self {
        Self {
            state: State::Header {
                buf: Vec::with_capacity(crate::PACK_HEADER_SIZE),
            },
            visitor,
            algo,
            position: 0,
            entries_total: 0,
            entries_done: 0,
            whole_stream_hash: Some(DigestHasher::new(algo)),
        }
    }

    /// Total bytes consumed so far (the absolute position of the next
    /// unconsumed byte).
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether the parser has reached its terminal success state.
    pub fn is_complete(&self) -> bool {
        matches!(self.state, State::Complete)
    }

    /// Whether the parser has permanently failed.
    pub fn is_failed(&self) -> bool {
        matches!(self.state, State::Failed)
    }

    /// Borrow the visitor.
    pub fn visitor(&self) -> &V {
        &self.visitor
    }

    /// Mutably borrow the visitor.
    pub fn visitor_mut(&mut self) -> &mut V {
        &mut self.visitor
    }

    /// Consume the parser and recover the visitor.
    pub fn into_visitor(self) -> V {
        self.visitor
    }

    /// Release the parser's hash contexts and any in-flight decompression
    /// stream.
    ///
    /// Dropping a `Parser` does the same thing; this method exists so
    /// callers can free resources explicitly without waiting for the value
    /// to go out of scope, and to give the operation a name that matches
    /// the rest of this type's vocabulary. Safe to call in any state,
    /// including `Failed`.
    pub fn dispose(self) {
        drop(self);
    }

    /// Feed the next chunk of packfile bytes.
    ///
    /// `data` may be any length, including zero. Internally this drains
    /// `data` across as many state transitions as it takes, mixing every
    /// consumed byte into the whole-stream hash (except while reading the
    /// trailer itself) and invoking [`PackVisitor`] callbacks at the
    /// boundaries described there.
    ///
    /// Returns `Ok(ControlFlow::Break(stop))` the instant a callback
    /// returns `Break` — parsing stops immediately, the bytes not yet
    /// consumed from `data` are discarded, and `stop` is handed back
    /// verbatim. A later `feed` call resumes normally from the parser's
    /// current state; it does not see the discarded bytes again unless the
    /// caller resubmits them.
    pub fn feed(&mut self, mut data: &[u8]) -> Result<FeedOutcome<V::Stop>, ParseError> {
        if matches!(self.state, State::Failed) {
            return Err(ParseError::AlreadyFailed);
        }
        if matches!(self.state, State::Complete) {
            if data.is_empty() {
                return Ok(ControlFlow::Continue(()));
            }
            self.state = State::Failed;
            return Err(ParseError::DataAfterCompletion);
        }

        while !data.is_empty() {
            let start_in_trailer = matches!(self.state, State::Trailer(_));

            let (consumed, flow) = match self.step(data) {
                Ok(pair) => pair,
                Err(err) => {
                    self.state = State::Failed;
                    return Err(err);
                }
            };
            debug_assert!(consumed <= data.len());

            if !start_in_trailer {
                if let Some(hash) = self.whole_stream_hash.as_mut() {
                    hash.update(&data[..consumed]);
                }
            }
            self.position += consumed as u64;
            data = &data[consumed..];

            if let ControlFlow::Break(stop) = flow {
                return Ok(ControlFlow::Break(stop));
            }
        }

        Ok(ControlFlow::Continue(()))
    }

    /// Confirm the packfile was fully parsed.
    ///
    /// Succeeds only once [`Parser::is_complete`] is true. A parser that
    /// has failed reports [`ParseError::AlreadyFailed`]; anything else
    /// still in progress reports [`ParseError::TruncatedInput`] — calling
    /// `finish` too early does not itself corrupt the parser, so feeding
    /// more bytes and retrying is valid.
    pub fn finish(&self) -> Result<(), ParseError> {
        match self.state {
            State::Complete => Ok(()),
            State::Failed => Err(ParseError::AlreadyFailed),
            _ => Err(ParseError::TruncatedInput),
        }
    }

    /// Dispatch to the sub-parser for the current state, returning how
    /// many bytes of `data` it consumed and whether the visitor asked to
    /// stop.
    fn step(
        &mut self,
        data: &[u8],
    ) -> Result<(usize, ControlFlow<V::Stop>), ParseError> {
        match &self.state {
            State::Header { .. } => self.step_header(data),
            State::ObjectHeaderStart | State::ObjectHeader(_) => self.step_object_header(data),
            State::DeltaHeader { .. } => self.step_delta_header(data),
            State::Payload(_) => self.step_payload(data),
            State::Trailer(_) => self.step_trailer(data),
            State::Complete | State::Failed => Err(ParseError::Inconsistent),
        }
    }

    /// Called by the object-header and delta-header sub-parsers once an
    /// entry's base has been fully decoded: decides whether the next entry
    /// starts or the trailer begins, based on how many entries remain.
    fn advance_past_entry(&mut self) {
        self.entries_done += 1;
        self.state = if self.entries_done < self.entries_total {
            State::ObjectHeaderStart
        } else {
            State::Trailer(TrailerState {
                buf: Vec::with_capacity(self.algo.digest_len()),
                width: self.algo.digest_len(),
            })
        };
    }
}
