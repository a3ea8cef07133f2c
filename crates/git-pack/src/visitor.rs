use std::ops::ControlFlow;

use git_hash::ObjectId;

use crate::ObjectKind;

/// The event contract a streaming packfile parser drives its consumer
/// through.
///
/// Every method defaults to [`ControlFlow::Continue`], so a consumer only
/// needs to implement the events it cares about. Returning
/// [`ControlFlow::Break`] from any method aborts parsing and the break
/// value is returned from [`Parser::feed`](crate::parser::Parser::feed)
/// verbatim — it is the consumer's own signal, never wrapped as a parser
/// error.
///
/// For one object, calls arrive in exactly this order: one `*_start`, zero
/// or more `*_data`, one `*_complete`. Exactly one [`packfile_header`]
/// precedes every object event, and exactly one [`packfile_complete`]
/// follows them all.
///
/// [`packfile_header`]: PackVisitor::packfile_header
/// [`packfile_complete`]: PackVisitor::packfile_complete
pub trait PackVisitor {
    /// The value threaded through a consumer-requested stop.
    type Stop;

    /// The 12-byte container header has been validated.
    fn packfile_header(&mut self, _version: u32, _entry_count: u32) -> ControlFlow<Self::Stop> {
        ControlFlow::Continue(())
    }

    /// A non-delta object's header has been decoded.
    ///
    /// `compressed_size_at_header_end` is the number of on-disk bytes
    /// consumed by the header alone (it grows further as payload bytes are
    /// consumed, up to the final value reported in `object_complete`).
    fn object_start(
        &mut self,
        _offset: u64,
        _compressed_size_at_header_end: u64,
        _kind: ObjectKind,
        _uncompressed_size: u64,
    ) -> ControlFlow<Self::Stop> {
        ControlFlow::Continue(())
    }

    /// A chunk of a non-delta object's decompressed payload.
    fn object_data(&mut self, _chunk: &[u8]) -> ControlFlow<Self::Stop> {
        ControlFlow::Continue(())
    }

    /// A non-delta object's payload has been fully decompressed.
    fn object_complete(
        &mut self,
        _compressed_size: u64,
        _crc: u32,
        _identity: ObjectId,
    ) -> ControlFlow<Self::Stop> {
        ControlFlow::Continue(())
    }

    /// A delta object's header (type, size, and base reference) has been
    /// decoded. Exactly one of `base_identity` / `base_offset` is
    /// meaningful, matching `kind`: `IdentityDelta` carries `base_identity`,
    /// `OffsetDelta` carries `base_offset` (a backward byte distance from
    /// `offset`, already resolved to an absolute position by the parser).
    fn delta_start(
        &mut self,
        _offset: u64,
        _kind: ObjectKind,
        _compressed_size_at_header_end: u64,
        _uncompressed_size: u64,
        _base_identity: Option<ObjectId>,
        _base_offset: u64,
    ) -> ControlFlow<Self::Stop> {
        ControlFlow::Continue(())
    }

    /// A chunk of a delta object's decompressed payload (the raw delta
    /// instruction stream, not yet applied against its base).
    fn delta_data(&mut self, _chunk: &[u8]) -> ControlFlow<Self::Stop> {
        ControlFlow::Continue(())
    }

    /// A delta object's payload has been fully decompressed.
    fn delta_complete(&mut self, _compressed_size: u64, _crc: u32) -> ControlFlow<Self::Stop> {
        ControlFlow::Continue(())
    }

    /// The trailing whole-stream digest has been verified.
    fn packfile_complete(&mut self, _digest: &ObjectId) -> ControlFlow<Self::Stop> {
        ControlFlow::Continue(())
    }
}

/// A [`PackVisitor`] that ignores every event. Useful for exercising the
/// parser's validation (header checks, CRC, checksum) without building a
/// real consumer.
#[derive(Debug, Default)]
pub struct NullVisitor;

impl PackVisitor for NullVisitor {
    type Stop = std::convert::Infallible;
}
