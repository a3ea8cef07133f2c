use std::ops::ControlFlow;

use crc32fast::Hasher as Crc32;
use git_hash::hasher::Hasher as DigestHasher;

use crate::{ObjectKind, PackVisitor, ParseError};

use super::{DeltaBaseProgress, InFlightHeader, Parser, PayloadState, Record, State};

impl<V: PackVisitor> Parser<V> {
    /// Decode the variable-length type+size prefix of one entry, one byte
    /// at a time: the first byte's bits [6:4] are the kind, bits [3:0] seed
    /// the size; each following byte while the high bit is set contributes
    /// its low 7 bits to the size at the next 7-bit shift.
    pub(super) fn step_object_header(
        &mut self,
        data: &[u8],
    ) -> Result<(usize, ControlFlow<V::Stop>), ParseError> {
        let mut consumed = 0usize;

        loop {
            if consumed >= data.len() {
                return Ok((consumed, ControlFlow::Continue(())));
            }
            let byte = data[consumed];

            if matches!(self.state, State::ObjectHeaderStart) {
                let start_offset = self.position + consumed as u64;
                let kind = ObjectKind::from_type_bits((byte >> 4) & 0x07)?;
                let mut crc = Crc32::new();
                crc.update(&[byte]);
                self.state = State::ObjectHeader(InFlightHeader {
                    start_offset,
                    kind,
                    size: (byte & 0x0f) as u64,
                    shift: 4,
                    compressed_size: 1,
                    crc,
                });
                consumed += 1;
                if byte & 0x80 == 0 {
                    let flow = self.finish_object_header()?;
                    return Ok((consumed, flow));
                }
                continue;
            }

            let header = match &mut self.state {
                State::ObjectHeader(header) => header,
                _ => return Err(ParseError::Inconsistent),
            };

            let contribution = ((byte & 0x7f) as u64)
                .checked_shl(header.shift)
                .ok_or(ParseError::SizeOverflow)?;
            header.size = header
                .size
                .checked_add(contribution)
                .ok_or(ParseError::SizeOverflow)?;
            header.compressed_size += 1;
            header.crc.update(&[byte]);
            header.shift = header.shift.checked_add(7).ok_or(ParseError::SizeOverflow)?;
            consumed += 1;

            if byte & 0x80 == 0 {
                let flow = self.finish_object_header()?;
                return Ok((consumed, flow));
            }
        }
    }

    /// Called once the header's terminator byte (MSB clear) has been seen.
    fn finish_object_header(&mut self) -> Result<ControlFlow<V::Stop>, ParseError> {
        let header = match std::mem::replace(&mut self.state, State::Failed) {
            State::ObjectHeader(header) => header,
            _ => return Err(ParseError::Inconsistent),
        };

        if header.kind.is_delta() {
            let base = if matches!(header.kind, ObjectKind::OffsetDelta) {
                DeltaBaseProgress::Offset { value: 0, shift: 0 }
            } else {
                DeltaBaseProgress::Identity {
                    buf: Vec::with_capacity(self.algo.digest_len()),
                    width: self.algo.digest_len(),
                }
            };
            self.state = State::DeltaHeader { header, base };
            return Ok(ControlFlow::Continue(()));
        }

        let type_name = header
            .kind
            .type_name()
            .expect("non-delta kind always has a type name");
        let mut identity_hash = DigestHasher::new(self.algo);
        identity_hash.update(format!("{type_name} {}\0", header.size).as_bytes());

        let record = Record {
            start_offset: header.start_offset,
            kind: header.kind,
            uncompressed_size: header.size,
            compressed_size: header.compressed_size,
            crc: header.crc,
        };

        let flow = self.visitor.object_start(
            record.start_offset,
            record.compressed_size,
            record.kind,
            record.uncompressed_size,
        );

        self.state = State::Payload(PayloadState {
            record,
            base: None,
            inflate: None,
            identity_hash: Some(identity_hash),
            finished: false,
        });

        Ok(flow)
    }
}
