use std::ops::ControlFlow;

use git_hash::ObjectId;

use crate::{ObjectKind, PackVisitor, ParseError};

use super::{DeltaBase, DeltaBaseProgress, Parser, PayloadState, Record, State};

impl<V: PackVisitor> Parser<V> {
    /// Decode the base specifier that follows a delta entry's type+size
    /// prefix: a backward byte offset for `OffsetDelta`, or a raw digest
    /// for `IdentityDelta`.
    pub(super) fn step_delta_header(
        &mut self,
        data: &[u8],
    ) -> Result<(usize, ControlFlow<V::Stop>), ParseError> {
        let is_offset = match &self.state {
            State::DeltaHeader { base, .. } => matches!(base, DeltaBaseProgress::Offset { .. }),
            _ => return Err(ParseError::Inconsistent),
        };

        if is_offset {
            self.step_offset_delta_header(data)
        } else {
            self.step_identity_delta_header(data)
        }
    }

    /// `offset = byte & 0x7f` on the first byte; thereafter
    /// `offset = ((offset + 1) << 7) | (byte & 0x7f)` — the "no redundant
    /// encoding" form used by offset deltas.
    fn step_offset_delta_header(
        &mut self,
        data: &[u8],
    ) -> Result<(usize, ControlFlow<V::Stop>), ParseError> {
        let mut consumed = 0usize;

        loop {
            if consumed >= data.len() {
                return Ok((consumed, ControlFlow::Continue(())));
            }
            let byte = data[consumed];

            let (header, base) = match &mut self.state {
                State::DeltaHeader { header, base } => (header, base),
                _ => return Err(ParseError::Inconsistent),
            };
            let (value, shift) = match base {
                DeltaBaseProgress::Offset { value, shift } => (value, shift),
                _ => return Err(ParseError::Inconsistent),
            };

            if *shift == 0 {
                *value = (byte & 0x7f) as u64;
            } else {
                let grown = value.checked_add(1).ok_or(ParseError::OffsetOverflow)?;
                if grown > (u64::MAX >> 7) {
                    return Err(ParseError::OffsetOverflow);
                }
                *value = (grown << 7) | (byte & 0x7f) as u64;
            }
            *shift += 7;
            header.crc.update(&[byte]);
            header.compressed_size += 1;
            consumed += 1;

            if byte & 0x80 == 0 {
                let distance = *value;
                let flow = self.finish_delta_header_offset(distance)?;
                return Ok((consumed, flow));
            }
        }
    }

    fn finish_delta_header_offset(
        &mut self,
        distance: u64,
    ) -> Result<ControlFlow<V::Stop>, ParseError> {
        let header = match std::mem::replace(&mut self.state, State::Failed) {
            State::DeltaHeader { header, .. } => header,
            _ => return Err(ParseError::Inconsistent),
        };

        let base_offset = header
            .start_offset
            .checked_sub(distance)
            .ok_or(ParseError::InvalidBaseOffset {
                entry_offset: header.start_offset,
                base_offset: distance,
            })?;

        self.finish_delta_header(header, DeltaBase::Offset(base_offset), base_offset, None)
    }

    /// Copy `identity_width` bytes verbatim into the base digest.
    fn step_identity_delta_header(
        &mut self,
        data: &[u8],
    ) -> Result<(usize, ControlFlow<V::Stop>), ParseError> {
        let (header, buf, width) = match &mut self.state {
            State::DeltaHeader {
                header,
                base: DeltaBaseProgress::Identity { buf, width },
            } => (header, buf, *width),
            _ => return Err(ParseError::Inconsistent),
        };

        let need = width - buf.len();
        let take = need.min(data.len());
        buf.extend_from_slice(&data[..take]);
        header.crc.update(&data[..take]);
        header.compressed_size += take as u64;

        if buf.len() < width {
            return Ok((take, ControlFlow::Continue(())));
        }

        let (header, buf) = match std::mem::replace(&mut self.state, State::Failed) {
            State::DeltaHeader {
                header,
                base: DeltaBaseProgress::Identity { buf, .. },
            } => (header, buf),
            _ => return Err(ParseError::Inconsistent),
        };
        let base_identity = ObjectId::from_bytes(&buf, self.algo)?;

        let flow = self.finish_delta_header(
            header,
            DeltaBase::Identity(base_identity),
            0,
            Some(base_identity),
        )?;
        Ok((take, flow))
    }

    fn finish_delta_header(
        &mut self,
        header: super::InFlightHeader,
        base: DeltaBase,
        base_offset_field: u64,
        base_identity_field: Option<ObjectId>,
    ) -> Result<ControlFlow<V::Stop>, ParseError> {
        debug_assert!(matches!(
            header.kind,
            ObjectKind::OffsetDelta | ObjectKind::IdentityDelta
        ));

        let record = Record {
            start_offset: header.start_offset,
            kind: header.kind,
            uncompressed_size: header.size,
            compressed_size: header.compressed_size,
            crc: header.crc,
        };

        let flow = self.visitor.delta_start(
            record.start_offset,
            record.kind,
            record.compressed_size,
            record.uncompressed_size,
            base_identity_field,
            base_offset_field,
        );

        self.state = State::Payload(PayloadState {
            record,
            base: Some(base),
            inflate: None,
            identity_hash: None,
            finished: false,
        });

        Ok(flow)
    }
}
