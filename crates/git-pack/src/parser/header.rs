use std::ops::ControlFlow;

use crate::{PackVisitor, ParseError, PACK_HEADER_SIZE, PACK_SIGNATURE, PACK_VERSION};

use super::{Parser, State, TrailerState};

impl<V: PackVisitor> Parser<V> {
    /// Accumulate the 12-byte container header, then validate and emit it.
    pub(super) fn step_header(
        &mut self,
        data: &[u8],
    ) -> Result<(usize, ControlFlow<V::Stop>), ParseError> {
        let buf = match &mut self.state {
            State::Header { buf } => buf,
            _ => return Err(ParseError::Inconsistent),
        };

        let need = PACK_HEADER_SIZE - buf.len();
        let take = need.min(data.len());
        buf.extend_from_slice(&data[..take]);

        if buf.len() < PACK_HEADER_SIZE {
            return Ok((take, ControlFlow::Continue(())));
        }

        let buf = match std::mem::replace(&mut self.state, State::Failed) {
            State::Header { buf } => buf,
            _ => unreachable!("state checked above"),
        };

        if buf[0..4] != PACK_SIGNATURE[..] {
            return Err(ParseError::InvalidSignature);
        }
        let version = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        if version != PACK_VERSION {
            return Err(ParseError::UnsupportedVersion(version));
        }
        let entry_count = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);

        self.entries_total = entry_count;
        self.entries_done = 0;

        let flow = self.visitor.packfile_header(version, entry_count);

        self.state = if entry_count > 0 {
            State::ObjectHeaderStart
        } else {
            State::Trailer(TrailerState {
                buf: Vec::with_capacity(self.algo.digest_len()),
                width: self.algo.digest_len(),
            })
        };

        Ok((take, flow))
    }
}
