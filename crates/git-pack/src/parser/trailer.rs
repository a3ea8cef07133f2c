use std::ops::ControlFlow;

use git_hash::ObjectId;

use crate::{PackVisitor, ParseError};

use super::{Parser, State};

impl<V: PackVisitor> Parser<V> {
    /// Accumulate the trailing whole-stream digest and compare it against
    /// the hash computed over every prior byte (the trailer's own bytes
    /// are never mixed into that hash — the driver skips the update for
    /// any step that started in this state).
    pub(super) fn step_trailer(
        &mut self,
        data: &[u8],
    ) -> Result<(usize, ControlFlow<V::Stop>), ParseError> {
        let (buf, width) = match &mut self.state {
            State::Trailer(trailer) => (&mut trailer.buf, trailer.width),
            _ => return Err(ParseError::Inconsistent),
        };

        let need = width - buf.len();
        let take = need.min(data.len());
        buf.extend_from_slice(&data[..take]);

        if buf.len() < width {
            return Ok((take, ControlFlow::Continue(())));
        }

        let trailer_buf = match std::mem::replace(&mut self.state, State::Failed) {
            State::Trailer(trailer) => trailer.buf,
            _ => unreachable!("state checked above"),
        };

        let hasher = self
            .whole_stream_hash
            .take()
            .expect("whole-stream hash initialized at construction and taken only here");
        let computed: ObjectId = hasher.finalize()?;

        if computed.as_bytes() != trailer_buf.as_slice() {
            return Err(ParseError::ChecksumMismatch);
        }

        let flow = self.visitor.packfile_complete(&computed);
        self.state = State::Complete;

        Ok((take, flow))
    }
}

