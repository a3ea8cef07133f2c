use std::ops::ControlFlow;

use flate2::{Decompress, FlushDecompress, Status};

use crate::{PackVisitor, ParseError};

use super::{Parser, State, PAYLOAD_CHUNK_SIZE};

impl<V: PackVisitor> Parser<V> {
    /// Stream compressed payload bytes through deflate, for both non-delta
    /// and delta entries. The decompression stream is created lazily on
    /// the first call (the `_START` sub-state of the spec's machine); end
    /// of stream is whatever the decompressor reports, never the
    /// declared `uncompressed_size` — a truncated or overlong declared
    /// size does not by itself cause an error.
    pub(super) fn step_payload(
        &mut self,
        data: &[u8],
    ) -> Result<(usize, ControlFlow<V::Stop>), ParseError> {
        let mut payload = match std::mem::replace(&mut self.state, State::Failed) {
            State::Payload(payload) => payload,
            other => {
                self.state = other;
                return Err(ParseError::Inconsistent);
            }
        };

        let is_delta = payload.base.is_some();
        let mut consumed_in = 0usize;

        if !payload.finished {
            if payload.inflate.is_none() {
                payload.inflate = Some(Decompress::new(true));
            }

            let mut out = vec![0u8; PAYLOAD_CHUNK_SIZE];
            let mut end_of_stream = false;
            let mut flow = ControlFlow::Continue(());

            loop {
                let inflate = payload.inflate.as_mut().expect("initialized above");
                let in_before = inflate.total_in();
                let out_before = inflate.total_out();
                let status = inflate
                    .decompress(&data[consumed_in..], &mut out, FlushDecompress::None)
                    .map_err(ParseError::DecompressionFailed)?;
                let just_in = (inflate.total_in() - in_before) as usize;
                let just_out = (inflate.total_out() - out_before) as usize;
                consumed_in += just_in;

                if just_out > 0 {
                    let chunk = &out[..just_out];
                    let callback_flow = if is_delta {
                        self.visitor.delta_data(chunk)
                    } else {
                        if let Some(hash) = payload.identity_hash.as_mut() {
                            hash.update(chunk);
                        }
                        self.visitor.object_data(chunk)
                    };
                    if let ControlFlow::Break(stop) = callback_flow {
                        flow = ControlFlow::Break(stop);
                    }
                }

                if matches!(status, Status::StreamEnd) {
                    end_of_stream = true;
                    break;
                }
                if flow.is_break() || (just_in == 0 && just_out == 0) {
                    break;
                }
            }

            payload.record.compressed_size += consumed_in as u64;
            payload.record.crc.update(&data[..consumed_in]);

            if !end_of_stream {
                self.state = State::Payload(payload);
                return Ok((consumed_in, flow));
            }

            payload.finished = true;

            if flow.is_break() {
                // A data callback asked to stop on the very pass that
                // reached end-of-stream. The completion callback must not
                // fire alongside it — defer it to the next call into this
                // state, which will see `finished` and go straight there.
                self.state = State::Payload(payload);
                return Ok((consumed_in, flow));
            }
        }

        let flow = if is_delta {
            self.visitor
                .delta_complete(payload.record.compressed_size, payload.record.crc.finalize())
        } else {
            let identity = payload
                .identity_hash
                .expect("non-delta payload always has an identity hash")
                .finalize()?;
            self.visitor.object_complete(
                payload.record.compressed_size,
                payload.record.crc.finalize(),
                identity,
            )
        };

        self.advance_past_entry();
        Ok((consumed_in, flow))
    }
}
