//! # Block Reassembly
//!
//! Rebuilds a response from its blocks. Blocks may arrive in any order and
//! may be repeated; they are assembled strictly by block id, and the first
//! copy of a block wins.
//!
//! States: AWAITING_HEADER → AWAITING_PAYLOAD → (AWAITING_HEADER | COMPLETE | FAILED)
//!
//! `BlockReassembler` is the I/O-free state machine. `read_response` drives
//! it over a transport session, one frame at a time, until it reaches a
//! terminal state.

use indicatif::ProgressBar;
use log::{debug, warn};
use std::collections::BTreeMap;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{FetchError, ProtocolError};
use crate::networking::Session;
use crate::protocol::{decode_header, FrameLimits, ResponseHeader};
use crate::RESPONSE_HEADER_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    AwaitingHeader,
    AwaitingPayload,
    Complete,
    Failed,
}

/// Why a response could not be reassembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The server answered with a status other than success.
    Rejected { status: u32 },
    Protocol(ProtocolError),
}

impl From<Failure> for FetchError {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Rejected { status } => FetchError::Rejected { status, message: None },
            Failure::Protocol(e) => FetchError::Protocol(e),
        }
    }
}

/// What the engine needs next, or how it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    ReadHeader,
    /// Read exactly this many payload bytes.
    ReadPayload(usize),
    Complete(Vec<u8>),
    Failed(Failure),
}

/// Reassembly state for one outstanding request.
pub struct BlockReassembler {
    state: EngineState,
    limits: FrameLimits,
    expected_total: Option<u32>,
    pending: Option<ResponseHeader>,
    received: BTreeMap<u32, Vec<u8>>,
    received_bytes: u64,
}

impl BlockReassembler {
    pub fn new(limits: FrameLimits) -> Self {
        Self {
            state: EngineState::AwaitingHeader,
            limits,
            expected_total: None,
            pending: None,
            received: BTreeMap::new(),
            received_bytes: 0,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Total block count announced by the first header, once seen.
    pub fn expected_total(&self) -> Option<u32> {
        self.expected_total
    }

    /// Number of distinct blocks accepted so far.
    pub fn blocks_received(&self) -> usize {
        self.received.len()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, EngineState::Complete | EngineState::Failed)
    }

    /// Feeds a decoded header.
    ///
    /// A non-success status fails the request immediately. A total of zero
    /// completes it with an empty result. Otherwise the engine waits for
    /// `payload_len` bytes of payload.
    pub fn accept_header(&mut self, header: ResponseHeader) -> Step {
        match self.state {
            EngineState::AwaitingHeader => {}
            EngineState::AwaitingPayload => {
                return self.fail(Failure::Protocol(ProtocolError::OutOfSequence));
            }
            EngineState::Complete | EngineState::Failed => {
                return Step::Failed(Failure::Protocol(ProtocolError::OutOfSequence));
            }
        }

        if !header.is_success() {
            return self.fail(Failure::Rejected { status: header.status });
        }

        if let Some(expected) = self.expected_total {
            if expected != header.total_blocks {
                return self.fail(Failure::Protocol(ProtocolError::InconsistentTotal {
                    expected,
                    got: header.total_blocks,
                }));
            }
        }

        if header.total_blocks == 0 {
            self.state = EngineState::Complete;
            return Step::Complete(Vec::new());
        }
        self.expected_total = Some(header.total_blocks);

        if header.block_id >= header.total_blocks {
            return self.fail(Failure::Protocol(ProtocolError::InvalidBlockId {
                block_id: header.block_id,
                total: header.total_blocks,
            }));
        }

        // Duplicates are read and dropped, so only new blocks count toward the limit.
        if !self.received.contains_key(&header.block_id) {
            let projected = self.received_bytes + u64::from(header.payload_len);
            if projected > self.limits.max_response_len {
                return self.fail(Failure::Protocol(ProtocolError::ResponseTooLarge {
                    len: projected,
                    max: self.limits.max_response_len,
                }));
            }
        }

        self.pending = Some(header);
        self.state = EngineState::AwaitingPayload;
        Step::ReadPayload(header.payload_len as usize)
    }

    /// Feeds the payload announced by the last header.
    pub fn accept_payload(&mut self, payload: Vec<u8>) -> Step {
        let header = match (self.state, self.pending.take()) {
            (EngineState::AwaitingPayload, Some(header)) => header,
            (EngineState::Complete | EngineState::Failed, _) => {
                return Step::Failed(Failure::Protocol(ProtocolError::OutOfSequence));
            }
            _ => return self.fail(Failure::Protocol(ProtocolError::OutOfSequence)),
        };

        if payload.len() != header.payload_len as usize {
            return self.fail(Failure::Protocol(ProtocolError::PayloadLengthMismatch {
                expected: header.payload_len as usize,
                got: payload.len(),
            }));
        }

        if self.received.contains_key(&header.block_id) {
            debug!("Discarding duplicate block {}", header.block_id);
        } else {
            self.received_bytes += payload.len() as u64;
            self.received.insert(header.block_id, payload);
        }

        if self.received.len() as u64 == u64::from(header.total_blocks) {
            self.state = EngineState::Complete;
            return Step::Complete(self.assemble());
        }

        self.state = EngineState::AwaitingHeader;
        Step::ReadHeader
    }

    fn fail(&mut self, failure: Failure) -> Step {
        self.state = EngineState::Failed;
        self.pending = None;
        self.received.clear();
        Step::Failed(failure)
    }

    // Keys are exactly 0..total here, so map order is block order.
    fn assemble(&mut self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.received_bytes as usize);
        for block in std::mem::take(&mut self.received).into_values() {
            data.extend_from_slice(&block);
        }
        data
    }
}

/// Reads frames from `session` until the response is complete or fails.
///
/// The payload of a rejecting frame is read as the server's explanation,
/// and no frame after it is read. A message over the block size limit is
/// left unread, and a failure to read it does not hide the rejection.
pub async fn read_response<S>(
    session: &mut Session<S>,
    limits: FrameLimits,
    progress: &ProgressBar,
) -> Result<Vec<u8>, FetchError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut engine = BlockReassembler::new(limits);
    let mut step = Step::ReadHeader;

    loop {
        step = match step {
            Step::ReadHeader => {
                let raw = session.read_exact(RESPONSE_HEADER_LEN).await?;
                let header = decode_header(&raw, limits.max_block_len)?;
                debug!(
                    "Header: block {}/{} status {} payload {} bytes",
                    header.block_id, header.total_blocks, header.status, header.payload_len
                );

                match engine.accept_header(header) {
                    Step::Failed(Failure::Rejected { status }) => {
                        let message =
                            read_message(session, header.payload_len, limits.max_block_len).await;
                        return Err(FetchError::Rejected { status, message });
                    }
                    Step::Complete(data) => {
                        // Empty result; whatever payload it carries is a note, not content.
                        if header.payload_len > 0 {
                            session.read_exact(header.payload_len as usize).await?;
                        }
                        progress.finish_and_clear();
                        return Ok(data);
                    }
                    next => {
                        if let Some(total) = engine.expected_total() {
                            progress.set_length(u64::from(total));
                        }
                        next
                    }
                }
            }
            Step::ReadPayload(len) => {
                let payload = session.read_exact(len).await?;
                let next = engine.accept_payload(payload);
                progress.set_position(engine.blocks_received() as u64);
                next
            }
            Step::Complete(data) => {
                debug!(
                    "Response complete: {} blocks, {} bytes",
                    engine.blocks_received(),
                    data.len()
                );
                progress.finish_and_clear();
                return Ok(data);
            }
            Step::Failed(failure) => {
                progress.abandon();
                return Err(failure.into());
            }
        };
    }
}

async fn read_message<S>(session: &mut Session<S>, len: u32, max_len: u32) -> Option<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if len == 0 {
        return None;
    }
    if len > max_len {
        warn!("Skipping {} byte rejection message (limit {})", len, max_len);
        return None;
    }
    match session.read_exact(len as usize).await {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            let text = text.trim_end_matches('\0').trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Err(e) => {
            warn!("Could not read rejection message: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> BlockReassembler {
        BlockReassembler::new(FrameLimits::default())
    }

    /// Feeds one block and returns the step that follows its payload.
    fn feed(engine: &mut BlockReassembler, block_id: u32, total: u32, data: &[u8]) -> Step {
        let header = ResponseHeader::block(block_id, total, data.len() as u32);
        match engine.accept_header(header) {
            Step::ReadPayload(len) => {
                assert_eq!(len, data.len());
                engine.accept_payload(data.to_vec())
            }
            other => other,
        }
    }

    // ============================================================================
    // Ordering Tests
    // ============================================================================

    #[test]
    fn test_out_of_order_blocks_assemble_by_id() {
        let mut engine = engine();
        assert_eq!(feed(&mut engine, 1, 3, b"BC"), Step::ReadHeader);
        assert_eq!(feed(&mut engine, 0, 3, b"A"), Step::ReadHeader);
        assert_eq!(feed(&mut engine, 2, 3, b"D"), Step::Complete(b"ABCD".to_vec()));
        assert_eq!(engine.state(), EngineState::Complete);
    }

    #[test]
    fn test_every_arrival_order_gives_same_result() {
        let blocks: [(u32, &[u8]); 3] = [(0, &b"A"[..]), (1, &b"BC"[..]), (2, &b"D"[..])];
        let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

        for order in orders {
            let mut engine = engine();
            let mut last = Step::ReadHeader;
            for &i in &order {
                let (id, data) = blocks[i];
                last = feed(&mut engine, id, 3, data);
            }
            assert_eq!(last, Step::Complete(b"ABCD".to_vec()), "order {:?}", order);
        }
    }

    #[test]
    fn test_single_block_response() {
        let mut engine = engine();
        assert_eq!(feed(&mut engine, 0, 1, b"hello"), Step::Complete(b"hello".to_vec()));
    }

    #[test]
    fn test_zero_length_block_is_valid() {
        let mut engine = engine();
        assert_eq!(feed(&mut engine, 0, 2, b""), Step::ReadHeader);
        assert_eq!(feed(&mut engine, 1, 2, b"tail"), Step::Complete(b"tail".to_vec()));
    }

    // ============================================================================
    // Duplicate Tests
    // ============================================================================

    #[test]
    fn test_duplicate_block_is_ignored() {
        let mut engine = engine();
        feed(&mut engine, 0, 3, b"A");
        assert_eq!(feed(&mut engine, 0, 3, b"A"), Step::ReadHeader);
        assert_eq!(engine.blocks_received(), 1);
        feed(&mut engine, 1, 3, b"BC");
        assert_eq!(feed(&mut engine, 2, 3, b"D"), Step::Complete(b"ABCD".to_vec()));
    }

    #[test]
    fn test_duplicate_keeps_first_copy() {
        let mut engine = engine();
        feed(&mut engine, 0, 2, b"first");
        feed(&mut engine, 0, 2, b"second");
        assert_eq!(feed(&mut engine, 1, 2, b"!"), Step::Complete(b"first!".to_vec()));
    }

    // ============================================================================
    // Terminal Signal Tests
    // ============================================================================

    #[test]
    fn test_zero_total_is_empty_success() {
        let mut engine = engine();
        let step = engine.accept_header(ResponseHeader::block(0, 0, 0));
        assert_eq!(step, Step::Complete(Vec::new()));
        assert_eq!(engine.state(), EngineState::Complete);
    }

    #[test]
    fn test_rejection_status_fails() {
        let mut engine = engine();
        let step = engine.accept_header(ResponseHeader::rejection(2, 10));
        assert_eq!(step, Step::Failed(Failure::Rejected { status: 2 }));
        assert_eq!(engine.state(), EngineState::Failed);
    }

    #[test]
    fn test_rejection_wins_over_zero_total() {
        let mut engine = engine();
        let header = ResponseHeader { payload_len: 0, status: 0, block_id: 0, total_blocks: 0 };
        assert_eq!(engine.accept_header(header), Step::Failed(Failure::Rejected { status: 0 }));
    }

    #[test]
    fn test_terminal_engine_accepts_no_input() {
        let mut engine = engine();
        feed(&mut engine, 0, 1, b"x");
        assert!(engine.is_terminal());

        let step = engine.accept_header(ResponseHeader::block(0, 1, 1));
        assert_eq!(step, Step::Failed(Failure::Protocol(ProtocolError::OutOfSequence)));
        assert_eq!(engine.state(), EngineState::Complete);
    }

    // ============================================================================
    // Protocol Violation Tests
    // ============================================================================

    #[test]
    fn test_block_id_equal_to_total_fails() {
        let mut engine = engine();
        let step = feed(&mut engine, 3, 3, b"x");
        assert_eq!(
            step,
            Step::Failed(Failure::Protocol(ProtocolError::InvalidBlockId { block_id: 3, total: 3 }))
        );
        assert_eq!(engine.state(), EngineState::Failed);
    }

    #[test]
    fn test_total_change_fails() {
        let mut engine = engine();
        feed(&mut engine, 0, 3, b"A");
        let step = feed(&mut engine, 1, 4, b"B");
        assert_eq!(
            step,
            Step::Failed(Failure::Protocol(ProtocolError::InconsistentTotal {
                expected: 3,
                got: 4,
            }))
        );
    }

    #[test]
    fn test_zero_total_after_blocks_is_inconsistent() {
        let mut engine = engine();
        feed(&mut engine, 0, 2, b"A");
        let step = engine.accept_header(ResponseHeader::block(0, 0, 0));
        assert_eq!(
            step,
            Step::Failed(Failure::Protocol(ProtocolError::InconsistentTotal {
                expected: 2,
                got: 0,
            }))
        );
    }

    #[test]
    fn test_payload_length_mismatch_fails() {
        let mut engine = engine();
        engine.accept_header(ResponseHeader::block(0, 1, 4));
        let step = engine.accept_payload(b"abc".to_vec());
        assert_eq!(
            step,
            Step::Failed(Failure::Protocol(ProtocolError::PayloadLengthMismatch {
                expected: 4,
                got: 3,
            }))
        );
    }

    #[test]
    fn test_payload_before_header_fails() {
        let mut engine = engine();
        let step = engine.accept_payload(b"abc".to_vec());
        assert_eq!(step, Step::Failed(Failure::Protocol(ProtocolError::OutOfSequence)));
        assert_eq!(engine.state(), EngineState::Failed);
    }

    #[test]
    fn test_response_size_limit() {
        let limits = FrameLimits { max_block_len: 16, max_response_len: 5 };
        let mut engine = BlockReassembler::new(limits);
        assert_eq!(feed(&mut engine, 0, 2, b"abc"), Step::ReadHeader);
        let step = engine.accept_header(ResponseHeader::block(1, 2, 3));
        assert_eq!(
            step,
            Step::Failed(Failure::Protocol(ProtocolError::ResponseTooLarge { len: 6, max: 5 }))
        );
    }
}
