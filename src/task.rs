// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response frame synchronization for a single request.
//!
//! Modbus RTU has no frame delimiters except inter-frame silence, which is not
//! visible behind a byte stream. A [`Task`] therefore collects whatever bytes
//! arrive and searches them for the first position where its slave id and
//! function code start a complete response frame.

use tokio::sync::oneshot;

use crate::{
    codec::rtu::{EXCEPTION_LEN, MAX_FRAME_LEN, expected_response_len},
    error::{Error, Result},
    frame::{FunctionCode, SlaveId},
};

/// Responses shorter than this can't be matched by length.
const MIN_DATA_LEN: usize = 6;

/// Receiving end of a [`Task`]'s outcome.
pub type Outcome = oneshot::Receiver<Result<Vec<u8>>>;

/// One in-flight request.
#[derive(Debug)]
pub struct Task {
    id: u64,
    payload: Vec<u8>,
    slave: SlaveId,
    fn_code: FunctionCode,
    expected_len: usize,
    buf: Vec<u8>,
    outcome: Option<oneshot::Sender<Result<Vec<u8>>>>,
}

impl Task {
    /// Create a task for the request ADU `payload`.
    #[must_use]
    pub fn new(id: u64, payload: Vec<u8>) -> (Self, Outcome) {
        let (tx, rx) = oneshot::channel();
        let task = Self {
            id,
            slave: payload.first().copied().unwrap_or_default(),
            fn_code: FunctionCode::new(payload.get(1).copied().unwrap_or_default()),
            expected_len: expected_response_len(&payload),
            payload,
            buf: Vec::new(),
            outcome: Some(tx),
        };
        (task, rx)
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The bytes to transmit.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub const fn expected_len(&self) -> usize {
        self.expected_len
    }

    /// Bytes received but not consumed by a frame.
    #[must_use]
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.outcome.is_none()
    }

    /// Settle with a response frame. Ignored if already settled.
    pub fn resolve(&mut self, frame: Vec<u8>) {
        self.settle(Ok(frame));
    }

    /// Settle with an error. Ignored if already settled.
    pub fn reject(&mut self, err: Error) {
        self.settle(Err(err));
    }

    fn settle(&mut self, res: Result<Vec<u8>>) {
        if let Some(tx) = self.outcome.take() {
            // The receiver may be gone already, nobody is waiting then.
            let _ = tx.send(res);
        }
    }

    /// Feed received bytes. Returns `true` once the task is settled.
    pub fn receive(&mut self, chunk: &[u8]) -> bool {
        self.buf.extend_from_slice(chunk);
        if self.buf.len() > MAX_FRAME_LEN {
            let overflow = self.buf.len() - MAX_FRAME_LEN;
            self.buf.drain(..overflow);
        }
        if let Some(frame) = self.find_frame() {
            self.resolve(frame);
        }
        self.is_settled()
    }

    fn find_frame(&mut self) -> Option<Vec<u8>> {
        let expected_len = self.expected_len;
        let buf_len = self.buf.len();
        if expected_len < MIN_DATA_LEN || buf_len < EXCEPTION_LEN {
            return None;
        }
        for start in 0..=buf_len - EXCEPTION_LEN {
            if self.buf[start] != self.slave {
                continue;
            }
            let fn_code = self.buf[start + 1];
            if fn_code == self.fn_code.value() && start + expected_len <= buf_len {
                return Some(self.take_frame(start, expected_len));
            }
            if fn_code == self.fn_code.exception_value() && start + EXCEPTION_LEN <= buf_len {
                return Some(self.take_frame(start, EXCEPTION_LEN));
            }
            // Header matches, the rest of the frame is still pending.
            if fn_code == 0x7F & self.fn_code.value() {
                break;
            }
        }
        None
    }

    fn take_frame(&mut self, start: usize, len: usize) -> Vec<u8> {
        let frame = self.buf[start..start + len].to_vec();
        self.buf.drain(..start + len);
        frame
    }
}
