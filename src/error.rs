// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;
use std::{io, time::Duration};

use thiserror::Error;

use crate::frame::{Address, ExceptionResponse, SlaveId, Word};

pub type Result<T> = core::result::Result<T, Error>;

/// modbus-rtu-master Error
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid CRC
    #[error("Invalid CRC: expected = 0x{expected:0>4X}, actual = 0x{actual:0>4X}")]
    Crc { expected: u16, actual: u16 },
    /// No matching frame arrived within the response timeout
    #[error("Response timeout of {}ms exceeded", .0.as_millis())]
    ResponseTimeout(Duration),
    /// All attempts of a retried request failed
    #[error("Retry limit exceeded: {0}")]
    RetryLimitExceeded(RetryContext),
    /// The request was withdrawn from the queue before it was sent
    #[error("Aborted")]
    Aborted,
    /// Writing to the byte channel failed
    #[error("Channel I/O error: {0}")]
    ChannelIo(#[from] io::Error),
    /// The slave answered with an exception response
    #[error("Exception response: {0}")]
    Exception(ExceptionResponse),
    /// Invalid exception code
    #[error("Invalid exception code: 0x{0:0>2X}")]
    ExceptionCode(u8),
    /// Too many values for a single request
    #[error("Invalid buffer size: {0} values exceed the limit of {1}")]
    BufferSize(usize, usize),
}

impl Error {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::ResponseTimeout(_))
    }
}

/// What a retried request was about when it gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryContext {
    pub slave: SlaveId,
    pub register: Address,
    pub value: Word,
    pub attempts: usize,
}

impl fmt::Display for RetryContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let Self {
            slave,
            register,
            value,
            attempts,
        } = self;
        write!(
            f,
            "Slave {slave}; Register: {register}; Value: {value}; Attempts: {attempts}"
        )
    }
}
