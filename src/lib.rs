// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![doc = include_str!("../README.md")]

#[macro_use]
extern crate log;

mod codec;
mod config;
mod error;
mod frame;
mod master;

pub mod channel;
pub mod queue;
pub mod task;
pub mod transport;

pub use codec::{
    DataType, MAX_WRITE_REGISTERS, RegisterValue, build_fixed, build_variable, decode_exception,
    extract_data, parse_registers, rtu,
};
pub use config::*;
pub use error::*;
pub use frame::*;
pub use master::Master;
pub use transport::{Response, SerialHelper, Transport};
