// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::{convert::TryFrom, fmt};

use byteorder::{BigEndian, ByteOrder};

use crate::{error::*, frame::*};

pub mod rtu;

/// Size of the response header in front of the data: slave, function code and byte count.
const RESPONSE_HEADER_LEN: usize = 3;

impl TryFrom<u8> for Exception {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        use crate::frame::Exception::*;
        let ex = match code {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => ServerDeviceFailure,
            0x05 => Acknowledge,
            0x06 => ServerDeviceBusy,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            _ => {
                return Err(Error::ExceptionCode(code));
            }
        };
        Ok(ex)
    }
}

/// Decode an exception response ADU.
///
/// Returns `None` if `adu` is not an exception response.
pub fn decode_exception(adu: &[u8]) -> Option<Result<ExceptionResponse>> {
    let (&fn_err_code, &code) = (adu.get(1)?, adu.get(2)?);
    if fn_err_code < 0x80 {
        return None;
    }
    let function = FunctionCode::new(fn_err_code - 0x80);
    Some(Exception::try_from(code).map(|exception| ExceptionResponse {
        function,
        exception,
    }))
}

/// Encode a request with two 16 bit parameters.
///
/// Used for e.g. read holding registers (start address, quantity) and
/// write single register (address, value).
#[must_use]
pub fn build_fixed(slave: SlaveId, fn_code: FunctionCode, param: u16, param2: u16) -> Vec<u8> {
    let mut buf = vec![0; 6];
    buf[0] = slave;
    buf[1] = fn_code.value();
    BigEndian::write_u16(&mut buf[2..4], param);
    BigEndian::write_u16(&mut buf[4..6], param2);
    buf
}

/// Maximum number of registers in a write multiple registers request.
pub const MAX_WRITE_REGISTERS: usize = 123;

/// Encode a request that carries a block of words, e.g. write multiple registers.
///
/// Fails with [`Error::BufferSize`] for more than [`MAX_WRITE_REGISTERS`] words.
pub fn build_variable(
    slave: SlaveId,
    fn_code: FunctionCode,
    start: Address,
    words: &[Word],
) -> Result<Vec<u8>> {
    if words.len() > MAX_WRITE_REGISTERS {
        return Err(Error::BufferSize(words.len(), MAX_WRITE_REGISTERS));
    }
    let byte_count = words.len() * 2;
    let mut buf = vec![0; 7 + byte_count];
    buf[0] = slave;
    buf[1] = fn_code.value();
    BigEndian::write_u16(&mut buf[2..4], start);
    BigEndian::write_u16(&mut buf[4..6], words.len() as u16);
    buf[6] = byte_count as u8;
    for (i, w) in words.iter().enumerate() {
        BigEndian::write_u16(&mut buf[7 + i * 2..], *w);
    }
    Ok(buf)
}

/// Slice header, byte count and CRC off a read response.
#[must_use]
pub fn extract_data(adu: &[u8]) -> &[u8] {
    adu.get(RESPONSE_HEADER_LEN..adu.len().saturating_sub(rtu::CRC_LEN))
        .unwrap_or_default()
}

/// How the words of a read response are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    /// Signed 16 bit integer
    #[default]
    Int,
    /// Unsigned 16 bit integer
    UInt,
    /// Two ASCII characters
    Ascii,
}

/// A decoded register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterValue {
    Int(i16),
    UInt(u16),
    Ascii(String),
}

impl RegisterValue {
    /// The numeric value, `None` for ASCII registers.
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(i32::from(*v)),
            Self::UInt(v) => Some(i32::from(*v)),
            Self::Ascii(_) => None,
        }
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => v.fmt(f),
            Self::UInt(v) => v.fmt(f),
            Self::Ascii(s) => s.fmt(f),
        }
    }
}

fn read_register(word: &[u8], data_type: DataType) -> RegisterValue {
    match data_type {
        DataType::Int => RegisterValue::Int(BigEndian::read_i16(word)),
        DataType::UInt => RegisterValue::UInt(BigEndian::read_u16(word)),
        DataType::Ascii => {
            RegisterValue::Ascii(word.iter().map(|b| char::from(b & 0x7F)).collect())
        }
    }
}

/// Parse the data of a read registers response.
///
/// A trailing odd byte is ignored.
#[must_use]
pub fn parse_registers(data: &[u8], data_type: DataType) -> Vec<RegisterValue> {
    data.chunks_exact(2)
        .map(|word| read_register(word, data_type))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_read_holding_registers_request() {
        let req = build_fixed(0x01, FunctionCode::ReadHoldingRegisters, 0, 3);
        assert_eq!(req, &[0x01, 0x03, 0x00, 0x00, 0x00, 0x03]);
    }

    #[test]
    fn encode_write_single_register_request() {
        let req = build_fixed(0x12, FunctionCode::WriteSingleRegister, 0x2222, 0xABCD);
        assert_eq!(
            req,
            &[
                0x12, // slave address
                0x06, // function code
                0x22, // addr
                0x22, // addr
                0xAB, // value
                0xCD, // value
            ]
        );
    }

    #[test]
    fn encode_write_multiple_registers_request() {
        let req = build_variable(0x01, FunctionCode::WriteMultipleRegisters, 0x0000, &[0x1234, 0xABCD])
            .unwrap();
        assert_eq!(
            req,
            &[
                0x01, // slave address
                0x10, // function code
                0x00, // start
                0x00, // start
                0x00, // quantity
                0x02, // quantity
                0x04, // byte count
                0x12, 0x34, 0xAB, 0xCD,
            ]
        );

        let req = build_variable(0x01, FunctionCode::WriteMultipleRegisters, 0x0102, &[]).unwrap();
        assert_eq!(req, &[0x01, 0x10, 0x01, 0x02, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn reject_too_many_registers() {
        let words = [0xFFFF; MAX_WRITE_REGISTERS];
        let req = build_variable(0x01, FunctionCode::WriteMultipleRegisters, 0, &words).unwrap();
        assert_eq!(req.len(), 7 + 246);
        assert_eq!(&req[4..7], &[0x00, 0x7B, 0xF6]);

        let words = [0; 200];
        let err = build_variable(0x01, FunctionCode::WriteMultipleRegisters, 0, &words).unwrap_err();
        assert!(matches!(err, Error::BufferSize(200, MAX_WRITE_REGISTERS)));
    }

    #[test]
    fn extract_data_of_read_response() {
        let adu = &[0x11, 0x03, 0x06, 0xAE, 0x41, 0x56, 0x52, 0x43, 0x40, 0x49, 0xAD];
        assert_eq!(extract_data(adu), &[0xAE, 0x41, 0x56, 0x52, 0x43, 0x40]);
        assert!(extract_data(&[0x11, 0x03, 0x00, 0x00, 0x00]).is_empty());
        assert!(extract_data(&[0x11, 0x03]).is_empty());
        assert!(extract_data(&[]).is_empty());
    }

    #[test]
    fn parse_signed_registers() {
        let adu = &[0x11, 0x03, 0x06, 0xAE, 0x41, 0x56, 0x52, 0x43, 0x40, 0x49, 0xAD];
        let values = parse_registers(extract_data(adu), DataType::default());
        assert_eq!(
            values,
            vec![
                RegisterValue::Int(-20927),
                RegisterValue::Int(22098),
                RegisterValue::Int(17216)
            ]
        );
    }

    #[test]
    fn parse_unsigned_registers() {
        let adu = &[0x11, 0x03, 0x02, 0xAE, 0x41, 0x49, 0xAD];
        let values = parse_registers(extract_data(adu), DataType::UInt);
        assert_eq!(values, vec![RegisterValue::UInt(44609)]);
        assert_eq!(values[0].as_i32(), Some(44609));
    }

    #[test]
    fn parse_ascii_registers() {
        let adu = &[0x11, 0x03, 0x04, 0x56, 0x52, 0x56, 0x52, 0x49, 0xAD];
        let values = parse_registers(extract_data(adu), DataType::Ascii);
        assert_eq!(
            values,
            vec![
                RegisterValue::Ascii("VR".into()),
                RegisterValue::Ascii("VR".into())
            ]
        );
        assert_eq!(values[0].to_string(), "VR");
        assert_eq!(values[0].as_i32(), None);
    }

    #[test]
    fn parse_registers_ignores_odd_byte() {
        assert_eq!(parse_registers(&[0x00, 0x01, 0x02], DataType::UInt).len(), 1);
        assert!(parse_registers(&[], DataType::Int).is_empty());
    }

    #[test]
    fn exception_from_u8() {
        assert_eq!(Exception::try_from(0x02).unwrap(), Exception::IllegalDataAddress);
        assert!(matches!(
            Exception::try_from(0x07),
            Err(Error::ExceptionCode(0x07))
        ));
    }

    #[test]
    fn decode_exception_response() {
        let rsp = decode_exception(&[0x11, 0x83, 0x04, 0x41, 0x36]).unwrap().unwrap();
        assert_eq!(rsp.function, FunctionCode::ReadHoldingRegisters);
        assert_eq!(rsp.exception, Exception::ServerDeviceFailure);

        assert!(decode_exception(&[0x11, 0x03, 0x02, 0xAE, 0x41]).is_none());
        assert!(decode_exception(&[0x11]).is_none());
        assert!(matches!(
            decode_exception(&[0x11, 0x86, 0x0C, 0x00, 0x00]),
            Some(Err(Error::ExceptionCode(0x0C)))
        ));
    }
}
