// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::{
    error::{Error, Result},
    frame::FunctionCode,
};

// [MODBUS over Serial Line Specification and Implementation Guide V1.02](http://modbus.org/docs/Modbus_over_serial_line_V1_02.pdf), page 13
// "The maximum size of a MODBUS RTU frame is 256 bytes."
pub const MAX_FRAME_LEN: usize = 256;

/// Size of an exception response: slave, function code | 0x80, exception code and CRC.
pub const EXCEPTION_LEN: usize = 5;

/// Size of the trailing CRC.
pub const CRC_LEN: usize = 2;

/// Calculate the CRC (Cyclic Redundancy Check) sum.
///
/// The result is transmitted little-endian, see [`add_crc`].
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFF;
    for x in data {
        crc ^= u16::from(*x);
        for _ in 0..8 {
            // if we followed clippy's suggestion to move out the crc >>= 1, the condition may not be met any more
            // the recommended action therefore makes no sense and it is better to allow this lint
            #[allow(clippy::branches_sharing_code)]
            if (crc & 0x0001) != 0 {
                crc >>= 1;
                crc ^= 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Append the CRC of `buf`.
#[must_use]
pub fn add_crc(buf: &[u8]) -> Vec<u8> {
    let mut adu = Vec::with_capacity(buf.len() + CRC_LEN);
    adu.extend_from_slice(buf);
    let mut crc = [0; CRC_LEN];
    LittleEndian::write_u16(&mut crc, crc16(buf));
    adu.extend_from_slice(&crc);
    adu
}

/// Verify the trailing CRC of an ADU.
pub fn verify_crc(adu: &[u8]) -> Result<()> {
    if adu.len() < CRC_LEN {
        return Err(Error::Crc {
            expected: 0,
            actual: crc16(&[]),
        });
    }
    let (data, crc_buf) = adu.split_at(adu.len() - CRC_LEN);
    let expected = LittleEndian::read_u16(crc_buf);
    let actual = crc16(data);
    if expected != actual {
        return Err(Error::Crc { expected, actual });
    }
    Ok(())
}

/// Check whether the trailing two bytes of `adu` are its CRC.
#[must_use]
pub fn check_crc(adu: &[u8]) -> bool {
    verify_crc(adu).is_ok()
}

/// Calculate the number of bytes required for a given number of coils.
#[must_use]
pub const fn packed_coils_len(bitcount: usize) -> usize {
    bitcount.div_ceil(8)
}

/// Size of the normal response ADU (CRC included) a slave sends for `request`.
///
/// Returns `0` if the size can't be derived from the request. Such a request
/// never matches and only ends with its response timeout.
#[must_use]
pub fn expected_response_len(request: &[u8]) -> usize {
    let Some(&fn_code) = request.get(1) else {
        return 0;
    };
    let quantity = request.get(4..6).map(BigEndian::read_u16).map(usize::from);
    match (FunctionCode::new(fn_code), quantity) {
        (FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs, Some(quantity)) => {
            3 + packed_coils_len(quantity) + CRC_LEN
        }
        (FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters, Some(quantity)) => {
            3 + 2 * quantity + CRC_LEN
        }
        (
            FunctionCode::WriteSingleCoil
            | FunctionCode::WriteSingleRegister
            | FunctionCode::WriteMultipleCoils
            | FunctionCode::WriteMultipleRegisters,
            _,
        ) => 6 + CRC_LEN,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calc_crc16() {
        let msg = &[0x01, 0x03, 0x08, 0x2B, 0x00, 0x02];
        assert_eq!(crc16(msg), 0x63B6);

        let msg = &[0x01, 0x03, 0x04, 0x00, 0x20, 0x00, 0x00];
        assert_eq!(crc16(msg), 0xF9FB);

        let msg = &[0x11, 0x03, 0x06, 0xAE, 0x41, 0x56, 0x52, 0x43, 0x40];
        assert_eq!(crc16(msg), 44361);
    }

    #[test]
    fn append_crc_little_endian() {
        let adu = add_crc(&[0x12, 0x06, 0x22, 0x22, 0xAB, 0xCD]);
        assert_eq!(adu, &[0x12, 0x06, 0x22, 0x22, 0xAB, 0xCD, 0x9F, 0xBE]);

        let adu = add_crc(&[0x11, 0x03, 0x00, 0x6B, 0x00, 0x03]);
        assert_eq!(&adu[6..], &[0x76, 0x87]);
    }

    #[test]
    fn check_crc_of_valid_and_corrupted_frames() {
        let samples: &[&[u8]] = &[
            &[],
            &[0x01],
            &[0x11, 0x83, 0x04],
            &[0x01, 0x10, 0x00, 0x00, 0x00, 0x02, 0x04, 0x12, 0x34, 0xAB, 0xCD],
        ];
        for sample in samples {
            let adu = add_crc(sample);
            assert!(check_crc(&adu));
            for byte in 0..adu.len() {
                for bit in 0..8 {
                    let mut corrupted = adu.clone();
                    corrupted[byte] ^= 1 << bit;
                    assert!(!check_crc(&corrupted), "{corrupted:02X?}");
                }
            }
        }
    }

    #[test]
    fn verify_crc_reports_both_values() {
        let err = verify_crc(&[0x11, 0x03, 0x02, 0xAE, 0x41, 0x49, 0xAD]).unwrap_err();
        assert!(matches!(
            err,
            Error::Crc {
                expected: 0xAD49,
                actual: 0xD7C5
            }
        ));
        assert!(!check_crc(&[0x01]));
    }

    #[test]
    fn test_expected_response_len() {
        let buf = &mut [0x11, 0x00, 0x00, 0x6B, 0x00, 0x03];

        buf[1] = 0x01;
        assert_eq!(expected_response_len(buf), 6);

        buf[1] = 0x02;
        buf[5] = 0x09;
        assert_eq!(expected_response_len(buf), 7);

        buf[1] = 0x03;
        buf[5] = 0x03;
        assert_eq!(expected_response_len(buf), 11);

        buf[1] = 0x04;
        assert_eq!(expected_response_len(buf), 11);

        for fn_code in [0x05, 0x06, 0x0F, 0x10] {
            buf[1] = fn_code;
            assert_eq!(expected_response_len(buf), 8);
        }

        buf[1] = 0x07;
        assert_eq!(expected_response_len(buf), 0);

        assert_eq!(expected_response_len(&[0x11, 0x03, 0x00]), 0);
        assert_eq!(expected_response_len(&[0x11, 0x06, 0x00]), 8);
        assert_eq!(expected_response_len(&[]), 0);
    }

    #[test]
    fn read_coils_response_len_rounds_up() {
        assert_eq!(packed_coils_len(0), 0);
        assert_eq!(packed_coils_len(1), 1);
        assert_eq!(packed_coils_len(8), 1);
        assert_eq!(packed_coils_len(9), 2);
    }
}
