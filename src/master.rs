// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU master (client).

use crate::{
    codec::{
        DataType, RegisterValue, build_fixed, build_variable, decode_exception, extract_data,
        parse_registers,
        rtu::{add_crc, verify_crc},
    },
    config::Config,
    error::{Error, Result, RetryContext},
    frame::{Address, FunctionCode, Quantity, SlaveId, Word},
    transport::{SerialHelper, Transport},
};

/// Issues requests to the slaves on one line.
#[derive(Debug)]
pub struct Master<T = SerialHelper> {
    transport: T,
    config: Config,
}

impl<T: Transport> Master<T> {
    #[must_use]
    pub const fn new(transport: T, config: Config) -> Self {
        Self { transport, config }
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Read holding registers (function code `0x03`) and decode them as `data_type`.
    pub async fn read_holding_registers(
        &self,
        slave: SlaveId,
        start: Address,
        quantity: Quantity,
        data_type: DataType,
    ) -> Result<Vec<RegisterValue>> {
        self.read_holding_registers_with(slave, start, quantity, |data| {
            parse_registers(data, data_type)
        })
        .await
    }

    /// Read holding registers (function code `0x03`) and pass the raw data to `decode`.
    pub async fn read_holding_registers_with<F, R>(
        &self,
        slave: SlaveId,
        start: Address,
        quantity: Quantity,
        decode: F,
    ) -> Result<R>
    where
        F: FnOnce(&[u8]) -> R,
    {
        let pdu = build_fixed(slave, FunctionCode::ReadHoldingRegisters, start, quantity);
        let adu = self.request(pdu).await?;
        Ok(decode(extract_data(&adu)))
    }

    /// Read input registers (function code `0x04`).
    pub async fn read_input_registers(
        &self,
        slave: SlaveId,
        start: Address,
        quantity: Quantity,
        data_type: DataType,
    ) -> Result<Vec<RegisterValue>> {
        let pdu = build_fixed(slave, FunctionCode::ReadInputRegisters, start, quantity);
        let adu = self.request(pdu).await?;
        Ok(parse_registers(extract_data(&adu), data_type))
    }

    /// Write a single register (function code `0x06`) with the default retry count.
    pub async fn write_single_register(
        &self,
        slave: SlaveId,
        register: Address,
        value: Word,
    ) -> Result<()> {
        self.write_single_register_with_retries(
            slave,
            register,
            value,
            self.config.default_retry_count,
        )
        .await
    }

    /// Write a single register (function code `0x06`).
    ///
    /// Each failed attempt is repeated immediately until `retry_count`
    /// attempts have been made. A `retry_count` of `0` falls back to the
    /// default retry count.
    pub async fn write_single_register_with_retries(
        &self,
        slave: SlaveId,
        register: Address,
        value: Word,
        retry_count: usize,
    ) -> Result<()> {
        let retry_count = if retry_count == 0 {
            self.config.default_retry_count
        } else {
            retry_count
        };
        let pdu = build_fixed(slave, FunctionCode::WriteSingleRegister, register, value);
        let mut attempts = 0;
        while attempts < retry_count {
            attempts += 1;
            if self.config.debug {
                debug!(
                    "writeSingleRegister: Slave {slave}; Register: {register}; Value: {value}; Retry {attempts} of {retry_count}"
                );
            }
            match self.request(pdu.clone()).await {
                Ok(_) => return Ok(()),
                Err(err) => {
                    warn!(
                        "Writing register {register} of slave {slave} failed (attempt {attempts} of {retry_count}): {err}"
                    );
                }
            }
        }
        Err(Error::RetryLimitExceeded(RetryContext {
            slave,
            register,
            value,
            attempts,
        }))
    }

    /// Write multiple registers (function code `0x10`).
    ///
    /// Not retried. More than [`MAX_WRITE_REGISTERS`](crate::MAX_WRITE_REGISTERS)
    /// values are rejected without sending anything.
    pub async fn write_multiple_registers(
        &self,
        slave: SlaveId,
        start: Address,
        values: &[Word],
    ) -> Result<()> {
        let pdu = build_variable(slave, FunctionCode::WriteMultipleRegisters, start, values)?;
        self.request(pdu).await.map(|_| ())
    }

    /// Send a request PDU (slave id included, CRC excluded) and return the
    /// CRC checked response ADU.
    ///
    /// Exception responses are turned into [`Error::Exception`].
    pub async fn request(&self, pdu: Vec<u8>) -> Result<Vec<u8>> {
        let adu = self.transport.send(add_crc(&pdu)).await?;
        if self.config.debug {
            debug!("Response {adu:02X?}");
        }
        verify_crc(&adu)?;
        if let Some(exception) = decode_exception(&adu) {
            return Err(exception.map_or_else(|err| err, Error::Exception));
        }
        Ok(adu)
    }
}
