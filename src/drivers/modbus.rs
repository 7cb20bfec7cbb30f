// Modbus RTU client driver
// Wraps the synchronous tokio-modbus client for single-register access
// over an RS485 serial line.

use std::time::Duration;

use log::debug;
use thiserror::Error;
use tokio_modbus::client::sync::{rtu, Context};
use tokio_modbus::prelude::*;
use tokio_serial::{DataBits, Parity, StopBits};

/// Modbus communication error type
#[derive(Debug, Error)]
pub enum ModbusError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("not connected")]
    NotConnected,
    /// The device answered with a Modbus exception response.
    #[error("device exception: {0:?}")]
    Exception(tokio_modbus::ExceptionCode),
    /// Serial transport failure (timeout, framing, unplugged adapter, ...).
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Serial line parameters for the RTU link.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial port path (e.g. "/dev/ttyUSB0")
    pub port_path: String,
    /// Baud rate in bit/s
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Per-operation response timeout
    pub timeout: Duration,
}

/// Register-level I/O, with zero-based wire addresses.
///
/// `ModbusClient` is the production implementation; tests substitute a fake.
pub trait RegisterIo {
    fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, ModbusError>;
    fn write_single_register(&mut self, address: u16, value: u16) -> Result<(), ModbusError>;
}

/// Synchronous Modbus RTU client with connection management.
pub struct ModbusClient {
    config: SerialConfig,
    slave: Slave,
    /// RTU context, present while connected
    context: Option<Context>,
}

impl ModbusClient {
    pub fn new(config: SerialConfig, slave_id: u8) -> Self {
        Self {
            config,
            slave: Slave(slave_id),
            context: None,
        }
    }

    /// Opens the serial line and binds the RTU context to the configured
    /// secondary id.
    pub fn connect(&mut self) -> Result<(), ModbusError> {
        let builder = tokio_serial::new(&self.config.port_path, self.config.baud_rate)
            .data_bits(self.config.data_bits)
            .parity(self.config.parity)
            .stop_bits(self.config.stop_bits);

        let context =
            rtu::connect_slave_with_timeout(&builder, self.slave, Some(self.config.timeout))
                .map_err(|e| ModbusError::ConnectionFailed(e.to_string()))?;

        debug!(
            "opened {} at {} baud, slave id {}",
            self.config.port_path, self.config.baud_rate, self.slave.0
        );
        self.context = Some(context);
        Ok(())
    }

    /// Closes the serial line. Idempotent.
    pub fn disconnect(&mut self) {
        if self.context.take().is_some() {
            debug!("closed {}", self.config.port_path);
        }
    }

    fn context(&mut self) -> Result<&mut Context, ModbusError> {
        self.context.as_mut().ok_or(ModbusError::NotConnected)
    }
}

impl RegisterIo for ModbusClient {
    fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, ModbusError> {
        debug!("read holding registers: address={}, count={}", address, count);
        match self.context()?.read_holding_registers(address, count) {
            Ok(Ok(words)) => Ok(words),
            Ok(Err(code)) => Err(ModbusError::Exception(code)),
            Err(e) => Err(ModbusError::Transport(e.to_string())),
        }
    }

    fn write_single_register(&mut self, address: u16, value: u16) -> Result<(), ModbusError> {
        debug!("write single register: address={}, value={}", address, value);
        match self.context()?.write_single_register(address, value) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(code)) => Err(ModbusError::Exception(code)),
            Err(e) => Err(ModbusError::Transport(e.to_string())),
        }
    }
}

impl Drop for ModbusClient {
    /// Releases the serial line when the client goes out of scope.
    fn drop(&mut self) {
        self.disconnect();
    }
}
