// Communication drivers module
//
// Low-level protocol drivers used by the device layer. Each submodule
// handles one communication interface.

/// Modbus RTU communication driver
/// Synchronous client for Modbus over an RS485 serial line
pub mod modbus;
