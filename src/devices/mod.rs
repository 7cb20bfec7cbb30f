// Device abstractions built on top of the communication drivers

pub mod ecl;

pub use ecl::EclDevice;
