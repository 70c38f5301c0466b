//! Wire protocol: tagged-value carrier, incremental decoder, dual encoder.

pub mod decoder;
pub mod encoder;
pub mod value;

pub use decoder::Decoder;
pub use encoder::{encode_to_vec, encode_value, write_raw};
pub use value::Value;
