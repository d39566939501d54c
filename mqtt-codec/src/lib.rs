mod decode;
mod encode;
mod error;

pub use decode::{decode_frame, try_read_fixed_header};
pub use encode::{encode_frame, encoded_size};
pub use error::CodecError;
