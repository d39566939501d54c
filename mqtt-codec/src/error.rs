use derive_more::Display;

/// Wire-level failures raised by the codec.
///
/// Modeled after `mqtt_core::ConnectReturnCode`: a small `Display`-deriving enum with a manual
/// `Error` impl, rather than a boxed `dyn Error` or a bag of strings.
#[derive(Debug, Eq, PartialEq, Clone, Display)]
pub enum CodecError {
    #[display(fmt = "malformed packet: {}", _0)]
    Malformed(String),
    #[display(fmt = "remaining length field uses more than 4 bytes")]
    RemainingLengthTooLong,
    #[display(fmt = "remaining length {} is out of range (max 268435455)", _0)]
    RemainingLengthOutOfRange(usize),
    #[display(fmt = "trailing bytes after a complete frame")]
    TrailingBytes,
}

impl std::error::Error for CodecError {}
