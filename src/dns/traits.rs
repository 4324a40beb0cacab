use super::CodecError;

/// Shared wire (de)serialization contract for DNS message components.
///
/// Names need random access into the full message buffer to follow
/// compression pointers, so `from_wire` takes the whole buffer plus a
/// cursor rather than a streaming reader.
pub trait DnsWireFormat: Sized {
    fn to_wire(&self, out: &mut Vec<u8>);

    fn from_wire(buf: &[u8], offset: &mut usize) -> Result<Self, CodecError>;
}
