use super::name::{decode_name, encode_name};
use super::{CodecError, DnsQClass, DnsQType, DnsWireFormat};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnsQuestion {
    pub name: String,
    pub qtype: DnsQType,
    pub qclass: DnsQClass,
}

impl DnsWireFormat for DnsQuestion {
    fn to_wire(&self, out: &mut Vec<u8>) {
        encode_name(&self.name, out);
        out.extend_from_slice(&u16::from(self.qtype).to_be_bytes());
        out.extend_from_slice(&u16::from(self.qclass).to_be_bytes());
    }

    fn from_wire(buf: &[u8], offset: &mut usize) -> Result<Self, CodecError> {
        let name = decode_name(buf, offset)?;
        let qtype = read_u16(buf, offset)?;
        let qclass = read_u16(buf, offset)?;
        Ok(DnsQuestion {
            name,
            qtype: DnsQType::from(qtype),
            qclass: DnsQClass::from(qclass),
        })
    }
}

pub(super) fn read_u16(buf: &[u8], offset: &mut usize) -> Result<u16, CodecError> {
    let bytes = buf
        .get(*offset..*offset + 2)
        .ok_or(CodecError::UnexpectedEof)?;
    *offset += 2;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub(super) fn read_u32(buf: &[u8], offset: &mut usize) -> Result<u32, CodecError> {
    let bytes = buf
        .get(*offset..*offset + 4)
        .ok_or(CodecError::UnexpectedEof)?;
    *offset += 4;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
