use super::name::{decode_name, encode_name};
use super::question::{read_u16, read_u32};
use super::{CodecError, DnsQClass, DnsQType, DnsWireFormat};

/// A resource record. The forwarder never needs to interpret rdata
/// semantically (it only relays bytes between client and upstream), so
/// rdata is kept opaque; only `ttl` is surfaced as a typed field because
/// the cache rewrites it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnsRecord {
    pub name: String,
    pub rtype: DnsQType,
    pub rclass: DnsQClass,
    pub ttl: u32,
    pub rdata: Vec<u8>,
}

impl DnsWireFormat for DnsRecord {
    fn to_wire(&self, out: &mut Vec<u8>) {
        encode_name(&self.name, out);
        out.extend_from_slice(&u16::from(self.rtype).to_be_bytes());
        out.extend_from_slice(&u16::from(self.rclass).to_be_bytes());
        out.extend_from_slice(&self.ttl.to_be_bytes());
        out.extend_from_slice(&(self.rdata.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.rdata);
    }

    fn from_wire(buf: &[u8], offset: &mut usize) -> Result<Self, CodecError> {
        let name = decode_name(buf, offset)?;
        let rtype = read_u16(buf, offset)?;
        let rclass = read_u16(buf, offset)?;
        let ttl = read_u32(buf, offset)?;
        let rdlength = read_u16(buf, offset)? as usize;
        let rdata = buf
            .get(*offset..*offset + rdlength)
            .ok_or(CodecError::UnexpectedEof)?
            .to_vec();
        *offset += rdlength;
        Ok(DnsRecord {
            name,
            rtype: DnsQType::from(rtype),
            rclass: DnsQClass::from(rclass),
            ttl,
            rdata,
        })
    }
}

impl DnsRecord {
    pub fn a(name: impl Into<String>, ttl: u32, addr: std::net::Ipv4Addr) -> Self {
        DnsRecord {
            name: name.into(),
            rtype: DnsQType::A,
            rclass: DnsQClass::IN,
            ttl,
            rdata: addr.octets().to_vec(),
        }
    }
}
