use std::io::Cursor;

use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter};

use super::{CodecError, DnsOpcode, DnsQr, DnsResponseCode, DnsWireFormat};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DnsHeader {
    pub id: u16,
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub z: u8,
    pub rcode: u8,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl DnsHeader {
    pub fn opcode(&self) -> DnsOpcode {
        DnsOpcode::from(self.opcode)
    }

    pub fn rcode(&self) -> DnsResponseCode {
        DnsResponseCode::from(self.rcode)
    }

    pub fn set_rcode(&mut self, rcode: DnsResponseCode) {
        self.rcode = rcode.into();
    }

    pub fn qr(&self) -> DnsQr {
        DnsQr::from(self.qr as u8)
    }
}

impl DnsWireFormat for DnsHeader {
    fn to_wire(&self, out: &mut Vec<u8>) {
        let mut buf = Vec::with_capacity(12);
        let mut writer = BitWriter::endian(&mut buf, BigEndian);
        writer.write_var::<u16>(16, self.id).unwrap();
        writer.write_var::<u8>(1, self.qr as u8).unwrap();
        writer.write_var::<u8>(4, self.opcode).unwrap();
        writer.write_var::<u8>(1, self.aa as u8).unwrap();
        writer.write_var::<u8>(1, self.tc as u8).unwrap();
        writer.write_var::<u8>(1, self.rd as u8).unwrap();
        writer.write_var::<u8>(1, self.ra as u8).unwrap();
        writer.write_var::<u8>(3, self.z).unwrap();
        writer.write_var::<u8>(4, self.rcode).unwrap();
        writer.write_var::<u16>(16, self.qdcount).unwrap();
        writer.write_var::<u16>(16, self.ancount).unwrap();
        writer.write_var::<u16>(16, self.nscount).unwrap();
        writer.write_var::<u16>(16, self.arcount).unwrap();
        out.extend_from_slice(&buf);
    }

    fn from_wire(buf: &[u8], offset: &mut usize) -> Result<Self, CodecError> {
        if buf.len() < *offset + 12 {
            return Err(CodecError::UnexpectedEof);
        }
        let slice = &buf[*offset..*offset + 12];
        let mut reader = BitReader::endian(Cursor::new(slice), BigEndian);
        let header = DnsHeader {
            id: reader.read_var::<u16>(16)?,
            qr: reader.read_var::<u8>(1)? == 1,
            opcode: reader.read_var::<u8>(4)?,
            aa: reader.read_var::<u8>(1)? == 1,
            tc: reader.read_var::<u8>(1)? == 1,
            rd: reader.read_var::<u8>(1)? == 1,
            ra: reader.read_var::<u8>(1)? == 1,
            z: reader.read_var::<u8>(3)?,
            rcode: reader.read_var::<u8>(4)?,
            qdcount: reader.read_var::<u16>(16)?,
            ancount: reader.read_var::<u16>(16)?,
            nscount: reader.read_var::<u16>(16)?,
            arcount: reader.read_var::<u16>(16)?,
        };
        *offset += 12;
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_flags() {
        let header = DnsHeader {
            id: 0xbeef,
            qr: true,
            opcode: 0,
            aa: false,
            tc: true,
            rd: true,
            ra: true,
            z: 0,
            rcode: 2,
            qdcount: 1,
            ancount: 0,
            nscount: 0,
            arcount: 1,
        };
        let mut bytes = Vec::new();
        header.to_wire(&mut bytes);
        let mut offset = 0;
        let decoded = DnsHeader::from_wire(&bytes, &mut offset).unwrap();
        assert_eq!(offset, 12);
        assert_eq!(decoded, header);
        assert_eq!(decoded.rcode(), DnsResponseCode::ServFail);
    }
}
