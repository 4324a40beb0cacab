use super::{CodecError, DnsHeader, DnsOpcode, DnsQClass, DnsQType, DnsQuestion, DnsQr, DnsRecord, DnsResponseCode, DnsWireFormat};
use crate::constants::{EDNS_UDP_SIZE, EDNS_VERSION, MAX_UDP_PACKET_SIZE};

#[derive(Clone, Debug, Default)]
pub struct DnsPacket {
    pub header: DnsHeader,
    pub questions: Vec<DnsQuestion>,
    pub answers: Vec<DnsRecord>,
    pub authorities: Vec<DnsRecord>,
    pub additional: Vec<DnsRecord>,
}

impl DnsPacket {
    pub fn new(header: DnsHeader) -> Self {
        DnsPacket {
            header,
            questions: Vec::new(),
            answers: Vec::new(),
            authorities: Vec::new(),
            additional: Vec::new(),
        }
    }

    pub fn update_counts(&mut self) {
        self.header.qdcount = self.questions.len() as u16;
        self.header.ancount = self.answers.len() as u16;
        self.header.nscount = self.authorities.len() as u16;
        self.header.arcount = self.additional.len() as u16;
    }

    /// The client's advertised UDP payload limit: the `class` field of an
    /// EDNS0 OPT record in `additional`, or the RFC 1035 default.
    pub fn max_udp_payload_size(&self) -> usize {
        self.additional
            .iter()
            .find(|r| r.rtype == DnsQType::OPT)
            .map(|r| u16::from(r.rclass) as usize)
            .filter(|&size| size >= MAX_UDP_PACKET_SIZE)
            .unwrap_or(MAX_UDP_PACKET_SIZE)
    }

    pub fn has_edns(&self) -> bool {
        self.additional.iter().any(|r| r.rtype == DnsQType::OPT)
    }

    fn opt_record() -> DnsRecord {
        DnsRecord {
            name: String::new(),
            rtype: DnsQType::OPT,
            rclass: DnsQClass::Other(EDNS_UDP_SIZE),
            ttl: (EDNS_VERSION as u32) << 16,
            rdata: Vec::new(),
        }
    }

    /// Builds a bare response shell (id/rd preserved, qr=1, ra=1) copying
    /// the question section. Callers fill in answers/rcode.
    pub fn create_response(&self) -> Self {
        let mut response = DnsPacket {
            header: DnsHeader {
                id: self.header.id,
                qr: true,
                opcode: self.header.opcode,
                aa: false,
                tc: false,
                rd: self.header.rd,
                ra: true,
                z: 0,
                rcode: DnsResponseCode::NoError.into(),
                qdcount: self.header.qdcount,
                ancount: 0,
                nscount: 0,
                arcount: 0,
            },
            questions: self.questions.clone(),
            answers: Vec::new(),
            authorities: Vec::new(),
            additional: Vec::new(),
        };
        if self.has_edns() {
            response.additional.push(Self::opt_record());
        }
        response.update_counts();
        response
    }

    pub fn error_response(&self, rcode: DnsResponseCode) -> Self {
        let mut response = self.create_response();
        response.header.set_rcode(rcode);
        response
    }

    /// Response to a request with zero questions: an empty message with
    /// the same id, no rcode-specific meaning implied.
    pub fn empty_response(request_id: u16) -> Self {
        DnsPacket::new(DnsHeader {
            id: request_id,
            qr: true,
            ra: true,
            ..Default::default()
        })
    }

    /// Truncates answers/authorities/additional (in that reverse order)
    /// until the encoded size fits `max_len`, setting TC=1 if anything
    /// was dropped.
    pub fn truncate_to(&mut self, max_len: usize) {
        if self.to_wire().len() <= max_len {
            return;
        }
        self.header.tc = true;
        while !self.additional.is_empty() && self.to_wire().len() > max_len {
            self.additional.pop();
        }
        while !self.authorities.is_empty() && self.to_wire().len() > max_len {
            self.authorities.pop();
        }
        while self.answers.len() > 1 && self.to_wire().len() > max_len {
            self.answers.pop();
        }
        self.update_counts();
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut packet = self.clone();
        packet.update_counts();
        let mut bytes = Vec::new();
        packet.header.to_wire(&mut bytes);
        for question in &packet.questions {
            question.to_wire(&mut bytes);
        }
        for answer in &packet.answers {
            answer.to_wire(&mut bytes);
        }
        for authority in &packet.authorities {
            authority.to_wire(&mut bytes);
        }
        for additional in &packet.additional {
            additional.to_wire(&mut bytes);
        }
        bytes
    }

    pub fn from_wire(buf: &[u8]) -> Result<Self, CodecError> {
        let mut offset = 0usize;
        let header = DnsHeader::from_wire(buf, &mut offset)?;

        if !matches!(header.opcode(), DnsOpcode::Query) {
            // Still parse the envelope; callers decide how to respond to
            // unsupported opcodes.
        }

        let mut questions = Vec::with_capacity(header.qdcount as usize);
        for _ in 0..header.qdcount {
            questions.push(DnsQuestion::from_wire(buf, &mut offset)?);
        }
        let mut answers = Vec::with_capacity(header.ancount as usize);
        for _ in 0..header.ancount {
            answers.push(DnsRecord::from_wire(buf, &mut offset)?);
        }
        let mut authorities = Vec::with_capacity(header.nscount as usize);
        for _ in 0..header.nscount {
            authorities.push(DnsRecord::from_wire(buf, &mut offset)?);
        }
        let mut additional = Vec::with_capacity(header.arcount as usize);
        for _ in 0..header.arcount {
            additional.push(DnsRecord::from_wire(buf, &mut offset)?);
        }

        Ok(DnsPacket {
            header,
            questions,
            answers,
            authorities,
            additional,
        })
    }

    pub fn qr(&self) -> DnsQr {
        self.header.qr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_query() -> DnsPacket {
        let mut packet = DnsPacket::new(DnsHeader {
            id: 42,
            rd: true,
            qdcount: 1,
            ..Default::default()
        });
        packet.questions.push(DnsQuestion {
            name: "example.com".to_string(),
            qtype: DnsQType::A,
            qclass: DnsQClass::IN,
        });
        packet
    }

    #[test]
    fn round_trips_a_query() {
        let packet = sample_query();
        let bytes = packet.to_wire();
        let decoded = DnsPacket::from_wire(&bytes).unwrap();
        assert_eq!(decoded.header.id, 42);
        assert_eq!(decoded.questions.len(), 1);
        assert_eq!(decoded.questions[0].name, "example.com");
        assert_eq!(decoded.questions[0].qtype, DnsQType::A);
    }

    #[test]
    fn create_response_preserves_id_and_rd() {
        let query = sample_query();
        let response = query.create_response();
        assert_eq!(response.header.id, 42);
        assert!(response.header.rd);
        assert!(response.header.qr);
    }

    #[test]
    fn truncate_sets_tc_and_shrinks() {
        let mut response = sample_query().create_response();
        for i in 0..200u32 {
            response
                .answers
                .push(DnsRecord::a("example.com", 300, std::net::Ipv4Addr::new(1, 2, 3, (i % 255) as u8)));
        }
        response.update_counts();
        let full_len = response.to_wire().len();
        response.truncate_to(200);
        assert!(response.header.tc);
        assert!(response.to_wire().len() < full_len);
    }
}
