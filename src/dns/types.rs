use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsOpcode {
    Query,
    IQuery,
    Status,
    Other(u8),
}

impl From<u8> for DnsOpcode {
    fn from(value: u8) -> Self {
        match value {
            0 => DnsOpcode::Query,
            1 => DnsOpcode::IQuery,
            2 => DnsOpcode::Status,
            other => DnsOpcode::Other(other),
        }
    }
}

impl From<DnsOpcode> for u8 {
    fn from(val: DnsOpcode) -> Self {
        match val {
            DnsOpcode::Query => 0,
            DnsOpcode::IQuery => 1,
            DnsOpcode::Status => 2,
            DnsOpcode::Other(value) => value,
        }
    }
}

/// Full RFC 1035 response code set plus the extension codes the forwarder
/// needs to emit itself (FORMERR, SERVFAIL, NOTIMP, REFUSED).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsResponseCode {
    NoError,
    FormErr,
    ServFail,
    NxDomain,
    NotImp,
    Refused,
    Other(u8),
}

impl DnsResponseCode {
    pub fn is_noerror(self) -> bool {
        matches!(self, DnsResponseCode::NoError)
    }
}

impl From<u8> for DnsResponseCode {
    fn from(value: u8) -> Self {
        match value {
            0 => DnsResponseCode::NoError,
            1 => DnsResponseCode::FormErr,
            2 => DnsResponseCode::ServFail,
            3 => DnsResponseCode::NxDomain,
            4 => DnsResponseCode::NotImp,
            5 => DnsResponseCode::Refused,
            other => DnsResponseCode::Other(other),
        }
    }
}

impl From<DnsResponseCode> for u8 {
    fn from(val: DnsResponseCode) -> Self {
        match val {
            DnsResponseCode::NoError => 0,
            DnsResponseCode::FormErr => 1,
            DnsResponseCode::ServFail => 2,
            DnsResponseCode::NxDomain => 3,
            DnsResponseCode::NotImp => 4,
            DnsResponseCode::Refused => 5,
            DnsResponseCode::Other(value) => value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsQr {
    Query,
    Response,
}

impl From<u8> for DnsQr {
    fn from(value: u8) -> Self {
        if value == 1 { DnsQr::Response } else { DnsQr::Query }
    }
}

impl From<DnsQr> for u8 {
    fn from(val: DnsQr) -> Self {
        match val {
            DnsQr::Query => 0,
            DnsQr::Response => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DnsQType {
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    MX,
    TXT,
    AAAA,
    SRV,
    OPT,
    ANY,
    Other(u16),
}

impl From<u16> for DnsQType {
    fn from(value: u16) -> Self {
        match value {
            1 => DnsQType::A,
            2 => DnsQType::NS,
            5 => DnsQType::CNAME,
            6 => DnsQType::SOA,
            12 => DnsQType::PTR,
            15 => DnsQType::MX,
            16 => DnsQType::TXT,
            28 => DnsQType::AAAA,
            33 => DnsQType::SRV,
            41 => DnsQType::OPT,
            255 => DnsQType::ANY,
            other => DnsQType::Other(other),
        }
    }
}

impl From<DnsQType> for u16 {
    fn from(val: DnsQType) -> Self {
        match val {
            DnsQType::A => 1,
            DnsQType::NS => 2,
            DnsQType::CNAME => 5,
            DnsQType::SOA => 6,
            DnsQType::PTR => 12,
            DnsQType::MX => 15,
            DnsQType::TXT => 16,
            DnsQType::AAAA => 28,
            DnsQType::SRV => 33,
            DnsQType::OPT => 41,
            DnsQType::ANY => 255,
            DnsQType::Other(value) => value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DnsQClass {
    IN,
    CS,
    CH,
    HS,
    ANY,
    Other(u16),
}

impl From<u16> for DnsQClass {
    fn from(value: u16) -> Self {
        match value {
            1 => DnsQClass::IN,
            2 => DnsQClass::CS,
            3 => DnsQClass::CH,
            4 => DnsQClass::HS,
            255 => DnsQClass::ANY,
            other => DnsQClass::Other(other),
        }
    }
}

impl From<DnsQClass> for u16 {
    fn from(val: DnsQClass) -> Self {
        match val {
            DnsQClass::IN => 1,
            DnsQClass::CS => 2,
            DnsQClass::CH => 3,
            DnsQClass::HS => 4,
            DnsQClass::ANY => 255,
            DnsQClass::Other(value) => value,
        }
    }
}
