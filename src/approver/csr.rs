//! # Request Parsing
//!
//! Decodes the PEM-encoded PKCS#10 payload embedded in a certificate signing
//! request into the handful of fields the recognizers care about. The
//! signature is not verified here; the control plane already bound the
//! request bytes to the requester identity.

use std::net::IpAddr;

use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::prelude::FromDer;

const CSR_PEM_TAG: &str = "CERTIFICATE REQUEST";

/// Malformed request bytes. Permanent until the object itself changes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseCsrError {
    #[error("PEM block type must be CERTIFICATE REQUEST")]
    WrongBlockType,
    #[error("malformed PEM: {0}")]
    Pem(String),
    #[error("malformed certificate request: {0}")]
    Der(String),
}

/// The parsed subject and SAN fields of a certificate request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CertificateRequestInfo {
    pub common_name: String,
    pub organization: Vec<String>,
    pub dns_names: Vec<String>,
    pub email_addresses: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub uris: Vec<String>,
}

/// Extract and decode the PEM block from raw request bytes.
pub fn parse_csr(pem_bytes: &[u8]) -> Result<CertificateRequestInfo, ParseCsrError> {
    let block = pem::parse(pem_bytes).map_err(|err| ParseCsrError::Pem(err.to_string()))?;
    if block.tag() != CSR_PEM_TAG {
        return Err(ParseCsrError::WrongBlockType);
    }

    let (_, request) = X509CertificationRequest::from_der(block.contents())
        .map_err(|err| ParseCsrError::Der(err.to_string()))?;

    let subject = &request.certification_request_info.subject;
    let mut info = CertificateRequestInfo {
        common_name: subject
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .unwrap_or_default()
            .to_string(),
        organization: subject
            .iter_organization()
            .filter_map(|attr| attr.as_str().ok())
            .map(str::to_string)
            .collect(),
        ..CertificateRequestInfo::default()
    };

    if let Some(extensions) = request.requested_extensions() {
        for extension in extensions {
            if let ParsedExtension::SubjectAlternativeName(san) = extension {
                for name in &san.general_names {
                    match name {
                        GeneralName::DNSName(dns) => info.dns_names.push((*dns).to_string()),
                        GeneralName::RFC822Name(email) => {
                            info.email_addresses.push((*email).to_string());
                        }
                        GeneralName::IPAddress(bytes) => {
                            info.ip_addresses.push(parse_ip_address(*bytes)?);
                        }
                        GeneralName::URI(uri) => info.uris.push((*uri).to_string()),
                        _ => {}
                    }
                }
            }
        }
    }

    Ok(info)
}

fn parse_ip_address(bytes: &[u8]) -> Result<IpAddr, ParseCsrError> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().expect("length checked");
            Ok(IpAddr::from(octets))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().expect("length checked");
            Ok(IpAddr::from(octets))
        }
        len => Err(ParseCsrError::Der(format!(
            "IP subjectAltName has invalid length {len}"
        ))),
    }
}
