//! TLS certificate checker.
//!
//! The chain and host name are verified against the webpki roots, but at a
//! point in time inside the leaf's own validity window. An expired or
//! not-yet-valid certificate therefore still completes the handshake and is
//! reported by [`classify_validity`] instead of as a generic TLS failure.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::ring;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::catalog::MonitorTypeInfo;
use crate::checker::{Checker, Probe, require_host, run_probe};
use crate::error::CheckError;
use crate::types::{CheckResult, MonitorConfig};

const DEFAULT_PORT: u16 = 443;
const DEFAULT_WARN_DAYS: i64 = 14;
const SECONDS_PER_DAY: i64 = 86_400;

const SSL_TYPES: &[MonitorTypeInfo] = &[MonitorTypeInfo {
    monitor_type: "ssl",
    name: "SSL Certificate",
    description: "Check a TLS certificate and warn before it expires",
    icon: "shield",
    fields: &["hostname", "port", "ssl_expiry_warn_days", "timeout"],
    default_port: Some(DEFAULT_PORT),
    is_game_server: false,
}];

/// TLS certificate checker
#[derive(Debug, Default, Clone, Copy)]
pub struct SslChecker;

impl SslChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Checker for SslChecker {
    fn supported_types(&self) -> &'static [MonitorTypeInfo] {
        SSL_TYPES
    }

    async fn check(&self, config: &MonitorConfig) -> CheckResult {
        run_probe(config.timeout(), probe_ssl(config)).await
    }
}

/// Fields pulled out of the peer's leaf certificate
#[derive(Debug, Clone, PartialEq)]
struct CertificateDetails {
    common_name: Option<String>,
    issuer: Option<String>,
    valid_from: i64,
    valid_to: i64,
    serial_number: String,
    signature_algorithm: String,
    dns_names: Vec<String>,
}

async fn probe_ssl(config: &MonitorConfig) -> Result<Probe, CheckError> {
    let host = require_host(config)?;
    let port = config.port_or(DEFAULT_PORT);
    let warn_days = config.ssl_expiry_warn_days.unwrap_or(DEFAULT_WARN_DAYS);
    debug!("SSL check: fetching certificate from {}:{}", host, port);

    let der = fetch_peer_certificate(&host, port).await?;
    let details = parse_certificate(der.as_ref())?;

    let now = Utc::now().timestamp();
    let (days_until_expiry, warning) =
        classify_validity(details.valid_from, details.valid_to, now, warn_days)?;

    let mut probe = Probe::new()
        .insert("host", host)
        .insert("port", port)
        .insert("common_name", details.common_name)
        .insert("issuer", details.issuer)
        .insert("valid_from", format_timestamp(details.valid_from))
        .insert("valid_to", format_timestamp(details.valid_to))
        .insert("days_until_expiry", days_until_expiry)
        .insert("serial_number", details.serial_number)
        .insert("signature_algorithm", details.signature_algorithm)
        .insert("san", details.dns_names);
    if let Some(warning) = warning {
        probe = probe.insert("warning", warning);
    }

    Ok(probe)
}

async fn fetch_peer_certificate(
    host: &str,
    port: u16,
) -> Result<CertificateDer<'static>, CheckError> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| CheckError::validation(format!("Invalid server name {host}: {e}")))?;
    let connector = TlsConnector::from(Arc::new(client_config()?));

    let tcp = TcpStream::connect((host, port))
        .await
        .map_err(|e| CheckError::connection(format!("TCP connection failed: {e}")))?;
    let mut stream = connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| CheckError::connection(format!("TLS handshake failed: {e}")))?;

    let certificate = stream
        .get_ref()
        .1
        .peer_certificates()
        .and_then(|chain| chain.first())
        .cloned()
        .ok_or_else(|| CheckError::protocol("Server presented no certificate"));

    let _ = stream.shutdown().await;
    certificate
}

fn client_config() -> Result<ClientConfig, CheckError> {
    let provider = Arc::new(ring::default_provider());
    let roots = Arc::new(RootCertStore { roots: webpki_roots::TLS_SERVER_ROOTS.to_vec() });
    let inner = WebPkiServerVerifier::builder_with_provider(roots, provider.clone())
        .build()
        .map_err(|e| CheckError::connection(format!("Failed to build certificate verifier: {e}")))?;

    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| CheckError::connection(format!("Failed to configure TLS: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(ValidityWindowVerifier { inner }))
        .with_no_client_auth();

    Ok(config)
}

/// Webpki verification performed at a time inside the leaf's validity window
#[derive(Debug)]
struct ValidityWindowVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for ValidityWindowVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let at = match X509Certificate::from_der(end_entity.as_ref()) {
            Ok((_, cert)) => clamp_to_validity(
                now.as_secs(),
                cert.validity().not_before.timestamp(),
                cert.validity().not_after.timestamp(),
            ),
            Err(_) => now,
        };
        self.inner.verify_server_cert(end_entity, intermediates, server_name, ocsp_response, at)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

fn clamp_to_validity(now: u64, not_before: i64, not_after: i64) -> UnixTime {
    let lower = not_before.max(0) as u64;
    let upper = (not_after.max(0) as u64).max(lower);
    UnixTime::since_unix_epoch(Duration::from_secs(now.clamp(lower, upper)))
}

fn parse_certificate(der: &[u8]) -> Result<CertificateDetails, CheckError> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| CheckError::protocol(format!("Failed to parse certificate: {e}")))?;

    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(String::from);
    let issuer = cert
        .issuer()
        .iter_organization()
        .next()
        .or_else(|| cert.issuer().iter_common_name().next())
        .and_then(|attr| attr.as_str().ok())
        .map(String::from);

    let mut dns_names = Vec::new();
    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for name in &san.value.general_names {
            if let GeneralName::DNSName(dns) = name {
                dns_names.push(dns.to_string());
            }
        }
    }

    Ok(CertificateDetails {
        common_name,
        issuer,
        valid_from: cert.validity().not_before.timestamp(),
        valid_to: cert.validity().not_after.timestamp(),
        serial_number: cert.raw_serial_as_string(),
        signature_algorithm: signature_algorithm_name(
            &cert.signature_algorithm.algorithm.to_id_string(),
        ),
        dns_names,
    })
}

/// Classify a certificate's validity window against `now`.
///
/// Returns the whole days left and a warning once they drop to `warn_days`.
fn classify_validity(
    valid_from: i64,
    valid_to: i64,
    now: i64,
    warn_days: i64,
) -> Result<(i64, Option<String>), CheckError> {
    if valid_to < now {
        return Err(CheckError::validation("Certificate has expired"));
    }
    if valid_from > now {
        return Err(CheckError::validation("Certificate is not yet valid"));
    }

    let days_until_expiry = (valid_to - now) / SECONDS_PER_DAY;
    let warning = (days_until_expiry <= warn_days)
        .then(|| format!("Certificate expires in {days_until_expiry} days"));

    Ok((days_until_expiry, warning))
}

fn signature_algorithm_name(oid: &str) -> String {
    let name = match oid {
        "1.2.840.113549.1.1.5" => "sha1WithRSAEncryption",
        "1.2.840.113549.1.1.10" => "RSASSA-PSS",
        "1.2.840.113549.1.1.11" => "sha256WithRSAEncryption",
        "1.2.840.113549.1.1.12" => "sha384WithRSAEncryption",
        "1.2.840.113549.1.1.13" => "sha512WithRSAEncryption",
        "1.2.840.10045.4.3.2" => "ecdsa-with-SHA256",
        "1.2.840.10045.4.3.3" => "ecdsa-with-SHA384",
        "1.2.840.10045.4.3.4" => "ecdsa-with-SHA512",
        "1.3.101.112" => "Ed25519",
        other => other,
    };
    name.to_string()
}

fn format_timestamp(timestamp: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|dt| dt.to_rfc3339())
}
