// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! TLS client configuration shared by the TLS stream writer and every HTTP
//! client the forwarder builds.

use crate::errors::BindingError;
use reqwest::ClientBuilder;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Builds a rustls client configuration trusting the webpki root set, or
/// trusting anything when `skip_cert_verify` is set.
pub fn client_config(skip_cert_verify: bool) -> Result<ClientConfig, BindingError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| BindingError::Tls(e.to_string()))?;

    if skip_cert_verify {
        warn!("EGRESS | Certificate verification is disabled");
        return Ok(builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoCertificateVerification(provider)))
            .with_no_client_auth());
    }

    let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    Ok(builder.with_root_certificates(roots).with_no_client_auth())
}

/// Creates a reqwest client builder using the same TLS setup as the writers.
pub fn create_reqwest_client_builder(skip_cert_verify: bool) -> Result<ClientBuilder, BindingError> {
    Ok(reqwest::Client::builder().use_preconfigured_tls(client_config(skip_cert_verify)?))
}

/// Builds a reqwest client. `timeout` bounds whole requests and is left unset
/// for long-lived streaming clients.
pub fn build_client(
    skip_cert_verify: bool,
    timeout: Option<Duration>,
) -> Result<reqwest::Client, BindingError> {
    let mut builder = create_reqwest_client_builder(skip_cert_verify)?;
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|e| BindingError::Tls(e.to_string()))
}

pub(crate) fn server_name(host: &str) -> Result<ServerName<'static>, BindingError> {
    ServerName::try_from(host.to_string()).map_err(|e| BindingError::Tls(e.to_string()))
}

#[derive(Debug)]
struct NoCertificateVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
