// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::binding::UrlBinding;
use crate::errors::{BindingError, EgressError};
use crate::tls;
use crate::translate::to_syslog_messages;
use crate::writer::{Writer, WriterConfig};
use async_trait::async_trait;
use log_stream::Envelope;
use reqwest::header::CONTENT_TYPE;
use url::Url;

/// Posts each RFC 5424 message as its own request body.
///
/// A failure part way through an envelope is reported for the whole write;
/// messages already accepted are not taken back.
pub struct HttpsWriter {
    hostname: String,
    url: Url,
    client: reqwest::Client,
}

impl HttpsWriter {
    pub fn new(binding: &UrlBinding, config: &WriterConfig) -> Result<Self, BindingError> {
        let client = tls::create_reqwest_client_builder(config.skip_cert_verify)?
            .timeout(config.io_timeout)
            .connect_timeout(config.dial_timeout)
            .tcp_keepalive(Some(config.keepalive))
            .build()
            .map_err(|e| BindingError::Tls(e.to_string()))?;
        Ok(Self::with_client(binding, client))
    }

    pub fn with_client(binding: &UrlBinding, client: reqwest::Client) -> Self {
        HttpsWriter {
            hostname: binding.hostname.clone(),
            url: binding.url.clone(),
            client,
        }
    }
}

#[async_trait]
impl Writer for HttpsWriter {
    async fn write(&mut self, envelope: &Envelope) -> Result<(), EgressError> {
        for message in to_syslog_messages(envelope, &self.hostname) {
            let body = message.encode()?;
            let response = self
                .client
                .post(self.url.clone())
                .header(CONTENT_TYPE, "text/plain")
                .body(body)
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(EgressError::Status(status));
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), EgressError> {
        Ok(())
    }
}
