// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Source catalog: resolves which sources should currently be streamed.
//!
//! Two scopes are supported. A single source is resolved by GUID, trying the
//! app endpoint first and the service instance endpoint second. A space scope
//! returns every service instance and app in the space, minus anything the
//! caller chooses to exclude (usually the forwarder's own app).
//!
//! Any non-2xx response or malformed body fails the whole poll; partial
//! results are never returned.

use crate::auth::TokenSource;
use crate::errors::CatalogError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;
use tracing::debug;

/// A source as seen by one catalog poll. Identity is the GUID only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct Resource {
    pub guid: String,
    #[serde(default)]
    pub name: String,
}

impl Resource {
    pub fn new(guid: &str, name: &str) -> Self {
        Self {
            guid: guid.to_string(),
            name: name.to_string(),
        }
    }
}

#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Returns the desired source set. Errors are transient from the caller's
    /// point of view.
    async fn resources(&self) -> Result<Vec<Resource>, CatalogError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Source(String),
    Space(String),
}

pub type ExcludeFn = Box<dyn Fn(&Resource) -> bool + Send + Sync>;

#[derive(Deserialize)]
struct Page {
    #[serde(default)]
    resources: Vec<Resource>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Deserialize)]
struct Pagination {
    #[serde(default)]
    next: Option<Link>,
}

#[derive(Deserialize)]
struct Link {
    href: String,
}

/// Thin client over the cloud controller endpoints the forwarder needs.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    api_addr: String,
    token_source: Arc<TokenSource>,
}

impl CatalogClient {
    pub fn new(client: reqwest::Client, api_addr: &str, token_source: Arc<TokenSource>) -> Self {
        CatalogClient {
            client,
            api_addr: api_addr.trim_end_matches('/').to_string(),
            token_source,
        }
    }

    pub async fn app(&self, guid: &str) -> Result<Option<Resource>, CatalogError> {
        self.get_optional(self.endpoint(&["v3", "apps", guid], None)?)
            .await
    }

    pub async fn service_instance(&self, guid: &str) -> Result<Option<Resource>, CatalogError> {
        self.get_optional(self.endpoint(&["v3", "service_instances", guid], None)?)
            .await
    }

    pub async fn apps_in_space(&self, space_guid: &str) -> Result<Vec<Resource>, CatalogError> {
        self.list(self.endpoint(&["v3", "apps"], Some(("space_guids", space_guid)))?)
            .await
    }

    pub async fn service_instances_in_space(
        &self,
        space_guid: &str,
    ) -> Result<Vec<Resource>, CatalogError> {
        self.list(self.endpoint(
            &["v3", "service_instances"],
            Some(("space_guids", space_guid)),
        )?)
        .await
    }

    /// Appends `segments` to the API address, percent-encoding each one.
    fn endpoint(&self, segments: &[&str], query: Option<(&str, &str)>) -> Result<Url, CatalogError> {
        let mut url = Url::parse(&self.api_addr)?;
        url.path_segments_mut()
            .map_err(|()| CatalogError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        if let Some((key, value)) = query {
            url.query_pairs_mut().append_pair(key, value);
        }
        Ok(url)
    }

    async fn list(&self, first_page: Url) -> Result<Vec<Resource>, CatalogError> {
        let mut resources = Vec::new();
        let mut next = Some(first_page);
        while let Some(url) = next {
            let page: Page = self.get(&url).await?;
            resources.extend(page.resources);
            next = match page.pagination.and_then(|p| p.next) {
                Some(link) => Some(Url::parse(&link.href)?),
                None => None,
            };
        }
        Ok(resources)
    }

    async fn get_optional(&self, url: Url) -> Result<Option<Resource>, CatalogError> {
        match self.get(&url).await {
            Ok(resource) => Ok(Some(resource)),
            Err(CatalogError::Status { status, .. }) if status == StatusCode::NOT_FOUND => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &Url) -> Result<T, CatalogError> {
        let token = self.token_source.token().await?;
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(CatalogError::Status {
                status,
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| CatalogError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// [`ResourceProvider`] backed by the catalog for a single scope.
pub struct CatalogProvider {
    catalog: CatalogClient,
    scope: Scope,
    exclude: Option<ExcludeFn>,
}

impl CatalogProvider {
    pub fn new(catalog: CatalogClient, scope: Scope) -> Self {
        CatalogProvider {
            catalog,
            scope,
            exclude: None,
        }
    }

    /// Drops resources matching `exclude` from space-wide results.
    #[must_use]
    pub fn with_exclusion(mut self, exclude: ExcludeFn) -> Self {
        self.exclude = Some(exclude);
        self
    }
}

#[async_trait]
impl ResourceProvider for CatalogProvider {
    async fn resources(&self) -> Result<Vec<Resource>, CatalogError> {
        match &self.scope {
            Scope::Source(guid) => {
                if let Some(app) = self.catalog.app(guid).await? {
                    return Ok(vec![app]);
                }
                debug!("{guid} is not an app, looking up service instances");
                match self.catalog.service_instance(guid).await? {
                    Some(service) => Ok(vec![service]),
                    None => Err(CatalogError::NotFound(guid.clone())),
                }
            }
            Scope::Space(space_guid) => {
                let mut resources = self.catalog.service_instances_in_space(space_guid).await?;
                resources.extend(self.catalog.apps_in_space(space_guid).await?);
                if let Some(exclude) = &self.exclude {
                    resources.retain(|r| !exclude(r));
                }
                Ok(resources)
            }
        }
    }
}
