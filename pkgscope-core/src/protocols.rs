pub mod jsr;
pub mod npm;

use crate::config::PkgscopeConfig;
use crate::registry::{Packument, RegistryKind};
use crate::{PkgscopeError, Result};
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Client, StatusCode};
use std::time::Instant;
use tracing::debug;

const INSTALL_ACCEPT: &str = "application/vnd.npm.install-v1+json; q=1.0, application/json; q=0.8";

pub fn encode_package_name(name: &str) -> String {
    match name.strip_prefix('@') {
        Some(rest) => format!("@{}", urlencoding::encode(rest)),
        None => name.to_string(),
    }
}

pub fn packument_url(config: &PkgscopeConfig, name: &str, registry: RegistryKind) -> String {
    match registry {
        RegistryKind::Npm => npm::packument_url(npm::registry_base(config), name),
        RegistryKind::Jsr => npm::packument_url(&config.jsr_registry, &jsr::to_mirror_name(name)),
    }
}

pub async fn fetch_packument(
    config: &PkgscopeConfig,
    client: &Client,
    name: &str,
    registry: RegistryKind,
) -> Result<Packument> {
    let url = packument_url(config, name, registry);

    debug!(%name, %registry, %url, "registry request");
    let started = Instant::now();

    let response = client
        .get(&url)
        .header(ACCEPT, HeaderValue::from_static(INSTALL_ACCEPT))
        .send()
        .await
        .map_err(|source| PkgscopeError::fetch(&url, source))?;

    let status = response.status();
    debug!(
        %name,
        status = status.as_u16(),
        elapsed = started.elapsed().as_secs_f64(),
        "registry response"
    );

    if status == StatusCode::NOT_FOUND {
        return Err(PkgscopeError::PackageNotFound {
            name: name.to_string(),
            registry: registry.to_string(),
        });
    }

    if !status.is_success() {
        return Err(PkgscopeError::fetch(&url, format!("HTTP {status}")));
    }

    let body = response
        .bytes()
        .await
        .map_err(|source| PkgscopeError::fetch(&url, source))?;

    if body.is_empty() {
        return Err(PkgscopeError::fetch(&url, "empty response body"));
    }

    let packument = serde_json::from_slice::<Packument>(&body).map_err(|source| {
        PkgscopeError::InvalidPackument {
            name: name.to_string(),
            source,
        }
    })?;

    debug!(
        %name,
        versions = packument.versions.len(),
        dist_tags = packument.dist_tags.len(),
        "registry decode"
    );

    Ok(packument)
}
