use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart;
use serde::Deserialize;
use url::Url;

use super::{ContentError, ContentHash, ContentStore};

/// Upper bound on an IPNS resolution unless configured otherwise
pub const DEFAULT_IPNS_RESOLVE_TIMEOUT: Duration = Duration::from_secs(1);
/// Extra time the HTTP call gets on top of the node-side resolve timeout
const RESOLVE_GRACE: Duration = Duration::from_millis(500);
/// Ask for key ids as base58 multihashes rather than CIDv1
const IPNS_BASE: (&str, &str) = ("ipns-base", "b58mh");

/// Blob store backed by the HTTP API of an IPFS node
///
/// Besides `add`/`cat` it exposes the node's IPNS keys and name records.
/// IPNS keys live on the node: anyone with access to its API can move a
/// name published under them.
#[derive(Debug, Clone)]
pub struct IpfsHttpStore {
    api_url: Url,
    client: reqwest::Client,
    resolve_timeout: Duration,
}

/// A named IPNS key held by the node
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IpnsKey {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Id")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

#[derive(Debug, Deserialize)]
struct KeyListResponse {
    #[serde(rename = "Keys", default)]
    keys: Vec<IpnsKey>,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ResolveResponse {
    #[serde(rename = "Path")]
    path: String,
}

fn timeout_or(e: reqwest::Error, what: &str) -> ContentError {
    if e.is_timeout() {
        ContentError::Timeout(what.to_string())
    } else {
        ContentError::Reqwest(e)
    }
}

impl IpfsHttpStore {
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            client: reqwest::Client::new(),
            resolve_timeout: DEFAULT_IPNS_RESOLVE_TIMEOUT,
        }
    }

    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    /// `api_url` + `/api/v0/{command}`, keeping any path prefix of `api_url`.
    fn command_url(&self, command: &str) -> Result<Url, ContentError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("ipfs api url {} cannot be a base", self.api_url))?
            .pop_if_empty()
            .extend(["api", "v0"])
            .extend(command.split('/'));
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ContentError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(anyhow::anyhow!("ipfs api returned {}: {}", status, body).into())
    }

    /// Keys known to the node (`key/list`).
    pub async fn key_list(&self) -> Result<Vec<IpnsKey>, ContentError> {
        let response = self
            .client
            .post(self.command_url("key/list")?)
            .query(&[IPNS_BASE])
            .send()
            .await?;
        let listed: KeyListResponse = Self::check(response).await?.json().await?;
        Ok(listed.keys)
    }

    /// Create a 2048-bit RSA key named `name` (`key/gen`). IPNS does not take
    /// EC keys.
    pub async fn key_gen(&self, name: &str) -> Result<IpnsKey, ContentError> {
        let response = self
            .client
            .post(self.command_url("key/gen")?)
            .query(&[("arg", name), ("type", "rsa"), ("size", "2048"), IPNS_BASE])
            .send()
            .await?;
        let key: IpnsKey = Self::check(response).await?.json().await?;
        tracing::info!("created ipns key {} ({})", key.name, key.id);
        Ok(key)
    }

    /// The key called `name`, generated if the node has none.
    pub async fn get_or_create_key(&self, name: &str) -> Result<IpnsKey, ContentError> {
        if let Some(key) = self.key_list().await?.into_iter().find(|key| key.name == name) {
            tracing::debug!("found ipns key {} ({})", key.name, key.id);
            return Ok(key);
        }
        self.key_gen(name).await
    }

    /// Point the IPNS name of key `key_name` at `target`, creating the key if
    /// needed. Returns the permanent name as a content hash.
    pub async fn name_publish(
        &self,
        key_name: &str,
        target: &ContentHash,
    ) -> Result<ContentHash, ContentError> {
        self.get_or_create_key(key_name).await?;
        let path = format!("/ipfs/{}", target.to_native_id());
        let response = self
            .client
            .post(self.command_url("name/publish")?)
            .query(&[("arg", path.as_str()), ("key", key_name), IPNS_BASE])
            .send()
            .await?;
        let published: PublishResponse = Self::check(response).await?.json().await?;
        let name = ContentHash::from_native_id(&published.name)?;
        tracing::info!("published {} under ipns name {}", target, name);
        Ok(name)
    }

    /// Content hash the IPNS `name` currently points at.
    ///
    /// Fails with [`ContentError::Timeout`] once the resolve timeout passes.
    pub async fn name_resolve(&self, name: &ContentHash) -> Result<ContentHash, ContentError> {
        let path = format!("/ipns/{}", name.to_native_id());
        let node_timeout = format!("{}ms", self.resolve_timeout.as_millis());
        let response = self
            .client
            .post(self.command_url("name/resolve")?)
            .query(&[("arg", path.as_str()), ("timeout", node_timeout.as_str())])
            .timeout(self.resolve_timeout + RESOLVE_GRACE)
            .send()
            .await
            .map_err(|e| timeout_or(e, &path))?;
        let resolved: ResolveResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| timeout_or(e, &path))?;
        let native = resolved
            .path
            .strip_prefix("/ipfs/")
            .ok_or_else(|| anyhow::anyhow!("unexpected ipns target {}", resolved.path))?;
        ContentHash::from_native_id(native)
    }
}

#[async_trait]
impl ContentStore for IpfsHttpStore {
    async fn put(&self, data: Bytes) -> Result<String, ContentError> {
        let form = multipart::Form::new().part("file", multipart::Part::bytes(data.to_vec()));
        let response = self
            .client
            .post(self.command_url("add")?)
            .query(&[("cid-version", "0")])
            .multipart(form)
            .send()
            .await?;
        let added: AddResponse = Self::check(response).await?.json().await?;
        tracing::debug!("stored {} bytes at {}", data.len(), added.hash);
        Ok(added.hash)
    }

    async fn get(&self, native_id: &str) -> Result<Bytes, ContentError> {
        let response = self
            .client
            .post(self.command_url("cat")?)
            .query(&[("arg", native_id)])
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ContentError::NotFound(native_id.to_string()));
        }
        Ok(Self::check(response).await?.bytes().await?)
    }
}
