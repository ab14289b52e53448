//! Typed client over the per-class list, link, and control endpoints.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::json;

use super::credential::Credential;
use super::envelope::{decode_ack, decode_items, decode_link};
use super::error::{ApiError, TransportError};
use super::transport::{ApiRequest, Method, Transport};
use crate::item::Item;
use crate::resource::ResourceClass;

/// Item-level lifecycle operations accepted by the control endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    Reannounce,
    StopSeeding,
    Pause,
    Resume,
    ForceStart,
    Delete,
}

impl ControlOp {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlOp::Reannounce => "reannounce",
            ControlOp::StopSeeding => "stop_seeding",
            ControlOp::Pause => "pause",
            ControlOp::Resume => "resume",
            ControlOp::ForceStart => "force_start",
            ControlOp::Delete => "delete",
        }
    }
}

impl fmt::Display for ControlOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "reannounce" => Ok(ControlOp::Reannounce),
            "stop_seeding" => Ok(ControlOp::StopSeeding),
            "pause" => Ok(ControlOp::Pause),
            "resume" => Ok(ControlOp::Resume),
            "force_start" => Ok(ControlOp::ForceStart),
            "delete" => Ok(ControlOp::Delete),
            other => Err(format!("unknown control operation: {other}")),
        }
    }
}

/// Client bound to one credential. Cloning shares the transport.
pub struct QueueApi<T> {
    transport: Arc<T>,
    base: String,
    credential: Credential,
}

impl<T> Clone for QueueApi<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            base: self.base.clone(),
            credential: self.credential.clone(),
        }
    }
}

impl<T: Transport> QueueApi<T> {
    pub fn new(transport: Arc<T>, base: impl Into<String>, credential: Credential) -> Self {
        Self {
            transport,
            base: base.into().trim_end_matches('/').to_string(),
            credential,
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    fn endpoint(
        &self,
        class: ResourceClass,
        name: &str,
        query: &[(&str, String)],
    ) -> Result<String, ApiError> {
        let raw = format!("{}/{}/{}", self.base, class.as_str(), name);
        let mut url = url::Url::parse(&raw)
            .map_err(|e| TransportError::Other(format!("invalid URL {raw}: {e}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url.into())
    }

    /// `GET /{class}/mylist`.
    pub async fn list(&self, class: ResourceClass, bypass_cache: bool) -> Result<Vec<Item>, ApiError> {
        let mut query = Vec::new();
        if bypass_cache {
            query.push(("bypass_cache", "true".to_string()));
        }
        let url = self.endpoint(class, "mylist", &query)?;
        let resp = self
            .transport
            .send(ApiRequest {
                method: Method::Get,
                url,
                credential: self.credential.clone(),
                json_body: None,
            })
            .await?;
        decode_items(&resp)
    }

    /// `GET /{class}/requestdl`. Whole-item requests ask for an archive link.
    pub async fn request_link(
        &self,
        class: ResourceClass,
        item_id: u64,
        file_id: Option<u64>,
    ) -> Result<String, ApiError> {
        let mut query = vec![
            ("token", self.credential.expose().to_string()),
            (class.id_param(), item_id.to_string()),
        ];
        match file_id {
            Some(f) => query.push(("file_id", f.to_string())),
            None => query.push(("zip_link", "true".to_string())),
        }
        let url = self.endpoint(class, "requestdl", &query)?;
        let resp = self
            .transport
            .send(ApiRequest {
                method: Method::Get,
                url,
                credential: self.credential.clone(),
                json_body: None,
            })
            .await?;
        decode_link(&resp)
    }

    /// `POST /{class}/control*` with `{<id_param>: id, operation: op}`.
    pub async fn control(
        &self,
        class: ResourceClass,
        item_id: u64,
        op: ControlOp,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(class, class.control_endpoint(), &[])?;
        let resp = self
            .transport
            .send(ApiRequest {
                method: Method::Post,
                url,
                credential: self.credential.clone(),
                json_body: Some(json!({
                    class.id_param(): item_id,
                    "operation": op.as_str(),
                })),
            })
            .await?;
        decode_ack(&resp)
    }
}
