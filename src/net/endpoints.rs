//! Trigger and stream URLs derived from one base address.
//!
//! `<base>/api/start` takes the scale-up POST; `<base>/ws` serves the
//! replica stream over the matching WebSocket scheme.

use url::Url;

use super::error::{SyncError, SyncResult};

const TRIGGER_PATH: &str = "api/start";
const STREAM_PATH: &str = "ws";

#[derive(Clone, Debug)]
pub struct Endpoints {
    pub trigger: Url,
    pub stream: Url,
}

impl Endpoints {
    pub fn from_base(base: &str) -> SyncResult<Self> {
        let parsed = Url::parse(base).map_err(|source| SyncError::InvalidBaseUrl {
            url: base.to_string(),
            source,
        })?;

        let (http_scheme, ws_scheme) = match parsed.scheme() {
            "http" | "ws" => ("http", "ws"),
            "https" | "wss" => ("https", "wss"),
            other => return Err(SyncError::UnsupportedScheme(other.to_string())),
        };

        Ok(Endpoints {
            trigger: join(&parsed, http_scheme, TRIGGER_PATH)?,
            stream: join(&parsed, ws_scheme, STREAM_PATH)?,
        })
    }
}

fn join(base: &Url, scheme: &str, path: &str) -> SyncResult<Url> {
    let mut url = base.clone();
    url.set_scheme(scheme)
        .map_err(|_| SyncError::UnsupportedScheme(scheme.to_string()))?;
    let base_path = base.path().trim_end_matches('/');
    url.set_path(&format!("{}/{}", base_path, path));
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
