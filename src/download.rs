use std::path::Path;

use bytes::Bytes;
use thiserror::Error;

use crate::emote_ext::{Cdn, EmoteId};

const USER_AGENT: &str = "\
    Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) \
    Chrome/110.0.0.0 Safari/537.36";

#[derive(Error, Debug)]
#[error("couldn't download `{id}`: {reason} ({status:?})")]
pub struct FetchError {
    pub id: String,
    pub status: Option<u16>,
    pub reason: String,
}

impl FetchError {
    fn new(id: EmoteId, err: reqwest::Error) -> Self {
        Self {
            id: id.to_string(),
            status: err.status().map(|status| status.as_u16()),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    inner: reqwest::Client,
    cdn: Cdn,
}

impl Client {
    pub fn new(cdn: Cdn) -> anyhow::Result<Client> {
        Ok(Self {
            inner: reqwest::ClientBuilder::new()
                .user_agent(USER_AGENT)
                .build()?,
            cdn,
        })
    }

    pub async fn get_emote(&self, id: EmoteId) -> Result<Bytes, FetchError> {
        let url = id.to_url(&self.cdn);
        let response = self
            .inner
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| FetchError::new(id, err))?;
        response.bytes().await.map_err(|err| FetchError::new(id, err))
    }
}

pub async fn save_to_file(data: &Bytes, dst: impl AsRef<Path>) -> std::io::Result<()> {
    tokio::fs::write(dst.as_ref(), data).await
}
