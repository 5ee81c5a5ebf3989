use std::fmt::{Debug, Display};
use std::path::PathBuf;

use lazy_regex::regex_is_match;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdParseError {
    #[error("`{0}` isn't 24 lowercase hex characters")]
    Malformed(String),
}

/// Base urls of the emote CDNs.
#[derive(Debug, Clone)]
pub struct Cdn {
    pub seven_tv: String,
    pub bttv: String,
}

impl Default for Cdn {
    fn default() -> Self {
        Self {
            seven_tv: "https://cdn.7tv.app".to_string(),
            bttv: "https://cdn.betterttv.net".to_string(),
        }
    }
}

impl Cdn {
    /// `SEVEN_TV_CDN` and `BTTV_CDN` override the public hosts.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            seven_tv: dotenv::var("SEVEN_TV_CDN").unwrap_or(default.seven_tv),
            bttv: dotenv::var("BTTV_CDN").unwrap_or(default.bttv),
        }
    }
}

pub trait EmoteIdExt
where
    Self: Sized,
{
    fn parse_id(input: &str) -> Result<Self, IdParseError>;

    fn to_url(&self, cdn: &Cdn) -> String;
    fn to_file_name(&self) -> PathBuf;
}

fn parse_raw_id(input: &str) -> Result<[u8; 12], IdParseError> {
    if !regex_is_match!("^[0-9a-f]{24}$", input) {
        return Err(IdParseError::Malformed(input.to_string()));
    }
    let mut id = [0u8; 12];
    hex::decode_to_slice(input, &mut id).map_err(|_| IdParseError::Malformed(input.to_string()))?;
    Ok(id)
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SevenTvId([u8; 12]);

impl Display for SevenTvId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
impl Debug for SevenTvId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SevenTvId")
            .field(&hex::encode(self.0))
            .finish()
    }
}

impl EmoteIdExt for SevenTvId {
    fn parse_id(input: &str) -> Result<Self, IdParseError> {
        parse_raw_id(input).map(SevenTvId)
    }
    fn to_url(&self, cdn: &Cdn) -> String {
        format!("{}/emote/{self}/4x.webp", cdn.seven_tv)
    }
    fn to_file_name(&self) -> PathBuf {
        PathBuf::from(format!("{self}.webp"))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BttvId([u8; 12]);

impl Display for BttvId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
impl Debug for BttvId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BttvId").field(&hex::encode(self.0)).finish()
    }
}

impl EmoteIdExt for BttvId {
    fn parse_id(input: &str) -> Result<Self, IdParseError> {
        parse_raw_id(input).map(BttvId)
    }
    fn to_url(&self, cdn: &Cdn) -> String {
        format!("{}/emote/{self}/3x.webp", cdn.bttv)
    }
    /// Prefixed, both CDNs share the id space.
    fn to_file_name(&self) -> PathBuf {
        PathBuf::from(format!("bttv_{self}.webp"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmoteId {
    SevenTv(SevenTvId),
    Bttv(BttvId),
}

impl From<&SevenTvId> for EmoteId {
    fn from(id: &SevenTvId) -> Self {
        Self::SevenTv(*id)
    }
}

impl From<&BttvId> for EmoteId {
    fn from(id: &BttvId) -> Self {
        Self::Bttv(*id)
    }
}

impl EmoteId {
    pub fn to_url(&self, cdn: &Cdn) -> String {
        match self {
            EmoteId::SevenTv(id) => id.to_url(cdn),
            EmoteId::Bttv(id) => id.to_url(cdn),
        }
    }
    pub fn to_file_name(&self) -> PathBuf {
        match self {
            EmoteId::SevenTv(id) => id.to_file_name(),
            EmoteId::Bttv(id) => id.to_file_name(),
        }
    }
    /// Name of the per-emote frame directories, unique across CDNs.
    pub fn to_dir_name(&self) -> PathBuf {
        self.to_file_name().with_extension("")
    }
}

impl Display for EmoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmoteId::SevenTv(id) => std::fmt::Display::fmt(&id, f),
            EmoteId::Bttv(id) => std::fmt::Display::fmt(&id, f),
        }
    }
}
