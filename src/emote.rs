use std::fmt::Display;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use indicatif::HumanBytes;
use log::{debug, info, warn};
use thiserror::Error;

use crate::binaries::{Img2WebpFrame, ToolError};
use crate::context::Context;
use crate::download::FetchError;
use crate::emote_ext::EmoteId;
use crate::file_sequence::FileSequence;
use crate::policy::{AssetFacts, Ineligible};
use crate::webp::FrameDelays;

/// Everything that ends the pipeline of a single item early.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("couldn't read frame durations: {0}")]
    Inspect(#[from] ParseIntError),
    #[error("inconsistent frames: {0}")]
    Consistency(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Fs(anyhow::Error),
}

impl From<anyhow::Error> for ItemError {
    fn from(err: anyhow::Error) -> Self {
        ItemError::Fs(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Ineligible(Ineligible),
    AlreadyBuilt,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Ineligible(reason) => Display::fmt(reason, f),
            SkipReason::AlreadyBuilt => f.write_str("sticker already built, delete to rebuild"),
        }
    }
}

/// A produced sticker
#[derive(Debug)]
pub struct Artifact {
    pub path: PathBuf,
    pub size: u64,
    pub frame_count: usize,
    pub elapsed: Duration,
}

impl Artifact {
    pub async fn new(path: PathBuf, frame_count: usize, elapsed: Duration) -> anyhow::Result<Self> {
        let size = crate::fs::file_size(&path).await?;
        Ok(Self {
            path,
            size,
            frame_count,
            elapsed,
        })
    }
    pub fn human_size(&self) -> HumanBytes {
        HumanBytes(self.size)
    }
}

#[derive(Debug)]
pub enum Outcome {
    Done(Artifact),
    Downloaded { path: PathBuf, size: u64 },
    Skipped(SkipReason),
}

/// An emote that hasn't been looked at yet.
#[derive(Debug, Clone, Copy)]
pub struct Emote {
    pub id: EmoteId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmoteKind {
    Static,
    Animated(FrameDelays),
}

#[derive(Debug)]
pub struct InspectedEmote {
    pub id: EmoteId,
    pub size: u64,
    pub kind: EmoteKind,
}

fn check_frame_count(stage: &str, frames: &FileSequence, delays: &FrameDelays) -> Result<(), ItemError> {
    if frames.len() != delays.frame_count() {
        return Err(ItemError::Consistency(format!(
            "{stage} frame count doesn't match ({} != {})",
            frames.len(),
            delays.frame_count()
        )));
    }
    Ok(())
}

impl Emote {
    pub fn new(id: EmoteId) -> Self {
        Self { id }
    }

    /// Downloads the emote unless a previous run already did.
    pub async fn download(&self, ctx: &Context) -> Result<PathBuf, ItemError> {
        let id = self.id;
        let dl_path = ctx.download_path(id);

        if crate::fs::exists(&dl_path).await {
            info!("emote `{id}` was already downloaded");
            return Ok(dl_path);
        }
        crate::fs::assert_dir(&ctx.opt.download_dir).await?;

        let data = ctx.client.get_emote(id).await?;
        let partial = crate::fs::partial_path(&dl_path);
        crate::download::save_to_file(&data, &partial).await?;
        crate::fs::commit(&partial, &dl_path).await?;

        info!("downloaded emote `{id}` ({})", HumanBytes(data.len() as u64));
        Ok(dl_path)
    }

    pub async fn inspect(self, ctx: &Context) -> Result<InspectedEmote, ItemError> {
        let path = ctx.download_path(self.id);
        let report = ctx.bin.webp_info.info(&path).await?;
        let kind = match crate::webp::parse_frame_delays(&report)? {
            None => {
                info!("emote `{}` is an image", self.id);
                EmoteKind::Static
            }
            Some(delays) => {
                info!("emote `{}` is an animation: {delays:?}", self.id);
                EmoteKind::Animated(delays)
            }
        };
        let size = crate::fs::file_size(&path).await?;

        Ok(InspectedEmote {
            id: self.id,
            size,
            kind,
        })
    }
}

impl InspectedEmote {
    pub fn facts(&self) -> AssetFacts {
        let (frame_count, total_duration_ms) = match &self.kind {
            EmoteKind::Static => (0, 0),
            EmoteKind::Animated(delays) => (delays.frame_count(), delays.total_duration()),
        };
        AssetFacts {
            size: self.size,
            frame_count,
            total_duration_ms,
        }
    }

    pub fn check_eligibility(&self, force: bool) -> Result<(), Ineligible> {
        let facts = self.facts();
        if force {
            for reason in crate::policy::violations(&facts) {
                warn!("emote `{}` {reason}, forcing anyway", self.id);
            }
        }
        crate::policy::check(&facts, force)
    }

    pub async fn extract_frames(&self, ctx: &Context, delays: &FrameDelays) -> Result<FileSequence, ItemError> {
        let dst = ctx.raw_frames_path(self.id);

        if crate::fs::exists(&dst).await {
            warn!("frames for emote `{}` are already extracted", self.id);
        } else {
            let partial = crate::fs::partial_path(&dst);
            crate::fs::remove_stale(&partial).await?;
            crate::fs::assert_dir(&partial).await?;

            ctx.bin
                .anim_dump
                .dump_frames(ctx.download_path(self.id), &partial)
                .await?;
            let dumped = crate::file_sequence::file_sequence(&partial).await?;
            check_frame_count("extracted", &dumped, delays)?;
            crate::fs::commit(&partial, &dst).await?;
            info!("extracted frames for emote `{}`", self.id);
        }

        let frames = crate::file_sequence::file_sequence(&dst).await?;
        check_frame_count("extracted", &frames, delays)?;
        Ok(frames)
    }

    pub async fn resize_frames(
        &self,
        ctx: &Context,
        delays: &FrameDelays,
        raw: &FileSequence,
    ) -> Result<FileSequence, ItemError> {
        let dst = ctx.resized_frames_path(self.id);

        if raw.is_empty() {
            return Err(ItemError::Consistency(format!(
                "no extracted frames for emote `{}`",
                self.id
            )));
        }

        if crate::fs::exists(&dst).await {
            warn!("frames for emote `{}` are already resized", self.id);
        } else {
            let partial = crate::fs::partial_path(&dst);
            crate::fs::remove_stale(&partial).await?;
            crate::fs::assert_dir(&partial).await?;

            ctx.bin
                .ffmpeg
                .resize_images(raw.dir.join("%04d.png"), partial.join("%04d.png"))
                .await?;
            let resized = crate::file_sequence::file_sequence(&partial).await?;
            check_frame_count("resized", &resized, delays)?;
            crate::fs::commit(&partial, &dst).await?;
            info!("resized frames for emote `{}`", self.id);
        }

        let frames = crate::file_sequence::file_sequence(&dst).await?;
        check_frame_count("resized", &frames, delays)?;
        Ok(frames)
    }

    pub async fn to_sticker_static(&self, ctx: &Context) -> Result<Outcome, ItemError> {
        let dst = ctx.static_out_path(self.id);
        if crate::fs::exists(&dst).await {
            return Ok(Outcome::Skipped(SkipReason::AlreadyBuilt));
        }
        crate::fs::assert_dir(&ctx.opt.out_static_dir).await?;

        let partial = crate::fs::partial_path(&dst);
        crate::fs::remove_stale(&partial).await?;

        let start = Instant::now();
        ctx.bin
            .magick
            .fit_to_canvas(ctx.download_path(self.id), &partial)
            .await?;
        crate::fs::commit(&partial, &dst).await?;

        let artifact = Artifact::new(dst, 0, start.elapsed()).await?;
        info!(
            "converted emote `{}` to static sticker ({})",
            self.id,
            artifact.human_size()
        );
        Ok(Outcome::Done(artifact))
    }

    pub async fn to_sticker_anim(
        &self,
        ctx: &Context,
        delays: &FrameDelays,
        resized: &FileSequence,
    ) -> Result<Outcome, ItemError> {
        let dst = ctx.anim_out_path(self.id);
        if crate::fs::exists(&dst).await {
            return Ok(Outcome::Skipped(SkipReason::AlreadyBuilt));
        }
        check_frame_count("listed", resized, delays)?;
        crate::fs::assert_dir(&ctx.opt.out_anim_dir).await?;

        let opt = &ctx.conversion;
        let frames = resized
            .paths()
            .zip(delays.as_slice())
            .map(|(path, &duration)| {
                Img2WebpFrame::new(path, duration, opt.quality, opt.compression_level)
            })
            .collect::<Vec<_>>();

        let partial = crate::fs::partial_path(&dst);
        crate::fs::remove_stale(&partial).await?;

        let start = Instant::now();
        ctx.bin
            .img_2_webp
            .webp_from_images(opt, &partial, &frames)
            .await?;
        crate::fs::commit(&partial, &dst).await?;

        let artifact = Artifact::new(dst, frames.len(), start.elapsed()).await?;
        info!(
            "converted emote `{}` to animated sticker ({} frames, took {:.1}s, {})",
            self.id,
            artifact.frame_count,
            artifact.elapsed.as_secs_f64(),
            artifact.human_size()
        );
        Ok(Outcome::Done(artifact))
    }
}

/// Runs every stage for one emote.
pub async fn process(ctx: &Context, id: EmoteId) -> Result<Outcome, ItemError> {
    let emote = Emote::new(id);
    let dl_path = emote.download(ctx).await?;

    if ctx.opt.download {
        let size = crate::fs::file_size(&dl_path).await?;
        return Ok(Outcome::Downloaded {
            path: dl_path,
            size,
        });
    }

    let emote = emote.inspect(ctx).await?;
    if let Err(reason) = emote.check_eligibility(ctx.opt.force) {
        return Ok(Outcome::Skipped(SkipReason::Ineligible(reason)));
    }

    match &emote.kind {
        EmoteKind::Static => emote.to_sticker_static(ctx).await,
        EmoteKind::Animated(delays) => {
            debug!("emote `{id}` takes the animated path");
            let raw = emote.extract_frames(ctx, delays).await?;
            let resized = emote.resize_frames(ctx, delays, &raw).await?;
            emote.to_sticker_anim(ctx, delays, &resized).await
        }
    }
}
