use std::path::{Path, PathBuf};
use std::time::Instant;

use log::info;

use crate::context::Context;
use crate::emote::{Artifact, ItemError, Outcome, SkipReason};

/// A local vector icon, `<svg-dir>/<name>.svg`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvgItem {
    pub name: String,
}

impl SvgItem {
    pub fn new(name: String) -> Self {
        Self { name }
    }
    pub fn source_path(&self, svg_dir: &Path) -> PathBuf {
        svg_dir.join(format!("{}.svg", self.name))
    }
    pub fn file_name(&self) -> PathBuf {
        PathBuf::from(format!("{}.webp", self.name))
    }

    /// Rasterizes the icon straight into a static sticker.
    pub async fn convert(&self, ctx: &Context) -> Result<Outcome, ItemError> {
        let src = self.source_path(&ctx.opt.svg_dir);
        let dst = ctx.svg_out_path(self);

        if crate::fs::exists(&dst).await {
            return Ok(Outcome::Skipped(SkipReason::AlreadyBuilt));
        }
        crate::fs::assert_dir(&ctx.opt.out_static_dir).await?;

        let partial = crate::fs::partial_path(&dst);
        crate::fs::remove_stale(&partial).await?;

        let start = Instant::now();
        ctx.bin.magick.rasterize(&src, &partial).await?;
        crate::fs::commit(&partial, &dst).await?;

        let artifact = Artifact::new(dst, 0, start.elapsed()).await?;
        info!("converted svg `{}` to sticker ({})", self.name, artifact.human_size());
        Ok(Outcome::Done(artifact))
    }
}
