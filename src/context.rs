use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::binaries::Binaries;
use crate::convert::ConversionOptions;
use crate::download::Client;
use crate::emote_ext::EmoteId;
use crate::opt::Opt;
use crate::svg::SvgItem;

/// Everything a pipeline run needs, cheap to clone into every worker.
#[derive(Debug, Clone)]
pub struct Context {
    pub opt: Arc<Opt>,
    pub client: Client,
    pub bin: Arc<Binaries>,
    pub conversion: ConversionOptions,
}

impl Context {
    pub fn new(opt: Opt, client: Client, bin: Binaries) -> Result<Context> {
        let conversion = opt.conversion_options()?;
        Ok(Context {
            opt: Arc::new(opt),
            client,
            bin: Arc::new(bin),
            conversion,
        })
    }

    pub fn download_path(&self, id: EmoteId) -> PathBuf {
        self.opt.download_dir.join(id.to_file_name())
    }
    pub fn raw_frames_path(&self, id: EmoteId) -> PathBuf {
        self.opt.raw_frames_dir.join(id.to_dir_name())
    }
    pub fn resized_frames_path(&self, id: EmoteId) -> PathBuf {
        self.opt.resized_frames_dir.join(id.to_dir_name())
    }
    pub fn static_out_path(&self, id: EmoteId) -> PathBuf {
        self.opt.out_static_dir.join(id.to_file_name())
    }
    pub fn anim_out_path(&self, id: EmoteId) -> PathBuf {
        self.opt.out_anim_dir.join(id.to_file_name())
    }
    pub fn svg_out_path(&self, svg: &SvgItem) -> PathBuf {
        self.opt.out_static_dir.join(svg.file_name())
    }
}
