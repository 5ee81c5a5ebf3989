use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use structopt::clap::{self, ArgGroup};
use structopt::StructOpt;
use thiserror::Error;

use crate::convert::{parse_in_range, ConversionOptions, ConversionOptionsBuilderError};
use crate::emote_ext::{BttvId, EmoteId, EmoteIdExt, IdParseError, SevenTvId};
use crate::svg::SvgItem;

pub const MAX_PARALLEL: usize = 16;

#[derive(Error, Debug)]
pub enum DirPathParseError {
    #[error("doesn't correspond to a directory")]
    InvalidType,
}

#[derive(Error, Debug)]
pub enum IdsParseError {
    #[error("couldn't open file: {0}")]
    FileNotFound(#[from] std::io::Error),
    #[error("line {line}: {source}")]
    FileContentInvalid {
        line: usize,
        #[source]
        source: IdParseError,
    },
}

/// Directories are created lazily, they only must not be something else already.
fn parse_dir_path(src: &str) -> Result<PathBuf, DirPathParseError> {
    let path = PathBuf::from(src);
    match path.metadata() {
        Ok(meta) if !meta.is_dir() => Err(DirPathParseError::InvalidType),
        _ => Ok(path),
    }
}

/// Newline separated list of 7TV emote ids
#[derive(Debug)]
pub struct IdFile(pub Vec<SevenTvId>);

fn parse_id_file(src: &str) -> Result<IdFile, IdsParseError> {
    let data = std::fs::read_to_string(src)?;
    let mut ids = Vec::new();
    for (index, line) in data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let id = SevenTvId::parse_id(line).map_err(|source| IdsParseError::FileContentInvalid {
            line: index + 1,
            source,
        })?;
        ids.push(id);
    }
    Ok(IdFile(ids))
}

fn parse_parallel(src: &str) -> Result<usize, String> {
    parse_in_range(1, MAX_PARALLEL)(src)
}
fn parse_quality(src: &str) -> Result<u8, String> {
    parse_in_range(0, 100)(src)
}
fn parse_method(src: &str) -> Result<u8, String> {
    parse_in_range(0, 6)(src)
}

#[derive(Debug, StructOpt)]
#[structopt(name = "convertoid", about = "Convert emotes and SVGs to WhatsApp stickers.")]
#[structopt(group = ArgGroup::with_name("input").required(true).multiple(true))]
pub struct Opt {
    /// IDs of emotes from 7TV to use
    #[structopt(name = "7tv", long = "7tv", group = "input")]
    #[structopt(parse(try_from_str = SevenTvId::parse_id))]
    pub seven_tv_ids: Vec<SevenTvId>,

    /// IDs of emotes from BTTV to use
    #[structopt(name = "bttv", long = "bttv", group = "input")]
    #[structopt(parse(try_from_str = BttvId::parse_id))]
    pub bttv_ids: Vec<BttvId>,

    /// File with one 7TV emote id per line
    #[structopt(name = "id-file", long = "id-file", group = "input")]
    #[structopt(parse(try_from_str = parse_id_file))]
    pub id_file: Option<IdFile>,

    /// Names of SVGs in the svg directory to use, without the `.svg` extension
    #[structopt(name = "svg", long = "svg", group = "input")]
    pub svg_names: Vec<String>,

    /// Where to save downloaded emotes
    #[structopt(long = "dl-dir", default_value = "./emotes/")]
    #[structopt(parse(try_from_str = parse_dir_path))]
    pub download_dir: PathBuf,

    /// Where to save extracted frames
    #[structopt(long = "frames-dir", default_value = "./frames/")]
    #[structopt(parse(try_from_str = parse_dir_path))]
    pub raw_frames_dir: PathBuf,

    /// Where to save resized frames
    #[structopt(long = "resized-dir", default_value = "./resized/")]
    #[structopt(parse(try_from_str = parse_dir_path))]
    pub resized_frames_dir: PathBuf,

    /// Where to put converted static stickers
    #[structopt(long = "out-static-dir", default_value = "./stickers_static/")]
    #[structopt(parse(try_from_str = parse_dir_path))]
    pub out_static_dir: PathBuf,

    /// Where to put converted animated stickers
    #[structopt(long = "out-anim-dir", default_value = "./stickers_anim/")]
    #[structopt(parse(try_from_str = parse_dir_path))]
    pub out_anim_dir: PathBuf,

    /// Where to look for SVGs
    #[structopt(long = "svg-dir", default_value = "./svg/")]
    #[structopt(parse(try_from_str = parse_dir_path))]
    pub svg_dir: PathBuf,

    /// Force processing of emotes that are unlikely to fit
    #[structopt(long)]
    pub force: bool,

    /// Only validate arguments, don't process anything
    #[structopt(long)]
    pub test: bool,

    /// Only download the listed emotes, don't convert
    #[structopt(long)]
    pub download: bool,

    /// How many elements are processed in parallel [1-16]
    #[structopt(long, default_value = "1", parse(try_from_str = parse_parallel))]
    pub parallel: usize,

    /// Compression factor for animated stickers [0-100]
    #[structopt(long, default_value = "1", parse(try_from_str = parse_quality))]
    pub quality: u8,

    /// Compression method for animated stickers, higher is slower but smaller [0-6]
    #[structopt(long, default_value = "6", parse(try_from_str = parse_method))]
    pub method: u8,

    /// Seconds a single external tool may run, 0 waits forever
    #[structopt(long, default_value = "300")]
    pub timeout: u64,

    /// Log debug output
    #[structopt(short, long)]
    pub verbose: bool,
}

impl Opt {
    fn has_remote_input(&self) -> bool {
        !self.seven_tv_ids.is_empty() || !self.bttv_ids.is_empty() || self.id_file.is_some()
    }

    /// Every requested emote once, in order of first appearance.
    pub fn to_emote_ids(&self) -> Vec<EmoteId> {
        let file_ids = self.id_file.as_ref().map_or(&[][..], |file| &file.0[..]);
        let mut seen = HashSet::new();
        self.seven_tv_ids
            .iter()
            .chain(file_ids)
            .map(EmoteId::from)
            .chain(self.bttv_ids.iter().map(EmoteId::from))
            .filter(|id| seen.insert(*id))
            .collect()
    }

    pub fn to_svg_items(&self) -> Vec<SvgItem> {
        self.svg_names.iter().cloned().map(SvgItem::new).collect()
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }

    pub fn conversion_options(&self) -> Result<ConversionOptions, ConversionOptionsBuilderError> {
        ConversionOptions::builder()
            .quality(self.quality)
            .compression_level(self.method)
            .build()
    }

    /// Checks what can't be checked while parsing single arguments.
    pub fn validate(&self) -> Result<(), clap::Error> {
        if !self.svg_names.is_empty() && self.has_remote_input() {
            return Err(clap::Error::with_description(
                "`--svg` can't be combined with `--7tv`, `--bttv` or `--id-file`",
                clap::ErrorKind::ArgumentConflict,
            ));
        }
        for svg in self.to_svg_items() {
            let path = svg.source_path(&self.svg_dir);
            if !path.is_file() {
                return Err(clap::Error::with_description(
                    &format!("svg file `{}` doesn't exist", path.display()),
                    clap::ErrorKind::ValueValidation,
                ));
            }
        }
        if self.id_file.as_ref().map_or(false, |file| file.0.is_empty())
            && self.seven_tv_ids.is_empty()
            && self.bttv_ids.is_empty()
        {
            return Err(clap::Error::with_description(
                "id file doesn't contain any ids",
                clap::ErrorKind::EmptyValue,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "abcdef0123456789abcdef01";

    #[test]
    fn defaults() {
        let opt = Opt::from_iter_safe(["convertoid", "--7tv", ID]).unwrap();
        assert_eq!(opt.parallel, 1);
        assert_eq!(opt.tool_timeout(), Some(Duration::from_secs(300)));
        assert!(!opt.force && !opt.test && !opt.download);
        assert_eq!(opt.to_emote_ids().len(), 1);
        assert_eq!(opt.download_dir, PathBuf::from("./emotes/"));
    }

    #[test]
    fn input_is_required() {
        assert!(Opt::from_iter_safe(["convertoid", "--force"]).is_err());
    }

    #[test]
    fn remote_sources_parse_alone() {
        for flag in ["--7tv", "--bttv"] {
            let opt = Opt::from_iter_safe(["convertoid", flag, ID]).unwrap();
            assert!(opt.validate().is_ok());
            assert_eq!(opt.to_emote_ids().len(), 1);
        }
    }

    #[test]
    fn svgs_exclude_emotes() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("logo.svg"), "<svg/>").unwrap();
        let dir = tmp.path().to_str().unwrap();

        let opt = Opt::from_iter_safe(["convertoid", "--svg-dir", dir, "--7tv", ID, "--svg", "logo"])
            .unwrap();
        let err = opt.validate().unwrap_err();
        assert_eq!(err.kind, clap::ErrorKind::ArgumentConflict);

        let opt = Opt::from_iter_safe(["convertoid", "--svg-dir", dir, "--svg", "logo"]).unwrap();
        assert!(opt.validate().is_ok());
    }

    #[test]
    fn repeated_ids_run_once() {
        let opt = Opt::from_iter_safe([
            "convertoid", "--7tv", ID, "60aee8087e8706b572cf37f3", ID, "--bttv", ID, ID,
        ])
        .unwrap();
        let ids = opt.to_emote_ids();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0].to_string(), ID);
        assert!(matches!(ids[2], EmoteId::Bttv(_)));
    }

    #[test]
    fn remote_sources_combine() {
        let opt = Opt::from_iter_safe(["convertoid", "--7tv", ID, "--bttv", ID]).unwrap();
        let ids = opt.to_emote_ids();
        assert!(matches!(ids[..], [EmoteId::SevenTv(_), EmoteId::Bttv(_)]));
    }

    #[test]
    fn malformed_id_is_rejected() {
        assert!(Opt::from_iter_safe(["convertoid", "--7tv", "abcdef"]).is_err());
        assert!(Opt::from_iter_safe(["convertoid", "--7tv", ID, "ABCDEF0123456789ABCDEF01"]).is_err());
    }

    #[test]
    fn parallel_is_bounded() {
        assert!(Opt::from_iter_safe(["convertoid", "--7tv", ID, "--parallel", "0"]).is_err());
        assert!(Opt::from_iter_safe(["convertoid", "--7tv", ID, "--parallel", "17"]).is_err());
        let opt = Opt::from_iter_safe(["convertoid", "--7tv", ID, "--parallel", "16"]).unwrap();
        assert_eq!(opt.parallel, 16);
    }

    #[test]
    fn encode_parameters_are_bounded() {
        assert!(Opt::from_iter_safe(["convertoid", "--7tv", ID, "--method", "7"]).is_err());
        assert!(Opt::from_iter_safe(["convertoid", "--7tv", ID, "--quality", "101"]).is_err());
        let opt = Opt::from_iter_safe(["convertoid", "--7tv", ID, "--quality", "75", "--method", "4"])
            .unwrap();
        let conv = opt.conversion_options().unwrap();
        assert_eq!((conv.quality, conv.compression_level), (75, 4));
    }

    #[test]
    fn id_file() {
        let tmp = tempfile::tempdir().unwrap();
        let good = tmp.path().join("good.txt");
        std::fs::write(&good, format!("{ID}\r\n\n60aee8087e8706b572cf37f3\n")).unwrap();
        let bad = tmp.path().join("bad.txt");
        std::fs::write(&bad, format!("{ID}\nnope\n")).unwrap();

        let opt = Opt::from_iter_safe(["convertoid", "--id-file", good.to_str().unwrap()]).unwrap();
        assert_eq!(opt.to_emote_ids().len(), 2);
        assert!(Opt::from_iter_safe(["convertoid", "--id-file", bad.to_str().unwrap()]).is_err());
    }

    #[test]
    fn missing_svg_fails_validation() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("logo.svg"), "<svg/>").unwrap();
        let dir = tmp.path().to_str().unwrap();

        let opt = Opt::from_iter_safe(["convertoid", "--svg-dir", dir, "--svg", "logo"]).unwrap();
        assert!(opt.validate().is_ok());
        let opt = Opt::from_iter_safe(["convertoid", "--svg-dir", dir, "--svg", "logo", "missing"])
            .unwrap();
        assert!(opt.validate().is_err());
    }

    #[test]
    fn dir_option_must_not_be_a_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        assert!(Opt::from_iter_safe(["convertoid", "--7tv", ID, "--dl-dir", path]).is_err());
    }
}
