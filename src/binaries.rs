use std::collections::HashMap;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use futures::StreamExt;
use log::{debug, error, info};
use thiserror::Error;
use tokio::process::Command;

use crate::convert::ConversionOptions;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("missing dependency `{command}`: {source}")]
    Missing {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` exited with {code:?}: {stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("`{command}` didn't finish within {after:?}")]
    Timeout { command: String, after: Duration },
    #[error("couldn't run `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// Make typing key-value-pair arguments a bit nicer
trait ArgExt {
    fn arg_pair(&mut self, first: impl AsRef<OsStr>, second: impl AsRef<OsStr>) -> &mut Self;
}
impl ArgExt for Command {
    fn arg_pair(&mut self, first: impl AsRef<OsStr>, second: impl AsRef<OsStr>) -> &mut Self {
        self.arg(first).arg(second)
    }
}

fn check_output(command: &str, out: Output) -> Result<Output, ToolError> {
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
        Err(ToolError::Failed {
            command: command.to_string(),
            code: out.status.code(),
            stderr,
        })
    } else {
        Ok(out)
    }
}

/// A single external binary together with the limit for one invocation.
#[derive(Debug, Clone)]
pub struct Tool {
    name: &'static str,
    path: PathBuf,
    timeout: Option<Duration>,
}

impl Tool {
    pub fn new(name: &'static str, path: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            name,
            path: path.into(),
            timeout,
        }
    }
    pub fn name(&self) -> &'static str {
        self.name
    }
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.path);
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    /// Runs the command to completion, capturing stdout and stderr.
    ///
    /// The child is killed if the timeout elapses or the future is dropped.
    async fn run(&self, cmd: &mut Command) -> Result<Output, ToolError> {
        let output = match self.timeout {
            Some(after) => tokio::time::timeout(after, cmd.output())
                .await
                .map_err(|_| ToolError::Timeout {
                    command: self.name.to_string(),
                    after,
                })?,
            None => cmd.output().await,
        };

        let output = output.map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ToolError::Missing {
                command: self.name.to_string(),
                source,
            },
            _ => ToolError::Io {
                command: self.name.to_string(),
                source,
            },
        })?;
        check_output(self.name, output)
    }

    /// Call the binary with the `-version` argument
    async fn check_version(&self) -> Result<String, ToolError> {
        let output = self.run(self.command().arg("-version")).await;

        match &output {
            Ok(_) => info!("found binary `{}`", self.name),
            Err(err) => error!("couldn't use binary `{:?}`: {err}", self.path),
        }

        let stdout = String::from_utf8_lossy(&output?.stdout).into_owned();
        Ok(stdout.lines().next().unwrap_or_default().to_string())
    }
}

#[derive(Debug)]
pub struct WebpInfo(pub Tool);

impl WebpInfo {
    /// Raw `webpinfo` report for the given file
    pub async fn info(&self, webp: impl AsRef<Path>) -> Result<String, ToolError> {
        let output = self.0.run(self.0.command().arg(webp.as_ref())).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[derive(Debug)]
pub struct AnimDump(pub Tool);

impl AnimDump {
    /// Writes every frame of `webp` into `dst` as `0000.png`, `0001.png`, ...
    pub async fn dump_frames(
        &self,
        webp: impl AsRef<Path>,
        dst: impl AsRef<Path>,
    ) -> Result<(), ToolError> {
        let mut cmd = self.0.command();
        cmd.arg_pair("-prefix", "")
            .arg_pair("-folder", dst.as_ref())
            .arg(webp.as_ref());
        self.0.run(&mut cmd).await?;

        Ok(())
    }
}

#[derive(Debug)]
pub struct Ffmpeg(pub Tool);

impl Ffmpeg {
    /// Scales an image sequence onto a transparent 512x512 canvas, keeping the aspect ratio.
    pub async fn resize_images(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<(), ToolError> {
        const VIDEO_FILTER: &str = "\
            scale=w=512:h=512:force_original_aspect_ratio=decrease,\
            pad=512:512:-1:-1:color=0x00000000";

        let mut cmd = self.0.command();
        cmd.arg_pair("-i", input.as_ref())
            .arg_pair("-vf", VIDEO_FILTER)
            .arg("-y")
            .arg(output.as_ref());
        self.0.run(&mut cmd).await?;

        Ok(())
    }
}

pub struct Img2WebpFrame {
    pub file_name: PathBuf,
    pub duration: u32,
    pub compression_factor: u8,
    pub compression_method: u8,
}
impl Img2WebpFrame {
    pub fn new(
        file_name: impl AsRef<Path>,
        duration: u32,
        compression_factor: u8,
        compression_method: u8,
    ) -> Img2WebpFrame {
        Img2WebpFrame {
            file_name: file_name.as_ref().to_path_buf(),
            duration,
            compression_factor,
            compression_method,
        }
    }
}

#[derive(Debug)]
pub struct Img2Webp(pub Tool);

impl Img2Webp {
    pub async fn webp_from_images(
        &self,
        opt: &ConversionOptions,
        output: impl AsRef<Path>,
        frames: &[Img2WebpFrame],
    ) -> Result<(), ToolError> {
        let mut cmd = self.0.command();
        cmd.arg_pair("-o", output.as_ref())
            .arg("-mixed")
            .arg_pair("-loop", opt.loop_count.to_string());

        for frame_opt in frames {
            cmd.arg_pair("-d", frame_opt.duration.to_string())
                .arg_pair("-q", frame_opt.compression_factor.to_string())
                .arg_pair("-m", frame_opt.compression_method.to_string())
                .arg(&frame_opt.file_name);
        }

        self.0.run(&mut cmd).await?;

        Ok(())
    }
}

#[derive(Debug)]
pub struct Magick(pub Tool);

impl Magick {
    /// Fits a still image inside a transparent, centered 512x512 canvas.
    pub async fn fit_to_canvas(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<(), ToolError> {
        let mut cmd = self.0.command();
        cmd.arg(input.as_ref())
            .arg_pair("-resize", "512x512")
            .arg_pair("-background", "none")
            .arg_pair("-gravity", "center")
            .arg_pair("-extent", "512x512")
            .arg(output.as_ref());
        self.0.run(&mut cmd).await?;

        Ok(())
    }

    /// Rasterizes a vector image at 512x512, lossless.
    pub async fn rasterize(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<(), ToolError> {
        let mut cmd = self.0.command();
        cmd.arg_pair("-size", "512x512")
            .arg_pair("-background", "none")
            .arg(input.as_ref())
            .arg_pair("-gravity", "center")
            .arg_pair("-extent", "512x512")
            .arg_pair("-define", "webp:lossless=true")
            .arg(output.as_ref());
        self.0.run(&mut cmd).await?;

        Ok(())
    }
}

#[derive(Debug)]
pub struct Binaries {
    pub anim_dump: AnimDump,
    pub webp_info: WebpInfo,
    pub ffmpeg: Ffmpeg,
    pub magick: Magick,
    pub img_2_webp: Img2Webp,
}

impl Binaries {
    /// Reads the binary locations from the environment (or `.env`),
    /// falling back to the plain names on `PATH`.
    pub fn from_env(timeout: Option<Duration>) -> Self {
        let tool = |name: &'static str, var: &str| {
            let path = dotenv::var(var).unwrap_or_else(|_| name.to_string());
            Tool::new(name, path, timeout)
        };

        Self {
            anim_dump: AnimDump(tool("anim_dump", "ANIM_DUMP_BIN")),
            webp_info: WebpInfo(tool("webpinfo", "WEBP_INFO_BIN")),
            ffmpeg: Ffmpeg(tool("ffmpeg", "FFMPEG_BIN")),
            magick: Magick(tool("magick", "MAGICK_BIN")),
            img_2_webp: Img2Webp(tool("img2webp", "IMG2WEBP_BIN")),
        }
    }

    fn tools(&self) -> [&Tool; 5] {
        [
            &self.anim_dump.0,
            &self.webp_info.0,
            &self.ffmpeg.0,
            &self.magick.0,
            &self.img_2_webp.0,
        ]
    }

    /// Makes sure every needed binary can be executed, returns the reported versions.
    pub async fn check(&self, parallel: usize) -> Result<HashMap<&'static str, String>, ToolError> {
        async fn inner(tool: &Tool) -> Result<(&'static str, String), ToolError> {
            Ok((tool.name(), tool.check_version().await?))
        }

        let results = futures::stream::iter(self.tools())
            .map(inner)
            .buffer_unordered(parallel.max(1))
            .collect::<Vec<_>>()
            .await;

        let mut map = HashMap::with_capacity(results.len());
        for result in results {
            let (name, version) = result?;
            debug!("`{name}` reports `{version}`");
            map.insert(name, version);
        }

        Ok(map)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_utils::{script, Fixture};

    #[tokio::test]
    async fn captures_failure_with_stderr() {
        let fixture = Fixture::new();
        let path = script(fixture.root(), "broken", "echo boom >&2\nexit 3");
        let tool = Tool::new("broken", path, None);

        let err = tool.run(&mut tool.command()).await.unwrap_err();
        match err {
            ToolError::Failed { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn reports_missing_binary() {
        let fixture = Fixture::new();
        let tool = Tool::new("ghost", fixture.root().join("does-not-exist"), None);

        let err = tool.check_version().await.unwrap_err();
        assert!(matches!(err, ToolError::Missing { .. }));
    }

    #[tokio::test]
    async fn kills_hanging_tool() {
        let fixture = Fixture::new();
        let path = script(fixture.root(), "hang", "sleep 5");
        let tool = Tool::new("hang", path, Some(Duration::from_millis(100)));

        let started = std::time::Instant::now();
        let err = tool.run(&mut tool.command()).await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn check_collects_versions() {
        let fixture = Fixture::new();
        let versions = fixture.binaries().check(4).await.unwrap();
        assert_eq!(versions.len(), 5);
        assert_eq!(versions["img2webp"], "fake img2webp 1.0");
    }

    #[tokio::test]
    async fn check_fails_on_missing_binary() {
        let fixture = Fixture::new();
        let mut bin = fixture.binaries();
        bin.magick = Magick(Tool::new("magick", fixture.root().join("nope"), None));

        let err = bin.check(1).await.unwrap_err();
        assert!(matches!(err, ToolError::Missing { ref command, .. } if command == "magick"));
    }
}
