//! Scratch directories and shell scripts standing in for the real tools.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use structopt::StructOpt;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::binaries::{AnimDump, Binaries, Ffmpeg, Img2Webp, Magick, Tool, WebpInfo};
use crate::context::Context;
use crate::download::Client;
use crate::emote_ext::Cdn;
use crate::opt::Opt;

/// Writes an executable `/bin/sh` script named `name` into `dir`.
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Request paths seen by [`serve`], in arrival order.
pub type Requests = Arc<Mutex<Vec<String>>>;

/// Answers every GET on a local port with `body`.
///
/// Returns the base url to use as a CDN.
pub async fn serve(body: &'static [u8]) -> (String, Requests) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let requests = Requests::default();

    let seen = requests.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => head.extend_from_slice(&buf[..n]),
                }
            }
            let head = String::from_utf8_lossy(&head);
            let path = head.split_whitespace().nth(1).unwrap_or_default().to_string();
            seen.lock().unwrap().push(path);

            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.write_all(body).await;
            let _ = stream.shutdown().await;
        }
    });

    (base, requests)
}

/// Which stage loses the last frame of an animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LostFrame {
    Nowhere,
    Extract,
    Resize,
}

pub struct Fixture {
    dir: TempDir,
    lost_frame: LostFrame,
}

impl Fixture {
    pub fn new() -> Self {
        Self::losing_frame(LostFrame::Nowhere)
    }

    pub fn losing_frame(lost_frame: LostFrame) -> Self {
        let fixture = Self {
            dir: tempfile::tempdir().unwrap(),
            lost_frame,
        };
        std::fs::create_dir(fixture.bin_dir()).unwrap();
        fixture.write_tools();
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    fn bin_dir(&self) -> PathBuf {
        self.root().join("bin")
    }

    fn calls_log(&self) -> PathBuf {
        self.root().join("calls.log")
    }

    fn write_tools(&self) {
        let log = self.calls_log();
        let tool = |name: &str, body: &str| {
            let prelude = format!(
                "if [ \"$1\" = \"-version\" ]; then echo \"fake {name} 1.0\"; exit 0; fi\n\
                 echo {name} >> '{}'",
                log.display()
            );
            script(&self.bin_dir(), name, &format!("{prelude}\n{body}"));
        };

        tool("webpinfo", "cat \"$1\"");
        tool(
            "anim_dump",
            &format!(
                "n=$(grep -c '^  Duration:' \"$5\")\n\
                 n=$((n - {}))\n\
                 i=0\n\
                 while [ \"$i\" -lt \"$n\" ]; do\n\
                   : > \"$(printf '%s/%04d.png' \"$4\" \"$i\")\"\n\
                   i=$((i + 1))\n\
                 done",
                usize::from(self.lost_frame == LostFrame::Extract)
            ),
        );
        let mut resize = String::from("cp \"$(dirname \"$2\")\"/*.png \"$(dirname \"$6\")\"/");
        if self.lost_frame == LostFrame::Resize {
            resize.push_str("\nrm \"$(ls \"$(dirname \"$6\")\"/*.png | tail -n 1)\"");
        }
        tool("ffmpeg", &resize);
        tool("img2webp", "printf '%s\\n' \"$@\" > \"$2\"");
        tool("magick", "for last; do :; done\nprintf '%s\\n' \"$@\" > \"$last\"");
    }

    pub fn binaries(&self) -> Binaries {
        let timeout = Some(Duration::from_secs(30));
        let tool = |name: &'static str| Tool::new(name, self.bin_dir().join(name), timeout);
        Binaries {
            anim_dump: AnimDump(tool("anim_dump")),
            webp_info: WebpInfo(tool("webpinfo")),
            ffmpeg: Ffmpeg(tool("ffmpeg")),
            magick: Magick(tool("magick")),
            img_2_webp: Img2Webp(tool("img2webp")),
        }
    }

    pub fn dir(&self, name: &str) -> PathBuf {
        self.root().join(name)
    }

    /// A context whose directories live in the fixture and whose CDN refuses connections.
    pub fn context(&self, args: &[&str]) -> Context {
        self.context_with_cdn(
            args,
            Cdn {
                seven_tv: "http://127.0.0.1:9".to_string(),
                bttv: "http://127.0.0.1:9".to_string(),
            },
        )
    }

    pub fn context_with_cdn(&self, args: &[&str], cdn: Cdn) -> Context {
        let dirs = [
            ("--dl-dir", "emotes"),
            ("--frames-dir", "frames"),
            ("--resized-dir", "resized"),
            ("--out-static-dir", "stickers_static"),
            ("--out-anim-dir", "stickers_anim"),
            ("--svg-dir", "svg"),
        ];
        let mut argv = vec!["convertoid".to_string()];
        for (flag, name) in dirs {
            argv.push(flag.to_string());
            argv.push(self.dir(name).display().to_string());
        }
        argv.extend(args.iter().map(|arg| arg.to_string()));

        let opt = Opt::from_iter_safe(argv).unwrap();
        let client = Client::new(cdn).unwrap();
        Context::new(opt, client, self.binaries()).unwrap()
    }

    /// Places an already downloaded emote whose `webpinfo` report lists `delays`,
    /// padded to exactly `size` bytes.
    pub fn add_emote(&self, id: &str, delays: &[u32], size: usize) {
        let mut data = String::from("RIFF HEADER:\n");
        for delay in delays {
            data.push_str(&format!("Chunk ANMF\n  Duration: {delay}\n"));
        }
        assert!(data.len() <= size, "emote too small for its report");
        data.push_str(&"x".repeat(size - data.len()));

        let dl_dir = self.dir("emotes");
        std::fs::create_dir_all(&dl_dir).unwrap();
        std::fs::write(dl_dir.join(format!("{id}.webp")), data).unwrap();
    }

    pub fn add_svg(&self, name: &str) {
        let svg_dir = self.dir("svg");
        std::fs::create_dir_all(&svg_dir).unwrap();
        std::fs::write(svg_dir.join(format!("{name}.svg")), "<svg/>").unwrap();
    }

    /// How often `tool` did real work (version checks aren't counted).
    pub fn invocations(&self, tool: &str) -> usize {
        std::fs::read_to_string(self.calls_log())
            .unwrap_or_default()
            .lines()
            .filter(|line| *line == tool)
            .count()
    }

    /// Arguments a fake encoder wrote into its output file.
    pub fn recorded_args(&self, output: &Path) -> Vec<String> {
        std::fs::read_to_string(output)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// `(delay, frame path)` pairs in the order they were handed to `img2webp`.
    pub fn encoded_frames(&self, output: &Path) -> Vec<(u32, String)> {
        let args = self.recorded_args(output);
        args.iter()
            .enumerate()
            .filter(|(_, arg)| *arg == "-d")
            .map(|(index, _)| (args[index + 1].parse().unwrap(), args[index + 6].clone()))
            .collect()
    }
}
