mod batch;
mod binaries;
mod context;
mod convert;
mod download;
mod emote;
mod emote_ext;
mod file_sequence;
mod fs;
mod logging;
mod opt;
mod policy;
mod svg;
mod webp;

#[cfg(all(test, unix))]
mod test_utils;

use std::process::ExitCode;

use anyhow::Result;
use log::{error, info, warn};
use structopt::StructOpt;

use batch::{BatchReport, Job};
use binaries::Binaries;
use context::Context;
use download::Client;
use emote_ext::Cdn;
use opt::Opt;

/// `None` if the batch was interrupted
async fn run(opt: Opt) -> Result<Option<BatchReport>> {
    let bin = Binaries::from_env(opt.tool_timeout());
    bin.check(opt.parallel).await?;
    info!("checked all needed binaries");

    if opt.test {
        info!("arguments are valid, not processing anything");
        return Ok(Some(BatchReport::default()));
    }

    let mut jobs = opt
        .to_emote_ids()
        .into_iter()
        .map(Job::Emote)
        .collect::<Vec<_>>();
    jobs.extend(opt.to_svg_items().into_iter().map(Job::Svg));

    let ctx = Context::new(opt, Client::new(Cdn::from_env())?, bin)?;
    let parallel = ctx.opt.parallel;

    // dropping the batch kills every running tool
    let report = tokio::select! {
        report = batch::run_batch(&ctx, jobs, parallel) => Some(report),
        _ = tokio::signal::ctrl_c() => None,
    };
    Ok(report)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let opt = Opt::from_args();

    if let Err(err) = logging::init(opt.verbose) {
        eprintln!("couldn't initialize logging: {err}");
        return ExitCode::FAILURE;
    }
    if let Err(err) = opt.validate() {
        err.exit();
    }

    match run(opt).await {
        Ok(Some(report)) => {
            let failed = report
                .failures()
                .map(|(label, _)| label)
                .collect::<Vec<_>>();
            if !failed.is_empty() {
                warn!("couldn't convert: {}", failed.join(", "));
            }
            ExitCode::SUCCESS
        }
        Ok(None) => {
            warn!("interrupted");
            ExitCode::from(130)
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
