use futures::StreamExt;
use log::{debug, error, info, warn};

use crate::context::Context;
use crate::emote::{ItemError, Outcome};
use crate::emote_ext::EmoteId;
use crate::opt::MAX_PARALLEL;
use crate::svg::SvgItem;

/// One unit of work for the pool.
#[derive(Debug, Clone)]
pub enum Job {
    Emote(EmoteId),
    Svg(SvgItem),
}

impl Job {
    pub fn label(&self) -> String {
        match self {
            Job::Emote(id) => id.to_dir_name().display().to_string(),
            Job::Svg(svg) => format!("{}.svg", svg.name),
        }
    }

    pub async fn run(&self, ctx: &Context) -> Result<Outcome, ItemError> {
        match self {
            Job::Emote(id) => crate::emote::process(ctx, *id).await,
            Job::Svg(svg) => svg.convert(ctx).await,
        }
    }
}

pub struct BatchElement {
    pub label: String,
    pub result: Result<Outcome, ItemError>,
}

#[derive(Default)]
pub struct BatchReport {
    pub elements: Vec<BatchElement>,
}

impl BatchReport {
    pub fn done(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| matches!(e.result, Ok(Outcome::Done(_) | Outcome::Downloaded { .. })))
            .count()
    }
    pub fn skipped(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| matches!(e.result, Ok(Outcome::Skipped(_))))
            .count()
    }
    pub fn failed(&self) -> usize {
        self.elements.iter().filter(|e| e.result.is_err()).count()
    }
    pub fn failures(&self) -> impl Iterator<Item = (&str, &ItemError)> {
        self.elements
            .iter()
            .filter_map(|e| Some((e.label.as_str(), e.result.as_ref().err()?)))
    }
}

async fn run_job(ctx: &Context, job: Job) -> BatchElement {
    let label = job.label();
    let result = job.run(ctx).await;

    match &result {
        Ok(Outcome::Skipped(reason)) => warn!("`{label}` skipped: {reason}"),
        Ok(Outcome::Done(artifact)) => debug!("`{label}` built `{}`", artifact.path.display()),
        Ok(Outcome::Downloaded { path, size }) => {
            debug!("`{label}` saved to `{}` ({size} bytes)", path.display())
        }
        Err(err) => error!("`{label}` failed: {err}"),
    }

    BatchElement { label, result }
}

/// Runs every job with at most `parallel` of them in flight.
///
/// With `parallel == 1` jobs run one after another in input order.
/// A failing job never affects the others.
pub async fn run_batch(ctx: &Context, jobs: Vec<Job>, parallel: usize) -> BatchReport {
    let parallel = parallel.clamp(1, MAX_PARALLEL);
    info!("processing {} element(s), {parallel} at a time", jobs.len());

    let elements = futures::stream::iter(jobs)
        .map(|job| run_job(ctx, job))
        .buffer_unordered(parallel)
        .collect::<Vec<_>>()
        .await;

    let report = BatchReport { elements };
    info!(
        "done: {}, skipped: {}, failed: {}",
        report.done(),
        report.skipped(),
        report.failed()
    );
    report
}
