use std::num::ParseIntError;

use lazy_regex::lazy_regex;

/// Per-frame display durations in milliseconds, in animation order.
///
/// Never empty, a still image has no `FrameDelays` at all.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameDelays(Vec<u32>);

impl FrameDelays {
    pub fn new(durations: Vec<u32>) -> Option<Self> {
        if durations.is_empty() {
            None
        } else {
            Some(Self(durations))
        }
    }
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
    pub fn frame_count(&self) -> usize {
        self.0.len()
    }
    /// Widened, a frame may last up to 2^24 ms.
    pub fn total_duration(&self) -> u64 {
        self.0.iter().copied().map(u64::from).sum()
    }
    pub fn all_durations_eq(&self) -> bool {
        let mut iter = self.0.iter();
        if let Some(first) = iter.next() {
            !iter.any(|duration| duration != first)
        } else {
            true
        }
    }
}

impl std::fmt::Debug for FrameDelays {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDelays")
            .field("total_duration", &self.total_duration())
            .field("frame_count", &self.frame_count())
            .field("all_durations_eq", &self.all_durations_eq())
            .finish_non_exhaustive()
    }
}

/// Collects every `Duration` line of a `webpinfo` report in file order.
///
/// Returns `None` if the report doesn't contain any, i.e. the file is a still image.
pub fn parse_frame_delays(stdout: &str) -> Result<Option<FrameDelays>, ParseIntError> {
    let durations = lazy_regex!(r"^  Duration: (\d+)\r?$"m)
        .captures_iter(stdout)
        .map(|capture| capture[1].parse::<u32>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FrameDelays::new(durations))
}
