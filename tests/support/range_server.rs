//! Wiremock responder that honours `Range: bytes=start-end` requests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use wiremock::{Request, Respond, ResponseTemplate};

/// Serves `content`, answering range requests with `206` slices and
/// `416` once the range starts past the end.
#[derive(Clone)]
pub struct RangeResponder {
    content: Arc<Vec<u8>>,
    ignore_ranges: bool,
    fail_first: usize,
    outage_after: Option<usize>,
    recovered: Arc<AtomicBool>,
    requests: Arc<AtomicUsize>,
    ranges: Arc<Mutex<Vec<Option<String>>>>,
}

impl RangeResponder {
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            content: Arc::new(content),
            ignore_ranges: false,
            fail_first: 0,
            outage_after: None,
            recovered: Arc::new(AtomicBool::new(false)),
            requests: Arc::new(AtomicUsize::new(0)),
            ranges: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always answers `200` with the whole body.
    #[must_use]
    pub fn ignoring_ranges(mut self) -> Self {
        self.ignore_ranges = true;
        self
    }

    /// Answers the first `count` requests with `500`.
    #[must_use]
    pub fn failing_first(mut self, count: usize) -> Self {
        self.fail_first = count;
        self
    }

    /// Answers every request after the first `served` with `500` until
    /// [`RangeResponder::recover`] is called.
    #[must_use]
    pub fn outage_after(mut self, served: usize) -> Self {
        self.outage_after = Some(served);
        self
    }

    /// Ends the outage started by [`RangeResponder::outage_after`].
    pub fn recover(&self) {
        self.recovered.store(true, Ordering::SeqCst);
    }

    /// Requests seen so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// `Range` header of every request, in order.
    pub fn ranges(&self) -> Vec<Option<String>> {
        self.ranges.lock().unwrap().clone()
    }
}

fn parse_range(value: &str) -> Option<(u64, Option<u64>)> {
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start = start.trim().parse().ok()?;
    let end = match end.trim() {
        "" => None,
        end => Some(end.parse().ok()?),
    };
    Some((start, end))
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let n = self.requests.fetch_add(1, Ordering::SeqCst);
        let range = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.ranges.lock().unwrap().push(range.clone());

        let in_outage = self
            .outage_after
            .is_some_and(|served| n >= served && !self.recovered.load(Ordering::SeqCst));
        if n < self.fail_first || in_outage {
            return ResponseTemplate::new(500).set_body_bytes(b"temporarily unavailable".to_vec());
        }

        let total = self.content.len() as u64;
        let parsed = range.as_deref().and_then(parse_range);
        match parsed {
            Some((start, end)) if !self.ignore_ranges => {
                if start >= total {
                    return ResponseTemplate::new(416)
                        .insert_header("Content-Range", format!("bytes */{total}").as_str());
                }
                let last = end.map_or(total - 1, |e| e.min(total - 1));
                let slice = self.content[start as usize..=last as usize].to_vec();
                ResponseTemplate::new(206)
                    .insert_header(
                        "Content-Range",
                        format!("bytes {start}-{last}/{total}").as_str(),
                    )
                    .set_body_bytes(slice)
            }
            _ => ResponseTemplate::new(200).set_body_bytes(self.content.to_vec()),
        }
    }
}
