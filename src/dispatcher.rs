//! Job Dispatcher (spec.md §4.5): mutex-guarded work splitting for one
//! parallel stage.
//!
//! Jobs are handed out in two sizes: a run of `big_block`-sized chunks
//! (one per worker, roughly) followed by a tail of `small_block`-sized
//! chunks for load balance. The split point and block sizes are fixed
//! once, at [`JobDispatcher::new`], from the total item count, the
//! worker count, and a caller-supplied minimum job granularity.

use std::sync::Mutex;

const SMALL_PROPORTION: f64 = 0.05;
const BIG_PROPORTION: f64 = 0.95;

// ======================================================================
// JobDispatcher - PUBLIC

/// Hands out non-overlapping `[start, stop)` ranges of `0..imax` to
/// workers pulling jobs concurrently.
pub struct JobDispatcher {
    imax: usize,
    big_block_limit: usize,
    big_blocksize: usize,
    small_blocksize: usize,
    next_job_start: Mutex<usize>,
}

impl JobDispatcher {
    /// Builds a dispatcher for `imax` items, `threadcount` workers, and
    /// a minimum job granularity of `min_job_size`.
    ///
    /// `threadcount` and `min_job_size` are clamped to `1` if given as
    /// `0`; `imax == 0` produces a dispatcher that immediately returns
    /// empty ranges.
    pub fn new(imax: usize, threadcount: usize, min_job_size: usize) -> Self {
        let threadcount = threadcount.max(1);
        let min_job_size = min_job_size.max(1);

        if imax == 0 {
            return Self {
                imax: 0,
                big_block_limit: 0,
                big_blocksize: min_job_size,
                small_blocksize: min_job_size,
                next_job_start: Mutex::new(0),
            };
        }

        let small_blocksize = round_to_multiple(
            (0.5 + (SMALL_PROPORTION * imax as f64) / threadcount as f64).floor() as usize,
            min_job_size,
        );

        let target = (0.5 + BIG_PROPORTION * imax as f64).floor() as usize;
        let mut remainder = imax.saturating_sub(target);
        remainder = if remainder > 0 && remainder <= small_blocksize {
            small_blocksize
        } else {
            small_blocksize * (((remainder as f64 + 0.5) / small_blocksize as f64).floor() as usize)
        };
        let big_block_limit = imax.saturating_sub(remainder);

        let big_blocksize = min_job_size
            * ((big_block_limit + min_job_size * threadcount - 1) / (min_job_size * threadcount));

        log::trace!(
            "job dispatcher: imax={imax} big_block_limit={big_block_limit} \
             big_blocksize={big_blocksize} small_blocksize={small_blocksize}"
        );

        Self {
            imax,
            big_block_limit,
            big_blocksize,
            small_blocksize,
            next_job_start: Mutex::new(0),
        }
    }

    /// Claims the next job, returning `[start, stop)`. Returns an empty
    /// range (`start == stop == imax`) once all items are claimed.
    pub fn claim_job(&self) -> (usize, usize) {
        let (start, mut stop) = {
            let mut next_job_start = self.next_job_start.lock().unwrap();
            let start = *next_job_start;
            if start < self.big_block_limit {
                stop = if start + self.big_blocksize > self.big_block_limit {
                    self.big_block_limit
                } else {
                    start + self.big_blocksize
                };
            } else {
                stop = start + self.small_blocksize;
            }
            *next_job_start = stop;
            (start, stop)
        };
        if stop > self.imax {
            stop = self.imax;
        }
        (start.min(self.imax), stop)
    }
}

fn round_to_multiple(value: usize, unit: usize) -> usize {
    if value <= unit {
        unit
    } else {
        unit * ((value + unit / 2) / unit)
    }
}

// ======================================================================
// TESTS
