//! Concurrent processing of independent archives.

use std::io::{Read, Write};

use rayon::prelude::*;

use super::{ChangeRecord, Transformer};
use crate::Result;
use crate::read::ZipReader;

/// One top-level archive to transform.
#[derive(Debug)]
pub struct BatchJob<R, W> {
    /// Name used in logs, records and errors.
    pub name: String,
    /// Archive input.
    pub input: R,
    /// Destination of the rewritten archive.
    pub output: W,
}

impl<R, W> BatchJob<R, W> {
    /// Creates a job.
    pub fn new(name: impl Into<String>, input: R, output: W) -> Self {
        Self {
            name: name.into(),
            input,
            output,
        }
    }
}

impl Transformer<'_> {
    /// Transforms independent archives in parallel.
    ///
    /// Each archive gets its own reader, writer, scratch buffer and record;
    /// a failure of one archive does not affect the others. Results are
    /// returned in job order.
    pub fn process_batch<R, W>(&self, jobs: Vec<BatchJob<R, W>>) -> Vec<Result<(ChangeRecord, W)>>
    where
        R: Read + Send,
        W: Write + Send,
    {
        jobs.into_par_iter()
            .map(|job| self.process_archive(&job.name, ZipReader::new(job.input), job.output))
            .collect()
    }
}
