// parallel.rs - split destination rows across scoped worker threads

/// Number of threads used for per-pixel loops.
///
/// Rows are handed out as contiguous bands; every pixel is computed the same
/// way regardless of the band it lands in, so the thread count never changes
/// the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Workers {
    threads: usize,
}

impl Workers {
    /// `0` means one thread per logical core.
    pub fn new(threads: usize) -> Self {
        let threads = if threads == 0 { num_cpus::get() } else { threads };
        Self {
            threads: threads.max(1),
        }
    }

    pub fn single() -> Self {
        Self { threads: 1 }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Fill `out` row by row. `f(y, row)` receives the row index and the
    /// `row_len` slice of that row.
    pub fn fill_rows<T, F>(&self, out: &mut [T], row_len: usize, f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync,
    {
        if row_len == 0 || out.is_empty() {
            return;
        }
        let rows = out.len() / row_len;
        let bands = self.threads.min(rows).max(1);
        if bands == 1 {
            for (y, row) in out.chunks_mut(row_len).enumerate() {
                f(y, row);
            }
            return;
        }

        let rows_per_band = rows.div_ceil(bands);
        let f = &f;
        std::thread::scope(|s| {
            for (band, chunk) in out.chunks_mut(rows_per_band * row_len).enumerate() {
                s.spawn(move || {
                    let first = band * rows_per_band;
                    for (i, row) in chunk.chunks_mut(row_len).enumerate() {
                        f(first + i, row);
                    }
                });
            }
        });
    }
}

impl Default for Workers {
    fn default() -> Self {
        Self::new(0)
    }
}
