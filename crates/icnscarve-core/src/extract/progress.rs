//! Progress reporting for extraction passes.

/// Observer notified as the cursor advances through the source buffer.
pub trait Progress {
    /// Called with the current cursor position and the buffer length
    fn report(&mut self, bytes_processed: u64, total_bytes: u64);

    /// Called once when the pass stops, for whatever reason
    fn finish(&mut self) {}
}

impl<P: Progress + ?Sized> Progress for &mut P {
    fn report(&mut self, bytes_processed: u64, total_bytes: u64) {
        (**self).report(bytes_processed, total_bytes);
    }

    fn finish(&mut self) {
        (**self).finish();
    }
}

/// A progress observer that ignores every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl Progress for NullProgress {
    fn report(&mut self, _bytes_processed: u64, _total_bytes: u64) {}
}

/// Records every update for assertions
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub(crate) struct RecordingProgress {
    pub(crate) updates: Vec<(u64, u64)>,
    pub(crate) finished: bool,
}

#[cfg(test)]
impl Progress for RecordingProgress {
    fn report(&mut self, bytes_processed: u64, total_bytes: u64) {
        self.updates.push((bytes_processed, total_bytes));
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}
