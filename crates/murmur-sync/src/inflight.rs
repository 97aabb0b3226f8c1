/// Coalesces a request that must never have more than one copy outstanding.
///
/// Asking again while busy is remembered (latest sequence wins) and handed
/// back once the outstanding request finishes, so the caller re-issues it
/// exactly once no matter how many times it was asked for meanwhile.
#[derive(Debug, Default, Clone)]
pub(crate) struct InFlight {
    busy: bool,
    again: Option<u64>,
}

impl InFlight {
    /// Returns `true` when the caller should issue the request now.
    pub fn begin(&mut self, seq: u64) -> bool {
        if self.busy {
            self.again = Some(seq);
            false
        } else {
            self.busy = true;
            true
        }
    }

    /// Mark the outstanding request done. Returns the sequence to re-issue
    /// at when it was asked for again; the slot stays busy in that case.
    pub fn finish(&mut self) -> Option<u64> {
        match self.again.take() {
            Some(seq) => Some(seq),
            None => {
                self.busy = false;
                None
            }
        }
    }
}
