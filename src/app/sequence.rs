/// Monotonic numbering for one kind of request. Responses are only applied
/// when they answer the most recently issued request; anything older arrived
/// out of order and would overwrite fresher state.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RequestSequence {
    latest_issued: u64,
}

impl RequestSequence {
    pub fn issue(&mut self) -> u64 {
        self.latest_issued = self.latest_issued.wrapping_add(1);
        self.latest_issued
    }

    pub fn is_current(&self, seq: u64) -> bool {
        seq >= self.latest_issued
    }
}
