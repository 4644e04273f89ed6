/// A rendered-frame event.
///
/// Frame ids increase monotonically for the lifetime of a viewer; consumers
/// use them to pair render submissions with the frame that triggered them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Frame {
    pub id: u64,
}

impl Frame {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn next(self) -> Self {
        Self::new(self.id + 1)
    }
}
