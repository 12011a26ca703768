use crate::pool::ErrorLogEntry;

/// Failures gathered across every order of a batch, in the order they were recorded.
#[derive(Debug, Clone, Default)]
pub struct RetryManifest {
    entries: Vec<ErrorLogEntry>,
}

impl RetryManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend<I>(&mut self, errors: I)
    where
        I: IntoIterator<Item = ErrorLogEntry>,
    {
        self.entries.extend(errors);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ErrorLogEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ErrorLogEntry> {
        self.entries
    }
}
