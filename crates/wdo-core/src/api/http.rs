//! Response head parsing for curl header callbacks.
//!
//! Curl hands us one header line per callback, including the status line of
//! every response in a redirect chain. `ResponseHead` keeps only the last one.

/// Status line and headers of the final response.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResponseHead {
    pub(crate) status: Option<u32>,
    pub(crate) reason: String,
    pub(crate) headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// Feed one raw header line.
    pub(crate) fn push_line(&mut self, line: &str) {
        let line = line.trim_end();
        if line.is_empty() {
            return;
        }
        if line.starts_with("HTTP/") {
            // A new status line starts a new response (redirect hop or final).
            *self = ResponseHead::default();
            let mut parts = line.splitn(3, ' ');
            parts.next();
            self.status = parts.next().and_then(|c| c.trim().parse().ok());
            self.reason = parts.next().unwrap_or("").trim().to_string();
            return;
        }
        if let Some((name, value)) = line.split_once(':') {
            self.headers
                .push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    /// Case-insensitive header lookup.
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A buffered response to a metadata request.
#[derive(Debug)]
pub(crate) struct HttpResponse {
    pub(crate) status: u32,
    pub(crate) head: ResponseHead,
    pub(crate) body: Vec<u8>,
}
