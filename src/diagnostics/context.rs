//! Diagnostic context - thread state awareness.

use std::thread::ThreadId;

/// Diagnostic context containing runtime state.
#[derive(Debug, Clone)]
pub struct DiagContext {
    /// Current thread ID.
    pub thread_id: ThreadId,
    /// Thread name (if available).
    pub thread_name: Option<String>,
}

impl DiagContext {
    /// Capture the current context.
    pub fn capture() -> Self {
        let thread = std::thread::current();
        Self {
            thread_id: thread.id(),
            thread_name: thread.name().map(String::from),
        }
    }

    /// Format context for diagnostic output.
    pub fn format(&self) -> String {
        match self.thread_name {
            Some(ref name) => format!("thread=\"{}\"", name),
            None => format!("thread={:?}", self.thread_id),
        }
    }
}

impl std::fmt::Display for DiagContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_named_thread() {
        let formatted = std::thread::Builder::new()
            .name("render".into())
            .spawn(|| DiagContext::capture().format())
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(formatted, "thread=\"render\"");
    }
}
