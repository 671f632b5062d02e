use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use serde_json::Value;

use crate::error::ExecutorError;

use super::RpcExecutor;

/// A mock RPC executor for testing. Returns canned replies from a per-method
/// map populated via the builder pattern, and records every call in order.
pub struct MockExecutor {
    replies: HashMap<String, Result<Value, ExecutorError>>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    call_delay: Option<Duration>,
}

impl MockExecutor {
    pub fn builder() -> MockExecutorBuilder {
        MockExecutorBuilder {
            replies: HashMap::new(),
            call_delay: None,
        }
    }

    /// Every recorded `(method, params)` pair, in global call order.
    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().expect("mock call log lock").clone()
    }

    pub fn methods_called(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|(method, _)| method)
            .collect()
    }
}

pub struct MockExecutorBuilder {
    replies: HashMap<String, Result<Value, ExecutorError>>,
    call_delay: Option<Duration>,
}

impl MockExecutorBuilder {
    pub fn with_reply(mut self, method: &str, reply: Value) -> Self {
        self.replies.insert(method.to_owned(), Ok(reply));
        self
    }

    pub fn with_error(mut self, method: &str, error: ExecutorError) -> Self {
        self.replies.insert(method.to_owned(), Err(error));
        self
    }

    /// Sleep this long inside every `execute`, widening race windows for
    /// interleaving tests.
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = Some(delay);
        self
    }

    pub fn build(self) -> MockExecutor {
        MockExecutor {
            replies: self.replies,
            calls: Mutex::new(Vec::new()),
            call_delay: self.call_delay,
        }
    }
}

impl RpcExecutor for MockExecutor {
    fn execute(&self, method: &str, params: &[Value]) -> Result<Value, ExecutorError> {
        if let Some(delay) = self.call_delay {
            thread::sleep(delay);
        }
        self.calls
            .lock()
            .expect("mock call log lock")
            .push((method.to_owned(), params.to_vec()));
        match self.replies.get(method) {
            Some(reply) => reply.clone(),
            None => Err(ExecutorError::Other(format!(
                "no canned reply for method {method}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn records_calls_in_order() {
        let mock = MockExecutor::builder()
            .with_reply("getinfo", json!({"blocks": 1}))
            .build();

        mock.execute("getinfo", &[json!("a")]).expect("canned reply");
        mock.execute("getinfo", &[json!("b")]).expect("canned reply");

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, vec![json!("a")]);
        assert_eq!(calls[1].1, vec![json!("b")]);
    }

    #[test]
    fn unknown_method_reports_unstructured_error() {
        let mock = MockExecutor::builder().build();
        let err = mock
            .execute("bogus", &[])
            .expect_err("unknown method must fail");
        assert!(matches!(err, ExecutorError::Other(_)));
    }
}
