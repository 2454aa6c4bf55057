use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

use super::transport::RpcTransport;

type Handler = Box<dyn Fn(&str, &Value) -> Result<Value, String> + Send + Sync>;

/// Scripted transport that records every request it sees.
pub struct MockTransport {
    handler: Handler,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockTransport {
    pub fn new(handler: impl Fn(&str, &Value) -> Result<Value, String> + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn endpoints_called(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(e, _)| e.clone()).collect()
    }

    pub fn actions_called(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| body["action"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.calls.lock().unwrap().iter().map(|(_, b)| b.clone()).collect()
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, String> {
        self.calls.lock().unwrap().push((endpoint.to_string(), body.clone()));
        (self.handler)(endpoint, body)
    }
}
