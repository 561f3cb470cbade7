use super::{BuildOpts, Client, GatewayError, ReadRequest, Reference, SolveRequest, SolveResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

/// Scripted engine: answers solves from a queue and records every request.
pub struct MockClient {
    opts: BuildOpts,
    responses: Mutex<VecDeque<Result<SolveResult, GatewayError>>>,
    requests: Mutex<Vec<SolveRequest>>,
    hang: bool,
}

impl MockClient {
    pub fn new(opts: BuildOpts) -> Self {
        Self {
            opts,
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            hang: false,
        }
    }

    /// Every solve records its request and then never completes
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn push_result(&self, result: SolveResult) {
        self.responses.lock().unwrap().push_back(Ok(result));
    }

    pub fn push_error(&self, error: GatewayError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<SolveRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn solve_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Client for MockClient {
    fn build_opts(&self) -> &BuildOpts {
        &self.opts
    }

    async fn solve(&self, req: SolveRequest) -> Result<SolveResult, GatewayError> {
        self.requests.lock().unwrap().push(req);

        if self.hang {
            std::future::pending::<()>().await;
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Solve("no scripted response".to_string())))
    }
}

/// In-memory filesystem reference
#[derive(Debug, Default)]
pub struct MemoryRef {
    files: BTreeMap<String, Bytes>,
}

impl MemoryRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<Bytes>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }
}

#[async_trait]
impl Reference for MemoryRef {
    async fn read_file(&self, req: ReadRequest) -> Result<Bytes, GatewayError> {
        self.files
            .get(req.filename.trim_start_matches('/'))
            .cloned()
            .ok_or(GatewayError::NotFound(req.filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llb::CapSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_scripted_responses_in_order() {
        let client = MockClient::new(BuildOpts::new(CapSet::all()));
        client.push_error(GatewayError::Solve("boom".to_string()));
        client.push_result(SolveResult::with_ref(Arc::new(MemoryRef::new())));

        assert!(client.solve(SolveRequest::default()).await.is_err());
        assert!(client.solve(SolveRequest::default()).await.is_ok());
        assert!(client.solve(SolveRequest::default()).await.is_err());
        assert_eq!(client.solve_count(), 3);
    }

    #[tokio::test]
    async fn test_memory_ref_reads() {
        let reference = MemoryRef::new().with_file("package.json", "{}");
        let content = reference
            .read_file(ReadRequest::new("/package.json"))
            .await
            .unwrap();
        assert_eq!(content, Bytes::from_static(b"{}"));

        let err = reference
            .read_file(ReadRequest::new("yarn.lock"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(path) if path == "yarn.lock"));
    }
}
