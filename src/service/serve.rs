//! Concurrent request loop
//!
//! Reads newline-delimited JSON requests and writes one JSON reply line per
//! request as soon as it completes. Each request runs as a blocking task on
//! an extractor checked out of a pool, so parsers and cache connections are
//! reused across requests. A timed-out task is abandoned: its reply is an
//! error and its eventual result is discarded. It keeps its concurrency slot
//! until the work actually ends.

use super::{Extract, ExtractError, LocalExtractor};
use crate::config::ExtractorConfig;
use crate::contract::{RepositoryData, Request};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

/// One reply line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    Ok(RepositoryData),
    Error(ReplyError),
}

/// Error details of a failed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyError {
    /// Repository the request named, when it could be decoded
    pub repository_id: Option<String>,
    pub kind: String,
    pub message: String,
}

impl Reply {
    fn from_error(repository_id: Option<String>, error: &ExtractError) -> Self {
        Reply::Error(ReplyError {
            repository_id,
            kind: error.kind().to_string(),
            message: error.to_string(),
        })
    }
}

/// Counters for one serve session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeSummary {
    pub requests: usize,
    pub failures: usize,
}

/// An extractor usable from any blocking worker
pub type BoxedExtractor = Box<dyn Extract + Send>;

/// Builds a new extractor when the pool has none idle
pub type ExtractorFactory = Box<dyn Fn() -> Result<BoxedExtractor> + Send + Sync>;

/// Idle extractors shared by the blocking workers
struct ExtractorPool {
    idle: Mutex<Vec<BoxedExtractor>>,
    factory: ExtractorFactory,
}

impl ExtractorPool {
    fn new(factory: ExtractorFactory) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            factory,
        }
    }

    fn checkout(&self) -> Result<BoxedExtractor, ExtractError> {
        let idle = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        match idle {
            Some(extractor) => Ok(extractor),
            None => (self.factory)().map_err(|e| ExtractError::Setup(format!("{:#}", e))),
        }
    }

    fn checkin(&self, extractor: BoxedExtractor) {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(extractor);
    }

    /// Run one extraction on a pooled extractor
    fn run(&self, request: &Request) -> Result<RepositoryData, ExtractError> {
        let mut extractor = self.checkout()?;
        let result = extractor.extract(request);
        self.checkin(extractor);
        result
    }
}

/// Serve requests from `input` until end of stream with git + tree-sitter
/// extractors built from `config`
pub async fn serve<R, W>(config: Arc<ExtractorConfig>, input: R, output: W) -> Result<ServeSummary>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let factory_config = config.clone();
    let factory: ExtractorFactory = Box::new(move || -> Result<BoxedExtractor> {
        let extractor = LocalExtractor::from_config(factory_config.clone())?;
        Ok(Box::new(extractor) as BoxedExtractor)
    });

    serve_with(&config, factory, input, output).await
}

/// Serve requests with extractors produced by `factory`.
///
/// Only the concurrency and timeout settings of `config` apply here.
pub async fn serve_with<R, W>(
    config: &ExtractorConfig,
    factory: ExtractorFactory,
    input: R,
    output: W,
) -> Result<ServeSummary>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_extractions.max(1)));
    let pool = Arc::new(ExtractorPool::new(factory));
    let timeout_secs = config.extraction_timeout_secs;
    let (tx, mut rx) = mpsc::unbounded_channel::<Reply>();

    let writer = tokio::spawn(async move {
        let mut output = output;
        let mut summary = ServeSummary::default();

        while let Some(reply) = rx.recv().await {
            summary.requests += 1;
            if matches!(reply, Reply::Error(_)) {
                summary.failures += 1;
            }

            let mut line = serde_json::to_vec(&reply)?;
            line.push(b'\n');
            output.write_all(&line).await?;
            output.flush().await?;
        }

        output.shutdown().await?;
        Ok::<_, anyhow::Error>(summary)
    });

    let mut lines = BufReader::new(input).lines();
    let mut tasks = JoinSet::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Rejecting undecodable request: {}", e);
                let _ = tx.send(Reply::from_error(None, &ExtractError::Wire(e.into())));
                continue;
            }
        };

        let permit = semaphore.clone().acquire_owned().await?;
        let pool = pool.clone();
        let tx = tx.clone();

        tasks.spawn(async move {
            let reply = run_one(pool, permit, request, timeout_secs).await;
            let _ = tx.send(reply);
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!("Request task panicked: {}", e);
        }
    }

    drop(tx);
    let summary = writer.await??;

    tracing::info!(
        "Served {} requests ({} failed)",
        summary.requests,
        summary.failures
    );

    Ok(summary)
}

async fn run_one(
    pool: Arc<ExtractorPool>,
    permit: OwnedSemaphorePermit,
    request: Request,
    timeout_secs: u64,
) -> Reply {
    let repository_id = Some(request.repository_id.clone());

    let task = tokio::task::spawn_blocking(move || {
        // Held until the extraction returns, even if the reply timed out
        let _permit = permit;
        pool.run(&request)
    });

    let joined = if timeout_secs == 0 {
        task.await
    } else {
        match tokio::time::timeout(Duration::from_secs(timeout_secs), task).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::warn!("Extraction of {:?} timed out", repository_id);
                return Reply::from_error(repository_id, &ExtractError::Timeout(timeout_secs));
            }
        }
    };

    match joined {
        Ok(Ok(data)) => Reply::Ok(data),
        Ok(Err(e)) => {
            tracing::warn!("Extraction failed: {}", e);
            Reply::from_error(repository_id, &e)
        }
        Err(e) => Reply::from_error(repository_id, &ExtractError::Task(e.to_string())),
    }
}
