//! Test utilities for the gateway - in-process fakes for the external collaborators
//!
//! These let the pipeline and the router run without network access:
//! - `RecordingDataSource` returns a fixed record and records every reference
//! - `ScriptedProvider` returns a fixed answer and records every request
//! - `MemoryDemographicsStore` keeps inserted rows in memory

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

use crate::demographics::{DemographicsRecord, DemographicsStore, StoreError};
use crate::gateway::{CompletionRequest, DataRef, DataSource, UpstreamFetchError};
use crate::providers::{CompletionError, CompletionProvider};

/// Data source fake with a canned outcome
#[derive(Debug)]
pub struct RecordingDataSource {
    outcome: Result<Value, UpstreamFetchError>,
    calls: Mutex<Vec<String>>,
}

impl RecordingDataSource {
    pub fn returning(record: Value) -> Self {
        Self {
            outcome: Ok(record),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: UpstreamFetchError) -> Self {
        Self {
            outcome: Err(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// References fetched so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

#[async_trait]
impl DataSource for RecordingDataSource {
    async fn fetch(&self, reference: &DataRef) -> Result<Value, UpstreamFetchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(reference.to_string());
        }
        self.outcome.clone()
    }
}

/// Completion provider fake with a canned outcome
#[derive(Debug)]
pub struct ScriptedProvider {
    outcome: Result<String, CompletionError>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn answering(answer: impl Into<String>) -> Self {
        Self {
            outcome: Ok(answer.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: CompletionError) -> Self {
        Self {
            outcome: Err(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Completion requests received so far, in order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.outcome.clone()
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Demographics store keeping rows in memory; ids start at 1
#[derive(Debug, Default)]
pub struct MemoryDemographicsStore {
    rows: Mutex<Vec<DemographicsRecord>>,
    fail_with: Option<String>,
}

impl MemoryDemographicsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            fail_with: Some(message.into()),
        }
    }

    pub fn rows(&self) -> Vec<DemographicsRecord> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DemographicsStore for MemoryDemographicsStore {
    async fn insert(&self, record: &DemographicsRecord) -> Result<i64, StoreError> {
        if let Some(message) = &self.fail_with {
            return Err(StoreError::Query(message.clone()));
        }
        let mut rows = self
            .rows
            .lock()
            .map_err(|e| StoreError::Query(e.to_string()))?;
        rows.push(record.clone());
        Ok(rows.len() as i64)
    }
}
