//! ScriptedTransport - 決定的な Transport（テスト・デモ用）
//!
//! # 実装詳細
//! - script に積んだ結果を順番に返し、尽きたら fallback を返す
//! - `fail_every` を指定すると N 回に 1 回 recoverable な失敗を返す
//! - 送信したリクエストと時刻（tokio の仮想時間）を記録する

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::domain::{DeliveryError, DeliveryRequest};
use crate::ports::Transport;

/// One call to [`ScriptedTransport::deliver`].
#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    pub request: DeliveryRequest,
    pub at: Instant,
    pub result: Result<(), DeliveryError>,
}

pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<(), DeliveryError>>>,
    fallback: Result<(), DeliveryError>,
    fail_every: Option<u32>,
    latency: Duration,
    records: Mutex<Vec<DeliveryRecord>>,
}

impl ScriptedTransport {
    /// Play `script` in order, then answer `fallback` forever.
    pub fn new(
        script: Vec<Result<(), DeliveryError>>,
        fallback: Result<(), DeliveryError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            fail_every: None,
            latency: Duration::ZERO,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn always_ok() -> Self {
        Self::new(Vec::new(), Ok(()))
    }

    pub fn always_failing(error: DeliveryError) -> Self {
        Self::new(Vec::new(), Err(error))
    }

    /// Every `n`-th call fails recoverably (n = 0 disables it).
    pub fn fail_every(mut self, n: u32) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }

    /// Simulated network latency per call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn records(&self) -> Vec<DeliveryRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn attempts(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// URLs of the calls that succeeded, in order.
    pub fn delivered_urls(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|record| record.result.is_ok())
            .map(|record| record.request.url)
            .collect()
    }

    fn next_result(&self, call: usize) -> Result<(), DeliveryError> {
        if let Some(n) = self.fail_every
            && call % n as usize == 0
        {
            return Err(DeliveryError::recoverable(format!("simulated failure on call {call}")));
        }
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn deliver(&self, request: DeliveryRequest) -> Result<(), DeliveryError> {
        let at = Instant::now();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let call = self.attempts() + 1;
        let result = self.next_result(call);
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(DeliveryRecord {
                request,
                at,
                result: result.clone(),
            });
        result
    }
}
