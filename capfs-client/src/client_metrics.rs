// Copyright 2025 OPPO.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use capfs_common::error::FsError;
use capfs_common::FsResult;
use prometheus::core::Collector;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

fn metrics_err(e: prometheus::Error) -> FsError {
    FsError::common(format!("metrics error: {}", e))
}

/// Counters of one client instance, registered in a private registry so
/// that several clients can live in the same process.
pub struct ClientMetrics {
    registry: Registry,

    pub osd_ops: IntCounterVec,
    pub mrc_ops: IntCounterVec,
    pub read_bytes: IntCounter,
    pub write_bytes: IntCounter,
    pub write_latency_us: Histogram,
    pub async_writes_queued: IntCounter,
    pub async_writes_failed: IntCounter,
    pub pending_async_writes: IntGauge,
    pub xcap_renewal_failures: IntCounter,
    pub file_size_updates: IntCounter,
    pub lock_cache_hits: IntCounter,
}

impl ClientMetrics {
    pub const PREFIX: &'static str = "capfs_client";

    pub fn new() -> FsResult<Self> {
        let registry = Registry::new_custom(Some(Self::PREFIX.to_string()), None)
            .map_err(metrics_err)?;

        let cm = Self {
            osd_ops: IntCounterVec::new(
                Opts::new("osd_ops", "osd operations sent by type"),
                &["op"],
            )
            .map_err(metrics_err)?,
            mrc_ops: IntCounterVec::new(
                Opts::new("mrc_ops", "mrc operations sent by type"),
                &["op"],
            )
            .map_err(metrics_err)?,
            read_bytes: IntCounter::new("read_bytes", "read bytes total").map_err(metrics_err)?,
            write_bytes: IntCounter::new("write_bytes", "write bytes total")
                .map_err(metrics_err)?,
            write_latency_us: Histogram::with_opts(
                HistogramOpts::new("write_latency_us", "write latency in microseconds")
                    .buckets(vec![100.0, 500.0, 1000.0, 5000.0, 20000.0, 100000.0]),
            )
            .map_err(metrics_err)?,
            async_writes_queued: IntCounter::new("async_writes_queued", "async writes queued")
                .map_err(metrics_err)?,
            async_writes_failed: IntCounter::new("async_writes_failed", "async writes failed")
                .map_err(metrics_err)?,
            pending_async_writes: IntGauge::new(
                "pending_async_writes",
                "async writes in flight",
            )
            .map_err(metrics_err)?,
            xcap_renewal_failures: IntCounter::new(
                "xcap_renewal_failures",
                "failed capability renewals",
            )
            .map_err(metrics_err)?,
            file_size_updates: IntCounter::new(
                "file_size_updates",
                "file sizes written back to the mrc",
            )
            .map_err(metrics_err)?,
            lock_cache_hits: IntCounter::new(
                "lock_cache_hits",
                "lock requests answered from the local cache",
            )
            .map_err(metrics_err)?,
            registry,
        };

        cm.register(cm.osd_ops.clone())?;
        cm.register(cm.mrc_ops.clone())?;
        cm.register(cm.read_bytes.clone())?;
        cm.register(cm.write_bytes.clone())?;
        cm.register(cm.write_latency_us.clone())?;
        cm.register(cm.async_writes_queued.clone())?;
        cm.register(cm.async_writes_failed.clone())?;
        cm.register(cm.pending_async_writes.clone())?;
        cm.register(cm.xcap_renewal_failures.clone())?;
        cm.register(cm.file_size_updates.clone())?;
        cm.register(cm.lock_cache_hits.clone())?;

        Ok(cm)
    }

    fn register<C: Collector + 'static>(&self, c: C) -> FsResult<()> {
        self.registry.register(Box::new(c)).map_err(metrics_err)
    }

    pub fn osd_op(&self, op: &str) {
        self.osd_ops.with_label_values(&[op]).inc();
    }

    pub fn mrc_op(&self, op: &str) {
        self.mrc_ops.with_label_values(&[op]).inc();
    }

    pub fn text_output(&self) -> FsResult<String> {
        let mut buf = vec![];
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(metrics_err)?;
        String::from_utf8(buf).map_err(|e| FsError::common(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_output() {
        let m1 = ClientMetrics::new().unwrap();
        let m2 = ClientMetrics::new().unwrap();
        m1.osd_op("write");
        m1.osd_op("write");
        m1.read_bytes.inc_by(10);

        let text = m1.text_output().unwrap();
        assert!(text.contains("capfs_client_osd_ops{op=\"write\"} 2"));
        assert!(text.contains("capfs_client_read_bytes 10"));
        assert_eq!(m2.osd_ops.with_label_values(&["write"]).get(), 0);
    }
}
