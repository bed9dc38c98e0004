// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background export with cooperative cancellation.
//
// Rendering is CPU-bound, so each export runs under
// `tokio::task::spawn_blocking`.  An `ExportSlot` admits one export at a
// time per owner; the `CancellationToken` is polled between pages.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tilewerk_core::config::TilerConfig;
use tilewerk_core::error::{Result, TilewerkError};
use tilewerk_core::human_errors::humanize_error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::context::DocumentContext;
use crate::job::{ExportId, ExportJob};
use crate::pipeline::{ExportOutcome, ExportPipeline};

/// Shared cancel flag, checked by the pipeline between pages.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TilewerkError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Admits at most one running export.
#[derive(Debug, Clone, Default)]
pub struct ExportSlot {
    busy: Arc<AtomicBool>,
}

impl ExportSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claim the slot, or fail with `ExportInProgress`.
    pub fn try_acquire(&self) -> Result<SlotGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| TilewerkError::ExportInProgress)?;
        Ok(SlotGuard {
            busy: Arc::clone(&self.busy),
        })
    }
}

/// Releases the slot when dropped, including on panic.
#[derive(Debug)]
pub struct SlotGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// A running export.
#[derive(Debug)]
pub struct ExportTask {
    job_id: ExportId,
    token: CancellationToken,
    handle: JoinHandle<ExportOutcome>,
}

impl ExportTask {
    /// Start `job` on the blocking pool.  Must be called inside a Tokio
    /// runtime.
    pub fn spawn(slot: &ExportSlot, config: TilerConfig, job: ExportJob, ctx: DocumentContext) -> Result<Self> {
        let guard = slot.try_acquire()?;
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let job_id = job.id;

        info!(job_id = %job_id, target = ?job.target, "export task started");
        let handle = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let progress = |done: usize, total: usize| debug!(job_id = %job_id, done, total, "page exported");
            ExportPipeline::new(&config)
                .with_progress(&progress)
                .run_reported(&job, &ctx, &worker_token)
        });

        Ok(Self {
            job_id,
            token,
            handle,
        })
    }

    pub fn id(&self) -> ExportId {
        self.job_id
    }

    /// Request cancellation; the worker stops before its next page.
    pub fn cancel(&self) {
        info!(job_id = %self.job_id, "export cancellation requested");
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker.  A panicked worker is reported as a failure.
    pub async fn wait(self) -> ExportOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(job_id = %self.job_id, error = %e, "export worker panicked");
                ExportOutcome::Failed(humanize_error(&TilewerkError::ImageError(format!(
                    "export worker stopped unexpectedly: {e}"
                ))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ExportTarget;
    use image::{Rgba, RgbaImage};
    use tilewerk_core::types::ImageFormat;
    use tilewerk_layout::ScaleFactor;

    fn calibrated(config: &TilerConfig) -> DocumentContext {
        let mut ctx = DocumentContext::new(RgbaImage::from_pixel(300, 250, Rgba([180, 180, 180, 255])), "plan");
        ctx.set_scale(ScaleFactor::new(1.0).expect("scale"), config);
        ctx
    }

    #[test]
    fn token_check_fails_after_cancel() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
        token.clone().cancel();
        assert!(matches!(token.check(), Err(TilewerkError::Cancelled)));
    }

    #[test]
    fn slot_admits_one_holder() {
        let slot = ExportSlot::new();
        let guard = slot.try_acquire().expect("first");
        assert!(slot.is_busy());
        assert!(matches!(slot.try_acquire(), Err(TilewerkError::ExportInProgress)));
        drop(guard);
        assert!(!slot.is_busy());
    }

    #[tokio::test]
    async fn task_completes_and_frees_slot() {
        let config = TilerConfig::default();
        let ctx = calibrated(&config);
        let dir = tempfile::tempdir().expect("tempdir");
        let job = ExportJob::new(ExportTarget::TileImages(ImageFormat::Png), dir.path(), &config);
        let slot = ExportSlot::new();

        let task = ExportTask::spawn(&slot, config, job, ctx).expect("spawn");
        match task.wait().await {
            ExportOutcome::Completed(report) => assert_eq!(report.files.len(), 2),
            other => panic!("expected completion, got {other:?}"),
        }
        assert!(!slot.is_busy());
    }

    #[tokio::test]
    async fn second_spawn_is_rejected_while_running() {
        let config = TilerConfig::default();
        let slot = ExportSlot::new();
        let _held = slot.try_acquire().expect("hold");
        let job = ExportJob::new(ExportTarget::MultiPagePdf, "/tmp/never.pdf", &config);
        let result = ExportTask::spawn(&slot, config.clone(), job, calibrated(&config));
        assert!(matches!(result, Err(TilewerkError::ExportInProgress)));
    }

    #[tokio::test]
    async fn cancelled_before_start_writes_nothing() {
        let config = TilerConfig::default();
        let ctx = calibrated(&config);
        let dir = tempfile::tempdir().expect("tempdir");
        let job = ExportJob::new(ExportTarget::TileImages(ImageFormat::Png), dir.path(), &config);
        let token = CancellationToken::new();
        token.cancel();

        let outcome = ExportPipeline::new(&config).run_reported(&job, &ctx, &token);
        assert!(matches!(outcome, ExportOutcome::Cancelled));
        let leftover = std::fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(leftover, 0);
    }
}
