//! Background export service
//!
//! ```text
//! Session ──export()──► ExportService (rayon ThreadPool, "export-N")
//!                              │
//!                              │ render → encode → hash
//!                              ▼
//!                     oneshot::Sender<ExportResult<ExportedFile>>
//!                              │
//!                              ▼
//!                    ExportHandle (.wait() or .await)
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use super::effects::EffectsConfig;
use super::encode::{export_region, ExportedFile};
use super::{ExportError, ExportResult};
use crate::clip::Clip;
use crate::timeline::Region;

/// Thread pool service for region exports
///
/// The pool is reusable: create once, export many times.
pub struct ExportService {
    thread_pool: rayon::ThreadPool,
    fade_ms: f32,
}

impl ExportService {
    /// Create a service with `threads` workers
    pub fn new(threads: usize, fade_ms: f32) -> ExportResult<Self> {
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("export-{}", i))
            .build()
            .map_err(|e| ExportError::PoolUnavailable(e.to_string()))?;

        Ok(Self { thread_pool, fade_ms })
    }

    /// Queue an export of `region` and return a handle to its result
    pub fn export(&self, clip: Arc<Clip>, region: Region, effects: EffectsConfig) -> ExportHandle {
        let (reply, rx) = oneshot::channel();
        let fade_ms = self.fade_ms;

        self.thread_pool.spawn(move || {
            let result = export_region(&clip, &region, &effects, fade_ms);
            if let Err(e) = &result {
                log::warn!("Export of {} failed: {}", clip.name(), e);
            }
            // Receiver may have been dropped; nothing to report to
            let _ = reply.send(result);
        });

        ExportHandle { rx }
    }
}

/// Pending result of a queued export
///
/// Block with [`ExportHandle::wait`] from synchronous code, or `.await` it.
#[must_use = "an export handle does nothing unless waited on"]
pub struct ExportHandle {
    rx: oneshot::Receiver<ExportResult<ExportedFile>>,
}

impl ExportHandle {
    /// Block the calling thread until the export finishes
    ///
    /// Must not be called from inside an async runtime.
    pub fn wait(self) -> ExportResult<ExportedFile> {
        self.rx.blocking_recv().unwrap_or(Err(ExportError::WorkerGone))
    }

    /// Take the result if the export already finished
    pub fn try_take(&mut self) -> Option<ExportResult<ExportedFile>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(ExportError::WorkerGone)),
        }
    }
}

impl Future for ExportHandle {
    type Output = ExportResult<ExportedFile>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(ExportError::WorkerGone)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::encode::export_region;

    fn clip() -> Arc<Clip> {
        let samples: Vec<f32> = (0..8820).map(|i| ((i % 100) as f32 / 100.0) - 0.5).collect();
        Arc::new(Clip::new("saw", 44100, vec![samples]).unwrap())
    }

    #[test]
    fn test_background_export_matches_inline() {
        let service = ExportService::new(2, 1.0).unwrap();
        let clip = clip();
        let region = Region::new(0.1, 0.9);
        let effects = EffectsConfig { gain: 0.5, ..EffectsConfig::default() };

        let background = service.export(clip.clone(), region, effects).wait().unwrap();
        let inline = export_region(&clip, &region, &effects, 1.0).unwrap();
        assert_eq!(background, inline);
    }

    #[test]
    fn test_errors_are_delivered() {
        let service = ExportService::new(1, 1.0).unwrap();
        let bad = EffectsConfig { speed: 0.0, ..EffectsConfig::default() };
        let result = service.export(clip(), Region::full(), bad).wait();
        assert!(matches!(result, Err(ExportError::InvalidEffects(_))));
    }

    #[test]
    fn test_handle_is_awaitable() {
        let service = ExportService::new(1, 1.0).unwrap();
        let handle = service.export(clip(), Region::full(), EffectsConfig::default());

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let file = runtime.block_on(handle).unwrap();
        assert!(file.name.ends_with(".wav"));
    }
}
