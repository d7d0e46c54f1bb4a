//! Render worker - runs in dedicated thread(s)
//!
//! Workers pull jobs from a shared MPMC channel, probe the cache,
//! rasterize through the page source, and publish results. The source
//! call itself cannot be interrupted; the cancellation token is checked
//! on both sides of it, and a result that lands after cancellation is
//! cached but reported as cancelled.

use std::sync::{Arc, Mutex};

use flume::{Receiver, Sender};

use crate::source::PageSource;

use super::cache::{TileCache, TilePayload};
use super::request::{RenderFault, RenderJob, RenderResponse, WorkerMessage};

pub(crate) fn render_worker(
    source: Arc<dyn PageSource>,
    jobs: Receiver<WorkerMessage>,
    responses: Sender<RenderResponse>,
    cache: Arc<Mutex<TileCache>>,
) {
    for message in jobs {
        match message {
            WorkerMessage::Render(job) => handle_job(&*source, job, &cache, &responses),
            WorkerMessage::Shutdown => break,
        }
    }
    log::debug!("render worker exiting");
}

fn handle_job(
    source: &dyn PageSource,
    job: RenderJob,
    cache: &Arc<Mutex<TileCache>>,
    responses: &Sender<RenderResponse>,
) {
    let RenderJob {
        id,
        key,
        region,
        generation,
        cancel,
    } = job;

    if cancel.is_cancelled() {
        let _ = responses.send(RenderResponse::Cancelled { id, key });
        return;
    }

    // A duplicate of this key may have completed while this job queued
    let cached = cache
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(&key);
    match cached {
        Some(TilePayload::Ready(tile)) => {
            let _ = responses.send(RenderResponse::Tile { id, key, tile });
            return;
        }
        Some(TilePayload::Failed(fault)) => {
            let _ = responses.send(RenderResponse::Failed { id, key, fault });
            return;
        }
        None => {}
    }

    match source.render(key.page, region, key.scale(), key.rotation) {
        Ok(buffer) => {
            let tile = cache
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert_ready(key, Arc::new(buffer), generation);

            if cancel.is_cancelled() {
                // Cancellation race: keep the cached result, skip delivery
                log::trace!("render finished after cancellation for {key:?}");
                let _ = responses.send(RenderResponse::Cancelled { id, key });
            } else {
                let _ = responses.send(RenderResponse::Tile { id, key, tile });
            }
        }
        Err(err) => {
            log::debug!("render failed for {key:?}: {err}");
            let fault = Arc::new(RenderFault::from(err));
            cache
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert_failed(key, Arc::clone(&fault), generation);
            let _ = responses.send(RenderResponse::Failed { id, key, fault });
        }
    }
}
