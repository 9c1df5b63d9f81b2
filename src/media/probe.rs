//! Parallel intrinsic-size probing.
//!
//! Probing is I/O bound, so ids are fanned out over a small worker pool and
//! joined before packing. Results are put back into input order; the packer
//! relies on a stable tile order.

use std::thread;
use std::time::Instant;

use tracing::{debug, trace, warn};

use super::MediaProvider;
use crate::models::{MediaId, Tile};

/// Default number of probe workers.
const DEFAULT_WORKERS: usize = 4;

/// Maximum number of probe workers.
const MAX_WORKERS: usize = 16;

/// Probes intrinsic sizes on a bounded pool of scoped worker threads.
#[derive(Debug, Clone, Copy)]
pub struct ProbePool {
    workers: usize,
    fallback_width: f64,
    fallback_height: f64,
}

impl ProbePool {
    /// `fallback_width x fallback_height` is used for items that cannot be
    /// probed.
    pub fn new(workers: usize, fallback_width: f64, fallback_height: f64) -> Self {
        Self {
            workers: workers.clamp(1, MAX_WORKERS),
            fallback_width,
            fallback_height,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Probes every id and returns one tile per id, in input order.
    ///
    /// Never fails: items whose size cannot be read become unavailable tiles.
    pub fn probe<P>(&self, provider: &P, ids: Vec<MediaId>) -> Vec<Tile>
    where
        P: MediaProvider + ?Sized,
    {
        let total = ids.len();
        if total == 0 {
            return Vec::new();
        }

        let started = Instant::now();
        let num_workers = self.workers.min(total);
        let (job_tx, job_rx) = flume::unbounded::<(usize, MediaId)>();
        let (result_tx, result_rx) = flume::unbounded::<(usize, Tile)>();

        for job in ids.into_iter().enumerate() {
            // Receiver is alive until the scope below ends.
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        thread::scope(|scope| {
            let mut spawned = 0;
            for worker_id in 0..num_workers {
                let rx = job_rx.clone();
                let tx = result_tx.clone();
                let pool = *self;
                let spawn = thread::Builder::new()
                    .name(format!("probe-worker-{}", worker_id))
                    .spawn_scoped(scope, move || {
                        while let Ok((index, id)) = rx.recv() {
                            let tile = pool.probe_one(provider, id);
                            if tx.send((index, tile)).is_err() {
                                break;
                            }
                        }
                    });
                match spawn {
                    Ok(_) => spawned += 1,
                    Err(e) => warn!(worker_id, error = ?e, "Failed to spawn probe worker"),
                }
            }

            if spawned == 0 {
                // No threads available; drain the jobs on the calling thread.
                while let Ok((index, id)) = job_rx.try_recv() {
                    let _ = result_tx.send((index, self.probe_one(provider, id)));
                }
            }
        });
        drop(result_tx);

        let mut slots: Vec<Option<Tile>> = vec![None; total];
        for (index, tile) in result_rx.try_iter() {
            slots[index] = Some(tile);
        }
        let tiles: Vec<Tile> = slots.into_iter().flatten().collect();

        let unavailable = tiles.iter().filter(|tile| tile.unavailable).count();
        debug!(
            total,
            unavailable,
            workers = num_workers,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Probed media sizes"
        );
        tiles
    }

    fn probe_one<P>(&self, provider: &P, id: MediaId) -> Tile
    where
        P: MediaProvider + ?Sized,
    {
        match provider.probe_size(&id) {
            Ok((width, height)) => {
                trace!(%id, width, height, "Probed");
                Tile::new(id, width, height)
            }
            Err(e) => {
                warn!(%id, error = %e, "Failed to probe media, using fallback size");
                Tile::unavailable(id, self.fallback_width, self.fallback_height)
            }
        }
    }
}

impl Default for ProbePool {
    fn default() -> Self {
        Self::new(
            DEFAULT_WORKERS,
            crate::config::DEFAULT_MAX_TILE_WIDTH,
            crate::config::DEFAULT_MAX_TILE_HEIGHT,
        )
    }
}
