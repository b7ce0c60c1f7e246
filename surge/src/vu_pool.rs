use crate::iteration::{pause, Iteration};
use crate::recorder::Recorder;
use futures_util::future::join_all;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

struct Vu {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// The set of running virtual users.
///
/// Each VU is an independent task looping over `iterate -> record -> pause`. Shrinking the pool
/// never interrupts a request: retired VUs finish the iteration in hand and exit on their own.
pub(crate) struct VuPool<T> {
    iteration: T,
    recorder: Recorder,
    pause: Duration,
    active: Vec<Vu>,
    retiring: Vec<JoinHandle<()>>,
    next_id: u64,
}

impl<T: Iteration> VuPool<T> {
    pub fn new(iteration: T, recorder: Recorder, pause: Duration) -> Self {
        Self {
            iteration,
            recorder,
            pause,
            active: vec![],
            retiring: vec![],
            next_id: 0,
        }
    }

    pub fn set_vus(&mut self, vus: usize) {
        self.retiring.retain(|handle| !handle.is_finished());

        if self.active.len() > vus {
            for vu in self.active.drain(vus..) {
                // Receiver may already be gone if the task ended; nothing to stop then.
                let _ = vu.stop.send(true);
                self.retiring.push(vu.handle);
            }
            trace!("Scaled down to {vus} VUs ({} retiring).", self.retiring.len());
        } else {
            while self.active.len() < vus {
                let id = self.next_id;
                self.next_id += 1;

                let (stop, stopped) = watch::channel(false);
                let handle = tokio::spawn(vu_loop(
                    id,
                    self.iteration.clone(),
                    self.recorder.clone(),
                    self.pause,
                    stopped,
                ));
                self.active.push(Vu { stop, handle });
            }
        }
    }

    pub fn vus(&self) -> usize {
        self.active.len()
    }

    /// Stop every VU, giving in-flight iterations up to `grace` to finish before aborting them.
    pub async fn shutdown(mut self, grace: Duration) {
        self.set_vus(0);
        let handles: Vec<_> = self.retiring.drain(..).collect();
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

        if tokio::time::timeout(grace, join_all(handles)).await.is_err() {
            warn!(
                "VUs did not finish within {}; abandoning in-flight iterations.",
                humantime::format_duration(grace)
            );
            for abort in aborts {
                abort.abort();
            }
        }
    }
}

async fn vu_loop<T: Iteration>(
    id: u64,
    iteration: T,
    recorder: Recorder,
    pause_dur: Duration,
    mut stopped: watch::Receiver<bool>,
) {
    trace!("VU {id} started.");
    loop {
        let stop = *stopped.borrow();
        if stop {
            break;
        }

        // A VU parked on the rate cap must still notice it was retired
        tokio::select! {
            _ = recorder.ready() => {}
            _ = stopped.changed() => break,
        }
        let outcome = iteration.iterate().await;
        recorder.record(outcome);

        tokio::select! {
            _ = pause(pause_dur) => {}
            _ = stopped.changed() => break,
        }
    }
    trace!("VU {id} stopped.");
}
