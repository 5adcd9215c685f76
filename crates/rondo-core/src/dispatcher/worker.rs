//! Dispatcher worker thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, warn};

use super::DispatchCore;
use crate::store::ThreadRole;
use crate::Result;

pub(super) fn spawn<T: Clone + Send + Sync + 'static>(
    core: Arc<DispatchCore<T>>,
    shutdown: Arc<AtomicBool>,
    tick: Duration,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("rondo-dispatcher".into())
        .spawn(move || dispatcher_loop(core, shutdown, tick))?;
    Ok(handle)
}

fn dispatcher_loop<T: Clone + Send + Sync>(
    core: Arc<DispatchCore<T>>,
    shutdown: Arc<AtomicBool>,
    tick: Duration,
) {
    if let Err(e) = core.store.register_thread(ThreadRole::Worker, false) {
        warn!(error = %e, "dispatcher could not register, exiting");
        return;
    }

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match core.rx.recv_timeout(tick) {
            Ok(first) => {
                if let Err(e) = core.run(Some(first)) {
                    warn!(error = %e, "dispatch cycle failed");
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("dispatcher loop exited");
}
