//! Fixed-size pool of long-lived Chrome instances.
//!
//! The pool owns every browser for its whole lifetime. An instance is
//! always in exactly one of two membership sets, available or busy,
//! and the sum of both stays at the configured size: an instance found
//! dead at release time is discarded and replaced before the slot is
//! handed out again.
//!
//! Liveness reflects the state at insertion time only; it is probed
//! when an instance comes back, not tracked continuously. Callers must
//! treat an acquired handle as potentially already dead.

use crate::{browser_config, CaptureError, Config, DeviceProfile, Viewport, DESKTOP_USER_AGENT};
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetTouchEmulationEnabledParams,
};
use chromiumoxide::page::Page;
use futures::future::{join_all, try_join_all};
use futures::StreamExt;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// One pooled Chrome instance: the browser handle plus the background
/// task pumping its CDP event stream.
pub struct BrowserInstance {
    pub id: usize,
    browser: Browser,
    handler: tokio::task::JoinHandle<()>,
}

impl BrowserInstance {
    /// Liveness probe. The handler task ends when the CDP connection
    /// drops, which is how a crashed or closed Chrome shows up here.
    fn is_alive(&self) -> bool {
        !self.handler.is_finished()
    }

    async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Error closing browser {}: {}", self.id, e);
        }
        self.handler.abort();
    }

    /// Kills the underlying browser and waits until the handler task
    /// observes the disconnect, so `is_alive` reports false.
    #[cfg(test)]
    pub(crate) async fn disconnect(&mut self) {
        let _ = self.browser.close().await;
        while !self.handler.is_finished() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

impl std::fmt::Debug for BrowserInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserInstance")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// An isolated page bound to one instance for exactly one capture.
/// Never outlives the capture; the pipeline closes it on every exit
/// path.
pub struct PageSession {
    page: Page,
    instance_id: usize,
    timeout: Duration,
}

impl PageSession {
    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn instance_id(&self) -> usize {
        self.instance_id
    }

    /// Timeout for navigation and other interactive waits on this
    /// session.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub total: usize,
    pub available: usize,
    pub busy: usize,
}

struct PoolState {
    available: VecDeque<BrowserInstance>,
    busy: HashSet<usize>,
    initialized: bool,
}

pub struct BrowserPool {
    state: Mutex<PoolState>,
    init_lock: Mutex<()>,
    config: Config,
    next_id: AtomicUsize,
}

impl BrowserPool {
    /// Creates an empty pool. No browser is launched until
    /// [`initialize`](Self::initialize) runs, either explicitly or
    /// lazily on the first acquire.
    pub fn new(config: Config) -> Self {
        Self {
            state: Mutex::new(PoolState {
                available: VecDeque::new(),
                busy: HashSet::new(),
                initialized: false,
            }),
            init_lock: Mutex::new(()),
            config,
            next_id: AtomicUsize::new(0),
        }
    }

    /// Launches all instances concurrently. Idempotent; a no-op when
    /// the pool is already up. Any single launch failure aborts the
    /// whole initialization: the pool never starts partially degraded.
    pub async fn initialize(&self) -> Result<(), CaptureError> {
        let _guard = self.init_lock.lock().await;
        if self.state.lock().await.initialized {
            return Ok(());
        }

        info!(
            "Initializing browser pool with {} instances",
            self.config.pool_size
        );

        let launches = (0..self.config.pool_size).map(|_| self.launch_instance());
        let instances = try_join_all(launches).await?;

        let mut state = self.state.lock().await;
        state.available.extend(instances);
        state.initialized = true;
        info!(
            "Browser pool initialized with {} instances",
            state.available.len()
        );
        Ok(())
    }

    async fn launch_instance(&self) -> Result<BrowserInstance, CaptureError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let launch_config =
            browser_config(&self.config, id).map_err(CaptureError::LaunchFailure)?;

        let (browser, mut handler) = Browser::launch(launch_config)
            .await
            .map_err(|e| CaptureError::LaunchFailure(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("CDP handler error: {}", e);
                    break;
                }
            }
        });

        debug!("Browser instance {} launched", id);
        Ok(BrowserInstance {
            id,
            browser,
            handler: handler_task,
        })
    }

    /// Takes one instance out of the available set. Fails immediately
    /// with [`CaptureError::PoolExhausted`] when none is free; callers
    /// are rejected, never queued.
    pub async fn acquire(&self) -> Result<BrowserInstance, CaptureError> {
        if !self.state.lock().await.initialized {
            self.initialize().await?;
        }

        // Remove-then-add must not straddle a suspension point, or a
        // concurrent release could interleave and lose a handle.
        // Everything under this lock is synchronous.
        let mut state = self.state.lock().await;
        let instance = state
            .available
            .pop_front()
            .ok_or(CaptureError::PoolExhausted)?;
        state.busy.insert(instance.id);
        debug!(
            "Browser {} acquired (available: {}, busy: {})",
            instance.id,
            state.available.len(),
            state.busy.len()
        );
        Ok(instance)
    }

    /// Returns an instance to the pool. Acts only if the instance is
    /// currently busy. A live instance goes back to available; a dead
    /// one is discarded and a replacement is launched and inserted
    /// before this call returns, so capacity comes back to size N.
    /// Replacement failures are logged, never propagated.
    pub async fn release(&self, instance: BrowserInstance) {
        let alive = instance.is_alive();

        {
            let mut state = self.state.lock().await;
            if !state.busy.remove(&instance.id) {
                warn!("Browser {} released but not busy, dropping", instance.id);
                return;
            }
            if alive {
                debug!(
                    "Browser {} released (available: {}, busy: {})",
                    instance.id,
                    state.available.len() + 1,
                    state.busy.len()
                );
                state.available.push_back(instance);
                return;
            }
        }

        warn!("Browser {} disconnected, launching replacement", instance.id);
        metrics::counter!("browser_replacements_total", 1);
        instance.shutdown().await;

        match self.launch_instance().await {
            Ok(replacement) => {
                let mut state = self.state.lock().await;
                info!("Browser replaced by instance {}", replacement.id);
                state.available.push_back(replacement);
            }
            Err(e) => {
                error!("Failed to replace disconnected browser: {}", e);
            }
        }
    }

    /// Opens an isolated page on the given instance, applying either a
    /// device preset (viewport, user agent, touch) or the explicit
    /// viewport with a fixed desktop user agent. The whole setup is
    /// bounded by the per-request timeout so a wedged Chrome cannot
    /// hold the instance busy forever.
    pub async fn create_session(
        &self,
        instance: &BrowserInstance,
        viewport: Viewport,
        profile: Option<&DeviceProfile>,
        timeout: Duration,
    ) -> Result<PageSession, CaptureError> {
        let setup = async {
            let page = instance
                .browser
                .new_page("about:blank")
                .await
                .map_err(|e| CaptureError::Session(e.to_string()))?;

            let (target, scale, mobile, user_agent, touch) = match profile {
                Some(p) => (p.viewport, p.device_scale_factor, p.mobile, p.user_agent, p.touch),
                None => (viewport, 1.0, false, DESKTOP_USER_AGENT, false),
            };

            let device_metrics = SetDeviceMetricsOverrideParams::builder()
                .width(target.width)
                .height(target.height)
                .device_scale_factor(scale)
                .mobile(mobile)
                .build()
                .map_err(CaptureError::Session)?;
            page.execute(device_metrics)
                .await
                .map_err(|e| CaptureError::Session(e.to_string()))?;

            page.set_user_agent(user_agent)
                .await
                .map_err(|e| CaptureError::Session(e.to_string()))?;

            if touch {
                let touch_params = SetTouchEmulationEnabledParams::builder()
                    .enabled(true)
                    .build()
                    .map_err(CaptureError::Session)?;
                page.execute(touch_params)
                    .await
                    .map_err(|e| CaptureError::Session(e.to_string()))?;
            }

            Ok(PageSession {
                page,
                instance_id: instance.id,
                timeout,
            })
        };

        tokio::time::timeout(timeout, setup)
            .await
            .map_err(|_| CaptureError::Session(format!("session setup timed out after {timeout:?}")))?
    }

    /// Best-effort close. Errors are logged and swallowed so a cleanup
    /// failure never masks the primary capture error.
    pub async fn close_session(&self, session: PageSession) {
        if let Err(e) = session.page.close().await {
            warn!(
                "Error closing page session on browser {}: {}",
                session.instance_id, e
            );
        }
    }

    pub async fn stats(&self) -> PoolStats {
        let state = self.state.lock().await;
        PoolStats {
            total: state.available.len() + state.busy.len(),
            available: state.available.len(),
            busy: state.busy.len(),
        }
    }

    /// Closes all owned instances concurrently, best-effort, and
    /// resets the membership sets. The next acquire re-initializes the
    /// pool from scratch.
    pub async fn teardown(&self) {
        info!("Tearing down browser pool");

        let instances: Vec<BrowserInstance> = {
            let mut state = self.state.lock().await;
            state.busy.clear();
            state.initialized = false;
            state.available.drain(..).collect()
        };

        join_all(instances.into_iter().map(|i| i.shutdown())).await;
        info!("Browser pool teardown complete");
    }
}
