use std::fmt;
use tokio::sync::watch;
use tracing::info;

/// Lifecycle transition requested through the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleRequest {
    Shutdown,
    Restart,
}

impl fmt::Display for LifecycleRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleRequest::Shutdown => write!(f, "shutdown"),
            LifecycleRequest::Restart => write!(f, "restart"),
        }
    }
}

/// Cloneable handle used by actions to ask `main` to stop or restart.
///
/// Requests are posted on a watch channel and never block the caller;
/// the server loop observes them and drains connections gracefully.
#[derive(Clone, Debug)]
pub struct ProcessControl {
    tx: watch::Sender<Option<LifecycleRequest>>,
}

impl ProcessControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn request_shutdown(&self) {
        self.request(LifecycleRequest::Shutdown);
    }

    pub fn request_restart(&self) {
        self.request(LifecycleRequest::Restart);
    }

    fn request(&self, request: LifecycleRequest) {
        info!(request = %request, "Process lifecycle change requested");
        self.tx.send_replace(Some(request));
    }

    /// Most recent request, if any
    pub fn pending(&self) -> Option<LifecycleRequest> {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<LifecycleRequest>> {
        self.tx.subscribe()
    }

    /// Resolves once a request has been posted.
    pub async fn requested(&self) -> LifecycleRequest {
        let mut rx = self.subscribe();
        loop {
            if let Some(request) = *rx.borrow_and_update() {
                return request;
            }
            if rx.changed().await.is_err() {
                return LifecycleRequest::Shutdown;
            }
        }
    }
}

impl Default for ProcessControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_request_initially() {
        let control = ProcessControl::new();
        assert_eq!(control.pending(), None);
    }

    #[tokio::test]
    async fn test_requested_resolves_after_post() {
        let control = ProcessControl::new();
        let waiter = {
            let control = control.clone();
            tokio::spawn(async move { control.requested().await })
        };
        tokio::task::yield_now().await;
        control.request_restart();

        let request = waiter.await.unwrap();
        assert_eq!(request, LifecycleRequest::Restart);
        assert_eq!(control.pending(), Some(LifecycleRequest::Restart));
    }
}
