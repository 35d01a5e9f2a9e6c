//! Usage: Hands the authorization URL of a pending interactive sign-in to whoever asked for it.

use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::identity::BrowserLauncher;

/// The identity client "opens a browser" by publishing here; HTTP handlers and the CLI subscribe.
#[derive(Debug)]
pub struct SignInBroker {
    urls: watch::Sender<Option<String>>,
}

impl Default for SignInBroker {
    fn default() -> Self {
        let (urls, _) = watch::channel(None);
        Self { urls }
    }
}

impl SignInBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.urls.subscribe()
    }

    pub fn latest(&self) -> Option<String> {
        self.urls.borrow().clone()
    }

    pub fn publish(&self, authorize_url: &str) {
        tracing::info!(authorize_url = %authorize_url, "sign-in waiting for the browser");
        self.urls.send_replace(Some(authorize_url.to_string()));
    }

    pub fn launcher(self: &Arc<Self>) -> BrowserLauncher {
        let broker = Arc::clone(self);
        Arc::new(move |url: &str| broker.publish(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn launcher_publishes_to_subscribers() {
        let broker = SignInBroker::new();
        let mut rx = broker.subscribe();
        let launch = broker.launcher();

        launch("https://login.example/authorize?state=1");

        rx.changed().await.expect("changed");
        assert_eq!(
            rx.borrow_and_update().as_deref(),
            Some("https://login.example/authorize?state=1")
        );
        assert_eq!(
            broker.latest().as_deref(),
            Some("https://login.example/authorize?state=1")
        );
    }
}
