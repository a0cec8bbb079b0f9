//! Navigation events and the override sink.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::SinkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationStatus {
    Loading,
    Complete,
}

/// A tab update. `url` is set only when the URL actually changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEvent {
    pub tab_id: i32,
    pub status: NavigationStatus,
    pub url: Option<String>,
}

impl NavigationEvent {
    /// A navigation committed to loading `url`.
    pub fn loading(tab_id: i32, url: impl Into<String>) -> Self {
        Self {
            tab_id,
            status: NavigationStatus::Loading,
            url: Some(url.into()),
        }
    }

    /// The URL to match, if this event is one the interceptor acts on.
    pub fn target_url(&self) -> Option<&str> {
        match self.status {
            NavigationStatus::Loading => self.url.as_deref(),
            NavigationStatus::Complete => None,
        }
    }
}

#[async_trait::async_trait]
pub trait NavigationSink: Send + Sync {
    async fn set_url(&self, tab_id: i32, url: &str) -> Result<(), SinkError>;
}

/// A navigation replaced by the interceptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationOverride {
    pub tab_id: i32,
    pub url: String,
}

/// Forwards overrides to a channel; the receiving side drives the browser.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<NavigationOverride>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NavigationOverride>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait::async_trait]
impl NavigationSink for ChannelSink {
    async fn set_url(&self, tab_id: i32, url: &str) -> Result<(), SinkError> {
        self.tx
            .send(NavigationOverride {
                tab_id,
                url: url.to_string(),
            })
            .map_err(|_| SinkError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_loading_with_url_is_actionable() {
        assert_eq!(
            NavigationEvent::loading(1, "https://a.example/").target_url(),
            Some("https://a.example/")
        );
        let no_change = NavigationEvent {
            tab_id: 1,
            status: NavigationStatus::Loading,
            url: None,
        };
        assert_eq!(no_change.target_url(), None);
        let complete = NavigationEvent {
            tab_id: 1,
            status: NavigationStatus::Complete,
            url: Some("https://a.example/".to_string()),
        };
        assert_eq!(complete.target_url(), None);
    }

    #[tokio::test]
    async fn channel_sink_forwards() {
        let (sink, mut rx) = ChannelSink::new();
        sink.set_url(7, "https://b.example/").await.expect("send");
        assert_eq!(
            rx.recv().await,
            Some(NavigationOverride {
                tab_id: 7,
                url: "https://b.example/".to_string()
            })
        );
        drop(rx);
        assert!(matches!(sink.set_url(7, "x").await, Err(SinkError::Closed)));
    }
}
