use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Kinds of outbound user notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Welcome,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Welcome => f.write_str("welcome"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound notification channel, typically email
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        address: &str,
        kind: NotificationKind,
        params: BTreeMap<String, String>,
    ) -> Result<(), NotifyError>;
}

/// Notifier used when no delivery provider is configured; only logs
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        address: &str,
        kind: NotificationKind,
        params: BTreeMap<String, String>,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            %kind,
            to = %redact_address(address),
            params = params.len(),
            "No delivery provider configured, notification logged"
        );
        Ok(())
    }
}

/// Keeps the first character of the local part and the domain: `a***@example.com`
pub fn redact_address(address: &str) -> String {
    match address.split_once('@') {
        Some((local, domain)) => match local.chars().next() {
            Some(first) => format!("{}***@{}", first, domain),
            None => format!("***@{}", domain),
        },
        None => "***".to_string(),
    }
}

/// Sends in the background. Failures are logged and never reach the caller.
pub fn dispatch(
    notifier: Arc<dyn Notifier>,
    address: String,
    kind: NotificationKind,
    params: BTreeMap<String, String>,
) {
    tokio::spawn(async move {
        if let Err(e) = notifier.send(&address, kind, params).await {
            tracing::warn!(
                %kind,
                to = %redact_address(&address),
                "Failed to send notification: {}",
                e
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    struct ChannelNotifier {
        sender: mpsc::UnboundedSender<(String, NotificationKind)>,
    }

    #[async_trait]
    impl Notifier for ChannelNotifier {
        async fn send(
            &self,
            address: &str,
            kind: NotificationKind,
            _params: BTreeMap<String, String>,
        ) -> Result<(), NotifyError> {
            let _ = self.sender.send((address.to_string(), kind));
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(
            &self,
            _address: &str,
            _kind: NotificationKind,
            _params: BTreeMap<String, String>,
        ) -> Result<(), NotifyError> {
            Err(NotifyError("smtp unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_dispatch_delivers_in_background() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        dispatch(
            Arc::new(ChannelNotifier { sender }),
            "ada@example.com".to_string(),
            NotificationKind::Welcome,
            BTreeMap::new(),
        );

        let (address, kind) = receiver.recv().await.unwrap();
        assert_eq!(address, "ada@example.com");
        assert_eq!(kind, NotificationKind::Welcome);
    }

    #[test]
    fn test_redact_address() {
        assert_eq!(redact_address("ada@example.com"), "a***@example.com");
        assert_eq!(redact_address("@example.com"), "***@example.com");
        assert_eq!(redact_address("not-an-address"), "***");
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_any_params() {
        let params = BTreeMap::from([("name".to_string(), "Ada".to_string())]);
        LogNotifier
            .send("ada@example.com", NotificationKind::Welcome, params)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_swallows_failures() {
        dispatch(
            Arc::new(FailingNotifier),
            "ada@example.com".to_string(),
            NotificationKind::Welcome,
            BTreeMap::new(),
        );
        tokio::task::yield_now().await;
    }
}
