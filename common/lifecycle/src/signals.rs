//! Sources of process termination requests.

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Something that delivers termination requests to the supervisor.
#[async_trait]
pub trait TerminationSource: Send {
    /// Resolves with a short description of the next request, or `None`
    /// once no further request can arrive.
    async fn recv(&mut self) -> Option<String>;
}

/// SIGINT and SIGTERM.
pub struct OsSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl OsSignals {
    /// Install the handlers. Must be called from within a tokio runtime.
    #[cfg(unix)]
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }
}

#[async_trait]
impl TerminationSource for OsSignals {
    #[cfg(unix)]
    async fn recv(&mut self) -> Option<String> {
        tokio::select! {
            _ = self.interrupt.recv() => Some("SIGINT".to_string()),
            _ = self.terminate.recv() => Some("SIGTERM".to_string()),
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> Option<String> {
        tokio::signal::ctrl_c().await.ok()?;
        Some("ctrl-c".to_string())
    }
}

#[async_trait]
impl TerminationSource for mpsc::Receiver<String> {
    async fn recv(&mut self) -> Option<String> {
        mpsc::Receiver::recv(self).await
    }
}

#[async_trait]
impl TerminationSource for mpsc::UnboundedReceiver<String> {
    async fn recv(&mut self) -> Option<String> {
        mpsc::UnboundedReceiver::recv(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn os_signals_do_not_fire_on_their_own() {
        let mut signals = OsSignals::install().unwrap();
        let result = timeout(Duration::from_millis(100), signals.recv()).await;
        assert!(
            result.is_err(),
            "termination source should not complete without a signal"
        );
    }

    #[tokio::test]
    async fn channel_source_reports_requests_then_closes() {
        let (tx, mut rx) = mpsc::channel(2);
        tx.send("test".to_string()).await.unwrap();
        drop(tx);
        assert_eq!(TerminationSource::recv(&mut rx).await.as_deref(), Some("test"));
        assert_eq!(TerminationSource::recv(&mut rx).await, None);
    }
}
