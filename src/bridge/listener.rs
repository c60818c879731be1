//! One-shot fragment listener
//!
//! The opener side of the bridge handshake. A listener consumes relayed
//! fragments until one carries every token marker for the launched provider,
//! then returns it and detaches. Non-matching messages are ignored without
//! teardown; anything relayed after the first accepted message is dropped
//! when the listener goes away.

use crate::bridge::TokenMarkers;
use crate::error::SignInError;
use log::debug;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// Receives relayed fragments and accepts exactly one matching message
#[derive(Debug)]
pub struct FragmentListener {
    rx: UnboundedReceiver<String>,
    timeout: Option<Duration>,
}

impl FragmentListener {
    pub(crate) fn new(rx: UnboundedReceiver<String>, timeout_secs: u64) -> Self {
        let timeout = if timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(timeout_secs))
        };
        Self { rx, timeout }
    }

    /// Wait for the first fragment carrying every required token marker
    ///
    /// Consumes the listener: after one accepted message it is gone, so at
    /// most one result per launch can ever be delivered.
    ///
    /// # Errors
    ///
    /// Returns [`SignInError::Timeout`] when the completion timeout elapses
    /// (the popup-closed-without-completing case), or
    /// [`SignInError::Provider`] when the relay shuts down first.
    pub async fn await_fragment(mut self, markers: TokenMarkers) -> Result<String, SignInError> {
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.recv_matching(markers))
                .await
                .map_err(|_| SignInError::Timeout(timeout.as_secs()))?,
            None => self.recv_matching(markers).await,
        }
    }

    async fn recv_matching(&mut self, markers: TokenMarkers) -> Result<String, SignInError> {
        loop {
            let Some(message) = self.rx.recv().await else {
                return Err(SignInError::Provider(
                    "relay closed before a sign-in fragment arrived".to_string(),
                ));
            };

            if markers.matches(&message) {
                return Ok(message);
            }
            debug!("ignoring relayed message without token markers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    const GOOGLE_MARKERS: TokenMarkers = TokenMarkers::new(&["id_token", "access_token"]);

    #[tokio::test]
    async fn test_non_matching_messages_are_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = FragmentListener::new(rx, 5);

        tx.send("not a fragment".to_string()).unwrap();
        tx.send("#state=only".to_string()).unwrap();
        tx.send("#id_token=X&access_token=Y".to_string()).unwrap();

        let fragment = listener.await_fragment(GOOGLE_MARKERS).await.unwrap();
        assert_eq!(fragment, "#id_token=X&access_token=Y");
    }

    #[tokio::test]
    async fn test_exactly_one_message_is_accepted() {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = FragmentListener::new(rx, 5);

        tx.send("#id_token=first&access_token=a".to_string()).unwrap();
        tx.send("#id_token=second&access_token=b".to_string()).unwrap();

        let fragment = listener.await_fragment(GOOGLE_MARKERS).await.unwrap();
        assert_eq!(fragment, "#id_token=first&access_token=a");
        // The listener is consumed here: the second message can never fire a
        // second callback. The relay's send simply fails once the receiver
        // is gone.
        assert!(tx.send("#id_token=third&access_token=c".to_string()).is_err());
    }

    #[tokio::test]
    async fn test_relay_shutdown_reports_provider_error() {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let listener = FragmentListener::new(rx, 5);
        drop(tx);

        let err = listener.await_fragment(GOOGLE_MARKERS).await.unwrap_err();
        assert!(matches!(err, SignInError::Provider(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_when_popup_never_completes() {
        let (_tx, rx) = mpsc::unbounded_channel::<String>();
        let listener = FragmentListener::new(rx, 3);

        let err = listener.await_fragment(GOOGLE_MARKERS).await.unwrap_err();
        assert!(matches!(err, SignInError::Timeout(3)));
    }
}
