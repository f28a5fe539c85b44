// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password prompt as an explicit suspension point.
//!
//! The key manager never talks to a UI. When it needs a password it sends a
//! [`PasswordRequest`] down a channel and waits. Whoever owns the receiving
//! end (a UI task, a CLI reader, a test) answers with
//! [`PasswordRequest::submit`] or declines with [`PasswordRequest::cancel`];
//! dropping the request also counts as a cancel.

use tokio::sync::{mpsc, oneshot};
use zeroize::Zeroizing;

use super::KeyError;

/// A pending request for the user's password.
pub struct PasswordRequest {
    user_id: String,
    responder: oneshot::Sender<Zeroizing<String>>,
}

impl PasswordRequest {
    /// The account the password is for.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn submit(self, password: impl Into<String>) {
        // The waiting side may already be gone; nothing to report.
        let _ = self.responder.send(Zeroizing::new(password.into()));
    }

    pub fn cancel(self) {}
}

/// Sending half handed to the key manager.
#[derive(Debug, Clone)]
pub struct PasswordPrompter {
    requests: mpsc::Sender<PasswordRequest>,
}

/// Create a prompter and the receiver a UI task should serve.
pub fn password_channel(buffer: usize) -> (PasswordPrompter, mpsc::Receiver<PasswordRequest>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (PasswordPrompter { requests: tx }, rx)
}

impl PasswordPrompter {
    /// Ask for a password and wait for the answer.
    ///
    /// Cancelling or answering with an empty string yields
    /// [`KeyError::ActionCanceled`]. A closed channel means nobody can
    /// answer, which is [`KeyError::PasswordRequired`].
    pub async fn prompt(&self, user_id: &str) -> Result<Zeroizing<String>, KeyError> {
        let (responder, answer) = oneshot::channel();
        self.requests
            .send(PasswordRequest {
                user_id: user_id.to_string(),
                responder,
            })
            .await
            .map_err(|_| KeyError::PasswordRequired)?;

        match answer.await {
            Ok(password) if !password.is_empty() => Ok(password),
            _ => Err(KeyError::ActionCanceled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submitted_password_is_returned() {
        let (prompter, mut rx) = password_channel(1);
        tokio::spawn(async move {
            let request = rx.recv().await.unwrap();
            assert_eq!(request.user_id(), "alice");
            request.submit("hunter2");
        });
        let password = prompter.prompt("alice").await.unwrap();
        assert_eq!(password.as_str(), "hunter2");
    }

    #[tokio::test]
    async fn cancel_maps_to_action_canceled() {
        let (prompter, mut rx) = password_channel(1);
        tokio::spawn(async move {
            rx.recv().await.unwrap().cancel();
        });
        assert!(matches!(
            prompter.prompt("alice").await,
            Err(KeyError::ActionCanceled)
        ));
    }

    #[tokio::test]
    async fn empty_answer_is_a_cancel() {
        let (prompter, mut rx) = password_channel(1);
        tokio::spawn(async move {
            rx.recv().await.unwrap().submit("");
        });
        assert!(matches!(
            prompter.prompt("alice").await,
            Err(KeyError::ActionCanceled)
        ));
    }

    #[tokio::test]
    async fn closed_channel_means_no_prompt_path() {
        let (prompter, rx) = password_channel(1);
        drop(rx);
        assert!(matches!(
            prompter.prompt("alice").await,
            Err(KeyError::PasswordRequired)
        ));
    }
}
