//! Conversation controller for the OceanFront chat.
//!
//! Owns the message list and drives one streamed exchange at a time: the
//! full history is posted to the relay, the reply bytes are decoded as they
//! arrive and a placeholder assistant message grows with every chunk.
//! Snapshots of the message list are published on a `watch` channel after
//! every change so a renderer can follow the stream.

use futures::StreamExt;
use log::{debug, error};
use oceanfront_core::types::{ChatMessage, Role};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use uuid::Uuid;

use crate::decoder::Utf8StreamDecoder;
use crate::relay_client::{ChatError, ChatTransport};

/// A message shown in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
        }
    }

    /// Role and content only, as sent to the relay
    pub fn to_wire(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatStatus {
    #[default]
    Idle,
    InProgress,
}

#[derive(Debug, Default)]
struct ChatState {
    input: String,
    messages: Vec<Message>,
    status: ChatStatus,
}

pub fn error_message_text(error: &ChatError) -> String {
    format!(
        "Error: Failed to fetch AI response. Please check server logs. ({})",
        error
    )
}

pub struct ChatController<T> {
    transport: T,
    state: Mutex<ChatState>,
    busy: AtomicBool,
    updates: watch::Sender<Vec<Message>>,
}

/// Held for the duration of one send; resets the status on every exit path.
struct SendGuard<'a, T> {
    controller: &'a ChatController<T>,
}

impl<T> Drop for SendGuard<'_, T> {
    fn drop(&mut self) {
        self.controller.state().status = ChatStatus::Idle;
        self.controller.busy.store(false, Ordering::Release);
    }
}

impl<T: ChatTransport> ChatController<T> {
    pub fn new(transport: T) -> Self {
        let (updates, _) = watch::channel(Vec::new());
        Self {
            transport,
            state: Mutex::new(ChatState::default()),
            busy: AtomicBool::new(false),
            updates,
        }
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.state().input = text.into();
    }

    pub fn input(&self) -> String {
        self.state().input.clone()
    }

    pub fn status(&self) -> ChatStatus {
        self.state().status
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.clone()
    }

    /// Receives a snapshot of the message list after every change
    pub fn subscribe(&self) -> watch::Receiver<Vec<Message>> {
        self.updates.subscribe()
    }

    /// Clears the conversation. Ignored while a reply is streaming.
    pub fn reset(&self) -> bool {
        let Some(_guard) = self.try_begin() else {
            return false;
        };
        {
            let mut state = self.state();
            state.messages.clear();
            state.input.clear();
        }
        self.publish();
        true
    }

    /// Sends the pending input as a user message.
    ///
    /// Returns `false` without touching the conversation when the input is
    /// blank or a reply is still streaming.
    pub async fn submit(&self) -> bool {
        let Some(guard) = self.try_begin() else {
            debug!("Submit ignored: a reply is still streaming");
            return false;
        };

        let history = {
            let mut state = self.state();
            let text = state.input.trim().to_string();
            if text.is_empty() || state.status != ChatStatus::Idle {
                return false;
            }
            state.messages.push(Message::user(text));
            state.input.clear();
            state.messages.clone()
        };
        self.publish();

        self.run_send(history, guard).await;
        true
    }

    /// Streams a reply for `history`.
    ///
    /// Returns `false` immediately when another send is outstanding.
    pub async fn send(&self, history: Vec<Message>) -> bool {
        match self.try_begin() {
            Some(guard) => {
                self.run_send(history, guard).await;
                true
            }
            None => false,
        }
    }

    fn try_begin(&self) -> Option<SendGuard<'_, T>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SendGuard { controller: self })
    }

    async fn run_send(&self, history: Vec<Message>, guard: SendGuard<'_, T>) {
        // The placeholder exists before any network I/O
        let placeholder = Message::assistant("");
        let assistant_id = placeholder.id.clone();
        {
            let mut state = self.state();
            state.status = ChatStatus::InProgress;
            state.messages.push(placeholder);
        }
        self.publish();

        if let Err(e) = self.stream_reply(&assistant_id, &history).await {
            error!("Streaming chat failed: {}", e);
            self.state().messages.push(Message::assistant(error_message_text(&e)));
            self.publish();
        }

        drop(guard);
        self.publish();
    }

    async fn stream_reply(&self, assistant_id: &str, history: &[Message]) -> Result<(), ChatError> {
        let wire = history.iter().map(Message::to_wire).collect();
        let mut stream = self.transport.open_stream(wire).await?;

        let mut decoder = Utf8StreamDecoder::new();
        let mut reply = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            reply.push_str(&decoder.decode(&chunk));
            self.replace_content(assistant_id, &reply);
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            reply.push_str(&tail);
            self.replace_content(assistant_id, &reply);
        }
        debug!("Reply complete ({} bytes)", reply.len());
        Ok(())
    }

    fn replace_content(&self, id: &str, content: &str) {
        {
            let mut state = self.state();
            if let Some(message) = state.messages.iter_mut().find(|m| m.id == id) {
                message.content = content.to_string();
            }
        }
        self.publish();
    }

    fn publish(&self) {
        let snapshot = self.state().messages.clone();
        self.updates.send_replace(snapshot);
    }
}

impl<T> ChatController<T> {
    fn state(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
