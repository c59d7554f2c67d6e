use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use noderelay::errors::{RelayError, Result};
use noderelay::session::{SessionBackend, SessionFactory};
use noderelay::types::Token;

/// Outcome scripted for one `send` call.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Reply with this text.
    Respond(String),
    /// Fail with a session error.
    Fail(String),
    /// Hang well past any reasonable per-command timeout.
    Hang,
}

/// Shared script plus call recorder.
///
/// Replies are consumed in order; when the script runs dry, sends reply
/// with "OK". Recorded sends/connects are available for assertions.
#[derive(Default)]
pub struct SessionScript {
    replies: Mutex<VecDeque<ScriptedReply>>,
    sent: Mutex<Vec<String>>,
    connects: Mutex<Vec<String>>,
    disconnects: Mutex<usize>,
}

impl SessionScript {
    pub fn push(&self, reply: ScriptedReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn push_responses<I: IntoIterator<Item = S>, S: Into<String>>(&self, responses: I) {
        let mut replies = self.replies.lock().unwrap();
        for r in responses {
            replies.push_back(ScriptedReply::Respond(r.into()));
        }
    }

    fn next_reply(&self) -> ScriptedReply {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ScriptedReply::Respond("OK".to_string()))
    }

    /// Commands sent so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Addresses connected to, in order.
    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        *self.disconnects.lock().unwrap()
    }
}

/// A fake session factory that:
/// - records which addresses were "connected" to
/// - hands out sessions that replay the shared script.
pub struct FakeSessionFactory {
    script: Arc<SessionScript>,
}

impl FakeSessionFactory {
    pub fn new() -> (Self, Arc<SessionScript>) {
        let script = Arc::new(SessionScript::default());
        (
            Self {
                script: Arc::clone(&script),
            },
            script,
        )
    }
}

impl SessionFactory for FakeSessionFactory {
    fn connect(
        &mut self,
        token: &Token,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn SessionBackend>>> + Send + '_>> {
        let script = Arc::clone(&self.script);
        let addr = token.address();

        Box::pin(async move {
            script.connects.lock().unwrap().push(addr);
            Ok(Box::new(FakeSession { script }) as Box<dyn SessionBackend>)
        })
    }
}

struct FakeSession {
    script: Arc<SessionScript>,
}

impl SessionBackend for FakeSession {
    fn send(
        &mut self,
        command: &str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        let script = Arc::clone(&self.script);
        let command = command.to_string();

        Box::pin(async move {
            script.sent.lock().unwrap().push(command);

            match script.next_reply() {
                ScriptedReply::Respond(text) => Ok(text),
                ScriptedReply::Fail(msg) => Err(RelayError::Session(msg)),
                ScriptedReply::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok("too late".to_string())
                }
            }
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        let script = Arc::clone(&self.script);
        Box::pin(async move {
            *script.disconnects.lock().unwrap() += 1;
        })
    }
}
