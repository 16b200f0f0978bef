use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::CurtainError;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub done: usize,
    pub total: Option<usize>,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            done: 0,
            total: None,
            elapsed: None,
        }
    }

    pub fn step(message: impl Into<String>, done: usize, total: Option<usize>) -> Self {
        Self {
            message: message.into(),
            done,
            total,
            elapsed: None,
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn checkpoint(&self) -> Result<(), CurtainError> {
        if self.is_cancelled() {
            Err(CurtainError::Cancelled)
        } else {
            Ok(())
        }
    }
}
