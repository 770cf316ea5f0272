//! The continuation handed to every handler.

use crate::cancellation::Deadline;
use crate::errors::{BoxError, HandlerPanic, HandlerResult, PipelineTimeoutError};
use tokio::sync::oneshot;
use tracing::warn;

/// Advances the pipeline from inside a handler.
///
/// Every invocation receives exactly one `Next`. Consuming it with
/// [`proceed`](Next::proceed) or [`fail`](Next::fail) is the handler's single
/// signal to the engine; the type system rules out a second call. A handler
/// may also move its `Next` into a spawned task and signal later.
#[derive(Debug)]
#[must_use = "the pipeline halts unless the continuation is invoked"]
pub struct Next {
    tx: oneshot::Sender<Option<BoxError>>,
}

impl Next {
    pub(crate) fn channel() -> (Self, Continuation) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, Continuation { rx })
    }

    /// Continues the pipeline without an error.
    ///
    /// Inside an error handler this recovers and ends the execution
    /// successfully.
    pub fn proceed(self) {
        // The receiver is gone only if the execution was abandoned.
        let _ = self.tx.send(None);
    }

    /// Signals an error.
    ///
    /// On the normal path this switches the execution to its error handlers.
    /// Inside an error handler it passes the error to the next one.
    pub fn fail(self, err: impl Into<BoxError>) {
        let _ = self.tx.send(Some(err.into()));
    }

    /// Proceeds on `Ok`, fails on `Err`.
    pub fn resolve<E: Into<BoxError>>(self, result: Result<(), E>) {
        match result {
            Ok(()) => self.proceed(),
            Err(err) => self.fail(err),
        }
    }
}

/// What a handler invocation told the engine to do next.
#[derive(Debug)]
pub(crate) enum Signal {
    /// Advance, optionally carrying an error.
    Proceed(Option<BoxError>),
    /// The continuation was dropped unused.
    Halted,
    /// The deadline passed while waiting for the continuation.
    Expired(PipelineTimeoutError),
}

/// Engine side of a [`Next`].
#[derive(Debug)]
pub(crate) struct Continuation {
    rx: oneshot::Receiver<Option<BoxError>>,
}

impl Continuation {
    /// Combines the continuation with the handler's own result.
    ///
    /// Whichever effect happened first wins: a `Next` invoked before the
    /// handler returned beats the returned value, and a returned error beats
    /// a continuation invoked later from another task.
    pub(crate) async fn settle(
        mut self,
        outcome: std::thread::Result<HandlerResult>,
        deadline: Option<&Deadline>,
    ) -> Signal {
        let returned = match outcome {
            Ok(result) => result,
            Err(payload) => {
                let panic = HandlerPanic::from_payload(payload.as_ref());
                warn!(message = %panic.message, "Handler panicked");
                Err(Box::new(panic) as BoxError)
            }
        };

        match self.rx.try_recv() {
            Ok(err) => Signal::Proceed(err),
            Err(oneshot::error::TryRecvError::Empty) => match returned {
                Err(err) => Signal::Proceed(Some(err)),
                Ok(()) => match deadline {
                    Some(deadline) => tokio::select! {
                        signal = &mut self.rx => Self::received(signal),
                        err = deadline.elapsed() => Signal::Expired(err),
                    },
                    None => Self::received(self.rx.await),
                },
            },
            Err(oneshot::error::TryRecvError::Closed) => match returned {
                Err(err) => Signal::Proceed(Some(err)),
                Ok(()) => Signal::Halted,
            },
        }
    }

    fn received(signal: Result<Option<BoxError>, oneshot::error::RecvError>) -> Signal {
        match signal {
            Ok(err) => Signal::Proceed(err),
            Err(_) => Signal::Halted,
        }
    }
}
