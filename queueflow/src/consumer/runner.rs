//! The consumer and its poll loop.

use super::message::Message;
use super::queue::QueueClient;
use super::scheduler::{Scheduler, TokioScheduler};
use super::subscription::Subscription;
use crate::cancellation::CancellationToken;
use crate::errors::{ConsumerError, PipelineError};
use crate::events::{ConsumerEvent, EventSink, LoggingEventSink};
use crate::middleware::Handler;
use crate::observability::SpanTimer;
use crate::pipeline::Pipeline;
use crate::subpipeline::{when, AttributeFilter, MessageAttributes, Predicate};
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Builds a pipeline context from a received message.
pub type ContextFactory<C> = Arc<dyn Fn(&Message) -> C + Send + Sync>;

/// Counts from one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Messages received.
    pub received: usize,
    /// Messages whose pipeline succeeded.
    pub succeeded: usize,
    /// Messages whose pipeline failed.
    pub failed: usize,
    /// Messages deleted from the queue.
    pub deleted: usize,
}

/// Running flag and the stop token of the current run.
#[derive(Debug, Default)]
struct RunState {
    running: AtomicBool,
    token: Mutex<Option<Arc<CancellationToken>>>,
}

impl RunState {
    fn stop(&self) -> bool {
        let token = {
            let mut slot = self.token.lock();
            self.running.store(false, Ordering::SeqCst);
            slot.take()
        };
        token.is_some_and(|t| t.cancel("consumer stopped"))
    }

    /// Clears the running state only if `token` belongs to the current run.
    fn release(&self, token: &Arc<CancellationToken>) {
        let mut slot = self.token.lock();
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, token)) {
            slot.take();
            self.running.store(false, Ordering::SeqCst);
        }
    }
}

/// Polls a queue and runs every message through a pipeline.
///
/// A message is deleted only after its pipeline succeeded. Failed messages
/// stay on the queue and become visible again once their visibility timeout
/// lapses. Handlers cannot be added and the subscription cannot change while
/// the consumer runs.
pub struct Consumer<Q, C = Message> {
    queue: Arc<Q>,
    pipeline: Arc<Pipeline<C>>,
    context_factory: ContextFactory<C>,
    subscription: Option<Subscription>,
    sink: Arc<dyn EventSink>,
    scheduler: Arc<dyn Scheduler>,
    state: Arc<RunState>,
}

impl<Q> Consumer<Q, Message>
where
    Q: QueueClient + 'static,
{
    /// Creates a consumer whose pipeline context is the message itself.
    pub fn new(queue: Q) -> Self {
        Self::with_context(queue, Message::clone)
    }
}

impl<Q, C> Consumer<Q, C>
where
    Q: QueueClient + 'static,
    C: Send + Sync + 'static,
{
    /// Creates a consumer that derives each context with `factory`.
    pub fn with_context<F>(queue: Q, factory: F) -> Self
    where
        F: Fn(&Message) -> C + Send + Sync + 'static,
    {
        Self::from_shared(Arc::new(queue), factory)
    }

    /// Creates a consumer over a shared queue client.
    pub fn from_shared<F>(queue: Arc<Q>, factory: F) -> Self
    where
        F: Fn(&Message) -> C + Send + Sync + 'static,
    {
        Self {
            queue,
            pipeline: Arc::new(Pipeline::new()),
            context_factory: Arc::new(factory),
            subscription: None,
            sink: Arc::new(LoggingEventSink::default()),
            scheduler: Arc::new(TokioScheduler),
            state: Arc::new(RunState::default()),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets the scheduler used between polls.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Appends a handler to the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Running`] while the consumer runs.
    pub fn use_handler(&mut self, handler: Handler<C>) -> Result<(), ConsumerError> {
        self.use_handlers([handler])
    }

    /// Appends handlers to the pipeline, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Running`] while the consumer runs.
    pub fn use_handlers(
        &mut self,
        handlers: impl IntoIterator<Item = Handler<C>>,
    ) -> Result<(), ConsumerError> {
        self.ensure_stopped("add middlewares")?;
        Arc::make_mut(&mut self.pipeline).register(handlers);
        Ok(())
    }

    /// Appends a sub-pipeline gated by `predicate`.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Running`] while the consumer runs.
    pub fn when<P>(
        &mut self,
        predicate: P,
        handlers: impl IntoIterator<Item = Handler<C>>,
    ) -> Result<(), ConsumerError>
    where
        P: Predicate<C> + 'static,
    {
        self.ensure_stopped("add matchers")?;
        Arc::make_mut(&mut self.pipeline).push(when(predicate, handlers));
        Ok(())
    }

    /// Appends a sub-pipeline gated by message attributes.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Running`] while the consumer runs.
    pub fn when_attributes(
        &mut self,
        filter: AttributeFilter,
        handlers: impl IntoIterator<Item = Handler<C>>,
    ) -> Result<(), ConsumerError>
    where
        C: MessageAttributes,
    {
        self.when(filter, handlers)
    }

    /// Sets what to poll.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Running`] while the consumer runs and
    /// [`ConsumerError::InvalidSubscription`] if validation fails.
    pub fn subscribe(&mut self, subscription: Subscription) -> Result<(), ConsumerError> {
        self.ensure_stopped("change subscription")?;
        subscription.validate()?;
        self.subscription = Some(subscription);
        Ok(())
    }

    /// Returns the current subscription.
    #[must_use]
    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    /// Returns the pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline<C> {
        &self.pipeline
    }

    /// Returns true while the poll loop runs.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Receives and processes one batch.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::NotSubscribed`] without a subscription.
    /// Queue and pipeline failures are reported to the event sink, not
    /// returned.
    pub async fn poll_once(&self) -> Result<PollSummary, ConsumerError> {
        let worker = self.worker()?;
        Ok(worker.poll().await)
    }

    /// Spawns the poll loop.
    ///
    /// The loop polls, then waits for the subscription's wait time, until
    /// stopped. A poll in progress when stop is requested runs to the end.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::NotSubscribed`] without a subscription and
    /// [`ConsumerError::Running`] if already running.
    pub fn start(&self) -> Result<ConsumerHandle, ConsumerError> {
        let worker = self.worker()?;
        let token = Arc::new(CancellationToken::new());
        {
            let mut slot = self.state.token.lock();
            if self.state.running.swap(true, Ordering::SeqCst) {
                return Err(ConsumerError::running("start"));
            }
            *slot = Some(Arc::clone(&token));
        }

        let scheduler = Arc::clone(&self.scheduler);
        let loop_token = Arc::clone(&token);
        let task = tokio::spawn(async move {
            let queue_url = worker.subscription.queue_url.clone();
            let interval = worker.subscription.poll_interval();
            info!(queue_url = %queue_url, "Start pulling");
            worker.sink.try_emit(ConsumerEvent::started(queue_url.clone()));

            while !loop_token.is_cancelled() {
                let summary = worker.poll().await;
                debug!(?summary, "Poll finished");
                tokio::select! {
                    () = scheduler.sleep(interval) => {}
                    () = loop_token.cancelled() => break,
                }
            }

            info!(queue_url = %queue_url, "Stopped pulling");
            worker.sink.try_emit(ConsumerEvent::stopped(queue_url));
        });

        Ok(ConsumerHandle {
            token,
            state: Arc::clone(&self.state),
            task,
        })
    }

    /// Stops the poll loop, if running.
    pub fn stop(&self) {
        self.state.stop();
    }

    fn ensure_stopped(&self, action: &'static str) -> Result<(), ConsumerError> {
        if self.is_running() {
            Err(ConsumerError::running(action))
        } else {
            Ok(())
        }
    }

    fn worker(&self) -> Result<Worker<Q, C>, ConsumerError> {
        let subscription = self.subscription.clone().ok_or(ConsumerError::NotSubscribed)?;
        Ok(Worker {
            queue: Arc::clone(&self.queue),
            pipeline: Arc::clone(&self.pipeline),
            context_factory: Arc::clone(&self.context_factory),
            subscription,
            sink: Arc::clone(&self.sink),
        })
    }
}

impl<Q, C> std::fmt::Debug for Consumer<Q, C>
where
    C: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("subscription", &self.subscription)
            .field("handlers", &self.pipeline.len())
            .field("running", &self.state.running.load(Ordering::SeqCst))
            .finish()
    }
}

/// Controls a spawned poll loop.
#[derive(Debug)]
pub struct ConsumerHandle {
    token: Arc<CancellationToken>,
    state: Arc<RunState>,
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    /// Requests this handle's loop to stop.
    ///
    /// A handle from an earlier run leaves a later run untouched.
    pub fn stop(&self) {
        self.state.release(&self.token);
        self.token.cancel("consumer stopped");
    }

    /// Returns true once stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stops the loop and waits for it to exit.
    pub async fn shutdown(self) {
        self.stop();
        let _ = self.task.await;
    }
}

/// Everything one poll needs, detached from the consumer.
struct Worker<Q, C> {
    queue: Arc<Q>,
    pipeline: Arc<Pipeline<C>>,
    context_factory: ContextFactory<C>,
    subscription: Subscription,
    sink: Arc<dyn EventSink>,
}

impl<Q, C> Worker<Q, C>
where
    Q: QueueClient + 'static,
    C: Send + Sync + 'static,
{
    async fn poll(&self) -> PollSummary {
        let request = self.subscription.to_receive_request();
        let messages = match self.queue.receive(&request).await {
            Ok(messages) => messages,
            Err(err) => {
                self.sink.try_emit(ConsumerEvent::ReceiveFailed {
                    error: err.to_string(),
                });
                return PollSummary::default();
            }
        };

        if messages.is_empty() {
            return PollSummary::default();
        }

        if self.subscription.is_batched() {
            self.handle_batch(&messages).await
        } else {
            let mut summary = PollSummary::default();
            for message in &messages {
                let one = self.handle_message(message).await;
                summary.received += one.received;
                summary.succeeded += one.succeeded;
                summary.failed += one.failed;
                summary.deleted += one.deleted;
            }
            summary
        }
    }

    async fn execute(&self, message: &Message) -> Result<(), PipelineError> {
        let ctx = (self.context_factory)(message);
        let timer = SpanTimer::start("message");
        let result = self
            .pipeline
            .execute(ctx, self.subscription.execution_timeout_ms)
            .await;
        debug!(
            message_id = %message.id,
            duration_ms = timer.elapsed_ms(),
            ok = result.is_ok(),
            "Message handled"
        );
        match &result {
            Ok(()) => self.sink.try_emit(ConsumerEvent::MessageProcessed {
                message_id: message.id.clone(),
            }),
            Err(err) => self.sink.try_emit(ConsumerEvent::MessageFailed {
                message_id: message.id.clone(),
                error: err.to_string(),
                timed_out: err.is_timeout(),
            }),
        }
        result
    }

    async fn handle_message(&self, message: &Message) -> PollSummary {
        let mut summary = PollSummary {
            received: 1,
            ..PollSummary::default()
        };
        if self.execute(message).await.is_err() {
            summary.failed = 1;
            return summary;
        }
        summary.succeeded = 1;

        match self
            .queue
            .delete(&self.subscription.queue_url, &message.receipt_handle)
            .await
        {
            Ok(()) => {
                summary.deleted = 1;
                self.sink.try_emit(ConsumerEvent::MessageDeleted {
                    message_id: message.id.clone(),
                });
            }
            Err(err) => self.sink.try_emit(ConsumerEvent::DeleteFailed {
                error: err.to_string(),
            }),
        }
        summary
    }

    async fn handle_batch(&self, messages: &[Message]) -> PollSummary {
        let results = join_all(messages.iter().map(|m| self.execute(m))).await;
        let failed = results.iter().filter(|r| r.is_err()).count();
        let mut summary = PollSummary {
            received: messages.len(),
            succeeded: messages.len() - failed,
            failed,
            deleted: 0,
        };

        if failed > 0 {
            self.sink.try_emit(ConsumerEvent::BatchFailed {
                size: messages.len(),
                failed,
            });
            return summary;
        }

        let entries: Vec<_> = messages.iter().map(Message::delete_entry).collect();
        match self
            .queue
            .delete_batch(&self.subscription.queue_url, &entries)
            .await
        {
            Ok(()) => {
                summary.deleted = messages.len();
                self.sink.try_emit(ConsumerEvent::BatchProcessed {
                    size: messages.len(),
                });
            }
            Err(err) => self.sink.try_emit(ConsumerEvent::DeleteFailed {
                error: err.to_string(),
            }),
        }
        summary
    }
}
