//! Testing utilities for queueflow pipelines.
//!
//! This module provides:
//! - Mock handlers for both stacks
//! - A shared call log for asserting invocation order

mod mocks;

pub use mocks::{
    CallLog, FailingHandler, ForwardingErrorHandler, HaltingHandler, MockError, PanickingHandler,
    RecordingHandler, RecoveringErrorHandler, SlowHandler,
};
