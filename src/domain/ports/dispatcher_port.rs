//! UI dispatcher port definition.

/// Unit of work that mutates slot state.
pub type UiJob = Box<dyn FnOnce() + Send + 'static>;

/// Port for running work on the UI execution context.
///
/// Completions of decodes and downloads happen on worker threads; any slot
/// mutation they trigger is handed to the dispatcher instead of being
/// applied in place. Jobs dispatched from one thread run in dispatch order.
pub trait UiDispatcher: Send + Sync {
    /// Schedules `job` on the UI context.
    fn dispatch(&self, job: UiJob);
}
