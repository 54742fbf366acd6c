use stockroom_core::AggregateId;

/// A command targets exactly one aggregate stream.
///
/// Commands are transient intent ("take 3 boxes out of item X"); the events
/// they produce are the persisted facts. One command touches one stream, so
/// the stream is also the unit of atomicity: every event decided for a command
/// is appended in a single batch or not at all.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn target_aggregate_id(&self) -> AggregateId;
}
