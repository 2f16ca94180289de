//! Core aggregate and domain event traits.

use common::Version;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// Used for structured logging and metrics labels.
    fn event_type(&self) -> &'static str;
}

/// Trait for the aggregates of the checkout core.
///
/// Aggregates decide on commands by returning events and change state only
/// by applying those events:
/// - Command methods take `&self` and never mutate
/// - `apply` is pure and deterministic and cannot fail
///
/// The persisted form of an aggregate is its current state together with the
/// version used for compare-and-swap writes.
pub trait Aggregate: Default + Send + Sync + Sized {
    /// Identifier type of the aggregate.
    type Id: Copy + std::fmt::Display + Send + Sync;

    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors this aggregate's commands can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's identifier.
    ///
    /// Returns None for a new, uninitialized aggregate.
    fn id(&self) -> Option<Self::Id>;

    /// Returns the persisted version of the aggregate.
    fn version(&self) -> Version;

    /// Sets the aggregate version.
    ///
    /// Called by the command handler once a write has been accepted.
    fn set_version(&mut self, version: Version);

    /// Applies an event to the aggregate, updating its state.
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}
