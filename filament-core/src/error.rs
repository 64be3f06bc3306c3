//! Error types shared by the reactive engine, the renderer and the store.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the runtime can raise.
///
/// All errors are returned synchronously to the caller of the operation
/// that triggered them. Errors raised while an effect re-runs are handed to
/// whoever caused the re-run (a signal write, a batch flush or a tick).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A signal value was rejected by its validator.
    #[error("signal value validation failed for {type_name}")]
    Validation { type_name: &'static str },

    /// A signal already holds the maximum number of subscribers.
    #[error("maximum subscriber limit ({limit}) exceeded")]
    SubscriberLimit { limit: usize },

    /// Effects kept re-triggering each other or themselves.
    #[error("reactive updates did not settle after {limit} runs")]
    Unsettled { limit: usize },

    /// A store was written after `cleanup`.
    #[error("attempting to update a disposed store")]
    DisposedStore,

    /// A store property was accessed that the store does not define.
    #[error("accessing undefined store property: {key}")]
    UnknownStoreProperty { key: String },

    /// A readonly store property was written from outside the store.
    #[error("cannot modify readonly store property: {key}")]
    ReadonlyStoreProperty { key: String },

    /// The mount selector matched no node.
    #[error("root selector not found: {selector}")]
    RootNotFound { selector: String },

    /// The mount selector matched more than one node.
    #[error("root selector {selector} matched {count} nodes")]
    AmbiguousRoot { selector: String, count: usize },

    /// Materialization nested deeper than the configured limit.
    #[error("maximum element depth of {limit} exceeded")]
    MaxDepthExceeded { limit: usize },

    /// The element description used a denied tag.
    #[error("invalid tag type: {tag}")]
    DisallowedTag { tag: String },

    /// A non-callable value was supplied for an event property.
    #[error("event handlers must be a function: {key}")]
    HandlerNotCallable { key: String },

    /// An event handler failed the static pattern guard.
    #[error("invalid event handler detected for {event}")]
    UnsafeHandler { event: String },
}

impl Error {
    /// Build a validation error naming the rejected value's type.
    pub(crate) fn validation<T>() -> Self {
        Self::Validation {
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Whether this error belongs to the mount-failure family.
    pub fn is_mount_failure(&self) -> bool {
        matches!(
            self,
            Self::RootNotFound { .. }
                | Self::AmbiguousRoot { .. }
                | Self::MaxDepthExceeded { .. }
                | Self::DisallowedTag { .. }
        )
    }
}
