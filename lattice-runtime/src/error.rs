//! Error Types
//!
//! The runtime distinguishes two classes of problems:
//!
//! - [`Warning`]: policy violations such as writing through a readonly
//!   wrapper. These are logged, recorded on the [`Runtime`](crate::Runtime)
//!   and the offending operation becomes a no-op. They never interrupt the
//!   caller.
//! - [`RenderError`]: structural violations that abort the current mount or
//!   patch. They propagate as `Err` to the caller of `patch`/`render`/`mount`.
//!
//! Dynamic conditions that are expected to happen (missing event handler,
//! missing slot, missing injection) are neither; they resolve to "nothing".

use thiserror::Error;

/// A recoverable policy violation reported on the warning channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    /// A write was attempted through a readonly wrapper.
    #[error("set operation on key `{key}` failed: target is readonly")]
    ReadonlyMutation {
        /// The property that was written.
        key: String,
    },

    /// A reactive wrapper was requested for something that is not an object.
    #[error("value cannot be made reactive: expected an object, got {kind}")]
    InvalidReactiveTarget {
        /// Kind name of the rejected value.
        kind: &'static str,
    },

    /// A component-scoped API was used while no component was being set up.
    #[error("`{api}` can only be used inside setup()")]
    NoCurrentInstance {
        /// Name of the API that was called.
        api: &'static str,
    },
}

/// A fatal error raised while mounting or patching a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// A component reached reconciliation without ever producing a render
    /// function, neither from its definition nor from `setup`.
    #[error("component `{component}` is missing a render function")]
    MissingRenderFunction {
        /// Name of the offending component definition.
        component: String,
    },

    /// A queued job kept re-queueing itself within a single flush.
    #[error("maximum recursive updates exceeded ({limit}) in a single flush")]
    RecursionLimit {
        /// The configured limit.
        limit: usize,
    },

    /// An operation referenced a container the renderer does not know.
    #[error("container {0} has no mounted tree")]
    InvalidContainer(u64),

    /// An app was unmounted before it was mounted.
    #[error("app is not mounted")]
    NotMounted,
}

/// Result alias for rendering operations.
pub type RenderResult<T = ()> = Result<T, RenderError>;
