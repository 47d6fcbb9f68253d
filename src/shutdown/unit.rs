//! # Shutdown-capable components.
//!
//! [`ShutdownUnit`] is what the [`ShutdownController`](super::ShutdownController)
//! drives: a named component that can tear itself down before a [`Deadline`].
//! [`UnitFn`] adapts a closure `Fn(Deadline) -> Fut`, producing a fresh future per call.
//!
//! ## Example
//! ```rust
//! use flowvisor::TaskError;
//! use flowvisor::shutdown::{Deadline, UnitFn, UnitRef};
//!
//! let db: UnitRef = UnitFn::arc("db", |deadline: Deadline| async move {
//!     // flush within deadline.remaining()...
//!     let _ = deadline;
//!     Ok::<_, TaskError>(())
//! });
//! assert_eq!(db.name(), "db");
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::shutdown::Deadline;

/// Shared handle to a shutdown unit.
pub type UnitRef = Arc<dyn ShutdownUnit>;

/// # A named component with a deadline-bounded teardown.
///
/// The controller may run `shutdown` concurrently with other units (parallel mode)
/// or one after the other (sequential mode). In both modes the future may be
/// dropped at the deadline; implementations should treat the deadline as a hard bound.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use flowvisor::TaskError;
/// use flowvisor::shutdown::{Deadline, ShutdownUnit};
///
/// struct Listener;
///
/// #[async_trait]
/// impl ShutdownUnit for Listener {
///     fn name(&self) -> &str { "listener" }
///
///     async fn shutdown(&self, _deadline: Deadline) -> Result<(), TaskError> {
///         // stop accepting, drain connections...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ShutdownUnit: Send + Sync + 'static {
    /// Stable, human-readable unit name used in reports and events.
    fn name(&self) -> &str;

    /// Tears the unit down; should return before `deadline`.
    async fn shutdown(&self, deadline: Deadline) -> Result<(), TaskError>;
}

/// Closure-backed shutdown unit.
pub struct UnitFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> UnitFn<F> {
    /// Creates a closure-backed unit.
    ///
    /// Prefer [`UnitFn::arc`] when a [`UnitRef`] is needed right away.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F, Fut> UnitFn<F>
where
    F: Fn(Deadline) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    /// Creates the unit and returns it as a shared [`UnitRef`].
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> UnitRef {
        Arc::new(Self::new(name, f))
    }
}

impl<F> fmt::Debug for UnitFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitFn").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> ShutdownUnit for UnitFn<F>
where
    F: Fn(Deadline) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn shutdown(&self, deadline: Deadline) -> Result<(), TaskError> {
        (self.f)(deadline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn closure_receives_deadline() {
        let unit = UnitFn::arc("cache", |d: Deadline| async move {
            if d.is_expired() {
                Err(TaskError::fail("no budget"))
            } else {
                Ok(())
            }
        });
        assert_eq!(unit.name(), "cache");
        assert!(unit.shutdown(Deadline::after(Duration::from_secs(1))).await.is_ok());
        assert_eq!(
            unit.shutdown(Deadline::after(Duration::ZERO)).await,
            Err(TaskError::fail("no budget"))
        );
    }
}
