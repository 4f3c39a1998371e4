//! Panic payload rendering for connection task logs.

use std::{any::Any, borrow::Cow};

/// Extract a printable message from a panic payload.
///
/// String payloads (`panic!("...")`) are returned as-is; anything else is
/// described by its `Debug` form, which for `dyn Any` is `Any { .. }`.
///
/// ```
/// use plugin_runner::panic::panic_message;
///
/// let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
/// assert_eq!(panic_message(payload.as_ref()), "boom");
/// ```
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> Cow<'_, str> {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        Cow::Borrowed(s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        Cow::Borrowed(s.as_str())
    } else {
        Cow::Owned(format!("{payload:?}"))
    }
}
