//! Restart primitive.

/// Control over the running system.
pub trait SystemControl {
    /// Restart the device. On real hardware this does not return.
    fn restart(&mut self);
}
