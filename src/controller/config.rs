use super::admission::AdmissionPolicy;

/// Configuration for the controller.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Capacity of the submission queue.
    ///
    /// When full, `submit()` will wait and `try_submit()` will return `Full` error.
    pub queue_capacity: usize,

    /// What to do with triggers for a key that is already being reconciled.
    pub admission: AdmissionPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            admission: AdmissionPolicy::Coalesce,
        }
    }
}
