/// Human-interaction callbacks a workflow fires while it runs. All
/// three are optional to implement — a caller that only cares about one
/// signal overrides just that method.
pub trait HumanActionListener: Send {
    /// "Place your finger on the sensor."
    fn put_finger(&mut self) {}
    /// "Remove your finger from the sensor."
    fn remove_finger(&mut self) {}
    /// "Hold still — data is transferring." Only emitted by the
    /// data-returning enrol variant.
    fn wait_while_data_transferring(&mut self) {}
}

/// A listener that ignores every signal, for callers that don't need
/// to react to finger-state prompts (non-interactive enrol variants,
/// tests).
pub struct NullListener;

impl HumanActionListener for NullListener {}
