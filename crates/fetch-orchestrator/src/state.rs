use dashboard_core::TaskError;

/// Lifecycle of a widget's most recent fetch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitting,
    Polling,
    Settled,
    Errored,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Settled | Phase::Errored)
    }
}

/// What the UI renders for one widget.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetState<D> {
    pub phase: Phase,
    pub data: D,
    pub loading: bool,
    pub error: Option<TaskError>,
    /// Generation of the cycle that last wrote this state
    pub generation: u64,
}

impl<D: Default> Default for WidgetState<D> {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            data: D::default(),
            loading: false,
            error: None,
            generation: 0,
        }
    }
}

impl<D> WidgetState<D> {
    /// Message to show inline when the widget has errored
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| match e {
            TaskError::Timeout { .. } => "The analysis took too long. Please try again.".to_string(),
            other => other.to_string(),
        })
    }
}
