use crate::config::MetricKind;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Quit,
    ToggleMetric(MetricKind),
    ToggleInTitle(MetricKind),
    ToggleBothSpeeds,
    IntervalUp,
    IntervalDown,
    Save,
    Revert,
    ToggleHelp,
    None,
}
