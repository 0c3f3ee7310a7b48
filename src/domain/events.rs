// Dashboard events
/// Structural change notifications published by a dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardEvent {
    /// Panels were added, removed, moved or regenerated.
    PanelsChanged,
}
