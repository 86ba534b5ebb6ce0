use serde::Serialize;

use crate::models::delivery::DeliveryStatus;
use crate::models::incident::IncidentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition<S> {
    pub to: S,
    pub label: &'static str,
}

const fn to<S>(to: S, label: &'static str) -> Transition<S> {
    Transition { to, label }
}

pub trait Lifecycle: Copy + PartialEq + 'static {
    fn transitions(self) -> &'static [Transition<Self>];

    fn is_terminal(self) -> bool {
        self.transitions().is_empty()
    }

    fn can_transition_to(self, next: Self) -> bool {
        self.transitions().iter().any(|transition| transition.to == next)
    }
}

const PENDING: &[Transition<DeliveryStatus>] = &[
    to(DeliveryStatus::Searching, "Start driver search"),
    to(DeliveryStatus::Cancelled, "Cancel"),
];
const SEARCHING: &[Transition<DeliveryStatus>] = &[
    to(DeliveryStatus::Assigned, "Assign driver"),
    to(DeliveryStatus::Cancelled, "Cancel"),
];
const ASSIGNED: &[Transition<DeliveryStatus>] = &[
    to(DeliveryStatus::Accepted, "Mark accepted"),
    to(DeliveryStatus::Cancelled, "Cancel"),
];
const ACCEPTED: &[Transition<DeliveryStatus>] = &[
    to(DeliveryStatus::PickingUp, "Driver heading to pickup"),
    to(DeliveryStatus::Cancelled, "Cancel"),
];
const PICKING_UP: &[Transition<DeliveryStatus>] = &[
    to(DeliveryStatus::PickedUp, "Mark picked up"),
    to(DeliveryStatus::Cancelled, "Cancel"),
];
const PICKED_UP: &[Transition<DeliveryStatus>] = &[
    to(DeliveryStatus::InTransit, "Mark in transit"),
    to(DeliveryStatus::Returned, "Return to sender"),
];
const IN_TRANSIT: &[Transition<DeliveryStatus>] = &[
    to(DeliveryStatus::Arriving, "Mark arriving"),
    to(DeliveryStatus::Failed, "Mark failed"),
    to(DeliveryStatus::Returned, "Return to sender"),
];
const ARRIVING: &[Transition<DeliveryStatus>] = &[
    to(DeliveryStatus::Delivered, "Mark delivered"),
    to(DeliveryStatus::Failed, "Mark failed"),
    to(DeliveryStatus::Returned, "Return to sender"),
];
const OUTCOME: &[Transition<DeliveryStatus>] = &[to(DeliveryStatus::Completed, "Close")];

impl Lifecycle for DeliveryStatus {
    fn transitions(self) -> &'static [Transition<Self>] {
        match self {
            DeliveryStatus::Pending => PENDING,
            DeliveryStatus::Searching => SEARCHING,
            DeliveryStatus::Assigned => ASSIGNED,
            DeliveryStatus::Accepted => ACCEPTED,
            DeliveryStatus::PickingUp => PICKING_UP,
            DeliveryStatus::PickedUp => PICKED_UP,
            DeliveryStatus::InTransit => IN_TRANSIT,
            DeliveryStatus::Arriving => ARRIVING,
            DeliveryStatus::Delivered
            | DeliveryStatus::Failed
            | DeliveryStatus::Cancelled
            | DeliveryStatus::Returned => OUTCOME,
            DeliveryStatus::Completed => &[],
        }
    }
}

const INCIDENT_OPEN: &[Transition<IncidentStatus>] = &[
    to(IncidentStatus::Investigating, "Start investigation"),
    to(IncidentStatus::Dismissed, "Dismiss"),
];
const INCIDENT_INVESTIGATING: &[Transition<IncidentStatus>] = &[
    to(IncidentStatus::Resolved, "Resolve"),
    to(IncidentStatus::Dismissed, "Dismiss"),
];

impl Lifecycle for IncidentStatus {
    fn transitions(self) -> &'static [Transition<Self>] {
        match self {
            IncidentStatus::Open => INCIDENT_OPEN,
            IncidentStatus::Investigating => INCIDENT_INVESTIGATING,
            IncidentStatus::Resolved | IncidentStatus::Dismissed => &[],
        }
    }
}

/// Options for a raw status string as stored by the backend. Unknown strings get no options.
pub fn options_for(status: &str) -> &'static [Transition<DeliveryStatus>] {
    status
        .parse::<DeliveryStatus>()
        .map(Lifecycle::transitions)
        .unwrap_or(&[])
}
