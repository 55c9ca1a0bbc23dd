use crate::models::all_models::{DeliveryStatus, DonationStatus};
use thiserror::Error;

/// Upper bound on images attached to a single donation.
pub const MAX_IMAGES: usize = 7;

//Lifecycle Error
//The typed failures of the donation state machine. Routes map these onto
//HTTP statuses: Validation -> 400, everything else -> 409.
#[derive(Debug, Error, PartialEq)]
pub enum LifecycleError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("A donation can carry at most {MAX_IMAGES} images")]
    TooManyImages,
    #[error("Donation is no longer available: cannot move from {from} to {to}")]
    IllegalTransition {
        from: DonationStatus,
        to: DonationStatus,
    },
    #[error("Delivery step not available: cannot move from {from:?} to {to}")]
    IllegalDeliveryTransition {
        from: Option<DeliveryStatus>,
        to: DeliveryStatus,
    },
    #[error("Donation has already been accepted")]
    AlreadyAccepted,
    #[error("Delivery has already been assigned to another volunteer")]
    AlreadyAssigned,
}

//Donation Draft
//The fields a new donation must carry before it is stored.
pub struct DonationDraft<'a> {
    pub title: &'a str,
    pub food_type: &'a str,
    pub quantity: &'a str,
    pub location_address: &'a str,
    pub contact_phone: &'a str,
    pub image_count: usize,
}

//Validate Draft
//Checks the required fields of a new donation are non-empty and the image
//list is within bounds.
pub fn validate_draft(draft: &DonationDraft) -> Result<(), LifecycleError> {
    if draft.title.trim().is_empty() {
        return Err(LifecycleError::MissingField("title"));
    }
    if draft.food_type.trim().is_empty() {
        return Err(LifecycleError::MissingField("food_type"));
    }
    if draft.quantity.trim().is_empty() {
        return Err(LifecycleError::MissingField("quantity"));
    }
    if draft.location_address.trim().is_empty() {
        return Err(LifecycleError::MissingField("location.address"));
    }
    if draft.contact_phone.trim().is_empty() {
        return Err(LifecycleError::MissingField("contact_phone"));
    }
    if draft.image_count > MAX_IMAGES {
        return Err(LifecycleError::TooManyImages);
    }
    Ok(())
}

//Status Transition Allowed
//The top-level transition table. Status only moves forward, except
//cancellation, which is reachable from pending or accepted.
pub fn status_transition_allowed(from: DonationStatus, to: DonationStatus) -> bool {
    use DonationStatus::*;
    matches!(
        (from, to),
        (Pending, Accepted) | (Pending, Cancelled) | (Accepted, Completed) | (Accepted, Cancelled)
    )
}

//Check Status Transition
pub fn check_status_transition(
    from: DonationStatus,
    to: DonationStatus,
) -> Result<(), LifecycleError> {
    if status_transition_allowed(from, to) {
        Ok(())
    } else {
        Err(LifecycleError::IllegalTransition { from, to })
    }
}

//Accept Conflict
//Classifies a lost accept race from the refetched row: if someone else got
//there first the caller should refresh, not retry.
pub fn accept_conflict(current: DonationStatus) -> LifecycleError {
    if current == DonationStatus::Accepted {
        LifecycleError::AlreadyAccepted
    } else {
        LifecycleError::IllegalTransition {
            from: current,
            to: DonationStatus::Accepted,
        }
    }
}

//Claim Conflict
//Same idea for a lost volunteer claim.
pub fn claim_conflict(current: Option<DeliveryStatus>) -> LifecycleError {
    match current {
        Some(DeliveryStatus::Assigned)
        | Some(DeliveryStatus::PickedUp)
        | Some(DeliveryStatus::Delivered) => LifecycleError::AlreadyAssigned,
        other => LifecycleError::IllegalDeliveryTransition {
            from: other,
            to: DeliveryStatus::Assigned,
        },
    }
}

//Delivery Transition Allowed
//Sub-state table, only meaningful while the donation is accepted. The
//'none' state is set by the accept operation itself.
pub fn delivery_transition_allowed(from: Option<DeliveryStatus>, to: DeliveryStatus) -> bool {
    use DeliveryStatus::*;
    matches!(
        (from, to),
        (Some(None), AvailableForPickup)
            | (Some(AvailableForPickup), Assigned)
            | (Some(Assigned), PickedUp)
            | (Some(PickedUp), Delivered)
    )
}

//Check Delivery Transition
pub fn check_delivery_transition(
    from: Option<DeliveryStatus>,
    to: DeliveryStatus,
) -> Result<(), LifecycleError> {
    if delivery_transition_allowed(from, to) {
        Ok(())
    } else {
        Err(LifecycleError::IllegalDeliveryTransition { from, to })
    }
}

//Completion Allowed
//An NGO may complete straight from accepted even when no volunteer flow ran
//(self-delivery), so only the parent status is consulted.
pub fn completion_allowed(status: DonationStatus) -> bool {
    status == DonationStatus::Accepted
}

//Cancellation Allowed
pub fn cancellation_allowed(status: DonationStatus) -> bool {
    matches!(status, DonationStatus::Pending | DonationStatus::Accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use DeliveryStatus::*;
    use DonationStatus::*;

    fn draft(image_count: usize) -> DonationDraft<'static> {
        DonationDraft {
            title: "Lunch",
            food_type: "Cooked Food",
            quantity: "10 servings",
            location_address: "12 Main St",
            contact_phone: "+91 9999999999",
            image_count,
        }
    }

    #[test]
    fn new_donation_with_required_fields_is_valid() {
        assert!(validate_draft(&draft(3)).is_ok());
    }

    #[test]
    fn empty_required_fields_are_rejected() {
        let mut d = draft(0);
        d.title = "  ";
        assert_eq!(validate_draft(&d), Err(LifecycleError::MissingField("title")));

        let mut d = draft(0);
        d.contact_phone = "";
        assert_eq!(
            validate_draft(&d),
            Err(LifecycleError::MissingField("contact_phone"))
        );
    }

    #[test]
    fn image_limit_is_seven() {
        assert!(validate_draft(&draft(MAX_IMAGES)).is_ok());
        assert_eq!(
            validate_draft(&draft(MAX_IMAGES + 1)),
            Err(LifecycleError::TooManyImages)
        );
    }

    #[test]
    fn status_never_regresses() {
        for terminal in [Completed, Cancelled] {
            for target in [Pending, Accepted, Completed, Cancelled] {
                assert!(!status_transition_allowed(terminal, target));
            }
        }
        assert!(!status_transition_allowed(Accepted, Pending));
    }

    #[test]
    fn forward_transitions_hold() {
        assert!(status_transition_allowed(Pending, Accepted));
        assert!(status_transition_allowed(Pending, Cancelled));
        assert!(status_transition_allowed(Accepted, Completed));
        assert!(status_transition_allowed(Accepted, Cancelled));
        assert!(!status_transition_allowed(Pending, Completed));
    }

    #[test]
    fn double_cancel_is_reported_not_crashed() {
        let err = check_status_transition(Cancelled, Cancelled).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::IllegalTransition {
                from: Cancelled,
                to: Cancelled
            }
        );
    }

    #[test]
    fn lost_accept_race_maps_to_already_accepted() {
        assert_eq!(accept_conflict(Accepted), LifecycleError::AlreadyAccepted);
        assert_eq!(
            accept_conflict(Cancelled),
            LifecycleError::IllegalTransition {
                from: Cancelled,
                to: Accepted
            }
        );
    }

    #[test]
    fn lost_claim_race_maps_to_already_assigned() {
        assert_eq!(claim_conflict(Some(Assigned)), LifecycleError::AlreadyAssigned);
        assert_eq!(claim_conflict(Some(PickedUp)), LifecycleError::AlreadyAssigned);
        assert!(matches!(
            claim_conflict(Some(DeliveryStatus::None)),
            LifecycleError::IllegalDeliveryTransition { .. }
        ));
    }

    #[test]
    fn delivery_chain_advances_one_step_at_a_time() {
        assert!(delivery_transition_allowed(Some(DeliveryStatus::None), AvailableForPickup));
        assert!(delivery_transition_allowed(Some(AvailableForPickup), Assigned));
        assert!(delivery_transition_allowed(Some(Assigned), PickedUp));
        assert!(delivery_transition_allowed(Some(PickedUp), Delivered));

        // no skipping, no regressing, nothing while pending
        assert!(!delivery_transition_allowed(Some(DeliveryStatus::None), Assigned));
        assert!(!delivery_transition_allowed(Some(Assigned), Delivered));
        assert!(!delivery_transition_allowed(Some(Delivered), PickedUp));
        assert!(!delivery_transition_allowed(Option::None, AvailableForPickup));
    }

    #[test]
    fn full_volunteer_flow_is_legal_end_to_end() {
        assert!(status_transition_allowed(Pending, Accepted));
        let mut delivery = Some(DeliveryStatus::None);
        for step in [AvailableForPickup, Assigned, PickedUp, Delivered] {
            assert!(delivery_transition_allowed(delivery, step));
            delivery = Some(step);
        }
        assert!(completion_allowed(Accepted));
    }

    #[test]
    fn completion_ignores_delivery_substate() {
        // NGO self-delivery: completing is legal from accepted whether or not
        // a volunteer flow ran.
        assert!(completion_allowed(Accepted));
        assert!(!completion_allowed(Pending));
        assert!(!completion_allowed(Completed));
    }
}
