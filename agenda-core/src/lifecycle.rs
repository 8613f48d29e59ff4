//! Transition rules for the request lifecycle: which role may move a request
//! between which statuses, the single-responsible-owner lock used by the
//! execution role, and the multi-selection bulk-action semantics.

use chrono::Utc;
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{HistoryEntry, RequestBook, Status};

/// History action recorded when an execution actor claims a request.
pub const CLAIM_ACTION: &str = "Pegou para execução";

/// Acting role, assigned explicitly by the caller. The core never infers a
/// role from a username.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Reviews pending requests and forwards them.
    Supervisor,
    /// Approves or rejects forwarded requests.
    Directorate,
    /// Executes approved changes; subject to the ownership lock.
    It,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "supervisão" | "supervisao" | "supervisor" => Some(Role::Supervisor),
            "diretoria" | "directorate" => Some(Role::Directorate),
            "ti" | "it" => Some(Role::It),
            _ => None,
        }
    }
}

/// A status-changing action requested by some role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Forward,
    Approve,
    Reject,
    /// Execution-role direct status change, gated by the ownership lock.
    SetStatus(Status),
}

impl Action {
    fn target(self) -> Status {
        match self {
            Action::Forward => Status::Forwarded,
            Action::Approve => Status::Approved,
            Action::Reject => Status::Rejected,
            Action::SetStatus(status) => status,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("request {0} not found")]
    UnknownRequest(Uuid),
    #[error("no transition allowed from status {from} for this actor and action")]
    InvalidTransition { from: Status },
    #[error("request is being executed by {owner}")]
    NotOwner { owner: String },
}

/// Applies one status transition according to the role table. Terminal
/// statuses (`Recusada`, `Concluída`) admit no transition by any role.
/// Execution-role changes append a history entry carrying the new status;
/// the supervisor/directorate steps predate execution and leave the
/// execution history untouched.
pub fn transition(
    book: &mut RequestBook,
    id: Uuid,
    action: Action,
    role: Role,
    actor: &str,
) -> Result<Status, LifecycleError> {
    let request = book
        .get_mut(&id)
        .ok_or(LifecycleError::UnknownRequest(id))?;
    let from = request.status;

    let allowed = match (role, action) {
        (Role::Supervisor, Action::Forward) => from == Status::Pending,
        (Role::Directorate, Action::Approve) | (Role::Directorate, Action::Reject) => {
            from == Status::Forwarded
        }
        // Settled requests refuse everything, owner or not.
        (Role::It, Action::SetStatus(_)) if from.is_terminal() => false,
        // Execution never sends a request back to the review queue.
        (Role::It, Action::SetStatus(Status::Pending)) => false,
        (Role::It, Action::SetStatus(_)) => {
            if let Some(owner) = &request.execution_owner {
                if owner != actor {
                    return Err(LifecycleError::NotOwner {
                        owner: owner.clone(),
                    });
                }
            }
            // An unowned request accepts a first status change from any
            // execution actor; once claimed, only the owner gets here.
            true
        }
        _ => false,
    };
    if !allowed {
        return Err(LifecycleError::InvalidTransition { from });
    }

    let target = action.target();
    request.status = target;
    if role == Role::It {
        request.execution_history.push(HistoryEntry {
            timestamp: Utc::now(),
            actor: actor.to_string(),
            action: "Alterou status".to_string(),
            resulting_status: Some(target),
        });
    }
    Ok(target)
}

/// Execution-role claim ("pegar"): takes responsibility for a request.
/// Idempotent for the current owner; rejected for anyone else once owned.
pub fn claim(book: &mut RequestBook, id: Uuid, actor: &str) -> Result<(), LifecycleError> {
    let request = book
        .get_mut(&id)
        .ok_or(LifecycleError::UnknownRequest(id))?;

    match request.execution_owner.as_deref() {
        None => {
            request.execution_owner = Some(actor.to_string());
            request.execution_history.push(HistoryEntry {
                timestamp: Utc::now(),
                actor: actor.to_string(),
                action: CLAIM_ACTION.to_string(),
                resulting_status: None,
            });
            Ok(())
        }
        Some(owner) if owner == actor => Ok(()),
        Some(owner) => Err(LifecycleError::NotOwner {
            owner: owner.to_string(),
        }),
    }
}

/// Sets the supervisor note. Settled requests are read-only.
pub fn set_supervisor_note(
    book: &mut RequestBook,
    id: Uuid,
    note: &str,
) -> Result<(), LifecycleError> {
    let request = book
        .get_mut(&id)
        .ok_or(LifecycleError::UnknownRequest(id))?;
    if request.status.is_terminal() {
        return Err(LifecycleError::InvalidTransition {
            from: request.status,
        });
    }
    request.supervisor_note = Some(note.to_string());
    Ok(())
}

/// Directorate decision applied over a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Approve,
    Reject,
}

impl BulkAction {
    fn single(self) -> Action {
        match self {
            BulkAction::Approve => Action::Approve,
            BulkAction::Reject => Action::Reject,
        }
    }
}

/// What to do with selected requests that are no longer at `Encaminhada`
/// when the bulk action runs (e.g. a stale selection).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BulkPolicy {
    /// Leave ineligible requests unchanged and report them as skipped.
    #[default]
    SkipIneligible,
    /// Refuse the whole batch without changing anything.
    FailOnIneligible,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub changed: Vec<Uuid>,
    pub skipped: Vec<Uuid>,
}

/// Applies a directorate decision to each selected request whose status is
/// exactly `Encaminhada`. Under `FailOnIneligible` the batch is validated
/// up front and nothing changes on error.
pub fn bulk_transition(
    book: &mut RequestBook,
    ids: &[Uuid],
    action: BulkAction,
    actor: &str,
    policy: BulkPolicy,
) -> Result<BulkOutcome, LifecycleError> {
    if policy == BulkPolicy::FailOnIneligible {
        for id in ids {
            let request = book
                .get(id)
                .ok_or(LifecycleError::UnknownRequest(*id))?;
            if request.status != Status::Forwarded {
                return Err(LifecycleError::InvalidTransition {
                    from: request.status,
                });
            }
        }
    }

    let mut outcome = BulkOutcome::default();
    for id in ids {
        let eligible = book
            .get(id)
            .map(|r| r.status == Status::Forwarded)
            .unwrap_or(false);
        if eligible {
            transition(book, *id, action.single(), Role::Directorate, actor)?;
            outcome.changed.push(*id);
        } else {
            outcome.skipped.push(*id);
        }
    }
    Ok(outcome)
}

/// Multi-select state for bulk actions. Identifiers survive filter changes;
/// the toggle-all gesture only ever affects the currently visible view.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    ids: HashSet<Uuid>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, id: Uuid) {
        if !self.ids.remove(&id) {
            self.ids.insert(id);
        }
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn ids(&self) -> impl Iterator<Item = &Uuid> {
        self.ids.iter()
    }

    /// True when every visible request is already selected.
    pub fn all_selected(&self, visible: &[Uuid]) -> bool {
        !visible.is_empty() && visible.iter().all(|id| self.ids.contains(id))
    }

    /// Select-all toggle over the filtered view: if the visible requests are
    /// already all selected, deselect exactly those, leaving identifiers
    /// selected under a previous filter untouched; otherwise select them all.
    pub fn toggle_all(&mut self, visible: &[Uuid]) {
        if self.all_selected(visible) {
            for id in visible {
                self.ids.remove(id);
            }
        } else {
            self.ids.extend(visible.iter().copied());
        }
    }

    /// UI gating for the bulk buttons: a non-empty selection where every
    /// selected request is still at `Encaminhada`.
    pub fn eligible_for_bulk(&self, book: &RequestBook) -> bool {
        !self.ids.is_empty()
            && self.ids.iter().all(|id| {
                book.get(id)
                    .map(|r| r.status == Status::Forwarded)
                    .unwrap_or(false)
            })
    }
}
