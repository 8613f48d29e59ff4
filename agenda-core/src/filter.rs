//! Predicate composition over the request collection. Filtering is pure: it
//! never mutates the source and preserves insertion order.

use chrono::{Local, NaiveDate};

use crate::models::{AgendaKind, DayKind, Origin, Request, Status};

/// Derived from the presence of an execution owner; only meaningful in the
/// execution-role view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    InProgress,
    NotStarted,
}

impl ExecutionState {
    pub fn label(self) -> &'static str {
        match self {
            ExecutionState::InProgress => "Em execução",
            ExecutionState::NotStarted => "Não iniciada",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "em execução" | "em execucao" | "in-progress" | "in_progress" => {
                Some(ExecutionState::InProgress)
            }
            "não iniciada" | "nao iniciada" | "not-started" | "not_started" => {
                Some(ExecutionState::NotStarted)
            }
            _ => None,
        }
    }
}

/// Filter configuration. `None` means "Todos" for that dimension; all set
/// predicates are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    /// Case-insensitive substring match on the requester name.
    pub search: Option<String>,
    pub origin: Option<Origin>,
    /// Matches when any day in the request has this type.
    pub day_type: Option<DayKind>,
    pub agenda_type: Option<AgendaKind>,
    pub status: Option<Status>,
    pub execution: Option<ExecutionState>,
    /// Inclusive submission-date bounds, anchored at local midnight and
    /// local 23:59:59 respectively.
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl RequestFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, request: &Request) -> bool {
        if let Some(search) = &self.search {
            if !request
                .requester
                .to_lowercase()
                .contains(&search.to_lowercase())
            {
                return false;
            }
        }

        if let Some(origin) = self.origin {
            if request.origin != origin {
                return false;
            }
        }

        if let Some(status) = self.status {
            if request.status != status {
                return false;
            }
        }

        if let Some(day_type) = self.day_type {
            if !request.days.iter().any(|d| d.day_type == day_type) {
                return false;
            }
        }

        if let Some(agenda_type) = self.agenda_type {
            let matched = if request.agenda_types.is_empty() {
                // Legacy records only carry the combined label.
                request.agenda_type_label.contains(agenda_type.label())
            } else {
                request.agenda_types.contains(&agenda_type)
            };
            if !matched {
                return false;
            }
        }

        if let Some(execution) = self.execution {
            let in_progress = request.execution_owner.is_some();
            let wanted = matches!(execution, ExecutionState::InProgress);
            if in_progress != wanted {
                return false;
            }
        }

        if self.from.is_some() || self.to.is_some() {
            // Whole-day inclusive bounds reduce to a local-date comparison.
            let submitted = request.submitted_at.with_timezone(&Local).date_naive();
            if let Some(from) = self.from {
                if submitted < from {
                    return false;
                }
            }
            if let Some(to) = self.to {
                if submitted > to {
                    return false;
                }
            }
        }

        true
    }

    /// Lazy, restartable filtered view in source insertion order.
    pub fn apply<'a>(
        &'a self,
        requests: &'a [Request],
    ) -> impl Iterator<Item = &'a Request> + 'a {
        requests.iter().filter(move |r| self.matches(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Day, HistoryEntry, Request};
    use chrono::{NaiveTime, TimeZone, Utc};
    use uuid::Uuid;

    fn request(requester: &str, origin: Origin, status: Status) -> Request {
        Request {
            id: Uuid::new_v4(),
            requester: requester.to_string(),
            agenda_types: vec![AgendaKind::Convenio],
            agenda_type_label: "Convênio".to_string(),
            days: vec![Day {
                date: "2025-01-10".parse().unwrap(),
                start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                day_type: DayKind::Opening,
            }],
            note: String::new(),
            submitted_at: Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap(),
            status,
            origin,
            supervisor_note: None,
            attachment: None,
            request_number: Some("1/2025".to_string()),
            execution_owner: None,
            execution_history: Vec::<HistoryEntry>::new(),
        }
    }

    fn sample_set() -> Vec<Request> {
        vec![
            request("Dra. Helena Souza", Origin::Doctor, Status::Forwarded),
            request("Dr. Marcos Lima", Origin::Supervision, Status::Forwarded),
            request("Dra. Helena Prado", Origin::Doctor, Status::Approved),
        ]
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let requests = sample_set();
        let filter = RequestFilter {
            search: Some("helena".to_string()),
            ..Default::default()
        };
        let names: Vec<&str> = filter.apply(&requests).map(|r| r.requester.as_str()).collect();
        assert_eq!(names, vec!["Dra. Helena Souza", "Dra. Helena Prado"]);
    }

    #[test]
    fn test_filters_compose_order_independently() {
        let requests = sample_set();

        let by_status = RequestFilter {
            status: Some(Status::Forwarded),
            ..Default::default()
        };
        let by_origin = RequestFilter {
            origin: Some(Origin::Doctor),
            ..Default::default()
        };
        let combined = RequestFilter {
            status: Some(Status::Forwarded),
            origin: Some(Origin::Doctor),
            ..Default::default()
        };

        let sequential: Vec<Uuid> = requests
            .iter()
            .filter(|r| by_status.matches(r))
            .filter(|r| by_origin.matches(r))
            .map(|r| r.id)
            .collect();
        let reversed: Vec<Uuid> = requests
            .iter()
            .filter(|r| by_origin.matches(r))
            .filter(|r| by_status.matches(r))
            .map(|r| r.id)
            .collect();
        let at_once: Vec<Uuid> = combined.apply(&requests).map(|r| r.id).collect();

        assert_eq!(sequential, at_once);
        assert_eq!(reversed, at_once);
    }

    #[test]
    fn test_day_type_matches_any_day() {
        let mut req = request("Dr. Marcos Lima", Origin::Doctor, Status::Pending);
        req.days.push(Day {
            date: "2025-01-12".parse().unwrap(),
            start_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            day_type: DayKind::Closing,
        });
        let requests = vec![req];

        for kind in [DayKind::Opening, DayKind::Closing] {
            let filter = RequestFilter {
                day_type: Some(kind),
                ..Default::default()
            };
            assert_eq!(filter.apply(&requests).count(), 1);
        }
    }

    #[test]
    fn test_agenda_type_falls_back_to_legacy_label() {
        let mut legacy = request("Dr. Marcos Lima", Origin::Doctor, Status::Pending);
        legacy.agenda_types.clear();
        legacy.agenda_type_label = "Convênio + HSM+".to_string();
        let requests = vec![legacy];

        for kind in [AgendaKind::Convenio, AgendaKind::HsmPlus] {
            let filter = RequestFilter {
                agenda_type: Some(kind),
                ..Default::default()
            };
            assert_eq!(filter.apply(&requests).count(), 1);
        }
    }

    #[test]
    fn test_execution_state_from_owner_presence() {
        let mut owned = request("Dra. Helena Souza", Origin::Doctor, Status::Approved);
        owned.execution_owner = Some("joão".to_string());
        let free = request("Dr. Marcos Lima", Origin::Doctor, Status::Approved);
        let requests = vec![owned, free];

        let in_progress = RequestFilter {
            execution: Some(ExecutionState::InProgress),
            ..Default::default()
        };
        let not_started = RequestFilter {
            execution: Some(ExecutionState::NotStarted),
            ..Default::default()
        };
        assert_eq!(in_progress.apply(&requests).count(), 1);
        assert_eq!(not_started.apply(&requests).count(), 1);
    }

    #[test]
    fn test_date_range_bounds_are_inclusive() {
        // Anchor submissions in local time: the bounds are local-day bounds.
        let mut requests = sample_set();
        for req in &mut requests {
            req.submitted_at = Local
                .with_ymd_and_hms(2025, 1, 10, 23, 30, 0)
                .unwrap()
                .with_timezone(&Utc);
        }
        let exact = RequestFilter {
            from: Some("2025-01-10".parse().unwrap()),
            to: Some("2025-01-10".parse().unwrap()),
            ..Default::default()
        };
        // Submission falls inside the single-day window regardless of the
        // time of day.
        assert_eq!(exact.apply(&requests).count(), requests.len());

        let before = RequestFilter {
            to: Some("2025-01-09".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(before.apply(&requests).count(), 0);

        let open_ended = RequestFilter {
            from: Some("2025-01-01".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(open_ended.apply(&requests).count(), requests.len());
    }

    #[test]
    fn test_view_is_restartable_and_preserves_order() {
        let requests = sample_set();
        let filter = RequestFilter {
            origin: Some(Origin::Doctor),
            ..Default::default()
        };
        let first: Vec<Uuid> = filter.apply(&requests).map(|r| r.id).collect();
        let second: Vec<Uuid> = filter.apply(&requests).map(|r| r.id).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec![requests[0].id, requests[2].id]);
    }
}
