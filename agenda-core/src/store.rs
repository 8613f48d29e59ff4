//! Persistence boundary: a key-value capability holding the serialized
//! collection and the last-issued request-number counter. Every mutation
//! rewrites the whole collection; concurrent sessions are last-writer-wins
//! and the store makes no stronger claim.

use anyhow::Result;
use chrono::{Datelike, Local};
use std::collections::HashMap;

use crate::models::{AgendaKind, RequestBook};

/// Key holding the JSON-serialized request collection.
pub const REQUESTS_KEY: &str = "solicitacoes";
/// Key holding the last-issued request number as a plain "N/YYYY" string.
pub const LAST_NUMBER_KEY: &str = "ultimoNumeroSolicitacao";

/// Injected storage capability. Implementations decide where the bytes live.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// In-memory backend for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct MemoryKv {
    entries: HashMap<String, String>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Result of a load. Loading never fails: missing storage yields an empty
/// collection, and corrupt data is discarded (and reported here so the
/// boundary can tell the user).
#[derive(Debug)]
pub struct LoadOutcome {
    pub book: RequestBook,
    /// True when the stored collection existed but could not be parsed.
    pub discarded_corrupt: bool,
}

/// Owns load/normalize/save over an injected key-value backend.
pub struct RequestStore<K: KvStore> {
    kv: K,
}

impl<K: KvStore> RequestStore<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    pub fn into_inner(self) -> K {
        self.kv
    }

    /// Loads and normalizes the full collection for the current year.
    pub fn load(&mut self) -> LoadOutcome {
        self.load_at(Local::now().year())
    }

    /// Year-injectable variant of [`load`](Self::load).
    pub fn load_at(&mut self, year: i32) -> LoadOutcome {
        let (mut book, discarded_corrupt) = match self.kv.get(REQUESTS_KEY) {
            Ok(None) => (RequestBook::new(), false),
            Ok(Some(raw)) => match serde_json::from_str::<RequestBook>(&raw) {
                Ok(book) => (book, false),
                Err(_) => (RequestBook::new(), true),
            },
            // An unreadable backend is treated like a missing one.
            Err(_) => (RequestBook::new(), true),
        };

        let migrated = self.normalize(&mut book, year);
        if migrated {
            // Persist the migration so legacy records are only rewritten once.
            let _ = self.save(&book);
        }

        LoadOutcome {
            book,
            discarded_corrupt,
        }
    }

    /// Fills defaults on legacy records: derives the agenda-type set from the
    /// combined label (split on '+'), and assigns request numbers where
    /// absent. Returns true when anything changed.
    fn normalize(&mut self, book: &mut RequestBook, year: i32) -> bool {
        self.sync_counter(book, year);

        let mut changed = false;
        let mut pending_numbers = Vec::new();
        for (idx, request) in book.requests.iter_mut().enumerate() {
            if request.agenda_types.is_empty() {
                let derived: Vec<AgendaKind> = request
                    .agenda_type_label
                    .split('+')
                    .filter_map(AgendaKind::parse)
                    .collect();
                request.agenda_types = if derived.is_empty() {
                    vec![AgendaKind::Convenio]
                } else {
                    derived
                };
                changed = true;
            }
            if request.request_number.is_none() {
                pending_numbers.push(idx);
            }
        }

        for idx in pending_numbers {
            if let Ok(number) = self.next_request_number(year) {
                book.requests[idx].request_number = Some(number);
                changed = true;
            }
        }
        changed
    }

    /// Ensures the counter is at least the highest number already issued for
    /// `year`, so numbers assigned next stay strictly increasing even when
    /// legacy data ran ahead of the counter.
    fn sync_counter(&mut self, book: &RequestBook, year: i32) {
        let max_issued = book
            .requests
            .iter()
            .filter_map(|r| r.request_number.as_deref())
            .filter_map(parse_request_number)
            .filter(|(_, y)| *y == year)
            .map(|(seq, _)| seq)
            .max();

        let Some(max_issued) = max_issued else {
            return;
        };

        let stored = self
            .kv
            .get(LAST_NUMBER_KEY)
            .ok()
            .flatten()
            .as_deref()
            .and_then(parse_request_number);
        let behind = match stored {
            Some((seq, y)) => y != year || seq < max_issued,
            None => true,
        };
        if behind {
            let _ = self.kv.set(LAST_NUMBER_KEY, &format!("{max_issued}/{year}"));
        }
    }

    /// Replaces the entire persisted collection.
    pub fn save(&mut self, book: &RequestBook) -> Result<()> {
        let raw = serde_json::to_string(book)?;
        self.kv.set(REQUESTS_KEY, &raw)
    }

    /// Reserves and returns the next request number. The counter restarts at
    /// 1 when the stored year differs from `year`, and the reservation is
    /// written back before the request itself is confirmed.
    pub fn next_request_number(&mut self, year: i32) -> Result<String> {
        let next = match self
            .kv
            .get(LAST_NUMBER_KEY)?
            .as_deref()
            .and_then(parse_request_number)
        {
            Some((seq, stored_year)) if stored_year == year => seq + 1,
            _ => 1,
        };
        let number = format!("{next}/{year}");
        self.kv.set(LAST_NUMBER_KEY, &number)?;
        Ok(number)
    }
}

/// Parses "N/YYYY" into (sequence, year).
pub fn parse_request_number(s: &str) -> Option<(u32, i32)> {
    let (seq, year) = s.trim().split_once('/')?;
    Some((seq.trim().parse().ok()?, year.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Origin, Status};

    fn store() -> RequestStore<MemoryKv> {
        RequestStore::new(MemoryKv::new())
    }

    #[test]
    fn test_numbers_strictly_increase_within_a_year() {
        let mut store = store();
        let issued: Vec<String> = (0..5)
            .map(|_| store.next_request_number(2025).unwrap())
            .collect();
        assert_eq!(issued, vec!["1/2025", "2/2025", "3/2025", "4/2025", "5/2025"]);
    }

    #[test]
    fn test_number_restarts_on_new_year() {
        let mut store = store();
        store.kv.set(LAST_NUMBER_KEY, "14/2024").unwrap();
        assert_eq!(store.next_request_number(2025).unwrap(), "1/2025");
        assert_eq!(store.next_request_number(2025).unwrap(), "2/2025");
    }

    #[test]
    fn test_reservation_is_written_back_immediately() {
        let mut store = store();
        store.next_request_number(2025).unwrap();
        assert_eq!(
            store.kv.get(LAST_NUMBER_KEY).unwrap().as_deref(),
            Some("1/2025")
        );
    }

    #[test]
    fn test_load_missing_storage_yields_empty() {
        let mut store = store();
        let outcome = store.load_at(2025);
        assert!(outcome.book.is_empty());
        assert!(!outcome.discarded_corrupt);
    }

    #[test]
    fn test_load_discards_malformed_json() {
        let mut store = store();
        store.kv.set(REQUESTS_KEY, "{not json").unwrap();
        let outcome = store.load_at(2025);
        assert!(outcome.book.is_empty());
        assert!(outcome.discarded_corrupt);
    }

    #[test]
    fn test_load_normalizes_legacy_record() {
        let legacy = r#"[{
            "requester": "Dr. Silva",
            "agendaTypeLabel": "Convênio + HSM+",
            "days": [{"date": "2025-01-10", "startTime": "08:00", "dayType": "Abertura"}],
            "submittedAt": "2025-01-10T11:00:00Z"
        }]"#;
        let mut store = store();
        store.kv.set(REQUESTS_KEY, legacy).unwrap();

        let outcome = store.load_at(2025);
        let req = &outcome.book.requests[0];
        assert_eq!(req.status, Status::Pending);
        assert_eq!(req.origin, Origin::Doctor);
        assert_eq!(
            req.agenda_types,
            vec![AgendaKind::Convenio, AgendaKind::HsmPlus]
        );
        assert_eq!(req.request_number.as_deref(), Some("1/2025"));

        // Migration is persisted; a second load assigns nothing new.
        let again = store.load_at(2025);
        assert_eq!(
            again.book.requests[0].request_number.as_deref(),
            Some("1/2025")
        );
        assert_eq!(
            store.kv.get(LAST_NUMBER_KEY).unwrap().as_deref(),
            Some("1/2025")
        );
    }

    #[test]
    fn test_label_without_known_kinds_defaults_to_convenio() {
        let legacy = r#"[{
            "requester": "Dr. Silva",
            "days": [{"date": "2025-01-10", "startTime": "08:00", "dayType": "Abertura"}],
            "submittedAt": "2025-01-10T11:00:00Z",
            "requestNumber": "1/2025"
        }]"#;
        let mut store = store();
        store.kv.set(REQUESTS_KEY, legacy).unwrap();
        let outcome = store.load_at(2025);
        assert_eq!(
            outcome.book.requests[0].agenda_types,
            vec![AgendaKind::Convenio]
        );
    }

    #[test]
    fn test_counter_catches_up_with_issued_numbers() {
        let legacy = r#"[{
            "requester": "Dr. Silva",
            "agendaTypes": ["Convênio"],
            "days": [{"date": "2025-01-10", "startTime": "08:00", "dayType": "Abertura"}],
            "submittedAt": "2025-01-10T11:00:00Z",
            "requestNumber": "7/2025"
        }]"#;
        let mut store = store();
        store.kv.set(REQUESTS_KEY, legacy).unwrap();

        store.load_at(2025);
        assert_eq!(store.next_request_number(2025).unwrap(), "8/2025");
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let mut store = store();
        let outcome = store.load_at(2025);
        let mut book = outcome.book;

        let mut draft =
            crate::models::RequestDraft::new("Dra. Helena Souza", Origin::Doctor);
        draft.set_day(crate::models::Day {
            date: "2025-01-10".parse().unwrap(),
            start_time: chrono::NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            day_type: crate::models::DayKind::Opening,
        });
        draft.add_agenda_type(AgendaKind::Convenio);
        let number = store.next_request_number(2025).unwrap();
        let req = draft.submit(number, chrono::Utc::now()).unwrap();
        let id = req.id;
        book.add(req);
        store.save(&book).unwrap();

        let reloaded = store.load_at(2025);
        assert_eq!(reloaded.book.len(), 1);
        let back = reloaded.book.get(&id).unwrap();
        assert_eq!(back.requester, "Dra. Helena Souza");
        assert_eq!(back.request_number.as_deref(), Some("1/2025"));
    }

    #[test]
    fn test_parse_request_number() {
        assert_eq!(parse_request_number("12/2025"), Some((12, 2025)));
        assert_eq!(parse_request_number(" 1/2024 "), Some((1, 2024)));
        assert_eq!(parse_request_number("garbage"), None);
        assert_eq!(parse_request_number("x/2024"), None);
    }
}
