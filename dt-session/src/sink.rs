use chrono::{DateTime, Local};
use dt_core::{AnswerRecord, RecordId, SessionId, TestVariant, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
    #[error("unknown record {0:?}")]
    UnknownRecord(RecordId),
}

/// Where a measured session's answers go.
pub trait AnswerSink {
    fn begin_session(
        &mut self,
        variant: TestVariant,
        started_at: DateTime<Local>,
        user: UserId,
    ) -> Result<SessionId, SinkError>;

    fn insert_answer(&mut self, record: AnswerRecord) -> Result<RecordId, SinkError>;

    /// Replaces a stored record in place.
    fn update_answer(&mut self, id: RecordId, record: AnswerRecord) -> Result<(), SinkError>;

    /// Drops a session and every answer recorded under it.
    fn discard_session(&mut self, session: SessionId) -> Result<(), SinkError>;
}

impl<S: AnswerSink + ?Sized> AnswerSink for Box<S> {
    fn begin_session(
        &mut self,
        variant: TestVariant,
        started_at: DateTime<Local>,
        user: UserId,
    ) -> Result<SessionId, SinkError> {
        (**self).begin_session(variant, started_at, user)
    }

    fn insert_answer(&mut self, record: AnswerRecord) -> Result<RecordId, SinkError> {
        (**self).insert_answer(record)
    }

    fn update_answer(&mut self, id: RecordId, record: AnswerRecord) -> Result<(), SinkError> {
        (**self).update_answer(id, record)
    }

    fn discard_session(&mut self, session: SessionId) -> Result<(), SinkError> {
        (**self).discard_session(session)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub id: SessionId,
    pub variant: TestVariant,
    pub started_at: String,
    pub user: UserId,
}

/// In-process answer store.
#[derive(Debug, Default)]
pub struct MemorySink {
    sessions: Vec<SessionEntry>,
    records: BTreeMap<RecordId, AnswerRecord>,
    updates: Vec<RecordId>,
    next_session: u64,
    next_record: u64,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self, id: SessionId) -> Option<&SessionEntry> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Records of one session in insertion order.
    pub fn records_for(&self, id: SessionId) -> Vec<AnswerRecord> {
        self.records
            .values()
            .filter(|r| r.session_id == id)
            .cloned()
            .collect()
    }

    pub fn record(&self, id: RecordId) -> Option<&AnswerRecord> {
        self.records.get(&id)
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Ids passed to `update_answer`, in call order.
    pub fn updates(&self) -> &[RecordId] {
        &self.updates
    }
}

impl AnswerSink for MemorySink {
    fn begin_session(
        &mut self,
        variant: TestVariant,
        started_at: DateTime<Local>,
        user: UserId,
    ) -> Result<SessionId, SinkError> {
        self.next_session += 1;
        let id = SessionId(self.next_session);
        self.sessions.push(SessionEntry {
            id,
            variant,
            started_at: started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            user,
        });
        Ok(id)
    }

    fn insert_answer(&mut self, record: AnswerRecord) -> Result<RecordId, SinkError> {
        if self.session(record.session_id).is_none() {
            return Err(SinkError::UnknownSession(record.session_id));
        }
        self.next_record += 1;
        let id = RecordId(self.next_record);
        self.records.insert(id, record);
        Ok(id)
    }

    fn update_answer(&mut self, id: RecordId, record: AnswerRecord) -> Result<(), SinkError> {
        let slot = self
            .records
            .get_mut(&id)
            .ok_or(SinkError::UnknownRecord(id))?;
        *slot = record;
        self.updates.push(id);
        Ok(())
    }

    fn discard_session(&mut self, session: SessionId) -> Result<(), SinkError> {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != session);
        if self.sessions.len() == before {
            return Err(SinkError::UnknownSession(session));
        }
        self.records.retain(|_, r| r.session_id != session);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dt_core::{Classification, Key};
    use std::time::Duration;

    fn record(session: SessionId, class: Classification) -> AnswerRecord {
        AnswerRecord::new(
            "red",
            Some(Key::Red),
            class,
            Duration::from_secs(1),
            Duration::from_millis(300),
            session,
        )
    }

    #[test]
    fn discard_removes_session_and_answers() {
        let mut sink = MemorySink::new();
        let keep = sink
            .begin_session(TestVariant::FormB, Local::now(), UserId(1))
            .unwrap();
        let drop = sink
            .begin_session(TestVariant::FormA, Local::now(), UserId(1))
            .unwrap();
        sink.insert_answer(record(keep, Classification::Correct)).unwrap();
        sink.insert_answer(record(drop, Classification::Missed)).unwrap();

        sink.discard_session(drop).unwrap();
        assert!(sink.session(drop).is_none());
        assert_eq!(sink.record_count(), 1);
        assert_eq!(sink.records_for(keep).len(), 1);
    }

    #[test]
    fn update_replaces_in_place() {
        let mut sink = MemorySink::new();
        let s = sink
            .begin_session(TestVariant::FormB, Local::now(), UserId(2))
            .unwrap();
        let id = sink.insert_answer(record(s, Classification::Missed)).unwrap();
        sink.update_answer(id, record(s, Classification::Late)).unwrap();
        assert_eq!(sink.record_count(), 1);
        assert_eq!(sink.record(id).unwrap().classification, Classification::Late);
        assert_eq!(sink.updates(), &[id]);
    }

    #[test]
    fn answers_need_a_live_session() {
        let mut sink = MemorySink::new();
        let err = sink
            .insert_answer(record(SessionId(9), Classification::Correct))
            .unwrap_err();
        assert!(matches!(err, SinkError::UnknownSession(SessionId(9))));
        assert!(matches!(
            sink.update_answer(RecordId(3), record(SessionId(9), Classification::Late)),
            Err(SinkError::UnknownRecord(_))
        ));
    }
}
