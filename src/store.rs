//! SQLite persistence for questions, answers and their votes.
//!
//! Every mutation that depends on an existing row runs its existence check
//! and its write inside one immediate transaction, so a concurrent delete
//! cannot slip in between the two.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rusqlite::{
    Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
    functions::FunctionFlags, params, params_from_iter,
};
use thiserror::Error;

use crate::{
    models::{AnswerId, AnswerView, Question, QuestionId, ResourceKind, VoteTarget},
    search::{FOLD, Predicate},
    validation::{AnswerInput, QuestionInput},
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS questions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        category TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS answers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        question_id INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
        content TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS question_votes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        question_id INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
        vote REAL NOT NULL
    );

    CREATE TABLE IF NOT EXISTS answer_votes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        answer_id INTEGER NOT NULL REFERENCES answers(id) ON DELETE CASCADE,
        vote REAL NOT NULL
    );

    CREATE INDEX IF NOT EXISTS answers_question_id ON answers(question_id);
    CREATE INDEX IF NOT EXISTS question_votes_question_id ON question_votes(question_id);
    CREATE INDEX IF NOT EXISTS answer_votes_answer_id ON answer_votes(answer_id);
"#;

const SELECT_QUESTIONS: &str = "SELECT id, title, description, category FROM questions";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("store connection lock poisoned")]
    Poisoned,
}

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `operation` on the blocking pool with exclusive use of the connection.
    pub async fn run<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            operation(&mut *conn).map_err(StoreError::from)
        })
        .await?
    }
}

pub fn init_db(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    register_fold(conn)?;
    conn.execute_batch(SCHEMA)
}

/// Unicode-aware lowercasing; SQLite's own `lower` and `LIKE` fold ASCII only.
fn register_fold(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.create_scalar_function(
        FOLD,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text = ctx.get::<Option<String>>(0)?;
            Ok(text.map(|text| text.to_lowercase()))
        },
    )
}

pub fn exists(conn: &Connection, kind: ResourceKind, id: i64) -> Result<bool, rusqlite::Error> {
    let sql = format!(
        "SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1",
        kind.table(),
        kind.key_column()
    );
    let found = conn
        .query_row(&sql, params![id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// Runs `write` only if a row of `kind` keyed by `id` exists.
fn guarded<T, F>(
    conn: &mut Connection,
    kind: ResourceKind,
    id: i64,
    write: F,
) -> Result<Option<T>, rusqlite::Error>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, rusqlite::Error>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if !exists(&tx, kind, id)? {
        return Ok(None);
    }
    let value = write(&tx)?;
    tx.commit()?;
    Ok(Some(value))
}

fn question_from_row(row: &Row<'_>) -> Result<Question, rusqlite::Error> {
    Ok(Question {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
    })
}

pub fn list_questions(conn: &Connection) -> Result<Vec<Question>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!("{SELECT_QUESTIONS} ORDER BY id"))?;
    let questions = stmt
        .query_map([], question_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(questions)
}

pub fn search_questions(
    conn: &Connection,
    predicate: &Predicate,
) -> Result<Vec<Question>, rusqlite::Error> {
    let sql = format!("{} ORDER BY id", predicate.apply(SELECT_QUESTIONS));
    let mut stmt = conn.prepare(&sql)?;
    let questions = stmt
        .query_map(params_from_iter(predicate.params.iter()), question_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(questions)
}

pub fn get_question(conn: &Connection, id: QuestionId) -> Result<Option<Question>, rusqlite::Error> {
    conn.query_row(
        &format!("{SELECT_QUESTIONS} WHERE id = ?1"),
        params![id],
        question_from_row,
    )
    .optional()
}

pub fn insert_question(
    conn: &Connection,
    question: &QuestionInput,
) -> Result<QuestionId, rusqlite::Error> {
    conn.execute(
        "INSERT INTO questions (title, description, category) VALUES (?1, ?2, ?3)",
        params![question.title, question.description, question.category],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_question(
    conn: &mut Connection,
    id: QuestionId,
    question: &QuestionInput,
) -> Result<Option<QuestionId>, rusqlite::Error> {
    guarded(conn, ResourceKind::Question, id, |tx| {
        tx.execute(
            "UPDATE questions SET title = ?2, description = ?3, category = ?4 WHERE id = ?1",
            params![id, question.title, question.description, question.category],
        )?;
        Ok(id)
    })
}

pub fn delete_question(
    conn: &mut Connection,
    id: QuestionId,
) -> Result<Option<QuestionId>, rusqlite::Error> {
    guarded(conn, ResourceKind::Question, id, |tx| {
        tx.execute("DELETE FROM questions WHERE id = ?1", params![id])?;
        Ok(id)
    })
}

pub fn list_answers(
    conn: &Connection,
    question_id: QuestionId,
) -> Result<Vec<AnswerView>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT questions.id, answers.content
         FROM questions
         INNER JOIN answers ON questions.id = answers.question_id
         WHERE questions.id = ?1
         ORDER BY answers.id",
    )?;
    let answers = stmt
        .query_map(params![question_id], |row| {
            Ok(AnswerView {
                id: row.get(0)?,
                content: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(answers)
}

pub fn insert_answer(
    conn: &mut Connection,
    question_id: QuestionId,
    answer: &AnswerInput,
) -> Result<Option<AnswerId>, rusqlite::Error> {
    guarded(conn, ResourceKind::Question, question_id, |tx| {
        append_answer(tx, question_id, answer)
    })
}

/// Inserts an answer row without checking the parent question.
pub fn append_answer(
    conn: &Connection,
    question_id: QuestionId,
    answer: &AnswerInput,
) -> Result<AnswerId, rusqlite::Error> {
    conn.execute(
        "INSERT INTO answers (question_id, content) VALUES (?1, ?2)",
        params![question_id, answer.content],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Appends a vote row without checking for earlier votes.
pub fn insert_vote(
    conn: &Connection,
    target: VoteTarget,
    id: i64,
    vote: f64,
) -> Result<i64, rusqlite::Error> {
    let kind = target.kind();
    let sql = format!(
        "INSERT INTO {} ({}, vote) VALUES (?1, ?2)",
        kind.table(),
        kind.key_column()
    );
    conn.execute(&sql, params![id, vote])?;
    Ok(conn.last_insert_rowid())
}

/// Appends a vote, but only for a target that already has a vote row.
pub fn record_vote(
    conn: &mut Connection,
    target: VoteTarget,
    id: i64,
    vote: f64,
) -> Result<Option<i64>, rusqlite::Error> {
    guarded(conn, target.kind(), id, |tx| insert_vote(tx, target, id, vote))
}

pub fn count_rows(conn: &Connection, kind: ResourceKind) -> Result<i64, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", kind.table()),
        [],
        |row| row.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchFilters;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        init_db(&conn).expect("init schema");
        conn
    }

    fn question(title: &str, description: &str, category: &str) -> QuestionInput {
        QuestionInput {
            title: title.to_string(),
            description: description.to_string(),
            category: category.to_string(),
        }
    }

    fn answer(content: &str) -> AnswerInput {
        AnswerInput {
            content: content.to_string(),
        }
    }

    #[test]
    fn inserted_question_reads_back() {
        let conn = open();
        let id = insert_question(&conn, &question("Q1", "D1", "C1")).unwrap();
        let stored = get_question(&conn, id).unwrap().expect("question exists");
        assert_eq!(
            stored,
            Question {
                id,
                title: "Q1".to_string(),
                description: "D1".to_string(),
                category: "C1".to_string(),
            }
        );
        assert_eq!(get_question(&conn, id + 1).unwrap(), None);
    }

    #[test]
    fn update_replaces_fields_and_keeps_id() {
        let mut conn = open();
        let id = insert_question(&conn, &question("Q1", "D1", "C1")).unwrap();
        let updated = update_question(&mut conn, id, &question("Q2", "D2", "C2")).unwrap();
        assert_eq!(updated, Some(id));
        let stored = get_question(&conn, id).unwrap().unwrap();
        assert_eq!(stored.title, "Q2");
        assert_eq!(stored.category, "C2");
    }

    #[test]
    fn guarded_writes_skip_missing_rows() {
        let mut conn = open();
        assert_eq!(update_question(&mut conn, 42, &question("Q", "D", "C")).unwrap(), None);
        assert_eq!(delete_question(&mut conn, 42).unwrap(), None);
        assert_eq!(insert_answer(&mut conn, 42, &answer("hi")).unwrap(), None);
        assert_eq!(count_rows(&conn, ResourceKind::Question).unwrap(), 0);
        assert_eq!(count_rows(&conn, ResourceKind::Answer).unwrap(), 0);
    }

    #[test]
    fn delete_cascades_to_answers_and_votes() {
        let mut conn = open();
        let id = insert_question(&conn, &question("Q1", "D1", "C1")).unwrap();
        let answer_id = insert_answer(&mut conn, id, &answer("A1")).unwrap().unwrap();
        insert_vote(&conn, VoteTarget::Question, id, 1.0).unwrap();
        insert_vote(&conn, VoteTarget::Answer, answer_id, -1.0).unwrap();

        assert_eq!(delete_question(&mut conn, id).unwrap(), Some(id));
        assert_eq!(count_rows(&conn, ResourceKind::Answer).unwrap(), 0);
        assert_eq!(count_rows(&conn, ResourceKind::QuestionVote).unwrap(), 0);
        assert_eq!(count_rows(&conn, ResourceKind::AnswerVote).unwrap(), 0);
    }

    #[test]
    fn answers_join_carries_question_id() {
        let mut conn = open();
        let id = insert_question(&conn, &question("Q1", "D1", "C1")).unwrap();
        assert!(list_answers(&conn, id).unwrap().is_empty());

        insert_answer(&mut conn, id, &answer("first")).unwrap();
        insert_answer(&mut conn, id, &answer("second")).unwrap();
        let answers = list_answers(&conn, id).unwrap();
        assert_eq!(
            answers,
            vec![
                AnswerView { id, content: "first".to_string() },
                AnswerView { id, content: "second".to_string() },
            ]
        );
    }

    #[test]
    fn votes_require_an_earlier_vote_row() {
        let mut conn = open();
        let id = insert_question(&conn, &question("Q1", "D1", "C1")).unwrap();

        assert_eq!(record_vote(&mut conn, VoteTarget::Question, id, 1.0).unwrap(), None);
        assert_eq!(count_rows(&conn, ResourceKind::QuestionVote).unwrap(), 0);

        insert_vote(&conn, VoteTarget::Question, id, 1.0).unwrap();
        assert!(record_vote(&mut conn, VoteTarget::Question, id, -1.0).unwrap().is_some());
        assert!(record_vote(&mut conn, VoteTarget::Question, id, 1.0).unwrap().is_some());
        assert_eq!(count_rows(&conn, ResourceKind::QuestionVote).unwrap(), 3);
    }

    #[test]
    fn search_composes_filters() {
        let conn = open();
        insert_question(&conn, &question("Borrow checker", "lifetimes", "rust")).unwrap();
        insert_question(&conn, &question("Indexes", "when does the BORROW happen", "sql")).unwrap();
        insert_question(&conn, &question("Joins", "inner vs outer", "SQL")).unwrap();
        insert_question(&conn, &question("Émigré visas", "paperwork", "Législation")).unwrap();

        let search = |title: Option<&str>, category: Option<&str>| {
            let filters = SearchFilters {
                title: title.map(str::to_string),
                category: category.map(str::to_string),
            };
            search_questions(&conn, &Predicate::build(&filters))
                .unwrap()
                .into_iter()
                .map(|question| question.title)
                .collect::<Vec<_>>()
        };

        assert_eq!(search(Some("borrow"), None), vec!["Borrow checker", "Indexes"]);
        assert_eq!(search(None, Some("sql")), vec!["Indexes", "Joins"]);
        assert_eq!(search(Some("borrow"), Some("sql")), vec!["Indexes"]);
        assert_eq!(search(None, None).len(), 4);
        assert_eq!(search(Some("émigré"), None), vec!["Émigré visas"]);
        assert_eq!(search(Some("ÉMIGRÉ"), None), vec!["Émigré visas"]);
        assert_eq!(search(None, Some("LÉGISLATION")), vec!["Émigré visas"]);
        assert!(search(Some("python"), None).is_empty());
    }

    #[tokio::test]
    async fn store_runs_operations_off_the_runtime() {
        let store = Store::open_in_memory().unwrap();
        let id = store
            .run(|conn| insert_question(conn, &question("Q1", "D1", "C1")))
            .await
            .unwrap();
        let questions = store.run(|conn| list_questions(conn)).await.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id, id);
    }
}
