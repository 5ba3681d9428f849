use forum::{
    models::VoteTarget,
    store::{self, init_db},
    validation::{AnswerInput, QuestionInput},
};
use rusqlite::Connection;
use std::env;
use std::fs;

const CATEGORIES: [&str; 5] = ["rust", "databases", "networking", "tooling", "testing"];
const TOPICS: [&str; 8] = [
    "lifetimes",
    "transactions",
    "async runtimes",
    "error handling",
    "indexes",
    "sockets",
    "build scripts",
    "property tests",
];

struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.state >> 32) as u32
    }

    fn gen_range(&mut self, max: u32) -> u32 {
        if max == 0 { 0 } else { self.next_u32() % max }
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.gen_range(items.len() as u32) as usize]
    }

    fn vote(&mut self) -> f64 {
        if self.gen_range(4) == 0 { -1.0 } else { 1.0 }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let db_path = env::var("FORUM_DB_PATH").unwrap_or_else(|_| "forum.sqlite3".to_string());
    let reset = env::var("SEED_RESET").ok().as_deref() == Some("true");
    if reset {
        remove_database(&db_path);
    }

    let num_questions: u32 = env_or("SEED_QUESTIONS", 200);
    let max_answers: u32 = env_or("SEED_ANSWERS", 4);
    let rng_seed: u64 = env_or("SEED_RANDOM", 42);

    let mut conn = Connection::open(&db_path)?;
    init_db(&conn)?;

    let mut rng = Lcg::new(rng_seed);
    let (questions, answers) = seed_forum(&mut conn, num_questions, max_answers, &mut rng)?;

    println!("Seeded questions={}, answers={}", questions, answers);
    Ok(())
}

/// WAL mode leaves `-wal` and `-shm` files beside the database; a stale
/// log would be replayed into the fresh file.
fn remove_database(db_path: &str) {
    for path in [db_path.to_string(), format!("{}-wal", db_path), format!("{}-shm", db_path)] {
        let _ = fs::remove_file(path);
    }
}

/// Every seeded question and answer gets one opening vote so that the
/// vote endpoints accept further votes for it.
fn seed_forum(
    conn: &mut Connection,
    num_questions: u32,
    max_answers: u32,
    rng: &mut Lcg,
) -> Result<(u32, u32), rusqlite::Error> {
    let mut total_answers = 0;
    let tx = conn.transaction()?;

    for i in 0..num_questions {
        let topic = rng.pick(&TOPICS);
        let question = QuestionInput {
            title: format!("Question {} about {}", i, topic),
            description: format!("How should {} be handled in practice?", topic),
            category: rng.pick(&CATEGORIES).to_string(),
        };
        let question_id = store::insert_question(&tx, &question)?;
        store::insert_vote(&tx, VoteTarget::Question, question_id, rng.vote())?;

        for j in 0..rng.gen_range(max_answers + 1) {
            let answer = AnswerInput {
                content: format!("Answer {} on {}: it depends on the workload.", j, topic),
            };
            let answer_id = store::append_answer(&tx, question_id, &answer)?;
            store::insert_vote(&tx, VoteTarget::Answer, answer_id, rng.vote())?;
            total_answers += 1;
        }
    }

    tx.commit()?;
    Ok((num_questions, total_answers))
}
