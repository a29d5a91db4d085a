use std::{collections::HashMap, error::Error, io::ErrorKind, path::PathBuf};

use tokio::{fs, sync::Mutex};

use super::question::{QuizQuestion, UserStats, DEFAULT_CATEGORY};

pub type StoreResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// Telegram quiz polls accept between 2 and 10 options.
const MAX_OPTIONS: usize = 10;

/// Flat-file storage: a JSON array of questions and a JSON object of per-user
/// stats. Every mutation re-reads the whole file, applies the change and
/// overwrites the whole file; the mutex serializes all file access, readers
/// included, so no session can observe or drop another's half-written file.
pub struct JsonStorage {
    questions_path: PathBuf,
    users_path: PathBuf,
    lock: Mutex<()>,
}

impl JsonStorage {
    pub async fn open(data_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = data_dir.into();
        fs::create_dir_all(&dir).await?;

        let storage = Self {
            questions_path: dir.join("questions.json"),
            users_path: dir.join("users.json"),
            lock: Mutex::new(()),
        };

        if !storage.questions_path.exists() {
            storage.save_questions(&seed_questions()).await?;
            log::info!(
                "Seeded question store at {}",
                storage.questions_path.display()
            );
        }

        Ok(storage)
    }

    async fn load_questions(&self) -> StoreResult<Vec<QuizQuestion>> {
        match fs::read_to_string(&self.questions_path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_questions(&self, questions: &[QuizQuestion]) -> StoreResult<()> {
        let raw = serde_json::to_string_pretty(questions)?;
        fs::write(&self.questions_path, raw).await?;
        log::info!("Saved {} questions", questions.len());
        Ok(())
    }

    async fn load_users(&self) -> StoreResult<HashMap<String, UserStats>> {
        match fs::read_to_string(&self.users_path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_users(&self, users: &HashMap<String, UserStats>) -> StoreResult<()> {
        let raw = serde_json::to_string_pretty(users)?;
        fs::write(&self.users_path, raw).await?;
        Ok(())
    }

    pub async fn list_all(&self) -> StoreResult<Vec<QuizQuestion>> {
        let _guard = self.lock.lock().await;
        self.load_questions().await
    }

    pub async fn get(&self, id: u32) -> StoreResult<Option<QuizQuestion>> {
        let _guard = self.lock.lock().await;
        Ok(self.load_questions().await?.into_iter().find(|q| q.id == id))
    }

    pub async fn replace_all(&self, questions: Vec<QuizQuestion>) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        self.save_questions(&questions).await
    }

    /// Recomputed from the current contents on every call. Deleted ids leave
    /// gaps that are never reused.
    pub async fn next_id(&self) -> StoreResult<u32> {
        let _guard = self.lock.lock().await;
        Ok(next_id_from(&self.load_questions().await?))
    }
}

fn next_id_from(questions: &[QuizQuestion]) -> u32 {
    questions.iter().map(|q| q.id).max().map_or(1, |max| max + 1)
}

fn seed_questions() -> Vec<QuizQuestion> {
    vec![
        QuizQuestion {
            id: 1,
            question: "What is the capital of France?".to_owned(),
            options: vec![
                "Berlin".to_owned(),
                "Madrid".to_owned(),
                "Paris".to_owned(),
                "Rome".to_owned(),
            ],
            answer: 2,
            category: "Geography".to_owned(),
        },
        QuizQuestion {
            id: 2,
            question: "Which planet is known as the Red Planet?".to_owned(),
            options: vec![
                "Venus".to_owned(),
                "Mars".to_owned(),
                "Jupiter".to_owned(),
                "Saturn".to_owned(),
            ],
            answer: 1,
            category: "Science".to_owned(),
        },
    ]
}

pub trait RetrieveQuestions {
    async fn all_questions(&self) -> StoreResult<Vec<QuizQuestion>>;

    async fn question(&self, id: u32) -> StoreResult<Option<QuizQuestion>>;
}

pub trait CreateQuestion {
    async fn create_question(
        &self,
        question: String,
        options: Vec<String>,
        answer: usize,
        category: &str,
    ) -> StoreResult<QuizQuestion>;
}

pub trait EditQuestion {
    async fn edit_text(&self, id: u32, new: String) -> StoreResult<Option<QuizQuestion>>;

    async fn edit_options(&self, id: u32, options: Vec<String>)
        -> StoreResult<Option<QuizQuestion>>;

    async fn edit_answer(&self, id: u32, answer: usize) -> StoreResult<Option<QuizQuestion>>;
}

pub trait DeleteQuestion {
    async fn delete_question(&self, id: u32) -> StoreResult<bool>;
}

pub trait RecordAnswer {
    async fn record_answer(&self, user_id: &str, name: &str, correct: bool)
        -> StoreResult<UserStats>;
}

pub trait RetrieveStats {
    async fn user_stats(&self, user_id: &str) -> StoreResult<Option<UserStats>>;
}

impl RetrieveQuestions for JsonStorage {
    async fn all_questions(&self) -> StoreResult<Vec<QuizQuestion>> {
        self.list_all().await
    }

    async fn question(&self, id: u32) -> StoreResult<Option<QuizQuestion>> {
        self.get(id).await
    }
}

impl CreateQuestion for JsonStorage {
    async fn create_question(
        &self,
        question: String,
        options: Vec<String>,
        answer: usize,
        category: &str,
    ) -> StoreResult<QuizQuestion> {
        if options.len() < 2 {
            return Err("a question needs at least 2 options".into());
        }
        if options.len() > MAX_OPTIONS {
            return Err("a question can have at most 10 options".into());
        }
        if answer >= options.len() {
            return Err("correct answer index out of range".into());
        }

        let _guard = self.lock.lock().await;
        let mut questions = self.load_questions().await?;
        let record = QuizQuestion {
            id: next_id_from(&questions),
            question,
            options,
            answer,
            category: if category.is_empty() {
                DEFAULT_CATEGORY.to_owned()
            } else {
                category.to_owned()
            },
        };
        questions.push(record.clone());
        self.save_questions(&questions).await?;

        Ok(record)
    }
}

impl EditQuestion for JsonStorage {
    async fn edit_text(&self, id: u32, new: String) -> StoreResult<Option<QuizQuestion>> {
        let _guard = self.lock.lock().await;
        let mut questions = self.load_questions().await?;
        let Some(record) = questions.iter_mut().find(|q| q.id == id) else {
            return Ok(None);
        };
        record.question = new;
        let updated = record.clone();
        self.save_questions(&questions).await?;
        Ok(Some(updated))
    }

    async fn edit_options(
        &self,
        id: u32,
        options: Vec<String>,
    ) -> StoreResult<Option<QuizQuestion>> {
        if options.len() < 2 {
            return Err("a question needs at least 2 options".into());
        }
        if options.len() > MAX_OPTIONS {
            return Err("a question can have at most 10 options".into());
        }

        let _guard = self.lock.lock().await;
        let mut questions = self.load_questions().await?;
        let Some(record) = questions.iter_mut().find(|q| q.id == id) else {
            return Ok(None);
        };
        record.options = options;
        // Documented policy: when the old correct index no longer fits the
        // new options, fall back to the first option.
        if record.answer >= record.options.len() {
            record.answer = 0;
        }
        let updated = record.clone();
        self.save_questions(&questions).await?;
        Ok(Some(updated))
    }

    async fn edit_answer(&self, id: u32, answer: usize) -> StoreResult<Option<QuizQuestion>> {
        let _guard = self.lock.lock().await;
        let mut questions = self.load_questions().await?;
        let Some(record) = questions.iter_mut().find(|q| q.id == id) else {
            return Ok(None);
        };
        if answer >= record.options.len() {
            return Err("correct answer index out of range".into());
        }
        record.answer = answer;
        let updated = record.clone();
        self.save_questions(&questions).await?;
        Ok(Some(updated))
    }
}

impl DeleteQuestion for JsonStorage {
    async fn delete_question(&self, id: u32) -> StoreResult<bool> {
        let _guard = self.lock.lock().await;
        let mut questions = self.load_questions().await?;
        let before = questions.len();
        questions.retain(|q| q.id != id);
        if questions.len() == before {
            return Ok(false);
        }
        self.save_questions(&questions).await?;
        Ok(true)
    }
}

impl RecordAnswer for JsonStorage {
    async fn record_answer(
        &self,
        user_id: &str,
        name: &str,
        correct: bool,
    ) -> StoreResult<UserStats> {
        let _guard = self.lock.lock().await;
        let mut users = self.load_users().await?;
        let entry = users.entry(user_id.to_owned()).or_insert(UserStats {
            name: name.to_owned(),
            correct: 0,
            total: 0,
        });
        entry.name = name.to_owned();
        entry.total += 1;
        if correct {
            entry.correct += 1;
        }
        let updated = entry.clone();
        self.save_users(&users).await?;
        Ok(updated)
    }
}

impl RetrieveStats for JsonStorage {
    async fn user_stats(&self, user_id: &str) -> StoreResult<Option<UserStats>> {
        let _guard = self.lock.lock().await;
        Ok(self.load_users().await?.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::super::question::USER_CREATED_CATEGORY;
    use super::*;
    use tempfile::tempdir;

    fn sample(id: u32) -> QuizQuestion {
        QuizQuestion {
            id,
            question: format!("question {id}"),
            options: vec!["a".to_owned(), "b".to_owned(), "c".to_owned()],
            answer: 2,
            category: DEFAULT_CATEGORY.to_owned(),
        }
    }

    async fn open_empty(dir: &std::path::Path) -> JsonStorage {
        let storage = JsonStorage::open(dir).await.unwrap();
        storage.replace_all(Vec::new()).await.unwrap();
        storage
    }

    #[tokio::test]
    async fn first_open_seeds_two_questions() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::open(dir.path()).await.unwrap();

        let questions = storage.list_all().await.unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].options[questions[0].answer], "Paris");
        assert_eq!(questions[1].options[questions[1].answer], "Mars");
    }

    #[tokio::test]
    async fn reopening_keeps_existing_contents() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::open(dir.path()).await.unwrap();
        storage.replace_all(vec![sample(9)]).await.unwrap();

        let reopened = JsonStorage::open(dir.path()).await.unwrap();
        assert_eq!(reopened.list_all().await.unwrap(), vec![sample(9)]);
    }

    #[tokio::test]
    async fn next_id_is_one_on_an_empty_store() {
        let dir = tempdir().unwrap();
        let storage = open_empty(dir.path()).await;
        assert_eq!(storage.next_id().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn next_id_never_reuses_deleted_ids() {
        let dir = tempdir().unwrap();
        let storage = open_empty(dir.path()).await;
        storage
            .replace_all(vec![sample(1), sample(2), sample(5)])
            .await
            .unwrap();
        assert_eq!(storage.next_id().await.unwrap(), 6);

        assert!(storage.delete_question(5).await.unwrap());
        assert_eq!(storage.next_id().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn replace_all_round_trips() {
        let dir = tempdir().unwrap();
        let storage = open_empty(dir.path()).await;
        let questions = vec![sample(1), sample(4)];
        storage.replace_all(questions.clone()).await.unwrap();
        let loaded = storage.list_all().await.unwrap();
        storage.replace_all(loaded).await.unwrap();
        assert_eq!(storage.list_all().await.unwrap(), questions);
    }

    #[tokio::test]
    async fn create_question_allocates_the_next_id() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::open(dir.path()).await.unwrap();
        let previous_max = storage.next_id().await.unwrap() - 1;

        let created = storage
            .create_question(
                "What is 2+2?".to_owned(),
                vec!["3".to_owned(), "4".to_owned(), "5".to_owned()],
                1,
                USER_CREATED_CATEGORY,
            )
            .await
            .unwrap();

        assert_eq!(created.id, previous_max + 1);
        let stored = storage.get(created.id).await.unwrap().unwrap();
        assert_eq!(stored.question, "What is 2+2?");
        assert_eq!(stored.options, vec!["3", "4", "5"]);
        assert_eq!(stored.answer, 1);
        assert_eq!(stored.category, USER_CREATED_CATEGORY);
    }

    #[tokio::test]
    async fn create_question_rejects_a_single_option() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::open(dir.path()).await.unwrap();
        let result = storage
            .create_question("q".to_owned(), vec!["only".to_owned()], 0, "General")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn create_question_rejects_more_options_than_a_poll_allows() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::open(dir.path()).await.unwrap();
        let options: Vec<String> = (0..11).map(|i| i.to_string()).collect();
        let result = storage
            .create_question("q".to_owned(), options, 0, "General")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn edit_options_rejects_more_options_than_a_poll_allows() {
        let dir = tempdir().unwrap();
        let storage = open_empty(dir.path()).await;
        storage.replace_all(vec![sample(1)]).await.unwrap();

        let options: Vec<String> = (0..11).map(|i| i.to_string()).collect();
        assert!(storage.edit_options(1, options).await.is_err());
        assert_eq!(storage.get(1).await.unwrap().unwrap().options.len(), 3);
    }

    #[tokio::test]
    async fn edit_options_resets_an_out_of_range_answer() {
        let dir = tempdir().unwrap();
        let storage = open_empty(dir.path()).await;
        storage.replace_all(vec![sample(1)]).await.unwrap();

        let updated = storage
            .edit_options(1, vec!["x".to_owned(), "y".to_owned()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.answer, 0);
        assert_eq!(storage.get(1).await.unwrap().unwrap().answer, 0);
    }

    #[tokio::test]
    async fn edit_options_keeps_an_answer_that_still_fits() {
        let dir = tempdir().unwrap();
        let storage = open_empty(dir.path()).await;
        storage.replace_all(vec![sample(1)]).await.unwrap();

        let updated = storage
            .edit_options(
                1,
                vec!["x".to_owned(), "y".to_owned(), "z".to_owned(), "w".to_owned()],
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.answer, 2);
    }

    #[tokio::test]
    async fn edit_answer_rejects_an_out_of_range_index() {
        let dir = tempdir().unwrap();
        let storage = open_empty(dir.path()).await;
        storage.replace_all(vec![sample(1)]).await.unwrap();

        assert!(storage.edit_answer(1, 3).await.is_err());
        assert_eq!(storage.get(1).await.unwrap().unwrap().answer, 2);
    }

    #[tokio::test]
    async fn edits_report_unknown_ids() {
        let dir = tempdir().unwrap();
        let storage = open_empty(dir.path()).await;
        assert!(storage.edit_text(42, "new".to_owned()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_of_a_missing_id_leaves_the_store_unchanged() {
        let dir = tempdir().unwrap();
        let storage = open_empty(dir.path()).await;
        storage.replace_all(vec![sample(1), sample(2)]).await.unwrap();

        assert!(!storage.delete_question(99).await.unwrap());
        assert_eq!(storage.list_all().await.unwrap().len(), 2);

        assert!(storage.delete_question(2).await.unwrap());
        assert_eq!(storage.list_all().await.unwrap().len(), 1);
        assert!(storage.get(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_edits_of_different_questions_both_persist() {
        let dir = tempdir().unwrap();
        let storage = std::sync::Arc::new(open_empty(dir.path()).await);
        storage.replace_all(vec![sample(1), sample(2)]).await.unwrap();

        let first = {
            let storage = storage.clone();
            tokio::spawn(async move { storage.edit_text(1, "first".to_owned()).await })
        };
        let second = {
            let storage = storage.clone();
            tokio::spawn(async move { storage.edit_text(2, "second".to_owned()).await })
        };
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(storage.get(1).await.unwrap().unwrap().question, "first");
        assert_eq!(storage.get(2).await.unwrap().unwrap().question, "second");
    }

    #[tokio::test]
    async fn reads_racing_a_writer_never_observe_a_torn_file() {
        let dir = tempdir().unwrap();
        let storage = std::sync::Arc::new(open_empty(dir.path()).await);
        storage.replace_all(vec![sample(1)]).await.unwrap();

        let writer = {
            let storage = storage.clone();
            tokio::spawn(async move {
                for i in 0..20 {
                    storage.edit_text(1, format!("text {i}")).await.unwrap();
                }
            })
        };
        let reader = {
            let storage = storage.clone();
            tokio::spawn(async move {
                for _ in 0..20 {
                    // Every read parses cleanly and sees a whole collection.
                    assert_eq!(storage.list_all().await.unwrap().len(), 1);
                }
            })
        };
        writer.await.unwrap();
        reader.await.unwrap();
    }

    #[tokio::test]
    async fn record_answer_tracks_totals_and_correct_counts() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::open(dir.path()).await.unwrap();

        let stats = storage.record_answer("100", "Ada", true).await.unwrap();
        assert_eq!((stats.correct, stats.total), (1, 1));

        let stats = storage.record_answer("100", "Ada", false).await.unwrap();
        assert_eq!((stats.correct, stats.total), (1, 2));
        assert!(stats.total >= stats.correct);

        let loaded = storage.user_stats("100").await.unwrap().unwrap();
        assert_eq!(loaded, stats);
        assert!(storage.user_stats("200").await.unwrap().is_none());
    }
}
