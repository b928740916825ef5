use std::path::{Path, PathBuf};

use sqlx::{migrate::MigrateDatabase, Pool, Sqlite, SqlitePool};

use log::{error, info};

use crate::fact::Fact;
use crate::habit::Habit;
use crate::journal::{Journal, JournalUpdate};
use crate::mood::Mood;
use crate::payment::Payment;
use crate::sleep::Sleep;
use crate::time::Timestamp;
use crate::user::{ProfileUpdate, User};

type Result<T> = std::result::Result<T, ()>;

#[derive(Debug)]
pub enum FindError {
    NotFound,
    Internal,
}

#[derive(Debug)]
pub enum InsertError {
    Duplicate,
    Internal,
}

/// Handle on the durable store. Constructed once in `main` and passed
/// into the service - nothing else owns a connection.
pub struct Backend(pub Pool<Sqlite>);

fn into_db(path: &Path) -> PathBuf {
    path.join("heal.db")
}

async fn init(data_dir: &Path) {
    let final_path = format!(
        "sqlite://{}",
        into_db(data_dir).to_str().expect("non utf-8 data")
    );
    match Sqlite::create_database(&final_path).await {
        Ok(()) => {
            info!("Using {}", &final_path);
        }
        Err(e) => {
            let sqlx::Error::Database(db_err) = e else {
                panic!("error creating database: {e}");
            };

            panic!("sql db error: {db_err:?}");
        }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed")
    )
}

impl Backend {
    pub async fn new(data_dir: &Path) -> Self {
        let db_pathbuf = into_db(data_dir);
        let db_path = db_pathbuf.to_str().expect("non utf-8 data");
        let pool = match SqlitePool::connect(db_path).await {
            Ok(pool) => pool,
            Err(_err) => {
                init(data_dir).await;
                SqlitePool::connect(db_path).await.expect("db connection")
            }
        };

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("migration");

        Self(pool)
    }
}

impl Backend {
    pub async fn create_user(&self, user: &User) -> std::result::Result<(), InsertError> {
        sqlx::query(
            "
            INSERT INTO users
            (id, username, email, pwhash, salt, display_name, created)
            VALUES
            (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.pwhash)
        .bind(&user.salt)
        .bind(&user.display_name)
        .bind(user.created)
        .execute(&self.0)
        .await
        .map(|_| ())
        .map_err(|e| {
            if is_unique_violation(&e) {
                InsertError::Duplicate
            } else {
                error!("error inserting user: {e:?}");
                InsertError::Internal
            }
        })
    }

    pub async fn find_user(&self, username: &str) -> std::result::Result<User, FindError> {
        sqlx::query_as::<_, User>(
            "
            SELECT *
            FROM users
            WHERE username = ?
            ",
        )
        .bind(username)
        .fetch_one(&self.0)
        .await
        .map_err(|e| {
            if matches!(e, sqlx::Error::RowNotFound) {
                FindError::NotFound
            } else {
                error!("error selecting user: {e:?}");
                FindError::Internal
            }
        })
    }

    pub async fn find_user_by_id(&self, id: &str) -> std::result::Result<User, FindError> {
        sqlx::query_as::<_, User>(
            "
            SELECT *
            FROM users
            WHERE id = ?
            ",
        )
        .bind(id)
        .fetch_one(&self.0)
        .await
        .map_err(|e| {
            if matches!(e, sqlx::Error::RowNotFound) {
                FindError::NotFound
            } else {
                error!("error selecting user by id: {e:?}");
                FindError::Internal
            }
        })
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> std::result::Result<(), InsertError> {
        sqlx::query(
            "
            UPDATE users
            SET display_name = coalesce(?, display_name),
                email = coalesce(?, email)
            WHERE id = ?
            ",
        )
        .bind(&update.display_name)
        .bind(&update.email)
        .bind(user_id)
        .execute(&self.0)
        .await
        .map(|_| ())
        .map_err(|e| {
            if is_unique_violation(&e) {
                InsertError::Duplicate
            } else {
                error!("error updating profile: {e:?}");
                InsertError::Internal
            }
        })
    }
}

impl Backend {
    pub async fn moods(&self, user_id: &str) -> Result<Vec<Mood>> {
        sqlx::query_as::<_, Mood>(
            "
            SELECT *
            FROM moods
            WHERE user_id = ?
            ORDER BY created DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting moods: {e:?}");
        })
    }

    pub async fn latest_mood(&self, user_id: &str) -> Result<Option<Mood>> {
        sqlx::query_as::<_, Mood>(
            "
            SELECT *
            FROM moods
            WHERE user_id = ?
            ORDER BY created DESC
            LIMIT 1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting latest mood: {e:?}");
        })
    }

    pub async fn insert_mood(&self, mood: &Mood) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO moods
            (id, user_id, mood, note, created)
            VALUES
            (?, ?, ?, ?, ?)
            ",
        )
        .bind(&mood.id)
        .bind(&mood.user_id)
        .bind(&mood.mood)
        .bind(&mood.note)
        .bind(mood.created)
        .execute(&self.0)
        .await
        .map(|_| ())
        .map_err(|e| {
            error!("error inserting mood: {e:?}");
        })
    }

    pub async fn delete_mood(&self, user_id: &str, id: &str) -> Result<bool> {
        sqlx::query(
            "
            DELETE FROM moods
            WHERE user_id = ? AND id = ?
            ",
        )
        .bind(user_id)
        .bind(id)
        .execute(&self.0)
        .await
        .map(|done| done.rows_affected() > 0)
        .map_err(|e| {
            error!("error deleting mood: {e:?}");
        })
    }
}

impl Backend {
    pub async fn journals(&self, user_id: &str) -> Result<Vec<Journal>> {
        sqlx::query_as::<_, Journal>(
            "
            SELECT *
            FROM journals
            WHERE user_id = ?
            ORDER BY created DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting journals: {e:?}");
        })
    }

    pub async fn journal(&self, user_id: &str, id: &str) -> std::result::Result<Journal, FindError> {
        sqlx::query_as::<_, Journal>(
            "
            SELECT *
            FROM journals
            WHERE user_id = ? AND id = ?
            ",
        )
        .bind(user_id)
        .bind(id)
        .fetch_one(&self.0)
        .await
        .map_err(|e| {
            if matches!(e, sqlx::Error::RowNotFound) {
                FindError::NotFound
            } else {
                error!("error selecting journal: {e:?}");
                FindError::Internal
            }
        })
    }

    pub async fn insert_journal(&self, journal: &Journal) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO journals
            (id, user_id, title, content, created, updated)
            VALUES
            (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&journal.id)
        .bind(&journal.user_id)
        .bind(&journal.title)
        .bind(&journal.content)
        .bind(journal.created)
        .bind(journal.updated)
        .execute(&self.0)
        .await
        .map(|_| ())
        .map_err(|e| {
            error!("error inserting journal: {e:?}");
        })
    }

    pub async fn update_journal(
        &self,
        user_id: &str,
        id: &str,
        update: &JournalUpdate,
        now: Timestamp,
    ) -> Result<bool> {
        sqlx::query(
            "
            UPDATE journals
            SET title = coalesce(?, title),
                content = coalesce(?, content),
                updated = ?
            WHERE user_id = ? AND id = ?
            ",
        )
        .bind(&update.title)
        .bind(&update.content)
        .bind(now)
        .bind(user_id)
        .bind(id)
        .execute(&self.0)
        .await
        .map(|done| done.rows_affected() > 0)
        .map_err(|e| {
            error!("error updating journal: {e:?}");
        })
    }

    pub async fn delete_journal(&self, user_id: &str, id: &str) -> Result<bool> {
        sqlx::query(
            "
            DELETE FROM journals
            WHERE user_id = ? AND id = ?
            ",
        )
        .bind(user_id)
        .bind(id)
        .execute(&self.0)
        .await
        .map(|done| done.rows_affected() > 0)
        .map_err(|e| {
            error!("error deleting journal: {e:?}");
        })
    }
}

impl Backend {
    pub async fn habits(&self, user_id: &str) -> Result<Vec<Habit>> {
        sqlx::query_as::<_, Habit>(
            "
            SELECT *
            FROM habits
            WHERE user_id = ?
            ORDER BY created DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting habits: {e:?}");
        })
    }

    pub async fn habit(&self, user_id: &str, id: &str) -> std::result::Result<Habit, FindError> {
        sqlx::query_as::<_, Habit>(
            "
            SELECT *
            FROM habits
            WHERE user_id = ? AND id = ?
            ",
        )
        .bind(user_id)
        .bind(id)
        .fetch_one(&self.0)
        .await
        .map_err(|e| {
            if matches!(e, sqlx::Error::RowNotFound) {
                FindError::NotFound
            } else {
                error!("error selecting habit: {e:?}");
                FindError::Internal
            }
        })
    }

    pub async fn insert_habit(&self, habit: &Habit) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO habits
            (id, user_id, name, frequency, streak, last_done, created)
            VALUES
            (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&habit.id)
        .bind(&habit.user_id)
        .bind(&habit.name)
        .bind(habit.frequency)
        .bind(habit.streak)
        .bind(habit.last_done)
        .bind(habit.created)
        .execute(&self.0)
        .await
        .map(|_| ())
        .map_err(|e| {
            error!("error inserting habit: {e:?}");
        })
    }

    pub async fn tick_habit(&self, user_id: &str, id: &str, now: Timestamp) -> Result<bool> {
        sqlx::query(
            "
            UPDATE habits
            SET streak = streak + 1,
                last_done = ?
            WHERE user_id = ? AND id = ?
            ",
        )
        .bind(now)
        .bind(user_id)
        .bind(id)
        .execute(&self.0)
        .await
        .map(|done| done.rows_affected() > 0)
        .map_err(|e| {
            error!("error ticking habit: {e:?}");
        })
    }

    pub async fn delete_habit(&self, user_id: &str, id: &str) -> Result<bool> {
        sqlx::query(
            "
            DELETE FROM habits
            WHERE user_id = ? AND id = ?
            ",
        )
        .bind(user_id)
        .bind(id)
        .execute(&self.0)
        .await
        .map(|done| done.rows_affected() > 0)
        .map_err(|e| {
            error!("error deleting habit: {e:?}");
        })
    }
}

impl Backend {
    pub async fn sleeps(&self, user_id: &str) -> Result<Vec<Sleep>> {
        sqlx::query_as::<_, Sleep>(
            "
            SELECT *
            FROM sleeps
            WHERE user_id = ?
            ORDER BY started DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting sleeps: {e:?}");
        })
    }

    pub async fn latest_sleep(&self, user_id: &str) -> Result<Option<Sleep>> {
        sqlx::query_as::<_, Sleep>(
            "
            SELECT *
            FROM sleeps
            WHERE user_id = ?
            ORDER BY started DESC
            LIMIT 1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting latest sleep: {e:?}");
        })
    }

    pub async fn insert_sleep(&self, sleep: &Sleep) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO sleeps
            (id, user_id, started, ended, quality, note)
            VALUES
            (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&sleep.id)
        .bind(&sleep.user_id)
        .bind(sleep.started)
        .bind(sleep.ended)
        .bind(sleep.quality)
        .bind(&sleep.note)
        .execute(&self.0)
        .await
        .map(|_| ())
        .map_err(|e| {
            error!("error inserting sleep: {e:?}");
        })
    }

    pub async fn delete_sleep(&self, user_id: &str, id: &str) -> Result<bool> {
        sqlx::query(
            "
            DELETE FROM sleeps
            WHERE user_id = ? AND id = ?
            ",
        )
        .bind(user_id)
        .bind(id)
        .execute(&self.0)
        .await
        .map(|done| done.rows_affected() > 0)
        .map_err(|e| {
            error!("error deleting sleep: {e:?}");
        })
    }
}

impl Backend {
    pub async fn facts(&self) -> Result<Vec<Fact>> {
        sqlx::query_as::<_, Fact>(
            "
            SELECT *
            FROM facts
            ORDER BY category, id
            ",
        )
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting facts: {e:?}");
        })
    }

    pub async fn random_fact(&self) -> Result<Option<Fact>> {
        sqlx::query_as::<_, Fact>(
            "
            SELECT *
            FROM facts
            ORDER BY RANDOM()
            LIMIT 1
            ",
        )
        .fetch_optional(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting random fact: {e:?}");
        })
    }

    pub async fn fact_count(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM facts")
            .fetch_one(&self.0)
            .await
            .map_err(|e| {
                error!("error counting facts: {e:?}");
            })
    }

    pub async fn insert_fact(&self, fact: &Fact) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO facts
            (id, category, text)
            VALUES
            (?, ?, ?)
            ",
        )
        .bind(&fact.id)
        .bind(&fact.category)
        .bind(&fact.text)
        .execute(&self.0)
        .await
        .map(|_| ())
        .map_err(|e| {
            error!("error inserting fact: {e:?}");
        })
    }
}

impl Backend {
    pub async fn payments(&self, user_id: &str) -> Result<Vec<Payment>> {
        sqlx::query_as::<_, Payment>(
            "
            SELECT *
            FROM payments
            WHERE user_id = ?
            ORDER BY created DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting payments: {e:?}");
        })
    }

    pub async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO payments
            (id, user_id, amount, currency, status, created)
            VALUES
            (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&payment.id)
        .bind(&payment.user_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.status)
        .bind(payment.created)
        .execute(&self.0)
        .await
        .map(|_| ())
        .map_err(|e| {
            error!("error inserting payment: {e:?}");
        })
    }
}

impl Backend {
    pub async fn count_for(&self, table: Table, user_id: &str) -> Result<i64> {
        let sql = match table {
            Table::Moods => "SELECT COUNT(*) FROM moods WHERE user_id = ?",
            Table::Journals => "SELECT COUNT(*) FROM journals WHERE user_id = ?",
            Table::Habits => "SELECT COUNT(*) FROM habits WHERE user_id = ?",
            Table::Sleeps => "SELECT COUNT(*) FROM sleeps WHERE user_id = ?",
        };

        sqlx::query_scalar::<_, i64>(sql)
            .bind(user_id)
            .fetch_one(&self.0)
            .await
            .map_err(|e| {
                error!("error counting rows: {e:?}");
            })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Table {
    Moods,
    Journals,
    Habits,
    Sleeps,
}

#[cfg(test)]
pub mod test {
    use sqlx::{migrate::MigrateDatabase, Pool, Sqlite, SqlitePool};

    pub async fn create_db() -> Pool<Sqlite> {
        let url = ":memory:";

        Sqlite::create_database(url).await.unwrap();

        let db = SqlitePool::connect(url).await.unwrap();

        sqlx::migrate!("./migrations").run(&db).await.unwrap();

        db
    }
}
