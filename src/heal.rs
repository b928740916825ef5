use std::{result, sync::Arc};

use log::{debug, error, info, trace};
use uuid::Uuid;
use warp::http;

use crate::auth::{self, Signin, Signup};
use crate::backend::{Backend, FindError, InsertError, Table};
use crate::fact::{Fact, SEED_FACTS};
use crate::habit::{Habit, HabitCreate};
use crate::journal::{Journal, JournalCreate, JournalUpdate};
use crate::mood::{Mood, MoodCreate};
use crate::overview::Overview;
use crate::payment::{Payment, PaymentCreate, PaymentStatus};
use crate::sleep::{Sleep, SleepCreate};
use crate::time::Timestamp;
use crate::token::TokenKey;
use crate::user::{Profile, ProfileUpdate, User};

pub struct Heal {
    backend: Backend,
    key: TokenKey,
}

/// A request that made it past session verification. Every private
/// operation lives here, so none of them can run without a resolved
/// identity.
pub struct HealAuthed {
    heal: Arc<Heal>,
    user: User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Validation,
    InvalidCredentials,
    Unauthorized,
    NotFound,
    Conflict,
    Internal,
}

pub type Result<T> = result::Result<T, Error>;

impl Into<http::StatusCode> for Error {
    fn into(self) -> http::StatusCode {
        match self {
            Self::Validation => http::StatusCode::BAD_REQUEST,
            Self::InvalidCredentials => http::StatusCode::UNAUTHORIZED,
            Self::Unauthorized => http::StatusCode::UNAUTHORIZED,
            Self::NotFound => http::StatusCode::NOT_FOUND,
            Self::Conflict => http::StatusCode::CONFLICT,
            Self::Internal => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Error {
    pub fn kind(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Validation => "missing or malformed fields",
            // identical wording for unknown user and wrong password
            Self::InvalidCredentials => "invalid credentials",
            Self::Unauthorized => "a valid session is required",
            Self::NotFound => "no such resource",
            Self::Conflict => "username or email already taken",
            Self::Internal => "internal error",
        }
    }
}

impl warp::reject::Reject for Error {}

fn now() -> Result<Timestamp> {
    Timestamp::now().map_err(|()| Error::Internal)
}

impl Heal {
    pub fn new(backend: Backend, key: TokenKey) -> Self {
        Self { backend, key }
    }

    pub async fn signup(&self, req: Signup) -> Result<()> {
        req.validate()?;

        let salt = auth::new_salt();
        let user = User {
            id: Uuid::new_v4().to_string(),
            pwhash: auth::hash_password(&salt, &req.password),
            salt,
            username: req.username,
            email: req.email,
            display_name: req.display_name,
            created: now()?,
        };

        self.backend.create_user(&user).await.map_err(|e| match e {
            InsertError::Duplicate => {
                info!("rejecting signup for {}: already taken", user.username);
                Error::Conflict
            }
            InsertError::Internal => Error::Internal,
        })?;

        info!("{} signed up", user.username);
        Ok(())
    }

    pub async fn signin(&self, req: Signin) -> Result<String> {
        let user = self.backend.find_user(&req.username).await.map_err(|e| {
            if matches!(e, FindError::NotFound) {
                error!("rejecting signin for {}", req.username);
                Error::InvalidCredentials
            } else {
                error!("couldn't authenticate user {}: {e:?}", req.username);
                Error::Internal
            }
        })?;

        if auth::hash_password(&user.salt, &req.password) != user.pwhash {
            error!("rejecting signin for {}", req.username);
            return Err(Error::InvalidCredentials);
        }

        let token = self.key.issue(&user.id).map_err(|()| Error::Internal)?;

        info!("{} signed in", user.username);
        Ok(token)
    }

    /// The session middleware. Verifies the token, then resolves the
    /// embedded identity against the store - a token for a user deleted
    /// since issuance is as unauthorized as no token at all.
    pub async fn authenticate(self: &Arc<Self>, token: &str) -> Result<HealAuthed> {
        let user_id = self.key.verify(token).map_err(|e| {
            error!("rejecting session token: {e:?}");
            Error::Unauthorized
        })?;

        let user = self.backend.find_user_by_id(&user_id).await.map_err(|e| {
            if matches!(e, FindError::NotFound) {
                error!("valid token for missing user {user_id}");
                Error::Unauthorized
            } else {
                Error::Internal
            }
        })?;

        debug!("resolved session for {}", user.username);
        Ok(HealAuthed {
            heal: Arc::clone(self),
            user,
        })
    }

    pub async fn seed_facts(&self) -> Result<()> {
        let count = self
            .backend
            .fact_count()
            .await
            .map_err(|()| Error::Internal)?;

        if count > 0 {
            return Ok(());
        }

        for &(category, text) in SEED_FACTS {
            let fact = Fact {
                id: Uuid::new_v4().to_string(),
                category: category.into(),
                text: text.into(),
            };
            self.backend
                .insert_fact(&fact)
                .await
                .map_err(|()| Error::Internal)?;
        }

        info!("seeded {} facts", SEED_FACTS.len());
        Ok(())
    }
}

impl HealAuthed {
    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn profile(&self) -> Profile {
        Profile::from(&self.user)
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Profile> {
        if update.display_name.is_none() && update.email.is_none() {
            return Err(Error::Validation);
        }

        let username = &self.user.username;
        info!("{username} updating profile");

        self.heal
            .backend
            .update_profile(&self.user.id, &update)
            .await
            .map_err(|e| match e {
                InsertError::Duplicate => Error::Conflict,
                InsertError::Internal => Error::Internal,
            })?;

        let user = self
            .heal
            .backend
            .find_user_by_id(&self.user.id)
            .await
            .map_err(|_| Error::Internal)?;

        Ok(Profile::from(&user))
    }
}

impl HealAuthed {
    pub async fn moods(&self) -> Result<Vec<Mood>> {
        let username = &self.user.username;
        trace!("{username} listing moods");

        self.heal
            .backend
            .moods(&self.user.id)
            .await
            .map_err(|()| Error::Internal)
    }

    pub async fn create_mood(&self, create: MoodCreate) -> Result<Mood> {
        create.validate()?;

        let mood = Mood {
            id: Uuid::new_v4().to_string(),
            user_id: self.user.id.clone(),
            mood: create.mood,
            note: create.note,
            created: now()?,
        };

        self.heal
            .backend
            .insert_mood(&mood)
            .await
            .map_err(|()| Error::Internal)?;

        info!("{} logged mood {}", self.user.username, mood.mood);
        Ok(mood)
    }

    pub async fn delete_mood(&self, id: &str) -> Result<()> {
        let username = &self.user.username;
        info!("{username} deleting mood {id}");

        self.heal
            .backend
            .delete_mood(&self.user.id, id)
            .await
            .map_err(|()| Error::Internal)?
            .then_some(())
            .ok_or(Error::NotFound)
    }
}

impl HealAuthed {
    pub async fn journals(&self) -> Result<Vec<Journal>> {
        let username = &self.user.username;
        trace!("{username} listing journals");

        self.heal
            .backend
            .journals(&self.user.id)
            .await
            .map_err(|()| Error::Internal)
    }

    pub async fn create_journal(&self, create: JournalCreate) -> Result<Journal> {
        create.validate()?;

        let created = now()?;
        let journal = Journal {
            id: Uuid::new_v4().to_string(),
            user_id: self.user.id.clone(),
            title: create.title,
            content: create.content,
            created,
            updated: created,
        };

        self.heal
            .backend
            .insert_journal(&journal)
            .await
            .map_err(|()| Error::Internal)?;

        info!("{} wrote journal {}", self.user.username, journal.id);
        Ok(journal)
    }

    pub async fn update_journal(&self, id: &str, update: JournalUpdate) -> Result<Journal> {
        let username = &self.user.username;
        info!("{username} updating journal {id}");

        self.heal
            .backend
            .update_journal(&self.user.id, id, &update, now()?)
            .await
            .map_err(|()| Error::Internal)?
            .then_some(())
            .ok_or(Error::NotFound)?;

        self.heal
            .backend
            .journal(&self.user.id, id)
            .await
            .map_err(|e| match e {
                FindError::NotFound => Error::NotFound,
                FindError::Internal => Error::Internal,
            })
    }

    pub async fn delete_journal(&self, id: &str) -> Result<()> {
        let username = &self.user.username;
        info!("{username} deleting journal {id}");

        self.heal
            .backend
            .delete_journal(&self.user.id, id)
            .await
            .map_err(|()| Error::Internal)?
            .then_some(())
            .ok_or(Error::NotFound)
    }
}

impl HealAuthed {
    pub async fn habits(&self) -> Result<Vec<Habit>> {
        let username = &self.user.username;
        trace!("{username} listing habits");

        self.heal
            .backend
            .habits(&self.user.id)
            .await
            .map_err(|()| Error::Internal)
    }

    pub async fn create_habit(&self, create: HabitCreate) -> Result<Habit> {
        create.validate()?;

        let habit = Habit {
            id: Uuid::new_v4().to_string(),
            user_id: self.user.id.clone(),
            name: create.name,
            frequency: create.frequency,
            streak: 0,
            last_done: None,
            created: now()?,
        };

        self.heal
            .backend
            .insert_habit(&habit)
            .await
            .map_err(|()| Error::Internal)?;

        info!("{} started habit {}", self.user.username, habit.name);
        Ok(habit)
    }

    pub async fn tick_habit(&self, id: &str) -> Result<Habit> {
        let username = &self.user.username;
        info!("{username} ticking habit {id}");

        self.heal
            .backend
            .tick_habit(&self.user.id, id, now()?)
            .await
            .map_err(|()| Error::Internal)?
            .then_some(())
            .ok_or(Error::NotFound)?;

        self.heal
            .backend
            .habit(&self.user.id, id)
            .await
            .map_err(|e| match e {
                FindError::NotFound => Error::NotFound,
                FindError::Internal => Error::Internal,
            })
    }

    pub async fn delete_habit(&self, id: &str) -> Result<()> {
        let username = &self.user.username;
        info!("{username} deleting habit {id}");

        self.heal
            .backend
            .delete_habit(&self.user.id, id)
            .await
            .map_err(|()| Error::Internal)?
            .then_some(())
            .ok_or(Error::NotFound)
    }
}

impl HealAuthed {
    pub async fn sleeps(&self) -> Result<Vec<Sleep>> {
        let username = &self.user.username;
        trace!("{username} listing sleeps");

        self.heal
            .backend
            .sleeps(&self.user.id)
            .await
            .map_err(|()| Error::Internal)
    }

    pub async fn create_sleep(&self, create: SleepCreate) -> Result<Sleep> {
        create.validate()?;

        let sleep = Sleep {
            id: Uuid::new_v4().to_string(),
            user_id: self.user.id.clone(),
            started: create.started,
            ended: create.ended,
            quality: create.quality,
            note: create.note,
        };

        self.heal
            .backend
            .insert_sleep(&sleep)
            .await
            .map_err(|()| Error::Internal)?;

        info!("{} logged sleep {}", self.user.username, sleep.id);
        Ok(sleep)
    }

    pub async fn delete_sleep(&self, id: &str) -> Result<()> {
        let username = &self.user.username;
        info!("{username} deleting sleep {id}");

        self.heal
            .backend
            .delete_sleep(&self.user.id, id)
            .await
            .map_err(|()| Error::Internal)?
            .then_some(())
            .ok_or(Error::NotFound)
    }
}

impl HealAuthed {
    pub async fn overview(&self) -> Result<Overview> {
        let username = &self.user.username;
        let user_id = &self.user.id;
        trace!("{username} requesting overview");

        let backend = &self.heal.backend;

        let latest_mood = backend
            .latest_mood(user_id)
            .await
            .map_err(|()| Error::Internal)?;
        let latest_sleep = backend
            .latest_sleep(user_id)
            .await
            .map_err(|()| Error::Internal)?;

        let count = |table| async move {
            backend
                .count_for(table, user_id)
                .await
                .map_err(|()| Error::Internal)
        };

        Ok(Overview {
            latest_mood,
            latest_sleep,
            mood_count: count(Table::Moods).await?,
            journal_count: count(Table::Journals).await?,
            habit_count: count(Table::Habits).await?,
            sleep_count: count(Table::Sleeps).await?,
        })
    }

    pub async fn facts(&self) -> Result<Vec<Fact>> {
        self.heal.backend.facts().await.map_err(|()| Error::Internal)
    }

    pub async fn random_fact(&self) -> Result<Fact> {
        self.heal
            .backend
            .random_fact()
            .await
            .map_err(|()| Error::Internal)?
            .ok_or(Error::NotFound)
    }

    pub async fn payments(&self) -> Result<Vec<Payment>> {
        let username = &self.user.username;
        trace!("{username} listing payments");

        self.heal
            .backend
            .payments(&self.user.id)
            .await
            .map_err(|()| Error::Internal)
    }

    pub async fn create_payment(&self, create: PaymentCreate) -> Result<Payment> {
        create.validate()?;

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            user_id: self.user.id.clone(),
            amount: create.amount,
            currency: create.currency,
            status: PaymentStatus::Pending,
            created: now()?,
        };

        self.heal
            .backend
            .insert_payment(&payment)
            .await
            .map_err(|()| Error::Internal)?;

        info!(
            "{} recorded payment of {} {}",
            self.user.username, payment.amount, payment.currency
        );
        Ok(payment)
    }
}
