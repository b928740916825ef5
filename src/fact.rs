use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Fact {
    pub id: String,
    pub category: String,
    pub text: String,
}

/// Shipped content, inserted on startup when the facts table is empty.
pub const SEED_FACTS: &[(&str, &str)] = &[
    (
        "sleep",
        "Adults who regularly sleep fewer than six hours a night are at \
         higher risk of anxiety and low mood.",
    ),
    (
        "sleep",
        "Keeping a consistent wake-up time, even on weekends, is one of the \
         strongest levers for better sleep quality.",
    ),
    (
        "mood",
        "Naming an emotion in words measurably reduces activity in the \
         amygdala, the brain's threat centre.",
    ),
    (
        "mood",
        "Mood tracking works best when entries are made at the same time \
         each day rather than only during low points.",
    ),
    (
        "habits",
        "On average it takes about 66 days of repetition for a new \
         behaviour to become automatic.",
    ),
    (
        "habits",
        "Missing a single day has no measurable effect on habit formation; \
         what matters is returning to the routine.",
    ),
    (
        "journaling",
        "Expressive writing for 15 minutes a day has been shown to lower \
         stress and improve working memory.",
    ),
    (
        "exercise",
        "A brisk 10-minute walk can lift mood for up to two hours.",
    ),
    (
        "breathing",
        "Slow breathing at around six breaths per minute activates the \
         parasympathetic nervous system and lowers heart rate.",
    ),
    (
        "social",
        "Brief positive social contact, even with strangers, reliably \
         improves self-reported wellbeing.",
    ),
];
