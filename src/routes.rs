use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use cookie::Cookie;
use log::error;
use serde::Serialize;
use warp::filters::BoxedFilter;
use warp::http::{header, StatusCode};
use warp::{Filter, Rejection, Reply};

use crate::auth::{Signin, Signup};
use crate::habit::HabitCreate;
use crate::heal::{Error, Heal, HealAuthed};
use crate::journal::{JournalCreate, JournalUpdate};
use crate::mood::MoodCreate;
use crate::payment::PaymentCreate;
use crate::sleep::SleepCreate;
use crate::token::TOKEN_TTL_SECS;
use crate::user::ProfileUpdate;

pub const SESSION_COOKIE: &str = "token";

pub fn routes(
    heal: Arc<Heal>,
    secure: bool,
    frontend_url: String,
    sounds_dir: PathBuf,
) -> BoxedFilter<(impl Reply,)> {
    let session = with_session(Arc::clone(&heal));
    let with_secure = warp::any().map(move || secure);

    let auth = {
        let signup = warp::path!("api" / "auth" / "signup")
            .and(warp::post())
            .and(with_heal(Arc::clone(&heal)))
            .and(warp::body::json())
            .and_then(signup);

        let signin = warp::path!("api" / "auth" / "signin")
            .and(warp::post())
            .and(with_heal(Arc::clone(&heal)))
            .and(with_secure.clone())
            .and(warp::body::json())
            .and_then(signin);

        let signout = warp::path!("api" / "auth" / "signout")
            .and(warp::post())
            .and(with_secure.clone())
            .and_then(signout);

        signup.or(signin).or(signout)
    };

    let users = {
        let me = warp::path!("api" / "users" / "me")
            .and(warp::get())
            .and(session.clone())
            .and_then(profile);

        let update = warp::path!("api" / "users" / "me")
            .and(warp::patch())
            .and(session.clone())
            .and(warp::body::json())
            .and_then(update_profile);

        me.or(update)
    };

    let moods = {
        let list = warp::path!("api" / "moods")
            .and(warp::get())
            .and(session.clone())
            .and_then(moods);

        let create = warp::path!("api" / "moods")
            .and(warp::post())
            .and(session.clone())
            .and(warp::body::json())
            .and_then(create_mood);

        let delete = warp::path!("api" / "moods" / String)
            .and(warp::delete())
            .and(session.clone())
            .and_then(delete_mood);

        list.or(create).or(delete)
    };

    let journals = {
        let list = warp::path!("api" / "journals")
            .and(warp::get())
            .and(session.clone())
            .and_then(journals);

        let create = warp::path!("api" / "journals")
            .and(warp::post())
            .and(session.clone())
            .and(warp::body::json())
            .and_then(create_journal);

        let update = warp::path!("api" / "journals" / String)
            .and(warp::patch())
            .and(session.clone())
            .and(warp::body::json())
            .and_then(update_journal);

        let delete = warp::path!("api" / "journals" / String)
            .and(warp::delete())
            .and(session.clone())
            .and_then(delete_journal);

        list.or(create).or(update).or(delete)
    };

    let habits = {
        let list = warp::path!("api" / "habits")
            .and(warp::get())
            .and(session.clone())
            .and_then(habits);

        let create = warp::path!("api" / "habits")
            .and(warp::post())
            .and(session.clone())
            .and(warp::body::json())
            .and_then(create_habit);

        let tick = warp::path!("api" / "habits" / String / "tick")
            .and(warp::post())
            .and(session.clone())
            .and_then(tick_habit);

        let delete = warp::path!("api" / "habits" / String)
            .and(warp::delete())
            .and(session.clone())
            .and_then(delete_habit);

        list.or(create).or(tick).or(delete)
    };

    let sleeps = {
        let list = warp::path!("api" / "sleeps")
            .and(warp::get())
            .and(session.clone())
            .and_then(sleeps);

        let create = warp::path!("api" / "sleeps")
            .and(warp::post())
            .and(session.clone())
            .and(warp::body::json())
            .and_then(create_sleep);

        let delete = warp::path!("api" / "sleeps" / String)
            .and(warp::delete())
            .and(session.clone())
            .and_then(delete_sleep);

        list.or(create).or(delete)
    };

    let overview = warp::path!("api" / "overview")
        .and(warp::get())
        .and(session.clone())
        .and_then(overview);

    let facts = {
        let list = warp::path!("api" / "facts")
            .and(warp::get())
            .and(session.clone())
            .and_then(facts);

        let random = warp::path!("api" / "facts" / "random")
            .and(warp::get())
            .and(session.clone())
            .and_then(random_fact);

        // the more specific path first
        random.or(list)
    };

    let payments = {
        let list = warp::path!("api" / "payments")
            .and(warp::get())
            .and(session.clone())
            .and_then(payments);

        let create = warp::path!("api" / "payments")
            .and(warp::post())
            .and(session)
            .and(warp::body::json())
            .and_then(create_payment);

        list.or(create)
    };

    let sounds = warp::path("sounds").and(warp::fs::dir(sounds_dir));

    let cors = warp::cors()
        .allow_origin(frontend_url.as_str())
        .allow_credentials(true)
        .allow_methods(vec!["GET", "POST", "PATCH", "DELETE", "PUT"])
        .allow_headers(vec!["content-type", "authorization"]);

    auth.or(users)
        .or(moods)
        .or(journals)
        .or(habits)
        .or(sleeps)
        .or(overview)
        .or(facts)
        .or(payments)
        .or(sounds)
        .recover(handle_rejection)
        .with(cors)
        .with(warp::log("heal"))
        .boxed()
}

fn with_heal(heal: Arc<Heal>) -> impl Filter<Extract = (Arc<Heal>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&heal))
}

/// The session stage. Private routes compose this in front of their
/// handler: no cookie or a bad one becomes an `Unauthorized` rejection
/// here, and the handler is never reached.
fn with_session(
    heal: Arc<Heal>,
) -> impl Filter<Extract = (HealAuthed,), Error = Rejection> + Clone {
    warp::cookie::optional::<String>(SESSION_COOKIE)
        .and(with_heal(heal))
        .and_then(|token: Option<String>, heal: Arc<Heal>| async move {
            let token = token.ok_or_else(|| warp::reject::custom(Error::Unauthorized))?;

            heal.authenticate(&token)
                .await
                .map_err(warp::reject::custom)
        })
}

async fn signup(heal: Arc<Heal>, req: Signup) -> Result<impl Reply, Rejection> {
    heal.signup(req).await.map_err(warp::reject::custom)?;

    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

async fn signin(heal: Arc<Heal>, secure: bool, req: Signin) -> Result<impl Reply, Rejection> {
    let token = heal.signin(req).await.map_err(warp::reject::custom)?;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct SignedIn<'t> {
        message: &'static str,
        access_token: &'t str,
    }

    let cookie = Cookie::build((SESSION_COOKIE, token.as_str()))
        .http_only(true)
        .path("/")
        .max_age(::time::Duration::seconds(TOKEN_TTL_SECS))
        .secure(secure)
        .build();

    let body = warp::reply::json(&SignedIn {
        message: "signed in",
        access_token: &token,
    });

    Ok(warp::reply::with_header(
        body,
        header::SET_COOKIE,
        cookie.to_string(),
    ))
}

async fn signout(secure: bool) -> Result<impl Reply, Rejection> {
    // stateless tokens: signing out is clearing the client's cookie
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .path("/")
        .max_age(::time::Duration::ZERO)
        .secure(secure)
        .build();

    Ok(warp::reply::with_header(
        warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT),
        header::SET_COOKIE,
        cookie.to_string(),
    ))
}

async fn profile(authed: HealAuthed) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&authed.profile()))
}

async fn update_profile(
    authed: HealAuthed,
    update: ProfileUpdate,
) -> Result<impl Reply, Rejection> {
    let profile = authed
        .update_profile(update)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::json(&profile))
}

async fn moods(authed: HealAuthed) -> Result<impl Reply, Rejection> {
    let moods = authed.moods().await.map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&moods))
}

async fn create_mood(authed: HealAuthed, create: MoodCreate) -> Result<impl Reply, Rejection> {
    let mood = authed
        .create_mood(create)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&mood),
        StatusCode::CREATED,
    ))
}

async fn delete_mood(id: String, authed: HealAuthed) -> Result<impl Reply, Rejection> {
    authed.delete_mood(&id).await.map_err(warp::reject::custom)?;

    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

async fn journals(authed: HealAuthed) -> Result<impl Reply, Rejection> {
    let journals = authed.journals().await.map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&journals))
}

async fn create_journal(
    authed: HealAuthed,
    create: JournalCreate,
) -> Result<impl Reply, Rejection> {
    let journal = authed
        .create_journal(create)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&journal),
        StatusCode::CREATED,
    ))
}

async fn update_journal(
    id: String,
    authed: HealAuthed,
    update: JournalUpdate,
) -> Result<impl Reply, Rejection> {
    let journal = authed
        .update_journal(&id, update)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::json(&journal))
}

async fn delete_journal(id: String, authed: HealAuthed) -> Result<impl Reply, Rejection> {
    authed
        .delete_journal(&id)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

async fn habits(authed: HealAuthed) -> Result<impl Reply, Rejection> {
    let habits = authed.habits().await.map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&habits))
}

async fn create_habit(authed: HealAuthed, create: HabitCreate) -> Result<impl Reply, Rejection> {
    let habit = authed
        .create_habit(create)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&habit),
        StatusCode::CREATED,
    ))
}

async fn tick_habit(id: String, authed: HealAuthed) -> Result<impl Reply, Rejection> {
    let habit = authed.tick_habit(&id).await.map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&habit))
}

async fn delete_habit(id: String, authed: HealAuthed) -> Result<impl Reply, Rejection> {
    authed
        .delete_habit(&id)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

async fn sleeps(authed: HealAuthed) -> Result<impl Reply, Rejection> {
    let sleeps = authed.sleeps().await.map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&sleeps))
}

async fn create_sleep(authed: HealAuthed, create: SleepCreate) -> Result<impl Reply, Rejection> {
    let sleep = authed
        .create_sleep(create)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&sleep),
        StatusCode::CREATED,
    ))
}

async fn delete_sleep(id: String, authed: HealAuthed) -> Result<impl Reply, Rejection> {
    authed
        .delete_sleep(&id)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

async fn overview(authed: HealAuthed) -> Result<impl Reply, Rejection> {
    let overview = authed.overview().await.map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&overview))
}

async fn facts(authed: HealAuthed) -> Result<impl Reply, Rejection> {
    let facts = authed.facts().await.map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&facts))
}

async fn random_fact(authed: HealAuthed) -> Result<impl Reply, Rejection> {
    let fact = authed.random_fact().await.map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&fact))
}

async fn payments(authed: HealAuthed) -> Result<impl Reply, Rejection> {
    let payments = authed.payments().await.map_err(warp::reject::custom)?;
    Ok(warp::reply::json(&payments))
}

async fn create_payment(
    authed: HealAuthed,
    create: PaymentCreate,
) -> Result<impl Reply, Rejection> {
    let payment = authed
        .create_payment(create)
        .await
        .map_err(warp::reject::custom)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&payment),
        StatusCode::CREATED,
    ))
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: &'static str,
}

/// Maps every rejection to a structured JSON error. Unexpected ones are
/// logged and surfaced as a bare internal error - no detail leaks.
async fn handle_rejection(rejection: Rejection) -> Result<impl Reply, Infallible> {
    let error = if let Some(&e) = rejection.find::<Error>() {
        e
    } else if rejection.is_not_found() {
        Error::NotFound
    } else if rejection
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
    {
        Error::Validation
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        Error::NotFound
    } else {
        error!("unhandled rejection: {rejection:?}");
        Error::Internal
    };

    let status: StatusCode = error.into();
    let body = warp::reply::json(&ErrorBody {
        error: error.kind(),
        message: error.message(),
    });

    Ok(warp::reply::with_status(body, status))
}

#[cfg(test)]
mod test {
    use super::*;

    use serde_json::{json, Value};

    use crate::backend::{self, Backend};
    use crate::token::TokenKey;

    async fn create_routes() -> BoxedFilter<(impl Reply,)> {
        let db = backend::test::create_db().await;
        let heal = Arc::new(Heal::new(Backend(db), TokenKey::new("test-secret")));
        heal.seed_facts().await.unwrap();

        routes(heal, false, "http://localhost:5173".into(), ".".into())
    }

    fn signup_body() -> Value {
        json!({
            "username": "a",
            "email": "a@x.com",
            "password": "p",
            "displayName": "A",
        })
    }

    async fn signup(filter: &BoxedFilter<(impl Reply + 'static,)>) {
        let res = warp::test::request()
            .method("POST")
            .path("/api/auth/signup")
            .json(&signup_body())
            .reply(filter)
            .await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }

    async fn signin_token(filter: &BoxedFilter<(impl Reply + 'static,)>) -> String {
        let res = warp::test::request()
            .method("POST")
            .path("/api/auth/signin")
            .json(&json!({ "username": "a", "password": "p" }))
            .reply(filter)
            .await;
        assert_eq!(res.status(), StatusCode::OK);

        let body: Value = serde_json::from_slice(res.body()).unwrap();
        body["accessToken"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn signup_then_duplicate() {
        let filter = create_routes().await;

        signup(&filter).await;

        let res = warp::test::request()
            .method("POST")
            .path("/api/auth/signup")
            .json(&signup_body())
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["error"], "CONFLICT");
    }

    #[tokio::test]
    async fn signup_missing_field() {
        let filter = create_routes().await;

        let res = warp::test::request()
            .method("POST")
            .path("/api/auth/signup")
            .json(&json!({ "username": "a", "password": "p" }))
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn signin_sets_session_cookie() {
        let filter = create_routes().await;
        signup(&filter).await;

        let res = warp::test::request()
            .method("POST")
            .path("/api/auth/signin")
            .json(&json!({ "username": "a", "password": "p" }))
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::OK);

        let cookie = res.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("token="));
        assert!(cookie.contains("HttpOnly"));

        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert!(!body["accessToken"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_credentials_are_indistinguishable() {
        let filter = create_routes().await;
        signup(&filter).await;

        let wrong_password = warp::test::request()
            .method("POST")
            .path("/api/auth/signin")
            .json(&json!({ "username": "a", "password": "nope" }))
            .reply(&filter)
            .await;
        let unknown_user = warp::test::request()
            .method("POST")
            .path("/api/auth/signin")
            .json(&json!({ "username": "who", "password": "p" }))
            .reply(&filter)
            .await;

        assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password.body(), unknown_user.body());
    }

    #[tokio::test]
    async fn signout_clears_cookie() {
        let filter = create_routes().await;

        let res = warp::test::request()
            .method("POST")
            .path("/api/auth/signout")
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        let cookie = res.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("token="));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn private_routes_require_a_session() {
        let filter = create_routes().await;

        for path in [
            "/api/users/me",
            "/api/moods",
            "/api/journals",
            "/api/habits",
            "/api/sleeps",
            "/api/overview",
            "/api/facts",
            "/api/payments",
        ] {
            let res = warp::test::request().path(path).reply(&filter).await;
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "for {path}");

            let body: Value = serde_json::from_slice(res.body()).unwrap();
            assert_eq!(body["error"], "UNAUTHORIZED", "for {path}");
        }
    }

    #[tokio::test]
    async fn rejected_requests_never_reach_a_handler() {
        let filter = create_routes().await;
        signup(&filter).await;

        // a write without a session is rejected...
        let res = warp::test::request()
            .method("POST")
            .path("/api/moods")
            .json(&json!({ "mood": "sneaky" }))
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        // ...and observably never ran: nothing was stored
        let token = signin_token(&filter).await;
        let res = warp::test::request()
            .path("/api/moods")
            .header("cookie", format!("token={token}"))
            .reply(&filter)
            .await;
        assert_eq!(res.body(), "[]");
    }

    #[tokio::test]
    async fn tampered_cookie_is_rejected() {
        let filter = create_routes().await;

        let res = warp::test::request()
            .path("/api/moods")
            .header("cookie", "token=garbage")
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn session_cookie_grants_access() {
        let filter = create_routes().await;
        signup(&filter).await;
        let token = signin_token(&filter).await;
        let cookie = format!("token={token}");

        let res = warp::test::request()
            .path("/api/moods")
            .header("cookie", &cookie)
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body(), "[]");

        let res = warp::test::request()
            .method("POST")
            .path("/api/moods")
            .header("cookie", &cookie)
            .json(&json!({ "mood": "calm" }))
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);

        let res = warp::test::request()
            .path("/api/moods")
            .header("cookie", &cookie)
            .reply(&filter)
            .await;
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["mood"], "calm");
    }

    #[tokio::test]
    async fn profile_round_trip() {
        let filter = create_routes().await;
        signup(&filter).await;
        let token = signin_token(&filter).await;
        let cookie = format!("token={token}");

        let res = warp::test::request()
            .path("/api/users/me")
            .header("cookie", &cookie)
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::OK);

        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["username"], "a");
        assert_eq!(body["displayName"], "A");

        let res = warp::test::request()
            .method("PATCH")
            .path("/api/users/me")
            .header("cookie", &cookie)
            .json(&json!({ "displayName": "Anna" }))
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::OK);

        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["displayName"], "Anna");
    }

    #[tokio::test]
    async fn facts_are_served() {
        let filter = create_routes().await;
        signup(&filter).await;
        let token = signin_token(&filter).await;

        let res = warp::test::request()
            .path("/api/facts/random")
            .header("cookie", format!("token={token}"))
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::OK);

        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert!(!body["text"].as_str().unwrap().is_empty());
    }
}
