use std::process;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

mod args;
mod auth;
mod backend;
mod fact;
mod habit;
mod heal;
mod journal;
mod mood;
mod overview;
mod payment;
mod routes;
mod sleep;
mod time;
mod token;
mod user;

use args::Args;
use backend::Backend;
use heal::Heal;
use token::TokenKey;

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let args = Args::parse();
    let addr = match args.addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("invalid listen address: {e}");
            process::exit(2);
        }
    };

    let backend = Backend::new(args.data_dir()).await;
    let heal = Arc::new(Heal::new(backend, TokenKey::new(args.token_secret())));

    if let Err(e) = heal.seed_facts().await {
        error!("couldn't seed facts: {e:?}");
        process::exit(1);
    }

    let routes = routes::routes(
        heal,
        args.secure(),
        args.frontend_url(),
        args.sounds_dir(),
    );

    info!("listening on {addr}");
    warp::serve(routes).run(addr).await;
}
