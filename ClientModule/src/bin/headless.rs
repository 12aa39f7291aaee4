//! Headless RPG client: registers, creates a character, logs in, walks a few
//! steps and logs out, against the mock or a live server.
//!
//! Usage: `rpg-headless <username> <character-name> [class]`

use std::time::Duration;

use log::{error, info};

use rpg_client::{
    create_backend, AuthSession, AuthState, ClientConfig, ClientError, ClientResult,
    ConnectionSupervisor, InputAxes, Movement, PositionSync,
};
use rpg_shared::constants::RPG_CLIENT_VERSION;
use rpg_shared::{CharacterClass, CharacterDraft};

const STEP_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (username, character_name) = match (args.next(), args.next()) {
        (Some(username), Some(name)) => (username, name),
        _ => {
            eprintln!("usage: rpg-headless <username> <character-name> [class]");
            std::process::exit(2);
        }
    };
    let class = match args.next().map(|c| c.parse::<CharacterClass>()).transpose() {
        Ok(class) => class.unwrap_or(CharacterClass::Warrior),
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(2);
        }
    };

    if let Err(err) = run(&username, CharacterDraft::new(character_name, class)).await {
        error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(username: &str, draft: CharacterDraft) -> ClientResult<()> {
    let config = ClientConfig::from_env();
    info!("rpg-headless {}", RPG_CLIENT_VERSION);
    let backend = create_backend(&config)?;
    let mut session = AuthSession::new(backend.clone());

    let supervisor = ConnectionSupervisor::new(backend.clone(), &config).spawn();
    session.start()?;
    step(&mut session, "connect", |s| !s.is_loading()).await?;

    if session.state().username().is_none() {
        session.register(username)?;
        step(&mut session, "register", |s| s.username().is_some() || s.error().is_some()).await?;
    }
    info!("Playing as {}", session.state().username().unwrap_or(username));

    let name = draft.name.trim().to_string();
    if session.state().character_named(&name).is_none() {
        session.create_character(&draft)?;
        step(&mut session, "create character", |s| {
            s.character_named(&name).is_some() || s.error().is_some()
        })
        .await?;
    }
    let character_id = match session.state().character_named(&name) {
        Some(character) => character.id,
        None => return Err(ClientError::Reducer(format!("character {} was not created", name))),
    };

    session.login(character_id)?;
    step(&mut session, "login", |s| s.is_authenticated() || s.error().is_some()).await?;
    let (mut position, mut facing) = match session.state().current_character() {
        Some(character) => (character.position(), character.facing()),
        None => return Err(ClientError::Reducer("login did not complete".to_string())),
    };
    info!("Logged in at ({:.0}, {:.0}) facing {}", position.x, position.y, facing);

    let sync = PositionSync::spawn(backend.clone(), config.position_sync_interval);
    let movement = Movement::default();
    let frame = Duration::from_millis(100);
    for axes in [InputAxes::new(1.0, 0.0), InputAxes::new(0.0, 1.0)] {
        for _ in 0..10 {
            (position, facing) = movement.step(position, facing, axes, frame);
            sync.report(position, facing);
            tokio::time::sleep(frame).await;
        }
    }
    // let the last position go out before leaving
    tokio::time::sleep(config.position_sync_interval).await;
    sync.stop();
    info!("Walked to ({:.0}, {:.0}) facing {}", position.x, position.y, facing);

    session.logout()?;
    step(&mut session, "logout", |s| !s.is_authenticated()).await?;

    backend.disconnect();
    supervisor.abort();
    Ok(())
}

async fn step(
    session: &mut AuthSession,
    what: &str,
    done: impl Fn(&AuthState) -> bool,
) -> ClientResult<()> {
    if !session.wait_until(STEP_TIMEOUT, done).await {
        return Err(ClientError::Timeout(STEP_TIMEOUT));
    }
    if let Some(error) = session.state().error() {
        return Err(ClientError::Reducer(format!("{} failed: {}", what, error)));
    }
    Ok(())
}
