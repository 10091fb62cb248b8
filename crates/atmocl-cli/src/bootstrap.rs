//! Obtaining credentials: the cache first, then an interactive login.

use std::io::{self, BufRead, Write};

use anyhow::Context;
use atmocl_auth::{AuthClient, CredentialCache, CredentialSet};
use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tracing::{debug, warn};

/// Where a missing username or password comes from.
pub trait LoginPrompt {
    /// Ask for the username.
    fn username(&self) -> io::Result<String>;

    /// Ask for the password of `username`.
    fn password(&self, username: &str) -> io::Result<String>;
}

/// Prompts on the terminal; the password is read in raw mode without echo.
pub struct TerminalPrompt;

impl LoginPrompt for TerminalPrompt {
    fn username(&self) -> io::Result<String> {
        print!("Username: ");
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }

    fn password(&self, username: &str) -> io::Result<String> {
        print!("Password for {username}: ");
        io::stdout().flush()?;

        terminal::enable_raw_mode()?;
        let password = read_hidden_line();
        terminal::disable_raw_mode()?;
        println!();
        password
    }
}

fn read_hidden_line() -> io::Result<String> {
    let mut line = String::new();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Enter => return Ok(line),
            KeyCode::Backspace => {
                line.pop();
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "login cancelled"));
            }
            KeyCode::Char(c) => line.push(c),
            _ => {}
        }
    }
}

/// Credentials for this run, plus the login that produced them if one was typed.
pub struct Bootstrapped {
    /// Credentials to start the session with.
    pub credentials: CredentialSet,
    /// Username and password, kept so the client can re-authenticate.
    pub login: Option<(String, String)>,
}

/// Use cached credentials if they are fresh and belong to `user`; otherwise
/// log in and refresh the cache.
///
/// # Errors
///
/// Returns an error if the login is rejected or cannot be completed.
pub async fn bootstrap(
    cache: &CredentialCache,
    auth: &AuthClient,
    user: Option<&str>,
    password: Option<&str>,
    prompt: &impl LoginPrompt,
) -> anyhow::Result<Bootstrapped> {
    match cache.load(user, Utc::now()).await {
        Ok(Some(credentials)) => {
            debug!(user = %credentials.username, "Using cached credentials");
            return Ok(Bootstrapped {
                credentials,
                login: None,
            });
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Could not read the credential cache"),
    }

    let username = match user {
        Some(user) => user.to_string(),
        None => prompt.username().context("Failed to read username")?,
    };
    let password = match password {
        Some(password) => password.to_string(),
        None => prompt
            .password(&username)
            .context("Failed to read password")?,
    };

    let credentials = auth
        .authenticate(&username, &password)
        .await
        .map_err(|e| {
            if e.is_credential_failure() {
                anyhow::anyhow!("Invalid username or password")
            } else {
                anyhow::Error::new(e).context("Authentication failed")
            }
        })?;

    if let Err(e) = cache.store(&credentials).await {
        warn!(path = %cache.path().display(), error = %e, "Could not write the credential cache");
    }

    Ok(Bootstrapped {
        credentials,
        login: Some((username, password)),
    })
}
