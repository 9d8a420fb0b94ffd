//! Interactive shell over the session manager.
//!
//! Uses `rustyline` for line editing with persistent history. The shell
//! is the application's navigator: login and logout move it between the
//! `home` and `login` pages, shown in the prompt.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use rustyline::config::Configurer;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;
use tracing::{debug, warn};

use tracker_core::{
    Config, Destination, Keychain, LoginOutcome, LogoutOutcome, Navigator, SessionManager,
};

/// History file name inside the data directory
const HISTORY_FILE: &str = "history";

/// Exit commands (case-insensitive match).
const EXIT_COMMANDS: &[&str] = &["exit", "quit", ":q"];

const HELP: &str = "\
Commands:
  login [email]     log in (offers a stored password when there is one)
  logout            log out
  user              reload the current user from the server
  register [email]  create an account
  status            show the local session state
  help              show this help
  quit              leave the shell";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Login(Option<String>),
    Logout,
    User,
    Register(Option<String>),
    Status,
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(input: &str) -> Command {
    let mut parts = input.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next().map(str::to_string);

    if EXIT_COMMANDS.contains(&name.as_str()) {
        return Command::Quit;
    }
    match name.as_str() {
        "login" => Command::Login(arg),
        "logout" => Command::Logout,
        "user" | "whoami" => Command::User,
        "register" => Command::Register(arg),
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        _ => Command::Unknown(name),
    }
}

/// Best human-readable label for an opaque user payload.
pub fn display_user(user: Option<&Value>) -> String {
    let Some(user) = user else {
        return "(user not loaded)".to_string();
    };
    ["email", "username"]
        .iter()
        .find_map(|key| user.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| user.to_string())
}

/// Tracks which page the shell is on.
struct ShellNavigator {
    page: Mutex<Destination>,
}

impl ShellNavigator {
    fn new(start: Destination) -> Self {
        Self {
            page: Mutex::new(start),
        }
    }

    fn current(&self) -> Destination {
        *self.page.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Navigator for ShellNavigator {
    async fn push(&self, destination: Destination) -> Result<()> {
        *self.page.lock().unwrap_or_else(PoisonError::into_inner) = destination;
        debug!(%destination, "Navigated");
        Ok(())
    }
}

struct App {
    session: Arc<SessionManager>,
    config: Config,
    navigator: ShellNavigator,
}

impl App {
    fn new(session: Arc<SessionManager>, config: Config) -> Self {
        // Route guard: anonymous sessions start on the login page
        let start = if session.is_authenticated() {
            Destination::Home
        } else {
            Destination::Login
        };
        Self {
            session,
            config,
            navigator: ShellNavigator::new(start),
        }
    }

    fn prompt(&self) -> String {
        format!("tracker({})> ", self.navigator.current())
    }

    async fn execute(&mut self, command: Command, editor: &mut DefaultEditor) -> Result<()> {
        match command {
            Command::Login(email) => self.login(email, editor).await,
            Command::Logout => self.logout().await,
            Command::User => self.fetch_user().await,
            Command::Register(email) => self.register(email, editor).await,
            Command::Status => {
                self.print_status();
                Ok(())
            }
            Command::Help => {
                println!("{}", HELP);
                Ok(())
            }
            Command::Unknown(name) => {
                println!("Unknown command '{}'. Type 'help' for a list.", name);
                Ok(())
            }
            Command::Quit => Ok(()),
        }
    }

    fn prompt_email(&self, given: Option<String>, editor: &mut DefaultEditor) -> Result<String> {
        if let Some(email) = given {
            return Ok(email);
        }
        let prompt = match self.config.last_email {
            Some(ref last) => format!("Email [{}]: ", last),
            None => "Email: ".to_string(),
        };
        let input = editor.readline(&prompt)?;
        let input = input.trim();
        match (input.is_empty(), &self.config.last_email) {
            (true, Some(last)) => Ok(last.clone()),
            _ => Ok(input.to_string()),
        }
    }

    fn prompt_password(email: &str, editor: &mut DefaultEditor) -> Result<String> {
        if Keychain::has_credentials(email) {
            let answer = editor.readline("Use stored password? [Y/n]: ")?;
            if answer.trim().to_lowercase() != "n" {
                return Keychain::get_password(email);
            }
        }
        Ok(rpassword::prompt_password("Password: ")?)
    }

    async fn login(&mut self, email: Option<String>, editor: &mut DefaultEditor) -> Result<()> {
        let email = self.prompt_email(email, editor)?;
        if email.is_empty() {
            println!("Email required");
            return Ok(());
        }
        let password = Self::prompt_password(&email, editor)?;

        let outcome = self
            .session
            .login(&email, &password, Some(&self.navigator))
            .await?;

        match outcome {
            LoginOutcome::Authenticated => {
                if let Err(e) = Keychain::store(&email, &password) {
                    warn!(error = %e, "Failed to store credentials");
                }
                self.config.last_email = Some(email);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }

                // The login response carries no identity; load it separately
                self.session.fetch_user().await?;
                println!(
                    "Logged in as {}",
                    display_user(self.session.user().as_ref())
                );
            }
            LoginOutcome::Rejected { message } => {
                println!(
                    "Login failed: {}",
                    message.as_deref().unwrap_or("credentials rejected")
                );
            }
            LoginOutcome::Unreachable => {
                println!("Could not reach the server. Check the API base URL and try again.");
            }
        }
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        match self.session.logout(Some(&self.navigator)).await? {
            LogoutOutcome::LoggedOut => println!("Logged out"),
            LogoutOutcome::Refused(status) => println!("Server refused logout ({})", status),
        }
        Ok(())
    }

    async fn fetch_user(&mut self) -> Result<()> {
        if self.session.fetch_user().await? {
            let user = self.session.user();
            match user {
                Some(ref payload) => println!("{}", serde_json::to_string_pretty(payload)?),
                None => println!("{}", display_user(None)),
            }
        } else {
            println!("Not logged in");
            self.navigator.push(Destination::Login).await?;
        }
        Ok(())
    }

    async fn register(&mut self, email: Option<String>, editor: &mut DefaultEditor) -> Result<()> {
        let email = self.prompt_email(email, editor)?;
        if email.is_empty() {
            println!("Email required");
            return Ok(());
        }
        let password = rpassword::prompt_password("Password: ")?;
        let confirm = rpassword::prompt_password("Confirm password: ")?;
        if password != confirm {
            println!("Passwords do not match");
            return Ok(());
        }

        self.session.register(&email, &password).await?;
        println!("Account created for {}. Use 'login' to sign in.", email);
        Ok(())
    }

    fn print_status(&self) {
        let state = self.session.state();
        if state.is_authenticated {
            println!("Logged in as {}", display_user(state.user.as_ref()));
        } else {
            println!("Not logged in");
        }
    }
}

/// Run the interactive loop until the user quits.
pub async fn run(session: Arc<SessionManager>, config: Config, data_dir: &Path) -> Result<()> {
    let mut app = App::new(session, config);
    let history_path = data_dir.join(HISTORY_FILE);
    let mut editor = create_editor(&history_path)?;

    println!("Tracker shell. Type 'help' for commands.");
    app.print_status();

    loop {
        let input = match editor.readline(&app.prompt()) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(trimmed);

        let command = parse_command(trimmed);
        if command == Command::Quit {
            break;
        }
        if let Err(e) = app.execute(command, &mut editor).await {
            eprintln!("Error: {:#}", e);
        }
    }

    save_history(&mut editor, &history_path);
    Ok(())
}

fn create_editor(history_path: &Path) -> Result<DefaultEditor> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;
    if history_path.exists() {
        let _ = editor.load_history(history_path);
    }
    Ok(editor)
}

fn save_history(editor: &mut DefaultEditor, history_path: &Path) {
    if let Err(e) = editor.save_history(history_path) {
        debug!(error = %e, "Failed to save history");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(
            parse_command("login ada@example.com"),
            Command::Login(Some("ada@example.com".to_string()))
        );
        assert_eq!(parse_command("login"), Command::Login(None));
        assert_eq!(parse_command("LOGOUT"), Command::Logout);
        assert_eq!(parse_command("whoami"), Command::User);
        assert_eq!(parse_command("register"), Command::Register(None));
        assert_eq!(parse_command("?"), Command::Help);
        assert_eq!(parse_command("Quit"), Command::Quit);
        assert_eq!(parse_command(":q"), Command::Quit);
        assert_eq!(
            parse_command("portfolio"),
            Command::Unknown("portfolio".to_string())
        );
    }

    #[test]
    fn test_display_user() {
        let with_email = serde_json::json!({"username": "ada", "email": "ada@example.com"});
        assert_eq!(display_user(Some(&with_email)), "ada@example.com");

        let username_only = serde_json::json!({"username": "ada"});
        assert_eq!(display_user(Some(&username_only)), "ada");

        let opaque = serde_json::json!({"id": 7});
        assert_eq!(display_user(Some(&opaque)), r#"{"id":7}"#);

        assert_eq!(display_user(None), "(user not loaded)");
    }

    #[tokio::test]
    async fn test_navigator_tracks_page() {
        let navigator = ShellNavigator::new(Destination::Login);
        assert_eq!(navigator.current(), Destination::Login);

        navigator.push(Destination::Home).await.unwrap();
        assert_eq!(navigator.current(), Destination::Home);
    }
}
