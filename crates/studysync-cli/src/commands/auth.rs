use clap::Subcommand;
use studysync_core::storage::{self, ApiKeySource};

use super::{prompt, CmdResult};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store the Gemini API key in the OS keyring
    SetKey {
        /// API key (read from stdin when omitted)
        key: Option<String>,
    },
    /// Remove the stored API key
    Clear,
    /// Check which API key is in use
    Status,
}

pub fn run(action: AuthAction) -> CmdResult {
    match action {
        AuthAction::SetKey { key } => {
            let key = match key {
                Some(key) => key,
                None => prompt("Gemini API key: ")?.unwrap_or_default(),
            };
            if key.trim().is_empty() {
                eprintln!("no key given");
                std::process::exit(1);
            }
            storage::store_api_key(&key)?;
            println!("API key saved to keyring");
        }
        AuthAction::Clear => {
            storage::clear_api_key()?;
            println!("API key removed");
        }
        AuthAction::Status => match storage::api_key() {
            Ok((_, ApiKeySource::Environment)) => {
                println!("configured (from {})", storage::API_KEY_ENV)
            }
            Ok((_, ApiKeySource::Keyring)) => println!("configured (keyring)"),
            Err(_) => println!("not configured"),
        },
    }
    Ok(())
}
