//! Line-oriented chat front end: `!vwap`, `!list_alerts`, `!remove_token`,
//! `!help`.

use alerts::{AlertStore, Owner};
use chrono::Utc;
use market::PriceSource;
use thiserror::Error;
use tracing::{debug, warn};

use crate::commands::{AlertCommands, CommandError};
use crate::render::{HELP, render_alert_list, render_summary};

const PREFIX: char = '!';

#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    AddAlert { token_id: String, target_price: f64 },
    ListAlerts,
    RemoveToken { token_id: String },
    Help,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Plain chatter; not addressed to the bot.
    #[error("not a command")]
    NotACommand,

    #[error("unknown command `{0}`")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

impl ChatCommand {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        let Some(body) = line.strip_prefix(PREFIX) else {
            return Err(ParseError::NotACommand);
        };

        let mut parts = body.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match name.to_lowercase().as_str() {
            "vwap" => match args.as_slice() {
                [token, level] => {
                    let target_price = level
                        .trim_start_matches('$')
                        .parse::<f64>()
                        .map_err(|_| ParseError::Usage("!vwap <token_address> <vwap_level>"))?;
                    Ok(Self::AddAlert {
                        token_id: token.to_string(),
                        target_price,
                    })
                }
                _ => Err(ParseError::Usage("!vwap <token_address> <vwap_level>")),
            },
            "list_alerts" => Ok(Self::ListAlerts),
            "remove_token" => match args.as_slice() {
                [token] => Ok(Self::RemoveToken {
                    token_id: token.to_string(),
                }),
                _ => Err(ParseError::Usage("!remove_token <token_address>")),
            },
            "help" => Ok(Self::Help),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

/// Handle one chat line from `requester`. Returns the reply to post, or
/// `None` when the line was not meant for the bot.
pub async fn respond<S, P>(
    commands: &AlertCommands<S, P>,
    line: &str,
    requester: &Owner,
    band_tolerance: f64,
) -> Option<String>
where
    S: AlertStore,
    P: PriceSource,
{
    let command = match ChatCommand::parse(line) {
        Ok(command) => command,
        Err(ParseError::NotACommand) => return None,
        Err(e) => {
            debug!(line, error = %e, "rejected chat command");
            return Some(format!("{e}\n\n{HELP}"));
        }
    };

    let reply = match command {
        ChatCommand::AddAlert {
            token_id,
            target_price,
        } => match commands
            .add_alert(&token_id, target_price, requester.clone())
            .await
        {
            Ok(summary) => render_summary(&summary, band_tolerance, Utc::now()),
            Err(CommandError::PriceSource(e)) if e.is_not_found() => format!(
                "No trading pairs found for contract {token_id}. Please verify the address."
            ),
            Err(e) => {
                warn!(token_id = %token_id, error = %e, "add alert failed");
                format!("Could not set alert for {token_id}: {e}")
            }
        },
        ChatCommand::ListAlerts => render_alert_list(&commands.list_alerts().await),
        ChatCommand::RemoveToken { token_id } => match commands.remove_alert(&token_id).await {
            Ok(()) => format!("Alert for contract {token_id} has been removed."),
            Err(CommandError::NotFound(_)) => format!("No alert found for contract {token_id}."),
            Err(e) => {
                warn!(token_id = %token_id, error = %e, "remove alert failed");
                format!("Could not remove alert for {token_id}: {e}")
            }
        },
        ChatCommand::Help => HELP.to_string(),
    };

    Some(reply)
}
