//! `inception ...` administrative commands.

use crate::error::SessionError;

/// A recognized administrative command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// `inception get sqltypes`
    SqlTypes,
    /// `inception get encrypt_password <plain>`
    EncryptPassword(String),
    /// `inception show sessions`
    ShowSessions,
    /// `inception set sleep <session_id> <ms>`
    SetSleep { session_id: u32, ms: u64 },
    /// `inception set <rule> <value>`, applied to sessions started afterwards.
    SetRule { name: String, value: String },
    /// `inception kill <session_id> [force]`
    Kill { session_id: u32, force: bool },
}

const SLEEP_USAGE: &str = "Usage: inception set sleep <thread_id> <milliseconds>";
const KILL_USAGE: &str = "Usage: inception kill <thread_id> [force]";

/// Split off the first whitespace-delimited word.
fn next_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(end) => (&text[..end], text[end..].trim_start()),
        None => (text, ""),
    }
}

fn unquote(arg: &str) -> &str {
    let quoted = arg.len() >= 2
        && ((arg.starts_with('\'') && arg.ends_with('\''))
            || (arg.starts_with('"') && arg.ends_with('"')));
    if quoted { &arg[1..arg.len() - 1] } else { arg }
}

/// Recognize an administrative command.
///
/// Returns `None` when `text` is not an `inception get|show|set|kill`
/// command at all, and `Some(Err(..))` when it is one but malformed.
pub fn parse_admin(text: &str) -> Option<Result<AdminCommand, SessionError>> {
    let text = text
        .trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace());

    let (word, rest) = next_word(text);
    if !word.eq_ignore_ascii_case("inception") {
        return None;
    }
    let (verb, args) = next_word(rest);

    let command = match verb.to_ascii_lowercase().as_str() {
        "get" => parse_get(args),
        "show" => {
            if args.eq_ignore_ascii_case("sessions") {
                Ok(AdminCommand::ShowSessions)
            } else {
                Err(SessionError::UnknownCommand {
                    verb: "show",
                    supported: "sessions",
                })
            }
        }
        "set" => parse_set(args),
        "kill" => parse_kill(args),
        _ => return None,
    };
    Some(command)
}

fn parse_get(args: &str) -> Result<AdminCommand, SessionError> {
    let (sub, rest) = next_word(args);
    if sub.eq_ignore_ascii_case("sqltypes") && rest.is_empty() {
        return Ok(AdminCommand::SqlTypes);
    }
    if sub.eq_ignore_ascii_case("encrypt_password") && !rest.is_empty() {
        return Ok(AdminCommand::EncryptPassword(unquote(rest).to_string()));
    }
    Err(SessionError::UnknownCommand {
        verb: "get",
        supported: "sqltypes, encrypt_password",
    })
}

fn parse_set(args: &str) -> Result<AdminCommand, SessionError> {
    let (sub, rest) = next_word(args);
    if sub.is_empty() || rest.is_empty() {
        return Err(SessionError::UnknownCommand {
            verb: "set",
            supported: "sleep, <rule> <value>",
        });
    }
    if !sub.eq_ignore_ascii_case("sleep") {
        return Ok(AdminCommand::SetRule {
            name: sub.to_ascii_lowercase(),
            value: unquote(rest).to_string(),
        });
    }
    let usage = || SessionError::Usage(SLEEP_USAGE.to_string());
    let (id, rest) = next_word(rest);
    let (ms, _) = next_word(rest);
    let session_id = id.parse::<u32>().map_err(|_| usage())?;
    let ms = ms.parse::<u64>().map_err(|_| usage())?;
    Ok(AdminCommand::SetSleep { session_id, ms })
}

fn parse_kill(args: &str) -> Result<AdminCommand, SessionError> {
    let (id, rest) = next_word(args);
    let session_id = id
        .parse::<u32>()
        .map_err(|_| SessionError::Usage(KILL_USAGE.to_string()))?;
    let (flag, _) = next_word(rest);
    Ok(AdminCommand::Kill {
        session_id,
        force: flag.eq_ignore_ascii_case("force"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> Result<AdminCommand, SessionError> {
        parse_admin(text).expect("admin command")
    }

    #[test]
    fn test_commands() {
        assert_eq!(parse("inception get sqltypes;"), Ok(AdminCommand::SqlTypes));
        assert_eq!(parse("INCEPTION SHOW SESSIONS"), Ok(AdminCommand::ShowSessions));
        assert_eq!(
            parse("inception get encrypt_password 'my pass' ;"),
            Ok(AdminCommand::EncryptPassword("my pass".to_string()))
        );
        assert_eq!(
            parse("inception set sleep 12 500"),
            Ok(AdminCommand::SetSleep {
                session_id: 12,
                ms: 500
            })
        );
        assert_eq!(
            parse("inception set CHECK_PRIMARY_KEY 'warning'"),
            Ok(AdminCommand::SetRule {
                name: "check_primary_key".to_string(),
                value: "warning".to_string()
            })
        );
        assert_eq!(
            parse("inception kill 7 force"),
            Ok(AdminCommand::Kill {
                session_id: 7,
                force: true
            })
        );
        assert_eq!(
            parse("inception kill 7"),
            Ok(AdminCommand::Kill {
                session_id: 7,
                force: false
            })
        );
    }

    #[test]
    fn test_usage_errors() {
        assert_eq!(
            parse("inception set sleep x 5").unwrap_err().to_string(),
            SLEEP_USAGE
        );
        assert_eq!(
            parse("inception set sleep 5").unwrap_err().to_string(),
            SLEEP_USAGE
        );
        assert_eq!(parse("inception kill me").unwrap_err().to_string(), KILL_USAGE);
        assert_eq!(
            parse("inception set max_indexes").unwrap_err().to_string(),
            "Unknown inception set command. Supported: sleep, <rule> <value>"
        );
        assert_eq!(
            parse("inception show tables").unwrap_err().to_string(),
            "Unknown inception show command. Supported: sessions"
        );
        assert_eq!(
            parse("inception get nothing").unwrap_err().to_string(),
            "Unknown inception get command. Supported: sqltypes, encrypt_password"
        );
    }

    #[test]
    fn test_not_admin() {
        assert!(parse_admin("SELECT 1").is_none());
        assert!(parse_admin("inception_magic_start").is_none());
        assert!(parse_admin("inception drop everything").is_none());
    }
}
