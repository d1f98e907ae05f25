use serde::{Deserialize, Serialize};

/// A claimable credential belonging to a mod. Goes from available to
/// claimed exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: i32,
    pub mod_id: i32,
    pub username: String,
    pub password: String,
    pub is_available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
}

impl NewAccount {
    /// Parses `username:password` lines. Only the first `:` separates the
    /// two parts, so passwords may contain colons. Blank or malformed lines
    /// are skipped.
    pub fn parse_bulk(text: &str) -> Vec<NewAccount> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let (username, password) = line.split_once(':')?;
                let username = username.trim();
                let password = password.trim();
                if username.is_empty() || password.is_empty() {
                    return None;
                }
                Some(NewAccount {
                    username: username.to_string(),
                    password: password.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_parse_keeps_colons_in_password() {
        let parsed = NewAccount::parse_bulk("alice:pa:ss\n\n  bob : secret \nbroken\n:nouser\ncarol:");
        assert_eq!(
            parsed,
            vec![
                NewAccount { username: "alice".into(), password: "pa:ss".into() },
                NewAccount { username: "bob".into(), password: "secret".into() },
            ]
        );
    }
}
