use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::types::{CardId, LoadId, OperationId, Role, UserId};

/// Administer prepaid fuel and payment cards
#[derive(Parser, Debug)]
#[command(name = "cardscore")]
#[command(about = "Administer prepaid fuel and payment cards", long_about = None)]
pub struct CliArgs {
    /// API base URL
    #[arg(
        long = "api-url",
        value_name = "URL",
        global = true,
        help = "API base URL (overrides CARDSCORE_API_URL)"
    )]
    pub api_url: Option<String>,

    /// Directory holding the persisted session
    #[arg(
        long = "session-dir",
        value_name = "DIR",
        global = true,
        help = "Session directory (overrides CARDSCORE_SESSION_DIR)"
    )]
    pub session_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Authenticate and persist the session
    Login {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Forget the persisted session
    Logout,
    /// Show the signed-in identity
    Whoami {
        /// Check the credential with the server first
        #[arg(long)]
        verify: bool,
    },
    /// Manage users (admin)
    #[command(subcommand)]
    Users(UsersCommand),
    /// Browse cards and recharge them
    #[command(subcommand)]
    Cards(CardsCommand),
    /// Edit or cancel recharges
    #[command(subcommand)]
    Loads(LoadsCommand),
    /// Record, edit or delete operations
    #[command(subcommand)]
    Ops(OpsCommand),
    /// Show dashboard totals and recent activity
    Dashboard {
        /// Aggregate a single user instead of the signed-in one
        #[arg(long, value_name = "ID")]
        user: Option<UserId>,
        /// Print per-card totals and history instead of the summary
        #[arg(long)]
        details: bool,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum UsersCommand {
    /// List users, optionally filtered by email or name
    List {
        #[arg(long, value_name = "TEXT")]
        search: Option<String>,
    },
    /// Register a new user
    Create {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "NAME")]
        fullname: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
        #[arg(long, value_name = "ROLE", default_value = "user")]
        role: Role,
    },
    /// Change some fields of a user
    Update {
        id: UserId,
        #[arg(long, value_name = "EMAIL")]
        email: Option<String>,
        #[arg(long, value_name = "NAME")]
        fullname: Option<String>,
        #[arg(long, value_name = "PASSWORD")]
        password: Option<String>,
        #[arg(long, value_name = "ROLE")]
        role: Option<Role>,
    },
    /// Delete a user
    Delete {
        id: UserId,
        #[command(flatten)]
        confirm: Confirm,
    },
    /// Per-user balances by card brand
    Balances,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum CardsCommand {
    /// List a user's cards
    List {
        #[command(flatten)]
        owner: Owner,
    },
    /// Show a card with its operations and recharges
    Show {
        card: CardId,
        #[command(flatten)]
        owner: Owner,
    },
    /// Credit a card
    Recharge {
        card: CardId,
        #[arg(value_name = "AMOUNT", allow_hyphen_values = true)]
        amount: String,
        #[command(flatten)]
        owner: Owner,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum LoadsCommand {
    /// Change the amount of a recharge
    Edit {
        card: CardId,
        load: LoadId,
        #[arg(value_name = "AMOUNT", allow_hyphen_values = true)]
        amount: String,
        #[command(flatten)]
        owner: Owner,
    },
    /// Cancel a recharge
    Delete {
        card: CardId,
        load: LoadId,
        #[command(flatten)]
        confirm: Confirm,
        #[command(flatten)]
        owner: Owner,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum OpsCommand {
    /// Debit a card with a new operation
    Add {
        card: CardId,
        #[arg(long, value_name = "AMOUNT", allow_hyphen_values = true)]
        debit: String,
        #[arg(long, value_name = "LABEL", default_value = "")]
        designation: String,
        #[command(flatten)]
        owner: Owner,
    },
    /// Change the debit, and optionally the label, of an operation
    Edit {
        card: CardId,
        operation: OperationId,
        #[arg(long, value_name = "AMOUNT", allow_hyphen_values = true)]
        debit: String,
        /// Keeps the current label when omitted
        #[arg(long, value_name = "LABEL")]
        designation: Option<String>,
        #[command(flatten)]
        owner: Owner,
    },
    /// Delete an operation
    Delete {
        card: CardId,
        operation: OperationId,
        #[command(flatten)]
        confirm: Confirm,
        #[command(flatten)]
        owner: Owner,
    },
}

/// Whose cards a command works on
#[derive(Args, Debug, Clone, Copy, PartialEq)]
pub struct Owner {
    /// Defaults to the signed-in user
    #[arg(long = "user", value_name = "ID")]
    pub user: Option<UserId>,
}

/// Second step of a destructive command
#[derive(Args, Debug, Clone, Copy, PartialEq)]
pub struct Confirm {
    #[arg(long = "yes", help = "Confirm the deletion")]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(args: &[&str]) -> Command {
        CliArgs::try_parse_from(args).unwrap().command
    }

    #[rstest]
    #[case::logout(&["cardscore", "logout"], Command::Logout)]
    #[case::whoami(&["cardscore", "whoami"], Command::Whoami { verify: false })]
    #[case::whoami_verify(&["cardscore", "whoami", "--verify"], Command::Whoami { verify: true })]
    #[case::dashboard(
        &["cardscore", "dashboard"],
        Command::Dashboard { user: None, details: false }
    )]
    #[case::dashboard_details(
        &["cardscore", "dashboard", "--user", "4", "--details"],
        Command::Dashboard { user: Some(4), details: true }
    )]
    fn test_top_level_commands(#[case] args: &[&str], #[case] expected: Command) {
        assert_eq!(parse(args), expected);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let parsed = CliArgs::try_parse_from([
            "cardscore",
            "cards",
            "list",
            "--api-url",
            "http://localhost:4000/api",
            "--session-dir",
            "/tmp/s",
        ])
        .unwrap();

        assert_eq!(parsed.api_url.as_deref(), Some("http://localhost:4000/api"));
        assert_eq!(parsed.session_dir, Some(PathBuf::from("/tmp/s")));
        assert_eq!(
            parsed.command,
            Command::Cards(CardsCommand::List {
                owner: Owner { user: None }
            })
        );
    }

    #[rstest]
    #[case::default_role(&["cardscore", "users", "create", "--email", "a@b.ma", "--fullname", "A", "--password", "pw"], Role::User)]
    #[case::admin(&["cardscore", "users", "create", "--email", "a@b.ma", "--fullname", "A", "--password", "pw", "--role", "admin"], Role::Admin)]
    fn test_users_create_role(#[case] args: &[&str], #[case] expected: Role) {
        match parse(args) {
            Command::Users(UsersCommand::Create { role, .. }) => assert_eq!(role, expected),
            other => panic!("Expected users create, got {:?}", other),
        }
    }

    #[test]
    fn test_ops_add() {
        assert_eq!(
            parse(&[
                "cardscore",
                "ops",
                "add",
                "3",
                "--debit",
                "20.5",
                "--designation",
                "Fuel",
                "--user",
                "9"
            ]),
            Command::Ops(OpsCommand::Add {
                card: 3,
                debit: "20.5".to_string(),
                designation: "Fuel".to_string(),
                owner: Owner { user: Some(9) },
            })
        );
    }

    #[rstest]
    #[case::label_omitted(&["cardscore", "ops", "edit", "3", "7", "--debit", "35"], None)]
    #[case::label_given(
        &["cardscore", "ops", "edit", "3", "7", "--debit", "35", "--designation", "Tolls"],
        Some("Tolls")
    )]
    fn test_ops_edit_designation(#[case] args: &[&str], #[case] designation: Option<&str>) {
        assert_eq!(
            parse(args),
            Command::Ops(OpsCommand::Edit {
                card: 3,
                operation: 7,
                debit: "35".to_string(),
                designation: designation.map(str::to_string),
                owner: Owner { user: None },
            })
        );
    }

    // Amounts are validated by the ledger, so a negative one must reach it
    #[test]
    fn test_negative_amount_is_passed_through() {
        assert_eq!(
            parse(&["cardscore", "cards", "recharge", "1", "-5"]),
            Command::Cards(CardsCommand::Recharge {
                card: 1,
                amount: "-5".to_string(),
                owner: Owner { user: None },
            })
        );
    }

    #[rstest]
    #[case::users(&["cardscore", "users", "delete", "2"], false)]
    #[case::users_confirmed(&["cardscore", "users", "delete", "2", "--yes"], true)]
    fn test_delete_confirmation_flag(#[case] args: &[&str], #[case] yes: bool) {
        assert_eq!(
            parse(args),
            Command::Users(UsersCommand::Delete {
                id: 2,
                confirm: Confirm { yes }
            })
        );
    }

    #[rstest]
    #[case::missing_command(&["cardscore"])]
    #[case::login_without_password(&["cardscore", "login", "--email", "a@b.ma"])]
    #[case::invalid_role(&["cardscore", "users", "update", "1", "--role", "owner"])]
    #[case::non_numeric_card(&["cardscore", "cards", "show", "abc"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
