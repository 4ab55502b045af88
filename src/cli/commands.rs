//! Command execution
//!
//! Maps each parsed command onto the session store and the view-models, and
//! writes the result as CSV. A request rejected for authentication drops the
//! persisted session so the next command starts from `login`.

use std::io::Write;
use std::sync::Arc;
use tracing::{debug, warn};

use super::args::{
    CardsCommand, CliArgs, Command, Confirm, LoadsCommand, OpsCommand, Owner, UsersCommand,
};
use crate::config::Config;
use crate::core::{CardLedger, DashboardAggregator, SessionStore, UserDirectory, UserForm};
use crate::io::{self, FileStorage, HttpGateway};
use crate::types::{CardId, LedgerError, UserId, UserUpdate};

/// Build the runtime and run one command to completion
pub fn run(args: CliArgs, output: &mut dyn Write) -> Result<(), LedgerError> {
    let config = Config::load(args.api_url.clone(), args.session_dir.clone());
    debug!(api_url = %config.api_url, session_dir = %config.session_dir.display(), "configuration");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| LedgerError::Config {
            message: format!("Failed to create runtime: {e}"),
        })?;

    runtime.block_on(async {
        let app = App::new(&config)?;
        let result = app.execute(args.command, output).await;
        if let Err(e) = &result {
            if e.is_auth_failure() {
                app.drop_session().await;
            }
        }
        result
    })
}

struct App {
    session: Arc<SessionStore>,
    gateway: Arc<HttpGateway>,
}

impl App {
    fn new(config: &Config) -> Result<Self, LedgerError> {
        let storage = Arc::new(FileStorage::new(&config.session_dir));
        let session = Arc::new(SessionStore::restore(storage)?);
        let gateway = Arc::new(HttpGateway::new(config, Arc::clone(&session))?);
        Ok(Self { session, gateway })
    }

    async fn drop_session(&self) {
        if self.session.current().await.is_none() {
            return;
        }
        warn!("Credential rejected, the persisted session was cleared");
        if let Err(e) = self.session.logout().await {
            warn!("Failed to clear the session: {e}");
        }
    }

    async fn execute(&self, command: Command, output: &mut dyn Write) -> Result<(), LedgerError> {
        match command {
            Command::Login { email, password } => {
                let session = self
                    .session
                    .login(self.gateway.as_ref(), &email, &password)
                    .await?;
                io::write_session_csv(&session, output)
            }
            Command::Logout => self.session.logout().await,
            Command::Whoami { verify } => {
                let session = if verify {
                    self.session.verify(self.gateway.as_ref()).await?
                } else {
                    self.session.require().await?
                };
                io::write_session_csv(&session, output)
            }
            Command::Users(command) => self.users(command, output).await,
            Command::Cards(command) => self.cards(command, output).await,
            Command::Loads(command) => self.loads(command, output).await,
            Command::Ops(command) => self.ops(command, output).await,
            Command::Dashboard { user, details } => self.dashboard(user, details, output).await,
        }
    }

    async fn users(&self, command: UsersCommand, output: &mut dyn Write) -> Result<(), LedgerError> {
        self.session.require().await?;
        let mut directory = UserDirectory::new(Arc::clone(&self.gateway));

        match command {
            UsersCommand::List { search } => {
                directory.load().await?;
                directory.set_query(search.as_deref().unwrap_or(""));
                io::write_users_csv(&directory.filtered(), output)
            }
            UsersCommand::Create {
                email,
                fullname,
                password,
                role,
            } => {
                let created = directory
                    .create(UserForm {
                        email,
                        fullname,
                        password,
                        role,
                    })
                    .await?;
                io::write_users_csv(&[&created], output)
            }
            UsersCommand::Update {
                id,
                email,
                fullname,
                password,
                role,
            } => {
                let update = UserUpdate {
                    email,
                    fullname,
                    password: password.filter(|p| !p.is_empty()),
                    role,
                };
                if update == UserUpdate::default() {
                    return Err(LedgerError::missing_field("email, fullname, password or role"));
                }
                let updated = directory.apply_update(id, update).await?;
                io::write_users_csv(&[&updated], output)
            }
            UsersCommand::Delete { id, confirm } => {
                let pending = directory.request_delete(id);
                require_confirmation(confirm, || format!("delete user {id}"))?;
                directory.confirm_delete(pending).await
            }
            UsersCommand::Balances => {
                let balances = DashboardAggregator::new(Arc::clone(&self.gateway))
                    .brand_balances()
                    .await?;
                io::write_brand_balances_csv(&balances, output)
            }
        }
    }

    async fn cards(&self, command: CardsCommand, output: &mut dyn Write) -> Result<(), LedgerError> {
        match command {
            CardsCommand::List { owner } => {
                let ledger = self.ledger(owner).await?;
                let state = ledger.snapshot().await;
                io::write_cards_csv(&state.cards, None, output)
            }
            CardsCommand::Show { card, owner } => {
                let ledger = self.ledger_with_lists(owner, card).await?;
                let state = ledger.snapshot().await;
                let selected: Vec<_> = state.selected_card.into_iter().collect();
                io::write_cards_csv(&selected, Some(card), &mut *output)?;
                blank_line(output)?;
                io::write_operations_csv(&state.operations, &mut *output)?;
                blank_line(output)?;
                io::write_loads_csv(&state.loads, output)
            }
            CardsCommand::Recharge {
                card,
                amount,
                owner,
            } => {
                let ledger = self.ledger_on(owner, card).await?;
                let outcome = ledger.recharge(card, &amount).await?;
                io::write_outcome_csv(card, &outcome, output)
            }
        }
    }

    async fn loads(&self, command: LoadsCommand, output: &mut dyn Write) -> Result<(), LedgerError> {
        let (card, outcome) = match command {
            LoadsCommand::Edit {
                card,
                load,
                amount,
                owner,
            } => {
                let ledger = self.ledger_with_lists(owner, card).await?;
                (card, ledger.edit_recharge(load, &amount).await?)
            }
            LoadsCommand::Delete {
                card,
                load,
                confirm,
                owner,
            } => {
                require_confirmation(confirm, || format!("delete recharge {load}"))?;
                let ledger = self.ledger_with_lists(owner, card).await?;
                (card, ledger.delete_recharge(load).await?)
            }
        };
        io::write_outcome_csv(card, &outcome, output)
    }

    async fn ops(&self, command: OpsCommand, output: &mut dyn Write) -> Result<(), LedgerError> {
        let (card, outcome) = match command {
            OpsCommand::Add {
                card,
                debit,
                designation,
                owner,
            } => {
                let ledger = self.ledger_on(owner, card).await?;
                (card, ledger.add_operation(card, &designation, &debit).await?)
            }
            OpsCommand::Edit {
                card,
                operation,
                debit,
                designation,
                owner,
            } => {
                let ledger = self.ledger_with_lists(owner, card).await?;
                (
                    card,
                    ledger
                        .edit_operation(operation, designation.as_deref(), &debit)
                        .await?,
                )
            }
            OpsCommand::Delete {
                card,
                operation,
                confirm,
                owner,
            } => {
                require_confirmation(confirm, || format!("delete operation {operation}"))?;
                let ledger = self.ledger_with_lists(owner, card).await?;
                (card, ledger.delete_operation(operation).await?)
            }
        };
        io::write_outcome_csv(card, &outcome, output)
    }

    async fn dashboard(
        &self,
        user: Option<UserId>,
        details: bool,
        output: &mut dyn Write,
    ) -> Result<(), LedgerError> {
        let session = self.session.require().await?;
        let aggregator = DashboardAggregator::new(Arc::clone(&self.gateway));

        if details {
            let details = aggregator
                .user_details(user.unwrap_or(session.user_id))
                .await?;
            io::write_user_details_csv(&details, &mut *output)?;
            blank_line(output)?;
            return io::write_activity_csv(&details.operations, output);
        }

        let summary = match user {
            Some(id) => aggregator.for_user(id).await?,
            None if session.is_admin() => aggregator.for_admin().await?,
            None => aggregator.for_user(session.user_id).await?,
        };
        io::write_summary_csv(&summary, &mut *output)?;
        blank_line(output)?;
        io::write_activity_csv(&summary.recent_operations, output)
    }

    /// Ledger over the owner's cards, loaded
    async fn ledger(&self, owner: Owner) -> Result<CardLedger<HttpGateway>, LedgerError> {
        let session = self.session.require().await?;
        let ledger = CardLedger::new(
            Arc::clone(&self.gateway),
            owner.user.unwrap_or(session.user_id),
        );
        ledger.load_cards().await?;
        Ok(ledger)
    }

    /// Ledger with `card` selected
    ///
    /// Its lists are loaded too, but failing to fetch them is not an error.
    async fn ledger_on(
        &self,
        owner: Owner,
        card: CardId,
    ) -> Result<CardLedger<HttpGateway>, LedgerError> {
        let ledger = self.ledger(owner).await?;
        ledger.select_card(card).await?;
        Ok(ledger)
    }

    /// Ledger with `card` selected and its lists loaded
    async fn ledger_with_lists(
        &self,
        owner: Owner,
        card: CardId,
    ) -> Result<CardLedger<HttpGateway>, LedgerError> {
        let ledger = self.ledger(owner).await?;
        ledger.open_card(card).await?;
        Ok(ledger)
    }
}

fn require_confirmation(
    confirm: Confirm,
    action: impl FnOnce() -> String,
) -> Result<(), LedgerError> {
    if confirm.yes {
        Ok(())
    } else {
        Err(LedgerError::ConfirmationRequired { action: action() })
    }
}

fn blank_line(output: &mut dyn Write) -> Result<(), LedgerError> {
    output.write_all(b"\n").map_err(|e| LedgerError::Output {
        message: format!("Failed to write output: {e}"),
    })
}
