//! CSV output for every report the CLI prints
//!
//! Each writer emits a header row followed by one row per record. Amounts are
//! written with two decimal places and timestamps as RFC 3339; a missing
//! timestamp is an empty cell.
//!
//! All functions are pure apart from writing to `output`.

use chrono::{DateTime, Utc};
use csv::Writer;
use rust_decimal::Decimal;
use std::io::Write;

use crate::core::dashboard::{ActivityEntry, BrandBalances, DashboardSummary, UserDetails};
use crate::core::{MutationOutcome, Refresh};
use crate::types::{Card, CardId, LedgerError, Operation, Recharge, Session, User};

fn money(value: Decimal) -> String {
    format!("{:.2}", value)
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value.map(|at| at.to_rfc3339()).unwrap_or_default()
}

fn write_metric<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: String,
) -> Result<(), LedgerError> {
    writer.write_record([name, value.as_str()])?;
    Ok(())
}

fn output_error(error: std::io::Error) -> LedgerError {
    LedgerError::Output {
        message: format!("Failed to write output: {error}"),
    }
}

fn finish<W: Write>(writer: &mut Writer<W>) -> Result<(), LedgerError> {
    writer.flush().map_err(output_error)
}

fn refresh_label(refresh: Refresh) -> &'static str {
    match refresh {
        Refresh::Applied => "applied",
        Refresh::Stale => "stale",
        Refresh::Failed => "failed",
    }
}

/// Write cards with columns: id, type, number, balance, selected
pub fn write_cards_csv(
    cards: &[Card],
    selected: Option<CardId>,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = Writer::from_writer(output);
    writer.write_record(["id", "type", "number", "balance", "selected"])?;

    for card in cards {
        writer.write_record(&[
            card.id.to_string(),
            card.card_type.to_string(),
            card.number.clone().unwrap_or_default(),
            money(card.balance),
            (selected == Some(card.id)).to_string(),
        ])?;
    }

    finish(&mut writer)?;
    Ok(())
}

/// Write operations with columns: id, card, designation, debit, created_at
pub fn write_operations_csv(
    operations: &[Operation],
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = Writer::from_writer(output);
    writer.write_record(["id", "card", "designation", "debit", "created_at"])?;

    for operation in operations {
        writer.write_record(&[
            operation.id.to_string(),
            operation.card_id.to_string(),
            operation.designation.clone(),
            money(operation.debit),
            timestamp(operation.created_at),
        ])?;
    }

    finish(&mut writer)?;
    Ok(())
}

/// Write recharges with columns: id, card, amount, created_at
pub fn write_loads_csv(loads: &[Recharge], output: &mut dyn Write) -> Result<(), LedgerError> {
    let mut writer = Writer::from_writer(output);
    writer.write_record(["id", "card", "amount", "created_at"])?;

    for load in loads {
        writer.write_record(&[
            load.id.to_string(),
            load.card_id.to_string(),
            money(load.amount),
            timestamp(load.created_at),
        ])?;
    }

    finish(&mut writer)?;
    Ok(())
}

/// Write users with columns: id, email, fullname, role
pub fn write_users_csv(users: &[&User], output: &mut dyn Write) -> Result<(), LedgerError> {
    let mut writer = Writer::from_writer(output);
    writer.write_record(["id", "email", "fullname", "role"])?;

    for user in users {
        writer.write_record(&[
            user.id.to_string(),
            user.email.clone(),
            user.fullname.clone(),
            user.role.to_string(),
        ])?;
    }

    finish(&mut writer)?;
    Ok(())
}

/// Write the signed-in identity with columns: id, fullname, email, role
pub fn write_session_csv(session: &Session, output: &mut dyn Write) -> Result<(), LedgerError> {
    let mut writer = Writer::from_writer(output);
    writer.write_record(["id", "fullname", "email", "role"])?;
    writer.write_record(&[
        session.user_id.to_string(),
        session.fullname.clone(),
        session.email.clone(),
        session.role.to_string(),
    ])?;
    finish(&mut writer)?;
    Ok(())
}

/// Write the result of a balance-affecting action with columns: card, balance, refresh
pub fn write_outcome_csv(
    card_id: CardId,
    outcome: &MutationOutcome,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = Writer::from_writer(output);
    writer.write_record(["card", "balance", "refresh"])?;
    writer.write_record(&[
        card_id.to_string(),
        money(outcome.balance),
        refresh_label(outcome.refresh).to_string(),
    ])?;
    finish(&mut writer)?;
    Ok(())
}

/// Write dashboard totals as metric/value rows
///
/// `total_users` is only written for the admin dashboard.
pub fn write_summary_csv(
    summary: &DashboardSummary,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = Writer::from_writer(output);
    writer.write_record(["metric", "value"])?;
    write_metric(&mut writer, "total_balance", money(summary.total_balance))?;
    write_metric(&mut writer, "total_cards", summary.total_cards.to_string())?;
    write_metric(&mut writer, "total_operations", summary.total_operations.to_string())?;
    write_metric(&mut writer, "total_recharges", summary.total_recharges.to_string())?;
    if let Some(users) = summary.total_users {
        write_metric(&mut writer, "total_users", users.to_string())?;
    }
    finish(&mut writer)?;
    Ok(())
}

/// Write recent activity with columns: id, created_at, designation, debit, card_type, user
pub fn write_activity_csv(
    entries: &[ActivityEntry],
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = Writer::from_writer(output);
    writer.write_record(["id", "created_at", "designation", "debit", "card_type", "user"])?;

    for entry in entries {
        writer.write_record(&[
            entry.operation.id.to_string(),
            timestamp(entry.operation.created_at),
            entry.operation.designation.clone(),
            money(entry.operation.debit),
            entry.card_type.to_string(),
            entry.user_name.clone().unwrap_or_default(),
        ])?;
    }

    finish(&mut writer)?;
    Ok(())
}

/// Write one user's totals followed by a per-card breakdown
pub fn write_user_details_csv(
    details: &UserDetails,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = Writer::from_writer(&mut *output);
    writer.write_record(["metric", "value"])?;
    write_metric(&mut writer, "total_balance", money(details.total_balance))?;
    write_metric(&mut writer, "total_cards", details.total_cards.to_string())?;
    write_metric(&mut writer, "total_operations", details.total_operations.to_string())?;
    write_metric(&mut writer, "total_recharges", details.total_recharges.to_string())?;
    write_metric(&mut writer, "total_recharged", money(details.total_recharged_amount))?;
    write_metric(&mut writer, "total_spent", money(details.total_spent_amount))?;
    finish(&mut writer)?;
    drop(writer);

    // Second table has a different width
    output.write_all(b"\n").map_err(output_error)?;
    let mut writer = Writer::from_writer(output);
    writer.write_record([
        "card",
        "type",
        "balance",
        "spent",
        "recharged",
        "operations",
        "recharges",
    ])?;
    for stats in &details.cards {
        writer.write_record(&[
            stats.card.id.to_string(),
            stats.card.card_type.to_string(),
            money(stats.card.balance),
            money(stats.total_spent),
            money(stats.total_recharged),
            stats.operations_count.to_string(),
            stats.recharges_count.to_string(),
        ])?;
    }
    finish(&mut writer)?;
    Ok(())
}

/// Write per-user brand totals with columns: user, name, afriquia, attijari
pub fn write_brand_balances_csv(
    balances: &[BrandBalances],
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = Writer::from_writer(output);
    writer.write_record(["user", "name", "afriquia", "attijari"])?;

    for row in balances {
        writer.write_record(&[
            row.user.id.to_string(),
            row.user.display_name().to_string(),
            money(row.afriquia),
            money(row.attijari),
        ])?;
    }

    finish(&mut writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dashboard::CardStats;
    use crate::types::{CardType, Role};
    use chrono::TimeZone;
    use rstest::rstest;

    fn card(id: CardId, card_type: CardType, balance: Decimal) -> Card {
        Card {
            id,
            card_type,
            number: None,
            balance,
        }
    }

    fn render(write: impl FnOnce(&mut Vec<u8>) -> Result<(), LedgerError>) -> String {
        let mut output = Vec::new();
        write(&mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[rstest]
    #[case::none_selected(
        None,
        "id,type,number,balance,selected\n1,Afriquia,,100.00,false\n2,Attijari,,0.50,false\n"
    )]
    #[case::second_selected(
        Some(2),
        "id,type,number,balance,selected\n1,Afriquia,,100.00,false\n2,Attijari,,0.50,true\n"
    )]
    fn test_write_cards_csv(#[case] selected: Option<CardId>, #[case] expected: &str) {
        let cards = vec![
            card(1, CardType::Afriquia, Decimal::new(100, 0)),
            card(2, CardType::Attijari, Decimal::new(5, 1)),
        ];
        let output = render(|out| write_cards_csv(&cards, selected, out));
        assert_eq!(output, expected);
    }

    #[test]
    fn test_write_operations_csv_quotes_and_dates() {
        let operations = vec![
            Operation {
                id: 9,
                card_id: 1,
                designation: "Fuel, highway".to_string(),
                debit: Decimal::new(2050, 2),
                created_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()),
            },
            Operation {
                id: 10,
                card_id: 1,
                designation: "Toll".to_string(),
                debit: Decimal::new(7, 0),
                created_at: None,
            },
        ];

        let output = render(|out| write_operations_csv(&operations, out));
        assert_eq!(
            output,
            "id,card,designation,debit,created_at\n\
             9,1,\"Fuel, highway\",20.50,2024-03-01T08:30:00+00:00\n\
             10,1,Toll,7.00,\n"
        );
    }

    #[test]
    fn test_write_summary_csv_admin_only_users() {
        let mut summary = DashboardSummary {
            total_balance: Decimal::new(15025, 2),
            total_cards: 2,
            total_operations: 3,
            total_recharges: 4,
            total_users: None,
            recent_operations: vec![],
        };
        let user_view = render(|out| write_summary_csv(&summary, out));
        assert!(!user_view.contains("total_users"));
        assert!(user_view.contains("total_balance,150.25\n"));

        summary.total_users = Some(7);
        let admin_view = render(|out| write_summary_csv(&summary, out));
        assert!(admin_view.ends_with("total_users,7\n"));
    }

    #[test]
    fn test_write_outcome_csv() {
        let outcome = MutationOutcome {
            balance: Decimal::new(150, 0),
            refresh: Refresh::Failed,
        };
        let output = render(|out| write_outcome_csv(4, &outcome, out));
        assert_eq!(output, "card,balance,refresh\n4,150.00,failed\n");
    }

    #[test]
    fn test_write_user_details_csv_two_tables() {
        let details = UserDetails {
            total_balance: Decimal::new(80, 0),
            total_cards: 1,
            total_operations: 1,
            total_recharges: 1,
            total_recharged_amount: Decimal::new(100, 0),
            total_spent_amount: Decimal::new(20, 0),
            operations: vec![],
            loads: vec![],
            cards: vec![CardStats {
                card: card(3, CardType::Afriquia, Decimal::new(80, 0)),
                total_spent: Decimal::new(20, 0),
                total_recharged: Decimal::new(100, 0),
                operations_count: 1,
                recharges_count: 1,
            }],
        };

        let output = render(|out| write_user_details_csv(&details, out));
        assert!(output.contains("total_spent,20.00\n\ncard,type,balance"));
        assert!(output.ends_with("3,Afriquia,80.00,20.00,100.00,1,1\n"));
    }

    #[test]
    fn test_write_brand_balances_csv_falls_back_to_email() {
        let balances = vec![BrandBalances {
            user: User {
                id: 5,
                email: "driver@fleet.ma".to_string(),
                fullname: String::new(),
                role: Role::User,
            },
            afriquia: Decimal::new(12, 0),
            attijari: Decimal::ZERO,
        }];
        let output = render(|out| write_brand_balances_csv(&balances, out));
        assert_eq!(
            output,
            "user,name,afriquia,attijari\n5,driver@fleet.ma,12.00,0.00\n"
        );
    }
}
