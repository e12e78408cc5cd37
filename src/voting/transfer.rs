//! Перенос победителей завершённого раунда в другой раунд.

use rusqlite::Connection;

use crate::core::error::{AppError, AppResult};
use crate::core::types::{RoundStatus, RoundType};
use crate::storage::db;

use super::winners::round_winners;

/// Итог переноса. Ошибки по отдельным победителям собираются,
/// а не прерывают весь перенос.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    pub transferred: u32,
    pub total_winners: u32,
    pub errors: Vec<String>,
}

/// Переносит победителей из завершённого раунда в активный целевой.
///
/// На каждого победителя создаётся участник целевого раунда с пометкой
/// о происхождении в описании. При переносе из индивидуального раунда в
/// стандартный каждому проголосовавшему "да" восстанавливается голос за
/// нового участника, с проверкой на дубликат.
pub fn transfer_winners(
    conn: &Connection,
    round_id: i64,
    target_round_id: i64,
) -> AppResult<TransferSummary> {
    let source = db::get_round(conn, round_id)?
        .ok_or_else(|| AppError::NotFound("Раунд не найден".to_string()))?;
    let target = db::get_round(conn, target_round_id)?
        .ok_or_else(|| AppError::NotFound("Целевой раунд не найден".to_string()))?;

    if source.status != RoundStatus::Ended {
        return Err(AppError::Validation(
            "Переносить победителей можно только из завершённого раунда".to_string(),
        ));
    }
    if target.status != RoundStatus::Active {
        return Err(AppError::Validation("Целевой раунд не активен".to_string()));
    }

    let winners = round_winners(conn, &source)?;
    let seed_votes =
        source.round_type == RoundType::Individual && target.round_type == RoundType::Standard;

    let mut transferred = 0u32;
    let mut errors = Vec::new();

    for winner in &winners {
        let description = format!(
            "Перенесён из раунда {} (голосов: {})",
            source.number, winner.votes
        );
        let participant =
            match db::create_participant(conn, target_round_id, &winner.full_name, &description) {
                Ok(p) => p,
                Err(e) => {
                    log::warn!("Не удалось перенести участника '{}': {}", winner.full_name, e);
                    errors.push(format!("{}: {}", winner.full_name, e));
                    continue;
                }
            };
        transferred += 1;

        if seed_votes {
            for voter in &winner.yes_voters {
                match db::vote_exists(conn, target_round_id, *voter, participant.id) {
                    Ok(true) => continue,
                    Ok(false) => {
                        // целевой раунд стандартный, ответ да/нет не хранится
                        if let Err(e) =
                            db::create_vote(conn, target_round_id, participant.id, *voter, None)
                        {
                            errors.push(format!("голос {} за '{}': {}", voter, winner.full_name, e));
                        }
                    }
                    Err(e) => {
                        errors.push(format!("голос {} за '{}': {}", voter, winner.full_name, e));
                    }
                }
            }
        }
    }

    Ok(TransferSummary {
        transferred,
        total_winners: winners.len() as u32,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::VoteChoice;
    use pretty_assertions::assert_eq;

    fn test_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        crate::storage::migrations::run_migrations_for_test(&mut conn).unwrap();
        conn
    }

    #[test]
    fn test_transfer_requires_ended_source() {
        let conn = test_conn();
        let campaign = db::create_campaign(&conn, "Кампания", 1).unwrap();
        let source = db::create_round(&conn, campaign, 1, 3, RoundType::Standard).unwrap();
        let target = db::create_round(&conn, campaign, 2, 3, RoundType::Standard).unwrap();

        let result = transfer_winners(&conn, source, target);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_transfer_with_no_votes_succeeds_empty() {
        let conn = test_conn();
        let campaign = db::create_campaign(&conn, "Кампания", 1).unwrap();
        let source = db::create_round(&conn, campaign, 1, 3, RoundType::Standard).unwrap();
        db::create_participant(&conn, source, "Иван Петров", "").unwrap();
        db::mark_round_ended(&conn, source).unwrap();
        let target = db::create_round(&conn, campaign, 2, 3, RoundType::Standard).unwrap();

        let summary = transfer_winners(&conn, source, target).unwrap();
        assert_eq!(summary.transferred, 0);
        assert_eq!(summary.total_winners, 0);
        assert!(summary.errors.is_empty());
    }

    #[test]
    fn test_transfer_copies_winner_with_provenance_note() {
        let conn = test_conn();
        let campaign = db::create_campaign(&conn, "Кампания", 1).unwrap();
        let source = db::create_round(&conn, campaign, 1, 1, RoundType::Standard).unwrap();
        let p = db::create_participant(&conn, source, "Иван Петров", "").unwrap();
        db::create_vote(&conn, source, p.id, 100, None).unwrap();
        db::create_vote(&conn, source, p.id, 101, None).unwrap();
        db::mark_round_ended(&conn, source).unwrap();
        let target = db::create_round(&conn, campaign, 2, 3, RoundType::Standard).unwrap();

        let summary = transfer_winners(&conn, source, target).unwrap();
        assert_eq!(summary.transferred, 1);

        let moved = db::list_participants(&conn, target).unwrap();
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].full_name, "Иван Петров");
        assert_eq!(moved[0].description, "Перенесён из раунда 1 (голосов: 2)");
    }

    #[test]
    fn test_individual_to_standard_reseeds_yes_votes() {
        let conn = test_conn();
        let campaign = db::create_campaign(&conn, "Кампания", 1).unwrap();
        let source = db::create_round(&conn, campaign, 1, 1, RoundType::Individual).unwrap();
        let p = db::create_participant(&conn, source, "Иван Петров", "").unwrap();
        db::create_vote(&conn, source, p.id, 100, Some(VoteChoice::Yes)).unwrap();
        db::create_vote(&conn, source, p.id, 101, Some(VoteChoice::No)).unwrap();
        db::create_vote(&conn, source, p.id, 102, Some(VoteChoice::Yes)).unwrap();
        db::mark_round_ended(&conn, source).unwrap();
        let target = db::create_round(&conn, campaign, 2, 3, RoundType::Standard).unwrap();

        let summary = transfer_winners(&conn, source, target).unwrap();
        assert_eq!(summary.transferred, 1);
        assert!(summary.errors.is_empty());

        let counts = db::vote_counts(&conn, target, false).unwrap();
        assert_eq!(counts[0].votes, 2);

        // в стандартном раунде восстановленные голоса идут без ответа да/нет
        let with_choice: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM votes WHERE round_id = ?1 AND choice IS NOT NULL",
                rusqlite::params![target],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(with_choice, 0);
    }
}
