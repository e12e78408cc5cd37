//! Определение победителей раунда.
//!
//! Победители выбираются по числу голосов: берутся winners_count лучших
//! различных результатов, и побеждают все участники с результатом не ниже
//! порогового. При равенстве голосов на границе победителей может оказаться
//! больше, чем winners_count, и это намеренно.

use rusqlite::Connection;

use crate::core::error::AppResult;
use crate::core::types::{Round, RoundType};
use crate::storage::db;

/// Участник с подсчитанными голосами.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredParticipant {
    pub participant_id: i64,
    pub full_name: String,
    pub votes: i64,
}

/// Победитель завершённого раунда. Для индивидуальных раундов
/// дополнительно несёт список проголосовавших "да".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Winner {
    pub participant_id: i64,
    pub full_name: String,
    pub votes: i64,
    pub yes_voters: Vec<i64>,
}

/// Выбирает победителей из подсчитанных голосов.
///
/// Порог — результат участника, замыкающего список из winners_count мест;
/// все с результатом не ниже порога побеждают. Участники без голосов не
/// побеждают никогда, даже если мест больше, чем участников с голосами.
pub fn select_winners(scored: &[ScoredParticipant], winners_count: i64) -> Vec<ScoredParticipant> {
    if winners_count <= 0 {
        return Vec::new();
    }

    let mut voted: Vec<ScoredParticipant> =
        scored.iter().filter(|s| s.votes > 0).cloned().collect();
    if voted.is_empty() {
        return Vec::new();
    }
    voted.sort_by(|a, b| b.votes.cmp(&a.votes));

    let last_place = (winners_count as usize).min(voted.len());
    let cutoff = voted[last_place - 1].votes;

    voted.retain(|s| s.votes >= cutoff);
    voted
}

/// Подсчитывает голоса раунда и возвращает победителей.
///
/// Для индивидуальных раундов учитываются только ответы "да" и каждому
/// победителю прикладывается список проголосовавших.
pub fn round_winners(conn: &Connection, round: &Round) -> AppResult<Vec<Winner>> {
    let yes_only = round.round_type == RoundType::Individual;
    let scored = db::vote_counts(conn, round.id, yes_only)?;
    let selected = select_winners(&scored, round.winners_count);

    let mut winners = Vec::with_capacity(selected.len());
    for s in selected {
        let yes_voters = if yes_only {
            db::yes_voters(conn, round.id, s.participant_id)?
        } else {
            Vec::new()
        };
        winners.push(Winner {
            participant_id: s.participant_id,
            full_name: s.full_name,
            votes: s.votes,
            yes_voters,
        });
    }
    Ok(winners)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scored(pairs: &[(i64, i64)]) -> Vec<ScoredParticipant> {
        pairs
            .iter()
            .map(|(id, votes)| ScoredParticipant {
                participant_id: *id,
                full_name: format!("Участник {id}"),
                votes: *votes,
            })
            .collect()
    }

    #[test]
    fn test_simple_top_three() {
        let winners = select_winners(&scored(&[(1, 10), (2, 7), (3, 5), (4, 2)]), 3);
        let ids: Vec<i64> = winners.iter().map(|w| w.participant_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_tie_at_cutoff_returns_extra_winners() {
        // Три места, голоса 5,5,4,4,2: третье место с результатом 4,
        // четвёртый участник с теми же 4 голосами тоже побеждает.
        let winners = select_winners(&scored(&[(1, 5), (2, 5), (3, 4), (4, 4), (5, 2)]), 3);
        let ids: Vec<i64> = winners.iter().map(|w| w.participant_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_zero_vote_participants_never_win() {
        let winners = select_winners(&scored(&[(1, 3), (2, 0), (3, 0)]), 3);
        let ids: Vec<i64> = winners.iter().map(|w| w.participant_id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_all_zero_votes_yields_no_winners() {
        assert!(select_winners(&scored(&[(1, 0), (2, 0)]), 3).is_empty());
    }

    #[test]
    fn test_fewer_participants_than_places() {
        let winners = select_winners(&scored(&[(1, 2), (2, 2)]), 5);
        assert_eq!(winners.len(), 2);
    }

    #[test]
    fn test_zero_places_requested() {
        assert!(select_winners(&scored(&[(1, 3)]), 0).is_empty());
    }
}
