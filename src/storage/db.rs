use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Result};

use crate::core::types::{Campaign, Participant, Round, RoundStatus, RoundType, VoteChoice};
use crate::voting::winners::ScoredParticipant;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Кампания в списке активных: порядковый номер вычисляется по позиции
/// в порядке создания, он не хранится в таблице.
#[derive(Debug, Clone)]
pub struct CampaignInfo {
    pub id: i64,
    pub name: String,
    pub order_number: i64,
    pub created_at: String,
}

/// Раунд вместе с данными кампании, как его отдаёт список активных раундов.
#[derive(Debug, Clone)]
pub struct RoundInfo {
    pub round: Round,
    pub campaign_name: String,
    pub campaign_order_number: i64,
}

/// Голос пользователя в стандартном раунде, для показа "вы уже голосовали".
#[derive(Debug, Clone)]
pub struct UserVote {
    pub participant_id: i64,
    pub participant_order: i64,
    pub participant_name: String,
    pub voted_at: String,
}

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and runs schema
/// migrations on the first connection.
pub fn create_pool(database_path: &str) -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::file(database_path);
    let pool = Pool::builder().max_size(10).build(manager)?;

    let mut conn = pool.get()?;
    super::migrations::run_migrations(&mut conn)?;

    Ok(pool)
}

/// Get a connection from the pool
pub fn get_connection(pool: &DbPool) -> std::result::Result<DbConnection, r2d2::Error> {
    pool.get()
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn round_from_row(row: &rusqlite::Row<'_>) -> Result<Round> {
    let status: String = row.get(3)?;
    let round_type: String = row.get(4)?;
    Ok(Round {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        number: row.get(2)?,
        status: RoundStatus::from_str(&status).unwrap_or(RoundStatus::Pending),
        round_type: RoundType::from_str(&round_type).unwrap_or_default(),
        winners_count: row.get(5)?,
        is_current: row.get::<_, i64>(6)? != 0,
        started_at: row.get(7)?,
        ended_at: row.get(8)?,
    })
}

const ROUND_COLUMNS: &str =
    "id, campaign_id, number, status, round_type, winners_count, is_current, started_at, ended_at";

// ---------------------------------------------------------------------------
// Campaigns
// ---------------------------------------------------------------------------

/// Создаёт кампанию и возвращает её id.
pub fn create_campaign(conn: &Connection, name: &str, admin_telegram_id: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO campaigns (name, admin_telegram_id, created_at, is_active) VALUES (?1, ?2, ?3, 1)",
        params![name, admin_telegram_id, now()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_campaign(conn: &Connection, id: i64) -> Result<Option<Campaign>> {
    conn.query_row(
        "SELECT id, name, admin_telegram_id, created_at, is_active FROM campaigns WHERE id = ?1",
        params![id],
        |row| {
            Ok(Campaign {
                id: row.get(0)?,
                name: row.get(1)?,
                admin_telegram_id: row.get(2)?,
                created_at: row.get(3)?,
                is_active: row.get::<_, i64>(4)? != 0,
            })
        },
    )
    .optional()
}

/// Порядковый номер кампании: позиция в порядке создания (с 1).
pub fn campaign_order_number(conn: &Connection, id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT ord FROM (
             SELECT id, ROW_NUMBER() OVER (ORDER BY created_at, id) AS ord FROM campaigns
         ) WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
}

pub fn list_active_campaigns(conn: &Connection) -> Result<Vec<CampaignInfo>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, ROW_NUMBER() OVER (ORDER BY created_at, id) AS ord, created_at
         FROM campaigns WHERE is_active = 1 ORDER BY created_at, id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(CampaignInfo {
            id: row.get(0)?,
            name: row.get(1)?,
            order_number: row.get(2)?,
            created_at: row.get(3)?,
        })
    })?;

    let mut campaigns = Vec::new();
    for row in rows {
        campaigns.push(row?);
    }
    Ok(campaigns)
}

// ---------------------------------------------------------------------------
// Rounds
// ---------------------------------------------------------------------------

/// Следующий номер раунда в кампании: max + 1, для пустой кампании 1.
pub fn next_round_number(conn: &Connection, campaign_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(number), 0) + 1 FROM rounds WHERE campaign_id = ?1",
        params![campaign_id],
        |row| row.get(0),
    )
}

pub fn round_number_exists(conn: &Connection, campaign_id: i64, number: i64) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM rounds WHERE campaign_id = ?1 AND number = ?2",
        params![campaign_id, number],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Создаёт раунд сразу в статусе active.
pub fn create_round(
    conn: &Connection,
    campaign_id: i64,
    number: i64,
    winners_count: i64,
    round_type: RoundType,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO rounds (campaign_id, number, status, round_type, winners_count, started_at)
         VALUES (?1, ?2, 'active', ?3, ?4, ?5)",
        params![campaign_id, number, round_type.as_str(), winners_count, now()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_round(conn: &Connection, id: i64) -> Result<Option<Round>> {
    conn.query_row(
        &format!("SELECT {ROUND_COLUMNS} FROM rounds WHERE id = ?1"),
        params![id],
        round_from_row,
    )
    .optional()
}

pub fn list_active_rounds(conn: &Connection) -> Result<Vec<RoundInfo>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.campaign_id, r.number, r.status, r.round_type, r.winners_count,
                r.is_current, r.started_at, r.ended_at,
                c.name,
                (SELECT COUNT(*) FROM campaigns c2
                 WHERE c2.created_at < c.created_at
                    OR (c2.created_at = c.created_at AND c2.id <= c.id))
         FROM rounds r JOIN campaigns c ON c.id = r.campaign_id
         WHERE r.status = 'active'
         ORDER BY r.started_at, r.id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(RoundInfo {
            round: round_from_row(row)?,
            campaign_name: row.get(9)?,
            campaign_order_number: row.get(10)?,
        })
    })?;

    let mut rounds = Vec::new();
    for row in rows {
        rounds.push(row?);
    }
    Ok(rounds)
}

/// Завершает раунд: статус ended, штамп времени, снятие флага is_current.
pub fn mark_round_ended(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "UPDATE rounds SET status = 'ended', ended_at = ?1, is_current = 0 WHERE id = ?2",
        params![now(), id],
    )?;
    Ok(())
}

pub fn clear_current_round(conn: &Connection) -> Result<()> {
    conn.execute("UPDATE rounds SET is_current = 0 WHERE is_current = 1", [])?;
    Ok(())
}

pub fn set_current_round(conn: &Connection, id: i64) -> Result<()> {
    clear_current_round(conn)?;
    conn.execute("UPDATE rounds SET is_current = 1 WHERE id = ?1", params![id])?;
    Ok(())
}

/// Текущий раунд: помеченный is_current и активный, иначе последний активный.
pub fn find_current_round(conn: &Connection) -> Result<Option<Round>> {
    let marked = conn
        .query_row(
            &format!("SELECT {ROUND_COLUMNS} FROM rounds WHERE is_current = 1 AND status = 'active'"),
            [],
            round_from_row,
        )
        .optional()?;
    if marked.is_some() {
        return Ok(marked);
    }

    conn.query_row(
        &format!(
            "SELECT {ROUND_COLUMNS} FROM rounds WHERE status = 'active' ORDER BY started_at DESC, id DESC LIMIT 1"
        ),
        [],
        round_from_row,
    )
    .optional()
}

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

pub fn next_participant_order(conn: &Connection, round_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(order_number), 0) + 1 FROM participants WHERE round_id = ?1",
        params![round_id],
        |row| row.get(0),
    )
}

/// Добавляет участника в раунд со следующим порядковым номером.
pub fn create_participant(
    conn: &Connection,
    round_id: i64,
    full_name: &str,
    description: &str,
) -> Result<Participant> {
    let order_number = next_participant_order(conn, round_id)?;
    conn.execute(
        "INSERT INTO participants (round_id, full_name, description, order_number) VALUES (?1, ?2, ?3, ?4)",
        params![round_id, full_name, description, order_number],
    )?;
    Ok(Participant {
        id: conn.last_insert_rowid(),
        round_id,
        full_name: full_name.to_string(),
        description: description.to_string(),
        order_number,
    })
}

pub fn list_participants(conn: &Connection, round_id: i64) -> Result<Vec<Participant>> {
    let mut stmt = conn.prepare(
        "SELECT id, round_id, full_name, description, order_number
         FROM participants WHERE round_id = ?1 ORDER BY order_number",
    )?;
    let rows = stmt.query_map(params![round_id], |row| {
        Ok(Participant {
            id: row.get(0)?,
            round_id: row.get(1)?,
            full_name: row.get(2)?,
            description: row.get(3)?,
            order_number: row.get(4)?,
        })
    })?;

    let mut participants = Vec::new();
    for row in rows {
        participants.push(row?);
    }
    Ok(participants)
}

pub fn get_participant(conn: &Connection, id: i64) -> Result<Option<Participant>> {
    conn.query_row(
        "SELECT id, round_id, full_name, description, order_number FROM participants WHERE id = ?1",
        params![id],
        |row| {
            Ok(Participant {
                id: row.get(0)?,
                round_id: row.get(1)?,
                full_name: row.get(2)?,
                description: row.get(3)?,
                order_number: row.get(4)?,
            })
        },
    )
    .optional()
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

pub fn vote_exists(conn: &Connection, round_id: i64, user_telegram_id: i64, participant_id: i64) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM votes WHERE round_id = ?1 AND user_telegram_id = ?2 AND participant_id = ?3",
        params![round_id, user_telegram_id, participant_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Записывает голос одним запросом с встроенной проверкой дубликата,
/// чтобы два одновременных запроса не прошли между проверкой и вставкой.
/// В стандартном раунде (`single_vote_per_round`) голос блокирует весь раунд,
/// в индивидуальном только этого участника. Возвращает false, если голос
/// уже был.
pub fn record_vote(
    conn: &Connection,
    round_id: i64,
    participant_id: i64,
    user_telegram_id: i64,
    choice: Option<VoteChoice>,
    single_vote_per_round: bool,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO votes (round_id, participant_id, user_telegram_id, choice, created_at)
         SELECT ?1, ?2, ?3, ?4, ?5
         WHERE NOT EXISTS (
             SELECT 1 FROM votes
             WHERE round_id = ?1 AND user_telegram_id = ?3
               AND (?6 OR participant_id = ?2)
         )",
        params![
            round_id,
            participant_id,
            user_telegram_id,
            choice.map(|c| c.as_str()),
            now(),
            single_vote_per_round,
        ],
    )?;
    Ok(inserted > 0)
}

pub fn create_vote(
    conn: &Connection,
    round_id: i64,
    participant_id: i64,
    user_telegram_id: i64,
    choice: Option<VoteChoice>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO votes (round_id, participant_id, user_telegram_id, choice, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![round_id, participant_id, user_telegram_id, choice.map(|c| c.as_str()), now()],
    )?;
    Ok(())
}

pub fn get_user_vote(conn: &Connection, round_id: i64, user_telegram_id: i64) -> Result<Option<UserVote>> {
    conn.query_row(
        "SELECT v.participant_id, p.order_number, p.full_name, v.created_at
         FROM votes v JOIN participants p ON p.id = v.participant_id
         WHERE v.round_id = ?1 AND v.user_telegram_id = ?2
         ORDER BY v.created_at LIMIT 1",
        params![round_id, user_telegram_id],
        |row| {
            Ok(UserVote {
                participant_id: row.get(0)?,
                participant_order: row.get(1)?,
                participant_name: row.get(2)?,
                voted_at: row.get(3)?,
            })
        },
    )
    .optional()
}

/// Все ответы пользователя в индивидуальном раунде.
pub fn list_user_choices(conn: &Connection, round_id: i64, user_telegram_id: i64) -> Result<Vec<(i64, String)>> {
    let mut stmt = conn.prepare(
        "SELECT participant_id, COALESCE(choice, '') FROM votes
         WHERE round_id = ?1 AND user_telegram_id = ?2 ORDER BY created_at",
    )?;
    let rows = stmt.query_map(params![round_id, user_telegram_id], |row| {
        Ok((row.get(0)?, row.get(1)?))
    })?;

    let mut choices = Vec::new();
    for row in rows {
        choices.push(row?);
    }
    Ok(choices)
}

/// Подсчёт голосов по участникам раунда. Для индивидуальных раундов
/// учитываются только ответы "да".
pub fn vote_counts(conn: &Connection, round_id: i64, yes_only: bool) -> Result<Vec<ScoredParticipant>> {
    let sql = if yes_only {
        "SELECT p.id, p.full_name, COUNT(v.id)
         FROM participants p
         LEFT JOIN votes v ON v.participant_id = p.id AND v.choice = 'yes'
         WHERE p.round_id = ?1
         GROUP BY p.id, p.full_name
         ORDER BY COUNT(v.id) DESC, p.order_number"
    } else {
        "SELECT p.id, p.full_name, COUNT(v.id)
         FROM participants p
         LEFT JOIN votes v ON v.participant_id = p.id
         WHERE p.round_id = ?1
         GROUP BY p.id, p.full_name
         ORDER BY COUNT(v.id) DESC, p.order_number"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![round_id], |row| {
        Ok(ScoredParticipant {
            participant_id: row.get(0)?,
            full_name: row.get(1)?,
            votes: row.get(2)?,
        })
    })?;

    let mut scored = Vec::new();
    for row in rows {
        scored.push(row?);
    }
    Ok(scored)
}

/// Telegram ID всех, кто ответил "да" по участнику.
pub fn yes_voters(conn: &Connection, round_id: i64, participant_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT user_telegram_id FROM votes
         WHERE round_id = ?1 AND participant_id = ?2 AND choice = 'yes'
         ORDER BY created_at",
    )?;
    let rows = stmt.query_map(params![round_id, participant_id], |row| row.get(0))?;

    let mut voters = Vec::new();
    for row in rows {
        voters.push(row?);
    }
    Ok(voters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        super::super::migrations::run_migrations_for_test(&mut conn).unwrap();
        conn
    }

    #[test]
    fn test_create_pool_migrates_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voting.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();

        let conn = get_connection(&pool).unwrap();
        let id = create_campaign(&conn, "Первая", 1).unwrap();
        assert_eq!(campaign_order_number(&conn, id).unwrap(), 1);

        // повторный запуск по той же базе не должен падать
        drop(conn);
        drop(pool);
        create_pool(path.to_str().unwrap()).unwrap();
    }

    #[test]
    fn test_campaign_order_number_follows_creation_order() {
        let conn = test_conn();
        let first = create_campaign(&conn, "Первая", 1).unwrap();
        let second = create_campaign(&conn, "Вторая", 1).unwrap();

        assert_eq!(campaign_order_number(&conn, first).unwrap(), 1);
        assert_eq!(campaign_order_number(&conn, second).unwrap(), 2);
    }

    #[test]
    fn test_next_round_number_defaults_to_one() {
        let conn = test_conn();
        let campaign = create_campaign(&conn, "Кампания", 1).unwrap();
        assert_eq!(next_round_number(&conn, campaign).unwrap(), 1);

        create_round(&conn, campaign, 5, 3, RoundType::Standard).unwrap();
        assert_eq!(next_round_number(&conn, campaign).unwrap(), 6);
    }

    #[test]
    fn test_round_number_unique_within_campaign() {
        let conn = test_conn();
        let campaign = create_campaign(&conn, "Кампания", 1).unwrap();
        create_round(&conn, campaign, 1, 3, RoundType::Standard).unwrap();

        let duplicate = create_round(&conn, campaign, 1, 3, RoundType::Standard);
        assert!(duplicate.is_err());
    }

    #[test]
    fn test_participant_order_is_sequential() {
        let conn = test_conn();
        let campaign = create_campaign(&conn, "Кампания", 1).unwrap();
        let round = create_round(&conn, campaign, 1, 3, RoundType::Standard).unwrap();

        let first = create_participant(&conn, round, "Иван Петров", "").unwrap();
        let second = create_participant(&conn, round, "Анна Смирнова", "").unwrap();
        assert_eq!(first.order_number, 1);
        assert_eq!(second.order_number, 2);
    }

    #[test]
    fn test_duplicate_vote_rejected_by_unique_index() {
        let conn = test_conn();
        let campaign = create_campaign(&conn, "Кампания", 1).unwrap();
        let round = create_round(&conn, campaign, 1, 3, RoundType::Standard).unwrap();
        let participant = create_participant(&conn, round, "Иван Петров", "").unwrap();

        create_vote(&conn, round, participant.id, 42, None).unwrap();
        let duplicate = create_vote(&conn, round, participant.id, 42, None);
        assert!(duplicate.is_err());
    }

    #[test]
    fn test_record_vote_blocks_second_standard_vote_without_precheck() {
        let conn = test_conn();
        let campaign = create_campaign(&conn, "Кампания", 1).unwrap();
        let round = create_round(&conn, campaign, 1, 3, RoundType::Standard).unwrap();
        let first = create_participant(&conn, round, "Иван Петров", "").unwrap();
        let second = create_participant(&conn, round, "Анна Смирнова", "").unwrap();

        // сама вставка отсекает дубликат, даже за другого участника
        assert!(record_vote(&conn, round, first.id, 100, None, true).unwrap());
        assert!(!record_vote(&conn, round, second.id, 100, None, true).unwrap());

        let total: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM votes WHERE round_id = ?1 AND user_telegram_id = 100",
                params![round],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(total, 1);
    }

    #[test]
    fn test_record_vote_individual_allows_one_answer_per_participant() {
        let conn = test_conn();
        let campaign = create_campaign(&conn, "Кампания", 1).unwrap();
        let round = create_round(&conn, campaign, 1, 3, RoundType::Individual).unwrap();
        let first = create_participant(&conn, round, "Иван Петров", "").unwrap();
        let second = create_participant(&conn, round, "Анна Смирнова", "").unwrap();

        assert!(record_vote(&conn, round, first.id, 100, Some(VoteChoice::Yes), false).unwrap());
        assert!(record_vote(&conn, round, second.id, 100, Some(VoteChoice::No), false).unwrap());
        assert!(!record_vote(&conn, round, first.id, 100, Some(VoteChoice::No), false).unwrap());
    }

    #[test]
    fn test_vote_counts_yes_only_ignores_no_answers() {
        let conn = test_conn();
        let campaign = create_campaign(&conn, "Кампания", 1).unwrap();
        let round = create_round(&conn, campaign, 1, 3, RoundType::Individual).unwrap();
        let participant = create_participant(&conn, round, "Иван Петров", "").unwrap();

        create_vote(&conn, round, participant.id, 1, Some(VoteChoice::Yes)).unwrap();
        create_vote(&conn, round, participant.id, 2, Some(VoteChoice::No)).unwrap();
        create_vote(&conn, round, participant.id, 3, Some(VoteChoice::Yes)).unwrap();

        let scored = vote_counts(&conn, round, true).unwrap();
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].votes, 2);
        assert_eq!(yes_voters(&conn, round, participant.id).unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_find_current_round_prefers_marked() {
        let conn = test_conn();
        let campaign = create_campaign(&conn, "Кампания", 1).unwrap();
        let first = create_round(&conn, campaign, 1, 3, RoundType::Standard).unwrap();
        let second = create_round(&conn, campaign, 2, 3, RoundType::Standard).unwrap();

        // Без пометки берётся последний активный
        assert_eq!(find_current_round(&conn).unwrap().unwrap().id, second);

        set_current_round(&conn, first).unwrap();
        assert_eq!(find_current_round(&conn).unwrap().unwrap().id, first);

        mark_round_ended(&conn, first).unwrap();
        assert_eq!(find_current_round(&conn).unwrap().unwrap().id, second);
    }
}
