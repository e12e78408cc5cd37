//! Domain types shared by the storage layer, the web API, and the bot.

use serde::{Deserialize, Serialize};

/// Статус раунда голосования.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Pending,
    Active,
    Ended,
}

impl RoundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundStatus::Pending => "pending",
            RoundStatus::Active => "active",
            RoundStatus::Ended => "ended",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RoundStatus::Pending),
            "active" => Some(RoundStatus::Active),
            "ended" => Some(RoundStatus::Ended),
            _ => None,
        }
    }
}

impl std::fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Тип раунда: "standard" — один голос на голосующего,
/// "individual" — да/нет по каждому участнику.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundType {
    #[default]
    Standard,
    Individual,
}

impl RoundType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundType::Standard => "standard",
            RoundType::Individual => "individual",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(RoundType::Standard),
            "individual" => Some(RoundType::Individual),
            _ => None,
        }
    }
}

impl std::fmt::Display for RoundType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Выбор в индивидуальном раунде.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Yes,
    No,
}

impl VoteChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteChoice::Yes => "yes",
            VoteChoice::No => "no",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "yes" => Some(VoteChoice::Yes),
            "no" => Some(VoteChoice::No),
            _ => None,
        }
    }
}

/// Кампания голосования.
#[derive(Debug, Clone)]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    pub admin_telegram_id: i64,
    pub created_at: String,
    pub is_active: bool,
}

/// Раунд внутри кампании.
#[derive(Debug, Clone)]
pub struct Round {
    pub id: i64,
    pub campaign_id: i64,
    pub number: i64,
    pub status: RoundStatus,
    pub round_type: RoundType,
    pub winners_count: i64,
    pub is_current: bool,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
}

/// Участник раунда.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: i64,
    pub round_id: i64,
    pub full_name: String,
    pub description: String,
    pub order_number: i64,
}

/// Нормализует ФИО участника: обрезает пробелы и приводит каждое слово
/// к заглавной букве. Слова, начинающиеся со скобки, не трогаем —
/// это пометки вида "(капитан)".
pub fn normalize_full_name(raw: &str) -> String {
    raw.trim()
        .split_whitespace()
        .map(|word| {
            if word.starts_with('(') {
                word.to_string()
            } else {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_status_round_trip() {
        for status in [RoundStatus::Pending, RoundStatus::Active, RoundStatus::Ended] {
            assert_eq!(RoundStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(RoundStatus::from_str("finished"), None);
    }

    #[test]
    fn test_normalize_full_name_title_cases_words() {
        assert_eq!(normalize_full_name("  иван петров "), "Иван Петров");
        assert_eq!(normalize_full_name("ANNA SMITH"), "Anna Smith");
    }

    #[test]
    fn test_normalize_full_name_keeps_parenthesized_words() {
        assert_eq!(normalize_full_name("иван петров (капитан)"), "Иван Петров (капитан)");
    }
}
