//! Типизированные payload'ы инлайн-кнопок.
//!
//! Каждая кнопка несёт вариант CallbackAction в компактной строковой
//! форме (лимит Telegram — 64 байта). Кодирование и разбор живут в одном
//! месте; мусорный payload разбирается в None, а не в панику.

use crate::core::types::VoteChoice;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Голос: раунд, участник и ответ (для индивидуальных раундов).
    Vote {
        round_id: i64,
        participant_id: i64,
        choice: Option<VoteChoice>,
    },
    /// Выбор кампании в диалоге запуска раунда.
    ChooseCampaign(i64),
    /// Запуск раунда в новой кампании.
    NewCampaign,
    /// Выбор раунда для добавления участников.
    AddToRound(i64),
    /// Выбор раунда для завершения.
    EndRound(i64),
    /// Выбор раунда для назначения текущим.
    CurrentRound(i64),
    /// Перенос победителей: в существующий раунд.
    TransferExisting,
    /// Перенос победителей: конкретный целевой раунд.
    TransferTarget(i64),
    /// Перенос победителей: новый раунд той же кампании.
    TransferNewRound,
    /// Перенос победителей: новая кампания.
    TransferNewCampaign,
    /// Перенос победителей: пропустить.
    TransferSkip,
    /// Подтверждение переноса в указанный раунд.
    ConfirmTransfer(i64),
    /// Отмена текущего диалога.
    Cancel,
    /// Раздел справки: голосование или админские команды.
    HelpTopic(HelpTopic),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Voting,
    Admin,
}

impl CallbackAction {
    pub fn encode(&self) -> String {
        match self {
            CallbackAction::Vote { round_id, participant_id, choice: None } => {
                format!("v:{}:{}", round_id, participant_id)
            }
            CallbackAction::Vote { round_id, participant_id, choice: Some(VoteChoice::Yes) } => {
                format!("v:{}:{}:y", round_id, participant_id)
            }
            CallbackAction::Vote { round_id, participant_id, choice: Some(VoteChoice::No) } => {
                format!("v:{}:{}:n", round_id, participant_id)
            }
            CallbackAction::ChooseCampaign(id) => format!("camp:{}", id),
            CallbackAction::NewCampaign => "nc".to_string(),
            CallbackAction::AddToRound(id) => format!("ar:{}", id),
            CallbackAction::EndRound(id) => format!("er:{}", id),
            CallbackAction::CurrentRound(id) => format!("cr:{}", id),
            CallbackAction::TransferExisting => "tx".to_string(),
            CallbackAction::TransferTarget(id) => format!("tr:{}", id),
            CallbackAction::TransferNewRound => "tn".to_string(),
            CallbackAction::TransferNewCampaign => "tc".to_string(),
            CallbackAction::TransferSkip => "ts".to_string(),
            CallbackAction::ConfirmTransfer(id) => format!("ok:{}", id),
            CallbackAction::Cancel => "cancel".to_string(),
            CallbackAction::HelpTopic(HelpTopic::Voting) => "h:v".to_string(),
            CallbackAction::HelpTopic(HelpTopic::Admin) => "h:a".to_string(),
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        let parts: Vec<&str> = data.split(':').collect();
        match parts.as_slice() {
            ["v", round, participant] => Some(CallbackAction::Vote {
                round_id: round.parse().ok()?,
                participant_id: participant.parse().ok()?,
                choice: None,
            }),
            ["v", round, participant, choice] => {
                let choice = match *choice {
                    "y" => VoteChoice::Yes,
                    "n" => VoteChoice::No,
                    _ => return None,
                };
                Some(CallbackAction::Vote {
                    round_id: round.parse().ok()?,
                    participant_id: participant.parse().ok()?,
                    choice: Some(choice),
                })
            }
            ["camp", id] => Some(CallbackAction::ChooseCampaign(id.parse().ok()?)),
            ["nc"] => Some(CallbackAction::NewCampaign),
            ["ar", id] => Some(CallbackAction::AddToRound(id.parse().ok()?)),
            ["er", id] => Some(CallbackAction::EndRound(id.parse().ok()?)),
            ["cr", id] => Some(CallbackAction::CurrentRound(id.parse().ok()?)),
            ["tx"] => Some(CallbackAction::TransferExisting),
            ["tr", id] => Some(CallbackAction::TransferTarget(id.parse().ok()?)),
            ["tn"] => Some(CallbackAction::TransferNewRound),
            ["tc"] => Some(CallbackAction::TransferNewCampaign),
            ["ts"] => Some(CallbackAction::TransferSkip),
            ["ok", id] => Some(CallbackAction::ConfirmTransfer(id.parse().ok()?)),
            ["cancel"] => Some(CallbackAction::Cancel),
            ["h", "v"] => Some(CallbackAction::HelpTopic(HelpTopic::Voting)),
            ["h", "a"] => Some(CallbackAction::HelpTopic(HelpTopic::Admin)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip_all_variants() {
        let actions = [
            CallbackAction::Vote { round_id: 12, participant_id: 34, choice: None },
            CallbackAction::Vote { round_id: 12, participant_id: 34, choice: Some(VoteChoice::Yes) },
            CallbackAction::Vote { round_id: 12, participant_id: 34, choice: Some(VoteChoice::No) },
            CallbackAction::ChooseCampaign(5),
            CallbackAction::NewCampaign,
            CallbackAction::AddToRound(7),
            CallbackAction::EndRound(7),
            CallbackAction::CurrentRound(7),
            CallbackAction::TransferExisting,
            CallbackAction::TransferTarget(9),
            CallbackAction::TransferNewRound,
            CallbackAction::TransferNewCampaign,
            CallbackAction::TransferSkip,
            CallbackAction::ConfirmTransfer(9),
            CallbackAction::Cancel,
            CallbackAction::HelpTopic(HelpTopic::Voting),
            CallbackAction::HelpTopic(HelpTopic::Admin),
        ];
        for action in actions {
            assert_eq!(CallbackAction::parse(&action.encode()), Some(action));
        }
    }

    #[test]
    fn test_junk_parses_to_none() {
        for junk in ["", "vote_12_34", "v:abc:34", "v:1:2:maybe", "camp:", "zz:1", "h:x"] {
            assert_eq!(CallbackAction::parse(junk), None, "input: {junk:?}");
        }
    }

    #[test]
    fn test_payloads_fit_telegram_limit() {
        let long = CallbackAction::Vote {
            round_id: i64::MAX,
            participant_id: i64::MAX,
            choice: Some(VoteChoice::Yes),
        };
        assert!(long.encode().len() <= 64);
    }
}
