//! Свободный текст внутри многошаговых сценариев.
//!
//! Сюда попадают сообщения без команды. Если у чата нет живого диалога,
//! сообщение игнорируется. Правило ошибок одно на всех: сбой бэкенда
//! рвёт диалог, кривой пользовательский ввод — переспрашиваем.

use teloxide::prelude::*;
use teloxide::types::Message;

use super::types::{HandlerDeps, HandlerError};
use crate::core::error::AppError;
use crate::telegram::dialog::DialogState;

/// Стоп-слова, завершающие сбор участников.
const DONE_WORDS: &[&str] = &["готово", "всё", "стоп", "отмена", "finish", "done", "cancel"];

pub(crate) fn is_done_word(text: &str) -> bool {
    DONE_WORDS.contains(&text.trim().to_lowercase().as_str())
}

/// Разбирает строку "Имя Фамилия (описание)" на имя и описание.
pub(crate) fn parse_participant_line(line: &str) -> (String, String) {
    let line = line.trim();
    if line.ends_with(')') {
        if let Some(open) = line.rfind('(') {
            let name = line[..open].trim().to_string();
            let description = line[open + 1..line.len() - 1].trim().to_string();
            if !name.is_empty() {
                return (name, description);
            }
        }
    }
    (line.to_string(), String::new())
}

pub async fn handle_dialog_message(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(state) = deps.dialogs.get(msg.chat.id).await else {
        return Ok(());
    };

    match state {
        DialogState::StartRoundNewCampaignName => campaign_name_step(bot, msg, deps, text).await,
        DialogState::StartRoundNumber { campaign_id } => {
            round_number_step(bot, msg, deps, text, campaign_id).await
        }
        DialogState::AddParticipantCollect { round_id } => {
            collect_participant_step(bot, msg, deps, text, round_id).await
        }
        DialogState::TransferNewCampaignName { source_round_id } => {
            transfer_campaign_name_step(bot, msg, deps, text, source_round_id).await
        }
        // Шаги с кнопками: текст здесь не ждём
        DialogState::StartRoundChooseCampaign
        | DialogState::AddParticipantChooseRound
        | DialogState::TransferChooseAction { .. }
        | DialogState::TransferChooseRound { .. }
        | DialogState::TransferConfirm { .. } => {
            if is_done_word(text) {
                deps.dialogs.clear(msg.chat.id).await;
                bot.send_message(msg.chat.id, "Диалог отменён").await?;
            } else {
                bot.send_message(msg.chat.id, "Выберите вариант кнопкой или напишите «отмена»")
                    .await?;
            }
            Ok(())
        }
    }
}

/// Сбой бэкенда: диалог прерывается, ошибка уходит в чат.
async fn abort_dialog(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    err: AppError,
) -> Result<(), HandlerError> {
    deps.dialogs.clear(msg.chat.id).await;
    bot.send_message(msg.chat.id, format!("Ошибка: {}. Диалог прерван.", err)).await?;
    Ok(())
}

async fn campaign_name_step(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    text: &str,
) -> Result<(), HandlerError> {
    if is_done_word(text) {
        deps.dialogs.clear(msg.chat.id).await;
        bot.send_message(msg.chat.id, "Диалог отменён").await?;
        return Ok(());
    }

    let name = text.trim();
    if name.is_empty() {
        bot.send_message(msg.chat.id, "Название кампании не может быть пустым, введите ещё раз")
            .await?;
        return Ok(());
    }

    let campaign_id = match deps.api.create_campaign(name, super::commands::sender_id(msg)).await {
        Ok(id) => id,
        Err(e) => return abort_dialog(bot, msg, deps, e).await,
    };

    deps.dialogs.set(msg.chat.id, DialogState::StartRoundNumber { campaign_id }).await;
    bot.send_message(
        msg.chat.id,
        format!("Кампания «{}» создана. Введите номер раунда или «авто»", name),
    )
    .await?;
    Ok(())
}

async fn round_number_step(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    text: &str,
    campaign_id: i64,
) -> Result<(), HandlerError> {
    if is_done_word(text) {
        deps.dialogs.clear(msg.chat.id).await;
        bot.send_message(msg.chat.id, "Диалог отменён").await?;
        return Ok(());
    }

    let trimmed = text.trim().to_lowercase();
    let number = if trimmed == "авто" || trimmed == "auto" {
        None
    } else {
        match trimmed.parse::<i64>() {
            Ok(n) if n >= 1 => Some(n),
            _ => {
                bot.send_message(
                    msg.chat.id,
                    "Нужен номер раунда (целое число от 1) или «авто»",
                )
                .await?;
                return Ok(());
            }
        }
    };

    let started = match deps.api.start_round(campaign_id, number, None, None).await {
        Ok(started) => started,
        Err(e) => return abort_dialog(bot, msg, deps, e).await,
    };

    deps.dialogs.clear(msg.chat.id).await;
    bot.send_message(
        msg.chat.id,
        format!(
            "{}\nДобавьте участников командой /add_participant",
            started.message
        ),
    )
    .await?;
    Ok(())
}

async fn collect_participant_step(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    text: &str,
    round_id: i64,
) -> Result<(), HandlerError> {
    if is_done_word(text) {
        deps.dialogs.clear(msg.chat.id).await;
        bot.send_message(msg.chat.id, "Сбор участников завершён").await?;
        return Ok(());
    }

    let (full_name, description) = parse_participant_line(text);
    if full_name.is_empty() {
        bot.send_message(msg.chat.id, "Пустая строка. Формат: Имя Фамилия (описание)").await?;
        return Ok(());
    }

    // Ответ бэкенда по одной строке не рвёт сбор: сообщаем и ждём следующую
    match deps.api.add_participant(round_id, &full_name, &description).await {
        Ok(added) => {
            bot.send_message(
                msg.chat.id,
                format!("{} добавлен(а) под номером {}", added.full_name, added.order_number),
            )
            .await?;
        }
        Err(AppError::Api { message, .. }) => {
            bot.send_message(msg.chat.id, format!("Не добавлен: {}", message)).await?;
        }
        Err(e) => return abort_dialog(bot, msg, deps, e).await,
    }
    Ok(())
}

async fn transfer_campaign_name_step(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    text: &str,
    source_round_id: i64,
) -> Result<(), HandlerError> {
    if is_done_word(text) {
        deps.dialogs.clear(msg.chat.id).await;
        bot.send_message(msg.chat.id, "Перенос отменён").await?;
        return Ok(());
    }

    let name = text.trim();
    if name.is_empty() {
        bot.send_message(msg.chat.id, "Название кампании не может быть пустым, введите ещё раз")
            .await?;
        return Ok(());
    }

    let outcome = async {
        let campaign_id = deps.api.create_campaign(name, super::commands::sender_id(msg)).await?;
        let started = deps.api.start_round(campaign_id, None, None, None).await?;
        deps.api.transfer_winners(source_round_id, started.round_id).await
    }
    .await;

    match outcome {
        Ok(summary) => {
            deps.dialogs.clear(msg.chat.id).await;
            let mut report = format!(
                "Добавлено {}/{} в новый раунд кампании «{}»",
                summary.transferred, summary.total_winners, name
            );
            if !summary.errors.is_empty() {
                report.push_str(&format!("\nОшибки:\n{}", summary.errors.join("\n")));
            }
            bot.send_message(msg.chat.id, report).await?;
            Ok(())
        }
        Err(e) => abort_dialog(bot, msg, deps, e).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_done_words() {
        for word in ["готово", "  ВСЁ ", "Стоп", "done", "Cancel"] {
            assert!(is_done_word(word), "word: {word:?}");
        }
        assert!(!is_done_word("Иван Петров"));
    }

    #[test]
    fn test_parse_participant_line_with_description() {
        assert_eq!(
            parse_participant_line("Иван Петров (капитан команды)"),
            ("Иван Петров".to_string(), "капитан команды".to_string())
        );
    }

    #[test]
    fn test_parse_participant_line_plain() {
        assert_eq!(
            parse_participant_line("  Анна Смирнова  "),
            ("Анна Смирнова".to_string(), String::new())
        );
    }

    #[test]
    fn test_parse_participant_line_unbalanced_paren() {
        assert_eq!(
            parse_participant_line("(капитан)"),
            ("(капитан)".to_string(), String::new())
        );
    }
}
