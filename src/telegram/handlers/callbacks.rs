//! Обработка нажатий инлайн-кнопок.

use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, ChatId, InlineKeyboardMarkup};

use super::commands::{cb, rounds_keyboard};
use super::types::{HandlerDeps, HandlerError};
use crate::config;
use crate::core::error::AppError;
use crate::telegram::callback::{CallbackAction, HelpTopic};
use crate::telegram::dialog::DialogState;

const HELP_VOTING: &str = "Голосование:\n\
    /vote — показать участников текущего раунда и проголосовать\n\
    /list — активные раунды\n\
    /participants — участники текущего раунда\n\
    /status — текущий раунд и его статус\n\
    /myid — ваш Telegram ID\n\n\
    В стандартном раунде у вас один голос, в индивидуальном — ответ \
    да/нет по каждому участнику.";

const HELP_ADMIN: &str = "Администрирование:\n\
    /start_round — запустить раунд (с выбором или созданием кампании)\n\
    /add_participant — добавить участников построчно\n\
    /end_round — завершить раунд, показать победителей, предложить перенос\n\
    /set_current_round — назначить текущий раунд\n\n\
    Команды доступны только администраторам из ADMIN_IDS.";

/// Действия, разрешённые только администраторам.
fn requires_admin(action: &CallbackAction) -> bool {
    !matches!(
        action,
        CallbackAction::Vote { .. } | CallbackAction::Cancel | CallbackAction::HelpTopic(_)
    )
}

pub async fn handle_callback(bot: &Bot, q: CallbackQuery, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let callback_id = q.id.clone();
    let chat_id = q.message.as_ref().map(|m| m.chat().id);
    let user_id = i64::try_from(q.from.id.0).unwrap_or(0);

    let Some(action) = q.data.as_deref().and_then(CallbackAction::parse) else {
        bot.answer_callback_query(callback_id).text("Кнопка устарела").await?;
        return Ok(());
    };

    if requires_admin(&action) && !config::admin::is_admin(user_id) {
        bot.answer_callback_query(callback_id).text("Недостаточно прав").await?;
        return Ok(());
    }

    let Some(chat_id) = chat_id else {
        bot.answer_callback_query(callback_id).text("Сообщение устарело").await?;
        return Ok(());
    };

    match action {
        CallbackAction::Vote { round_id, participant_id, choice } => {
            let result = deps
                .api
                .vote(round_id, participant_id, user_id, choice.map(|c| c.as_str()))
                .await;
            match result {
                Ok(message) => {
                    bot.answer_callback_query(callback_id).text(message).await?;
                }
                Err(AppError::Api { message, .. }) => {
                    bot.answer_callback_query(callback_id).text(message).await?;
                }
                Err(e) => {
                    log::error!("Vote failed for user {}: {}", user_id, e);
                    bot.answer_callback_query(callback_id).text("Не удалось отправить голос").await?;
                }
            }
        }

        CallbackAction::ChooseCampaign(campaign_id) => {
            deps.dialogs.set(chat_id, DialogState::StartRoundNumber { campaign_id }).await;
            bot.answer_callback_query(callback_id).await?;
            bot.send_message(chat_id, "Введите номер раунда или «авто»").await?;
        }

        CallbackAction::NewCampaign => {
            deps.dialogs.set(chat_id, DialogState::StartRoundNewCampaignName).await;
            bot.answer_callback_query(callback_id).await?;
            bot.send_message(chat_id, "Введите название новой кампании").await?;
        }

        CallbackAction::AddToRound(round_id) => {
            deps.dialogs.set(chat_id, DialogState::AddParticipantCollect { round_id }).await;
            bot.answer_callback_query(callback_id).await?;
            bot.send_message(
                chat_id,
                "Присылайте участников по одному в строке: Имя Фамилия (описание).\n\
                 Когда закончите — напишите «готово»",
            )
            .await?;
        }

        CallbackAction::EndRound(round_id) => {
            bot.answer_callback_query(callback_id).await?;
            end_round_flow(bot, chat_id, deps, round_id).await?;
        }

        CallbackAction::CurrentRound(round_id) => {
            match deps.api.set_current_round(round_id).await {
                Ok(message) => {
                    bot.answer_callback_query(callback_id).await?;
                    bot.send_message(chat_id, message).await?;
                }
                Err(e) => {
                    bot.answer_callback_query(callback_id).await?;
                    bot.send_message(chat_id, format!("Ошибка: {}", e)).await?;
                }
            }
        }

        CallbackAction::TransferExisting => {
            let Some(DialogState::TransferChooseAction { source_round_id, .. }) =
                deps.dialogs.get(chat_id).await
            else {
                bot.answer_callback_query(callback_id).text("Кнопка устарела").await?;
                return Ok(());
            };

            let rounds = match deps.api.active_rounds().await {
                Ok(rounds) => rounds,
                Err(e) => return transfer_abort(bot, chat_id, deps, callback_id, e).await,
            };
            if rounds.is_empty() {
                deps.dialogs.clear(chat_id).await;
                bot.answer_callback_query(callback_id).await?;
                bot.send_message(chat_id, "Активных раундов нет, переносить некуда").await?;
                return Ok(());
            }

            deps.dialogs.set(chat_id, DialogState::TransferChooseRound { source_round_id }).await;
            bot.answer_callback_query(callback_id).await?;
            bot.send_message(chat_id, "В какой раунд перенести победителей?")
                .reply_markup(rounds_keyboard(&rounds, CallbackAction::TransferTarget))
                .await?;
        }

        CallbackAction::TransferTarget(target_round_id) => {
            let Some(DialogState::TransferChooseRound { source_round_id }) =
                deps.dialogs.get(chat_id).await
            else {
                bot.answer_callback_query(callback_id).text("Кнопка устарела").await?;
                return Ok(());
            };

            deps.dialogs
                .set(chat_id, DialogState::TransferConfirm { source_round_id, target_round_id })
                .await;
            let keyboard = InlineKeyboardMarkup::new(vec![vec![
                cb("Перенести", CallbackAction::ConfirmTransfer(target_round_id)),
                cb("Отмена", CallbackAction::Cancel),
            ]]);
            bot.answer_callback_query(callback_id).await?;
            bot.send_message(chat_id, "Перенести победителей в выбранный раунд?")
                .reply_markup(keyboard)
                .await?;
        }

        CallbackAction::TransferNewRound => {
            let Some(DialogState::TransferChooseAction { source_round_id, campaign_id }) =
                deps.dialogs.get(chat_id).await
            else {
                bot.answer_callback_query(callback_id).text("Кнопка устарела").await?;
                return Ok(());
            };

            bot.answer_callback_query(callback_id).await?;
            let outcome = async {
                let started = deps.api.start_round(campaign_id, None, None, None).await?;
                let summary = deps.api.transfer_winners(source_round_id, started.round_id).await?;
                Ok::<_, AppError>((started, summary))
            }
            .await;

            deps.dialogs.clear(chat_id).await;
            match outcome {
                Ok((started, summary)) => {
                    bot.send_message(
                        chat_id,
                        format!(
                            "Раунд №{} запущен. Добавлено {}/{}{}",
                            started.round_number,
                            summary.transferred,
                            summary.total_winners,
                            render_errors(&summary.errors)
                        ),
                    )
                    .await?;
                }
                Err(e) => {
                    bot.send_message(chat_id, format!("Ошибка: {}. Перенос прерван.", e)).await?;
                }
            }
        }

        CallbackAction::TransferNewCampaign => {
            let Some(DialogState::TransferChooseAction { source_round_id, .. }) =
                deps.dialogs.get(chat_id).await
            else {
                bot.answer_callback_query(callback_id).text("Кнопка устарела").await?;
                return Ok(());
            };

            deps.dialogs
                .set(chat_id, DialogState::TransferNewCampaignName { source_round_id })
                .await;
            bot.answer_callback_query(callback_id).await?;
            bot.send_message(chat_id, "Введите название новой кампании для переноса").await?;
        }

        CallbackAction::TransferSkip => {
            deps.dialogs.clear(chat_id).await;
            bot.answer_callback_query(callback_id).await?;
            bot.send_message(chat_id, "Перенос пропущен").await?;
        }

        CallbackAction::ConfirmTransfer(target_round_id) => {
            let Some(DialogState::TransferConfirm { source_round_id, target_round_id: expected }) =
                deps.dialogs.get(chat_id).await
            else {
                bot.answer_callback_query(callback_id).text("Кнопка устарела").await?;
                return Ok(());
            };
            if expected != target_round_id {
                bot.answer_callback_query(callback_id).text("Кнопка устарела").await?;
                return Ok(());
            }

            bot.answer_callback_query(callback_id).await?;
            deps.dialogs.clear(chat_id).await;
            match deps.api.transfer_winners(source_round_id, target_round_id).await {
                Ok(summary) => {
                    bot.send_message(
                        chat_id,
                        format!(
                            "Добавлено {}/{}{}",
                            summary.transferred,
                            summary.total_winners,
                            render_errors(&summary.errors)
                        ),
                    )
                    .await?;
                }
                Err(e) => {
                    bot.send_message(chat_id, format!("Ошибка: {}. Перенос прерван.", e)).await?;
                }
            }
        }

        CallbackAction::Cancel => {
            deps.dialogs.clear(chat_id).await;
            bot.answer_callback_query(callback_id).text("Отменено").await?;
            bot.send_message(chat_id, "Действие отменено").await?;
        }

        CallbackAction::HelpTopic(topic) => {
            bot.answer_callback_query(callback_id).await?;
            let text = match topic {
                HelpTopic::Voting => HELP_VOTING,
                HelpTopic::Admin => HELP_ADMIN,
            };
            bot.send_message(chat_id, text).await?;
        }
    }

    Ok(())
}

fn render_errors(errors: &[String]) -> String {
    if errors.is_empty() {
        String::new()
    } else {
        format!("\nОшибки:\n{}", errors.join("\n"))
    }
}

/// Завершение раунда: отчёт о победителях и предложение переноса.
async fn end_round_flow(
    bot: &Bot,
    chat_id: ChatId,
    deps: &HandlerDeps,
    round_id: i64,
) -> Result<(), HandlerError> {
    let ended = match deps.api.end_round(round_id).await {
        Ok(ended) => ended,
        Err(AppError::Api { message, .. }) => {
            bot.send_message(chat_id, message).await?;
            return Ok(());
        }
        Err(e) => {
            bot.send_message(chat_id, format!("Ошибка: {}", e)).await?;
            return Ok(());
        }
    };

    if ended.winners.is_empty() {
        bot.send_message(chat_id, "Раунд завершён. Победителей нет — голосов не было").await?;
        return Ok(());
    }

    let lines: Vec<String> = ended
        .winners
        .iter()
        .enumerate()
        .map(|(i, w)| format!("{}. {} — {} голос(ов)", i + 1, w.full_name, w.votes))
        .collect();
    bot.send_message(
        chat_id,
        format!("Раунд завершён. Победители ({} мест):\n{}", ended.winners_count, lines.join("\n")),
    )
    .await?;

    deps.dialogs
        .set(
            chat_id,
            DialogState::TransferChooseAction {
                source_round_id: round_id,
                campaign_id: ended.ended_round_campaign_id,
            },
        )
        .await;
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![cb("В существующий раунд", CallbackAction::TransferExisting)],
        vec![cb("В новый раунд этой кампании", CallbackAction::TransferNewRound)],
        vec![cb("В новую кампанию", CallbackAction::TransferNewCampaign)],
        vec![cb("Не переносить", CallbackAction::TransferSkip)],
    ]);
    bot.send_message(chat_id, "Перенести победителей в следующий раунд?")
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn transfer_abort(
    bot: &Bot,
    chat_id: ChatId,
    deps: &HandlerDeps,
    callback_id: CallbackQueryId,
    err: AppError,
) -> Result<(), HandlerError> {
    deps.dialogs.clear(chat_id).await;
    bot.answer_callback_query(callback_id).await?;
    bot.send_message(chat_id, format!("Ошибка: {}. Перенос прерван.", err)).await?;
    Ok(())
}
