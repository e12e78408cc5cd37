//! Обработчики команд бота.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, Message};

use super::types::{HandlerDeps, HandlerError};
use crate::config;
use crate::core::error::AppError;
use crate::telegram::api_client::{ActiveRoundInfo, RoundSummary};
use crate::telegram::bot::Command;
use crate::telegram::callback::{CallbackAction, HelpTopic};
use crate::telegram::dialog::DialogState;

pub(crate) fn sender_id(msg: &Message) -> i64 {
    msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok()).unwrap_or(0)
}

pub(crate) fn cb(label: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(label.into(), action.encode())
}

fn cancel_row() -> Vec<InlineKeyboardButton> {
    vec![cb("Отмена", CallbackAction::Cancel)]
}

/// Клавиатура из активных раундов, по кнопке на раунд.
pub(crate) fn rounds_keyboard(
    rounds: &[RoundSummary],
    to_action: impl Fn(i64) -> CallbackAction,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = rounds
        .iter()
        .map(|r| {
            let marker = if r.is_current { " ★" } else { "" };
            vec![cb(
                format!("Раунд №{} — {}{}", r.number, r.campaign_name, marker),
                to_action(r.id),
            )]
        })
        .collect();
    rows.push(cancel_row());
    InlineKeyboardMarkup::new(rows)
}

pub async fn handle_command(
    bot: &Bot,
    msg: &Message,
    cmd: Command,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    match cmd {
        Command::Start => handle_start_command(bot, msg).await,
        Command::Help => handle_help_command(bot, msg).await,
        Command::Myid => handle_myid_command(bot, msg).await,
        Command::Vote => handle_vote_command(bot, msg, deps).await,
        Command::List => handle_list_command(bot, msg, deps).await,
        Command::Participants => handle_participants_command(bot, msg, deps).await,
        Command::Status => handle_status_command(bot, msg, deps).await,
        Command::AddParticipant => handle_add_participant_command(bot, msg, deps).await,
        Command::StartRound => handle_start_round_command(bot, msg, deps).await,
        Command::EndRound => handle_end_round_command(bot, msg, deps).await,
        Command::SetCurrentRound => handle_set_current_round_command(bot, msg, deps).await,
    }
}

/// Не-администраторам админские команды недоступны.
async fn require_admin(bot: &Bot, msg: &Message) -> Result<bool, HandlerError> {
    if config::admin::is_admin(sender_id(msg)) {
        return Ok(true);
    }
    bot.send_message(msg.chat.id, "Команда доступна только администраторам").await?;
    Ok(false)
}

async fn handle_start_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    bot.send_message(
        msg.chat.id,
        "Привет! Я бот для голосований.\n\n\
         /vote — проголосовать в текущем раунде\n\
         /list — активные раунды\n\
         /help — полная справка",
    )
    .await?;
    Ok(())
}

async fn handle_help_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    let keyboard = InlineKeyboardMarkup::new(vec![vec![
        cb("Голосование", CallbackAction::HelpTopic(HelpTopic::Voting)),
        cb("Администрирование", CallbackAction::HelpTopic(HelpTopic::Admin)),
    ]]);
    bot.send_message(msg.chat.id, "Выберите раздел справки:")
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn handle_myid_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    bot.send_message(msg.chat.id, format!("Ваш Telegram ID: {}", sender_id(msg))).await?;
    Ok(())
}

/// Текст и клавиатура голосования для текущего раунда.
pub(crate) fn render_vote_prompt(info: &ActiveRoundInfo, _user_id: i64) -> (String, Option<InlineKeyboardMarkup>) {
    if let Some(vote) = &info.user_vote {
        return (
            format!(
                "Вы уже голосовали в раунде №{}: №{} {}",
                info.round.number, vote.participant_order, vote.participant_name
            ),
            None,
        );
    }

    if info.participants.is_empty() {
        return (format!("В раунде №{} пока нет участников", info.round.number), None);
    }

    if info.round.round_type == "individual" {
        let voted: std::collections::HashSet<i64> =
            info.user_choices.iter().map(|c| c.participant_id).collect();
        let rows: Vec<Vec<InlineKeyboardButton>> = info
            .participants
            .iter()
            .filter(|p| !voted.contains(&p.id))
            .map(|p| {
                vec![
                    cb(
                        format!("№{} {} — Да", p.order_number, p.full_name),
                        CallbackAction::Vote {
                            round_id: info.round.id,
                            participant_id: p.id,
                            choice: Some(crate::core::types::VoteChoice::Yes),
                        },
                    ),
                    cb(
                        "Нет",
                        CallbackAction::Vote {
                            round_id: info.round.id,
                            participant_id: p.id,
                            choice: Some(crate::core::types::VoteChoice::No),
                        },
                    ),
                ]
            })
            .collect();
        if rows.is_empty() {
            return (
                format!("Вы ответили по всем участникам раунда №{}", info.round.number),
                None,
            );
        }
        return (
            format!("Раунд №{}: ответьте да или нет по каждому участнику", info.round.number),
            Some(InlineKeyboardMarkup::new(rows)),
        );
    }

    let rows: Vec<Vec<InlineKeyboardButton>> = info
        .participants
        .iter()
        .map(|p| {
            vec![cb(
                format!("№{} {}", p.order_number, p.full_name),
                CallbackAction::Vote {
                    round_id: info.round.id,
                    participant_id: p.id,
                    choice: None,
                },
            )]
        })
        .collect();
    (
        format!("Раунд №{}: выберите, за кого голосуете", info.round.number),
        Some(InlineKeyboardMarkup::new(rows)),
    )
}

async fn handle_vote_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let user_id = sender_id(msg);
    let info = match deps.api.active_round_info(user_id).await {
        Ok(info) => info,
        Err(AppError::Api { message, .. }) => {
            bot.send_message(msg.chat.id, message).await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let (text, keyboard) = render_vote_prompt(&info, user_id);
    let mut request = bot.send_message(msg.chat.id, text);
    if let Some(keyboard) = keyboard {
        request = request.reply_markup(keyboard);
    }
    request.await?;
    Ok(())
}

async fn handle_list_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let rounds = deps.api.active_rounds().await?;
    if rounds.is_empty() {
        bot.send_message(msg.chat.id, "Активных раундов нет").await?;
        return Ok(());
    }

    let lines: Vec<String> = rounds
        .iter()
        .map(|r| {
            let marker = if r.is_current { " (текущий)" } else { "" };
            format!(
                "Раунд №{} — кампания #{} «{}», тип {}, мест {}{}",
                r.number, r.campaign_order_number, r.campaign_name, r.round_type, r.winners_count, marker
            )
        })
        .collect();
    bot.send_message(msg.chat.id, format!("Активные раунды:\n{}", lines.join("\n"))).await?;
    Ok(())
}

async fn handle_participants_command(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    match deps.api.active_round_participants().await? {
        None => {
            bot.send_message(msg.chat.id, "Активного раунда нет").await?;
        }
        Some((round_number, participants)) if participants.is_empty() => {
            bot.send_message(msg.chat.id, format!("В раунде №{} пока нет участников", round_number))
                .await?;
        }
        Some((round_number, participants)) => {
            let lines: Vec<String> = participants
                .iter()
                .map(|p| {
                    if p.description.is_empty() {
                        format!("№{} {}", p.order_number, p.full_name)
                    } else {
                        format!("№{} {} — {}", p.order_number, p.full_name, p.description)
                    }
                })
                .collect();
            bot.send_message(
                msg.chat.id,
                format!("Участники раунда №{}:\n{}", round_number, lines.join("\n")),
            )
            .await?;
        }
    }
    Ok(())
}

/// Краткая сводка текущего раунда: номер, тип, участники.
async fn handle_status_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let info = match deps.api.active_round_info(sender_id(msg)).await {
        Ok(info) => info,
        Err(AppError::Api { message, .. }) => {
            bot.send_message(msg.chat.id, message).await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let kind = if info.round.round_type == "individual" { "индивидуальный" } else { "стандартный" };
    let marker = if info.round.is_current { "назначен текущим" } else { "последний активный" };
    bot.send_message(
        msg.chat.id,
        format!(
            "Текущий раунд: №{} ({}, мест: {}, участников: {})\nСтатус: активен, {}",
            info.round.number,
            kind,
            info.round.winners_count,
            info.participants.len(),
            marker
        ),
    )
    .await?;
    Ok(())
}

async fn handle_start_round_command(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    if !require_admin(bot, msg).await? {
        return Ok(());
    }

    let campaigns = deps.api.active_campaigns().await?;
    let mut rows: Vec<Vec<InlineKeyboardButton>> = campaigns
        .iter()
        .map(|c| {
            vec![cb(
                format!("#{} {}", c.campaign_order_number, c.name),
                CallbackAction::ChooseCampaign(c.id),
            )]
        })
        .collect();
    rows.push(vec![cb("Новая кампания", CallbackAction::NewCampaign)]);
    rows.push(cancel_row());

    deps.dialogs.set(msg.chat.id, DialogState::StartRoundChooseCampaign).await;
    bot.send_message(msg.chat.id, "В какой кампании запустить раунд?")
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;
    Ok(())
}

async fn handle_add_participant_command(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    if !require_admin(bot, msg).await? {
        return Ok(());
    }

    let rounds = deps.api.active_rounds().await?;
    if rounds.is_empty() {
        bot.send_message(msg.chat.id, "Активных раундов нет — сначала запустите раунд").await?;
        return Ok(());
    }

    deps.dialogs.set(msg.chat.id, DialogState::AddParticipantChooseRound).await;
    bot.send_message(msg.chat.id, "В какой раунд добавить участников?")
        .reply_markup(rounds_keyboard(&rounds, CallbackAction::AddToRound))
        .await?;
    Ok(())
}

async fn handle_end_round_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    if !require_admin(bot, msg).await? {
        return Ok(());
    }

    let rounds = deps.api.active_rounds().await?;
    if rounds.is_empty() {
        bot.send_message(msg.chat.id, "Активных раундов нет").await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, "Какой раунд завершить?")
        .reply_markup(rounds_keyboard(&rounds, CallbackAction::EndRound))
        .await?;
    Ok(())
}

async fn handle_set_current_round_command(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    if !require_admin(bot, msg).await? {
        return Ok(());
    }

    let rounds = deps.api.active_rounds().await?;
    if rounds.is_empty() {
        bot.send_message(msg.chat.id, "Активных раундов нет").await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, "Какой раунд сделать текущим?")
        .reply_markup(rounds_keyboard(&rounds, CallbackAction::CurrentRound))
        .await?;
    Ok(())
}
