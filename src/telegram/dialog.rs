//! Состояние диалогов с администраторами.
//!
//! Каждый многошаговый сценарий (запуск раунда, добавление участников,
//! перенос победителей) держит по одной записи на чат. Запись живёт
//! DIALOG_TTL_SECS и снимается фоновой задачей очистки; протухший диалог
//! неотличим от отсутствующего.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use teloxide::types::ChatId;
use tokio::sync::Mutex;

use crate::config;

/// Шаг диалога. Поля несут накопленные по ходу сценария данные.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogState {
    /// /start_round: ждём выбор кампании.
    StartRoundChooseCampaign,
    /// /start_round: ждём название новой кампании.
    StartRoundNewCampaignName,
    /// /start_round: ждём номер раунда ("авто" разрешено).
    StartRoundNumber { campaign_id: i64 },
    /// /add_participant: ждём выбор раунда.
    AddParticipantChooseRound,
    /// /add_participant: собираем строки "Имя (описание)" до стоп-слова.
    AddParticipantCollect { round_id: i64 },
    /// После /end_round: ждём выбор, куда переносить победителей.
    TransferChooseAction { source_round_id: i64, campaign_id: i64 },
    /// Перенос: ждём выбор существующего целевого раунда.
    TransferChooseRound { source_round_id: i64 },
    /// Перенос: ждём название новой кампании.
    TransferNewCampaignName { source_round_id: i64 },
    /// Перенос: ждём подтверждение.
    TransferConfirm { source_round_id: i64, target_round_id: i64 },
}

struct DialogEntry {
    state: DialogState,
    last_touched: Instant,
}

/// Хранилище диалогов, одна запись на чат.
pub struct DialogStore {
    entries: Arc<Mutex<HashMap<ChatId, DialogEntry>>>,
    ttl: std::time::Duration,
}

impl DialogStore {
    pub fn new() -> Self {
        Self::with_ttl(config::dialog::ttl())
    }

    pub fn with_ttl(ttl: std::time::Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Текущий шаг диалога чата, если тот ещё жив.
    pub async fn get(&self, chat_id: ChatId) -> Option<DialogState> {
        let mut entries = self.entries.lock().await;
        match entries.get(&chat_id) {
            Some(entry) if entry.last_touched.elapsed() <= self.ttl => Some(entry.state.clone()),
            Some(_) => {
                entries.remove(&chat_id);
                None
            }
            None => None,
        }
    }

    /// Ставит чат на шаг. Прежний диалог чата затирается.
    pub async fn set(&self, chat_id: ChatId, state: DialogState) {
        let mut entries = self.entries.lock().await;
        entries.insert(chat_id, DialogEntry { state, last_touched: Instant::now() });
    }

    pub async fn clear(&self, chat_id: ChatId) {
        self.entries.lock().await.remove(&chat_id);
    }

    /// Снимает протухшие записи. Возвращает число удалённых.
    pub async fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.last_touched.elapsed() <= self.ttl);
        before - entries.len()
    }

    /// Фоновая задача очистки, тикает раз в минуту.
    pub fn spawn_cleanup_task(store: Arc<DialogStore>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(config::dialog::cleanup_interval());
            loop {
                interval.tick().await;
                let removed = store.cleanup_expired().await;
                if removed > 0 {
                    log::debug!("Dialog cleanup: dropped {} expired entr(ies)", removed);
                }
            }
        });
    }
}

impl Default for DialogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_set_get_clear() {
        let store = DialogStore::with_ttl(Duration::from_secs(60));
        let chat = ChatId(1);

        assert_eq!(store.get(chat).await, None);
        store.set(chat, DialogState::StartRoundChooseCampaign).await;
        assert_eq!(store.get(chat).await, Some(DialogState::StartRoundChooseCampaign));

        store.clear(chat).await;
        assert_eq!(store.get(chat).await, None);
    }

    #[tokio::test]
    async fn test_new_dialog_replaces_previous() {
        let store = DialogStore::with_ttl(Duration::from_secs(60));
        let chat = ChatId(1);

        store.set(chat, DialogState::StartRoundChooseCampaign).await;
        store.set(chat, DialogState::AddParticipantCollect { round_id: 7 }).await;
        assert_eq!(
            store.get(chat).await,
            Some(DialogState::AddParticipantCollect { round_id: 7 })
        );
    }

    #[tokio::test]
    async fn test_expired_entry_behaves_as_missing() {
        let store = DialogStore::with_ttl(Duration::from_millis(10));
        let chat = ChatId(1);

        store.set(chat, DialogState::StartRoundChooseCampaign).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.get(chat).await, None);
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired() {
        let store = DialogStore::with_ttl(Duration::from_millis(10));
        store.set(ChatId(1), DialogState::StartRoundChooseCampaign).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        store.set(ChatId(2), DialogState::AddParticipantChooseRound).await;

        assert_eq!(store.cleanup_expired().await, 1);
        assert_eq!(store.get(ChatId(2)).await, Some(DialogState::AddParticipantChooseRound));
    }
}
