use async_trait::async_trait;

use bluepay_shared::types::{AccountId, TicketTemplateId, WalletItemId};

use super::MemoryBackend;
use crate::tickets::{
    IssueFn, RedeemFn, Redemption, TicketError, TicketStore, TicketTemplate, WalletItem,
};

#[async_trait]
impl TicketStore for MemoryBackend {
    async fn insert_template(&self, template: TicketTemplate) -> Result<TicketTemplate, TicketError> {
        self.state
            .lock()
            .await
            .templates
            .insert(template.id, template.clone());
        Ok(template)
    }

    async fn template(&self, id: TicketTemplateId) -> Result<Option<TicketTemplate>, TicketError> {
        Ok(self.state.lock().await.templates.get(&id).cloned())
    }

    async fn templates_for(&self, merchant: AccountId) -> Result<Vec<TicketTemplate>, TicketError> {
        let state = self.state.lock().await;
        let mut templates: Vec<_> = state
            .templates
            .values()
            .filter(|t| t.merchant == merchant)
            .cloned()
            .collect();
        templates.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(templates)
    }

    async fn wallet(&self, holder: AccountId) -> Result<Vec<WalletItem>, TicketError> {
        let state = self.state.lock().await;
        let mut items: Vec<_> = state
            .wallet
            .values()
            .filter(|i| i.holder == holder)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.issued_at.cmp(&a.issued_at).then_with(|| b.id.cmp(&a.id)));
        Ok(items)
    }

    async fn issue(
        &self,
        template: TicketTemplateId,
        issue: &IssueFn<'_>,
    ) -> Result<WalletItem, TicketError> {
        let mut state = self.state.lock().await;
        let current = state
            .templates
            .get(&template)
            .ok_or(TicketError::TemplateNotFound(template))?;
        let (updated, item) = issue(current)?;
        state.templates.insert(updated.id, updated);
        state.wallet.insert(item.id, item.clone());
        Ok(item)
    }

    async fn redeem(
        &self,
        item: WalletItemId,
        redeem: &RedeemFn<'_>,
    ) -> Result<Redemption, TicketError> {
        let mut state = self.state.lock().await;
        let current = state
            .wallet
            .get(&item)
            .ok_or(TicketError::WalletItemNotFound(item))?;
        let outcome = redeem(current)?;
        let stored = outcome.item().clone();
        state.wallet.insert(stored.id, stored);
        Ok(outcome)
    }
}
