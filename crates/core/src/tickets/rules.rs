//! Pure ticket rules: template validation, issuing and redemption.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use bluepay_shared::types::{AccountId, Money, TicketTemplateId, WalletItemId};

use super::error::TicketError;
use super::types::{NewTemplate, Redemption, TicketStatus, TicketTemplate, WalletItem};
use crate::account::Account;

/// Maximum title length.
pub const TITLE_MAX_LEN: usize = 120;

/// Validates a template and builds it for `merchant`.
pub fn build_template(
    merchant: &Account,
    input: NewTemplate,
    now: DateTime<Utc>,
) -> Result<TicketTemplate, TicketError> {
    if !merchant.is_business() {
        return Err(TicketError::NotMerchant(merchant.id));
    }

    let title = input.title.trim();
    if title.is_empty() {
        return Err(TicketError::InvalidTemplate("title is required".to_string()));
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(TicketError::InvalidTemplate(format!(
            "title must be at most {TITLE_MAX_LEN} characters"
        )));
    }
    if input.price < Decimal::ZERO {
        return Err(TicketError::InvalidTemplate("price cannot be negative".to_string()));
    }
    if !Money::new(input.price, merchant.currency).fits_minor_units() {
        return Err(TicketError::InvalidTemplate(format!(
            "price {} has too many decimal places for {}",
            input.price, merchant.currency
        )));
    }
    if input.capacity == Some(0) {
        return Err(TicketError::InvalidTemplate("capacity must be positive".to_string()));
    }
    if input.valid_until.is_some_and(|until| until <= now) {
        return Err(TicketError::InvalidTemplate("valid_until must be in the future".to_string()));
    }

    Ok(TicketTemplate {
        id: TicketTemplateId::new(),
        merchant: merchant.id,
        title: title.to_string(),
        description: input.description.trim().to_string(),
        price: input.price,
        currency: merchant.currency,
        capacity: input.capacity,
        issued: 0,
        valid_until: input.valid_until,
        active: true,
        created_at: now,
    })
}

/// Issues one ticket from `template` to `holder`.
///
/// Returns the template with its counter bumped and the new wallet item.
pub fn issue(
    template: &TicketTemplate,
    merchant: AccountId,
    holder: AccountId,
    now: DateTime<Utc>,
) -> Result<(TicketTemplate, WalletItem), TicketError> {
    if template.merchant != merchant {
        return Err(TicketError::NotIssuer(merchant));
    }
    if !template.active {
        return Err(TicketError::TemplateInactive(template.id));
    }
    if template.is_expired_at(now) {
        return Err(TicketError::Expired);
    }
    if template.remaining() == Some(0) {
        return Err(TicketError::SoldOut(template.id));
    }

    let mut updated = template.clone();
    updated.issued = template
        .issued
        .checked_add(1)
        .ok_or(TicketError::SoldOut(template.id))?;

    let item = WalletItem {
        id: WalletItemId::new(),
        template_id: template.id,
        merchant: template.merchant,
        holder,
        title: template.title.clone(),
        status: TicketStatus::Active,
        issued_at: now,
        redeemed_at: None,
        valid_until: template.valid_until,
    };

    Ok((updated, item))
}

/// Redeems `item` on behalf of `merchant`.
///
/// A ticket past its validity is not an error here: it comes back as
/// [`Redemption::Expired`] so the store persists the new status.
pub fn redeem(
    item: &WalletItem,
    merchant: AccountId,
    now: DateTime<Utc>,
) -> Result<Redemption, TicketError> {
    if item.merchant != merchant {
        return Err(TicketError::NotIssuer(merchant));
    }
    match item.status {
        TicketStatus::Redeemed => return Err(TicketError::AlreadyRedeemed(item.id)),
        TicketStatus::Expired => return Err(TicketError::Expired),
        TicketStatus::Active => {}
    }

    let mut updated = item.clone();
    if item.valid_until.is_some_and(|until| now > until) {
        updated.status = TicketStatus::Expired;
        return Ok(Redemption::Expired(updated));
    }

    updated.status = TicketStatus::Redeemed;
    updated.redeemed_at = Some(now);
    Ok(Redemption::Redeemed(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountType;
    use bluepay_shared::types::Currency;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn merchant() -> Account {
        Account {
            id: AccountId::new(),
            first_name: "Corner".into(),
            last_name: "Cafe".into(),
            email: "cafe@example.com".into(),
            username: None,
            balance: Decimal::ZERO,
            currency: Currency::Usd,
            account_type: AccountType::Business,
            onboarded: true,
            created_at: Utc::now(),
        }
    }

    fn input(capacity: Option<u32>) -> NewTemplate {
        NewTemplate {
            title: "Free coffee".into(),
            description: "One drink".into(),
            price: dec!(4.50),
            capacity,
            valid_until: None,
        }
    }

    #[test]
    fn test_personal_accounts_cannot_create_templates() {
        let mut m = merchant();
        m.account_type = AccountType::Personal;
        assert!(matches!(
            build_template(&m, input(None), Utc::now()),
            Err(TicketError::NotMerchant(_))
        ));
    }

    #[test]
    fn test_template_validation() {
        let m = merchant();
        let now = Utc::now();

        let mut bad = input(None);
        bad.title = "   ".into();
        assert!(build_template(&m, bad, now).is_err());

        let mut bad = input(None);
        bad.price = dec!(1.005);
        assert!(build_template(&m, bad, now).is_err());

        assert!(build_template(&m, input(Some(0)), now).is_err());

        let mut bad = input(None);
        bad.valid_until = Some(now - Duration::hours(1));
        assert!(build_template(&m, bad, now).is_err());

        let ok = build_template(&m, input(Some(10)), now).unwrap();
        assert_eq!(ok.remaining(), Some(10));
        assert!(ok.active);
    }

    #[test]
    fn test_issue_respects_capacity() {
        let m = merchant();
        let now = Utc::now();
        let template = build_template(&m, input(Some(1)), now).unwrap();

        let (after, item) = issue(&template, m.id, AccountId::new(), now).unwrap();
        assert_eq!(after.issued, 1);
        assert_eq!(item.status, TicketStatus::Active);
        assert!(matches!(
            issue(&after, m.id, AccountId::new(), now),
            Err(TicketError::SoldOut(_))
        ));
    }

    #[test]
    fn test_issue_guards() {
        let m = merchant();
        let now = Utc::now();
        let mut template = build_template(&m, input(None), now).unwrap();

        assert!(matches!(
            issue(&template, AccountId::new(), AccountId::new(), now),
            Err(TicketError::NotIssuer(_))
        ));

        template.valid_until = Some(now - Duration::minutes(1));
        assert!(matches!(
            issue(&template, m.id, AccountId::new(), now),
            Err(TicketError::Expired)
        ));

        template.active = false;
        assert!(matches!(
            issue(&template, m.id, AccountId::new(), now),
            Err(TicketError::TemplateInactive(_))
        ));
    }

    #[test]
    fn test_redeem_once() {
        let m = merchant();
        let now = Utc::now();
        let template = build_template(&m, input(None), now).unwrap();
        let (_, item) = issue(&template, m.id, AccountId::new(), now).unwrap();

        let Redemption::Redeemed(used) = redeem(&item, m.id, now).unwrap() else {
            panic!("expected redemption");
        };
        assert_eq!(used.status, TicketStatus::Redeemed);
        assert_eq!(used.redeemed_at, Some(now));

        assert!(matches!(redeem(&used, m.id, now), Err(TicketError::AlreadyRedeemed(_))));
        assert!(matches!(
            redeem(&item, AccountId::new(), now),
            Err(TicketError::NotIssuer(_))
        ));
    }

    #[test]
    fn test_redeem_after_validity_expires_item() {
        let m = merchant();
        let now = Utc::now();
        let mut template_input = input(None);
        template_input.valid_until = Some(now + Duration::hours(1));
        let template = build_template(&m, template_input, now).unwrap();
        let (_, item) = issue(&template, m.id, AccountId::new(), now).unwrap();

        let later = now + Duration::hours(2);
        let outcome = redeem(&item, m.id, later).unwrap();
        assert!(matches!(&outcome, Redemption::Expired(i) if i.status == TicketStatus::Expired));
        assert!(matches!(
            redeem(outcome.item(), m.id, later),
            Err(TicketError::Expired)
        ));
    }
}
