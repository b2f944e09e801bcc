//! Persisted single-use token records backing email verification and
//! password reset. One shared pool per user; the token's audience is what
//! distinguishes the purpose.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Verification;
use crate::store::Tx;

pub fn live_for_user(tx: &mut Tx, user_id: Uuid, now: OffsetDateTime) -> Option<Verification> {
    tx.verifications()
        .find(|v| v.user_id == user_id && !v.is_expired(now))
}

pub fn purge_for_user(tx: &mut Tx, user_id: Uuid) {
    let stale: Vec<Uuid> = tx
        .verifications()
        .filter(|v| v.user_id == user_id)
        .into_iter()
        .map(|v| v.id)
        .collect();
    let mut docs = tx.verifications();
    for id in stale {
        docs.delete(id);
    }
}

pub fn create(tx: &mut Tx, user_id: Uuid, token: &str, expires_at: OffsetDateTime) -> Verification {
    let record = Verification {
        id: Uuid::new_v4(),
        user_id,
        token: token.to_string(),
        expires_at,
        created_at: OffsetDateTime::now_utc(),
    };
    tx.verifications().put(record.id, record.clone());
    record
}

/// Single use: the record is deleted on success. An expired record is left
/// in place for the next issue-with-replace pass; there is no background
/// sweeper, so staleness is bounded only by the next access.
pub fn consume(tx: &mut Tx, token: &str, user_id: Uuid, now: OffsetDateTime) -> Result<Verification> {
    let record = tx
        .verifications()
        .find(|v| v.token == token && v.user_id == user_id)
        .ok_or(Error::NotFound("verification record"))?;
    if record.is_expired(now) {
        return Err(Error::TokenExpired);
    }
    tx.verifications().delete(record.id);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use time::Duration;

    #[tokio::test]
    async fn consume_deletes_the_record() {
        let store = Store::new();
        let mut tx = store.begin().await;
        let user = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        create(&mut tx, user, "tok-1", now + Duration::hours(1));
        let record = consume(&mut tx, "tok-1", user, now).expect("consume");
        assert_eq!(record.user_id, user);
        assert!(tx.verifications().find(|v| v.token == "tok-1").is_none());
    }

    #[tokio::test]
    async fn consume_unknown_token_is_not_found() {
        let store = Store::new();
        let mut tx = store.begin().await;
        let err = consume(&mut tx, "missing", Uuid::new_v4(), OffsetDateTime::now_utc()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn consume_expired_record_is_left_in_place() {
        let store = Store::new();
        let mut tx = store.begin().await;
        let user = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        create(&mut tx, user, "tok-old", now - Duration::hours(1));
        let err = consume(&mut tx, "tok-old", user, now).unwrap_err();
        assert!(matches!(err, Error::TokenExpired));
        assert!(tx.verifications().find(|v| v.token == "tok-old").is_some());
    }

    #[tokio::test]
    async fn live_for_user_skips_expired_records() {
        let store = Store::new();
        let mut tx = store.begin().await;
        let user = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        create(&mut tx, user, "tok-old", now - Duration::minutes(5));
        assert!(live_for_user(&mut tx, user, now).is_none());

        create(&mut tx, user, "tok-new", now + Duration::hours(1));
        let live = live_for_user(&mut tx, user, now).expect("live record");
        assert_eq!(live.token, "tok-new");
    }

    #[tokio::test]
    async fn purge_removes_every_record_for_the_user() {
        let store = Store::new();
        let mut tx = store.begin().await;
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        create(&mut tx, user, "a", now - Duration::hours(1));
        create(&mut tx, user, "b", now + Duration::hours(1));
        create(&mut tx, other, "c", now + Duration::hours(1));

        purge_for_user(&mut tx, user);
        assert!(tx.verifications().filter(|v| v.user_id == user).is_empty());
        assert_eq!(tx.verifications().filter(|v| v.user_id == other).len(), 1);
    }
}
