//! Sender to UUID mapping

use uuid::Uuid;

/// Name the permission engine uses for the console
pub const CONSOLE_NAME: &str = "Console";

/// Reserved identity of the console sender
pub const CONSOLE_UUID: Uuid = Uuid::nil();

/// High half of every user UUID. Must stay non-zero so users never map onto
/// `CONSOLE_UUID`.
const USER_NAMESPACE: u64 = 0x7573_6572_0000_0000;

/// Derive the UUID for a numeric account id
///
/// The id occupies the low 64 bits verbatim, so the mapping is a bijection
/// over `i64`.
pub fn user_uuid(id: i64) -> Uuid {
    Uuid::from_u128(((USER_NAMESPACE as u128) << 64) | (id as u64 as u128))
}

/// Recover the account id from a UUID produced by [`user_uuid`]
pub fn user_id_from_uuid(uuid: &Uuid) -> Option<i64> {
    let raw = uuid.as_u128();
    if (raw >> 64) as u64 != USER_NAMESPACE {
        return None;
    }
    Some(raw as u64 as i64)
}
