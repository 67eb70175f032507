//! Order codes and the bundle string that carries them through the gateway.
//!
//! A code looks like `ORD-1718000000000-k3x9q2m7a`: the creation time in
//! Unix milliseconds followed by nine random base36 characters.
//!
//! The gateway's order-info field gets every code of a checkout joined with
//! `,`, but the gateway may reformat separators, so splitting scans for the
//! `ORD-` marker instead of trusting the commas.

use rand::Rng;
use time::OffsetDateTime;

pub const ORDER_CODE_PREFIX: &str = "ORD-";
const SUFFIX_LEN: usize = 9;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a fresh order code stamped with the current time.
pub fn generate_order_code() -> String {
    generate_order_code_at(OffsetDateTime::now_utc())
}

/// Generate an order code stamped with `now`.
///
/// The suffix is drawn from the thread-local CSPRNG.
pub fn generate_order_code_at(now: OffsetDateTime) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
        .collect();
    format!("{ORDER_CODE_PREFIX}{millis}-{suffix}")
}

/// Join order codes into the bundle string handed to the gateway and to
/// session storage.
pub fn join_bundle<S: AsRef<str>>(codes: &[S]) -> String {
    codes
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(",")
}

/// Recover the order codes from a gateway order-info string.
///
/// Every occurrence of `ORD-` starts a code; the code runs until the first
/// character that cannot be part of one. Text before the first marker is
/// ignored, as are fragments left empty.
pub fn split_order_info(info: &str) -> Vec<String> {
    info.split(ORDER_CODE_PREFIX)
        .skip(1)
        .filter_map(|fragment| {
            let body: String = fragment
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
                .collect();
            let body = body.trim_end_matches('-');
            (!body.is_empty()).then(|| format!("{ORDER_CODE_PREFIX}{body}"))
        })
        .collect()
}
