use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// The `user` object embedded in Telegram WebApp init data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TelegramIdentity {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub username: Option<String>,
}

fn secret_key(bot_token: &str) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(b"WebAppData").ok()?;
    mac.update(bot_token.as_bytes());
    Some(mac.finalize().into_bytes().to_vec())
}

fn data_check_string(pairs: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = pairs.iter().filter(|(k, _)| k != "hash").collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Hex HMAC the bot would attach to `pairs`.
pub fn sign_init_data(pairs: &[(String, String)], bot_token: &str) -> Option<String> {
    let key = secret_key(bot_token)?;
    let mut mac = HmacSha256::new_from_slice(&key).ok()?;
    mac.update(data_check_string(pairs).as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a WebApp `initData` query string and returns the user in it.
/// `None` when the signature is missing or wrong, or no user is present.
pub fn verify_init_data(init_data: &str, bot_token: &str) -> Option<TelegramIdentity> {
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(init_data.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let provided = pairs.iter().find(|(k, _)| k == "hash").map(|(_, v)| v.to_ascii_lowercase())?;
    let expected = sign_init_data(&pairs, bot_token)?;
    if !bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        return None;
    }

    let user = pairs.iter().find(|(k, _)| k == "user").map(|(_, v)| v)?;
    serde_json::from_str(user).ok()
}
