//! NPS message codes.
//!
//! Constants for every code the built-in services send or receive, plus the
//! static lookup table behind [`message_name`]. The lobby server command block
//! (`0x201`-`0x22F`) is listed in full because clients log those names.

// Client requests
pub const NPS_LOGIN: u16 = 0x100;
pub const NPS_GET_MINI_USER_LIST: u16 = 0x128;
pub const NPS_SEND_MINI_RIFF_LIST: u16 = 0x30C;
pub const NPS_USER_LOGIN: u16 = 0x501;
pub const NPS_REGISTER_GAME_LOGIN: u16 = 0x503;
pub const NPS_NEW_GAME_ACCOUNT: u16 = 0x507;
pub const NPS_REGISTER_GAME_LOGOUT: u16 = 0x50F;
pub const NPS_GET_PERSONA_MAPS: u16 = 0x532;
pub const NPS_VALIDATE_PERSONA_NAME: u16 = 0x533;
pub const NPS_CHECK_TOKEN: u16 = 0x534;

// Server responses
pub const NPS_LOGIN_RESP: u16 = 0x120;
pub const NPS_HEARTBEAT_ACK: u16 = 0x127;
pub const NPS_ACK: u16 = 0x207;
pub const NPS_HEARTBEAT: u16 = 0x217;
pub const NPS_MINI_USER_LIST: u16 = 0x229;
pub const NPS_INVALID_KEY: u16 = 0x22A;
pub const NPS_MINI_RIFF_LIST: u16 = 0x40C;
pub const NPS_USER_VALID: u16 = 0x601;
pub const NPS_GAME_ACCOUNT_INFO: u16 = 0x607;
pub const NPS_LOGOUT_ACK: u16 = 0x612;

/// Envelope carrying an encrypted inner frame.
pub const NPS_CRYPTO_DES_CBC: u16 = 0x1101;

const MESSAGE_NAMES: &[(u16, &str)] = &[
    (NPS_LOGIN, "NPS_LOGIN"),
    (NPS_LOGIN_RESP, "NPS_LOGIN_RESP"),
    (NPS_HEARTBEAT_ACK, "NPS_HEARTBEAT_ACK"),
    (NPS_GET_MINI_USER_LIST, "NPS_GET_MINI_USER_LIST"),
    (0x201, "NPS_FORCE_LOGOFF"),
    (0x202, "NPS_USER_LEFT"),
    (0x203, "NPS_USER_JOINED"),
    (0x204, "NPS_USER_INFO"),
    (0x205, "NPS_SYSTEM_ALERT"),
    (0x206, "NPS_CLIENT_COUNT"),
    (NPS_ACK, "NPS_ACK"),
    (0x208, "NPS_USER_LEFT_CHANNEL"),
    (0x209, "NPS_CHANNEL_CLOSED"),
    (0x20A, "NPS_DUP_USER"),
    (0x20B, "NPS_SERVER_FULL"),
    (0x20C, "NPS_USER_JOINED_CHANNEL"),
    (0x20D, "NPS_SERVER_INFO"),
    (0x20E, "NPS_CHANNEL_CREATED"),
    (0x20F, "NPS_CHANNEL_DELETED"),
    (0x210, "NPS_READY_LIST"),
    (0x211, "NPS_USER_LIST"),
    (0x212, "NPS_SERVER_LIST"),
    (0x213, "NPS_CHANNEL_DENIED"),
    (0x214, "NPS_CHANNEL_GRANTED"),
    (0x215, "NPS_CHANNEL_CONDITIONAL"),
    (0x216, "NPS_SERVER_REDIRECT"),
    (NPS_HEARTBEAT, "NPS_HEARTBEAT"),
    (0x218, "NPS_HEARTBEAT_TIMEOUT"),
    (0x219, "NPS_CHANNEL_UPDATE"),
    (0x21A, "NPS_FORCE_LEAVE_CHANNEL"),
    (0x21B, "NPS_USER_LOCATION"),
    (0x21C, "NPS_GAME_SERVER_STARTED"),
    (0x21D, "NPS_GAME_SERVER_TERMINATED"),
    (0x21E, "NPS_VERSIONS_DIFFERENT"),
    (0x21F, "NPS_SEND_VERSION_STRING"),
    (0x220, "NPS_GAME_SKU_REGISTRY_KEY"),
    (0x221, "NPS_PLUGIN_ACK"),
    (0x222, "NPS_SERVER_CRASHED"),
    (0x223, "NPS_OPEN_COMM_CHANNEL_ACK"),
    (0x224, "NPS_GAME_SERVER_STATE_CHANGE"),
    (0x225, "NPS_SLOT_UPDATE"),
    (0x226, "NPS_SLOT_LIST"),
    (0x227, "NPS_CHANNEL_MASTER"),
    (0x228, "NPS_CHANNEL_MASTER_LIST"),
    (NPS_MINI_USER_LIST, "NPS_MINI_USER_LIST"),
    (NPS_INVALID_KEY, "NPS_INVALID_KEY"),
    (0x22B, "NPS_NO_VALIDATION_SERVER"),
    (0x22C, "NPS_INC_MINI_USER_LIST"),
    (0x22D, "NPS_DEC_MINI_USER_LIST"),
    (0x22E, "NPS_BUDDY_LIST"),
    (0x22F, "NPS_BUDDYLIST_UPDATE"),
    (NPS_SEND_MINI_RIFF_LIST, "NPS_SEND_MINI_RIFF_LIST"),
    (NPS_MINI_RIFF_LIST, "NPS_MINI_RIFF_LIST"),
    (NPS_USER_LOGIN, "NPS_USER_LOGIN"),
    (NPS_REGISTER_GAME_LOGIN, "NPS_REGISTER_GAME_LOGIN"),
    (NPS_NEW_GAME_ACCOUNT, "NPS_NEW_GAME_ACCOUNT"),
    (NPS_REGISTER_GAME_LOGOUT, "NPS_REGISTER_GAME_LOGOUT"),
    (NPS_GET_PERSONA_MAPS, "NPS_GET_PERSONA_MAPS"),
    (NPS_VALIDATE_PERSONA_NAME, "NPS_VALIDATE_PERSONA_NAME"),
    (NPS_CHECK_TOKEN, "NPS_CHECK_TOKEN"),
    (NPS_USER_VALID, "NPS_USER_VALID"),
    (NPS_GAME_ACCOUNT_INFO, "NPS_GAME_ACCOUNT_INFO"),
    (NPS_LOGOUT_ACK, "NPS_LOGOUT_ACK"),
    (NPS_CRYPTO_DES_CBC, "NPS_CRYPTO_DES_CBC"),
];

/// Name used in logs for a message code, `"Unknown"` when the code is unmapped.
pub fn message_name(code: u16) -> &'static str {
    MESSAGE_NAMES
        .binary_search_by_key(&code, |&(c, _)| c)
        .map(|idx| MESSAGE_NAMES[idx].1)
        .unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_sorted_and_unique() {
        for pair in MESSAGE_NAMES.windows(2) {
            assert!(pair[0].0 < pair[1].0, "0x{:x} out of order", pair[1].0);
        }
    }

    #[test]
    fn test_known_names() {
        assert_eq!(message_name(0x100), "NPS_LOGIN");
        assert_eq!(message_name(0x207), "NPS_ACK");
        assert_eq!(message_name(0x217), "NPS_HEARTBEAT");
        assert_eq!(message_name(0x229), "NPS_MINI_USER_LIST");
        assert_eq!(message_name(0x30C), "NPS_SEND_MINI_RIFF_LIST");
        assert_eq!(message_name(0x532), "NPS_GET_PERSONA_MAPS");
        assert_eq!(message_name(0x607), "NPS_GAME_ACCOUNT_INFO");
        assert_eq!(message_name(0x1101), "NPS_CRYPTO_DES_CBC");
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(message_name(0xBEEF), "Unknown");
        assert_eq!(message_name(0), "Unknown");
    }
}
