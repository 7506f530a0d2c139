//! Fuzz target for page token decoding.
//!
//! Arbitrary strings must decode to an error or to a key under the prefix.
//! Tokens built from a key always decode back to it.

#![no_main]

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use libfuzzer_sys::fuzz_target;
use reldir_store::page::{decode_token, encode_token};

fuzz_target!(|data: &[u8]| {
    let Some((&split, key)) = data.split_first() else {
        return;
    };
    let prefix = &key[..usize::from(split).min(key.len())];

    if let Ok(text) = std::str::from_utf8(key) {
        if let Ok(decoded) = decode_token(text, prefix) {
            assert!(decoded.starts_with(prefix), "decoded key escapes its prefix");
        }
    }

    let token = encode_token(key);
    assert_eq!(token, URL_SAFE_NO_PAD.encode(key));
    let decoded = decode_token(&token, prefix).expect("own token decodes");
    assert_eq!(decoded, key, "token round trip");
});
