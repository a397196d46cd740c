use macaroons::{Format, Macaroon, MacaroonError, Verifier};
use proptest::prelude::*;

// Many more cases than the default (256) for the chain properties
fn proptest_config() -> ProptestConfig {
    ProptestConfig {
        cases: 10000,
        ..ProptestConfig::default()
    }
}

// Third-party caveats seal keys and draw nonces; keep those runs shorter
fn sealing_config() -> ProptestConfig {
    ProptestConfig {
        cases: 500,
        ..ProptestConfig::default()
    }
}

fn accept_all() -> Verifier {
    Verifier::new().satisfy_general(|_: &[u8]| true)
}

fn utf8_caveat() -> impl Strategy<Value = String> {
    "[a-z]{1,8} (=|<|>) [a-zA-Z0-9:-]{1,24}"
}

/// Property: Creating a macaroon with the same inputs should always produce the same signature
#[test]
fn prop_signature_deterministic() {
    let config = proptest_config();
    proptest!(config, |(
        root_key in prop::collection::vec(any::<u8>(), 1..128),
        identifier in prop::collection::vec(any::<u8>(), 1..128),
        location in any::<String>()
    )| {
        let m1 = Macaroon::new(location.clone(), identifier.clone(), &root_key);
        let m2 = Macaroon::new(location, identifier, &root_key);

        prop_assert_eq!(m1, m2);
    });
}

/// Property: Adding caveats in different orders should produce different signatures
#[test]
fn prop_caveat_order_matters() {
    let config = proptest_config();
    proptest!(config, |(
        root_key in prop::collection::vec(any::<u8>(), 1..128),
        identifier in prop::collection::vec(any::<u8>(), 1..128),
        caveat1 in prop::collection::vec(any::<u8>(), 1..64),
        caveat2 in prop::collection::vec(any::<u8>(), 1..64)
    )| {
        prop_assume!(caveat1 != caveat2);

        let mut m1 = Macaroon::new("", identifier.clone(), &root_key);
        m1.add_first_party_caveat(caveat1.clone());
        m1.add_first_party_caveat(caveat2.clone());

        let mut m2 = Macaroon::new("", identifier, &root_key);
        m2.add_first_party_caveat(caveat2);
        m2.add_first_party_caveat(caveat1);

        prop_assert_ne!(m1.signature(), m2.signature());
    });
}

/// Property: Verification succeeds with the correct key for any first-party caveats
#[test]
fn prop_verify_with_caveats() {
    let config = proptest_config();
    proptest!(config, |(
        root_key in prop::collection::vec(any::<u8>(), 1..128),
        identifier in prop::collection::vec(any::<u8>(), 1..128),
        caveats in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 0..10)
    )| {
        let mut macaroon = Macaroon::new("", identifier, &root_key);
        for caveat in caveats {
            macaroon.add_first_party_caveat(caveat);
        }

        prop_assert!(accept_all().verify(&macaroon, &root_key, &[]).is_ok());
    });
}

/// Property: Verification fails with a different root key
#[test]
fn prop_verify_wrong_key() {
    let config = proptest_config();
    proptest!(config, |(
        root_key in prop::collection::vec(any::<u8>(), 1..128),
        wrong_key in prop::collection::vec(any::<u8>(), 1..128),
        identifier in prop::collection::vec(any::<u8>(), 1..128)
    )| {
        prop_assume!(root_key != wrong_key);

        let macaroon = Macaroon::new("", identifier, &root_key);
        let err = accept_all().verify(&macaroon, &wrong_key, &[]).unwrap_err();

        prop_assert_eq!(err.failures(), &[MacaroonError::InvalidSignature]);
    });
}

/// Property: Dropping any caveat invalidates the signature
#[test]
fn prop_dropped_caveat_fails() {
    let config = proptest_config();
    proptest!(config, |(
        root_key in prop::collection::vec(any::<u8>(), 1..64),
        caveats in prop::collection::vec(utf8_caveat(), 1..6),
        index in any::<prop::sample::Index>()
    )| {
        let mut macaroon = Macaroon::new("http://loc/", "id", &root_key);
        for caveat in &caveats {
            macaroon.add_first_party_caveat(caveat.as_str());
        }

        let dropped = index.index(caveats.len());
        let mut json: serde_json::Value = serde_json::from_str(&macaroon.to_json().unwrap()).unwrap();
        json["caveats"].as_array_mut().unwrap().remove(dropped);
        let tampered = Macaroon::from_json(&json.to_string()).unwrap();

        prop_assert!(!accept_all().is_valid(&tampered, &root_key, &[]));
    });
}

/// Property: Binary serialization roundtrip preserves the macaroon
#[test]
fn prop_binary_roundtrip() {
    let config = proptest_config();
    proptest!(config, |(
        root_key in prop::collection::vec(any::<u8>(), 1..128),
        identifier in prop::collection::vec(any::<u8>(), 1..128),
        location in "[ -~]{0,40}",
        caveats in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 0..5)
    )| {
        let mut original = Macaroon::new(location, identifier, &root_key);
        for caveat in caveats {
            original.add_first_party_caveat(caveat);
        }

        let token = original.serialize(Format::Binary).unwrap();
        let decoded = Macaroon::deserialize(&token, Format::Binary).unwrap();

        prop_assert_eq!(original, decoded);
    });
}

/// Property: JSON serialization roundtrip preserves the macaroon
#[test]
fn prop_json_roundtrip() {
    let config = proptest_config();
    proptest!(config, |(
        root_key in prop::collection::vec(any::<u8>(), 1..128),
        identifier in any::<String>(),
        location in any::<String>(),
        caveats in prop::collection::vec(any::<String>(), 0..5)
    )| {
        let mut original = Macaroon::new(location, identifier, &root_key);
        for caveat in caveats {
            original.add_first_party_caveat(caveat);
        }

        let json = original.serialize(Format::Json).unwrap();
        let decoded = Macaroon::deserialize(&json, Format::Json).unwrap();

        prop_assert_eq!(original, decoded);
    });
}

/// Property: Padded and unpadded base64 decode to the same macaroon
#[test]
fn prop_padding_tolerated() {
    let config = proptest_config();
    proptest!(config, |(
        identifier in prop::collection::vec(any::<u8>(), 1..64),
        caveat in prop::collection::vec(any::<u8>(), 1..64)
    )| {
        let mut macaroon = Macaroon::new("http://loc/", identifier, b"key");
        macaroon.add_first_party_caveat(caveat);

        let token = macaroon.to_base64().unwrap();
        let padded = format!("{token}{}", "=".repeat((4 - token.len() % 4) % 4));

        prop_assert_eq!(Macaroon::from_base64(&padded).unwrap(), macaroon);
    });
}

/// Property: Arbitrary text never panics the decoders
#[test]
fn prop_deserialize_garbage() {
    let config = proptest_config();
    proptest!(config, |(data in any::<String>())| {
        let _ = Macaroon::deserialize(&data, Format::Binary);
        let _ = Macaroon::deserialize(&data, Format::Json);
    });
}

/// Property: A bound discharge verifies, and binding always changes its signature
#[test]
fn prop_third_party_roundtrip() {
    let config = sealing_config();
    proptest!(config, |(
        root_key in prop::collection::vec(any::<u8>(), 1..64),
        caveat_key in prop::collection::vec(any::<u8>(), 1..64),
        caveat_id in prop::collection::vec(any::<u8>(), 1..64)
    )| {
        prop_assume!(caveat_id != b"root");

        let mut macaroon = Macaroon::new("http://root/", "root", &root_key);
        macaroon.add_third_party_caveat("http://third/", &caveat_key, caveat_id.clone()).unwrap();

        let discharge = Macaroon::create_discharge("http://third/", caveat_id, &caveat_key);
        let bound = macaroon.prepare_for_request(&discharge);

        prop_assert_ne!(bound.signature(), discharge.signature());
        prop_assert!(Verifier::new().is_valid(&macaroon, &root_key, &[bound]));
    });
}

/// Property: Tampering with any byte of a verification key id is detected
#[test]
fn prop_tampered_vid_fails() {
    let config = sealing_config();
    proptest!(config, |(
        position in 0usize..72,
        flip in 1u8..=255
    )| {
        let mut macaroon = Macaroon::new("http://root/", "root", b"root key");
        macaroon.add_third_party_caveat("http://third/", b"caveat key", "cid").unwrap();
        let bound = macaroon.prepare_for_request(&Macaroon::create_discharge("http://third/", "cid", b"caveat key"));

        let mut binary = macaroon.to_binary().unwrap();
        let vid_start = binary
            .windows(4)
            .position(|w| w == b"vid ")
            .unwrap() + 4;
        binary[vid_start + position] ^= flip;
        let tampered = Macaroon::from_binary(&binary).unwrap();

        prop_assert!(!Verifier::new().is_valid(&tampered, b"root key", &[bound]));
    });
}
