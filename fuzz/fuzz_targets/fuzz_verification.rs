#![no_main]

use libfuzzer_sys::fuzz_target;
use macaroons::{Macaroon, Verifier};

fuzz_target!(|data: &[u8]| {
    if data.len() < 10 {
        return;
    }

    let split_point = data.len() / 2;
    let root_key = &data[..split_point];
    let identifier = &data[split_point..];

    let mut macaroon = Macaroon::new("http://fuzz/", identifier, root_key);

    let caveat_size = data.len() / 4;
    for chunk in data.chunks(caveat_size) {
        macaroon.add_first_party_caveat(chunk);
    }

    let verifier = Verifier::new().satisfy_general(|_: &[u8]| true);
    assert!(verifier.is_valid(&macaroon, root_key, &[]));

    let mut wrong_key = root_key.to_vec();
    wrong_key[0] ^= 0xFF;
    assert!(!verifier.is_valid(&macaroon, &wrong_key, &[]));

    if data.len() > 20 {
        let third = data.len() / 3;
        let caveat_key = &data[..third];
        let caveat_id = &data[third..third * 2];

        if macaroon
            .add_third_party_caveat("http://third/", caveat_key, caveat_id)
            .is_ok()
        {
            let discharge = Macaroon::create_discharge("http://third/", caveat_id, caveat_key);
            let bound = macaroon.prepare_for_request(&discharge);
            let _ = verifier.verify(&macaroon, root_key, &[bound]);
            let _ = verifier.verify(&macaroon, root_key, &[discharge]);
        }
    }
});
