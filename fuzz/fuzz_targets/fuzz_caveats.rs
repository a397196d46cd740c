#![no_main]

use libfuzzer_sys::fuzz_target;
use macaroons::{Macaroon, Verifier};

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let root_key = b"fuzz_root_key";
    let mut macaroon = Macaroon::new("http://fuzz/", "fuzz_identifier", root_key);
    let mut verifier = Verifier::new();

    for chunk in data.chunks(16) {
        macaroon.add_first_party_caveat(chunk);
        verifier = verifier.satisfy_exact(chunk);
    }

    // Every predicate is known to the verifier
    assert!(verifier.is_valid(&macaroon, root_key, &[]));
    assert!(!Verifier::new().is_valid(&macaroon, root_key, &[]));

    // Third-party caveats and their discharges, with fuzzed caveats on the discharge
    if data.len() >= 32 {
        let caveat_key = &data[0..16];
        let caveat_id = &data[16..32];

        if macaroon
            .add_third_party_caveat("https://fuzz.test", caveat_key, caveat_id)
            .is_ok()
        {
            let mut discharge = Macaroon::create_discharge("https://fuzz.test", caveat_id, caveat_key);
            for chunk in data[32..].chunks(8) {
                discharge.add_first_party_caveat(chunk);
            }

            let bound = macaroon.prepare_discharges(&[discharge]);
            let accept_all = Verifier::new().satisfy_general(|_: &[u8]| true);
            let _ = accept_all.verify(&macaroon, root_key, &bound);
        }
    }

    if let Ok(binary) = macaroon.to_binary() {
        let _ = Macaroon::from_binary(&binary);
    }

    if let Ok(json) = macaroon.to_json() {
        let _ = Macaroon::from_json(&json);
    }
});
