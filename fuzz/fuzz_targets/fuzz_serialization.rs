#![no_main]

use libfuzzer_sys::fuzz_target;
use macaroons::{Format, Macaroon};

fuzz_target!(|data: &[u8]| {
    // Raw packet stream
    if let Ok(macaroon) = Macaroon::from_binary(data) {
        // Anything that decodes must encode back to the same bytes
        let encoded = macaroon.to_binary().expect("decoded macaroon re-encodes");
        assert_eq!(Macaroon::from_binary(&encoded).as_ref(), Ok(&macaroon));

        let _ = macaroon.to_json();
        let _ = macaroon.inspect();
        let _ = macaroon.caveat_count();
        let _ = macaroon.is_unrestricted();
    }

    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(macaroon) = Macaroon::deserialize(s, Format::Binary) {
            let _ = macaroon.serialize(Format::Json);
        }

        if let Ok(macaroon) = Macaroon::deserialize(s, Format::Json) {
            let _ = macaroon.serialize(Format::Binary);
        }
    }
});
