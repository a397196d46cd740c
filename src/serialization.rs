use crate::caveat::Caveat;
use crate::crypto::{SIGNATURE_SIZE, Signature};
use crate::packet::{Packet, decode_packets, encode_packet};
use crate::{Macaroon, MacaroonError, Result};
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::{Deserialize, Serialize};

/// URL-safe base64 that strips padding on encode and tolerates it on decode
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Wire formats a macaroon can be serialized to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Length-prefixed packets, base64url encoded
    #[default]
    Binary,
    /// A JSON object with `location`, `identifier`, `signature` and `caveats`
    Json,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonMacaroon {
    location: String,
    identifier: String,
    signature: String,
    caveats: Vec<JsonCaveat>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonCaveat {
    cid: String,
    vid: Option<String>,
    cl: Option<String>,
}

impl Macaroon {
    /// Serializes this macaroon in the given format
    ///
    /// # Example
    /// ```
    /// use macaroons::{Format, Macaroon};
    ///
    /// let mut macaroon = Macaroon::new("http://mybank/", "we used our secret key", b"secret");
    /// macaroon.add_first_party_caveat("test = caveat");
    ///
    /// let token = macaroon.serialize(Format::Binary).unwrap();
    /// let decoded = Macaroon::deserialize(&token, Format::Binary).unwrap();
    /// assert_eq!(decoded.signature(), macaroon.signature());
    /// ```
    pub fn serialize(&self, format: Format) -> Result<String> {
        match format {
            Format::Binary => self.to_base64(),
            Format::Json => self.to_json(),
        }
    }

    /// Deserializes a macaroon from the given format
    pub fn deserialize(data: &str, format: Format) -> Result<Self> {
        match format {
            Format::Binary => Self::from_base64(data),
            Format::Json => Self::from_json(data),
        }
    }

    /// Encodes this macaroon as raw packets, before base64
    ///
    /// Fails with [`MacaroonError::SerializationError`] if any field needs a
    /// packet longer than 0xFFFF bytes.
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        encode_packet(&mut out, "location", self.location().as_bytes())?;
        encode_packet(&mut out, "identifier", self.identifier())?;

        for caveat in self.caveats() {
            encode_packet(&mut out, "cid", &caveat.caveat_id)?;
            if let Some(vid) = &caveat.verification_key_id {
                encode_packet(&mut out, "vid", vid)?;
            }
            if let Some(cl) = &caveat.location {
                encode_packet(&mut out, "cl", cl.as_bytes())?;
            }
        }

        encode_packet(&mut out, "signature", self.signature())?;
        Ok(out)
    }

    /// Decodes raw packets produced by [`Macaroon::to_binary`]
    ///
    /// Packets must arrive as location, identifier, caveats (`cid`, then
    /// optional `vid` and `cl`), signature. Anything else is rejected.
    pub fn from_binary(data: &[u8]) -> Result<Self> {
        let mut packets = decode_packets(data)?.into_iter();

        let location = expect_packet(packets.next(), "location")?;
        let location = utf8(location.value, "location")?;
        let identifier = expect_packet(packets.next(), "identifier")?.value.to_vec();

        let mut caveats: Vec<Caveat> = Vec::new();
        let mut signature = None;

        for packet in packets {
            if signature.is_some() {
                return Err(malformed("data after the signature packet"));
            }

            match packet.key {
                b"cid" => caveats.push(Caveat::first_party(packet.value)),
                b"vid" => {
                    let caveat = caveats
                        .last_mut()
                        .filter(|c| c.verification_key_id.is_none() && c.location.is_none())
                        .ok_or_else(|| malformed("vid packet without a preceding cid"))?;
                    caveat.verification_key_id = Some(packet.value.to_vec());
                }
                b"cl" => {
                    let caveat = caveats
                        .last_mut()
                        .filter(|c| c.location.is_none())
                        .ok_or_else(|| malformed("cl packet without a preceding cid"))?;
                    caveat.location = Some(utf8(packet.value, "cl")?);
                }
                b"signature" => signature = Some(decode_signature(packet.value)?),
                other => {
                    return Err(malformed(&format!(
                        "unexpected packet '{}'",
                        String::from_utf8_lossy(other)
                    )));
                }
            }
        }

        let signature = signature.ok_or_else(|| malformed("missing signature packet"))?;
        Ok(Macaroon::from_parts(location, identifier, caveats, signature))
    }

    /// Serializes this macaroon to URL-safe base64 without padding
    ///
    /// This is the binary packet format, suitable for HTTP headers and cookies.
    pub fn to_base64(&self) -> Result<String> {
        Ok(BASE64URL.encode(self.to_binary()?))
    }

    /// Deserializes a macaroon from URL-safe base64, with or without padding
    pub fn from_base64(b64: &str) -> Result<Self> {
        let bytes = BASE64URL
            .decode(b64.as_bytes())
            .map_err(|e| MacaroonError::DeserializationError(e.to_string()))?;

        Self::from_binary(&bytes)
    }

    /// Serializes this macaroon to JSON
    ///
    /// The identifier, caveat ids and verification key ids must be valid
    /// UTF-8. Verification key ids are written as stored, in the same base64
    /// text the binary form carries. The signature is lowercase hex.
    ///
    /// # Example
    /// ```
    /// use macaroons::Macaroon;
    ///
    /// let mut macaroon = Macaroon::new("http://mybank/", "we used our secret key", b"secret");
    /// macaroon.add_first_party_caveat("test = caveat");
    ///
    /// let json = macaroon.to_json().unwrap();
    /// assert!(json.contains(r#""cid":"test = caveat""#));
    /// ```
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.to_wire()?)
            .map_err(|e| MacaroonError::SerializationError(e.to_string()))
    }

    /// Serializes this macaroon to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_wire()?)
            .map_err(|e| MacaroonError::SerializationError(e.to_string()))
    }

    /// Deserializes a macaroon from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let wire: JsonMacaroon = serde_json::from_str(json)
            .map_err(|e| MacaroonError::DeserializationError(e.to_string()))?;

        let caveats = wire
            .caveats
            .into_iter()
            .map(|c| -> Result<Caveat> {
                Ok(Caveat {
                    caveat_id: c.cid.into_bytes(),
                    verification_key_id: c.vid.map(String::into_bytes),
                    location: c.cl,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let signature = hex::decode(&wire.signature)
            .map_err(|e| malformed(&format!("signature is not hex: {e}")))?;
        let signature = decode_signature(&signature)?;

        Ok(Macaroon::from_parts(
            wire.location,
            wire.identifier.into_bytes(),
            caveats,
            signature,
        ))
    }

    fn to_wire(&self) -> Result<JsonMacaroon> {
        let caveats = self
            .caveats()
            .iter()
            .map(|c| -> Result<JsonCaveat> {
                Ok(JsonCaveat {
                    cid: non_encodable(&c.caveat_id, "cid")?,
                    vid: c
                        .verification_key_id
                        .as_deref()
                        .map(|vid| non_encodable(vid, "vid"))
                        .transpose()?,
                    cl: c.location.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(JsonMacaroon {
            location: self.location().to_string(),
            identifier: non_encodable(self.identifier(), "identifier")?,
            signature: self.signature_hex(),
            caveats,
        })
    }
}

fn expect_packet<'a>(packet: Option<Packet<'a>>, key: &str) -> Result<Packet<'a>> {
    match packet {
        Some(packet) if packet.key == key.as_bytes() => Ok(packet),
        Some(packet) => Err(malformed(&format!(
            "expected {key} packet, found '{}'",
            String::from_utf8_lossy(packet.key)
        ))),
        None => Err(malformed(&format!("missing {key} packet"))),
    }
}

/// Accepts the raw 32-byte signature, or its 64-character hex form
fn decode_signature(value: &[u8]) -> Result<Signature> {
    let mut signature = [0u8; SIGNATURE_SIZE];
    match value.len() {
        SIGNATURE_SIZE => signature.copy_from_slice(value),
        n if n == 2 * SIGNATURE_SIZE => hex::decode_to_slice(value, &mut signature)
            .map_err(|e| malformed(&format!("signature is not hex: {e}")))?,
        n => {
            return Err(malformed(&format!(
                "signature is {n} bytes, expected {SIGNATURE_SIZE}"
            )));
        }
    }
    Ok(signature)
}

fn utf8(value: &[u8], field: &str) -> Result<String> {
    String::from_utf8(value.to_vec()).map_err(|_| malformed(&format!("{field} is not valid UTF-8")))
}

fn non_encodable(value: &[u8], field: &str) -> Result<String> {
    std::str::from_utf8(value)
        .map(str::to_string)
        .map_err(|_| MacaroonError::SerializationError(format!("{field} is not valid UTF-8")))
}

fn malformed(reason: &str) -> MacaroonError {
    MacaroonError::DeserializationError(reason.to_string())
}
