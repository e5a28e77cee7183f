//! SASL-SCRAM-SHA-256 client, gated behind the `scram` feature.
//!
//! Implements only the client side of RFC 5802: compute the client-first
//! message, consume the server-first message to produce a client-final
//! message, and validate the server's final signature.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::{BufMut, Bytes, BytesMut};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};

const GS2_HEADER: &str = "n,,";
const USERNAME_KEY: &str = "n=";
const NONCE_KEY: &str = "r=";
const CHANNEL_BINDING_KEY: &str = "c=";
const SALT_KEY: &str = "s=";
const ITERATION_COUNT_KEY: &str = "i=";
const PROOF_KEY: &str = "p=";
const VERIFIER_KEY: &str = "v=";

#[derive(Debug, Clone)]
enum State {
    Initial,
    ClientFirstSent {
        client_nonce: String,
        client_first_message_bare: Bytes,
    },
    ClientFinalSent {
        server_signature: Vec<u8>,
    },
    Complete,
}

/// Client-side SCRAM-SHA-256 negotiation state.
#[derive(Debug, Clone)]
pub struct ScramSha256 {
    username: String,
    password: String,
    state: State,
}

impl ScramSha256 {
    /// Starts a new negotiation for the given credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            state: State::Initial,
        }
    }

    /// Builds the `client-first-message` sent as the SASL-init initial response.
    pub fn client_first_message(&mut self) -> Bytes {
        let nonce = BASE64.encode(generate_nonce());

        let mut bytes = BytesMut::new();
        bytes.put_slice(GS2_HEADER.as_bytes());
        bytes.put_slice(USERNAME_KEY.as_bytes());
        bytes.put_slice(self.username.as_bytes());
        bytes.put_u8(b',');
        bytes.put_slice(NONCE_KEY.as_bytes());
        bytes.put_slice(nonce.as_bytes());

        let client_first_message = bytes.freeze();
        let client_first_message_bare =
            client_first_message.slice(GS2_HEADER.as_bytes().len()..);

        self.state = State::ClientFirstSent {
            client_nonce: nonce,
            client_first_message_bare,
        };
        client_first_message
    }

    /// Consumes the `server-first-message` (a SASL challenge) and produces
    /// the `client-final-message` to send back as the SASL response.
    pub fn client_final_message(&mut self, server_first: &[u8]) -> Result<Vec<u8>> {
        let (client_nonce, client_first_message_bare) = match &self.state {
            State::ClientFirstSent {
                client_nonce,
                client_first_message_bare,
            } => (client_nonce.clone(), client_first_message_bare.clone()),
            _ => {
                return Err(EngineError::SaslFailed(
                    "client-final requested out of order".into(),
                ))
            }
        };

        let server_first = std::str::from_utf8(server_first)
            .map_err(|e| EngineError::SaslFailed(format!("server-first is not utf8: {e}")))?;
        let parts: Vec<&str> = server_first.split(',').collect();
        if parts.len() < 3 {
            return Err(EngineError::SaslFailed(
                "server-first message has too few attributes".into(),
            ));
        }

        let server_nonce = parts[0]
            .strip_prefix(NONCE_KEY)
            .ok_or_else(|| EngineError::SaslFailed("server-first missing nonce".into()))?;
        if !server_nonce.starts_with(&client_nonce) {
            return Err(EngineError::SaslFailed(
                "server nonce does not extend client nonce".into(),
            ));
        }

        let base64_salt = parts[1]
            .strip_prefix(SALT_KEY)
            .ok_or_else(|| EngineError::SaslFailed("server-first missing salt".into()))?;
        let salt = BASE64.decode(base64_salt)
            .map_err(|e| EngineError::SaslFailed(format!("invalid salt base64: {e}")))?;

        let iterations: u32 = parts[2]
            .strip_prefix(ITERATION_COUNT_KEY)
            .ok_or_else(|| EngineError::SaslFailed("server-first missing iteration count".into()))?
            .parse()
            .map_err(|_| EngineError::SaslFailed("invalid iteration count".into()))?;

        let salted_password = salted_password(&self.password, &salt, iterations)?;

        let without_proof = client_final_without_proof(server_nonce);
        let auth_message = auth_message(&client_first_message_bare, server_first.as_bytes(), &without_proof);

        let client_key = hmac_sha256(&salted_password, b"Client Key");
        let stored_key = sha256(&client_key);
        let client_signature = hmac_sha256(&stored_key, &auth_message);
        let client_proof = xor(&client_key, &client_signature)?;

        let mut client_final = Vec::new();
        client_final.put_slice(&without_proof);
        client_final.put_u8(b',');
        client_final.put_slice(PROOF_KEY.as_bytes());
        client_final.put_slice(BASE64.encode(client_proof).as_bytes());

        let server_key = hmac_sha256(&salted_password, b"Server Key");
        let server_signature = hmac_sha256(&server_key, &auth_message);

        self.state = State::ClientFinalSent { server_signature };
        Ok(client_final)
    }

    /// Validates the server's `server-final-message`, completing the exchange.
    pub fn validate_server_final(&mut self, server_final: &[u8]) -> Result<()> {
        let expected = match &self.state {
            State::ClientFinalSent { server_signature } => server_signature.clone(),
            _ => {
                return Err(EngineError::SaslFailed(
                    "server-final received out of order".into(),
                ))
            }
        };

        let server_final = std::str::from_utf8(server_final)
            .map_err(|e| EngineError::SaslFailed(format!("server-final is not utf8: {e}")))?;
        let signature = server_final
            .split(',')
            .next()
            .and_then(|s| s.strip_prefix(VERIFIER_KEY))
            .ok_or_else(|| EngineError::SaslFailed("server-final missing signature".into()))?;
        let signature = BASE64.decode(signature)
            .map_err(|e| EngineError::SaslFailed(format!("invalid server signature: {e}")))?;

        if signature != expected {
            return Err(EngineError::SaslFailed(
                "server signature verification failed".into(),
            ));
        }
        self.state = State::Complete;
        Ok(())
    }
}

fn salted_password(password: &str, salt: &[u8], iterations: u32) -> Result<Vec<u8>> {
    let normalized = stringprep::saslprep(password)
        .map_err(|_| EngineError::SaslFailed("password failed SASLprep normalization".into()))?;
    let mut out = vec![0u8; 32];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(normalized.as_bytes(), salt, iterations, &mut out);
    Ok(out)
}

fn hmac_sha256(key: &[u8], input: &[u8]) -> Vec<u8> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(input);
    mac.finalize().into_bytes().to_vec()
}

fn sha256(input: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hasher.finalize().to_vec()
}

fn xor(lhs: &[u8], rhs: &[u8]) -> Result<Vec<u8>> {
    if lhs.len() != rhs.len() {
        return Err(EngineError::SaslFailed(
            "client key / client signature length mismatch".into(),
        ));
    }
    Ok(lhs.iter().zip(rhs).map(|(a, b)| a ^ b).collect())
}

fn client_final_without_proof(server_nonce: &str) -> Vec<u8> {
    let encoded_gs2 = BASE64.encode(GS2_HEADER);
    let mut buf = Vec::new();
    buf.put_slice(CHANNEL_BINDING_KEY.as_bytes());
    buf.put_slice(encoded_gs2.as_bytes());
    buf.put_u8(b',');
    buf.put_slice(NONCE_KEY.as_bytes());
    buf.put_slice(server_nonce.as_bytes());
    buf
}

fn auth_message(client_first_bare: &[u8], server_first: &[u8], client_final_without_proof: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.put_slice(client_first_bare);
    buf.put_u8(b',');
    buf.put_slice(server_first);
    buf.put_u8(b',');
    buf.put_slice(client_final_without_proof);
    buf
}

fn generate_nonce() -> [u8; 24] {
    let mut nonce = [0u8; 24];
    rand::Rng::fill(&mut rand::thread_rng(), &mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_first_message_has_expected_shape() {
        let mut client = ScramSha256::new("user", "pencil");
        let first = client.client_first_message();
        let text = std::str::from_utf8(&first).unwrap();
        assert!(text.starts_with("n,,n=user,r="));
    }
}
